//! Host-side playback context: the optional master clock that phase-locks a
//! group of instances.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

/// Snapshot of a synchronization root's timeline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub master_frame: f32,
    pub from_frame: f32,
    pub to_frame: f32,
}

impl SyncWindow {
    /// Position of the master frame inside its window, 0 at `from_frame` and 1
    /// at `to_frame`. A zero-length window reports 0.
    #[inline]
    pub fn normalized(&self) -> f32 {
        let span = self.to_frame - self.from_frame;
        if span == 0.0 {
            0.0
        } else {
            (self.master_frame - self.from_frame) / span
        }
    }

    /// Map the master position into another `[from, to]` window.
    #[inline]
    pub fn map_into(&self, from: f32, to: f32) -> f32 {
        from + (to - from) * self.normalized()
    }
}

/// The object driving an instance each tick.
pub trait PlaybackHost {
    fn sync_root(&self) -> Option<SyncWindow>;
}

/// Minimal host whose sync root is set by the scheduler between ticks.
#[derive(Debug, Default)]
pub struct HostClock {
    root: Cell<Option<SyncWindow>>,
}

impl HostClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sync_root(&self, root: Option<SyncWindow>) {
        self.root.set(root);
    }

    /// Move the master frame of the current sync root, if any.
    pub fn set_master_frame(&self, frame: f32) {
        if let Some(mut root) = self.root.get() {
            root.master_frame = frame;
            self.root.set(Some(root));
        }
    }
}

impl PlaybackHost for HostClock {
    fn sync_root(&self) -> Option<SyncWindow> {
        self.root.get()
    }
}
