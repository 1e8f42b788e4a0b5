//! Per-instance event dispatch.
//!
//! Each instance works on its own copy of the track's events, so done flags
//! and consumed one-shot events never leak between instances.

use log::trace;

use crate::data::{EventAction, Track, TrackEvent};

#[derive(Debug, Default)]
pub struct EventDispatcher {
    events: Vec<TrackEvent>,
}

impl EventDispatcher {
    pub fn from_track(track: &Track) -> Self {
        Self {
            events: track.events().iter().map(TrackEvent::rearmed).collect(),
        }
    }

    /// Fire every due event that has not fired yet, in list order.
    ///
    /// An event is due when it lies between `from` and `current` in the
    /// playback direction given by the sign of `range`. Repeatable events that
    /// are done but no longer due are re-armed. Returns the number fired.
    pub fn dispatch(&mut self, current: f32, from: f32, range: f32) -> usize {
        let mut due_actions: Vec<EventAction> = Vec::new();
        for event in self.events.iter_mut() {
            let due = if range >= 0.0 {
                current >= event.frame && event.frame >= from
            } else {
                current <= event.frame && event.frame <= from
            };
            if due {
                if !event.is_done {
                    event.is_done = true;
                    due_actions.push(event.action());
                }
            } else if event.is_done && !event.only_once {
                event.is_done = false;
            }
        }
        if due_actions.is_empty() {
            return 0;
        }

        self.events.retain(|e| !(e.only_once && e.is_done));
        for action in &due_actions {
            trace!("event fired at frame {current}");
            action(current);
        }
        due_actions.len()
    }

    /// Clear the done flag of every repeatable event (loop wrap).
    pub fn rearm_repeatable(&mut self) {
        for event in self.events.iter_mut().filter(|e| !e.only_once) {
            event.is_done = false;
        }
    }

    /// After a seek, repeatable events before `frame` count as already fired.
    pub fn seek(&mut self, frame: f32) {
        for event in self.events.iter_mut().filter(|e| !e.only_once) {
            event.is_done = event.frame < frame;
        }
    }

    /// Clear every done flag. Consumed one-shot events stay consumed.
    pub fn reset(&mut self) {
        for event in self.events.iter_mut() {
            event.is_done = false;
        }
    }

    #[inline]
    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }
}
