//! Identifiers for runtime instances registered against a track.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct InstId(pub u32);

/// Monotonic allocator for InstId. Each track owns one, so ids are unique per
/// track and never reused while the track lives.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_inst: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_inst(&mut self) -> InstId {
        let id = InstId(self.next_inst);
        self.next_inst = self.next_inst.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_inst(), InstId(0));
        assert_eq!(alloc.alloc_inst(), InstId(1));
        assert_eq!(alloc.alloc_inst(), InstId(2));
    }
}
