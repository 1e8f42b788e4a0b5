//! Scratch buffers reused across ticks.
//!
//! Matrix tracks decompose both keys of the active segment on every sample
//! when decompose-lerp is selected; the decomposition is kept until the
//! segment changes.

use vizij_api_core::blend::{compose, decompose, lerp_array};
use vizij_api_core::{slerp, Trs};

#[derive(Debug, Clone)]
struct SegmentTrs {
    a: [f32; 16],
    b: [f32; 16],
    da: Trs,
    db: Trs,
}

#[derive(Debug, Default)]
pub struct Scratch {
    segment: Option<SegmentTrs>,
    decompositions: usize,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decompose-lerp between two matrices, reusing the last decomposition
    /// when the same pair is sampled again.
    pub fn matrix_decompose_lerp(&mut self, a: &[f32; 16], b: &[f32; 16], t: f32) -> [f32; 16] {
        if t <= 0.0 {
            return *a;
        }
        if t >= 1.0 {
            return *b;
        }
        let hit = matches!(&self.segment, Some(seg) if seg.a == *a && seg.b == *b);
        if !hit {
            self.decompositions += 1;
            self.segment = Some(SegmentTrs {
                a: *a,
                b: *b,
                da: decompose(a),
                db: decompose(b),
            });
        }
        match &self.segment {
            Some(seg) => compose(&Trs {
                translation: lerp_array(&seg.da.translation, &seg.db.translation, t),
                rotation: slerp(seg.da.rotation, seg.db.rotation, t),
                scale: lerp_array(&seg.da.scale, &seg.db.scale, t),
            }),
            None => *a,
        }
    }

    /// Number of key pairs decomposed since creation or the last `clear`.
    #[inline]
    pub fn decompositions(&self) -> usize {
        self.decompositions
    }

    pub fn clear(&mut self) {
        self.segment = None;
        self.decompositions = 0;
    }
}
