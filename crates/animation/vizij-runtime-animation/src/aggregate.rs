//! Late-binding aggregation of weighted contributions.
//!
//! Instances playing with a weight do not write their targets. They register
//! a [`Contribution`] and a [`LateBindingAggregator`] later combines every
//! contribution aimed at the same property into one write.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use log::warn;
use vizij_api_core::blend::{compose, decompose, normalize_quat};
use vizij_api_core::{Trs, Value, ValueKind};

use crate::config::MatrixBlendMode;
use crate::error::Result;
use crate::ids::InstId;
use crate::target::TargetRef;

/// One instance's weighted value for one property slot.
pub struct Contribution {
    pub instance: InstId,
    /// Object owning the slot.
    pub container: TargetRef,
    /// Leaf slot name.
    pub property: String,
    pub value: Value,
    pub weight: f32,
    /// Baseline captured by the instance; fills weight left unclaimed.
    pub original: Option<Value>,
}

pub trait LateBindingAggregator {
    fn register(&mut self, contribution: Contribution);
}

pub type AggregatorRef = Rc<RefCell<dyn LateBindingAggregator>>;

#[derive(Debug, Clone)]
enum AccumEntry {
    Linear { kind: ValueKind, sum: Vec<f32> },
    Quat { sum: [f32; 4], reference: [f32; 4] },
    Trs { t: [f32; 3], r: [f32; 4], s: [f32; 3], reference: [f32; 4] },
    /// Step-only kinds: last contribution wins.
    Step(Value),
}

#[inline]
fn dot4(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
fn add_scaled<const N: usize>(sum: &mut [f32; N], v: &[f32; N], w: f32) {
    for (s, x) in sum.iter_mut().zip(v) {
        *s += x * w;
    }
}

/// Add `q * w`, flipped onto the reference hemisphere.
#[inline]
fn add_aligned(sum: &mut [f32; 4], q: &[f32; 4], reference: &[f32; 4], w: f32) {
    let w = if dot4(q, reference) < 0.0 { -w } else { w };
    add_scaled(sum, q, w);
}

impl AccumEntry {
    fn start(v: &Value, mode: MatrixBlendMode) -> Option<Self> {
        Some(match v {
            Value::Quat(q) => AccumEntry::Quat {
                sum: [0.0; 4],
                reference: *q,
            },
            Value::Matrix(m) if mode == MatrixBlendMode::DecomposeLerp => AccumEntry::Trs {
                t: [0.0; 3],
                r: [0.0; 4],
                s: [0.0; 3],
                reference: decompose(m).rotation,
            },
            Value::Bool(_) | Value::Text(_) => AccumEntry::Step(v.clone()),
            _ => AccumEntry::Linear {
                kind: v.kind(),
                sum: vec![0.0; v.components()?.len()],
            },
        })
    }

    /// Returns false when `v` does not match the entry's kind.
    fn add(&mut self, v: &Value, w: f32) -> bool {
        match (self, v) {
            (AccumEntry::Quat { sum, reference }, Value::Quat(q)) => {
                add_aligned(sum, q, reference, w);
            }
            (AccumEntry::Trs { t, r, s, reference }, Value::Matrix(m)) => {
                let trs = decompose(m);
                add_scaled(t, &trs.translation, w);
                add_aligned(r, &trs.rotation, reference, w);
                add_scaled(s, &trs.scale, w);
            }
            (AccumEntry::Step(last), Value::Bool(_) | Value::Text(_)) => {
                *last = v.clone();
            }
            (AccumEntry::Linear { kind, sum }, _) if *kind == v.kind() => {
                let Some(c) = v.components() else {
                    return false;
                };
                for (s, x) in sum.iter_mut().zip(c) {
                    *s += x * w;
                }
            }
            _ => return false,
        }
        true
    }

    fn finish(self, total: f32) -> Option<Value> {
        if total <= 0.0 {
            return match self {
                AccumEntry::Step(v) => Some(v),
                _ => None,
            };
        }
        match self {
            AccumEntry::Linear { kind, sum } => {
                let mean: Vec<f32> = sum.iter().map(|s| s / total).collect();
                Value::from_components(kind, &mean)
            }
            AccumEntry::Quat { sum, .. } => Some(Value::Quat(normalize_quat(sum))),
            AccumEntry::Trs { t, r, s, .. } => Some(Value::Matrix(compose(&Trs {
                translation: t.map(|x| x / total),
                rotation: normalize_quat(r),
                scale: s.map(|x| x / total),
            }))),
            AccumEntry::Step(v) => Some(v),
        }
    }
}

struct Group {
    container: TargetRef,
    property: String,
    entry: AccumEntry,
    total: f32,
    original: Option<Value>,
    contributors: Vec<InstId>,
}

/// Groups contributions by `(container, property)` and writes each group once
/// on [`flush`](LateBindingAccumulator::flush).
///
/// Weighted means per kind: component-wise for floats, vectors, colors and
/// sizes; hemisphere-aligned normalized sum for quaternions; TRS for matrices
/// under [`MatrixBlendMode::DecomposeLerp`] (raw components otherwise); last
/// writer wins for bool and text. When the weights sum below 1.0 the first
/// registered original value takes the remaining weight.
pub struct LateBindingAccumulator {
    matrix_blend: MatrixBlendMode,
    groups: Vec<Group>,
    index: HashMap<(usize, String), usize>,
}

impl LateBindingAccumulator {
    pub fn new(matrix_blend: MatrixBlendMode) -> Self {
        Self {
            matrix_blend,
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn into_shared(self) -> Rc<RefCell<LateBindingAccumulator>> {
        Rc::new(RefCell::new(self))
    }

    /// Number of distinct property slots waiting for a flush.
    #[inline]
    pub fn pending(&self) -> usize {
        self.groups.len()
    }

    /// Instances that contributed to `property` on `container` since the last flush.
    pub fn contributors(&self, container: &TargetRef, property: &str) -> &[InstId] {
        self.index
            .get(&(container_addr(container), property.to_string()))
            .map(|&i| self.groups[i].contributors.as_slice())
            .unwrap_or(&[])
    }

    /// Write every pending group into its slot, in registration order.
    /// Returns the number of slots written.
    pub fn flush(&mut self) -> Result<usize> {
        self.index.clear();
        let groups = std::mem::take(&mut self.groups);
        let mut written = 0;
        for group in groups {
            let Group {
                container,
                property,
                mut entry,
                mut total,
                original,
                ..
            } = group;
            if total < 1.0 && !matches!(entry, AccumEntry::Step(_)) {
                if let Some(original) = &original {
                    if entry.add(original, 1.0 - total) {
                        total = 1.0;
                    }
                }
            }
            let Some(value) = entry.finish(total) else {
                continue;
            };
            container.borrow_mut().set_property(&property, value)?;
            written += 1;
        }
        Ok(written)
    }
}

#[inline]
fn container_addr(container: &TargetRef) -> usize {
    Rc::as_ptr(container) as *const () as usize
}

impl LateBindingAggregator for LateBindingAccumulator {
    fn register(&mut self, c: Contribution) {
        if c.weight <= 0.0 && !matches!(c.value, Value::Bool(_) | Value::Text(_)) {
            return;
        }
        let key = (container_addr(&c.container), c.property.clone());
        let slot = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                let Some(entry) = AccumEntry::start(&c.value, self.matrix_blend) else {
                    return;
                };
                self.groups.push(Group {
                    container: Rc::clone(&c.container),
                    property: c.property.clone(),
                    entry,
                    total: 0.0,
                    original: None,
                    contributors: Vec::new(),
                });
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };

        let group = &mut self.groups[slot];
        if !group.entry.add(&c.value, c.weight) {
            warn!(
                "instance {:?}: {:?} contribution to '{}' does not match earlier contributions; ignored",
                c.instance,
                c.value.kind(),
                c.property
            );
            return;
        }
        group.total += c.weight.max(0.0);
        if group.original.is_none() {
            group.original = c.original;
        }
        group.contributors.push(c.instance);
    }
}
