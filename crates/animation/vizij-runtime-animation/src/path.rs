//! Property-path resolution: walk a dotted path from a root target to the
//! object owning the leaf slot.

use std::rc::Rc;

use crate::error::{Result, RuntimeError};
use crate::target::TargetRef;

/// Writable slot located by [`resolve_property_path`]: `container[leaf]`.
pub struct ResolvedPath<'a> {
    pub container: TargetRef,
    pub leaf: &'a str,
}

/// Resolve `path` against `root`.
///
/// A single-segment path resolves to the root itself. Longer paths walk every
/// intermediate segment through [`Animatable::child`](crate::Animatable::child);
/// the last segment names the leaf slot.
pub fn resolve_property_path<'a>(root: &TargetRef, path: &'a [String]) -> Result<ResolvedPath<'a>> {
    let Some((leaf, intermediates)) = path.split_last() else {
        return Err(RuntimeError::PropertyPathResolution {
            path: String::new(),
            segment: String::new(),
        });
    };

    let mut container = Rc::clone(root);
    for segment in intermediates {
        let next = container.borrow().child(segment);
        container = next.ok_or_else(|| RuntimeError::PropertyPathResolution {
            path: path.join("."),
            segment: segment.clone(),
        })?;
    }

    Ok(ResolvedPath {
        container,
        leaf: leaf.as_str(),
    })
}
