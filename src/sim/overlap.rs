//! Link-aware overlap detection
//!
//! An atom's footprint is itself plus every linked descendant in the same
//! world. An atom never collides with its own ancestors or descendants.

use std::collections::HashSet;

use glam::Vec2;

use super::atom::AtomRef;
use super::geom::Bounds;
use super::link::atom_is_descendant;
use super::multiverse::Multiverse;

/// Whether `atom` (with its link subtree) overlaps `other`
pub fn atom_overlaps(mv: &Multiverse, atom: AtomRef, other: AtomRef) -> bool {
    overlaps_shifted(mv, atom, other, Vec2::ZERO)
}

/// [`atom_overlaps`] with `atom`'s whole subtree translated by `shift`
pub fn overlaps_shifted(mv: &Multiverse, atom: AtomRef, other: AtomRef, shift: Vec2) -> bool {
    let Some(target) = mv.atom(other) else {
        return false;
    };
    let target_bounds = Bounds::of(target);

    let mut visited = HashSet::new();
    let mut stack = vec![atom];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) || current.world != other.world {
            continue;
        }
        if current == other
            || atom_is_descendant(mv, current, other)
            || atom_is_descendant(mv, other, current)
        {
            // The whole subtree below is related to `other` too
            if current == atom {
                return false;
            }
            continue;
        }
        let Some(a) = mv.atom(current) else { continue };
        stack.extend(a.links.iter().map(|l| l.child));

        if Bounds::of(a).shifted(shift).overlaps(&target_bounds) {
            return true;
        }
    }
    false
}
