//! Rotate potions
//!
//! A potion touching anything that isn't void or another potion is used up: the
//! root of whatever it touched turns a quarter and gets an upward kick.

use super::atom::AtomRef;
use super::link::root_of;
use super::multiverse::{Multiverse, RemoveOptions};
use super::turn::{TurnOptions, turn_atom};
use crate::error::SimResult;

/// Resolve a potion collision between `a` and `b`, in either order.
///
/// Returns `true` when the potion was consumed; the pair is then not a solid
/// contact and the potion no longer exists.
pub fn resolve_potion(mv: &mut Multiverse, a: AtomRef, b: AtomRef) -> SimResult<bool> {
    let is_potion = |r: AtomRef| mv.atom(r).is_some_and(|atom| atom.is_potion);
    let (potion, other) = if is_potion(a) {
        (a, b)
    } else if is_potion(b) {
        (b, a)
    } else {
        return Ok(false);
    };

    if mv.atom(potion).is_none_or(|p| p.used) {
        return Ok(false);
    }
    let root = root_of(mv, other);
    let Some(target) = mv.atom(root) else {
        return Ok(false);
    };
    if target.is_void || target.is_potion {
        return Ok(false);
    }
    let is_mover = target.is_mover;

    if let Some(p) = mv.atom_mut(potion) {
        p.used = true;
    }
    mv.remove_atom(
        potion,
        RemoveOptions {
            including_children: true,
            destroy: true,
        },
    )?;

    if is_mover {
        if let Some(t) = mv.atom_mut(root) {
            t.nextturns = (t.nextturns + 1) % 4;
        }
    } else {
        let turned = turn_atom(mv, root, 1, &TurnOptions::checked().except(potion))?;
        if !turned {
            log::debug!("Potion turn of {root} blocked");
        }
    }

    let impulse = mv.settings.potion_impulse;
    if let Some(t) = mv.atom_mut(root) {
        t.nextdy = -impulse;
        t.jump_tick = 0;
    }
    log::debug!("Potion {potion} used on {root}");
    Ok(true)
}
