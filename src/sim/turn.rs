//! Quarter-turn rotation and horizontal flips
//!
//! Rotation swaps width/height and cycles the cut insets. A rejecting turn also
//! re-anchors the atom and rolls everything back if the result would overlap
//! something.
//!
//! Link mappings owned by the turning atom are not re-oriented; a child linked
//! with `Shift(50.0)` on `X` keeps sitting 50px to the right after a turn.

use super::atom::{Atom, AtomRef, Cuts};
use super::geom::Bounds;
use super::multiverse::Multiverse;
use super::overlap::atom_overlaps;
use crate::error::{SimError, SimResult};

/// Options for [`turn_atom`]
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    /// Caller expects the atom to stay grounded. The bottom/centre anchoring
    /// only happens on rejecting turns, so this alone moves nothing.
    pub fall_safe: bool,
    /// Undo the turn if it would overlap another atom
    pub reject_if_overlap: bool,
    /// Atoms ignored by the overlap check
    pub exceptions: Vec<AtomRef>,
}

impl TurnOptions {
    /// Grounded, overlap-checked turn
    pub fn checked() -> Self {
        Self {
            fall_safe: true,
            reject_if_overlap: true,
            exceptions: Vec::new(),
        }
    }

    pub fn except(mut self, atom: AtomRef) -> Self {
        self.exceptions.push(atom);
        self
    }
}

/// Everything a turn may touch, for rollback
#[derive(Debug, Clone, Copy, PartialEq)]
struct TurnState {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    cut: Cuts,
    turns: u8,
}

impl TurnState {
    fn capture(atom: &Atom) -> Self {
        Self {
            x: atom.x,
            y: atom.y,
            width: atom.width,
            height: atom.height,
            cut: atom.cut,
            turns: atom.turns,
        }
    }

    fn restore(&self, atom: &mut Atom) {
        atom.x = self.x;
        atom.y = self.y;
        atom.width = self.width;
        atom.height = self.height;
        atom.cut = self.cut;
        atom.turns = self.turns;
    }
}

/// Rotate an atom by `turns` quarter turns clockwise (negative = anticlockwise).
///
/// Returns `Ok(false)` when a rejecting turn was undone; the atom is then exactly
/// as it was before the call.
pub fn turn_atom(
    mv: &mut Multiverse,
    atom: AtomRef,
    turns: i32,
    options: &TurnOptions,
) -> SimResult<bool> {
    let turns = turns.rem_euclid(4);
    if turns == 0 {
        return Ok(true);
    }
    let before = TurnState::capture(mv.atom(atom).ok_or(SimError::UnknownAtom(atom))?);

    for _ in 0..turns {
        if !turn_once(mv, atom, options)? {
            if let Some(a) = mv.atom_mut(atom) {
                before.restore(a);
            }
            log::debug!("Turn of {atom} rejected by overlap");
            return Ok(false);
        }
    }
    Ok(true)
}

fn turn_once(mv: &mut Multiverse, atom: AtomRef, options: &TurnOptions) -> SimResult<bool> {
    let a = mv.atom_mut(atom).ok_or(SimError::UnknownAtom(atom))?;
    let before = TurnState::capture(a);
    let old_bounds = Bounds::of(a);

    std::mem::swap(&mut a.width, &mut a.height);
    a.cut = a.cut.rotated_cw();

    if options.reject_if_overlap {
        let new_bounds = Bounds::of(a);
        a.y -= new_bounds.bottom - old_bounds.bottom + 1.0;
        a.x -= (a.width - a.height) / 2.0;

        let world = mv.world(atom.world).ok_or(SimError::UnknownWorld(atom.world))?;
        let others: Vec<AtomRef> = world
            .order
            .iter()
            .map(|&id| AtomRef::new(atom.world, id))
            .filter(|other| *other != atom && !options.exceptions.contains(other))
            .collect();
        if others.into_iter().any(|other| atom_overlaps(mv, atom, other)) {
            if let Some(a) = mv.atom_mut(atom) {
                before.restore(a);
            }
            return Ok(false);
        }
    }

    if let Some(a) = mv.atom_mut(atom) {
        a.turns = (a.turns + 1) % 4;
    }
    Ok(true)
}

/// Mirror an atom horizontally, keeping its occupied footprint in place
pub fn flip_atom(atom: &mut Atom) {
    atom.flip_x = !atom.flip_x;
    let (cut_left, cut_right) = (atom.cut.right, atom.cut.left);
    atom.cut.left = cut_left;
    atom.cut.right = cut_right;
    atom.x -= cut_left - cut_right;
}
