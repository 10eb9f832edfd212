//! Pointer input session
//!
//! Tracks which atom the pointer holds and where it was grabbed. While an atom
//! is held the simulation is frozen (see [`Hand::tick_input`]).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::sim::{AtomRef, Multiverse, TickInput, WorldId, grab_atom, move_atom, point_overlaps};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    /// Atom being dragged
    pub atom: Option<AtomRef>,
    /// Held atom's origin relative to the pointer
    pub offset: Vec2,
    /// Pointer state on the previous update, grabs only happen on press
    pressed: bool,
}

impl Hand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drag_target(&self) -> Option<AtomRef> {
        self.atom
    }

    /// Tick input for the current hand state
    pub fn tick_input(&self) -> TickInput {
        TickInput { drag: self.atom }
    }

    /// Feed one pointer sample in canvas coordinates
    pub fn update(
        &mut self,
        mv: &mut Multiverse,
        pointer: Vec2,
        down: bool,
        columns: usize,
    ) -> SimResult<()> {
        let just_pressed = down && !self.pressed;
        self.pressed = down;
        let (world, local) = mv.address(pointer, columns);

        let Some(held) = self.atom else {
            if just_pressed {
                self.pick(mv, world, local)?;
            }
            return Ok(());
        };

        if !down || mv.atom(held).is_none() {
            self.release();
            return Ok(());
        }
        let held = mv.move_to_world(held, world)?;
        self.atom = Some(held);
        let target = local + self.offset;
        move_atom(mv, held, target.x, target.y)
    }

    fn pick(&mut self, mv: &mut Multiverse, world: WorldId, point: Vec2) -> SimResult<()> {
        let Some(w) = mv.world(world) else {
            return Ok(());
        };
        // Topmost in draw order wins
        let Some(candidate) = w.iter().filter(|a| point_overlaps(point, a)).last() else {
            return Ok(());
        };
        let candidate_ref = w.atom_ref(candidate.id);
        let mut offset = Vec2::new(candidate.x, candidate.y) - point;

        let Some(picked) = grab_atom(mv, candidate_ref, &mut offset)? else {
            return Ok(());
        };
        if let Some(a) = mv.atom_mut(picked) {
            a.dx = 0.0;
            a.dy = 0.0;
            a.nextdx = 0.0;
            a.nextdy = 0.0;
        }
        log::debug!("Picked up {picked}");
        self.atom = Some(picked);
        self.offset = offset;
        Ok(())
    }

    pub fn release(&mut self) {
        if let Some(atom) = self.atom.take() {
            log::debug!("Released {atom}");
        }
        self.offset = Vec2::ZERO;
    }
}
