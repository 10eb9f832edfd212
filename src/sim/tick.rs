//! Fixed timestep simulation tick
//!
//! Advances every world of the multiverse one step, deterministically: worlds
//! in registration order, root atoms in insertion order.

use std::collections::HashSet;

use serde::Serialize;

use super::atom::{AtomRef, WorldId};
use super::behavior::update_atom;
use super::geom::{Axis, Bounds, Travel};
use super::link::{subtree, update_links};
use super::multiverse::Multiverse;
use super::overlap::overlaps_shifted;
use super::portal::{Crossing, PortalKind};
use super::potion::resolve_potion;
use super::transit::{Transit, abandon_transit, collided_portal, settle_contacts};
use super::turn::{TurnOptions, turn_atom};
use crate::consts::CONTACT_GAP;
use crate::error::{SimError, SimResult};

/// Input for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Atom currently held by the pointer; the simulation is frozen while set
    pub drag: Option<AtomRef>,
}

/// What happened during a tick
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// Crossings whose portal failed them
    pub induced: Vec<Crossing>,
    /// Travellers swallowed whole
    pub consumed: Vec<AtomRef>,
    /// Worlds created this tick
    pub branches: Vec<WorldId>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.induced.is_empty() && self.consumed.is_empty() && self.branches.is_empty()
    }
}

/// Advance the multiverse by one fixed timestep
pub fn tick(mv: &mut Multiverse, input: &TickInput) -> SimResult<TickReport> {
    let mut report = TickReport::default();
    if let Some(held) = input.drag {
        log::trace!("Frozen while {held} is held");
        return Ok(report);
    }

    let depth = mv.settings.past_projection_depth;
    // Worlds created during this tick start simulating next tick
    let world_count = mv.worlds.len();
    for index in 0..world_count {
        let world = &mut mv.worlds[index];
        if world.projection_skip > 0 {
            world.projection_skip -= 1;
            continue;
        }
        world.save_past_projection(depth);
        let id = world.id;

        for root in world.roots() {
            let atom = AtomRef::new(id, root);
            // Swallowed or linked by an earlier update this tick
            if mv.atom(atom).is_none_or(|a| a.parent.is_some()) {
                continue;
            }
            update_atom(mv, atom, &mut report)?;
            update_links(mv, atom);
        }

        settle_contacts(mv, id)?;
        maintain_future(mv, id)?;
    }

    report.branches = mv.worlds[world_count..].iter().map(|w| w.id).collect();
    for branch in &report.branches {
        log::info!("World {branch} branched at tick {}", mv.time_ticks);
    }
    mv.time_ticks += 1;
    Ok(report)
}

impl Multiverse {
    /// Tick with an optional atom held by the pointer
    pub fn tick(&mut self, drag: Option<AtomRef>) -> SimResult<TickReport> {
        tick(self, &TickInput { drag })
    }
}

/// Keep a world's future projection `future_lookahead` ticks ahead of it
fn maintain_future(mv: &mut Multiverse, id: WorldId) -> SimResult<()> {
    if mv.settings.future_lookahead == 0 {
        return Ok(());
    }
    let world = mv.world_mut(id).ok_or(SimError::UnknownWorld(id))?;
    if world.is_projection || !world.has_portal(PortalKind::Futureline) {
        world.future_projection = None;
        return Ok(());
    }
    match world.future_projection.take() {
        None => mv.save_future_projection(id),
        Some(projection) => {
            let advanced = mv.advance_projection(*projection, 1)?;
            let world = mv.world_mut(id).ok_or(SimError::UnknownWorld(id))?;
            world.future_projection = Some(Box::new(advanced));
            Ok(())
        }
    }
}

/// Mover update: queued turns, gravity and drag, then one collision-resolved
/// step per axis
pub(crate) fn update_mover(
    mv: &mut Multiverse,
    atom: AtomRef,
    report: &mut TickReport,
) -> SimResult<()> {
    let gravity = mv.settings.gravity;
    let air_resistance = mv.settings.air_resistance;

    let a = mv.atom_mut(atom).ok_or(SimError::UnknownAtom(atom))?;
    if a.skip_update {
        a.skip_update = false;
        return Ok(());
    }
    let queued = a.nextturns;
    if queued != 0 {
        a.nextturns = 0;
        if !turn_atom(mv, atom, i32::from(queued), &TurnOptions::checked())? {
            log::debug!("Queued turn of {atom} blocked");
        }
        update_links(mv, atom);
    }

    let a = mv.atom_mut(atom).ok_or(SimError::UnknownAtom(atom))?;
    a.dx = a.nextdx * air_resistance;
    a.dy = (a.nextdy + gravity) * air_resistance;
    if let Some(max) = a.max_speed {
        a.dx = a.dx.clamp(-max, max);
        a.dy = a.dy.clamp(-max, max);
    }
    // Collisions below may override these (potions, landings)
    a.nextdx = a.dx;
    a.nextdy = a.dy;
    a.grounded = false;
    let (dx, dy) = (a.dx, a.dy);

    if dx != 0.0 && !step_axis(mv, atom, Axis::X, dx, report)? {
        return Ok(());
    }
    if dy != 0.0 {
        step_axis(mv, atom, Axis::Y, dy, report)?;
    }
    Ok(())
}

/// Move `atom` (and its subtree) by `delta` along `axis`, stopping short of
/// solids. Returns `false` when the atom no longer exists afterwards.
fn step_axis(
    mv: &mut Multiverse,
    atom: AtomRef,
    axis: Axis,
    delta: f32,
    report: &mut TickReport,
) -> SimResult<bool> {
    let travel = Travel::new(axis, delta);
    let shift = axis.unit() * delta;
    let world = atom.world;

    let family: HashSet<AtomRef> = subtree(mv, atom).into_iter().collect();
    let others: Vec<AtomRef> = mv
        .world(world)
        .ok_or(SimError::UnknownWorld(world))?
        .order
        .iter()
        .map(|&id| AtomRef::new(world, id))
        .filter(|other| !family.contains(other))
        .collect();

    let mut blockers = Vec::new();
    let mut portals = Vec::new();
    for other in others {
        let Some(o) = mv.atom(other) else { continue };
        if o.is_portal() {
            portals.push(other);
            continue;
        }
        if Bounds::of(o).is_degenerate() || !overlaps_shifted(mv, atom, other, shift) {
            continue;
        }
        if resolve_potion(mv, atom, other)? {
            if mv.atom(atom).is_none() {
                return Ok(false);
            }
            continue;
        }
        blockers.push(other);
    }

    let me = mv.atom(atom).ok_or(SimError::UnknownAtom(atom))?;
    let next = Bounds::of(me).shifted(shift);
    let hit_something = !blockers.is_empty();
    for portal in portals {
        let Some(p) = mv.atom(portal) else { continue };
        if !next.overlaps(&Bounds::of(p)) {
            continue;
        }
        // Sliding along a portal we're already crossing on another side
        let held = mv.atom(atom).and_then(|a| a.portals.side_of(portal));
        if held.is_some_and(|side| side != travel.front()) {
            continue;
        }
        match collided_portal(mv, atom, portal, travel, next, hit_something)? {
            Transit::Continue => {}
            Transit::Blocked => blockers.push(portal),
            Transit::Induced => {
                log::warn!("Induced transit: {atom} failed to cross {portal}");
                report.induced.push(Crossing {
                    traveller: atom,
                    portal,
                    travel,
                });
                abandon_transit(mv, atom, portal)?;
                blockers.push(portal);
            }
            Transit::Consumed => {
                report.consumed.push(atom);
                return Ok(false);
            }
        }
    }

    let allowed = if blockers.is_empty() {
        delta.abs()
    } else {
        free_distance(mv, atom, &blockers, travel, delta.abs())
    };
    let a = mv.atom_mut(atom).ok_or(SimError::UnknownAtom(atom))?;
    match axis {
        Axis::X => a.x += allowed * travel.direction,
        Axis::Y => a.y += allowed * travel.direction,
    }
    if !blockers.is_empty() {
        let bounce = blockers
            .iter()
            .filter_map(|b| mv.atom(*b).and_then(|b| b.bounce))
            .reduce(f32::max);
        block(mv, atom, travel, bounce);
    }
    update_links(mv, atom);
    Ok(true)
}

/// How far the subtree can go toward the blockers, leaving [`CONTACT_GAP`]
fn free_distance(
    mv: &Multiverse,
    atom: AtomRef,
    blockers: &[AtomRef],
    travel: Travel,
    wanted: f32,
) -> f32 {
    let shift = travel.vector() * wanted;
    let members: Vec<Bounds> = subtree(mv, atom)
        .into_iter()
        .filter(|m| m.world == atom.world)
        .filter_map(|m| mv.atom(m).map(Bounds::of))
        .collect();

    let mut allowed = wanted;
    for blocker in blockers.iter().filter_map(|b| mv.atom(*b)) {
        let solid = Bounds::of(blocker);
        for member in &members {
            if !member.shifted(shift).overlaps(&solid) {
                continue;
            }
            let gap = travel.direction
                * (solid.edge(travel.back()) - member.edge(travel.front()));
            if gap >= 0.0 {
                allowed = allowed.min((gap - CONTACT_GAP).max(0.0));
            } else {
                // Already touching or inside
                allowed = 0.0;
            }
        }
    }
    allowed
}

/// Velocity response to a blocked step
fn block(mv: &mut Multiverse, atom: AtomRef, travel: Travel, bounce: Option<f32>) {
    let friction = mv.settings.friction;
    let Some(a) = mv.atom_mut(atom) else { return };
    let forward = travel.direction > 0.0;
    match (travel.axis, forward) {
        (Axis::X, true) => {
            a.dx = 0.0;
            a.nextdx = a.nextdx.min(0.0);
        }
        (Axis::X, false) => {
            a.dx = 0.0;
            a.nextdx = a.nextdx.max(0.0);
        }
        (Axis::Y, true) => {
            a.grounded = true;
            a.nextdx *= friction;
            a.dy = 0.0;
            a.nextdy = a.nextdy.min(0.0);
            if let Some(bounce) = bounce {
                a.nextdy = a.nextdy.min(-bounce);
            }
        }
        (Axis::Y, false) => {
            a.dy = 0.0;
            a.nextdy = a.nextdy.max(0.0);
        }
    }
}
