//! Update and grab behaviours
//!
//! Both are closed variant sets on the atom ([`UpdateKind`], [`GrabKind`]),
//! dispatched here.

use glam::Vec2;

use super::atom::{AtomRef, GrabKind, UpdateKind};
use super::link::update_links;
use super::multiverse::Multiverse;
use super::portal::pair_portals;
use super::tick::{TickReport, update_mover};
use super::turn::{TurnOptions, flip_atom, turn_atom};
use crate::consts::BEING_REST_SPEED;
use crate::error::{SimError, SimResult};

/// Run one tick of an atom's update behaviour
pub fn update_atom(mv: &mut Multiverse, atom: AtomRef, report: &mut TickReport) -> SimResult<()> {
    let Some(a) = mv.atom_mut(atom) else {
        return Ok(());
    };
    match a.update {
        UpdateKind::Static => {
            a.dx = 0.0;
            a.dy = 0.0;
            a.nextdx = 0.0;
            a.nextdy = 0.0;
            Ok(())
        }
        UpdateKind::None => Ok(()),
        UpdateKind::Mover => update_mover(mv, atom, report),
        UpdateKind::MoverBeing => update_being(mv, atom, report),
    }
}

/// A mover that faces where it's going and hops now and then. A being that has
/// been knocked over rights itself instead of hopping.
fn update_being(mv: &mut Multiverse, atom: AtomRef, report: &mut TickReport) -> SimResult<()> {
    update_mover(mv, atom, report)?;
    let jump_interval = mv.settings.jump_interval;
    let Some(a) = mv.atom_mut(atom) else {
        // Swallowed by a portal
        return Ok(());
    };

    if (a.flip_x && a.dx < -BEING_REST_SPEED) || (!a.flip_x && a.dx > BEING_REST_SPEED) {
        flip_atom(a);
    }

    // Only time spent standing still on the ground counts towards a hop
    let resting = a.nextdx.abs() < BEING_REST_SPEED && a.grounded;
    if !resting || a.jump_tick <= jump_interval {
        if resting {
            a.jump_tick += 1;
        }
        update_links(mv, atom);
        return Ok(());
    }

    let facing = if a.flip_x { 1.0 } else { -1.0 };
    let turns = a.turns;
    let (nextdx, nextdy) = if turns != 0 {
        turn_atom(mv, atom, -i32::from(turns), &TurnOptions::checked())?;
        (facing, -2.0)
    } else {
        (facing * 3.0, -10.0)
    };
    if let Some(a) = mv.atom_mut(atom) {
        a.nextdx = nextdx;
        a.nextdy = nextdy;
        a.jump_tick = 0;
    }
    update_links(mv, atom);
    Ok(())
}

/// Resolve what a pointer grab on `atom` picks up.
///
/// `offset` is the hand's offset from the pointer to the picked atom's origin
/// and is adjusted when the grab is redirected to another atom.
pub fn grab_atom(
    mv: &mut Multiverse,
    atom: AtomRef,
    offset: &mut Vec2,
) -> SimResult<Option<AtomRef>> {
    let a = mv.atom(atom).ok_or(SimError::UnknownAtom(atom))?;
    match a.grab {
        GrabKind::Drag => {
            if !a.portals.is_empty() {
                log::debug!("{atom} is mid-transit, refusing grab");
                return Ok(None);
            }
            if a.is_portal() && portal_in_use(mv, atom) {
                log::debug!("Portal {atom} is occupied, refusing grab");
                return Ok(None);
            }
            Ok(Some(atom))
        }
        GrabKind::Static => Ok(None),
        GrabKind::Spawner => spawn(mv, atom),
        GrabKind::SpawnerPortal => {
            let Some(spawned) = spawn(mv, atom)? else {
                return Ok(None);
            };
            if let Some(partner) = unpaired_partner(mv, spawned) {
                pair_portals(mv, partner, spawned)?;
                log::info!("Paired {spawned} with {partner}");
            }
            Ok(Some(spawned))
        }
        GrabKind::Linkee => {
            let Some(parent) = a.parent else {
                return Ok(None);
            };
            let own = Vec2::new(a.x, a.y);
            let p = mv.atom(parent).ok_or(SimError::UnknownAtom(parent))?;
            *offset -= own - Vec2::new(p.x, p.y);
            grab_atom(mv, parent, offset)
        }
    }
}

/// Whether some atom anywhere is mid-transit through `portal`
fn portal_in_use(mv: &Multiverse, portal: AtomRef) -> bool {
    mv.worlds
        .iter()
        .chain(std::iter::once(&mv.void))
        .flat_map(|w| w.iter())
        .any(|a| a.portals.side_of(portal).is_some())
}

/// Copy the spawner's prototype onto the spawner
fn spawn(mv: &mut Multiverse, spawner: AtomRef) -> SimResult<Option<AtomRef>> {
    let s = mv.atom(spawner).ok_or(SimError::UnknownAtom(spawner))?;
    let Some(prototype) = s.spawn.as_deref() else {
        log::warn!("Spawner {spawner} has nothing to spawn");
        return Ok(None);
    };
    let fresh = prototype.clone().detached().at(s.x, s.y);
    let spawned = mv.insert_atom(spawner.world, fresh)?;
    log::debug!("{spawner} spawned {spawned}");
    Ok(Some(spawned))
}

/// Most recently added portal of the same kind in the same world still waiting
/// for a partner
fn unpaired_partner(mv: &Multiverse, portal: AtomRef) -> Option<AtomRef> {
    let kind = mv.atom(portal)?.portal?;
    let world = mv.world(portal.world)?;
    world
        .order
        .iter()
        .rev()
        .filter_map(|&id| world.get(id))
        .find(|a| a.id != portal.atom && a.portal == Some(kind) && a.target.is_none())
        .map(|a| world.atom_ref(a.id))
}
