//! Portal variants and the Move/fling protocol
//!
//! Entering a portal spawns a *variant*: a copy of the traveller placed at the
//! target portal and linked from the traveller so it emerges in lockstep while
//! the traveller is swallowed. Dimension and timeline portals first branch a
//! world and then run the same protocol against the branch.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::atom::{
    Atom, AtomRef, Phase, PortalContact, Portals, Promotion, TransitOrigin, UpdateKind,
};
use super::geom::{Axis, Bounds, Travel};
use super::link::{LinkMap, Mapping, Property, link_atom, update_links};
use super::multiverse::{Multiverse, RemoveOptions};
use super::turn::{TurnOptions, turn_atom};
use crate::error::{SimError, SimResult};
use crate::quarter_turns;

/// What a portal does with a traveller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortalKind {
    /// Swallows without producing anything
    Void,
    /// Teleports to the paired portal
    Move,
    /// Branches the current world and teleports into the branch
    Dimension,
    /// Branches the world as it was a while ago
    Pastline,
    /// Same as `Pastline`
    PastNowLine,
    /// Jumps into the world's speculative future
    Futureline,
}

impl PortalKind {
    pub fn name(self) -> &'static str {
        match self {
            PortalKind::Void => "void",
            PortalKind::Move => "move",
            PortalKind::Dimension => "dimension",
            PortalKind::Pastline => "pastline",
            PortalKind::PastNowLine => "pastnowline",
            PortalKind::Futureline => "futureline",
        }
    }
}

/// A traveller crossing a portal along one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crossing {
    pub traveller: AtomRef,
    pub portal: AtomRef,
    pub travel: Travel,
}

/// Outcome of an `enter` hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Accepted,
    /// The crossing must fail (surfaces as an induced transit)
    Rejected,
}

impl PortalKind {
    /// First contact of a traveller with the portal
    pub fn enter(self, mv: &mut Multiverse, crossing: &Crossing) -> SimResult<Entry> {
        log::debug!(
            "{} enters {} portal {}",
            crossing.traveller,
            self.name(),
            crossing.portal
        );
        match self {
            PortalKind::Void => Ok(Entry::Accepted),
            PortalKind::Move => {
                let target = mv.atom(crossing.portal).and_then(|p| p.target);
                if let Some(target) = target {
                    move_enter(mv, crossing, target)?;
                }
                Ok(Entry::Accepted)
            }
            PortalKind::Dimension => enter_dimension(mv, crossing),
            PortalKind::Pastline | PortalKind::PastNowLine => enter_pastline(mv, crossing),
            PortalKind::Futureline => enter_futureline(mv, crossing),
        }
    }

    /// Every tick the traveller keeps moving through
    pub fn move_through(self, crossing: &Crossing) {
        log::trace!("{} moves through {}", crossing.traveller, crossing.portal);
    }

    /// Every tick the traveller keeps sinking in
    pub fn move_in(self, crossing: &Crossing) {
        log::trace!("{} moves into {}", crossing.traveller, crossing.portal);
    }

    /// Every tick a variant keeps emerging
    pub fn move_out(self, variant: AtomRef, portal: AtomRef) {
        log::trace!("{variant} moves out of {portal}");
    }

    /// A variant has fully emerged
    pub fn leave(self, variant: AtomRef, portal: AtomRef) {
        log::debug!("{variant} left {} portal {portal}", self.name());
    }
}

/// Make two portals each other's target
pub fn pair_portals(mv: &mut Multiverse, a: AtomRef, b: AtomRef) -> SimResult<()> {
    mv.atom_mut(a).ok_or(SimError::UnknownAtom(a))?.target = Some(b);
    mv.atom_mut(b).ok_or(SimError::UnknownAtom(b))?.target = Some(a);
    Ok(())
}

/// Spawn the transit variant of `crossing.traveller` at `target`.
///
/// Returns `None` when the target no longer resolves (the portal acts as void).
pub fn move_enter(
    mv: &mut Multiverse,
    crossing: &Crossing,
    target: AtomRef,
) -> SimResult<Option<AtomRef>> {
    let Crossing {
        traveller,
        portal,
        travel,
    } = *crossing;
    let (Some(source), Some(dest), Some(body)) =
        (mv.atom(portal), mv.atom(target), mv.atom(traveller))
    else {
        return Ok(None);
    };

    let fling = quarter_turns(source.turns, dest.turns);
    let offset = match fling {
        0 => straight_offsets(source, dest, &travel),
        1 => flung_offsets(body, source, dest, &travel),
        _ => return Err(SimError::UnimplementedFling(fling)),
    };

    let mut variant = body.clone().detached();
    let extent = travel.axis.size(body);
    variant.cut.set(travel.back(), extent);
    variant.cut.set(travel.front(), 0.0);
    variant.portals = Portals::default();
    variant.update = UpdateKind::None;
    variant.on_promote = Some(Promotion {
        update: body.update,
        grab: body.grab,
        skip_update: true,
    });
    variant.transit = Some(TransitOrigin { portal, fling });

    let variant = mv.insert_atom(target.world, variant)?;
    link_atom(mv, traveller, variant, offset, LinkMap::new())?;
    update_links(mv, traveller);
    turn_atom(mv, variant, i32::from(fling), &TurnOptions::default())?;

    let mut exit = travel;
    for _ in 0..fling {
        exit = exit.rotate_cw();
    }
    if let Some(v) = mv.atom_mut(variant) {
        v.portals.set(
            exit.back(),
            Some(PortalContact {
                portal: target,
                phase: Phase::Exiting,
            }),
        );
    }
    log::debug!("Spawned variant {variant} of {traveller} at {target} (fling {fling})");
    Ok(Some(variant))
}

/// Properties the variant keeps for itself instead of copying the traveller
fn own_shape() -> LinkMap {
    LinkMap::from([
        (Property::Width, Mapping::Own),
        (Property::Height, Mapping::Own),
        (Property::Turns, Mapping::Own),
        (Property::FlipX, Mapping::Own),
    ])
}

/// Same orientation: translate by the portal delta, out through the far face
fn straight_offsets(source: &Atom, dest: &Atom, travel: &Travel) -> LinkMap {
    let axis = travel.axis;
    let other = axis.other();
    let along = axis.position(dest) - axis.position(source) + axis.size(dest) * travel.direction;
    let across = other.position(dest) - other.position(source);

    let mut offset = own_shape();
    offset.insert(position_property(axis), Mapping::Shift(along));
    offset.insert(position_property(other), Mapping::Shift(across));
    offset
}

/// Target a quarter turn clockwise of the source: a rigid rotation mapping the
/// source entry face onto the target exit face
fn flung_offsets(body: &Atom, source: &Atom, dest: &Atom, travel: &Travel) -> LinkMap {
    let source_bounds = Bounds::of(source);
    let dest_bounds = Bounds::of(dest);
    let exit = travel.rotate_cw();

    let entry_face =
        source_bounds.center() - travel.vector() * (travel.axis.size(source) / 2.0);
    let exit_face = dest_bounds.center() + exit.vector() * (exit.axis.size(dest) / 2.0);
    let shift = Vec2::new(
        exit_face.x + entry_face.y - body.height,
        exit_face.y - entry_face.x,
    );

    let mut offset = own_shape();
    offset.insert(
        Property::X,
        Mapping::Affine {
            from: Property::Y,
            scale: -1.0,
            shift: shift.x,
        },
    );
    offset.insert(
        Property::Y,
        Mapping::Affine {
            from: Property::X,
            scale: 1.0,
            shift: shift.y,
        },
    );
    for (to, from, scale) in [
        (Property::Dx, Property::Dy, -1.0),
        (Property::Dy, Property::Dx, 1.0),
        (Property::NextDx, Property::NextDy, -1.0),
        (Property::NextDy, Property::NextDx, 1.0),
    ] {
        offset.insert(
            to,
            Mapping::Affine {
                from,
                scale,
                shift: 0.0,
            },
        );
    }
    offset
}

fn position_property(axis: Axis) -> Property {
    match axis {
        Axis::X => Property::X,
        Axis::Y => Property::Y,
    }
}

fn enter_dimension(mv: &mut Multiverse, crossing: &Crossing) -> SimResult<Entry> {
    let source = crossing.portal.world;
    let world = mv.world(source).ok_or(SimError::UnknownWorld(source))?;
    if world.is_projection {
        return Ok(Entry::Accepted);
    }

    let branch = mv.branch_world(source)?;
    let target = mv.atom(crossing.portal.in_world(branch)).and_then(|p| p.target);
    if let Some(target) = target {
        move_enter(mv, crossing, target)?;
    }

    // The traveller only continues in the branch
    let copy = crossing.traveller.in_world(branch);
    if mv.atom(copy).is_some() {
        mv.remove_atom(copy, RemoveOptions::default())?;
    }
    Ok(Entry::Accepted)
}

fn enter_pastline(mv: &mut Multiverse, crossing: &Crossing) -> SimResult<Entry> {
    let source = crossing.portal.world;
    let lookback = mv.settings.pastline_lookback;
    let world = mv.world(source).ok_or(SimError::UnknownWorld(source))?;
    if !mv.settings.records_past() {
        log::warn!("History is shallower than the pastline lookback of {lookback} ticks");
    }
    if world.is_projection || world.past_projection(lookback).is_none() {
        log::debug!("No past for {} to reach, acting as void", crossing.portal);
        return Ok(Entry::Accepted);
    }

    let branch = mv.allocate_world_id();
    let world = mv.world(source).ok_or(SimError::UnknownWorld(source))?;
    let Some(snapshot) = world.past_projection(lookback) else {
        return Ok(Entry::Accepted);
    };
    let mut past = snapshot.reindexed(branch);
    past.is_projection = true;
    past.projection_skip = 1;
    past.name = format!("{} (past)", world.name);
    // The branch starts its own history from the moment it was entered
    past.save_past_projection(mv.settings.past_projection_depth);
    let branch = mv.add_world(past);

    let target = mv.atom(crossing.portal.in_world(branch)).and_then(|p| p.target);
    if let Some(target) = target {
        move_enter(mv, crossing, target)?;
    }
    if let Some(past_self) = mv.atom_mut(crossing.traveller.in_world(branch)) {
        past_self.variant_parent = Some(crossing.traveller);
    }
    Ok(Entry::Accepted)
}

fn enter_futureline(mv: &mut Multiverse, crossing: &Crossing) -> SimResult<Entry> {
    let source = crossing.portal.world;
    let world = mv.world_mut(source).ok_or(SimError::UnknownWorld(source))?;
    if world.is_projection {
        return Ok(Entry::Accepted);
    }
    let Some(projection) = world.future_projection.take() else {
        log::debug!("No future projection for {source}, acting as void");
        return Ok(Entry::Accepted);
    };

    let mut future = *projection;
    future.is_projection = false;
    mv.save_future_projection(source)?;
    let future = mv.add_world(future);

    let target = mv.atom(crossing.portal.in_world(future)).and_then(|p| p.target);
    if let Some(target) = target {
        move_enter(mv, crossing, target)?;
    }
    if mv.atom(crossing.traveller.in_world(future)).is_none() {
        return Ok(Entry::Rejected);
    }
    Ok(Entry::Accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimSettings;
    use crate::sim::{Side, WorldId};

    /// Traveller heading right at a vertical portal, target portal at x=500
    fn scene(target_turns: u8) -> (Multiverse, Crossing, AtomRef) {
        let mut mv = Multiverse::new(SimSettings::frictionless());
        let world = mv.worlds[0].id;
        let frog = mv
            .insert_atom(world, Atom::mover(10.0, 10.0).at(140.0, 0.0).moving(5.0, 2.0))
            .unwrap();
        let portal = mv
            .insert_atom(
                world,
                Atom::portal(PortalKind::Move, 125.0, 5.0).turned(1).at(150.0, -50.0),
            )
            .unwrap();
        let target = mv
            .insert_atom(
                world,
                Atom::portal(PortalKind::Move, 125.0, 5.0).turned(target_turns).at(500.0, -50.0),
            )
            .unwrap();
        pair_portals(&mut mv, portal, target).unwrap();
        let crossing = Crossing {
            traveller: frog,
            portal,
            travel: Travel::new(Axis::X, 5.0),
        };
        (mv, crossing, target)
    }

    #[test]
    fn test_straight_fling_geometry() {
        let (mut mv, crossing, target) = scene(1);
        let variant = move_enter(&mut mv, &crossing, target).unwrap().unwrap();
        let v = mv.atom(variant).unwrap();
        assert_eq!(v.x, 140.0 + 355.0);
        assert_eq!(v.y, 0.0);
        assert_eq!(v.dx, 5.0);
        assert_eq!(v.turns, 0);
        assert_eq!(v.cut.left, 10.0);
        assert_eq!(v.cut.right, 0.0);
        assert_eq!(v.update, UpdateKind::None);
        assert_eq!(
            v.transit,
            Some(TransitOrigin {
                portal: crossing.portal,
                fling: 0,
            })
        );
        assert_eq!(
            v.portals.get(Side::Left),
            Some(PortalContact {
                portal: target,
                phase: Phase::Exiting,
            })
        );
        assert_eq!(v.parent, Some(crossing.traveller));

        // Lockstep with the traveller
        crate::sim::move_atom(&mut mv, crossing.traveller, 143.0, 7.0).unwrap();
        let v = mv.atom(variant).unwrap();
        assert_eq!((v.x, v.y), (498.0, 7.0));
    }

    #[test]
    fn test_quarter_fling_swaps_velocity() {
        let (mut mv, crossing, target) = scene(2);
        let variant = move_enter(&mut mv, &crossing, target).unwrap().unwrap();
        let v = mv.atom(variant).unwrap();
        // Old velocity (5, 2)
        assert_eq!(v.dx, -2.0);
        assert_eq!(v.dy, 5.0);
        assert_eq!(v.nextdx, -2.0);
        assert_eq!(v.nextdy, 5.0);
        assert_eq!(v.turns, 1);
        // Emerges downward out of the target's bottom face, back cut on top
        assert_eq!(v.cut.top, 10.0);
        assert_eq!(
            v.portals.get(Side::Top),
            Some(PortalContact {
                portal: target,
                phase: Phase::Exiting,
            })
        );
    }

    #[test]
    fn test_quarter_fling_ignores_facing() {
        let (mut mv, crossing, target) = scene(2);
        mv.atom_mut(crossing.traveller).unwrap().flip_x = true;
        let variant = move_enter(&mut mv, &crossing, target).unwrap().unwrap();
        let v = mv.atom(variant).unwrap();
        // Same clockwise turn as an unflipped traveller
        assert_eq!(v.turns, 1);
        assert!(v.flip_x);
        assert_eq!((v.dx, v.dy), (-2.0, 5.0));
        assert_eq!(
            v.portals.get(Side::Top),
            Some(PortalContact {
                portal: target,
                phase: Phase::Exiting,
            })
        );
    }

    #[test]
    fn test_quarter_fling_maps_entry_face_to_exit_face() {
        let (mut mv, crossing, target) = scene(2);
        let variant = move_enter(&mut mv, &crossing, target).unwrap().unwrap();
        let dest = Bounds::of(mv.atom(target).unwrap());
        // Traveller front edge touches the entry face, so the variant sits
        // fully behind the exit face
        let v = mv.atom(variant).unwrap();
        assert_eq!(v.y + v.height, dest.bottom);

        // Five pixels deeper on the source side is five pixels out on the target side
        crate::sim::move_atom(&mut mv, crossing.traveller, 145.0, 0.0).unwrap();
        let v = mv.atom(variant).unwrap();
        assert_eq!(v.y + v.height, dest.bottom + 5.0);

        // Moving down the source face moves left along the target face
        let before = v.x;
        crate::sim::move_atom(&mut mv, crossing.traveller, 145.0, 4.0).unwrap();
        assert_eq!(mv.atom(variant).unwrap().x, before - 4.0);
    }

    #[test]
    fn test_half_and_three_quarter_flings_are_fatal() {
        for turns in [3u8, 0u8] {
            let (mut mv, crossing, target) = scene(turns);
            let fling = quarter_turns(1, turns);
            assert_eq!(
                move_enter(&mut mv, &crossing, target),
                Err(SimError::UnimplementedFling(fling))
            );
            // Nothing was spawned
            assert_eq!(mv.worlds[0].len(), 3);
        }
    }

    #[test]
    fn test_unpaired_move_portal_is_void() {
        let (mut mv, crossing, _) = scene(1);
        mv.atom_mut(crossing.portal).unwrap().target = None;
        assert_eq!(PortalKind::Move.enter(&mut mv, &crossing).unwrap(), Entry::Accepted);
        assert_eq!(mv.worlds[0].len(), 3);
    }

    #[test]
    fn test_dimension_branches_and_drops_the_copy() {
        let (mut mv, crossing, _) = scene(1);
        mv.atom_mut(crossing.portal).unwrap().portal = Some(PortalKind::Dimension);
        let entry = PortalKind::Dimension.enter(&mut mv, &crossing).unwrap();
        assert_eq!(entry, Entry::Accepted);
        assert_eq!(mv.worlds.len(), 2);
        let branch = mv.worlds[1].id;
        // The traveller stays home, its copy in the branch is gone, the variant is there
        assert!(mv.atom(crossing.traveller).is_some());
        assert!(mv.atom(crossing.traveller.in_world(branch)).is_none());
        let link = &mv.atom(crossing.traveller).unwrap().links[0];
        assert_eq!(link.child.world, branch);
    }

    #[test]
    fn test_dimension_in_projection_is_void() {
        let (mut mv, crossing, _) = scene(1);
        mv.worlds[0].is_projection = true;
        PortalKind::Dimension.enter(&mut mv, &crossing).unwrap();
        assert_eq!(mv.worlds.len(), 1);
        assert!(mv.atom(crossing.traveller).unwrap().links.is_empty());
    }

    #[test]
    fn test_pastline_without_history_is_void() {
        let (mut mv, crossing, _) = scene(1);
        assert_eq!(PortalKind::Pastline.enter(&mut mv, &crossing).unwrap(), Entry::Accepted);
        assert_eq!(mv.worlds.len(), 1);
        assert!(mv.atom(crossing.traveller).unwrap().links.is_empty());
    }

    #[test]
    fn test_pastline_branches_the_past() {
        let (mut mv, crossing, _) = scene(1);
        let lookback = mv.settings.pastline_lookback;
        let depth = mv.settings.past_projection_depth;
        for tick in 0..=lookback {
            mv.atom_mut(crossing.traveller).unwrap().y = tick as f32;
            mv.worlds[0].save_past_projection(depth);
        }
        mv.atom_mut(crossing.traveller).unwrap().y = 0.0;

        PortalKind::Pastline.enter(&mut mv, &crossing).unwrap();
        assert_eq!(mv.worlds.len(), 2);
        let past = &mv.worlds[1];
        assert!(past.is_projection);
        assert_eq!(past.projection_skip, 1);
        assert_eq!(past.past_projections.len(), 1);
        let past_self = past.get(crossing.traveller.atom).unwrap();
        // The oldest snapshot
        assert_eq!(past_self.y, 0.0);
        assert_eq!(past_self.variant_parent, Some(crossing.traveller));
        // The variant arrived in the past
        let link = &mv.atom(crossing.traveller).unwrap().links[0];
        assert_eq!(link.child.world, past.id);
    }

    #[test]
    fn test_pastline_in_projection_is_void() {
        let (mut mv, crossing, _) = scene(1);
        let depth = mv.settings.past_projection_depth;
        for _ in 0..depth {
            mv.worlds[0].save_past_projection(depth);
        }
        mv.worlds[0].is_projection = true;
        assert_eq!(PortalKind::Pastline.enter(&mut mv, &crossing).unwrap(), Entry::Accepted);
        assert_eq!(mv.worlds.len(), 1);
        assert!(mv.atom(crossing.traveller).unwrap().links.is_empty());
    }

    #[test]
    fn test_futureline_without_projection_is_void() {
        let (mut mv, crossing, _) = scene(1);
        PortalKind::Futureline.enter(&mut mv, &crossing).unwrap();
        assert_eq!(mv.worlds.len(), 1);
    }

    #[test]
    fn test_futureline_promotes_projection() {
        let (mut mv, crossing, _) = scene(1);
        let world = mv.worlds[0].id;
        mv.save_future_projection(world).unwrap();
        let first = mv.worlds[0].future_projection.as_ref().unwrap().id;

        let entry = PortalKind::Futureline.enter(&mut mv, &crossing).unwrap();
        assert_eq!(mv.worlds.len(), 2);
        let future = &mv.worlds[1];
        assert_eq!(future.id, first);
        assert!(!future.is_projection);
        // A fresh projection replaced the consumed one
        let fresh = mv.worlds[0].future_projection.as_ref().unwrap();
        assert_ne!(fresh.id, first);
        // Whether the traveller still exists in the future decides the outcome
        let expected = if future.contains(crossing.traveller.atom) {
            Entry::Accepted
        } else {
            Entry::Rejected
        };
        assert_eq!(entry, expected);
    }

    #[test]
    fn test_futureline_rejects_when_traveller_has_no_future() {
        let (mut mv, crossing, _) = scene(1);
        let world = mv.worlds[0].id;
        let projection_id = WorldId(77);
        let mut future = mv.worlds[0].reindexed(projection_id);
        future.is_projection = true;
        future.take_atom(crossing.traveller.atom);
        mv.worlds[0].future_projection = Some(Box::new(future));

        let entry = PortalKind::Futureline.enter(&mut mv, &crossing).unwrap();
        assert_eq!(entry, Entry::Rejected);
        assert!(mv.world(projection_id).is_some());
        assert!(mv.world(world).unwrap().future_projection.is_some());
    }
}
