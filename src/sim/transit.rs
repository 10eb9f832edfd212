//! Portal crossing state machine
//!
//! A traveller touching a portal face registers an `Entering` contact on its
//! leading side and the portal's `enter` hook spawns the variant. Every further
//! tick the leading cut grows by the penetration depth until the traveller is
//! cut away completely and removed. Variants carry an `Exiting` contact whose
//! trailing cut shrinks as they emerge.

use serde::{Deserialize, Serialize};

use super::atom::{AtomRef, Phase, PortalContact, WorldId};
use super::geom::{Axis, Bounds, Side, Travel};
use super::link::update_links;
use super::multiverse::{Multiverse, RemoveOptions};
use super::portal::{Crossing, Entry, PortalKind};
use crate::error::{SimError, SimResult};

/// Result of a traveller touching a portal during one movement step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transit {
    /// Keep moving, the portal doesn't block
    Continue,
    /// The portal acts as a solid
    Blocked,
    /// The portal's `enter` hook failed the crossing
    Induced,
    /// The traveller was swallowed whole and removed from its world
    Consumed,
}

/// Resolve a traveller touching `portal` while moving along `travel`.
///
/// `next` is the traveller's bounds after this step; `hit_something` is set
/// when a solid already blocked the step.
pub fn collided_portal(
    mv: &mut Multiverse,
    traveller: AtomRef,
    portal: AtomRef,
    travel: Travel,
    next: Bounds,
    hit_something: bool,
) -> SimResult<Transit> {
    let gate = mv.atom(portal).ok_or(SimError::UnknownAtom(portal))?;
    let kind = gate.portal.unwrap_or(PortalKind::Void);
    let gate_bounds = Bounds::of(gate);
    if gate.is_horizontal() != travel.is_vertical() {
        return Ok(Transit::Blocked);
    }

    let front = travel.front();
    let body = mv.atom_mut(traveller).ok_or(SimError::UnknownAtom(traveller))?;
    let crossing = Crossing {
        traveller,
        portal,
        travel,
    };
    let mut induced = false;

    match body.portals.get(front) {
        Some(contact) if contact.portal != portal => {
            return Err(SimError::DoublePortal {
                atom: traveller,
                side: front,
            });
        }
        None => {
            if hit_something {
                return Ok(Transit::Blocked);
            }
            if body.cut.get(front) < 0.0 {
                body.cut.set(front, 0.0);
                return Ok(Transit::Continue);
            }
            body.portals.set(
                front,
                Some(PortalContact {
                    portal,
                    phase: Phase::Entering,
                }),
            );
            if kind.enter(mv, &crossing)? == Entry::Rejected {
                induced = true;
            }
        }
        Some(_) => {
            let depth = travel.direction * (next.edge(front) - gate_bounds.edge(travel.back()));
            let extent = travel.axis.size(body);
            let advance = next.edge(front) - Bounds::of(body).edge(front);
            let cut = body.cut.get_mut(front);
            *cut += depth;
            if *cut >= extent {
                // Finish the step so the variant lands where the link puts it
                match travel.axis {
                    Axis::X => body.x += advance,
                    Axis::Y => body.y += advance,
                }
                update_links(mv, traveller);
                log::debug!("{traveller} fully swallowed by {portal}");
                mv.remove_atom(traveller, RemoveOptions::destroy())?;
                return Ok(Transit::Consumed);
            }
            if *cut < 0.0 {
                *cut = 0.0;
                return Ok(Transit::Continue);
            }
        }
    }

    kind.move_through(&crossing);
    kind.move_in(&crossing);

    if induced {
        Ok(Transit::Induced)
    } else {
        Ok(Transit::Continue)
    }
}

/// Give up on a crossing: clear the registration and drop the variant it spawned
pub fn abandon_transit(mv: &mut Multiverse, traveller: AtomRef, portal: AtomRef) -> SimResult<()> {
    let Some(body) = mv.atom_mut(traveller) else {
        return Ok(());
    };
    body.portals.forget(portal);
    let variants: Vec<AtomRef> = body.links.iter().map(|l| l.child).collect();
    for child in variants {
        let spawned_here = mv
            .atom(child)
            .and_then(|c| c.transit)
            .is_some_and(|origin| origin.portal == portal);
        if spawned_here {
            let options = RemoveOptions {
                including_children: true,
                destroy: true,
            };
            mv.remove_atom(child, options)?;
        }
    }
    log::debug!("{traveller} abandoned its crossing of {portal}");
    Ok(())
}

/// Re-derive transit cuts from geometry after a world has been updated.
///
/// The cut on a contact side is how far the atom's nominal edge reaches past
/// the portal face it is crossing. Exiting contacts clear once the variant is
/// fully out; entering contacts the traveller backed out of are abandoned.
pub fn settle_contacts(mv: &mut Multiverse, world: WorldId) -> SimResult<()> {
    let w = mv.world(world).ok_or(SimError::UnknownWorld(world))?;
    let busy: Vec<AtomRef> = w
        .iter()
        .filter(|a| !a.portals.is_empty())
        .map(|a| w.atom_ref(a.id))
        .collect();

    for atom in busy {
        let contacts: Vec<(Side, PortalContact)> = match mv.atom(atom) {
            Some(a) => a.portals.iter().collect(),
            None => continue,
        };
        for (side, contact) in contacts {
            settle_contact(mv, atom, side, contact)?;
        }
    }
    Ok(())
}

fn settle_contact(
    mv: &mut Multiverse,
    atom: AtomRef,
    side: Side,
    contact: PortalContact,
) -> SimResult<()> {
    let Some(gate) = mv.atom(contact.portal) else {
        // Portal destroyed under us
        return match contact.phase {
            Phase::Entering => abandon_transit(mv, atom, contact.portal),
            Phase::Exiting => {
                if let Some(a) = mv.atom_mut(atom) {
                    a.portals.set(side, None);
                }
                Ok(())
            }
        };
    };
    let kind = gate.portal.unwrap_or(PortalKind::Void);
    let face = Bounds::of(gate);
    let Some(a) = mv.atom_mut(atom) else {
        return Ok(());
    };

    let extent = side.axis().size(a);
    let edge = Bounds::nominal(a).edge(side);
    let depth = (side.sign() * (edge - face.edge(side.opposite()))).clamp(0.0, extent);
    a.cut.set(side, depth);

    match contact.phase {
        Phase::Exiting => {
            if depth <= 0.0 {
                a.portals.set(side, None);
                kind.move_out(atom, contact.portal);
                kind.leave(atom, contact.portal);
            } else {
                kind.move_out(atom, contact.portal);
            }
        }
        Phase::Entering => {
            if depth <= 0.0 && !Bounds::of(a).overlaps(&face) {
                abandon_transit(mv, atom, contact.portal)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimSettings;
    use crate::sim::{Atom, pair_portals};
    use glam::Vec2;

    struct Scene {
        mv: Multiverse,
        frog: AtomRef,
        portal: AtomRef,
        target: AtomRef,
    }

    /// A 10x10 traveller left of a vertical portal at x=150, paired with x=500
    fn scene(x: f32) -> Scene {
        let mut mv = Multiverse::new(SimSettings::frictionless());
        let world = mv.worlds[0].id;
        let frog = mv
            .insert_atom(world, Atom::mover(10.0, 10.0).at(x, 0.0).moving(5.0, 0.0))
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
                Atom::portal(PortalKind::Move, 125.0, 5.0).turned(1).at(500.0, -50.0),
            )
            .unwrap();
        pair_portals(&mut mv, portal, target).unwrap();
        Scene {
            mv,
            frog,
            portal,
            target,
        }
    }

    fn step(s: &mut Scene, dx: f32) -> Transit {
        let travel = Travel::new(Axis::X, dx);
        let next = Bounds::of(s.mv.atom(s.frog).unwrap()).shifted(travel.vector() * dx.abs());
        let result = collided_portal(&mut s.mv, s.frog, s.portal, travel, next, false).unwrap();
        if result == Transit::Continue {
            s.mv.atom_mut(s.frog).unwrap().x += dx;
            update_links(&mut s.mv, s.frog);
        }
        result
    }

    #[test]
    fn test_wrong_axis_is_blocked() {
        let mut s = scene(140.0);
        let travel = Travel::new(Axis::Y, 1.0);
        let next = Bounds::of(s.mv.atom(s.frog).unwrap());
        let result = collided_portal(&mut s.mv, s.frog, s.portal, travel, next, false).unwrap();
        assert_eq!(result, Transit::Blocked);
        assert!(s.mv.atom(s.frog).unwrap().portals.is_empty());
    }

    #[test]
    fn test_new_contact_after_solid_hit_is_blocked() {
        let mut s = scene(135.0);
        let travel = Travel::new(Axis::X, 5.0);
        let next = Bounds::of(s.mv.atom(s.frog).unwrap()).shifted(travel.vector() * 5.0);
        let result = collided_portal(&mut s.mv, s.frog, s.portal, travel, next, true).unwrap();
        assert_eq!(result, Transit::Blocked);
    }

    #[test]
    fn test_full_consumption_at_exact_extent() {
        // Front edge reaches the portal face on the first step
        let mut s = scene(135.0);
        assert_eq!(step(&mut s, 5.0), Transit::Continue);
        let frog = s.mv.atom(s.frog).unwrap();
        assert_eq!(frog.cut.right, 0.0);
        assert_eq!(
            frog.portals.get(Side::Right),
            Some(PortalContact {
                portal: s.portal,
                phase: Phase::Entering,
            })
        );
        let variant = frog.links[0].child;

        assert_eq!(step(&mut s, 5.0), Transit::Continue);
        assert_eq!(s.mv.atom(s.frog).unwrap().cut.right, 5.0);

        assert_eq!(step(&mut s, 4.0), Transit::Continue);
        assert_eq!(s.mv.atom(s.frog).unwrap().cut.right, 9.0);

        assert_eq!(step(&mut s, 1.0), Transit::Consumed);
        assert!(s.mv.atom(s.frog).is_none());
        // The variant carries on on its own
        let v = s.mv.atom(variant).unwrap();
        assert_eq!(v.parent, None);
        assert_eq!(v.update, crate::sim::UpdateKind::Mover);
    }

    #[test]
    fn test_pushed_back_contact_clamps_to_zero() {
        let mut s = scene(135.0);
        step(&mut s, 5.0);
        step(&mut s, 2.0);
        assert_eq!(s.mv.atom(s.frog).unwrap().cut.right, 2.0);
        // Still heading right, but something shoved the front edge back off the face
        let travel = Travel::new(Axis::X, 1.0);
        let next = Bounds::of(s.mv.atom(s.frog).unwrap()).shifted(Vec2::new(-5.0, 0.0));
        let result = collided_portal(&mut s.mv, s.frog, s.portal, travel, next, false).unwrap();
        assert_eq!(result, Transit::Continue);
        assert_eq!(s.mv.atom(s.frog).unwrap().cut.right, 0.0);
    }

    #[test]
    fn test_second_portal_on_same_side_is_fatal() {
        let mut s = scene(135.0);
        step(&mut s, 5.0);
        let world = s.frog.world;
        let intruder = s
            .mv
            .insert_atom(
                world,
                Atom::portal(PortalKind::Void, 125.0, 5.0).turned(1).at(150.0, -50.0),
            )
            .unwrap();
        let before = s.mv.atom(s.frog).unwrap().clone();
        let travel = Travel::new(Axis::X, 5.0);
        let next = Bounds::of(&before).shifted(travel.vector() * 5.0);
        assert_eq!(
            collided_portal(&mut s.mv, s.frog, intruder, travel, next, false),
            Err(SimError::DoublePortal {
                atom: s.frog,
                side: Side::Right,
            })
        );
        let after = s.mv.atom(s.frog).unwrap();
        assert_eq!(after.portals, before.portals);
        assert_eq!(after.cut, before.cut);
    }

    #[test]
    fn test_rejected_entry_is_induced() {
        let mut s = scene(135.0);
        let world = s.frog.world;
        s.mv.atom_mut(s.portal).unwrap().portal = Some(PortalKind::Futureline);
        let mut future = s.mv.worlds[0].reindexed(WorldId(50));
        future.take_atom(s.frog.atom);
        s.mv.world_mut(world).unwrap().future_projection = Some(Box::new(future));
        assert_eq!(step(&mut s, 5.0), Transit::Induced);
    }

    #[test]
    fn test_settle_tracks_emerging_variant() {
        let mut s = scene(135.0);
        let world = s.frog.world;
        step(&mut s, 5.0);
        let variant = s.mv.atom(s.frog).unwrap().links[0].child;
        settle_contacts(&mut s.mv, world).unwrap();
        assert_eq!(s.mv.atom(variant).unwrap().cut.left, 10.0);

        step(&mut s, 3.0);
        settle_contacts(&mut s.mv, world).unwrap();
        let v = s.mv.atom(variant).unwrap();
        assert_eq!(v.cut.left, 7.0);
        // Visible part starts at the exit face
        assert_eq!(Bounds::of(v).left, Bounds::of(s.mv.atom(s.target).unwrap()).right);

        step(&mut s, 7.0);
        settle_contacts(&mut s.mv, world).unwrap();
        let v = s.mv.atom(variant).unwrap();
        assert_eq!(v.cut.left, 0.0);
        assert!(v.portals.is_empty());
    }

    #[test]
    fn test_settle_abandons_retreat() {
        let mut s = scene(135.0);
        let world = s.frog.world;
        step(&mut s, 5.0);
        assert_eq!(s.mv.worlds[0].len(), 4);
        // Pull back out of reach without going through the portal logic
        s.mv.atom_mut(s.frog).unwrap().x = 100.0;
        update_links(&mut s.mv, s.frog);
        settle_contacts(&mut s.mv, world).unwrap();
        let frog = s.mv.atom(s.frog).unwrap();
        assert!(frog.portals.is_empty());
        assert!(frog.links.is_empty());
        assert_eq!(s.mv.worlds[0].len(), 3);
    }

    #[test]
    fn test_settle_keeps_touching_contact() {
        let mut s = scene(135.0);
        let world = s.frog.world;
        step(&mut s, 5.0);
        settle_contacts(&mut s.mv, world).unwrap();
        let frog = s.mv.atom(s.frog).unwrap();
        assert_eq!(frog.cut.right, 0.0);
        assert!(!frog.portals.is_empty());
    }
}
