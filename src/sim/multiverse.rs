//! The multiverse: every world, the void, and cross-world atom resolution
//!
//! Worlds are only ever appended. An [`AtomRef`] resolves through here, so a
//! transit variant in one world can be driven by a traveller in another.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::atom::{Atom, AtomRef, WorldId};
use super::link::{subtree, update_links};
use super::tick::{TickInput, tick};
use super::world::World;
use crate::error::{SimError, SimResult};
use crate::settings::SimSettings;

/// Options for [`Multiverse::remove_atom`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOptions {
    /// Remove the whole link subtree instead of promoting the children
    pub including_children: bool,
    /// Also clear portal contacts and portal targets that point at the atom
    pub destroy: bool,
}

impl RemoveOptions {
    pub fn destroy() -> Self {
        Self {
            including_children: false,
            destroy: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Multiverse {
    pub worlds: Vec<World>,
    /// Sink for everything addressed outside the world grid
    pub void: World,
    pub settings: SimSettings,
    next_world_id: u64,
    /// Completed ticks
    pub time_ticks: u64,
}

impl Multiverse {
    /// One empty world
    pub fn new(settings: SimSettings) -> Self {
        Self {
            worlds: vec![World::new(WorldId(1), "world 1")],
            void: World::void(),
            settings,
            next_world_id: 2,
            time_ticks: 0,
        }
    }

    /// A private multiverse holding a single world, used to run projections ahead
    fn sandbox(world: World, settings: SimSettings, next_world_id: u64) -> Self {
        Self {
            worlds: vec![world],
            void: World::void(),
            settings,
            next_world_id,
            time_ticks: 0,
        }
    }

    pub fn allocate_world_id(&mut self) -> WorldId {
        let id = WorldId(self.next_world_id);
        self.next_world_id += 1;
        id
    }

    pub fn world(&self, id: WorldId) -> Option<&World> {
        if id == WorldId::VOID {
            return Some(&self.void);
        }
        self.worlds.iter().find(|w| w.id == id)
    }

    pub fn world_mut(&mut self, id: WorldId) -> Option<&mut World> {
        if id == WorldId::VOID {
            return Some(&mut self.void);
        }
        self.worlds.iter_mut().find(|w| w.id == id)
    }

    pub fn atom(&self, atom: AtomRef) -> Option<&Atom> {
        self.world(atom.world)?.get(atom.atom)
    }

    pub fn atom_mut(&mut self, atom: AtomRef) -> Option<&mut Atom> {
        self.world_mut(atom.world)?.get_mut(atom.atom)
    }

    /// Add an atom to a world
    pub fn insert_atom(&mut self, world: WorldId, atom: Atom) -> SimResult<AtomRef> {
        let world = self.world_mut(world).ok_or(SimError::UnknownWorld(world))?;
        Ok(world.add_atom(atom))
    }

    /// Register a world; it is ticked from the next cycle on
    pub fn add_world(&mut self, mut world: World) -> WorldId {
        if world.id == WorldId::VOID || self.world(world.id).is_some() {
            world.id = self.allocate_world_id();
        }
        let id = world.id;
        log::info!("Added world {} ({}), {} worlds", id, world.name, self.worlds.len() + 1);
        self.worlds.push(world);
        id
    }

    /// Copy a world under a fresh id and register the copy
    pub fn branch_world(&mut self, source: WorldId) -> SimResult<WorldId> {
        let id = self.allocate_world_id();
        let clone = self
            .world(source)
            .ok_or(SimError::UnknownWorld(source))?
            .reindexed(id);
        Ok(self.add_world(clone))
    }

    /// Take an atom out of its world.
    ///
    /// The atom is detached from its owner. Its children are removed too, or
    /// promoted to independent atoms when `including_children` is off.
    pub fn remove_atom(&mut self, atom: AtomRef, options: RemoveOptions) -> SimResult<Atom> {
        let world = self.world_mut(atom.world).ok_or(SimError::UnknownWorld(atom.world))?;
        let removed = world.take_atom(atom.atom).ok_or(SimError::UnknownAtom(atom))?;

        if let Some(owner) = removed.parent.and_then(|p| self.atom_mut(p)) {
            owner.links.retain(|l| l.child != atom);
        }

        for link in &removed.links {
            if options.including_children {
                if self.atom(link.child).is_some() {
                    self.remove_atom(link.child, options)?;
                }
            } else if let Some(child) = self.atom_mut(link.child) {
                child.promote();
            }
        }

        if options.destroy {
            self.forget(atom);
        }
        log::trace!("Removed {atom}");
        Ok(removed)
    }

    /// Drop every portal contact and portal target pointing at `atom`
    fn forget(&mut self, atom: AtomRef) {
        let worlds = self.worlds.iter_mut().chain(std::iter::once(&mut self.void));
        for world in worlds {
            for other in world.atoms.values_mut() {
                other.portals.forget(atom);
                if other.target == Some(atom) {
                    other.target = None;
                }
            }
        }
    }

    /// Resolve a canvas point to a world and a point local to it.
    ///
    /// Worlds are laid out row-major, `columns` per row. Points off the grid land
    /// in the void, unchanged.
    pub fn address(&self, point: Vec2, columns: usize) -> (WorldId, Vec2) {
        let (width, height) = (self.settings.world_width, self.settings.world_height);
        if point.x < 0.0 || point.y < 0.0 || columns == 0 {
            return (WorldId::VOID, point);
        }
        let column = (point.x / width).floor() as usize;
        let row = (point.y / height).floor() as usize;
        if column >= columns {
            return (WorldId::VOID, point);
        }
        match self.worlds.get(row * columns + column) {
            Some(world) => {
                let local = point - Vec2::new(column as f32 * width, row as f32 * height);
                (world.id, local)
            }
            None => (WorldId::VOID, point),
        }
    }

    /// Move an atom and its link subtree into another world. Atoms get fresh ids
    /// there; portal targets elsewhere are rewritten to follow.
    pub fn move_to_world(&mut self, atom: AtomRef, world: WorldId) -> SimResult<AtomRef> {
        if atom.world == world {
            return Ok(atom);
        }
        if self.world(world).is_none() {
            return Err(SimError::UnknownWorld(world));
        }
        let members = subtree(self, atom);
        if let Some(owner) = self.atom(atom).and_then(|a| a.parent) {
            super::link::unlink_atom(self, owner, atom);
        }

        let mut moved = Vec::with_capacity(members.len());
        for member in members {
            if member.world != atom.world {
                continue;
            }
            let taken = self.world_mut(member.world).and_then(|w| w.take_atom(member.atom));
            if let Some(taken) = taken {
                moved.push((member, taken));
            }
        }

        let mut renamed = HashMap::new();
        let dest = self.world_mut(world).ok_or(SimError::UnknownWorld(world))?;
        let mut inserted = Vec::with_capacity(moved.len());
        for (old, taken) in moved {
            let new = dest.add_atom(taken);
            renamed.insert(old, new);
            inserted.push(new);
        }

        let rename = |r: &mut AtomRef| {
            if let Some(new) = renamed.get(r) {
                *r = *new;
            }
        };
        for &new in &inserted {
            if let Some(a) = self.atom_mut(new) {
                if let Some(p) = a.parent.as_mut() {
                    rename(p);
                }
                for link in &mut a.links {
                    rename(&mut link.child);
                }
            }
        }
        let worlds = self.worlds.iter_mut().chain(std::iter::once(&mut self.void));
        for w in worlds {
            for other in w.atoms.values_mut() {
                if let Some(t) = other.target.as_mut() {
                    rename(t);
                }
            }
        }

        let moved_root = renamed.get(&atom).copied().ok_or(SimError::UnknownAtom(atom))?;
        update_links(self, moved_root);
        log::debug!("Moved {atom} to {moved_root}");
        Ok(moved_root)
    }

    /// Compute a fresh future projection for a world: a branch advanced
    /// `future_lookahead` ticks ahead in a sandbox
    pub fn save_future_projection(&mut self, id: WorldId) -> SimResult<()> {
        let lookahead = self.settings.future_lookahead;
        if lookahead == 0 {
            return Ok(());
        }
        let projection_id = self.allocate_world_id();
        let source = self.world(id).ok_or(SimError::UnknownWorld(id))?;
        let mut projection = source.reindexed(projection_id);
        projection.is_projection = true;
        projection.name = format!("{} (future)", source.name);

        let projection = self.advance_projection(projection, lookahead)?;
        let world = self.world_mut(id).ok_or(SimError::UnknownWorld(id))?;
        world.future_projection = Some(Box::new(projection));
        log::debug!("Saved future projection {projection_id} for {id}");
        Ok(())
    }

    /// Run a detached world forward without touching this multiverse
    pub fn advance_projection(&self, world: World, ticks: u32) -> SimResult<World> {
        let id = world.id;
        let mut sandbox = Self::sandbox(world, self.settings.for_projection(), self.next_world_id);
        let input = TickInput::default();
        for _ in 0..ticks {
            tick(&mut sandbox, &input)?;
        }
        sandbox
            .worlds
            .into_iter()
            .find(|w| w.id == id)
            .ok_or(SimError::UnknownWorld(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{
        GrabKind, LinkMap, Mapping, Phase, PortalContact, PortalKind, Promotion, Property, Side,
        UpdateKind, link_atom,
    };

    fn setup() -> (Multiverse, WorldId) {
        let mv = Multiverse::new(SimSettings::frictionless());
        let world = mv.worlds[0].id;
        (mv, world)
    }

    #[test]
    fn test_remove_promotes_children() {
        let (mut mv, world) = setup();
        let owner = mv.insert_atom(world, Atom::new(10.0, 10.0)).unwrap();
        let kid = mv
            .insert_atom(world, Atom::new(5.0, 5.0).with_update(UpdateKind::None))
            .unwrap();
        link_atom(&mut mv, owner, kid, LinkMap::new(), LinkMap::new()).unwrap();
        mv.atom_mut(kid).unwrap().on_promote = Some(Promotion {
            update: UpdateKind::Mover,
            grab: GrabKind::Drag,
            skip_update: true,
        });

        let removed = mv.remove_atom(owner, RemoveOptions::default()).unwrap();
        assert_eq!(removed.links.len(), 1);
        let kid_atom = mv.atom(kid).unwrap();
        assert_eq!(kid_atom.parent, None);
        assert_eq!(kid_atom.update, UpdateKind::Mover);
        assert!(kid_atom.skip_update);
        assert_eq!(mv.worlds[0].roots(), vec![kid.atom]);
    }

    #[test]
    fn test_remove_including_children() {
        let (mut mv, world) = setup();
        let owner = mv.insert_atom(world, Atom::new(10.0, 10.0)).unwrap();
        let kid = mv.insert_atom(world, Atom::new(5.0, 5.0)).unwrap();
        let grandkid = mv.insert_atom(world, Atom::new(5.0, 5.0)).unwrap();
        link_atom(&mut mv, owner, kid, LinkMap::new(), LinkMap::new()).unwrap();
        link_atom(&mut mv, kid, grandkid, LinkMap::new(), LinkMap::new()).unwrap();
        let options = RemoveOptions {
            including_children: true,
            destroy: false,
        };
        mv.remove_atom(owner, options).unwrap();
        assert!(mv.worlds[0].is_empty());
    }

    #[test]
    fn test_remove_child_detaches_from_owner() {
        let (mut mv, world) = setup();
        let owner = mv.insert_atom(world, Atom::new(10.0, 10.0)).unwrap();
        let kid = mv.insert_atom(world, Atom::new(5.0, 5.0)).unwrap();
        link_atom(&mut mv, owner, kid, LinkMap::new(), LinkMap::new()).unwrap();
        mv.remove_atom(kid, RemoveOptions::default()).unwrap();
        assert!(mv.atom(owner).unwrap().links.is_empty());
    }

    #[test]
    fn test_destroy_clears_contacts_and_targets() {
        let (mut mv, world) = setup();
        let portal = mv.insert_atom(world, Atom::portal(PortalKind::Move, 50.0, 5.0)).unwrap();
        let other = mv.insert_atom(world, Atom::portal(PortalKind::Move, 50.0, 5.0)).unwrap();
        let frog = mv.insert_atom(world, Atom::mover(10.0, 10.0)).unwrap();
        mv.atom_mut(other).unwrap().target = Some(portal);
        let contact = PortalContact {
            portal,
            phase: Phase::Entering,
        };
        mv.atom_mut(frog).unwrap().portals.set(Side::Bottom, Some(contact));

        mv.remove_atom(portal, RemoveOptions::destroy()).unwrap();
        assert_eq!(mv.atom(other).unwrap().target, None);
        assert!(mv.atom(frog).unwrap().portals.is_empty());
    }

    #[test]
    fn test_branch_world_registers_reindexed_copy() {
        let (mut mv, world) = setup();
        let a = mv.insert_atom(world, Atom::new(10.0, 10.0).at(3.0, 4.0)).unwrap();
        let branch = mv.branch_world(world).unwrap();
        assert_ne!(branch, world);
        assert_eq!(mv.worlds.len(), 2);
        let copy = mv.atom(a.in_world(branch)).unwrap();
        assert_eq!((copy.x, copy.y), (3.0, 4.0));
        // Independent copies
        mv.atom_mut(a).unwrap().x = 99.0;
        assert_eq!(mv.atom(a.in_world(branch)).unwrap().x, 3.0);
    }

    #[test]
    fn test_address_grid_and_void() {
        let (mut mv, world) = setup();
        let second = mv.branch_world(world).unwrap();
        let (w, h) = (mv.settings.world_width, mv.settings.world_height);

        let (id, local) = mv.address(Vec2::new(10.0, 20.0), 2);
        assert_eq!(id, world);
        assert_eq!(local, Vec2::new(10.0, 20.0));

        let (id, local) = mv.address(Vec2::new(w + 10.0, 20.0), 2);
        assert_eq!(id, second);
        assert_eq!(local, Vec2::new(10.0, 20.0));

        // Past the last column
        let (id, local) = mv.address(Vec2::new(2.0 * w + 1.0, 5.0), 2);
        assert_eq!(id, WorldId::VOID);
        assert_eq!(local, Vec2::new(2.0 * w + 1.0, 5.0));

        // A grid cell with no world in it
        let (id, _) = mv.address(Vec2::new(5.0, h + 5.0), 2);
        assert_eq!(id, WorldId::VOID);

        // Off the canvas
        assert_eq!(mv.address(Vec2::new(-1.0, 5.0), 2).0, WorldId::VOID);
    }

    #[test]
    fn test_move_to_world_carries_subtree() {
        let (mut mv, world) = setup();
        let other_world = mv.add_world(World::new(WorldId(0), "second"));
        let owner = mv.insert_atom(world, Atom::new(10.0, 10.0).at(1.0, 1.0)).unwrap();
        let kid = mv.insert_atom(world, Atom::new(5.0, 5.0)).unwrap();
        let pair = mv.insert_atom(world, Atom::portal(PortalKind::Move, 50.0, 5.0)).unwrap();
        let offset = LinkMap::from([(Property::X, Mapping::Shift(10.0))]);
        link_atom(&mut mv, owner, kid, offset, LinkMap::new()).unwrap();
        mv.atom_mut(pair).unwrap().target = Some(owner);

        let moved = mv.move_to_world(owner, other_world).unwrap();
        assert_eq!(moved.world, other_world);
        assert_eq!(mv.worlds[0].len(), 1);
        let dest = mv.world(other_world).unwrap();
        assert_eq!(dest.len(), 2);
        let moved_atom = mv.atom(moved).unwrap();
        let new_kid = moved_atom.links[0].child;
        assert_eq!(new_kid.world, other_world);
        assert_eq!(mv.atom(new_kid).unwrap().parent, Some(moved));
        assert_eq!(mv.atom(new_kid).unwrap().x, 11.0);
        assert_eq!(mv.atom(pair).unwrap().target, Some(moved));
    }

    #[test]
    fn test_added_world_ids_are_unique() {
        let (mut mv, world) = setup();
        let clash = World::new(world, "clash");
        let id = mv.add_world(clash);
        assert_ne!(id, world);
        assert_eq!(mv.worlds.len(), 2);
    }
}
