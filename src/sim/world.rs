//! Worlds: independent arenas of atoms
//!
//! Atoms live in a map keyed by [`AtomId`]; `order` keeps insertion order for
//! draw layering. Cloning a world is an explicit copy-and-reindex: ids are kept
//! so the same id names the same atom in the branch, and every reference into
//! the source world is rewritten to point into the clone.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::atom::{Atom, AtomId, AtomRef, WorldId};
use super::portal::PortalKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub id: WorldId,
    pub name: String,
    pub atoms: BTreeMap<AtomId, Atom>,
    /// Insertion order (draw layering)
    pub order: Vec<AtomId>,
    next_atom_id: u64,
    /// Snapshots of this world, newest first
    #[serde(skip)]
    pub past_projections: VecDeque<World>,
    /// A branch speculatively advanced ahead of this world
    #[serde(skip)]
    pub future_projection: Option<Box<World>>,
    /// Non-authoritative clone (past snapshot or future projection)
    pub is_projection: bool,
    /// Ticks to wait before this world starts simulating
    pub projection_skip: u32,
}

impl World {
    pub fn new(id: WorldId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            atoms: BTreeMap::new(),
            order: Vec::new(),
            next_atom_id: 1,
            past_projections: VecDeque::new(),
            future_projection: None,
            is_projection: false,
            projection_skip: 0,
        }
    }

    /// The void pseudo-world
    pub fn void() -> Self {
        Self::new(WorldId::VOID, "void")
    }

    pub fn atom_ref(&self, id: AtomId) -> AtomRef {
        AtomRef::new(self.id, id)
    }

    pub fn get(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(&id)
    }

    pub fn get_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(&id)
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.atoms.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Atoms in draw order
    pub fn iter(&self) -> impl Iterator<Item = &Atom> + '_ {
        self.order.iter().filter_map(|id| self.atoms.get(id))
    }

    /// Atoms with no owning link, in draw order
    pub fn roots(&self) -> Vec<AtomId> {
        self.iter().filter(|a| a.parent.is_none()).map(|a| a.id).collect()
    }

    /// Insert an atom, assigning it a fresh id
    pub fn add_atom(&mut self, mut atom: Atom) -> AtomRef {
        let id = AtomId(self.next_atom_id);
        self.next_atom_id += 1;
        atom.id = id;
        self.atoms.insert(id, atom);
        self.order.push(id);
        self.atom_ref(id)
    }

    /// Take an atom out of the arena. Links and references are left untouched.
    pub(crate) fn take_atom(&mut self, id: AtomId) -> Option<Atom> {
        let atom = self.atoms.remove(&id)?;
        self.order.retain(|&a| a != id);
        Some(atom)
    }

    /// Whether any portal of `kind` lives here
    pub fn has_portal(&self, kind: PortalKind) -> bool {
        self.atoms.values().any(|a| a.portal == Some(kind))
    }

    /// Atom with the given id, as seen from this world
    pub fn find(&self, id: AtomId) -> Option<AtomRef> {
        self.contains(id).then(|| self.atom_ref(id))
    }

    /// Deep copy under a new id, rewriting every internal reference.
    ///
    /// Links can't be shared across worlds: links into other worlds are dropped
    /// and copies of atoms owned from another world are promoted. Other
    /// references into other worlds are kept as they are. History and
    /// projections are not copied.
    pub fn reindexed(&self, id: WorldId) -> World {
        let mut atoms = self.atoms.clone();
        for atom in atoms.values_mut() {
            atom.links.retain(|l| l.child.world == self.id);
            if atom.parent.is_some_and(|p| p.world != self.id) {
                atom.promote();
            }
            atom.remap_world(self.id, id);
            if let Some(spawn) = atom.spawn.as_mut() {
                spawn.remap_world(self.id, id);
            }
        }
        World {
            id,
            name: format!("{}'", self.name),
            atoms,
            order: self.order.clone(),
            next_atom_id: self.next_atom_id,
            past_projections: VecDeque::new(),
            future_projection: None,
            is_projection: self.is_projection,
            projection_skip: 0,
        }
    }

    /// Frozen copy of the current state (same id, no history)
    pub fn snapshot(&self) -> World {
        World {
            id: self.id,
            name: self.name.clone(),
            atoms: self.atoms.clone(),
            order: self.order.clone(),
            next_atom_id: self.next_atom_id,
            past_projections: VecDeque::new(),
            future_projection: None,
            is_projection: true,
            projection_skip: 0,
        }
    }

    /// Push the current state onto the history ring
    pub fn save_past_projection(&mut self, depth: usize) {
        if depth == 0 {
            return;
        }
        let snapshot = self.snapshot();
        self.past_projections.push_front(snapshot);
        self.past_projections.truncate(depth);
    }

    /// Snapshot from `ticks_ago` ticks back, if recorded
    pub fn past_projection(&self, ticks_ago: usize) -> Option<&World> {
        self.past_projections.get(ticks_ago)
    }
}
