//! Atoms: the rectangular bodies of the simulation
//!
//! All cross-atom references are non-owning [`AtomRef`] indices. The only owning
//! relation is a [`Link`] held by its owner atom.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::geom::Side;
use super::link::Link;
use super::portal::PortalKind;

/// Identifier of a world. Worlds are never removed, so ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub u64);

impl WorldId {
    /// The shared void pseudo-world
    pub const VOID: WorldId = WorldId(0);
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Identifier of an atom within its world. Preserved by world clones, so the
/// same id finds "the same" atom in a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomId(pub u64);

/// Address of an atom anywhere in the multiverse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomRef {
    pub world: WorldId,
    pub atom: AtomId,
}

impl AtomRef {
    pub fn new(world: WorldId, atom: AtomId) -> Self {
        Self { world, atom }
    }

    /// The same atom id in another world (the clone's copy of this atom)
    pub fn in_world(self, world: WorldId) -> Self {
        Self { world, ..self }
    }
}

impl fmt::Display for AtomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/a{}", self.world, self.atom.0)
    }
}

/// Per-tick behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateKind {
    /// Never moves; velocities are zeroed every tick
    #[default]
    Static,
    /// Does nothing (linked children driven by their owner)
    None,
    /// Falls, slides and collides
    Mover,
    /// A mover that faces its direction of travel and hops
    MoverBeing,
}

/// How the rendering collaborator should draw the atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawKind {
    #[default]
    Rectangle,
    Circle,
    /// Sprite named by `Atom::source`
    Image,
    /// Draws the spawn prototype in place of the spawner
    Spawner,
}

/// What a pointer grab on this atom actually picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GrabKind {
    /// The atom itself, unless mid-transit
    #[default]
    Drag,
    /// Nothing
    Static,
    /// A fresh copy of the spawn prototype
    Spawner,
    /// A fresh portal from the spawn prototype
    SpawnerPortal,
    /// The owner of this linked atom
    Linkee,
}

/// Four cut insets
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cuts {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Cuts {
    pub fn get(&self, side: Side) -> f32 {
        match side {
            Side::Top => self.top,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut f32 {
        match side {
            Side::Top => &mut self.top,
            Side::Bottom => &mut self.bottom,
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn set(&mut self, side: Side, value: f32) {
        *self.get_mut(side) = value;
    }

    /// Permutation applied by one clockwise quarter turn
    pub fn rotated_cw(&self) -> Self {
        Self {
            bottom: self.right,
            left: self.bottom,
            top: self.left,
            right: self.top,
        }
    }
}

/// Whether an atom is being swallowed by a portal or emerging from one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Entering,
    Exiting,
}

/// An occupied portal on one side of an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalContact {
    pub portal: AtomRef,
    pub phase: Phase,
}

/// Side -> portal currently occupied on that side
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Portals {
    pub top: Option<PortalContact>,
    pub bottom: Option<PortalContact>,
    pub left: Option<PortalContact>,
    pub right: Option<PortalContact>,
}

impl Portals {
    pub fn get(&self, side: Side) -> Option<PortalContact> {
        match side {
            Side::Top => self.top,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn set(&mut self, side: Side, contact: Option<PortalContact>) {
        match side {
            Side::Top => self.top = contact,
            Side::Bottom => self.bottom = contact,
            Side::Left => self.left = contact,
            Side::Right => self.right = contact,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Side, PortalContact)> + '_ {
        Side::ALL
            .into_iter()
            .filter_map(|side| self.get(side).map(|c| (side, c)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Side on which `portal` is occupied, if any
    pub fn side_of(&self, portal: AtomRef) -> Option<Side> {
        self.iter().find(|(_, c)| c.portal == portal).map(|(s, _)| s)
    }

    /// Rewrite every reference into `from` so it points into `to`
    pub(crate) fn remap_world(&mut self, from: WorldId, to: WorldId) {
        for side in Side::ALL {
            if let Some(mut contact) = self.get(side) {
                if contact.portal.world == from {
                    contact.portal.world = to;
                }
                self.set(side, Some(contact));
            }
        }
    }

    pub(crate) fn forget(&mut self, portal: AtomRef) {
        for side in Side::ALL {
            if self.get(side).is_some_and(|c| c.portal == portal) {
                self.set(side, None);
            }
        }
    }
}

/// Behaviour an atom switches to when its owning link goes away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub update: UpdateKind,
    pub grab: GrabKind,
    /// Skip the first update after promotion (position already came from the link)
    pub skip_update: bool,
}

/// Marks a transit variant: which portal its traveller went into and how it was flung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitOrigin {
    pub portal: AtomRef,
    pub fling: u8,
}

/// A rectangular body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Assigned when inserted into a world
    pub id: AtomId,

    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub cut: Cuts,

    pub dx: f32,
    pub dy: f32,
    pub nextdx: f32,
    pub nextdy: f32,
    /// Quarter turns, 0..=3
    pub turns: u8,
    /// Turns queued for the mover's next update
    pub nextturns: u8,
    pub flip_x: bool,

    pub update: UpdateKind,
    pub draw: DrawKind,
    pub grab: GrabKind,
    /// RGB fill colour
    pub colour: u32,
    /// Sprite name for `DrawKind::Image`
    #[serde(default)]
    pub source: Option<String>,
    /// Prototype produced by spawner grabs
    #[serde(default)]
    pub spawn: Option<Box<Atom>>,

    /// Portal behaviour; `Some` makes this atom a portal
    #[serde(default)]
    pub portal: Option<PortalKind>,
    /// Paired portal
    #[serde(default)]
    pub target: Option<AtomRef>,

    pub parent: Option<AtomRef>,
    pub links: Vec<Link>,
    pub portals: Portals,
    #[serde(default)]
    pub transit: Option<TransitOrigin>,
    #[serde(default)]
    pub on_promote: Option<Promotion>,
    /// The live atom this one is a past copy of (display/debug only)
    #[serde(default)]
    pub variant_parent: Option<AtomRef>,

    pub is_mover: bool,
    pub is_potion: bool,
    pub is_void: bool,
    /// Consumed potion
    pub used: bool,
    pub skip_update: bool,
    pub grounded: bool,
    pub jump_tick: u32,
    /// Upward speed given to movers landing on this atom
    #[serde(default)]
    pub bounce: Option<f32>,
    #[serde(default)]
    pub max_speed: Option<f32>,
}

impl Atom {
    /// A static rectangle at the origin
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            id: AtomId(0),
            x: 0.0,
            y: 0.0,
            width,
            height,
            cut: Cuts::default(),
            dx: 0.0,
            dy: 0.0,
            nextdx: 0.0,
            nextdy: 0.0,
            turns: 0,
            nextturns: 0,
            flip_x: false,
            update: UpdateKind::Static,
            draw: DrawKind::Rectangle,
            grab: GrabKind::Drag,
            colour: 0xff0000,
            source: None,
            spawn: None,
            portal: None,
            target: None,
            parent: None,
            links: Vec::new(),
            portals: Portals::default(),
            transit: None,
            on_promote: None,
            variant_parent: None,
            is_mover: false,
            is_potion: false,
            is_void: false,
            used: false,
            skip_update: false,
            grounded: false,
            jump_tick: 0,
            bounce: None,
            max_speed: None,
        }
    }

    /// A falling, colliding body
    pub fn mover(width: f32, height: f32) -> Self {
        let mut atom = Self::new(width, height);
        atom.update = UpdateKind::Mover;
        atom.is_mover = true;
        atom
    }

    /// A portal slab (horizontal until turned)
    pub fn portal(kind: PortalKind, width: f32, height: f32) -> Self {
        let mut atom = Self::new(width, height);
        atom.portal = Some(kind);
        atom
    }

    /// A single-use rotate potion
    pub fn potion(size: f32) -> Self {
        let mut atom = Self::new(size, size);
        atom.update = UpdateKind::Mover;
        atom.draw = DrawKind::Circle;
        atom.is_potion = true;
        atom
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Current and staged velocity
    pub fn moving(mut self, dx: f32, dy: f32) -> Self {
        self.dx = dx;
        self.dy = dy;
        self.nextdx = dx;
        self.nextdy = dy;
        self
    }

    pub fn with_update(mut self, update: UpdateKind) -> Self {
        self.update = update;
        self
    }

    pub fn with_grab(mut self, grab: GrabKind) -> Self {
        self.grab = grab;
        self
    }

    pub fn with_draw(mut self, draw: DrawKind) -> Self {
        self.draw = draw;
        self
    }

    pub fn with_colour(mut self, colour: u32) -> Self {
        self.colour = colour;
        self
    }

    pub fn with_cuts(mut self, cut: Cuts) -> Self {
        self.cut = cut;
        self
    }

    /// Start out rotated (applies the size/cut permutation, no overlap check)
    pub fn turned(mut self, turns: u8) -> Self {
        for _ in 0..turns % 4 {
            self.quarter_turn();
        }
        self
    }

    /// One clockwise quarter turn of size, cuts and orientation
    pub(crate) fn quarter_turn(&mut self) {
        std::mem::swap(&mut self.width, &mut self.height);
        self.cut = self.cut.rotated_cw();
        self.turns = (self.turns + 1) % 4;
    }

    pub fn is_portal(&self) -> bool {
        self.portal.is_some()
    }

    /// Portal orientation: even turns lie flat and accept vertical motion
    pub fn is_horizontal(&self) -> bool {
        self.turns % 2 == 0
    }

    /// Become independent of the owning link, switching in the post-transit behaviour
    pub(crate) fn promote(&mut self) {
        self.parent = None;
        self.transit = None;
        if let Some(promotion) = self.on_promote.take() {
            self.update = promotion.update;
            self.grab = promotion.grab;
            self.skip_update = promotion.skip_update;
        }
    }

    /// Clear per-world identity before inserting a copy elsewhere
    pub(crate) fn detached(mut self) -> Self {
        self.id = AtomId(0);
        self.parent = None;
        self.links.clear();
        self
    }

    /// Rewrite every reference into world `from` so it points into `to`
    pub(crate) fn remap_world(&mut self, from: WorldId, to: WorldId) {
        let remap = |r: &mut AtomRef| {
            if r.world == from {
                r.world = to;
            }
        };
        if let Some(r) = self.target.as_mut() {
            remap(r);
        }
        if let Some(r) = self.parent.as_mut() {
            remap(r);
        }
        if let Some(r) = self.variant_parent.as_mut() {
            remap(r);
        }
        if let Some(origin) = self.transit.as_mut() {
            remap(&mut origin.portal);
        }
        for link in &mut self.links {
            remap(&mut link.child);
        }
        self.portals.remap_world(from, to);
    }
}
