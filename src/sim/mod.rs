//! Deterministic simulation module
//!
//! All puzzle logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Stable iteration order (worlds by registration, atoms by insertion)
//! - No rendering or platform dependencies

pub mod atom;
pub mod behavior;
pub mod geom;
pub mod link;
pub mod multiverse;
pub mod overlap;
pub mod portal;
pub mod potion;
pub mod tick;
pub mod transit;
pub mod turn;
pub mod world;

pub use atom::{
    Atom, AtomId, AtomRef, Cuts, DrawKind, GrabKind, Phase, PortalContact, Portals, Promotion,
    TransitOrigin, UpdateKind, WorldId,
};
pub use behavior::{grab_atom, update_atom};
pub use geom::{Axis, Bounds, Side, Travel, aligns, get_bounds, point_overlaps};
pub use link::{
    Link, LinkMap, Mapping, Property, atom_is_descendant, link_atom, move_atom, root_of, subtree,
    unlink_atom, update_links,
};
pub use multiverse::{Multiverse, RemoveOptions};
pub use overlap::{atom_overlaps, overlaps_shifted};
pub use portal::{Crossing, Entry, PortalKind, move_enter, pair_portals};
pub use potion::resolve_potion;
pub use tick::{TickInput, TickReport, tick};
pub use transit::{Transit, abandon_transit, collided_portal, settle_contacts};
pub use turn::{TurnOptions, flip_atom, turn_atom};
pub use world::World;
