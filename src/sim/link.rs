//! Kinematic links between atoms
//!
//! A link makes its owner push property values into a child every tick. Each
//! linked property may carry a `transfer` (owner <- f(child, owner)) applied
//! first, and an `offset` (child <- g(owner after transfer, child)); without an
//! offset the child simply copies the owner.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::atom::{Atom, AtomRef};
use super::multiverse::Multiverse;
use crate::error::{SimError, SimResult};

/// Properties a link propagates, in propagation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Property {
    X,
    Y,
    Width,
    Height,
    Dx,
    Dy,
    NextDx,
    NextDy,
    Turns,
    FlipX,
}

impl Property {
    pub const ALL: [Property; 10] = [
        Property::X,
        Property::Y,
        Property::Width,
        Property::Height,
        Property::Dx,
        Property::Dy,
        Property::NextDx,
        Property::NextDy,
        Property::Turns,
        Property::FlipX,
    ];
}

impl Atom {
    /// Read a linked property as a scalar (turns as 0..=3, flip as 0/1)
    pub fn property(&self, property: Property) -> f32 {
        match property {
            Property::X => self.x,
            Property::Y => self.y,
            Property::Width => self.width,
            Property::Height => self.height,
            Property::Dx => self.dx,
            Property::Dy => self.dy,
            Property::NextDx => self.nextdx,
            Property::NextDy => self.nextdy,
            Property::Turns => f32::from(self.turns),
            Property::FlipX => {
                if self.flip_x {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn set_property(&mut self, property: Property, value: f32) {
        match property {
            Property::X => self.x = value,
            Property::Y => self.y = value,
            Property::Width => self.width = value,
            Property::Height => self.height = value,
            Property::Dx => self.dx = value,
            Property::Dy => self.dy = value,
            Property::NextDx => self.nextdx = value,
            Property::NextDy => self.nextdy = value,
            Property::Turns => self.turns = (value.round() as i64).rem_euclid(4) as u8,
            Property::FlipX => self.flip_x = value != 0.0,
        }
    }
}

/// How a linked property value is derived.
///
/// `source` is the value flowing along the link (owner's for offsets, child's
/// for transfers) and `own` is the current value of the atom being written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Mapping {
    /// Take the source value
    Copy,
    /// Keep the written atom's own value
    Own,
    /// Source plus a constant
    Shift(f32),
    /// A constant
    Fixed(f32),
    /// `owner[from] * scale + shift`, reading any owner property
    Affine {
        from: Property,
        scale: f32,
        shift: f32,
    },
}

impl Mapping {
    pub fn eval(&self, source: f32, own: f32, owner: &Atom) -> f32 {
        match *self {
            Mapping::Copy => source,
            Mapping::Own => own,
            Mapping::Shift(d) => source + d,
            Mapping::Fixed(c) => c,
            Mapping::Affine { from, scale, shift } => owner.property(from) * scale + shift,
        }
    }
}

pub type LinkMap = BTreeMap<Property, Mapping>;

/// Owning edge from an atom to its child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub child: AtomRef,
    pub offset: LinkMap,
    pub transfer: LinkMap,
}

/// Make `child` owned by `owner`. The child must be unparented and must not be
/// an ancestor of the owner.
pub fn link_atom(
    mv: &mut Multiverse,
    owner: AtomRef,
    child: AtomRef,
    offset: LinkMap,
    transfer: LinkMap,
) -> SimResult<()> {
    if owner == child || atom_is_descendant(mv, owner, child) {
        return Err(SimError::LinkCycle { owner, child });
    }
    let kid = mv.atom_mut(child).ok_or(SimError::UnknownAtom(child))?;
    if kid.parent.is_some() {
        return Err(SimError::AlreadyLinked(child));
    }
    kid.parent = Some(owner);
    mv.atom_mut(owner)
        .ok_or(SimError::UnknownAtom(owner))?
        .links
        .push(Link {
            child,
            offset,
            transfer,
        });
    Ok(())
}

/// Drop the link from `owner` to `child`, leaving the child unparented
pub fn unlink_atom(mv: &mut Multiverse, owner: AtomRef, child: AtomRef) {
    if let Some(atom) = mv.atom_mut(owner) {
        atom.links.retain(|l| l.child != child);
    }
    if let Some(kid) = mv.atom_mut(child) {
        if kid.parent == Some(owner) {
            kid.parent = None;
        }
    }
}

/// Push an atom's state down its link subtree (depth-first, pre-order)
pub fn update_links(mv: &mut Multiverse, atom: AtomRef) {
    let mut visited = HashSet::new();
    update_links_from(mv, atom, &mut visited);
}

fn update_links_from(mv: &mut Multiverse, owner: AtomRef, visited: &mut HashSet<AtomRef>) {
    if !visited.insert(owner) {
        return;
    }
    let links = match mv.atom(owner) {
        Some(atom) if !atom.links.is_empty() => atom.links.clone(),
        _ => return,
    };

    for link in links {
        if mv.atom(link.child).is_none() {
            continue;
        }
        for property in Property::ALL {
            if let Some(transfer) = link.transfer.get(&property) {
                let (Some(them), Some(me)) = (mv.atom(owner), mv.atom(link.child)) else {
                    break;
                };
                let value = transfer.eval(me.property(property), them.property(property), them);
                if let Some(them) = mv.atom_mut(owner) {
                    them.set_property(property, value);
                }
            }

            let (Some(them), Some(me)) = (mv.atom(owner), mv.atom(link.child)) else {
                break;
            };
            let value = match link.offset.get(&property) {
                Some(offset) => offset.eval(them.property(property), me.property(property), them),
                None => them.property(property),
            };
            if let Some(me) = mv.atom_mut(link.child) {
                me.set_property(property, value);
            }
        }
        update_links_from(mv, link.child, visited);
    }
}

/// Whether `ancestor` is reachable from `kid` by following parents
pub fn atom_is_descendant(mv: &Multiverse, kid: AtomRef, ancestor: AtomRef) -> bool {
    let mut seen = HashSet::new();
    let mut current = kid;
    while let Some(parent) = mv.atom(current).and_then(|a| a.parent) {
        if parent == ancestor {
            return true;
        }
        if !seen.insert(parent) {
            return false;
        }
        current = parent;
    }
    false
}

/// Topmost owner of an atom (itself when unlinked)
pub fn root_of(mv: &Multiverse, atom: AtomRef) -> AtomRef {
    let mut seen = HashSet::new();
    let mut current = atom;
    while let Some(parent) = mv.atom(current).and_then(|a| a.parent) {
        if !seen.insert(parent) || mv.atom(parent).is_none() {
            break;
        }
        current = parent;
    }
    current
}

/// Every atom in `atom`'s link subtree, itself first (depth-first)
pub fn subtree(mv: &Multiverse, atom: AtomRef) -> Vec<AtomRef> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![atom];
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        let Some(a) = mv.atom(current) else { continue };
        out.push(current);
        stack.extend(a.links.iter().rev().map(|l| l.child));
    }
    out
}

/// Teleport an atom and drag its subtree along
pub fn move_atom(mv: &mut Multiverse, atom: AtomRef, x: f32, y: f32) -> SimResult<()> {
    let a = mv.atom_mut(atom).ok_or(SimError::UnknownAtom(atom))?;
    a.x = x;
    a.y = y;
    update_links(mv, atom);
    Ok(())
}
