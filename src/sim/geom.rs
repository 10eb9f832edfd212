//! Axis-aligned bounds, alignment tests and travel frames
//!
//! Every atom is a rectangle `(x, y, width, height)` shrunk by four cut insets.
//! Screen coordinates: y grows downward, so "clockwise" maps right to down.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::atom::Atom;

/// Collidable rectangle of an atom after cuts. May be degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Bounds {
    /// Bounds of an atom including its cut insets
    pub fn of(atom: &Atom) -> Self {
        Self {
            top: atom.y + atom.cut.top,
            bottom: atom.y + atom.height - atom.cut.bottom,
            left: atom.x + atom.cut.left,
            right: atom.x + atom.width - atom.cut.right,
        }
    }

    /// Bounds of an atom ignoring its cuts
    pub fn nominal(atom: &Atom) -> Self {
        Self {
            top: atom.y,
            bottom: atom.y + atom.height,
            left: atom.x,
            right: atom.x + atom.width,
        }
    }

    /// Translate by `offset`
    pub fn shifted(&self, offset: Vec2) -> Self {
        Self {
            top: self.top + offset.y,
            bottom: self.bottom + offset.y,
            left: self.left + offset.x,
            right: self.right + offset.x,
        }
    }

    /// Zero or negative area (cut away entirely)
    pub fn is_degenerate(&self) -> bool {
        self.top >= self.bottom || self.left >= self.right
    }

    pub fn edge(&self, side: Side) -> f32 {
        match side {
            Side::Top => self.top,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn span(&self, axis: Axis) -> (f32, f32) {
        match axis {
            Axis::X => (self.left, self.right),
            Axis::Y => (self.top, self.bottom),
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.left
            && point.x <= self.right
            && point.y >= self.top
            && point.y <= self.bottom
    }

    /// One-directional overlap: self aligns with other on both axes
    pub fn aligns_with(&self, other: &Bounds) -> bool {
        aligns(self.span(Axis::X), other.span(Axis::X))
            && aligns(self.span(Axis::Y), other.span(Axis::Y))
    }

    /// Overlap in either direction (inclusive of touching edges)
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.aligns_with(other) || other.aligns_with(self)
    }
}

/// Bounds of an atom (`top = y + cutTop`, ...), never clamped
#[inline]
pub fn get_bounds(atom: &Atom) -> Bounds {
    Bounds::of(atom)
}

/// Inclusive point containment against an atom's cut bounds
#[inline]
pub fn point_overlaps(point: Vec2, atom: &Atom) -> bool {
    Bounds::of(atom).contains(point)
}

/// Which side of `[lo, hi]` a point lies on: -1 before, 0 inside, 1 after
fn point_side(point: f32, (lo, hi): (f32, f32)) -> i8 {
    if point < lo {
        -1
    } else if point > hi {
        1
    } else {
        0
    }
}

/// 1-D alignment: an endpoint of `span` lies in `other`, or `span` straddles it.
///
/// Deliberately asymmetric; callers evaluate both directions.
pub fn aligns(span: (f32, f32), other: (f32, f32)) -> bool {
    let start = point_side(span.0, other);
    let end = point_side(span.1, other);
    start == 0 || end == 0 || start == -end
}

/// A side of a rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    pub fn opposite(self) -> Self {
        match self {
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// The side this one becomes after a clockwise quarter turn
    pub fn rotate_cw(self) -> Self {
        match self {
            Side::Right => Side::Bottom,
            Side::Bottom => Side::Left,
            Side::Left => Side::Top,
            Side::Top => Side::Right,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Side::Top | Side::Bottom => Axis::Y,
            Side::Left | Side::Right => Axis::X,
        }
    }

    /// +1 for the far sides (right, bottom), -1 for the near ones
    pub fn sign(self) -> f32 {
        match self {
            Side::Bottom | Side::Right => 1.0,
            Side::Top | Side::Left => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
            Side::Left => "left",
            Side::Right => "right",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn other(self) -> Self {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }

    pub fn unit(self) -> Vec2 {
        match self {
            Axis::X => Vec2::X,
            Axis::Y => Vec2::Y,
        }
    }

    /// Position of an atom along this axis
    pub fn position(self, atom: &Atom) -> f32 {
        match self {
            Axis::X => atom.x,
            Axis::Y => atom.y,
        }
    }

    /// Nominal size of an atom along this axis
    pub fn size(self, atom: &Atom) -> f32 {
        match self {
            Axis::X => atom.width,
            Axis::Y => atom.height,
        }
    }

    pub fn velocity(self, atom: &Atom) -> f32 {
        match self {
            Axis::X => atom.dx,
            Axis::Y => atom.dy,
        }
    }
}

/// Direction of motion along one axis: the descriptor portal logic works in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Travel {
    pub axis: Axis,
    /// +1.0 toward right/bottom, -1.0 toward left/top
    pub direction: f32,
}

impl Travel {
    pub fn new(axis: Axis, delta: f32) -> Self {
        Self {
            axis,
            direction: if delta < 0.0 { -1.0 } else { 1.0 },
        }
    }

    /// Side leading the motion
    pub fn front(&self) -> Side {
        match (self.axis, self.direction < 0.0) {
            (Axis::X, false) => Side::Right,
            (Axis::X, true) => Side::Left,
            (Axis::Y, false) => Side::Bottom,
            (Axis::Y, true) => Side::Top,
        }
    }

    /// Side trailing the motion
    pub fn back(&self) -> Side {
        self.front().opposite()
    }

    pub fn is_vertical(&self) -> bool {
        self.axis == Axis::Y
    }

    /// Unit vector of the motion
    pub fn vector(&self) -> Vec2 {
        self.axis.unit() * self.direction
    }

    /// The same motion after a clockwise quarter turn
    pub fn rotate_cw(&self) -> Self {
        let v = crate::rotate_cw(self.vector());
        if v.x.abs() > v.y.abs() {
            Self::new(Axis::X, v.x)
        } else {
            Self::new(Axis::Y, v.y)
        }
    }
}
