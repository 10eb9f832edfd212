//! Draw dispatch
//!
//! The simulation never paints pixels. Atoms are turned into draw calls on a
//! [`Surface`]; worlds are laid out in a grid, `columns` per row, with the void
//! drawn underneath in canvas space.

use glam::Vec2;
use serde::Serialize;

use crate::sim::{Atom, Bounds, DrawKind, Multiverse, World};

/// Anything that can receive draw calls (canvas, GPU batcher, recorder)
pub trait Surface {
    /// Translate all following calls
    fn set_origin(&mut self, origin: Vec2);
    fn fill_rect(&mut self, bounds: Bounds, colour: u32);
    fn stroke_rect(&mut self, bounds: Bounds, colour: u32);
    fn fill_circle(&mut self, center: Vec2, radius: f32, colour: u32);
    fn draw_image(&mut self, source: &str, bounds: Bounds, turns: u8, flip_x: bool);
}

/// Outline colour of world cells
pub const GRID_COLOUR: u32 = 0x404040;

/// Draw a single atom according to its draw kind
pub fn draw_atom(surface: &mut impl Surface, atom: &Atom) {
    let bounds = Bounds::of(atom);
    if bounds.is_degenerate() {
        return;
    }
    match atom.draw {
        DrawKind::Rectangle => surface.fill_rect(bounds, atom.colour),
        DrawKind::Circle => surface.fill_circle(bounds.center(), atom.height / 2.0, atom.colour),
        DrawKind::Image => match atom.source.as_deref() {
            Some(source) => surface.draw_image(source, bounds, atom.turns, atom.flip_x),
            None => surface.fill_rect(bounds, atom.colour),
        },
        DrawKind::Spawner => match atom.spawn.as_deref() {
            Some(prototype) => draw_atom(surface, &prototype.clone().at(atom.x, atom.y)),
            None => surface.stroke_rect(bounds, atom.colour),
        },
    }
}

pub fn draw_world(surface: &mut impl Surface, world: &World) {
    for atom in world.iter() {
        draw_atom(surface, atom);
    }
}

/// Canvas position of the world cell at `index`
pub fn cell_origin(mv: &Multiverse, index: usize, columns: usize) -> Vec2 {
    let columns = columns.max(1);
    Vec2::new(
        (index % columns) as f32 * mv.settings.world_width,
        (index / columns) as f32 * mv.settings.world_height,
    )
}

/// Canvas height needed to show every world
pub fn layout_height(mv: &Multiverse, columns: usize) -> f32 {
    let rows = mv.worlds.len().div_ceil(columns.max(1));
    rows as f32 * mv.settings.world_height
}

/// Draw the void, then every world in its grid cell
pub fn draw_multiverse(surface: &mut impl Surface, mv: &Multiverse, columns: usize) {
    surface.set_origin(Vec2::ZERO);
    draw_world(surface, &mv.void);

    let cell = Bounds {
        top: 0.0,
        bottom: mv.settings.world_height,
        left: 0.0,
        right: mv.settings.world_width,
    };
    for (index, world) in mv.worlds.iter().enumerate() {
        surface.set_origin(cell_origin(mv, index, columns));
        surface.stroke_rect(cell, GRID_COLOUR);
        draw_world(surface, world);
    }
    surface.set_origin(Vec2::ZERO);
}

/// A recorded draw call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DrawCommand {
    Origin(Vec2),
    FillRect { bounds: Bounds, colour: u32 },
    StrokeRect { bounds: Bounds, colour: u32 },
    FillCircle {
        center: Vec2,
        radius: f32,
        colour: u32,
    },
    Image {
        source: String,
        bounds: Bounds,
        turns: u8,
        flip_x: bool,
    },
}

/// Surface that records draw calls, for headless runs and tests
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandBuffer {
    pub commands: Vec<DrawCommand>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Surface for CommandBuffer {
    fn set_origin(&mut self, origin: Vec2) {
        self.commands.push(DrawCommand::Origin(origin));
    }

    fn fill_rect(&mut self, bounds: Bounds, colour: u32) {
        self.commands.push(DrawCommand::FillRect { bounds, colour });
    }

    fn stroke_rect(&mut self, bounds: Bounds, colour: u32) {
        self.commands.push(DrawCommand::StrokeRect { bounds, colour });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, colour: u32) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            colour,
        });
    }

    fn draw_image(&mut self, source: &str, bounds: Bounds, turns: u8, flip_x: bool) {
        self.commands.push(DrawCommand::Image {
            source: source.to_owned(),
            bounds,
            turns,
            flip_x,
        });
    }
}
