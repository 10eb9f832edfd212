//! TimePond headless runner
//!
//! Builds a small pond scene, runs it for a number of ticks and prints a JSON
//! summary of every world. Usage:
//!
//! ```text
//! timepond [TICKS] [SEED] [--settings FILE] [--columns N]
//! ```

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use clap::Parser;
    use glam::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;
    use serde::Serialize;

    use timepond::render::{CommandBuffer, draw_multiverse, layout_height};
    use timepond::sim::{
        Atom, AtomRef, DrawKind, GrabKind, LinkMap, Mapping, Multiverse, PortalKind, Property,
        TickInput, UpdateKind, WorldId, link_atom, pair_portals, tick, update_links,
    };
    use timepond::{SimResult, SimSettings};

    /// Run a seeded pond scene headless and print a JSON summary
    #[derive(Parser, Debug, Clone, PartialEq)]
    #[command(author, version, about)]
    pub struct Options {
        /// Number of ticks to simulate
        #[arg(default_value_t = 600)]
        pub ticks: u64,
        /// Seed for scattering the demo scene
        #[arg(default_value_t = 12345)]
        pub seed: u64,
        /// JSON settings file
        #[arg(long)]
        pub settings: Option<PathBuf>,
        /// World cells per row in the canvas layout
        #[arg(long, default_value_t = 2)]
        pub columns: usize,
    }

    /// One line per world in the printed summary
    #[derive(Debug, Serialize)]
    struct WorldSummary {
        id: WorldId,
        name: String,
        atoms: usize,
        is_projection: bool,
        past_snapshots: usize,
    }

    #[derive(Debug, Serialize)]
    struct RunSummary {
        seed: u64,
        ticks: u64,
        induced: usize,
        consumed: usize,
        worlds: Vec<WorldSummary>,
        void_atoms: usize,
        draw_calls: usize,
        canvas_height: f32,
    }

    /// A portal with a short frame bar on its top (or left) end. Grabbing the
    /// bar grabs the portal.
    fn framed_portal(
        mv: &mut Multiverse,
        world: WorldId,
        kind: PortalKind,
        at: Vec2,
        vertical: bool,
    ) -> SimResult<AtomRef> {
        let portal = mv.insert_atom(
            world,
            Atom::portal(kind, 60.0, 5.0)
                .turned(u8::from(vertical))
                .at(at.x, at.y)
                .with_colour(portal_colour(kind)),
        )?;
        let (along, bar) = if vertical {
            (Property::Y, Atom::new(5.0, 10.0))
        } else {
            (Property::X, Atom::new(10.0, 5.0))
        };
        let bar = mv.insert_atom(world, bar.with_grab(GrabKind::Linkee).with_colour(0x202020))?;
        let offset = LinkMap::from([
            (along, Mapping::Shift(-10.0)),
            (Property::Width, Mapping::Own),
            (Property::Height, Mapping::Own),
            (Property::Turns, Mapping::Own),
        ]);
        link_atom(mv, portal, bar, offset, LinkMap::new())?;
        update_links(mv, portal);
        Ok(portal)
    }

    fn portal_colour(kind: PortalKind) -> u32 {
        match kind {
            PortalKind::Void => 0x000000,
            PortalKind::Move => 0x3060ff,
            PortalKind::Dimension => 0xa040ff,
            PortalKind::Pastline | PortalKind::PastNowLine => 0xff9020,
            PortalKind::Futureline => 0x20e0a0,
        }
    }

    /// The pond: a floor, a pair of move portals, a pair of dimension portals
    /// and a few things wandering through them
    pub fn demo_scene(settings: SimSettings, seed: u64) -> SimResult<Multiverse> {
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut mv = Multiverse::new(settings);
        let world = mv.worlds[0].id;
        let (width, height) = (mv.settings.world_width, mv.settings.world_height);

        mv.insert_atom(
            world,
            Atom::new(width, 20.0)
                .at(0.0, height - 20.0)
                .with_grab(GrabKind::Static)
                .with_colour(0x305020),
        )?;
        let mut lilypad = Atom::new(40.0, 5.0)
            .at(width / 2.0 - 20.0, height - 25.0)
            .with_colour(0x40c040);
        lilypad.bounce = Some(6.0);
        mv.insert_atom(world, lilypad)?;

        let floor = height - 20.0;
        let standing = |x: f32| Vec2::new(x, floor - 60.0);
        let move_in = framed_portal(&mut mv, world, PortalKind::Move, standing(150.0), true)?;
        let move_out = framed_portal(&mut mv, world, PortalKind::Move, standing(290.0), true)?;
        pair_portals(&mut mv, move_in, move_out)?;
        let branch = PortalKind::Dimension;
        let branch_in = framed_portal(&mut mv, world, branch, standing(390.0), true)?;
        let branch_out = framed_portal(&mut mv, world, branch, standing(20.0), true)?;
        pair_portals(&mut mv, branch_in, branch_out)?;

        let mut frog = Atom::mover(20.0, 16.0)
            .with_update(UpdateKind::MoverBeing)
            .with_draw(DrawKind::Image)
            .at(rng.random_range(40.0..120.0), floor - 40.0)
            .moving(2.0, 0.0)
            .with_colour(0x20a020);
        frog.source = Some("frog".to_owned());
        frog.max_speed = Some(12.0);
        mv.insert_atom(world, frog)?;

        let box_x = rng.random_range(180.0..260.0);
        mv.insert_atom(
            world,
            Atom::mover(20.0, 20.0)
                .at(box_x, floor - 80.0)
                .moving(rng.random_range(-2.0..2.0), 0.0)
                .with_colour(0x8b5a2b),
        )?;
        mv.insert_atom(
            world,
            Atom::potion(8.0)
                .at(rng.random_range(60.0..140.0), floor - 8.5)
                .with_colour(0xff40a0),
        )?;

        let mut spawner = Atom::new(16.0, 16.0)
            .at(width - 30.0, 10.0)
            .with_draw(DrawKind::Spawner)
            .with_grab(GrabKind::Spawner);
        spawner.spawn = Some(Box::new(Atom::potion(8.0).with_colour(0xff40a0)));
        mv.insert_atom(world, spawner)?;

        log::info!("Built demo scene with seed {seed}, {} atoms", mv.worlds[0].len());
        Ok(mv)
    }

    pub fn run(options: &Options) -> Result<String, Box<dyn std::error::Error>> {
        let settings = match &options.settings {
            Some(path) => SimSettings::load(path)?,
            None => SimSettings::default(),
        };
        let mut mv = demo_scene(settings, options.seed)?;

        let input = TickInput::default();
        let (mut induced, mut consumed) = (0, 0);
        for _ in 0..options.ticks {
            let report = tick(&mut mv, &input)?;
            for crossing in &report.induced {
                log::warn!("Induced transit at tick {}: {:?}", mv.time_ticks, crossing);
            }
            for atom in &report.consumed {
                log::debug!("{atom} went through a portal at tick {}", mv.time_ticks);
            }
            induced += report.induced.len();
            consumed += report.consumed.len();
        }

        let mut buffer = CommandBuffer::new();
        draw_multiverse(&mut buffer, &mv, options.columns);

        let summary = RunSummary {
            seed: options.seed,
            ticks: mv.time_ticks,
            induced,
            consumed,
            worlds: mv
                .worlds
                .iter()
                .map(|w| WorldSummary {
                    id: w.id,
                    name: w.name.clone(),
                    atoms: w.len(),
                    is_projection: w.is_projection,
                    past_snapshots: w.past_projections.len(),
                })
                .collect(),
            void_atoms: mv.void.len(),
            draw_calls: buffer.len(),
            canvas_height: layout_height(&mv, options.columns),
        };
        Ok(serde_json::to_string_pretty(&summary)?)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn parse(args: &[&str]) -> Result<Options, clap::Error> {
            Options::try_parse_from(std::iter::once("timepond").chain(args.iter().copied()))
        }

        #[test]
        fn test_parse_options() {
            let defaults = parse(&[]).unwrap();
            assert_eq!((defaults.ticks, defaults.seed, defaults.columns), (600, 12345, 2));
            assert_eq!(defaults.settings, None);

            let options =
                parse(&["120", "7", "--settings", "pond.json", "--columns", "3"]).unwrap();
            assert_eq!(options.ticks, 120);
            assert_eq!(options.seed, 7);
            assert_eq!(options.settings, Some(PathBuf::from("pond.json")));
            assert_eq!(options.columns, 3);
            assert!(parse(&["--settings"]).is_err());
            assert!(parse(&["1", "2", "3"]).is_err());
            assert!(parse(&["ten"]).is_err());
        }

        #[test]
        fn test_demo_scene_is_seeded() {
            let a = demo_scene(SimSettings::default(), 3).unwrap();
            let b = demo_scene(SimSettings::default(), 3).unwrap();
            assert_eq!(
                serde_json::to_string(&a.worlds).unwrap(),
                serde_json::to_string(&b.worlds).unwrap()
            );
        }

        #[test]
        fn test_short_run_produces_summary() {
            let options = parse(&["30"]).unwrap();
            let json = run(&options).unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["ticks"], 30);
            assert!(value["worlds"].as_array().is_some_and(|w| !w.is_empty()));
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("TimePond (native) starting...");

    let options = <native::Options as clap::Parser>::parse();
    match native::run(&options) {
        Ok(summary) => println!("{summary}"),
        Err(e) => {
            log::error!("Run failed: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The browser host drives `timepond::sim::tick` itself
}
