//! Headless swarm simulation.
//!
//! Spawns a few thousand wandering agents, moves them every frame, counts
//! neighbours through the spatial index and keeps the population churning so
//! the query cache and rebuild policy both have work to do. Prints the
//! diagnostics at the end.
//!
//! Run with: `cargo run --example swarm -- [config.json]`
//! (`RUST_LOG=tessera_ecs=debug` shows reconciliation and rebuild events.)

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use tessera_engine::prelude::*;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Velocity {
    dx: f32,
    dy: f32,
}

impl Component for Velocity {
    const NAME: &'static str = "velocity";
}

/// Neighbours within `SENSE_RADIUS` as of the last spatial rebuild.
#[derive(Debug, Clone, Copy, Default)]
struct Crowding(usize);

impl Component for Crowding {
    const NAME: &'static str = "crowding";
}

/// Frames left before the agent expires.
#[derive(Debug, Clone, Copy)]
struct Lifetime(u32);

impl Component for Lifetime {
    const NAME: &'static str = "lifetime";
}

const AGENTS: usize = 4_000;
const FRAMES: u64 = 600;
const SENSE_RADIUS: f32 = 20.0;
const SEED: u64 = 42;

fn spawn_agent(world: &mut World, rng: &mut Pcg64, bounds: Bounds) {
    let e = world.create_entity();
    world.attach(
        e,
        Position::new(
            rng.gen_range(bounds.min_x..bounds.max_x),
            rng.gen_range(bounds.min_y..bounds.max_y),
        ),
    );
    world.attach(
        e,
        Velocity {
            dx: rng.gen_range(-40.0..40.0),
            dy: rng.gen_range(-40.0..40.0),
        },
    );
    world.attach(e, Crowding::default());
    world.attach(e, Lifetime(rng.gen_range(120..900)));
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    init_tracing(&config.log_filter)?;

    let bounds = config.world.spatial.bounds;
    let mut frames = FrameLoop::from_config(config)?;

    let mut rng = Pcg64::seed_from_u64(SEED);
    for _ in 0..AGENTS {
        spawn_agent(frames.world_mut(), &mut rng, bounds);
    }

    // Move and bounce off the edges. Positions changed, so the spatial
    // index is now stale.
    frames.add_system("movement", move |world, _entities, dt| {
        let pos = world.tag::<Position>();
        let vel = world.tag::<Velocity>();
        let (Some(pos), Some(vel)) = (pos, vel) else {
            return;
        };
        let movers = world.query(&[pos, vel]);
        for &e in movers.iter() {
            let Some(mut v) = world.get::<Velocity>(e).copied() else {
                continue;
            };
            let Some(p) = world.get_mut::<Position>(e) else {
                continue;
            };
            p.x += v.dx * dt as f32;
            p.y += v.dy * dt as f32;
            if p.x < bounds.min_x || p.x > bounds.max_x {
                v.dx = -v.dx;
                p.x = p.x.clamp(bounds.min_x, bounds.max_x);
            }
            if p.y < bounds.min_y || p.y > bounds.max_y {
                v.dy = -v.dy;
                p.y = p.y.clamp(bounds.min_y, bounds.max_y);
            }
            world.attach(e, v);
        }
        world.mark_spatial_dirty();
    })?;

    // Neighbour counts from the (possibly stale) spatial index.
    frames.add_system("crowding", |world, entities, _dt| {
        for &e in entities {
            let Some(p) = world.get::<Position>(e).copied() else {
                continue;
            };
            let near = world.query_radius(p.x, p.y, SENSE_RADIUS).len();
            if let Some(c) = world.get_mut::<Crowding>(e) {
                c.0 = near.saturating_sub(1);
            }
        }
    })?;

    // Expire old agents and replace each one, keeping the population level.
    let mut spawn_rng = Pcg64::seed_from_u64(SEED + 1);
    frames.add_system("lifecycle", move |world, entities, _dt| {
        for &e in entities {
            let expired = match world.get_mut::<Lifetime>(e) {
                Some(life) if life.0 == 0 => true,
                Some(life) => {
                    life.0 -= 1;
                    false
                }
                None => false,
            };
            if expired {
                world.remove_entity(e);
                spawn_agent(world, &mut spawn_rng, bounds);
            }
        }
    })?;

    let churn = frames.run_frames(FRAMES);

    let world = frames.world();
    let crowded = world
        .all_entities()
        .iter()
        .filter_map(|&e| world.get::<Crowding>(e))
        .map(|c| c.0)
        .max()
        .unwrap_or(0);

    println!("frames:          {}", frames.frame_count());
    println!("sim time:        {:.2}s", frames.sim_time());
    println!("live agents:     {}", world.live_count());
    println!("spawned+retired: {churn}");
    println!("most crowded:    {crowded} neighbours");
    if let Some(diag) = frames.last_diagnostics() {
        println!("{}", serde_json::to_string_pretty(diag)?);
    }
    Ok(())
}
