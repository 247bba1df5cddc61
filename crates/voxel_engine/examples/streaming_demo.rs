//! Headless pipeline walkthrough: streams chunks around a moving viewer,
//! edits a block, and prints pipeline statistics along the way.
//!
//! Run with `cargo run --example streaming_demo`.

use std::path::Path;
use std::time::{Duration, Instant};

use glam::Vec3;
use voxel_engine::{BlockId, Settings, World, WorldEvent, CHUNK_HEIGHT};

fn drain(world: &mut World, label: &str) {
    let start = Instant::now();
    let mut uploads = 0usize;
    let mut unloads = 0usize;
    loop {
        world.pump(|event| match event {
            WorldEvent::MeshReady { .. } => uploads += 1,
            WorldEvent::ChunkUnloaded { .. } => unloads += 1,
        });
        if world.is_idle() {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    println!(
        "{label}: {uploads} meshes uploaded, {unloads} chunks unloaded in {:?}",
        start.elapsed()
    );
}

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let mut settings = Settings::load_or_create(Path::new("config/settings.json"));
    settings.options.render_distance = settings.options.render_distance.min(6);
    let mut world = World::new(settings.seed, settings.options);

    // Initial load around the spawn point.
    let mut viewer = Vec3::new(0.5, 48.0, 0.5);
    world.update(viewer, |_| {});
    drain(&mut world, "initial load");
    println!("stats: {:?}", world.stats());

    // Walk east across several chunk borders.
    for step in 1..=4 {
        viewer.x += 24.0;
        world.update(viewer, |_| {});
        drain(&mut world, &format!("step {step}"));
    }

    // Interactive edit: drop a glowstone into the world and watch the
    // light-driven remesh ripple out.
    let (x, z) = (viewer.x as i32, viewer.z as i32);
    let surface = (0..CHUNK_HEIGHT as i32)
        .rev()
        .find(|&y| world.get_block(x, y, z) != BlockId::Air)
        .unwrap_or(0);
    world.set_block(x, surface + 2, z, BlockId::Glowstone);
    drain(&mut world, "glowstone edit");
    println!(
        "blocklight at the torch: {}, two cells away: {}",
        world.get_blocklight(x, surface + 2, z),
        world.get_blocklight(x + 2, surface + 2, z),
    );

    println!("final stats: {:?}", world.stats());
    world.stop();
}
