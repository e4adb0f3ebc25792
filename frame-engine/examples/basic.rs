// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Basic example running the frame engine
//!
//! Spawns a field of bouncing sprites, drives them with the built-in systems
//! and a closure script, and consumes the presented render lists on a
//! separate presentation thread.
//!
//! Pass a TOML config path as the first argument to override the defaults.
//! Set `RUST_LOG=frame_engine=debug` to watch flips and registrations.

use frame_engine::config::EngineConfig;
use frame_engine::ecs::components::{Sprite, Transform, Velocity};
use frame_engine::ecs::systems::{BoundsSystem, Camera, MotionSystem, SpriteRenderSystem};
use frame_engine::render::Color;
use frame_engine::script::{ScriptAttachment, ScriptCommand, ScriptInstance, ScriptSystem};
use frame_engine::{Engine, EngineError, Phase};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAMES: usize = 120;
const DT: f32 = 1.0 / 60.0;
const HALF_EXTENT: f32 = 300.0;

// Reverse any velocity that carries an entity further out of the arena
fn bounce(_dt: f32, instances: &[ScriptInstance]) -> Vec<ScriptCommand> {
    let mut commands = Vec::new();
    for instance in instances {
        let (Some((x, y)), Some((dx, dy))) = (instance.position, instance.velocity) else {
            continue;
        };
        let flip_x = x.abs() > HALF_EXTENT && x.signum() == dx.signum();
        let flip_y = y.abs() > HALF_EXTENT && y.signum() == dy.signum();
        if flip_x || flip_y {
            commands.push(ScriptCommand::SetVelocity {
                entity: instance.entity,
                dx: if flip_x { -dx } else { dx },
                dy: if flip_y { -dy } else { dy },
            });
        }
    }
    commands
}

fn run() -> Result<(), EngineError> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    }
    .apply_env_overrides()?;

    let mut engine = Engine::new(config)?;
    engine.register(MotionSystem::new(), Phase::Early)?;
    engine.register(BoundsSystem::new(), Phase::Early)?;
    engine.register(ScriptSystem::new(bounce), Phase::Script)?;
    let renderer = engine.register(SpriteRenderSystem::new(Camera::new(800.0, 600.0)), Phase::Late)?;

    for i in 0..64 {
        let angle = i as f32 * 0.7;
        let entity = engine.spawn();
        engine.attach(entity, Transform::new(angle.cos() * 50.0, angle.sin() * 50.0))?;
        engine.attach(entity, Velocity::new(angle.cos() * 400.0, angle.sin() * 250.0))?;
        engine.attach(
            entity,
            Sprite::new(i % 4, 12.0, 12.0)
                .with_layer((i % 3) as i32)
                .with_color(Color::rgb(64 + (i * 3) as u8, 128, 255 - (i * 3) as u8)),
        )?;
        engine.attach(entity, ScriptAttachment::new("bounce"))?;
    }

    // Presentation stage: reads each finished list after its notice
    let notices = engine.subscribe();
    let render = engine.render_buffers();
    let presenter = thread::spawn(move || {
        let mut presented = 0usize;
        while let Ok(notice) = notices.recv_timeout(Duration::from_millis(250)) {
            let list = render.presentable();
            presented += list.len();
            if notice.frame % 30 == 0 {
                info!(frame = notice.frame, primitives = list.len(), "presented");
            }
            if notice.frame >= FRAMES as u64 {
                break;
            }
        }
        presented
    });

    for _ in 0..FRAMES {
        engine.run_frame(DT)?;
    }
    let culled = engine
        .system::<SpriteRenderSystem>(renderer)
        .map(|system| system.culled())
        .unwrap_or_default();

    engine.shutdown();
    let presented = presenter.join().unwrap_or_default();

    println!("Frame Engine - Basic Example");
    println!("============================\n");
    println!("Frames run:          {FRAMES}");
    println!("Primitives presented: {presented}");
    println!("Culled last frame:    {culled}");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    if let Err(err) = run() {
        tracing::error!(error = %err, "frame engine aborted");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
