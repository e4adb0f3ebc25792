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
//! Script-driven entities running through a full frame

use frame_engine::config::EngineConfig;
use frame_engine::ecs::components::{Sprite, Transform, Velocity};
use frame_engine::ecs::systems::{Camera, MotionSystem, SpriteRenderSystem};
use frame_engine::ecs::Phase;
use frame_engine::script::{ScriptAttachment, ScriptCommand, ScriptInstance, ScriptSystem};
use frame_engine::Engine;

/// Walks right until x passes 3, then despawns
fn walker(_dt: f32, instances: &[ScriptInstance]) -> Vec<ScriptCommand> {
    instances
        .iter()
        .map(|instance| match instance.position {
            None => ScriptCommand::AttachSprite {
                entity: instance.entity,
                sprite: Sprite::new(7, 2.0, 2.0),
            },
            Some((x, _)) if x > 3.0 => ScriptCommand::Despawn { entity: instance.entity },
            Some((x, y)) => ScriptCommand::SetPosition {
                entity: instance.entity,
                x: x + 1.0,
                y,
            },
        })
        .collect()
}

#[test]
fn test_script_drives_an_entity_through_its_lifetime() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register(MotionSystem::new(), Phase::Early).unwrap();
    engine.register(ScriptSystem::new(walker), Phase::Script).unwrap();
    let render = engine.register(SpriteRenderSystem::new(Camera::new(100.0, 100.0)), Phase::Late).unwrap();

    let entity = engine.spawn();
    engine.attach(entity, ScriptAttachment::new("walker")).unwrap();
    engine.attach(entity, Transform::new(0.0, 0.0)).unwrap();

    // Frame 1: move to x = 1; no sprite yet
    let stats = engine.run_frame(0.016).unwrap();
    assert_eq!(stats.presented.primitives, 0);
    let (_, transform) = engine.world().first_component::<Transform>(entity).unwrap();
    assert_eq!(transform.x(), 1.0);

    // Frames 2 to 4: keep walking
    for _ in 0..3 {
        engine.run_frame(0.016).unwrap();
    }
    let (_, transform) = engine.world().first_component::<Transform>(entity).unwrap();
    assert_eq!(transform.x(), 4.0);

    // Frame 5: past the edge, despawned at the end of the frame
    let stats = engine.run_frame(0.016).unwrap();
    assert_eq!(stats.flushed.entities_freed, 1);
    assert!(!engine.world().exists(entity));

    assert_eq!(engine.system::<SpriteRenderSystem>(render).unwrap().tracked(), 0);
}

#[test]
fn test_script_commands_reach_later_phases_in_the_same_frame() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register(ScriptSystem::new(walker), Phase::Script).unwrap();
    engine.register(SpriteRenderSystem::new(Camera::new(100.0, 100.0)), Phase::Late).unwrap();

    // No transform: the script attaches a sprite in SCRIPT and LATE draws it
    let entity = engine.spawn();
    engine.attach(entity, ScriptAttachment::new("walker")).unwrap();

    let stats = engine.run_frame(0.016).unwrap();
    assert_eq!(stats.presented.primitives, 1);
    assert_eq!(engine.render_buffers().presentable().from_source(entity).count(), 1);
}

#[test]
fn test_velocity_command_feeds_motion() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register(MotionSystem::new(), Phase::Early).unwrap();
    engine
        .register(
            ScriptSystem::new(|_dt: f32, instances: &[ScriptInstance]| -> Vec<ScriptCommand> {
                instances
                    .iter()
                    .filter(|instance| instance.velocity.is_none())
                    .map(|instance| ScriptCommand::SetVelocity {
                        entity: instance.entity,
                        dx: 10.0,
                        dy: 0.0,
                    })
                    .collect()
            }),
            Phase::Script,
        )
        .unwrap();

    let entity = engine.spawn();
    engine.attach(entity, ScriptAttachment::new("launcher")).unwrap();
    engine.attach(entity, Transform::new(0.0, 0.0)).unwrap();

    // Velocity is attached during SCRIPT of frame 1 and integrated in EARLY of frame 2
    engine.run_frame(0.5).unwrap();
    assert!(engine.world().first_component::<Velocity>(entity).is_some());
    assert_eq!(engine.world().first_component::<Transform>(entity).unwrap().1.x(), 0.0);

    engine.run_frame(0.5).unwrap();
    assert_eq!(engine.world().first_component::<Transform>(entity).unwrap().1.x(), 5.0);
}
