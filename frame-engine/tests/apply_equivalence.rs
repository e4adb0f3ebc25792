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
//! Parallel and serial phases must produce identical world state

use frame_engine::config::EngineConfig;
use frame_engine::ecs::components::{Transform, Velocity};
use frame_engine::ecs::systems::{BoundsSystem, MotionSystem};
use frame_engine::ecs::{ApplyContext, Component, ComponentHandle, ComponentIndex, Entity, FrameContext, Phase, System};
use frame_engine::error::SystemResult;
use frame_engine::Engine;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Set(f32),
    Add(f32),
    Scale(f32),
}

impl Op {
    fn apply(self, x: f32) -> f32 {
        match self {
            Op::Set(value) => value,
            Op::Add(value) => x + value,
            Op::Scale(value) => x * value,
        }
    }
}

/// Rewrites the x coordinate of every transform with one operation
struct Rewriter {
    name: String,
    op: Op,
    targets: ComponentIndex,
}

impl System for Rewriter {
    type Result = Vec<(ComponentHandle, f32)>;

    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, component: &dyn Component) -> bool {
        component.is::<Transform>()
    }

    fn on_component_added(&mut self, handle: ComponentHandle, owner: Entity, _component: &dyn Component) -> SystemResult<()> {
        self.targets.insert(handle, owner)?;
        Ok(())
    }

    fn on_component_removed(&mut self, handle: ComponentHandle, _owner: Entity, _component: &dyn Component) -> SystemResult<()> {
        self.targets.remove(handle);
        Ok(())
    }

    fn update(&mut self, ctx: &FrameContext<'_>, _dt: f32) -> SystemResult<Option<Self::Result>> {
        // The value read here is the pre-phase state; apply re-reads it
        let mut reads = Vec::with_capacity(self.targets.len());
        for entry in &self.targets {
            reads.push((entry.handle, ctx.world().component::<Transform>(entry.handle)?.x()));
        }
        Ok(Some(reads))
    }

    fn apply_result(&mut self, result: Self::Result, ctx: &mut ApplyContext<'_>) -> SystemResult<()> {
        let world = ctx.world_mut();
        for (handle, _seen) in result {
            let transform = world.component_mut::<Transform>(handle)?;
            let (x, y) = (self.op.apply(transform.x()), transform.y());
            transform.set_position(x, y);
        }
        Ok(())
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-100.0f32..100.0).prop_map(Op::Set),
        (-10.0f32..10.0).prop_map(Op::Add),
        (0.5f32..2.0).prop_map(Op::Scale),
    ]
}

fn simulate(parallel: bool, ops: &[Op], starts: &[(f32, f32)], frames: usize) -> Vec<(f32, f32)> {
    let config = EngineConfig::default()
        .with_worker_threads(4)
        .with_parallel(Phase::Early, parallel)
        .with_parallel(Phase::Script, parallel);
    let mut engine = Engine::new(config).expect("engine");

    engine.register(MotionSystem::new(), Phase::Early).expect("motion");
    engine.register(BoundsSystem::new(), Phase::Early).expect("bounds");
    for (i, &op) in ops.iter().enumerate() {
        let rewriter = Rewriter {
            name: format!("rewriter-{i}"),
            op,
            targets: ComponentIndex::new(),
        };
        let phase = if i % 2 == 0 { Phase::Early } else { Phase::Script };
        engine.register(rewriter, phase).expect("rewriter");
    }

    let mut transforms = Vec::new();
    for &(x, dx) in starts {
        let entity = engine.spawn();
        transforms.push(engine.attach(entity, Transform::new(x, 0.0)).expect("transform"));
        engine.attach(entity, Velocity::new(dx, 1.0)).expect("velocity");
    }

    for _ in 0..frames {
        engine.run_frame(0.016).expect("frame");
    }

    transforms
        .into_iter()
        .map(|handle| {
            let transform = engine.world().component::<Transform>(handle).expect("live transform");
            (transform.x(), transform.y())
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn parallel_phases_match_serial(
        ops in prop::collection::vec(op_strategy(), 1..6),
        starts in prop::collection::vec((-50.0f32..50.0, -5.0f32..5.0), 1..16),
        frames in 1usize..4,
    ) {
        let serial = simulate(false, &ops, &starts, frames);
        let parallel = simulate(true, &ops, &starts, frames);
        prop_assert_eq!(serial, parallel);
    }
}
