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
//! Render list handoff between the frame thread and a presentation thread

use frame_engine::config::EngineConfig;
use frame_engine::ecs::{Component, FrameContext, Phase, System};
use frame_engine::error::{SystemError, SystemResult};
use frame_engine::render::{Primitive, RenderList};
use frame_engine::Engine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const PRIMITIVES_PER_PAINTER: usize = 64;

/// Submits a fixed number of primitives stamped with the current frame
struct Painter {
    name: &'static str,
}

impl System for Painter {
    type Result = ();

    fn name(&self) -> &str {
        self.name
    }

    fn accepts(&self, _component: &dyn Component) -> bool {
        false
    }

    fn update(&mut self, ctx: &FrameContext<'_>, _dt: f32) -> SystemResult<Option<()>> {
        let layer = ctx.frame() as i32;
        for i in 0..PRIMITIVES_PER_PAINTER {
            // Submit one at a time so a reader has every chance to catch a
            // half-built list
            ctx.submit(Primitive::rect(i as f32, 0.0, 1.0, 1.0).with_layer(layer))?;
        }
        Ok(None)
    }
}

/// Tries to draw before LATE
struct EarlyPainter;

impl System for EarlyPainter {
    type Result = ();

    fn accepts(&self, _component: &dyn Component) -> bool {
        false
    }

    fn update(&mut self, ctx: &FrameContext<'_>, _dt: f32) -> SystemResult<Option<()>> {
        ctx.submit(Primitive::rect(0.0, 0.0, 1.0, 1.0))?;
        Ok(None)
    }
}

fn assert_complete(list: &RenderList, painters: usize) {
    if list.frame() == 0 {
        assert!(list.is_empty());
        return;
    }
    assert_eq!(list.len(), painters * PRIMITIVES_PER_PAINTER, "frame {}", list.frame());
    assert!(list.iter().all(|primitive| primitive.layer as u64 == list.frame()));
}

#[test]
fn test_reader_never_sees_a_torn_frame() {
    let config = EngineConfig::default().with_worker_threads(3).with_parallel(Phase::Late, true);
    let mut engine = Engine::new(config).unwrap();
    for name in ["painter-a", "painter-b", "painter-c"] {
        engine.register(Painter { name }, Phase::Late).unwrap();
    }

    let render = engine.render_buffers();
    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut observed = 0u64;
            let mut last_frame = 0;
            while !done.load(Ordering::Acquire) {
                let list = render.presentable();
                assert_complete(&list, 3);
                assert!(list.frame() >= last_frame, "presentable frame went backwards");
                last_frame = list.frame();
                observed += 1;
            }
            observed
        })
    };

    for _ in 0..200 {
        let stats = engine.run_frame(0.016).unwrap();
        assert_eq!(stats.presented.primitives, 3 * PRIMITIVES_PER_PAINTER);
    }
    done.store(true, Ordering::Release);

    let observed = reader.join().unwrap();
    assert!(observed > 0);
    assert_complete(&engine.render_buffers().presentable(), 3);
}

#[test]
fn test_present_notices_follow_flips() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register(Painter { name: "painter" }, Phase::Late).unwrap();
    let notices = engine.subscribe();

    let consumer = thread::spawn(move || {
        let mut frames = Vec::new();
        while let Ok(notice) = notices.recv() {
            frames.push(notice.frame);
            if notice.frame == 3 {
                break;
            }
        }
        frames
    });

    for _ in 0..3 {
        engine.run_frame(0.016).unwrap();
    }
    assert_eq!(consumer.join().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_active_list_is_cleared_after_flip() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register(Painter { name: "painter" }, Phase::Late).unwrap();
    engine.run_frame(0.016).unwrap();

    let render = engine.render_buffers();
    assert!(render.active().is_empty());
    assert_eq!(render.presentable().len(), PRIMITIVES_PER_PAINTER);
    assert_eq!(render.frame(), 1);
}

#[test]
fn test_drawing_outside_late_fails_the_frame() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.register(EarlyPainter, Phase::Early).unwrap();

    let err = engine.run_frame(0.016).unwrap_err();
    match err {
        frame_engine::EngineError::SystemFailed { source, .. } => {
            assert!(matches!(source, SystemError::SubmitOutsideLate(Phase::Early)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine.render_buffers().presentable().is_empty());
}
