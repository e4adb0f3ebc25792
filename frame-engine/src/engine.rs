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
//! Frame engine facade
//!
//! [`Engine`] owns the world, the scheduler and the render double buffer and
//! drives whole frames. Attach, detach and deletion calls made through the
//! engine are routed to the accepting systems before they return.

use crate::config::EngineConfig;
use crate::ecs::{
    Component, ComponentHandle, Entity, FrameStats, Phase, PhaseReport, Scheduler, System, SystemId, World,
};
use crate::error::EngineResult;
use crate::render::{PresentNotice, RenderBuffers};
use crossbeam_channel::Receiver;
use std::path::Path;
use std::sync::Arc;

/// Owns one world, one scheduler and one render double buffer
///
/// # Examples
///
/// ```
/// use frame_engine::config::EngineConfig;
/// use frame_engine::ecs::components::{Sprite, Transform};
/// use frame_engine::ecs::systems::{Camera, SpriteRenderSystem};
/// use frame_engine::ecs::Phase;
/// use frame_engine::Engine;
///
/// let mut engine = Engine::new(EngineConfig::default()).unwrap();
/// engine
///     .register(SpriteRenderSystem::new(Camera::new(800.0, 600.0)), Phase::Late)
///     .unwrap();
///
/// let entity = engine.spawn();
/// engine.attach(entity, Transform::new(10.0, 10.0)).unwrap();
/// engine.attach(entity, Sprite::new(1, 8.0, 8.0)).unwrap();
///
/// let stats = engine.run_frame(0.016).unwrap();
/// assert_eq!(stats.presented.primitives, 1);
/// assert_eq!(engine.render_buffers().presentable().from_source(entity).count(), 1);
/// ```
pub struct Engine {
    world: World,
    scheduler: Scheduler,
    render: Arc<RenderBuffers>,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine from a validated configuration
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let world = World::with_capacity(config.world.entity_capacity, config.world.component_capacity);
        let scheduler = Scheduler::with_config(config.scheduler.clone())?;
        let render = RenderBuffers::new(config.render.initial_capacity)
            .with_layer_sort(config.render.sort_by_layer)
            .with_notify_capacity(config.render.notify_capacity);

        tracing::debug!(
            worker_threads = config.scheduler.worker_threads,
            parallel_early = config.scheduler.parallel_early,
            "engine created"
        );

        Ok(Engine {
            world,
            scheduler,
            render: Arc::new(render),
            config,
        })
    }

    /// Load a TOML configuration file, apply environment overrides and build
    /// an engine from it
    pub fn from_config_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let config = EngineConfig::load(path)?.apply_env_overrides()?;
        Self::new(config)
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a system in `phase`
    ///
    /// The system is initialized and then sees every component already
    /// attached to a live entity that it accepts.
    pub fn register<S: System>(&mut self, system: S, phase: Phase) -> EngineResult<SystemId> {
        self.scheduler.register(system, phase, &mut self.world)
    }

    /// Create a live entity
    pub fn spawn(&mut self) -> Entity {
        self.world.spawn()
    }

    /// Create a live entity that survives [`clear`](Self::clear)
    pub fn spawn_persistent(&mut self) -> Entity {
        self.world.spawn_persistent()
    }

    /// Attach a component and notify every accepting system
    pub fn attach<C: Component>(&mut self, entity: Entity, component: C) -> EngineResult<ComponentHandle> {
        let handle = self.world.attach(entity, component)?;
        self.scheduler.deliver_events(&mut self.world)?;
        Ok(handle)
    }

    /// Detach a component and notify every accepting system
    ///
    /// Returns `false` if the component was already detached. Its storage
    /// is released at the end of the frame.
    pub fn detach(&mut self, handle: ComponentHandle) -> EngineResult<bool> {
        let detached = self.world.detach(handle)?;
        self.scheduler.deliver_events(&mut self.world)?;
        Ok(detached)
    }

    /// Queue an entity for deletion at the end of the frame
    ///
    /// The entity's components are unrouted immediately; the entity itself
    /// stays dereferenceable until the flush.
    pub fn mark_for_deletion(&mut self, entity: Entity) -> EngineResult<bool> {
        let marked = self.world.mark_for_deletion(entity)?;
        self.scheduler.deliver_events(&mut self.world)?;
        Ok(marked)
    }

    /// Mark every live entity for deletion, keeping persistent ones unless
    /// `include_persistent` is set
    pub fn clear(&mut self, include_persistent: bool) -> EngineResult<usize> {
        let marked = self.world.clear(include_persistent)?;
        self.scheduler.deliver_events(&mut self.world)?;
        Ok(marked)
    }

    /// Run one full frame with the configured per-phase parallelism
    pub fn run_frame(&mut self, dt: f32) -> EngineResult<FrameStats> {
        let stats = self.scheduler.run_frame(&mut self.world, &self.render, dt)?;
        tracing::trace!(
            frame = stats.frame,
            primitives = stats.presented.primitives,
            freed = stats.flushed.entities_freed,
            "frame complete"
        );
        Ok(stats)
    }

    /// Run a single phase with its configured parallelism
    ///
    /// Phases must be run in order and followed by
    /// [`end_frame`](Self::end_frame).
    pub fn run_phase(&mut self, phase: Phase, dt: f32) -> EngineResult<PhaseReport> {
        let parallel = self.config.scheduler.parallel_for(phase);
        self.scheduler.run_phase(phase, &mut self.world, &self.render, dt, parallel)
    }

    /// Flip the render lists and flush pending deletions
    pub fn end_frame(&mut self) -> EngineResult<PresentNotice> {
        let (presented, _) = self.scheduler.end_frame(&mut self.world, &self.render)?;
        Ok(presented)
    }

    /// Shared handle to the render double buffer for a presentation thread
    pub fn render_buffers(&self) -> Arc<RenderBuffers> {
        Arc::clone(&self.render)
    }

    /// Subscribe to present notifications
    pub fn subscribe(&self) -> Receiver<PresentNotice> {
        self.render.subscribe()
    }

    /// Read-only world access
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access
    ///
    /// Attachments made here are routed at the start of the next phase
    /// rather than immediately.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The scheduler
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Borrow a registered system as its concrete type
    pub fn system<S: System>(&self, id: SystemId) -> Option<&S> {
        self.scheduler.system(id)
    }

    /// Mutably borrow a registered system as its concrete type
    pub fn system_mut<S: System>(&mut self, id: SystemId) -> Option<&mut S> {
        self.scheduler.system_mut(id)
    }

    /// Number of frames started
    pub fn frame(&self) -> u64 {
        self.scheduler.frame()
    }

    /// Shut every system down in reverse registration order
    pub fn shutdown(&mut self) {
        self.scheduler.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Transform, Velocity};
    use crate::ecs::systems::MotionSystem;
    use crate::error::EngineError;

    #[test]
    fn test_attach_is_routed_immediately() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let id = engine.register(MotionSystem::new(), Phase::Early).unwrap();

        let entity = engine.spawn();
        engine.attach(entity, Transform::new(0.0, 0.0)).unwrap();
        let velocity = engine.attach(entity, Velocity::new(1.0, 0.0)).unwrap();
        assert_eq!(engine.system::<MotionSystem>(id).unwrap().tracked(), 1);
        assert_eq!(engine.world().pending_events(), 0);

        assert!(engine.detach(velocity).unwrap());
        assert_eq!(engine.system::<MotionSystem>(id).unwrap().tracked(), 0);
    }

    #[test]
    fn test_mark_for_deletion_unroutes_before_flush() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let id = engine.register(MotionSystem::new(), Phase::Early).unwrap();

        let entity = engine.spawn();
        engine.attach(entity, Transform::new(0.0, 0.0)).unwrap();
        engine.attach(entity, Velocity::new(1.0, 0.0)).unwrap();

        assert!(engine.mark_for_deletion(entity).unwrap());
        assert_eq!(engine.system::<MotionSystem>(id).unwrap().tracked(), 0);
        assert!(engine.world().exists(entity));

        engine.run_frame(0.016).unwrap();
        assert!(!engine.world().exists(entity));
    }

    #[test]
    fn test_clear_keeps_persistent_entities() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let keep = engine.spawn_persistent();
        let drop = engine.spawn();

        assert_eq!(engine.clear(false).unwrap(), 1);
        engine.run_frame(0.016).unwrap();
        assert!(engine.world().is_live(keep));
        assert!(!engine.world().exists(drop));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig::default().with_render_capacity(0).with_world_capacity(0, 0);
        assert!(matches!(Engine::new(config), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_shutdown_rejects_frames() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.shutdown();
        assert!(matches!(engine.run_frame(0.016), Err(EngineError::ShutDown)));
    }
}
