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
//! System contract
//!
//! A system is a behavior module registered into one phase. It declares which
//! components it accepts, keeps its own index of them through the
//! add/remove notifications, and is updated once per frame.
//!
//! # Callbacks
//!
//! | callback                | thread      | world access |
//! |-------------------------|-------------|--------------|
//! | `init`                  | frame       | `&World`     |
//! | `accepts`               | frame       | none         |
//! | `on_component_added`    | frame       | none         |
//! | `on_component_removed`  | frame       | none         |
//! | `update`                | any worker  | `&World`     |
//! | `update_serial`         | frame       | `&mut World` |
//! | `apply_result`          | frame       | `&mut World` |
//! | `shutdown`              | frame       | none         |
//!
//! In a parallel phase the scheduler calls `update` on the worker pool and
//! the system hands back its writes as a [`JobResult`]. In a serial phase it
//! calls `update_serial`, which may write directly and defaults to `update`.

use crate::ecs::job::{self, JobResult};
use crate::ecs::{Component, ComponentHandle, Entity, Phase, World};
use crate::error::{SystemError, SystemResult};
use crate::render::{Primitive, RenderBuffers};
use semver::Version;
use std::any::Any;
use std::fmt;

/// System API version implemented by this engine
///
/// Systems declare the version they were written against through
/// [`System::api_version`]; registration rejects incompatible ones.
pub const SYSTEM_API_VERSION: &str = "0.2.0";

/// Identity of a registered system, assigned in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(u64);

impl SystemId {
    pub(crate) fn new(id: u64) -> Self {
        SystemId(id)
    }

    /// Get the raw registration index
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "System({})", self.0)
    }
}

/// Context passed to [`System::init`]
pub struct InitContext<'a> {
    world: &'a World,
    phase: Phase,
    id: SystemId,
}

impl<'a> InitContext<'a> {
    pub(crate) fn new(world: &'a World, phase: Phase, id: SystemId) -> Self {
        InitContext { world, phase, id }
    }

    /// Read-only view of the world at registration time
    pub fn world(&self) -> &'a World {
        self.world
    }

    /// Phase the system is being registered into
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Identity assigned to the system
    pub fn id(&self) -> SystemId {
        self.id
    }
}

fn submit_checked(render: &RenderBuffers, phase: Phase, primitive: Primitive) -> SystemResult<()> {
    if phase != Phase::Late {
        return Err(SystemError::SubmitOutsideLate(phase));
    }
    render.submit(primitive);
    Ok(())
}

fn submit_all_checked<I>(render: &RenderBuffers, phase: Phase, primitives: I) -> SystemResult<usize>
where
    I: IntoIterator<Item = Primitive>,
{
    if phase != Phase::Late {
        return Err(SystemError::SubmitOutsideLate(phase));
    }
    Ok(render.submit_all(primitives))
}

/// Read-only context for [`System::update`]
///
/// Shared across worker threads during a parallel phase. World mutation is
/// not reachable from here; writes go through the system's job result.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    world: &'a World,
    render: &'a RenderBuffers,
    phase: Phase,
    frame: u64,
    parallel: bool,
}

impl<'a> FrameContext<'a> {
    pub(crate) fn new(world: &'a World, render: &'a RenderBuffers, phase: Phase, frame: u64, parallel: bool) -> Self {
        FrameContext {
            world,
            render,
            phase,
            frame,
            parallel,
        }
    }

    /// Read-only view of the world
    pub fn world(&self) -> &'a World {
        self.world
    }

    /// Phase currently executing
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of the frame being produced, starting at 1
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether this update was dispatched as part of a parallel phase
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Append a primitive to the active render list (LATE only)
    pub fn submit(&self, primitive: Primitive) -> SystemResult<()> {
        submit_checked(self.render, self.phase, primitive)
    }

    /// Append several primitives to the active render list (LATE only)
    pub fn submit_all<I>(&self, primitives: I) -> SystemResult<usize>
    where
        I: IntoIterator<Item = Primitive>,
    {
        submit_all_checked(self.render, self.phase, primitives)
    }
}

/// Context for [`System::update_serial`], with direct world access
pub struct SerialContext<'a> {
    world: &'a mut World,
    render: &'a RenderBuffers,
    phase: Phase,
    frame: u64,
}

impl<'a> SerialContext<'a> {
    pub(crate) fn new(world: &'a mut World, render: &'a RenderBuffers, phase: Phase, frame: u64) -> Self {
        SerialContext {
            world,
            render,
            phase,
            frame,
        }
    }

    /// Read-only view of the world
    pub fn world(&self) -> &World {
        &*self.world
    }

    /// Mutable access to the world
    ///
    /// Attach, detach and deletion requests made here are routed right after
    /// the callback returns.
    pub fn world_mut(&mut self) -> &mut World {
        &mut *self.world
    }

    /// Phase currently executing
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of the frame being produced
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Downgrade to the read-only context used by [`System::update`]
    pub fn as_frame_context(&self) -> FrameContext<'_> {
        FrameContext::new(&*self.world, self.render, self.phase, self.frame, false)
    }

    /// Append a primitive to the active render list (LATE only)
    pub fn submit(&self, primitive: Primitive) -> SystemResult<()> {
        submit_checked(self.render, self.phase, primitive)
    }
}

/// Context for [`System::apply_result`]
pub struct ApplyContext<'a> {
    world: &'a mut World,
    render: &'a RenderBuffers,
    phase: Phase,
    frame: u64,
}

impl<'a> ApplyContext<'a> {
    pub(crate) fn new(world: &'a mut World, render: &'a RenderBuffers, phase: Phase, frame: u64) -> Self {
        ApplyContext {
            world,
            render,
            phase,
            frame,
        }
    }

    /// Read-only view of the world
    pub fn world(&self) -> &World {
        &*self.world
    }

    /// Mutable access to the world
    pub fn world_mut(&mut self) -> &mut World {
        &mut *self.world
    }

    /// Phase currently executing
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of the frame being produced
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Append a primitive to the active render list (LATE only)
    pub fn submit(&self, primitive: Primitive) -> SystemResult<()> {
        submit_checked(self.render, self.phase, primitive)
    }
}

/// Trait for systems driven by the phase scheduler
///
/// Only `accepts` and `update` are required. Every other callback has a
/// no-op default.
pub trait System: Send + 'static {
    /// Deferred writes produced by `update`; use `()` if the system never
    /// defers anything
    type Result: JobResult;

    /// Unique name, used for diagnostics and duplicate detection
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// System API version this system was written against
    fn api_version(&self) -> &str {
        SYSTEM_API_VERSION
    }

    /// Called once when the system is registered
    fn init(&mut self, _ctx: &InitContext<'_>) -> SystemResult<()> {
        Ok(())
    }

    /// Whether the system processes this component
    ///
    /// Must be a pure function of the component's type and data.
    fn accepts(&self, component: &dyn Component) -> bool;

    /// An accepted component was attached to a live entity
    fn on_component_added(
        &mut self,
        _handle: ComponentHandle,
        _owner: Entity,
        _component: &dyn Component,
    ) -> SystemResult<()> {
        Ok(())
    }

    /// An accepted component was detached or its owner marked for deletion
    ///
    /// The component is still readable; it is released at the next flush.
    fn on_component_removed(
        &mut self,
        _handle: ComponentHandle,
        _owner: Entity,
        _component: &dyn Component,
    ) -> SystemResult<()> {
        Ok(())
    }

    /// Per-frame update with read-only world access
    fn update(&mut self, ctx: &FrameContext<'_>, dt: f32) -> SystemResult<Option<Self::Result>>;

    /// Per-frame update in a serial phase
    ///
    /// May mutate the world directly. Defaults to [`update`](Self::update).
    fn update_serial(&mut self, ctx: &mut SerialContext<'_>, dt: f32) -> SystemResult<Option<Self::Result>> {
        self.update(&ctx.as_frame_context(), dt)
    }

    /// Consume a deferred result on the frame thread
    fn apply_result(&mut self, result: Self::Result, _ctx: &mut ApplyContext<'_>) -> SystemResult<()> {
        drop(result);
        Ok(())
    }

    /// Called once at scheduler teardown
    fn shutdown(&mut self) {}
}

/// Check whether a system API version can run on this engine
///
/// Major versions must match. For `0.x` the minor version must match too;
/// from `1.0` on a system may target an older minor version.
pub fn is_api_compatible(system_version: &str, engine_version: &str) -> bool {
    let (Ok(system), Ok(engine)) = (Version::parse(system_version), Version::parse(engine_version)) else {
        return false;
    };

    if system.major != engine.major {
        return false;
    }

    if system.major != 0 {
        system.minor <= engine.minor
    } else {
        system.minor == engine.minor
    }
}

/// Object-safe view of a [`System`] together with its pending result
pub(crate) trait AnySystem: Send {
    fn name(&self) -> &str;
    fn api_version(&self) -> &str;
    fn init(&mut self, ctx: &InitContext<'_>) -> SystemResult<()>;
    fn accepts(&self, component: &dyn Component) -> bool;
    fn component_added(&mut self, handle: ComponentHandle, owner: Entity, component: &dyn Component) -> SystemResult<()>;
    fn component_removed(&mut self, handle: ComponentHandle, owner: Entity, component: &dyn Component) -> SystemResult<()>;

    /// Run `update`; `off_thread` results are duplicated and released here.
    /// Returns whether a result is now pending.
    fn run_update(&mut self, ctx: &FrameContext<'_>, dt: f32, off_thread: bool) -> SystemResult<bool>;
    fn run_update_serial(&mut self, ctx: &mut SerialContext<'_>, dt: f32) -> SystemResult<bool>;

    fn has_pending(&self) -> bool;
    fn pending_bytes(&self) -> usize;
    /// Returns whether there was a result to apply
    fn apply_pending(&mut self, ctx: &mut ApplyContext<'_>) -> SystemResult<bool>;
    fn discard_pending(&mut self);

    fn shutdown(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct SystemCell<S: System> {
    system: S,
    pending: Option<S::Result>,
}

impl<S: System> SystemCell<S> {
    pub(crate) fn new(system: S) -> Self {
        SystemCell { system, pending: None }
    }
}

impl<S: System> AnySystem for SystemCell<S> {
    fn name(&self) -> &str {
        self.system.name()
    }

    fn api_version(&self) -> &str {
        self.system.api_version()
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> SystemResult<()> {
        self.system.init(ctx)
    }

    fn accepts(&self, component: &dyn Component) -> bool {
        self.system.accepts(component)
    }

    fn component_added(&mut self, handle: ComponentHandle, owner: Entity, component: &dyn Component) -> SystemResult<()> {
        self.system.on_component_added(handle, owner, component)
    }

    fn component_removed(&mut self, handle: ComponentHandle, owner: Entity, component: &dyn Component) -> SystemResult<()> {
        self.system.on_component_removed(handle, owner, component)
    }

    fn run_update(&mut self, ctx: &FrameContext<'_>, dt: f32, off_thread: bool) -> SystemResult<bool> {
        let produced = self.system.update(ctx, dt)?.map(|original| {
            if off_thread {
                job::hand_off(original)
            } else {
                original
            }
        });
        self.pending = produced;
        Ok(self.pending.is_some())
    }

    fn run_update_serial(&mut self, ctx: &mut SerialContext<'_>, dt: f32) -> SystemResult<bool> {
        self.pending = self.system.update_serial(ctx, dt)?;
        Ok(self.pending.is_some())
    }

    fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn pending_bytes(&self) -> usize {
        self.pending.as_ref().map_or(0, |result| result.byte_size())
    }

    fn apply_pending(&mut self, ctx: &mut ApplyContext<'_>) -> SystemResult<bool> {
        match self.pending.take() {
            Some(result) => {
                self.system.apply_result(result, ctx)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn discard_pending(&mut self) {
        self.pending = None;
    }

    fn shutdown(&mut self) {
        self.system.shutdown();
    }

    fn as_any(&self) -> &dyn Any {
        &self.system
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.system
    }
}
