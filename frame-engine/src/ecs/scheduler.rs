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
//! Phase scheduler with parallel execution support
//!
//! Systems are grouped into the three fixed phases. A frame runs:
//!
//! ```text
//! EARLY  updates ─┐ join ─> apply (registration order)
//! SCRIPT updates ─┐ join ─> apply (registration order)
//! LATE   updates ─┐ join ─> apply (registration order)
//! end_frame: flip render lists ─> clear active ─> flush deletions
//! ```
//!
//! Within a parallel phase every update runs on the worker pool with a
//! read-only world and hands its writes back as a job result. Apply steps are
//! always serial on the calling thread, so the final state of a parallel
//! phase equals that of a serial one.

use crate::config::SchedulerConfig;
use crate::ecs::system::{AnySystem, SystemCell};
use crate::ecs::{
    is_api_compatible, ApplyContext, FlushReport, FrameContext, InitContext, Phase, RoutingEvent,
    SerialContext, System, SystemId, World, SYSTEM_API_VERSION,
};
use crate::error::{EngineError, EngineResult, SystemError};
use crate::render::{PresentNotice, RenderBuffers};
use std::collections::HashSet;
use std::time::{Duration, Instant};

struct SystemSlot {
    id: SystemId,
    name: String,
    phase: Phase,
    cell: Box<dyn AnySystem>,
}

/// Outcome of one [`Scheduler::run_phase`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseReport {
    /// Phase that ran
    pub phase: Phase,
    /// Number of update calls made
    pub systems_updated: usize,
    /// Number of `apply_result` calls made
    pub results_applied: usize,
    /// Total size of the applied job results in bytes
    pub result_bytes: usize,
    /// Whether updates were dispatched to the worker pool
    pub parallel: bool,
    /// Wall time of updates plus applies
    pub elapsed: Duration,
}

/// Outcome of one full frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    /// One report per phase, in execution order
    pub phases: Vec<PhaseReport>,
    /// What was handed to the presentation consumer
    pub presented: PresentNotice,
    /// What the end-of-frame flush freed
    pub flushed: FlushReport,
    /// Wall time of the whole frame
    pub elapsed: Duration,
}

/// Phase-ordered system scheduler
///
/// Owns exactly one instance of each registered system. Systems are shut
/// down in reverse registration order by [`teardown`](Self::teardown), which
/// also runs when the scheduler is dropped.
///
/// # Examples
///
/// ```
/// use frame_engine::ecs::{Component, FrameContext, Phase, Scheduler, System, World};
/// use frame_engine::error::SystemResult;
/// use frame_engine::render::RenderBuffers;
///
/// struct Tick(u32);
///
/// impl System for Tick {
///     type Result = ();
///
///     fn accepts(&self, _component: &dyn Component) -> bool {
///         false
///     }
///
///     fn update(&mut self, _ctx: &FrameContext<'_>, _dt: f32) -> SystemResult<Option<()>> {
///         self.0 += 1;
///         Ok(None)
///     }
/// }
///
/// let mut world = World::new();
/// let render = RenderBuffers::new(16);
/// let mut scheduler = Scheduler::new();
/// let id = scheduler.register(Tick(0), Phase::Early, &mut world).unwrap();
///
/// scheduler.run_frame(&mut world, &render, 0.016).unwrap();
/// assert_eq!(scheduler.system::<Tick>(id).unwrap().0, 1);
/// ```
pub struct Scheduler {
    phases: [Vec<SystemSlot>; 3],
    names: HashSet<String>,
    next_id: u64,
    config: SchedulerConfig,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    next_phase: Option<Phase>,
    frame: u64,
    poisoned: bool,
    shut_down: bool,
}

impl Scheduler {
    /// Create a scheduler with the default configuration
    ///
    /// Parallel phases use rayon's global pool.
    pub fn new() -> Self {
        Self::build(SchedulerConfig::default())
    }

    fn build(config: SchedulerConfig) -> Self {
        Scheduler {
            phases: [Vec::new(), Vec::new(), Vec::new()],
            names: HashSet::new(),
            next_id: 0,
            config,
            #[cfg(feature = "parallel")]
            pool: None,
            next_phase: Some(Phase::Early),
            frame: 0,
            poisoned: false,
            shut_down: false,
        }
    }

    /// Create a scheduler with its own worker pool sized from `config`
    pub fn with_config(config: SchedulerConfig) -> EngineResult<Self> {
        let mut scheduler = Self::build(config);
        scheduler.start_pool()?;
        Ok(scheduler)
    }

    #[cfg(feature = "parallel")]
    fn start_pool(&mut self) -> EngineResult<()> {
        if !self.config.any_parallel() {
            return Ok(());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .thread_name(|index| format!("frame-worker-{index}"))
            .build()?;
        tracing::debug!(threads = pool.current_num_threads(), "worker pool started");
        self.pool = Some(pool);
        Ok(())
    }

    #[cfg(not(feature = "parallel"))]
    fn start_pool(&mut self) -> EngineResult<()> {
        Ok(())
    }

    /// The configuration the scheduler was built with
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a system into a phase
    ///
    /// Calls `init`, then offers every component already attached to a live
    /// entity to `accepts`, so a late registration ends up with the same
    /// index as an early one. Pending routing events are delivered to the
    /// existing systems first.
    pub fn register<S: System>(&mut self, system: S, phase: Phase, world: &mut World) -> EngineResult<SystemId> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }

        let name = system.name().to_string();
        if self.names.contains(&name) {
            return Err(EngineError::DuplicateSystem(name));
        }

        let api_version = system.api_version();
        if !is_api_compatible(api_version, SYSTEM_API_VERSION) {
            return Err(EngineError::IncompatibleApi {
                system: name,
                found: api_version.to_string(),
                required: SYSTEM_API_VERSION,
            });
        }

        self.deliver_events(world)?;

        let id = SystemId::new(self.next_id);
        let mut cell: Box<dyn AnySystem> = Box::new(SystemCell::new(system));
        let init_failed = |source: SystemError| EngineError::InitFailed {
            system: name.clone(),
            source,
        };

        cell.init(&InitContext::new(world, phase, id)).map_err(init_failed)?;

        let mut backfilled = 0;
        for (handle, owner, component) in world.components().iter_attached() {
            if !cell.accepts(component) {
                continue;
            }
            if let Err(err) = cell.component_added(handle, owner, component) {
                // init already ran, so the system is owed its shutdown
                tracing::warn!(system = %name, error = %err, "backfill failed, shutting system down");
                cell.shutdown();
                return Err(init_failed(err));
            }
            backfilled += 1;
        }

        self.next_id += 1;
        self.names.insert(name.clone());
        tracing::debug!(system = %name, %phase, id = id.raw(), backfilled, "system registered");
        self.phases[phase.index()].push(SystemSlot {
            id,
            name,
            phase,
            cell,
        });
        Ok(id)
    }

    /// Deliver one routing event to every accepting system
    ///
    /// Systems are visited in phase order, then registration order. Events
    /// whose component has already been released are skipped.
    pub fn route(&mut self, world: &World, event: RoutingEvent) -> EngineResult<()> {
        let handle = event.handle();
        let Some(component) = world.component_dyn(handle) else {
            tracing::warn!(?handle, "routing event for a released component skipped");
            return Ok(());
        };

        for slot in self.phases.iter_mut().flatten() {
            if !slot.cell.accepts(component) {
                continue;
            }
            let outcome = match event {
                RoutingEvent::Attached { handle, owner } => slot.cell.component_added(handle, owner, component),
                RoutingEvent::Detached { handle, owner } => slot.cell.component_removed(handle, owner, component),
            };
            outcome.map_err(|source| EngineError::SystemFailed {
                phase: slot.phase,
                system: slot.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Deliver every routing event the world has queued, in order
    ///
    /// A callback failure leaves system indices out of sync with the world,
    /// so it poisons the scheduler.
    pub fn deliver_events(&mut self, world: &mut World) -> EngineResult<usize> {
        let events = world.drain_events();
        let count = events.len();
        for event in events {
            if let Err(err) = self.route(world, event) {
                tracing::error!(error = %err, "component routing failed");
                self.poisoned = true;
                return Err(err);
            }
        }
        Ok(count)
    }

    fn check_runnable(&self) -> EngineResult<()> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }
        if self.poisoned {
            tracing::warn!("frame requested on a poisoned scheduler");
            return Err(EngineError::Poisoned);
        }
        Ok(())
    }

    fn expected_step(&self) -> String {
        match self.next_phase {
            Some(phase) => format!("{phase} phase"),
            None => "end of frame".to_string(),
        }
    }

    /// Run one phase: every update, then every apply
    ///
    /// With `parallel` set, updates are dispatched to the worker pool and
    /// joined before any result is applied. Phases must be run in order,
    /// followed by [`end_frame`](Self::end_frame).
    pub fn run_phase(
        &mut self,
        phase: Phase,
        world: &mut World,
        render: &RenderBuffers,
        dt: f32,
        parallel: bool,
    ) -> EngineResult<PhaseReport> {
        self.check_runnable()?;
        if self.next_phase != Some(phase) {
            return Err(EngineError::PhaseOutOfOrder {
                expected: self.expected_step(),
                got: format!("{phase} phase"),
            });
        }
        if phase == Phase::Early {
            self.frame += 1;
        }

        let start = Instant::now();
        if let Err(err) = self.deliver_events(world) {
            return Err(self.poison(phase, err));
        }

        let updated = if parallel {
            self.update_parallel(phase, world, render, dt)?
        } else {
            self.update_serial(phase, world, render, dt)?
        };
        let (applied, result_bytes) = self.apply_results(phase, world, render)?;

        self.next_phase = phase.next();
        let report = PhaseReport {
            phase,
            systems_updated: updated,
            results_applied: applied,
            result_bytes,
            parallel,
            elapsed: start.elapsed(),
        };
        tracing::trace!(
            %phase,
            frame = self.frame,
            updated,
            applied,
            parallel,
            elapsed_us = report.elapsed.as_micros() as u64,
            "phase complete"
        );
        Ok(report)
    }

    fn update_serial(&mut self, phase: Phase, world: &mut World, render: &RenderBuffers, dt: f32) -> EngineResult<usize> {
        let frame = self.frame;
        let count = self.phases[phase.index()].len();

        for index in 0..count {
            let slot = &mut self.phases[phase.index()][index];
            let mut ctx = SerialContext::new(world, render, phase, frame);
            if let Err(source) = slot.cell.run_update_serial(&mut ctx, dt) {
                let system = slot.name.clone();
                return Err(self.fail(phase, system, source));
            }
            if let Err(err) = self.deliver_events(world) {
                return Err(self.poison(phase, err));
            }
        }
        Ok(count)
    }

    #[cfg(feature = "parallel")]
    fn update_parallel(&mut self, phase: Phase, world: &World, render: &RenderBuffers, dt: f32) -> EngineResult<usize> {
        use rayon::prelude::*;

        let ctx = FrameContext::new(world, render, phase, self.frame, true);
        let slots = &mut self.phases[phase.index()];
        let count = slots.len();

        let mut run = || {
            slots
                .par_iter_mut()
                .map(|slot| slot.cell.run_update(&ctx, dt, true).err().map(|e| (slot.name.clone(), e)))
                .collect::<Vec<_>>()
        };
        let outcomes = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        // Report the failure of the earliest registered system
        if let Some((system, source)) = outcomes.into_iter().flatten().next() {
            return Err(self.fail(phase, system, source));
        }
        Ok(count)
    }

    #[cfg(not(feature = "parallel"))]
    fn update_parallel(&mut self, phase: Phase, world: &World, render: &RenderBuffers, dt: f32) -> EngineResult<usize> {
        // Same read-only protocol, executed on the calling thread
        let ctx = FrameContext::new(world, render, phase, self.frame, true);
        let count = self.phases[phase.index()].len();

        for index in 0..count {
            let slot = &mut self.phases[phase.index()][index];
            if let Err(source) = slot.cell.run_update(&ctx, dt, false) {
                let system = slot.name.clone();
                return Err(self.fail(phase, system, source));
            }
        }
        Ok(count)
    }

    fn apply_results(&mut self, phase: Phase, world: &mut World, render: &RenderBuffers) -> EngineResult<(usize, usize)> {
        let frame = self.frame;
        let mut applied = 0;
        let mut bytes = 0;

        for index in 0..self.phases[phase.index()].len() {
            let slot = &mut self.phases[phase.index()][index];
            if !slot.cell.has_pending() {
                continue;
            }

            bytes += slot.cell.pending_bytes();
            let mut ctx = ApplyContext::new(world, render, phase, frame);
            if let Err(source) = slot.cell.apply_pending(&mut ctx) {
                let system = slot.name.clone();
                return Err(self.fail(phase, system, source));
            }
            applied += 1;
            tracing::trace!(%phase, system = %slot.name, "result applied");

            if let Err(err) = self.deliver_events(world) {
                return Err(self.poison(phase, err));
            }
        }
        Ok((applied, bytes))
    }

    /// Flip the render lists, clear the new active list and flush deletions
    ///
    /// Must follow the LATE phase of the current frame.
    pub fn end_frame(&mut self, world: &mut World, render: &RenderBuffers) -> EngineResult<(PresentNotice, FlushReport)> {
        self.check_runnable()?;
        if self.next_phase.is_some() {
            return Err(EngineError::PhaseOutOfOrder {
                expected: self.expected_step(),
                got: "end of frame".to_string(),
            });
        }

        if let Err(err) = self.deliver_events(world) {
            return Err(self.poison(Phase::Late, err));
        }

        let presented = render.flip();
        render.clear_active();
        let flushed = world.flush_deletions();

        self.next_phase = Some(Phase::Early);
        Ok((presented, flushed))
    }

    /// Run EARLY, SCRIPT and LATE with their configured parallelism, then
    /// end the frame
    pub fn run_frame(&mut self, world: &mut World, render: &RenderBuffers, dt: f32) -> EngineResult<FrameStats> {
        let start = Instant::now();
        let mut phases = Vec::with_capacity(Phase::ALL.len());

        for phase in Phase::ALL {
            let parallel = self.config.parallel_for(phase);
            phases.push(self.run_phase(phase, world, render, dt, parallel)?);
        }
        let (presented, flushed) = self.end_frame(world, render)?;

        Ok(FrameStats {
            frame: self.frame,
            phases,
            presented,
            flushed,
            elapsed: start.elapsed(),
        })
    }

    fn fail(&mut self, phase: Phase, system: String, source: SystemError) -> EngineError {
        tracing::error!(%phase, system = %system, error = %source, "system failed, frame aborted");
        self.poison(
            phase,
            EngineError::SystemFailed {
                phase,
                system,
                source,
            },
        )
    }

    fn poison(&mut self, phase: Phase, err: EngineError) -> EngineError {
        for slot in self.phases[phase.index()].iter_mut() {
            slot.cell.discard_pending();
        }
        self.poisoned = true;
        err
    }

    /// Shut every system down in reverse registration order
    ///
    /// Idempotent. The scheduler rejects all further calls afterwards.
    pub fn teardown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let mut slots: Vec<SystemSlot> = self.phases.iter_mut().flat_map(std::mem::take).collect();
        slots.sort_by_key(|slot| std::cmp::Reverse(slot.id));

        for mut slot in slots {
            slot.cell.discard_pending();
            slot.cell.shutdown();
            tracing::debug!(system = %slot.name, id = slot.id.raw(), "system shut down");
        }
        self.names.clear();
    }

    fn find(&self, id: SystemId) -> Option<&SystemSlot> {
        self.phases.iter().flatten().find(|slot| slot.id == id)
    }

    /// Borrow a registered system as its concrete type
    pub fn system<S: System>(&self, id: SystemId) -> Option<&S> {
        self.find(id)?.cell.as_any().downcast_ref::<S>()
    }

    /// Mutably borrow a registered system as its concrete type
    pub fn system_mut<S: System>(&mut self, id: SystemId) -> Option<&mut S> {
        self.phases
            .iter_mut()
            .flatten()
            .find(|slot| slot.id == id)?
            .cell
            .as_any_mut()
            .downcast_mut::<S>()
    }

    /// Look up a system id by name
    pub fn system_id(&self, name: &str) -> Option<SystemId> {
        self.phases.iter().flatten().find(|slot| slot.name == name).map(|slot| slot.id)
    }

    /// Phase a system was registered into
    pub fn phase_of(&self, id: SystemId) -> Option<Phase> {
        self.find(id).map(|slot| slot.phase)
    }

    /// Names of the systems in a phase, in registration order
    pub fn system_names(&self, phase: Phase) -> Vec<&str> {
        self.phases[phase.index()].iter().map(|slot| slot.name.as_str()).collect()
    }

    /// Number of registered systems
    pub fn system_count(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    /// Number of systems in a phase
    pub fn phase_len(&self, phase: Phase) -> usize {
        self.phases[phase.index()].len()
    }

    /// Number of the current (or last completed) frame
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether a frame error has stopped the scheduler
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Whether [`teardown`](Self::teardown) has run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.teardown();
    }
}
