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
//! Scripting runtime adapter
//!
//! The engine does not embed a language. A [`ScriptRuntime`] is whatever
//! drives script logic (an interpreter, a VM, or a plain closure); it sees a
//! read-only snapshot of the scripted entities and answers with a list of
//! [`ScriptCommand`]s. [`ScriptSystem`] wraps a runtime as an ordinary SCRIPT
//! phase system: commands are its job result and are applied on the frame
//! thread in the order the runtime returned them.
//!
//! Any closure `FnMut(f32, &[ScriptInstance]) -> Vec<ScriptCommand>` is a
//! runtime.

use crate::ecs::components::{Sprite, Transform, Velocity};
use crate::ecs::{
    ApplyContext, Component, ComponentHandle, ComponentIndex, Entity, FrameContext, InitContext, JobResult, Phase,
    System, World,
};
use crate::error::{SystemError, SystemResult};
use std::collections::HashMap;

/// Binds a script to an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptAttachment {
    script: String,
}

impl ScriptAttachment {
    /// Attach the script identified by `script` (a path or module name)
    pub fn new(script: impl Into<String>) -> Self {
        ScriptAttachment { script: script.into() }
    }

    /// Script identifier
    pub fn script(&self) -> &str {
        &self.script
    }
}

impl Component for ScriptAttachment {}

/// Snapshot of one scripted entity handed to the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptInstance {
    /// The scripted entity
    pub entity: Entity,
    /// Script identifier
    pub script: String,
    /// Position, if the entity has a [`Transform`]
    pub position: Option<(f32, f32)>,
    /// Velocity, if the entity has a [`Velocity`]
    pub velocity: Option<(f32, f32)>,
}

/// A change requested by a script
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    /// Move an entity, attaching a [`Transform`] if it has none
    SetPosition {
        /// Target entity
        entity: Entity,
        /// New x coordinate
        x: f32,
        /// New y coordinate
        y: f32,
    },
    /// Change velocity, attaching a [`Velocity`] if it has none
    SetVelocity {
        /// Target entity
        entity: Entity,
        /// New x component
        dx: f32,
        /// New y component
        dy: f32,
    },
    /// Mark an entity for deletion
    Despawn {
        /// Target entity
        entity: Entity,
    },
    /// Attach a sprite
    AttachSprite {
        /// Target entity
        entity: Entity,
        /// Sprite to attach
        sprite: Sprite,
    },
}

impl ScriptCommand {
    /// Entity the command targets
    pub fn entity(&self) -> Entity {
        match *self {
            ScriptCommand::SetPosition { entity, .. }
            | ScriptCommand::SetVelocity { entity, .. }
            | ScriptCommand::Despawn { entity }
            | ScriptCommand::AttachSprite { entity, .. } => entity,
        }
    }
}

/// Commands produced by one script update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptCommands(pub Vec<ScriptCommand>);

impl JobResult for ScriptCommands {
    fn duplicate(&self) -> Self {
        self.clone()
    }

    fn byte_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.0.len() * std::mem::size_of::<ScriptCommand>()
    }
}

/// Embedded scripting runtime
pub trait ScriptRuntime: Send + 'static {
    /// Prepare a script the first time an entity uses it
    fn load(&mut self, _script: &str) -> SystemResult<()> {
        Ok(())
    }

    /// Run one update over every scripted entity
    fn call_update(&mut self, dt: f32, instances: &[ScriptInstance]) -> SystemResult<Vec<ScriptCommand>>;

    /// Release a script once no entity uses it
    fn unload(&mut self, _script: &str) {}
}

impl<F> ScriptRuntime for F
where
    F: FnMut(f32, &[ScriptInstance]) -> Vec<ScriptCommand> + Send + 'static,
{
    fn call_update(&mut self, dt: f32, instances: &[ScriptInstance]) -> SystemResult<Vec<ScriptCommand>> {
        Ok(self(dt, instances))
    }
}

/// Runs a [`ScriptRuntime`] as a SCRIPT phase system
pub struct ScriptSystem<R: ScriptRuntime> {
    runtime: R,
    attachments: ComponentIndex,
    loaded: HashMap<String, usize>,
}

impl<R: ScriptRuntime> ScriptSystem<R> {
    /// Wrap a runtime
    pub fn new(runtime: R) -> Self {
        ScriptSystem {
            runtime,
            attachments: ComponentIndex::new(),
            loaded: HashMap::new(),
        }
    }

    /// The wrapped runtime
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Scripts currently loaded, with the number of entities using each
    pub fn loaded_scripts(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.loaded.iter().map(|(script, &users)| (script.as_str(), users))
    }

    fn snapshot(&self, world: &World) -> SystemResult<Vec<ScriptInstance>> {
        let mut instances = Vec::with_capacity(self.attachments.len());
        for entry in &self.attachments {
            let attachment = world.component::<ScriptAttachment>(entry.handle)?;
            instances.push(ScriptInstance {
                entity: entry.owner,
                script: attachment.script().to_string(),
                position: world
                    .first_component::<Transform>(entry.owner)
                    .map(|(_, t)| (t.x(), t.y())),
                velocity: world
                    .first_component::<Velocity>(entry.owner)
                    .map(|(_, v)| (v.dx(), v.dy())),
            });
        }
        Ok(instances)
    }
}

fn component_of<T: Component>(world: &World, entity: Entity) -> Option<ComponentHandle> {
    world.first_component::<T>(entity).map(|(handle, _)| handle)
}

fn apply_command(world: &mut World, command: ScriptCommand) -> SystemResult<()> {
    let entity = command.entity();
    if !world.is_live(entity) {
        tracing::trace!(%entity, "script command for a non-live entity ignored");
        return Ok(());
    }

    match command {
        ScriptCommand::SetPosition { x, y, .. } => match component_of::<Transform>(world, entity) {
            Some(handle) => world.component_mut::<Transform>(handle)?.set_position(x, y),
            None => {
                world.attach(entity, Transform::new(x, y))?;
            }
        },
        ScriptCommand::SetVelocity { dx, dy, .. } => match component_of::<Velocity>(world, entity) {
            Some(handle) => world.component_mut::<Velocity>(handle)?.set(dx, dy),
            None => {
                world.attach(entity, Velocity::new(dx, dy))?;
            }
        },
        ScriptCommand::Despawn { .. } => {
            world.mark_for_deletion(entity)?;
        }
        ScriptCommand::AttachSprite { sprite, .. } => {
            world.attach(entity, sprite)?;
        }
    }
    Ok(())
}

impl<R: ScriptRuntime> System for ScriptSystem<R> {
    type Result = ScriptCommands;

    fn name(&self) -> &str {
        "script"
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> SystemResult<()> {
        if ctx.phase() != Phase::Script {
            tracing::warn!(phase = %ctx.phase(), "script system registered outside the script phase");
        }
        Ok(())
    }

    fn accepts(&self, component: &dyn Component) -> bool {
        component.is::<ScriptAttachment>()
    }

    fn on_component_added(&mut self, handle: ComponentHandle, owner: Entity, component: &dyn Component) -> SystemResult<()> {
        let attachment = component
            .downcast_ref::<ScriptAttachment>()
            .ok_or(SystemError::MissingComponent(handle))?;

        let script = attachment.script();
        let users = self.loaded.get(script).copied().unwrap_or(0);
        if users == 0 {
            self.runtime.load(script)?;
            tracing::debug!(script, "script loaded");
        }
        self.loaded.insert(script.to_string(), users + 1);

        self.attachments.insert(handle, owner)?;
        Ok(())
    }

    fn on_component_removed(&mut self, handle: ComponentHandle, _owner: Entity, component: &dyn Component) -> SystemResult<()> {
        if self.attachments.remove(handle).is_none() {
            return Ok(());
        }
        let Some(attachment) = component.downcast_ref::<ScriptAttachment>() else {
            return Ok(());
        };

        if let Some(users) = self.loaded.get_mut(attachment.script()) {
            *users -= 1;
            if *users == 0 {
                self.loaded.remove(attachment.script());
                self.runtime.unload(attachment.script());
                tracing::debug!(script = attachment.script(), "script unloaded");
            }
        }
        Ok(())
    }

    fn update(&mut self, ctx: &FrameContext<'_>, dt: f32) -> SystemResult<Option<ScriptCommands>> {
        if self.attachments.is_empty() {
            return Ok(None);
        }
        let instances = self.snapshot(ctx.world())?;
        let commands = self.runtime.call_update(dt, &instances)?;
        Ok((!commands.is_empty()).then_some(ScriptCommands(commands)))
    }

    fn apply_result(&mut self, result: ScriptCommands, ctx: &mut ApplyContext<'_>) -> SystemResult<()> {
        let world = ctx.world_mut();
        for command in result.0 {
            apply_command(world, command)?;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        for (script, _) in self.loaded.drain() {
            self.runtime.unload(&script);
        }
    }
}
