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
//! Built-in systems
//!
//! - [`MotionSystem`] (EARLY): integrates [`Velocity`] into [`Transform`]
//! - [`BoundsSystem`] (EARLY): keeps [`Bounds`] in sync with sprite extents
//! - [`SpriteRenderSystem`] (LATE): submits one sprite primitive per entity
//!
//! The EARLY systems only read the world in `update` and hand their writes
//! back as job results, so they are safe in a parallel phase.

use crate::ecs::components::{Bounds, Sprite, Transform, Velocity};
use crate::ecs::{
    ApplyContext, Component, ComponentHandle, ComponentIndex, Entity, FrameContext, System,
};
use crate::error::{SystemError, SystemResult};
use crate::render::{Primitive, Shape};
use std::collections::HashMap;

/// New position for one transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionUpdate {
    /// Transform to move
    pub transform: ComponentHandle,
    /// New x coordinate
    pub x: f32,
    /// New y coordinate
    pub y: f32,
}

/// Integrates velocities with explicit Euler steps
///
/// Entities with a [`Velocity`] but no [`Transform`] are skipped.
#[derive(Debug, Default)]
pub struct MotionSystem {
    velocities: ComponentIndex,
}

impl MotionSystem {
    /// Create a new motion system
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked velocities
    pub fn tracked(&self) -> usize {
        self.velocities.len()
    }
}

impl System for MotionSystem {
    type Result = Vec<MotionUpdate>;

    fn name(&self) -> &str {
        "motion"
    }

    fn accepts(&self, component: &dyn Component) -> bool {
        component.is::<Velocity>()
    }

    fn on_component_added(&mut self, handle: ComponentHandle, owner: Entity, _component: &dyn Component) -> SystemResult<()> {
        self.velocities.insert(handle, owner)?;
        Ok(())
    }

    fn on_component_removed(&mut self, handle: ComponentHandle, _owner: Entity, _component: &dyn Component) -> SystemResult<()> {
        self.velocities.remove(handle);
        Ok(())
    }

    fn update(&mut self, ctx: &FrameContext<'_>, dt: f32) -> SystemResult<Option<Self::Result>> {
        let world = ctx.world();
        let mut moves = Vec::new();
        moves
            .try_reserve(self.velocities.len())
            .map_err(|_| SystemError::failed("out of memory reserving motion updates"))?;

        for entry in &self.velocities {
            let velocity = world.component::<Velocity>(entry.handle)?;
            let Some((handle, transform)) = world.first_component::<Transform>(entry.owner) else {
                continue;
            };
            if !velocity.is_valid() {
                tracing::warn!(entity = %entry.owner, "skipping non-finite velocity");
                continue;
            }
            moves.push(MotionUpdate {
                transform: handle,
                x: transform.x() + velocity.dx() * dt,
                y: transform.y() + velocity.dy() * dt,
            });
        }

        Ok((!moves.is_empty()).then_some(moves))
    }

    fn apply_result(&mut self, result: Self::Result, ctx: &mut ApplyContext<'_>) -> SystemResult<()> {
        let world = ctx.world_mut();
        for update in result {
            world.component_mut::<Transform>(update.transform)?.set_position(update.x, update.y);
        }
        Ok(())
    }
}

/// Recomputed bounds for one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsUpdate {
    /// Owner of the sprite
    pub entity: Entity,
    /// Existing bounds component, if any
    pub target: Option<ComponentHandle>,
    /// New value
    pub bounds: Bounds,
}

/// Derives a [`Bounds`] component from each entity's [`Sprite`]s and [`Transform`]
///
/// An entity with several sprites gets one box covering all of them.
/// Attaches a `Bounds` the first time an entity is seen without one.
#[derive(Debug, Default)]
pub struct BoundsSystem {
    sprites: ComponentIndex,
}

impl BoundsSystem {
    /// Create a new bounds system
    pub fn new() -> Self {
        Self::default()
    }
}

impl System for BoundsSystem {
    type Result = Vec<BoundsUpdate>;

    fn name(&self) -> &str {
        "bounds"
    }

    fn accepts(&self, component: &dyn Component) -> bool {
        component.is::<Sprite>()
    }

    fn on_component_added(&mut self, handle: ComponentHandle, owner: Entity, _component: &dyn Component) -> SystemResult<()> {
        self.sprites.insert(handle, owner)?;
        Ok(())
    }

    fn on_component_removed(&mut self, handle: ComponentHandle, _owner: Entity, _component: &dyn Component) -> SystemResult<()> {
        self.sprites.remove(handle);
        Ok(())
    }

    fn update(&mut self, ctx: &FrameContext<'_>, _dt: f32) -> SystemResult<Option<Self::Result>> {
        let world = ctx.world();
        let mut updates: Vec<BoundsUpdate> = Vec::with_capacity(self.sprites.len());
        let mut by_owner: HashMap<Entity, usize> = HashMap::with_capacity(self.sprites.len());

        // One box per owner, covering all of its sprites
        for entry in &self.sprites {
            let sprite = world.component::<Sprite>(entry.handle)?;
            let Some((_, transform)) = world.first_component::<Transform>(entry.owner) else {
                continue;
            };
            let bounds = Bounds::around(transform, sprite.width, sprite.height);

            match by_owner.get(&entry.owner) {
                Some(&slot) => updates[slot].bounds = updates[slot].bounds.union(&bounds),
                None => {
                    by_owner.insert(entry.owner, updates.len());
                    updates.push(BoundsUpdate {
                        entity: entry.owner,
                        target: world.first_component::<Bounds>(entry.owner).map(|(handle, _)| handle),
                        bounds,
                    });
                }
            }
        }

        updates.retain(|update| match update.target {
            Some(handle) => world.component::<Bounds>(handle).map_or(true, |current| *current != update.bounds),
            None => true,
        });

        Ok((!updates.is_empty()).then_some(updates))
    }

    fn apply_result(&mut self, result: Self::Result, ctx: &mut ApplyContext<'_>) -> SystemResult<()> {
        let world = ctx.world_mut();
        for update in result {
            // An earlier apply this phase may have marked the owner
            if !world.is_live(update.entity) {
                continue;
            }
            match update.target {
                Some(handle) => *world.component_mut::<Bounds>(handle)? = update.bounds,
                None => {
                    world.attach(update.entity, update.bounds)?;
                }
            }
        }
        Ok(())
    }
}

/// Maps world coordinates to screen coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World x at the center of the viewport
    pub x: f32,
    /// World y at the center of the viewport
    pub y: f32,
    /// Screen pixels per world unit
    pub zoom: f32,
    /// Viewport width in pixels
    pub viewport_width: f32,
    /// Viewport height in pixels
    pub viewport_height: f32,
}

impl Camera {
    /// Camera centered on the world origin with unit zoom
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Camera {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            viewport_width,
            viewport_height,
        }
    }

    /// Center the camera on a world position
    pub fn looking_at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the zoom factor
    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom;
        self
    }

    /// Convert a world position to screen pixels
    pub fn world_to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.x) * self.zoom + self.viewport_width * 0.5,
            (y - self.y) * self.zoom + self.viewport_height * 0.5,
        )
    }

    /// Whether a screen-space box centered on `(sx, sy)` touches the viewport
    pub fn is_visible(&self, sx: f32, sy: f32, width: f32, height: f32) -> bool {
        sx + width * 0.5 >= 0.0
            && sy + height * 0.5 >= 0.0
            && sx - width * 0.5 <= self.viewport_width
            && sy - height * 0.5 <= self.viewport_height
    }
}

/// Submits a sprite primitive for every visible [`Sprite`]
#[derive(Debug)]
pub struct SpriteRenderSystem {
    camera: Camera,
    sprites: ComponentIndex,
    culled: usize,
}

impl SpriteRenderSystem {
    /// Create a render system looking through `camera`
    pub fn new(camera: Camera) -> Self {
        SpriteRenderSystem {
            camera,
            sprites: ComponentIndex::new(),
            culled: 0,
        }
    }

    /// Replace the camera
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    /// Sprites skipped as off-screen during the last update
    pub fn culled(&self) -> usize {
        self.culled
    }

    /// Number of tracked sprites
    pub fn tracked(&self) -> usize {
        self.sprites.len()
    }
}

impl System for SpriteRenderSystem {
    type Result = ();

    fn name(&self) -> &str {
        "sprite-render"
    }

    fn accepts(&self, component: &dyn Component) -> bool {
        component.is::<Sprite>()
    }

    fn on_component_added(&mut self, handle: ComponentHandle, owner: Entity, _component: &dyn Component) -> SystemResult<()> {
        self.sprites.insert(handle, owner)?;
        Ok(())
    }

    fn on_component_removed(&mut self, handle: ComponentHandle, _owner: Entity, _component: &dyn Component) -> SystemResult<()> {
        self.sprites.remove(handle);
        Ok(())
    }

    fn update(&mut self, ctx: &FrameContext<'_>, _dt: f32) -> SystemResult<Option<()>> {
        let world = ctx.world();
        let camera = self.camera;
        let mut primitives = Vec::with_capacity(self.sprites.len());
        self.culled = 0;

        for entry in &self.sprites {
            let sprite = world.component::<Sprite>(entry.handle)?;
            let transform = world
                .first_component::<Transform>(entry.owner)
                .map(|(_, transform)| *transform)
                .unwrap_or_default();

            let (sx, sy) = camera.world_to_screen(transform.x(), transform.y());
            let width = sprite.width * transform.scale() * camera.zoom;
            let height = sprite.height * transform.scale() * camera.zoom;
            if !camera.is_visible(sx, sy, width, height) {
                self.culled += 1;
                continue;
            }

            primitives.push(Primitive {
                source: Some(entry.owner),
                layer: sprite.layer,
                shape: Shape::Sprite {
                    sprite: sprite.sprite,
                    x: sx,
                    y: sy,
                    width,
                    height,
                    rotation: transform.rotation(),
                },
                color: sprite.color,
            });
        }

        ctx.submit_all(primitives)?;
        Ok(None)
    }
}
