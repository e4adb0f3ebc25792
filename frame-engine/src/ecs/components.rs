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
//! Built-in 2D components
//!
//! Plain data consumed by the systems in [`crate::ecs::systems`]. World
//! coordinates are in arbitrary units with +y pointing down, matching screen
//! space.

use crate::ecs::Component;
use crate::render::Color;

/// Position, rotation and uniform scale of an entity
///
/// # Examples
///
/// ```
/// use frame_engine::ecs::components::Transform;
///
/// let transform = Transform::new(1.0, 2.0).with_rotation(0.5);
/// assert_eq!(transform.x(), 1.0);
/// assert!(transform.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    x: f32,
    y: f32,
    rotation: f32,
    scale: f32,
}

impl Transform {
    /// Create a transform at `(x, y)` with no rotation and unit scale
    pub fn new(x: f32, y: f32) -> Self {
        Transform {
            x,
            y,
            rotation: 0.0,
            scale: 1.0,
        }
    }

    /// Set the rotation in radians
    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the uniform scale
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Get the x coordinate
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Get the y coordinate
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Rotation in radians
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Uniform scale factor
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Move to `(x, y)`
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    /// Set the rotation in radians
    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
    }

    /// Check if every field is finite
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

impl Component for Transform {}

impl Default for Transform {
    fn default() -> Self {
        Transform::new(0.0, 0.0)
    }
}

/// Linear velocity in units per second
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    dx: f32,
    dy: f32,
}

impl Velocity {
    /// Create a new velocity
    pub fn new(dx: f32, dy: f32) -> Self {
        Velocity { dx, dy }
    }

    /// Get the x component
    pub fn dx(&self) -> f32 {
        self.dx
    }

    /// Get the y component
    pub fn dy(&self) -> f32 {
        self.dy
    }

    /// Replace both components
    pub fn set(&mut self, dx: f32, dy: f32) {
        self.dx = dx;
        self.dy = dy;
    }

    /// Check if both components are finite
    pub fn is_valid(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite()
    }
}

impl Component for Velocity {}

/// A textured quad drawn at the entity's transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    /// Backend-defined sprite id
    pub sprite: u32,
    /// Unscaled width in world units
    pub width: f32,
    /// Unscaled height in world units
    pub height: f32,
    /// Draw layer
    pub layer: i32,
    /// Tint
    pub color: Color,
}

impl Sprite {
    /// Untinted sprite on layer 0
    pub fn new(sprite: u32, width: f32, height: f32) -> Self {
        Sprite {
            sprite,
            width,
            height,
            layer: 0,
            color: Color::WHITE,
        }
    }

    /// Set the draw layer
    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    /// Set the tint
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

impl Component for Sprite {}

/// Axis-aligned bounding box derived from transform and sprite
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    /// Left edge
    pub min_x: f32,
    /// Top edge
    pub min_y: f32,
    /// Right edge
    pub max_x: f32,
    /// Bottom edge
    pub max_y: f32,
}

impl Bounds {
    /// Box enclosing a sprite of the given size placed at `transform`
    pub fn around(transform: &Transform, width: f32, height: f32) -> Self {
        let half_w = width * transform.scale() * 0.5;
        let half_h = height * transform.scale() * 0.5;
        let (sin, cos) = transform.rotation().sin_cos();
        let extent_x = half_w * cos.abs() + half_h * sin.abs();
        let extent_y = half_w * sin.abs() + half_h * cos.abs();

        Bounds {
            min_x: transform.x() - extent_x,
            min_y: transform.y() - extent_y,
            max_x: transform.x() + extent_x,
            max_y: transform.y() + extent_y,
        }
    }

    /// Width of the box
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Height of the box
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Smallest box enclosing both
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Whether two boxes overlap
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x && other.min_x <= self.max_x && self.min_y <= other.max_y && other.min_y <= self.max_y
    }
}

impl Component for Bounds {}
