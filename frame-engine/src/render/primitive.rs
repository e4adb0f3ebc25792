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
//! Draw primitives
//!
//! Backend-agnostic drawing commands. The engine never rasterizes these; it
//! only collects them per frame and hands the finished list to the
//! presentation consumer. Coordinates are screen space.

use crate::ecs::Entity;

/// RGBA color, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

impl Color {
    /// Opaque white
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    /// Opaque black
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    /// Fully transparent
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    /// Opaque color from RGB channels
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    /// Color from RGBA channels
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Geometry of a primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Axis-aligned rectangle
    Rect {
        /// Left edge
        x: f32,
        /// Top edge
        y: f32,
        /// Width
        width: f32,
        /// Height
        height: f32,
        /// Fill instead of outline
        filled: bool,
    },
    /// Textured quad referencing a sprite by id
    Sprite {
        /// Backend-defined sprite id
        sprite: u32,
        /// Center x
        x: f32,
        /// Center y
        y: f32,
        /// Width on screen
        width: f32,
        /// Height on screen
        height: f32,
        /// Rotation in radians
        rotation: f32,
    },
    /// Line segment
    Line {
        /// Start point
        from: (f32, f32),
        /// End point
        to: (f32, f32),
        /// Stroke width
        thickness: f32,
    },
    /// Pre-laid-out text run
    Text {
        /// Baseline origin x
        x: f32,
        /// Baseline origin y
        y: f32,
        /// Text content
        text: String,
        /// Font size in pixels
        size: f32,
    },
}

/// A single drawing command
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Entity that produced the primitive, if any
    pub source: Option<Entity>,
    /// Draw order; lower layers are drawn first
    pub layer: i32,
    /// Geometry
    pub shape: Shape,
    /// Tint or fill color
    pub color: Color,
}

impl Primitive {
    /// Primitive with default layer and color and no source
    pub fn new(shape: Shape) -> Self {
        Primitive {
            source: None,
            layer: 0,
            shape,
            color: Color::default(),
        }
    }

    /// Filled rectangle
    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(Shape::Rect {
            x,
            y,
            width,
            height,
            filled: true,
        })
    }

    /// Unrotated sprite centered on `(x, y)`
    pub fn sprite(sprite: u32, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(Shape::Sprite {
            sprite,
            x,
            y,
            width,
            height,
            rotation: 0.0,
        })
    }

    /// One pixel wide line
    pub fn line(from: (f32, f32), to: (f32, f32)) -> Self {
        Self::new(Shape::Line {
            from,
            to,
            thickness: 1.0,
        })
    }

    /// Text run
    pub fn text(x: f32, y: f32, text: impl Into<String>, size: f32) -> Self {
        Self::new(Shape::Text {
            x,
            y,
            text: text.into(),
            size,
        })
    }

    /// Attribute the primitive to an entity
    pub fn with_source(mut self, entity: Entity) -> Self {
        self.source = Some(entity);
        self
    }

    /// Set the draw layer
    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    /// Set the color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}
