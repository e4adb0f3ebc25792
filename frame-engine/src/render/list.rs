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
//! One frame's worth of draw primitives

use crate::ecs::Entity;
use crate::render::Primitive;

/// Ordered collection of primitives produced for one frame
#[derive(Debug, Clone, Default)]
pub struct RenderList {
    primitives: Vec<Primitive>,
    frame: u64,
}

impl RenderList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty list with room for `capacity` primitives
    pub fn with_capacity(capacity: usize) -> Self {
        RenderList {
            primitives: Vec::with_capacity(capacity),
            frame: 0,
        }
    }

    /// Frame this list was produced for; 0 if it has never been presented
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    /// Append a primitive
    pub fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    /// All primitives in submission (or layer) order
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Iterate over the primitives
    pub fn iter(&self) -> std::slice::Iter<'_, Primitive> {
        self.primitives.iter()
    }

    /// Primitives attributed to `entity`
    pub fn from_source(&self, entity: Entity) -> impl Iterator<Item = &Primitive> + '_ {
        self.primitives
            .iter()
            .filter(move |primitive| primitive.source == Some(entity))
    }

    /// Number of primitives
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Allocated capacity, retained across clears
    pub fn capacity(&self) -> usize {
        self.primitives.capacity()
    }

    /// Stable sort by layer; submission order is kept within a layer
    pub fn sort_by_layer(&mut self) {
        self.primitives.sort_by_key(|primitive| primitive.layer);
    }

    /// Remove every primitive, keeping the allocation
    pub fn clear(&mut self) {
        self.primitives.clear();
    }
}

impl Extend<Primitive> for RenderList {
    fn extend<I: IntoIterator<Item = Primitive>>(&mut self, iter: I) {
        self.primitives.extend(iter);
    }
}

impl<'a> IntoIterator for &'a RenderList {
    type Item = &'a Primitive;
    type IntoIter = std::slice::Iter<'a, Primitive>;

    fn into_iter(self) -> Self::IntoIter {
        self.primitives.iter()
    }
}
