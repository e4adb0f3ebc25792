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
//! # Frame Engine
//!
//! The per-frame runtime core of a real-time 2D simulation: a phase-ordered
//! system scheduler that advances a dynamic set of entities every tick and
//! hands a complete, consistent list of drawing primitives to an independent
//! presentation stage.
//!
//! ## Features
//!
//! - **Phase Scheduling**: Systems run in three fixed phases (EARLY, SCRIPT, LATE)
//! - **Component Routing**: Attach and detach notify exactly the accepting systems
//! - **Deferred Mutation**: Parallel updates hand back job results applied in registration order
//! - **Double-Buffered Rendering**: The presentation thread never sees a half-built frame
//! - **Deferred Deletion**: Entities marked mid-frame stay valid until the end-of-frame flush
//! - **Parallelization**: Optional Rayon integration for multi-threaded phases
//!
//! ## Example
//!
//! ```rust
//! use frame_engine::ecs::components::{Transform, Velocity};
//! use frame_engine::ecs::systems::MotionSystem;
//! use frame_engine::{Engine, EngineConfig, Phase};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! let motion = engine.register(MotionSystem::new(), Phase::Early).unwrap();
//!
//! let entity = engine.spawn();
//! engine.attach(entity, Transform::new(0.0, 0.0)).unwrap();
//! engine.attach(entity, Velocity::new(2.0, 0.0)).unwrap();
//!
//! engine.run_frame(0.5).unwrap();
//! let (_, transform) = engine.world().first_component::<Transform>(entity).unwrap();
//! assert_eq!(transform.x(), 1.0);
//! assert_eq!(engine.system::<MotionSystem>(motion).unwrap().tracked(), 1);
//! ```

#![warn(missing_docs)]

/// Engine configuration and TOML loading
pub mod config;

/// Entity Component System implementation
pub mod ecs;

/// Frame engine facade
pub mod engine;

/// Error types
pub mod error;

/// Drawing primitives and the render double buffer
pub mod render;

/// Scripting runtime adapter
pub mod script;

pub use config::EngineConfig;
pub use ecs::{Entity, Phase, System, World};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
