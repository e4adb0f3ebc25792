//! Entity Component System (ECS) core implementation
//!
//! This module provides the per-frame runtime core:
//! - Entity lifecycle with deferred deletion
//! - Component registry and per-system component indices
//! - The system contract and deferred job results
//! - The phase scheduler (EARLY, SCRIPT, LATE) with optional parallel
//!   execution via Rayon

mod component;
mod entity;
mod index;
mod job;
mod phase;
mod scheduler;
mod system;
mod world;

pub mod components;
pub mod systems;

pub use component::{AsAny, Attachment, Component, ComponentHandle, ComponentRegistry, ComponentType};
pub use entity::{Entity, EntityId};
pub use index::{ComponentIndex, IndexEntry};
pub use job::JobResult;
pub use phase::Phase;
pub use scheduler::{FrameStats, PhaseReport, Scheduler};
pub use system::{
    is_api_compatible, ApplyContext, FrameContext, InitContext, SerialContext, System, SystemId,
    SYSTEM_API_VERSION,
};
pub use world::{EntityState, FlushReport, RoutingEvent, World};
