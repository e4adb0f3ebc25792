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
//! Error types
//!
//! - [`WorldError`]: entity and component bookkeeping failures
//! - [`SystemError`]: what a system callback reports back to the scheduler
//! - [`EngineError`]: configuration errors and fatal frame errors
//! - [`ConfigError`]: loading and validating [`EngineConfig`](crate::config::EngineConfig)

use crate::ecs::{ComponentHandle, Entity, Phase};

/// Result alias for world operations
pub type WorldResult<T> = Result<T, WorldError>;

/// Result alias for system callbacks
pub type SystemResult<T> = Result<T, SystemError>;

/// Result alias for scheduler and engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the entity lifecycle manager and component registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The handle refers to an entity that has already been freed
    #[error("{0} has been freed")]
    StaleEntity(Entity),

    /// The entity exists but is pending deletion
    #[error("{0} is pending deletion")]
    EntityNotLive(Entity),

    /// No component is stored under this handle
    #[error("no component for handle {0:?}")]
    UnknownComponent(ComponentHandle),

    /// The component exists but has a different concrete type
    #[error("component {handle:?} is not a {expected}")]
    ComponentTypeMismatch {
        /// Handle that was looked up
        handle: ComponentHandle,
        /// Requested type name
        expected: &'static str,
    },

    /// Growing an index or queue failed
    #[error("failed to allocate {requested} more slots for {what}")]
    Allocation {
        /// Which structure was growing
        what: &'static str,
        /// Number of additional slots requested
        requested: usize,
    },
}

/// Errors returned from a system's callbacks
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// Generic failure with a description
    #[error("{0}")]
    Failed(String),

    /// A component the system indexed is gone or has the wrong type
    #[error("missing component {0:?}")]
    MissingComponent(ComponentHandle),

    /// A draw primitive was submitted outside the LATE phase
    #[error("primitives may only be submitted during the late phase (got {0})")]
    SubmitOutsideLate(Phase),

    /// A world operation failed
    #[error(transparent)]
    World(#[from] WorldError),
}

impl SystemError {
    /// Build a [`SystemError::Failed`] from any displayable message
    pub fn failed(message: impl Into<String>) -> Self {
        SystemError::Failed(message.into())
    }
}

/// Scheduler and engine level errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A system with the same name is already registered
    #[error("system '{0}' is already registered")]
    DuplicateSystem(String),

    /// A phase name did not match any of the fixed phases
    #[error("unknown phase '{0}'")]
    UnknownPhase(String),

    /// A system was built against an incompatible system API version
    #[error("system '{system}' API version {found} is incompatible with engine API version {required}")]
    IncompatibleApi {
        /// System name
        system: String,
        /// Version the system declared
        found: String,
        /// Version the engine provides
        required: &'static str,
    },

    /// `init` failed while registering a system
    #[error("failed to initialize system '{system}': {source}")]
    InitFailed {
        /// System name
        system: String,
        /// Underlying failure
        #[source]
        source: SystemError,
    },

    /// A phase or the end of frame was requested out of order
    #[error("{got} requested but the frame expects {expected}")]
    PhaseOutOfOrder {
        /// Step the frame cursor expects next
        expected: String,
        /// Step that was requested
        got: String,
    },

    /// The scheduler has been torn down
    #[error("scheduler has been shut down")]
    ShutDown,

    /// A system's update or apply step failed; the frame is lost
    #[error("system '{system}' failed during {phase} phase: {source}")]
    SystemFailed {
        /// Phase the failure happened in
        phase: Phase,
        /// System name
        system: String,
        /// Underlying failure
        #[source]
        source: SystemError,
    },

    /// A previous frame failed and the scheduler refuses to continue
    #[error("scheduler is poisoned by an earlier frame failure")]
    Poisoned,

    /// Building the worker pool failed
    #[cfg(feature = "parallel")]
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A world operation failed
    #[error(transparent)]
    World(#[from] WorldError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the configuration file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML document is malformed
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serializing the configuration failed
    #[error("serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_failed_message_carries_context() {
        let err = EngineError::SystemFailed {
            phase: Phase::Early,
            system: "motion".to_string(),
            source: SystemError::failed("boom"),
        };
        let message = err.to_string();
        assert!(message.contains("motion"));
        assert!(message.contains("early"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn test_world_error_converts_into_system_error() {
        let entity = Entity::new(3, 1);
        let err: SystemError = WorldError::StaleEntity(entity).into();
        assert!(matches!(err, SystemError::World(WorldError::StaleEntity(e)) if e == entity));
    }
}
