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
//! Engine configuration
//!
//! Configuration is plain data with sensible defaults. It can be built in
//! code with the `with_*` setters, loaded from a TOML file, and overridden
//! from the environment:
//!
//! ```toml
//! [scheduler]
//! worker_threads = 4
//! parallel_early = true
//!
//! [render]
//! initial_capacity = 1024
//! sort_by_layer = true
//! ```
//!
//! # Environment Configuration
//!
//! - `FRAME_ENGINE_WORKER_THREADS`: worker pool size (0 = one per core)
//! - `FRAME_ENGINE_PARALLEL_EARLY`: `true`/`false`, or `1`/`0`

use crate::ecs::Phase;
use crate::error::ConfigError;
use crate::render::DEFAULT_NOTIFY_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding [`SchedulerConfig::worker_threads`]
pub const ENV_WORKER_THREADS: &str = "FRAME_ENGINE_WORKER_THREADS";

/// Environment variable overriding [`SchedulerConfig::parallel_early`]
pub const ENV_PARALLEL_EARLY: &str = "FRAME_ENGINE_PARALLEL_EARLY";

/// Phase scheduling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Size of the dedicated worker pool; 0 lets rayon pick one per core
    pub worker_threads: usize,
    /// Run EARLY updates on the worker pool
    pub parallel_early: bool,
    /// Run SCRIPT updates on the worker pool
    pub parallel_script: bool,
    /// Run LATE updates on the worker pool
    pub parallel_late: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            worker_threads: 0,
            parallel_early: true,
            parallel_script: false,
            parallel_late: false,
        }
    }
}

impl SchedulerConfig {
    /// Configuration that never uses the worker pool
    pub fn serial() -> Self {
        SchedulerConfig {
            parallel_early: false,
            ..Self::default()
        }
    }

    /// Whether `phase` runs its updates in parallel
    pub fn parallel_for(&self, phase: Phase) -> bool {
        match phase {
            Phase::Early => self.parallel_early,
            Phase::Script => self.parallel_script,
            Phase::Late => self.parallel_late,
        }
    }

    /// Whether any phase is parallel
    pub fn any_parallel(&self) -> bool {
        Phase::ALL.iter().any(|&phase| self.parallel_for(phase))
    }

    /// Set the worker pool size
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Enable or disable parallel updates for one phase
    pub fn with_parallel(mut self, phase: Phase, parallel: bool) -> Self {
        match phase {
            Phase::Early => self.parallel_early = parallel,
            Phase::Script => self.parallel_script = parallel,
            Phase::Late => self.parallel_late = parallel,
        }
        self
    }
}

/// Render list settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Primitives preallocated in each of the two lists
    pub initial_capacity: usize,
    /// Stable-sort finished lists by layer on flip
    pub sort_by_layer: bool,
    /// Bound of each present-notification channel
    pub notify_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            initial_capacity: 256,
            sort_by_layer: true,
            notify_capacity: DEFAULT_NOTIFY_CAPACITY,
        }
    }
}

/// World preallocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Entity slots to preallocate
    pub entity_capacity: usize,
    /// Component slots to preallocate
    pub component_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            entity_capacity: 1024,
            component_capacity: 4096,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scheduler settings
    pub scheduler: SchedulerConfig,
    /// Render list settings
    pub render: RenderConfig,
    /// World settings
    pub world: WorldConfig,
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Serialize to a pretty TOML document
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Set the scheduler section
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set the worker pool size
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.scheduler.worker_threads = threads;
        self
    }

    /// Enable or disable parallel updates for one phase
    pub fn with_parallel(mut self, phase: Phase, parallel: bool) -> Self {
        self.scheduler = self.scheduler.with_parallel(phase, parallel);
        self
    }

    /// Set the per-list primitive capacity
    pub fn with_render_capacity(mut self, capacity: usize) -> Self {
        self.render.initial_capacity = capacity;
        self
    }

    /// Enable or disable layer sorting on flip
    pub fn with_layer_sort(mut self, enabled: bool) -> Self {
        self.render.sort_by_layer = enabled;
        self
    }

    /// Set world preallocation
    pub fn with_world_capacity(mut self, entities: usize, components: usize) -> Self {
        self.world.entity_capacity = entities;
        self.world.component_capacity = components;
        self
    }

    /// Apply `FRAME_ENGINE_*` environment overrides
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_WORKER_THREADS) {
            self.scheduler.worker_threads = value.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_WORKER_THREADS} must be a thread count, got '{value}'"))
            })?;
        }

        if let Some(value) = lookup(ENV_PARALLEL_EARLY) {
            self.scheduler.parallel_early = parse_flag(&value).ok_or_else(|| {
                ConfigError::Invalid(format!("{ENV_PARALLEL_EARLY} must be a boolean, got '{value}'"))
            })?;
        }

        Ok(self)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.notify_capacity == 0 {
            return Err(ConfigError::Invalid("render.notify_capacity must be at least 1".to_string()));
        }
        if self.world.entity_capacity == 0 {
            return Err(ConfigError::Invalid("world.entity_capacity must be at least 1".to_string()));
        }
        if self.world.component_capacity == 0 {
            return Err(ConfigError::Invalid("world.component_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.scheduler.parallel_for(Phase::Early));
        assert!(!config.scheduler.parallel_for(Phase::Script));
        assert!(!config.scheduler.parallel_for(Phase::Late));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [scheduler]
            worker_threads = 2
            parallel_late = true

            [render]
            sort_by_layer = false
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.worker_threads, 2);
        assert!(config.scheduler.parallel_early);
        assert!(config.scheduler.parallel_late);
        assert!(!config.render.sort_by_layer);
        assert_eq!(config.render.initial_capacity, RenderConfig::default().initial_capacity);
        assert_eq!(config.world, WorldConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = EngineConfig::from_toml_str("[world]\nentity_capacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("[scheduler]\nworker_threads = \"many\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [(ENV_WORKER_THREADS, " 3 "), (ENV_PARALLEL_EARLY, "off")].into();
        let config = EngineConfig::default()
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.scheduler.worker_threads, 3);
        assert!(!config.scheduler.parallel_early);

        let err = EngineConfig::default()
            .apply_overrides(|key| (key == ENV_PARALLEL_EARLY).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default()
            .with_worker_threads(6)
            .with_parallel(Phase::Script, true)
            .with_world_capacity(10, 20);
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}
