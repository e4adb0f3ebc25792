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
//! Loading engine configuration from disk

use frame_engine::config::EngineConfig;
use frame_engine::ecs::Phase;
use frame_engine::error::{ConfigError, EngineError};
use frame_engine::Engine;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("frame-engine-{}-{name}.toml", std::process::id()))
}

#[test]
fn test_engine_from_config_file() {
    let path = temp_path("engine");
    std::fs::write(
        &path,
        r#"
[scheduler]
worker_threads = 2
parallel_early = false
parallel_late = true

[render]
initial_capacity = 32
"#,
    )
    .unwrap();

    let engine = Engine::from_config_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let config = engine.config();
    assert_eq!(config.scheduler.worker_threads, 2);
    assert!(!config.scheduler.parallel_for(Phase::Early));
    assert!(config.scheduler.parallel_for(Phase::Late));
    assert_eq!(config.render.initial_capacity, 32);
    assert!(config.render.sort_by_layer);
    assert_eq!(config.world.entity_capacity, 1024);
}

#[test]
fn test_saved_config_loads_back() {
    let path = temp_path("saved");
    let config = EngineConfig::default()
        .with_worker_threads(3)
        .with_parallel(Phase::Script, true)
        .with_layer_sort(false)
        .with_world_capacity(64, 256);

    config.save(&path).unwrap();
    let loaded = EngineConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let err = Engine::from_config_file(temp_path("does-not-exist")).err().unwrap();
    assert!(matches!(err, EngineError::Config(ConfigError::Io(_))));
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let path = temp_path("malformed");
    std::fs::write(&path, "[scheduler\nworker_threads = ").unwrap();

    let err = EngineConfig::load(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_zero_capacity_file_is_rejected() {
    let path = temp_path("zero");
    std::fs::write(&path, "[world]\nentity_capacity = 0\n").unwrap();

    let err = EngineConfig::load(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
