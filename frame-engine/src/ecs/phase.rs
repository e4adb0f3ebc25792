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
//! Frame phases
//!
//! A frame is exactly one pass through three fixed phases. Phases execute
//! strictly in order; everything belonging to one phase (updates and the
//! apply step) completes before the next phase starts.

use crate::error::EngineError;
use std::fmt;
use std::str::FromStr;

/// One of the three fixed stages of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// World-state bookkeeping, e.g. recomputing derived bounds
    Early,
    /// Script-driven behavior
    Script,
    /// Presentation submission into the active render list
    Late,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 3] = [Phase::Early, Phase::Script, Phase::Late];

    /// Position of this phase within a frame (0, 1 or 2)
    pub fn index(self) -> usize {
        match self {
            Phase::Early => 0,
            Phase::Script => 1,
            Phase::Late => 2,
        }
    }

    /// The phase that follows this one, or `None` after LATE
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Early => Some(Phase::Script),
            Phase::Script => Some(Phase::Late),
            Phase::Late => None,
        }
    }

    /// Lower-case name used in logs and configuration
    pub fn name(self) -> &'static str {
        match self {
            Phase::Early => "early",
            Phase::Script => "script",
            Phase::Late => "late",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "early" => Ok(Phase::Early),
            "script" => Ok(Phase::Script),
            "late" => Ok(Phase::Late),
            _ => Err(EngineError::UnknownPhase(s.to_string())),
        }
    }
}
