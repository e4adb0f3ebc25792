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
//! Deferred mutation results
//!
//! A system running on a worker thread cannot touch shared state. Instead its
//! `update` returns a job result describing the changes it wants, and the
//! scheduler hands that result back to the system's `apply_result` on the
//! frame thread once every update of the phase has finished.
//!
//! Ownership of a result produced on a worker:
//!
//! 1. `update` builds the original on the worker.
//! 2. The worker calls [`JobResult::duplicate`] to make the frame-thread copy.
//! 3. The worker calls [`JobResult::release`] on the original.
//! 4. The copy crosses the join barrier and is consumed by `apply_result`.
//!
//! The original never leaves the worker and the copy is never touched by a
//! worker after it is made.

/// Payload a system produces to defer its writes to the apply step
pub trait JobResult: Sized + Send + 'static {
    /// Produce a copy owned by the frame thread
    fn duplicate(&self) -> Self;

    /// Free the worker-owned original
    ///
    /// Runs on the worker that produced the result.
    fn release(self) {
        drop(self);
    }

    /// Approximate size of the payload in bytes, for diagnostics
    fn byte_size(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

impl JobResult for () {
    fn duplicate(&self) -> Self {}

    fn byte_size(&self) -> usize {
        0
    }
}

impl<T: Clone + Send + 'static> JobResult for Vec<T> {
    fn duplicate(&self) -> Self {
        self.clone()
    }

    fn byte_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.len() * std::mem::size_of::<T>()
    }
}

/// Hand a worker-produced result over to the frame thread
///
/// Duplicates the original and releases it on the current thread.
pub(crate) fn hand_off<R: JobResult>(original: R) -> R {
    let copy = original.duplicate();
    original.release();
    copy
}
