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
//! Double-buffered render lists
//!
//! LATE-phase systems write into the active list while the presentation
//! consumer reads last frame's list from the other slot:
//!
//! ```text
//! LATE systems ──submit──> [active]      flip()      [presentable] ──read──> consumer
//!                          list A   <──── swap ────>  list B
//! ```
//!
//! Only [`RenderBuffers::flip`] changes which list is active. Each list has
//! its own lock, and writer and reader always target different lists, so the
//! locks are uncontended except for the instant of a flip.

use crate::render::{Primitive, RenderList};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default bound of each subscriber's notification channel
pub const DEFAULT_NOTIFY_CAPACITY: usize = 4;

/// Sent to subscribers every time a finished list becomes presentable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentNotice {
    /// Frame number of the newly presentable list
    pub frame: u64,
    /// Number of primitives in it
    pub primitives: usize,
}

/// The pair of render lists plus the active-role index
pub struct RenderBuffers {
    lists: [RwLock<RenderList>; 2],
    active: AtomicUsize,
    frame: AtomicU64,
    sort_by_layer: bool,
    notify_capacity: usize,
    subscribers: Mutex<Vec<Sender<PresentNotice>>>,
}

impl RenderBuffers {
    /// Create both lists with room for `initial_capacity` primitives each
    pub fn new(initial_capacity: usize) -> Self {
        RenderBuffers {
            lists: [
                RwLock::new(RenderList::with_capacity(initial_capacity)),
                RwLock::new(RenderList::with_capacity(initial_capacity)),
            ],
            active: AtomicUsize::new(0),
            frame: AtomicU64::new(0),
            sort_by_layer: false,
            notify_capacity: DEFAULT_NOTIFY_CAPACITY,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Sort each finished list by layer when it is flipped
    pub fn with_layer_sort(mut self, enabled: bool) -> Self {
        self.sort_by_layer = enabled;
        self
    }

    /// Bound of the notification channel handed out by [`subscribe`](Self::subscribe)
    pub fn with_notify_capacity(mut self, capacity: usize) -> Self {
        self.notify_capacity = capacity.max(1);
        self
    }

    /// Write access to the active list
    ///
    /// Intended for LATE-phase systems on the frame thread or its workers.
    pub fn active(&self) -> RwLockWriteGuard<'_, RenderList> {
        let index = self.active.load(Ordering::Acquire);
        self.lists[index].write()
    }

    /// Read access to the presentable list
    ///
    /// The role is re-checked after the lock is taken, so a reader racing a
    /// flip never ends up holding the list that just became active.
    pub fn presentable(&self) -> RwLockReadGuard<'_, RenderList> {
        loop {
            let index = 1 - self.active.load(Ordering::Acquire);
            let guard = self.lists[index].read();
            if self.active.load(Ordering::Acquire) != index {
                return guard;
            }
        }
    }

    /// Append a primitive to the active list
    pub fn submit(&self, primitive: Primitive) {
        self.active().push(primitive);
    }

    /// Append several primitives under one lock acquisition
    pub fn submit_all<I>(&self, primitives: I) -> usize
    where
        I: IntoIterator<Item = Primitive>,
    {
        let mut list = self.active();
        let before = list.len();
        list.extend(primitives);
        list.len() - before
    }

    /// Make the active list presentable and vice versa
    ///
    /// Stamps the finished list with the next frame number, sorts it when
    /// layer sorting is enabled and notifies subscribers. The new active list
    /// still holds the previous frame until [`clear_active`](Self::clear_active).
    pub fn flip(&self) -> PresentNotice {
        let finished = self.active.load(Ordering::Acquire);
        let frame = self.frame.load(Ordering::Acquire) + 1;

        let primitives = {
            let mut list = self.lists[finished].write();
            list.set_frame(frame);
            if self.sort_by_layer {
                list.sort_by_layer();
            }
            list.len()
        };

        self.active.store(1 - finished, Ordering::Release);
        self.frame.store(frame, Ordering::Release);

        let notice = PresentNotice { frame, primitives };
        tracing::debug!(frame, primitives, "render lists flipped");
        self.notify(notice);
        notice
    }

    /// Empty the active list, keeping its allocation
    ///
    /// Blocks until any reader still holding this list from before the flip
    /// has dropped its guard.
    pub fn clear_active(&self) {
        self.active().clear();
    }

    /// Frame number of the presentable list; 0 before the first flip
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    /// Index (0 or 1) of the active list
    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Receive a [`PresentNotice`] after every flip
    ///
    /// Notices are dropped for a subscriber whose channel is full; dropped
    /// receivers are pruned on the next flip.
    pub fn subscribe(&self) -> Receiver<PresentNotice> {
        let (sender, receiver) = crossbeam_channel::bounded(self.notify_capacity);
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn notify(&self, notice: PresentNotice) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sender| match sender.try_send(notice) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(frame = notice.frame, "present notice dropped, subscriber is lagging");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl Default for RenderBuffers {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_swaps_roles() {
        let buffers = RenderBuffers::new(8);
        buffers.submit(Primitive::rect(0.0, 0.0, 1.0, 1.0));
        assert!(buffers.presentable().is_empty());

        let notice = buffers.flip();
        buffers.clear_active();

        assert_eq!(notice, PresentNotice { frame: 1, primitives: 1 });
        assert_eq!(buffers.presentable().len(), 1);
        assert_eq!(buffers.presentable().frame(), 1);
        assert!(buffers.active().is_empty());
        assert_eq!(buffers.active_index(), 1);
    }

    #[test]
    fn test_flip_sorts_when_enabled() {
        let buffers = RenderBuffers::new(8).with_layer_sort(true);
        buffers.submit_all([
            Primitive::rect(0.0, 0.0, 1.0, 1.0).with_layer(5),
            Primitive::rect(0.0, 0.0, 1.0, 1.0).with_layer(-1),
        ]);
        buffers.flip();

        let layers: Vec<i32> = buffers.presentable().iter().map(|p| p.layer).collect();
        assert_eq!(layers, vec![-1, 5]);
    }

    #[test]
    fn test_subscribers_are_notified_and_pruned() {
        let buffers = RenderBuffers::new(0).with_notify_capacity(1);
        let live = buffers.subscribe();
        let gone = buffers.subscribe();
        drop(gone);

        buffers.flip();
        assert_eq!(live.try_recv().unwrap().frame, 1);
        assert_eq!(buffers.subscriber_count(), 1);

        // A full channel keeps the subscriber but drops the notice
        buffers.flip();
        buffers.flip();
        assert_eq!(live.try_recv().unwrap().frame, 2);
        assert!(live.try_recv().is_err());
        assert_eq!(buffers.subscriber_count(), 1);
    }

    #[test]
    fn test_clear_active_keeps_capacity() {
        let buffers = RenderBuffers::new(32);
        buffers.submit(Primitive::rect(0.0, 0.0, 1.0, 1.0));
        let capacity = buffers.active().capacity();

        buffers.clear_active();
        assert_eq!(buffers.active().capacity(), capacity);
        assert!(buffers.active().is_empty());
    }
}
