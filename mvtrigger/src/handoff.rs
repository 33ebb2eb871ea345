//! # Latest-wins frame handoff
//!
//! Single slot mailbox between the frame producer and the detection worker. Detection only cares
//! about the current state of the scene, so a new frame replaces one that has not been picked up
//! yet instead of queueing behind it.

use std::sync::{Condvar, Mutex, MutexGuard};

/// Counters of a [`FrameHandoff`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandoffStats {
    /// Items stored in the slot.
    pub published: u64,
    /// Items handed to the consumer.
    pub taken: u64,
    /// Items dropped because a newer one replaced them.
    pub superseded: u64,
}

struct Slot<T> {
    item: Option<T>,
    closed: bool,
    stats: HandoffStats,
}

/// Single slot, latest-wins mailbox.
pub struct FrameHandoff<T> {
    slot: Mutex<Slot<T>>,
    available: Condvar,
}

impl<T> Default for FrameHandoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameHandoff<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                item: None,
                closed: false,
                stats: Default::default(),
            }),
            available: Condvar::new(),
        }
    }

    // Poisoning is ignored, no update of the slot can be left half way.
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a new item, dropping any item that was not taken yet.
    ///
    /// Returns `true` if an older item got replaced. Items published after [`close`](Self::close)
    /// are dropped straight away.
    pub fn publish(&self, item: T) -> bool {
        let mut slot = self.lock();

        if slot.closed {
            return false;
        }

        let superseded = slot.item.replace(item).is_some();

        slot.stats.published += 1;
        if superseded {
            slot.stats.superseded += 1;
        }

        self.available.notify_all();

        superseded
    }

    /// Wait until an item is available and take it.
    ///
    /// Returns `None` once the handoff is closed.
    pub fn take_blocking(&self) -> Option<T> {
        let mut slot = self
            .available
            .wait_while(self.lock(), |slot| slot.item.is_none() && !slot.closed)
            .unwrap_or_else(|e| e.into_inner());

        if slot.closed {
            return None;
        }

        Self::take_locked(&mut slot, &self.available)
    }

    /// Take the pending item, if there is one, without waiting.
    pub fn try_take(&self) -> Option<T> {
        let mut slot = self.lock();

        if slot.closed {
            return None;
        }

        Self::take_locked(&mut slot, &self.available)
    }

    fn take_locked(slot: &mut Slot<T>, available: &Condvar) -> Option<T> {
        let item = slot.item.take();
        if item.is_some() {
            slot.stats.taken += 1;
            available.notify_all();
        }
        item
    }

    /// Wait until the pending item, if any, has been taken by the consumer.
    ///
    /// Returns immediately if the handoff is closed.
    pub fn wait_taken(&self) {
        let _slot = self
            .available
            .wait_while(self.lock(), |slot| slot.item.is_some() && !slot.closed)
            .unwrap_or_else(|e| e.into_inner());
    }

    /// Close the handoff and wake up the consumer.
    ///
    /// Any pending item is dropped.
    pub fn close(&self) {
        let pending = {
            let mut slot = self.lock();
            slot.closed = true;
            slot.item.take()
        };

        self.available.notify_all();

        // Release outside of the lock.
        std::mem::drop(pending);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> HandoffStats {
        self.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Counts how many instances are alive.
    struct Tracked {
        id: u32,
        alive: Arc<AtomicUsize>,
    }

    impl Tracked {
        fn new(id: u32, alive: &Arc<AtomicUsize>) -> Self {
            alive.fetch_add(1, Ordering::SeqCst);
            Self {
                id,
                alive: alive.clone(),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.alive.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn latest_wins() {
        let alive = Arc::new(AtomicUsize::new(0));
        let handoff = FrameHandoff::new();

        assert!(!handoff.publish(Tracked::new(1, &alive)));
        assert!(handoff.publish(Tracked::new(2, &alive)));

        // Frame 1 is gone already.
        assert_eq!(alive.load(Ordering::SeqCst), 1);

        let taken = handoff.take_blocking().unwrap();
        assert_eq!(taken.id, 2);
        assert!(handoff.try_take().is_none());

        drop(taken);
        assert_eq!(alive.load(Ordering::SeqCst), 0);

        assert_eq!(
            handoff.stats(),
            HandoffStats {
                published: 2,
                taken: 1,
                superseded: 1,
            }
        );
    }

    #[test]
    fn close_releases_pending() {
        let alive = Arc::new(AtomicUsize::new(0));
        let handoff = FrameHandoff::new();

        handoff.publish(Tracked::new(1, &alive));
        handoff.close();

        assert_eq!(alive.load(Ordering::SeqCst), 0);
        assert!(handoff.take_blocking().is_none());

        assert!(!handoff.publish(Tracked::new(2, &alive)));
        assert_eq!(alive.load(Ordering::SeqCst), 0);
        assert!(handoff.is_closed());
    }

    #[test]
    fn wakes_blocked_consumer() {
        let handoff = Arc::new(FrameHandoff::new());

        let consumer = {
            let handoff = handoff.clone();
            thread::spawn(move || handoff.take_blocking())
        };

        thread::sleep(Duration::from_millis(50));
        handoff.publish(7u32);

        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn close_wakes_blocked_consumer() {
        let handoff = Arc::new(FrameHandoff::<u32>::new());

        let consumer = {
            let handoff = handoff.clone();
            thread::spawn(move || handoff.take_blocking())
        };

        thread::sleep(Duration::from_millis(50));
        handoff.close();

        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn every_item_released_once() {
        let alive = Arc::new(AtomicUsize::new(0));
        let handoff = Arc::new(FrameHandoff::new());

        let consumer = {
            let handoff = handoff.clone();
            thread::spawn(move || {
                let mut last = 0;
                while let Some(item) = handoff.take_blocking() {
                    let item: Tracked = item;
                    assert!(item.id > last, "{} after {}", item.id, last);
                    last = item.id;
                }
                last
            })
        };

        for id in 1..=10_000 {
            handoff.publish(Tracked::new(id, &alive));
        }

        handoff.wait_taken();
        handoff.close();

        assert_eq!(consumer.join().unwrap(), 10_000);
        assert_eq!(alive.load(Ordering::SeqCst), 0);

        let stats = handoff.stats();
        assert_eq!(stats.published, 10_000);
        assert_eq!(stats.taken + stats.superseded, 10_000);
    }
}
