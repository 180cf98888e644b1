//! Track ordering under shuffle and repeat
//!
//! With shuffle off, next/previous step through the queue in order. With
//! shuffle on they step through a Fisher-Yates permutation of queue positions.
//! Both wrap around. Repeat does not affect ordering; it only changes what the
//! session does when a track ends naturally.

use crate::queue::Queue;
use encore_core::TrackId;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

/// Uniformly random permutation of `0..len`
pub fn shuffled_order(len: usize) -> Vec<usize> {
    shuffled_order_with(len, &mut thread_rng())
}

/// Uniformly random permutation of `0..len` from the given generator
pub fn shuffled_order_with<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    // SliceRandom::shuffle is Fisher-Yates
    order.shuffle(rng);
    order
}

/// Shuffle/repeat mode plus the shuffle permutation
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    shuffle: bool,
    repeat: bool,
    order: Vec<usize>,
}

impl Sequencer {
    pub fn new(shuffle: bool, repeat: bool, queue_len: usize) -> Self {
        let order = if shuffle {
            shuffled_order(queue_len)
        } else {
            Vec::new()
        };
        Self {
            shuffle,
            repeat,
            order,
        }
    }

    pub fn is_shuffle_on(&self) -> bool {
        self.shuffle
    }

    pub fn is_repeat_on(&self) -> bool {
        self.repeat
    }

    /// Current shuffle permutation (empty while shuffle is off)
    pub fn shuffle_order(&self) -> &[usize] {
        &self.order
    }

    /// Flip repeat; returns the new value
    pub fn toggle_repeat(&mut self) -> bool {
        self.repeat = !self.repeat;
        self.repeat
    }

    /// Flip shuffle; returns the new value
    ///
    /// Turning shuffle on draws a fresh permutation.
    pub fn toggle_shuffle(&mut self, queue_len: usize) -> bool {
        self.set_shuffle(!self.shuffle, queue_len);
        self.shuffle
    }

    pub fn set_shuffle(&mut self, on: bool, queue_len: usize) {
        if on && !self.shuffle {
            self.order = shuffled_order(queue_len);
        } else if !on {
            self.order.clear();
        }
        self.shuffle = on;
    }

    /// Keep the permutation in step with a replaced queue
    ///
    /// Regenerated only when shuffle is on and the length changed.
    pub fn on_queue_changed(&mut self, queue_len: usize) {
        if self.shuffle && self.order.len() != queue_len {
            self.order = shuffled_order(queue_len);
        }
    }

    /// Rotate the shuffle permutation so `queue_index` comes first
    ///
    /// A shuffled run started at that track then reaches every other track
    /// before `successor` runs out. The wrapping cycle seen by next/previous
    /// is unchanged. No-op while shuffle is off.
    pub fn anchor(&mut self, queue_index: usize) {
        if let Some(pos) = self.order.iter().position(|&i| i == queue_index) {
            self.order.rotate_left(pos);
        }
    }

    /// Next track, wrapping at the end
    pub fn next(&self, queue: &Queue, current: &TrackId) -> Option<TrackId> {
        self.step(queue, current, 1, true)
    }

    /// Previous track, wrapping at the start
    pub fn previous(&self, queue: &Queue, current: &TrackId) -> Option<TrackId> {
        self.step(queue, current, -1, true)
    }

    /// Next track without wrapping
    ///
    /// `None` when `current` is last in traversal order. Used when a track ends
    /// on its own.
    pub fn successor(&self, queue: &Queue, current: &TrackId) -> Option<TrackId> {
        self.step(queue, current, 1, false)
    }

    /// Distinct next and previous tracks, excluding `current`
    pub fn neighbors(&self, queue: &Queue, current: &TrackId) -> Vec<TrackId> {
        let mut out: Vec<TrackId> = Vec::with_capacity(2);
        for id in [self.next(queue, current), self.previous(queue, current)]
            .into_iter()
            .flatten()
        {
            if &id != current && !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    fn step(&self, queue: &Queue, current: &TrackId, delta: isize, wrap: bool) -> Option<TrackId> {
        let len = queue.len();
        if len == 0 {
            return None;
        }
        let index = queue.position(current)?;

        // A stale permutation falls back to queue order
        let shuffled = self.shuffle && self.order.len() == len;
        let pos = if shuffled {
            self.order.iter().position(|&i| i == index)?
        } else {
            index
        };

        let target = pos as isize + delta;
        let target = if wrap {
            target.rem_euclid(len as isize) as usize
        } else if (0..len as isize).contains(&target) {
            target as usize
        } else {
            return None;
        };

        let queue_index = if shuffled { self.order[target] } else { target };
        queue.get(queue_index).map(|t| t.id.clone())
    }
}
