//! The bounded Transport Queue that moves [`Buffer`]s from a Sender to a Receiver by swap.
//!
//! The queue holds two kinds of storage: a FIFO ring of capacity `K` that is never evicted
//! by an overwriting push, and a single "staging" slot that absorbs whatever the ring can't
//! hold. A push that finds the ring full does not evict the ring's oldest element; instead it
//! overwrites staging, discarding whatever was there before. `pop` always drains the ring
//! first and only returns the staging slot once the ring is empty. This reproduces the
//! documented overflow example exactly (capacity 2, writes 1..10, reads 1, 2, 10, then
//! "no data") without pretending the ring itself evicts under pressure.
//!
//! Data moves by [`std::mem::swap`] rather than by clone: every slot in the ring, in staging,
//! and in the spares pool is a real, preallocated `Buffer<T>`, so steady-state operation never
//! allocates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::task::Waker;
use std::time::Duration;

use crate::buffer::Buffer;

struct State<T> {
    ring: VecDeque<Buffer<T>>,
    staging: Option<Buffer<T>>,
    /// Preallocated, empty buffers of the right length, recycled by `pop`/`push_overwrite`
    /// instead of allocating a fresh `Vec` on every transfer.
    spares: Vec<Buffer<T>>,
    capacity: usize,
    closed: bool,
    waker: Option<Waker>,
}

/// A bounded, single-producer/single-consumer queue of `Buffer<T>` values.
///
/// Clone is cheap: it shares the underlying state via `Arc`, so a `TransportQueue` can be
/// held by both the Sender and the Receiver halves of a PV pair.
pub struct TransportQueue<T> {
    state: std::sync::Arc<Mutex<State<T>>>,
    not_empty: std::sync::Arc<Condvar>,
    cancelled: std::sync::Arc<AtomicBool>,
}

impl<T> Clone for TransportQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            not_empty: self.not_empty.clone(),
            cancelled: self.cancelled.clone(),
        }
    }
}

impl<T: Default + Clone> TransportQueue<T> {
    /// Creates a queue with ring capacity `capacity` (must be `>= 1`) and element length
    /// `elem_len`, preallocating `capacity + 1` spare buffers (the ring's worth plus one for
    /// staging) up front.
    pub fn new(capacity: usize, elem_len: usize) -> Self {
        assert!(capacity >= 1, "Transport Queue capacity must be at least 1");
        let spares = (0..=capacity).map(|_| Buffer::empty(elem_len)).collect();
        let state = State {
            ring: VecDeque::with_capacity(capacity),
            staging: None,
            spares,
            capacity,
            closed: false,
            waker: None,
        };
        Self {
            state: std::sync::Arc::new(Mutex::new(state)),
            not_empty: std::sync::Arc::new(Condvar::new()),
            cancelled: std::sync::Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<T> TransportQueue<T> {
    fn lock(&self) -> std::sync::MutexGuard<'_, State<T>> {
        self.state.lock().expect("transport queue lock poisoned")
    }

    /// Swaps `value` into the queue, returning `true` if doing so overwrote (discarded) data
    /// that had not yet been popped — either because the ring was full and the new value
    /// displaced the previous staging slot's contents, or because staging already held a
    /// value that is now replaced.
    ///
    /// `value` is left holding whatever spare buffer the queue reclaimed, ready for the
    /// caller to reuse on the next write.
    pub fn push_overwrite(&self, value: &mut Buffer<T>) -> bool {
        let mut state = self.lock();
        let lost = if state.ring.len() < state.capacity {
            let mut slot = state.spares.pop().unwrap_or_else(|| placeholder());
            std::mem::swap(&mut slot, value);
            state.ring.push_back(slot);
            false
        } else {
            let lost = state.staging.is_some();
            let mut slot = state
                .staging
                .take()
                .or_else(|| state.spares.pop())
                .unwrap_or_else(|| placeholder());
            std::mem::swap(&mut slot, value);
            state.staging = Some(slot);
            lost
        };
        let waker = state.waker.take();
        drop(state);
        self.not_empty.notify_one();
        if let Some(waker) = waker {
            waker.wake();
        }
        lost
    }

    /// Non-blocking pop: drains the ring first, falling back to staging once the ring is
    /// empty. Returns `false` (leaving `out` untouched) if nothing is available.
    pub fn pop(&self, out: &mut Buffer<T>) -> bool {
        let mut state = self.lock();
        self.pop_locked(&mut state, out)
    }

    fn pop_locked(&self, state: &mut State<T>, out: &mut Buffer<T>) -> bool {
        if let Some(mut slot) = state.ring.pop_front() {
            std::mem::swap(&mut slot, out);
            state.spares.push(slot);
            true
        } else if let Some(mut slot) = state.staging.take() {
            std::mem::swap(&mut slot, out);
            state.spares.push(slot);
            true
        } else {
            false
        }
    }

    /// Blocking pop: waits until data is available, the queue is cancelled, or `timeout`
    /// elapses. Returns `true` if `out` was filled.
    pub fn pop_wait(&self, out: &mut Buffer<T>, timeout: Option<Duration>) -> bool {
        let mut state = self.lock();
        let deadline = timeout.map(|d| std::time::Instant::now() + d);
        loop {
            if self.pop_locked(&mut state, out) {
                return true;
            }
            if self.cancelled.load(Ordering::Acquire) || state.closed {
                return false;
            }
            state = match deadline {
                None => self.not_empty.wait(state).expect("transport queue lock poisoned"),
                Some(deadline) => {
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, result) = self
                        .not_empty
                        .wait_timeout(state, deadline - now)
                        .expect("transport queue lock poisoned");
                    if result.timed_out() && !self.pop_locked_has_data(&guard) {
                        return false;
                    }
                    guard
                }
            };
        }
    }

    fn pop_locked_has_data(&self, state: &State<T>) -> bool {
        !state.ring.is_empty() || state.staging.is_some()
    }

    /// Registers `waker` to be woken the next time a push makes data available, or wakes it
    /// immediately if data is already present. Used by the asynchronous `then`/`readAsync`
    /// continuation path: the caller polls [`TransportQueue::pop`] again after being woken.
    pub fn register_waker(&self, waker: Waker) {
        let mut state = self.lock();
        if self.pop_locked_has_data(&state) {
            drop(state);
            waker.wake();
            return;
        }
        state.waker = Some(waker);
    }

    /// Unblocks every thread currently parked in [`TransportQueue::pop_wait`] without
    /// delivering data, and causes future calls to return immediately. Used when a PV is torn
    /// down while a reader is waiting on it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let mut state = self.lock();
        state.closed = true;
        let waker = state.waker.take();
        drop(state);
        self.not_empty.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// `true` once [`TransportQueue::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Number of elements currently queued (ring plus staging), for diagnostics and tests.
    pub fn len(&self) -> usize {
        let state = self.lock();
        state.ring.len() + state.staging.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }
}

/// Only reachable if a queue is created with a spares pool smaller than its working set ever
/// requires, which `new` never does; kept as a safety net rather than an `unwrap` at the call
/// sites above.
fn placeholder<T>() -> Buffer<T> {
    panic!("transport queue spares pool exhausted: this indicates a bug in queue bookkeeping")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(value: i32) -> Buffer<i32> {
        let mut b = Buffer::empty(1);
        b.payload_mut()[0] = value;
        b
    }

    fn value_of(b: &Buffer<i32>) -> i32 {
        b.payload()[0]
    }

    #[test]
    fn scalar_round_trip_is_lossless() {
        let queue = TransportQueue::<i32>::new(2, 1);
        let mut out = Buffer::empty(1);

        for v in [42, 43, 44] {
            let mut input = buf(v);
            let lost = queue.push_overwrite(&mut input);
            assert!(!lost);
        }
        let mut seen = Vec::new();
        while queue.pop(&mut out) {
            seen.push(value_of(&out));
        }
        assert_eq!(seen, vec![42, 43, 44]);
    }

    #[test]
    fn overflow_follows_ring_plus_staging_model() {
        // capacity 2, writes 1..=10: ring holds the first two writes (1, 2); every later
        // write only ever overwrites staging, so after writing 1..=10 staging holds 10 and
        // the ring still holds [1, 2].
        let queue = TransportQueue::<i32>::new(2, 1);
        let mut lost_flags = Vec::new();
        for v in 1..=10 {
            let mut input = buf(v);
            lost_flags.push(queue.push_overwrite(&mut input));
        }
        // first two pushes fill the ring without loss; every push after that overwrites
        // staging, and all but the very first of those reports a loss.
        assert_eq!(lost_flags, vec![false, false, false, true, true, true, true, true, true, true]);

        let mut out = Buffer::empty(1);
        assert!(queue.pop(&mut out));
        assert_eq!(value_of(&out), 1);
        assert!(queue.pop(&mut out));
        assert_eq!(value_of(&out), 2);
        assert!(queue.pop(&mut out));
        assert_eq!(value_of(&out), 10);
        assert!(!queue.pop(&mut out));
    }

    #[test]
    fn pop_wait_unblocks_on_push() {
        use std::sync::Arc;
        use std::thread;

        let queue = Arc::new(TransportQueue::<i32>::new(2, 1));
        let producer = queue.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let mut input = buf(7);
            producer.push_overwrite(&mut input);
        });

        let mut out = Buffer::empty(1);
        let got = queue.pop_wait(&mut out, Some(Duration::from_secs(5)));
        handle.join().unwrap();
        assert!(got);
        assert_eq!(value_of(&out), 7);
    }

    #[test]
    fn pop_wait_times_out_when_no_data_arrives() {
        let queue = TransportQueue::<i32>::new(2, 1);
        let mut out = Buffer::empty(1);
        let got = queue.pop_wait(&mut out, Some(Duration::from_millis(20)));
        assert!(!got);
    }

    #[test]
    fn cancel_unblocks_pending_waiters() {
        use std::sync::Arc;
        use std::thread;

        let queue = Arc::new(TransportQueue::<i32>::new(2, 1));
        let canceller = queue.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        let mut out = Buffer::empty(1);
        let got = queue.pop_wait(&mut out, None);
        handle.join().unwrap();
        assert!(!got);
        assert!(queue.is_cancelled());
    }

    #[test]
    fn register_waker_fires_immediately_when_data_already_present() {
        use std::sync::Arc;
        use std::task::Wake;

        struct NoopWaker;
        impl Wake for NoopWaker {
            fn wake(self: Arc<Self>) {}
        }

        let waker = Arc::new(NoopWaker).into();

        let queue = TransportQueue::<i32>::new(2, 1);
        let mut input = buf(1);
        queue.push_overwrite(&mut input);
        // data is already present, so registering should not block or panic.
        queue.register_waker(waker);
        assert!(!queue.is_empty());
    }
}
