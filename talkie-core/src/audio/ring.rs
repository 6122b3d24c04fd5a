//! The Ring Transport (§4.1): a single-producer/single-consumer byte ring
//! carrying raw PCM, plus a wakeup signal the reader can block on.
//!
//! The writer side is wait-free and allocation-free — it is safe to call
//! from the real-time audio callback. `push_pcm` either writes the whole
//! slice or drops it entirely and bumps an overflow counter; it never
//! performs a partial write, matching the "drop the incoming chunk, not a
//! historical block" policy in §4.1.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;

/// Minimum ring capacity: 500ms of audio at a given sample rate, in bytes
/// (16-bit mono PCM = 2 bytes/sample), rounded up to the next power of two.
pub fn capacity_for_rate(sample_rate: u32) -> usize {
    let min_bytes = (sample_rate as usize * 2) / 2; // 500ms = sample_rate/2 frames * 2 bytes
    min_bytes.next_power_of_two()
}

/// Shared overflow counter and wakeup primitive, held by both halves of the ring.
#[derive(Default)]
struct Shared {
    overflow_count: AtomicU64,
    wakeup: (Mutex<bool>, Condvar),
}

impl Shared {
    fn post_wakeup(&self) {
        let (lock, cvar) = &self.wakeup;
        let mut pending = lock.lock().unwrap();
        // Coalesce: a pending, un-consumed wakeup is a no-op.
        *pending = true;
        cvar.notify_one();
    }

    fn wait_wakeup(&self, timeout: Duration) {
        let (lock, cvar) = &self.wakeup;
        let pending = lock.lock().unwrap();
        if *pending {
            return;
        }
        let (mut pending, _) = cvar.wait_timeout(pending, timeout).unwrap();
        *pending = false;
    }

    fn clear_wakeup(&self) {
        let (lock, _cvar) = &self.wakeup;
        *lock.lock().unwrap() = false;
    }
}

/// Writer half. Held by the Capture Source; `!Sync` usage is single-threaded
/// by construction (one RT callback at a time).
pub struct PcmProducer {
    inner: ringbuf::HeapProd<u8>,
    shared: Arc<Shared>,
}

/// Reader half. Held by the Audio Worker thread.
pub struct PcmConsumer {
    inner: ringbuf::HeapCons<u8>,
    shared: Arc<Shared>,
}

/// Snapshot of ring health, exposed to the UI/diagnostics layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingStats {
    pub overflow_count: u64,
}

impl PcmProducer {
    /// Write `bytes` into the ring in one call. Returns `true` if written,
    /// `false` if there was not enough room — the caller must treat `false`
    /// as "dropped," never retry a partial write.
    ///
    /// Never allocates, never blocks. Safe to call from the RT audio callback.
    pub fn push_pcm(&mut self, bytes: &[u8]) -> bool {
        if self.inner.vacant_len() < bytes.len() {
            self.shared.overflow_count.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let written = self.inner.push_slice(bytes);
        debug_assert_eq!(written, bytes.len());
        self.shared.post_wakeup();
        true
    }

    pub fn overflow_count(&self) -> u64 {
        self.shared.overflow_count.load(Ordering::Relaxed)
    }
}

impl PcmConsumer {
    /// Block until data is available or `timeout` elapses, then drain every
    /// byte currently available into `out` (appended). Returns the number of
    /// bytes appended — zero means "timed out, no data," which is normal
    /// underflow, not an error.
    pub fn recv_timeout(&mut self, out: &mut Vec<u8>, timeout: Duration) -> usize {
        if self.inner.occupied_len() == 0 {
            self.shared.wait_wakeup(timeout);
        }
        self.shared.clear_wakeup();
        let before = out.len();
        let available = self.inner.occupied_len();
        if available == 0 {
            return 0;
        }
        out.resize(before + available, 0);
        let read = self.inner.pop_slice(&mut out[before..]);
        out.truncate(before + read);
        read
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            overflow_count: self.shared.overflow_count.load(Ordering::Relaxed),
        }
    }
}

/// Build a matched producer/consumer pair sized for at least 500ms of audio
/// at `sample_rate`, per §4.1's capacity rule.
pub fn create_pcm_ring(sample_rate: u32) -> (PcmProducer, PcmConsumer) {
    let capacity = capacity_for_rate(sample_rate);
    let (prod, cons) = HeapRb::<u8>::new(capacity).split();
    let shared = Arc::new(Shared::default());
    (
        PcmProducer {
            inner: prod,
            shared: Arc::clone(&shared),
        },
        PcmConsumer {
            inner: cons,
            shared,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_power_of_two_and_covers_500ms() {
        let cap = capacity_for_rate(16_000);
        assert!(cap.is_power_of_two());
        assert!(cap >= 16_000 * 2 / 2);
    }

    #[test]
    fn bytes_round_trip_in_order() {
        let (mut p, mut c) = create_pcm_ring(16_000);
        let payload: Vec<u8> = (0u8..=255).collect();
        assert!(p.push_pcm(&payload));
        let mut out = Vec::new();
        let n = c.recv_timeout(&mut out, Duration::from_millis(50));
        assert_eq!(n, payload.len());
        assert_eq!(out, payload);
    }

    #[test]
    fn overflow_increments_counter_and_drops_whole_chunk() {
        let capacity = capacity_for_rate(8_000);
        let (mut p, c) = create_pcm_ring(8_000);
        let huge = vec![0u8; capacity + 1];
        assert!(!p.push_pcm(&huge));
        assert_eq!(p.overflow_count(), 1);
        assert_eq!(c.stats().overflow_count, 1);
    }

    #[test]
    fn recv_times_out_on_empty_ring() {
        let (_p, mut c) = create_pcm_ring(16_000);
        let mut out = Vec::new();
        let n = c.recv_timeout(&mut out, Duration::from_millis(20));
        assert_eq!(n, 0);
    }
}
