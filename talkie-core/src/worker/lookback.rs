//! The Lookback Buffer (§3): the last K PCM chunks retained by the Audio
//! Worker, flushed in insertion order at the rising edge of speech.

use crate::audio::chunk::PcmChunk;
use std::collections::VecDeque;

pub struct LookbackBuffer {
    chunks: VecDeque<PcmChunk>,
    capacity: usize,
}

impl LookbackBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a chunk, truncating from the front once over capacity.
    pub fn push(&mut self, chunk: PcmChunk) {
        self.chunks.push_back(chunk);
        while self.chunks.len() > self.capacity {
            self.chunks.pop_front();
        }
    }

    /// Drain every retained chunk, oldest first, clearing the buffer.
    pub fn drain_in_order(&mut self) -> Vec<PcmChunk> {
        self.chunks.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
