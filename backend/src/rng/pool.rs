//! Per-agent random substreams
//!
//! Slot `n` of a population draws from ChaCha stream `n` of the run key, so
//! each slot owns a disjoint sequence. Slots are handed out as a mutable
//! slice, which lets agent functions draw from them in parallel without
//! sharing state.

use crate::rng::stream::{RandomStream, StreamState};

/// Lazily grown set of agent slot streams for one run
#[derive(Debug, Clone)]
pub struct AgentRandomPool {
    seed: u64,
    run_index: u64,
    streams: Vec<RandomStream>,
}

impl AgentRandomPool {
    pub fn new(seed: u64, run_index: u64) -> Self {
        Self {
            seed,
            run_index,
            streams: Vec::new(),
        }
    }

    /// Discard every slot stream and key new ones from `(seed, run_index)`
    pub fn reseed(&mut self, seed: u64, run_index: u64) {
        self.seed = seed;
        self.run_index = run_index;
        self.streams.clear();
    }

    /// Number of slots created so far
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn ensure(&mut self, slots: usize) {
        let (seed, run_index) = (self.seed, self.run_index);
        while self.streams.len() < slots {
            let slot = self.streams.len() as u64;
            self.streams
                .push(RandomStream::substream(seed, run_index, slot));
        }
    }

    /// Stream for one slot, creating it (and any lower slots) if needed
    pub fn stream_mut(&mut self, slot: usize) -> &mut RandomStream {
        self.ensure(slot + 1);
        &mut self.streams[slot]
    }

    /// Streams for slots `0..count`
    pub fn slots_mut(&mut self, count: usize) -> &mut [RandomStream] {
        self.ensure(count);
        &mut self.streams[..count]
    }

    /// Positions of every created slot, for checkpoints
    pub fn states(&self) -> Vec<StreamState> {
        self.streams.iter().map(RandomStream::state).collect()
    }

    /// Rebuild a pool from captured slot positions
    pub fn restore(seed: u64, run_index: u64, states: &[StreamState]) -> Self {
        Self {
            seed,
            run_index,
            streams: states.iter().copied().map(RandomStream::from_state).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_created_on_demand() {
        let mut pool = AgentRandomPool::new(1, 0);
        assert!(pool.is_empty());
        pool.slots_mut(8);
        assert_eq!(pool.len(), 8);
        pool.stream_mut(11);
        assert_eq!(pool.len(), 12);
        assert_eq!(pool.stream_mut(3).stream(), 3);
    }

    #[test]
    fn test_slots_draw_distinct_sequences() {
        let mut pool = AgentRandomPool::new(1, 0);
        let firsts: Vec<u64> = pool.slots_mut(64).iter_mut().map(|s| s.next_u64()).collect();
        let mut unique = firsts.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), firsts.len());
    }

    #[test]
    fn test_slot_sequence_independent_of_other_slots() {
        let mut busy = AgentRandomPool::new(9, 2);
        let mut idle = AgentRandomPool::new(9, 2);

        for _ in 0..10 {
            busy.stream_mut(0).next_u64();
        }
        assert_eq!(busy.stream_mut(1).next_u64(), idle.stream_mut(1).next_u64());
    }

    #[test]
    fn test_restore_resumes_slots() {
        let mut pool = AgentRandomPool::new(4, 4);
        for slot in pool.slots_mut(3) {
            slot.uniform::<f64>();
        }
        let mut restored = AgentRandomPool::restore(4, 4, &pool.states());
        assert_eq!(pool.stream_mut(2).next_u64(), restored.stream_mut(2).next_u64());
    }

    #[test]
    fn test_reseed_discards_slots() {
        let mut pool = AgentRandomPool::new(1, 0);
        let before = pool.stream_mut(0).next_u64();
        pool.reseed(1, 1);
        assert_eq!(pool.len(), 0);
        assert_ne!(pool.stream_mut(0).next_u64(), before);
    }
}
