use std::collections::VecDeque;

use rand::Rng;

use crate::burnrl::base::ElemType;

/// One environment step as stored in the replay buffer.
///
/// `done` marks the end of the episode for any reason, `terminal` only an
/// absorbing state. Only `terminal` cuts the bootstrapped return.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<ElemType>,
    pub action: Vec<ElemType>,
    pub reward: ElemType,
    pub done: bool,
    pub terminal: bool,
    pub next_state: Vec<ElemType>,
}

/// Row-major minibatch ready to be turned into tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub states: Vec<ElemType>,
    pub actions: Vec<ElemType>,
    pub rewards: Vec<ElemType>,
    pub not_terminals: Vec<ElemType>,
    pub next_states: Vec<ElemType>,
    pub state_dim: usize,
    pub action_dim: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Bounded FIFO of transitions; the oldest transition is evicted first.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    transitions: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            transitions: VecDeque::with_capacity(capacity.min(1 << 16)),
            capacity,
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.transitions.len() >= self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Draws `batch_size` distinct transitions uniformly at random.
    ///
    /// Returns `None` while the buffer holds fewer than `batch_size` entries.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Option<Batch> {
        if batch_size == 0 || self.transitions.len() < batch_size {
            return None;
        }

        let first = &self.transitions[0];
        let state_dim = first.state.len();
        let action_dim = first.action.len();

        let mut batch = Batch {
            states: Vec::with_capacity(batch_size * state_dim),
            actions: Vec::with_capacity(batch_size * action_dim),
            rewards: Vec::with_capacity(batch_size),
            not_terminals: Vec::with_capacity(batch_size),
            next_states: Vec::with_capacity(batch_size * state_dim),
            state_dim,
            action_dim,
        };

        for index in rand::seq::index::sample(rng, self.transitions.len(), batch_size) {
            let transition = &self.transitions[index];
            batch.states.extend_from_slice(&transition.state);
            batch.actions.extend_from_slice(&transition.action);
            batch.rewards.push(transition.reward);
            batch
                .not_terminals
                .push(if transition.terminal { 0.0 } else { 1.0 });
            batch.next_states.extend_from_slice(&transition.next_state);
        }

        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn transition(i: usize) -> Transition {
        Transition {
            state: vec![i as ElemType, 0.0],
            action: vec![i as ElemType],
            reward: i as ElemType,
            done: i % 5 == 4,
            terminal: i % 10 == 9,
            next_state: vec![i as ElemType + 1.0, 0.0],
        }
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest() {
        let mut buffer = ReplayBuffer::new(3);
        for i in 0..7 {
            buffer.push(transition(i));
            assert!(buffer.len() <= 3);
        }

        let rewards: Vec<ElemType> = buffer.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn sample_needs_enough_transitions() {
        let mut buffer = ReplayBuffer::new(10);
        let mut rng = StdRng::seed_from_u64(0);
        buffer.push(transition(0));
        assert!(buffer.sample(2, &mut rng).is_none());
        assert!(buffer.sample(0, &mut rng).is_none());
    }

    #[test]
    fn sample_returns_requested_size_of_distinct_rows() {
        let mut buffer = ReplayBuffer::new(100);
        for i in 0..20 {
            buffer.push(transition(i));
        }
        let mut rng = StdRng::seed_from_u64(4);

        let batch = buffer.sample(8, &mut rng).unwrap();
        assert_eq!(batch.len(), 8);
        assert_eq!(batch.states.len(), 16);
        assert_eq!(batch.actions.len(), 8);
        assert_eq!(batch.next_states.len(), 16);

        let mut rewards = batch.rewards.clone();
        rewards.sort_by(|a, b| a.total_cmp(b));
        rewards.dedup();
        assert_eq!(rewards.len(), 8);

        for (row, reward) in batch.rewards.iter().enumerate() {
            let i = *reward as usize;
            assert_eq!(batch.states[2 * row], i as ElemType);
            assert_eq!(batch.next_states[2 * row], i as ElemType + 1.0);
            let expected = if i % 10 == 9 { 0.0 } else { 1.0 };
            assert_eq!(batch.not_terminals[row], expected);
        }
    }

    #[test]
    fn sampling_does_not_mutate_the_buffer() {
        let mut buffer = ReplayBuffer::new(100);
        for i in 0..10 {
            buffer.push(transition(i));
        }
        let before: Vec<Transition> = buffer.iter().cloned().collect();
        let mut rng = StdRng::seed_from_u64(1);
        buffer.sample(10, &mut rng).unwrap();

        let after: Vec<Transition> = buffer.iter().cloned().collect();
        assert_eq!(before, after);
    }
}
