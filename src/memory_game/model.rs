//! Memory-augmented policy for the memory game.
//!
//! Each step reads the memory with a content-based key, acts on the current
//! observation together with what was read, and pushes the observation into
//! the memory as its first row.

use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};

use crate::burnrl::base::ElemType;
use crate::burnrl::environments::MemoryGameObservation;

const NORM_EPSILON: f32 = 1e-8;

#[derive(Module, Debug)]
pub struct MemoryAgent<B: Backend> {
    key_hidden: nn::Linear<B>,
    key_output: nn::Linear<B>,
    policy_hidden: nn::Linear<B>,
    policy_output: nn::Linear<B>,
}

impl<B: Backend> MemoryAgent<B> {
    pub fn new(cell_size: usize, hidden: usize, actions: usize, device: &B::Device) -> Self {
        Self {
            key_hidden: nn::LinearConfig::new(cell_size, hidden).init(device),
            key_output: nn::LinearConfig::new(hidden, cell_size).init(device),
            policy_hidden: nn::LinearConfig::new(2 * cell_size, hidden).init(device),
            policy_output: nn::LinearConfig::new(hidden, actions).init(device),
        }
    }

    /// One step for a batch.
    ///
    /// `memory` is `[batch, cells, cell_size]`, `encoded` is
    /// `[batch, cell_size]`. Returns the written memory and the action logits.
    pub fn forward(&self, memory: Tensor<B, 3>, encoded: Tensor<B, 2>) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let key = self
            .key_output
            .forward(relu(self.key_hidden.forward(encoded.clone())))
            .tanh();
        let read = read_memory(memory.clone(), key);

        let hidden = relu(
            self.policy_hidden
                .forward(Tensor::cat(vec![encoded.clone(), read], 1)),
        );
        let logits = self.policy_output.forward(hidden);

        (write_memory(memory, encoded), logits)
    }
}

/// Cosine-similarity attention over memory rows.
pub fn read_memory<B: Backend>(memory: Tensor<B, 3>, key: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch, cells, cell_size] = memory.dims();

    let key_norm: Tensor<B, 3> = key
        .clone()
        .powf_scalar(2.0)
        .sum_dim(1)
        .add_scalar(NORM_EPSILON)
        .sqrt()
        .unsqueeze_dim::<3>(1)
        .expand([batch, cells, 1]);
    let row_norms = memory
        .clone()
        .powf_scalar(2.0)
        .sum_dim(2)
        .add_scalar(NORM_EPSILON)
        .sqrt();

    let key: Tensor<B, 3> = key.unsqueeze_dim::<3>(1).expand([batch, cells, cell_size]);
    let similarity = (memory.clone() * key).sum_dim(2) / (row_norms * key_norm);
    let weights: Tensor<B, 3> = softmax(similarity, 1).expand([batch, cells, cell_size]);

    (memory * weights).sum_dim(1).squeeze::<2>(1)
}

/// Prepends `encoded` as the first row and drops the last one.
pub fn write_memory<B: Backend>(memory: Tensor<B, 3>, encoded: Tensor<B, 2>) -> Tensor<B, 3> {
    let [batch, cells, cell_size] = memory.dims();
    let row = encoded.unsqueeze_dim::<3>(1);
    if cells <= 1 {
        return row;
    }

    let kept = memory.slice([0..batch, 0..cells - 1, 0..cell_size]);
    Tensor::cat(vec![row, kept], 1)
}

pub fn zero_memory<B: Backend>(batch: usize, cells: usize, cell_size: usize, device: &B::Device) -> Tensor<B, 3> {
    Tensor::zeros([batch, cells, cell_size], device)
}

/// One-hot card followed by one-hot symbol, one row per observation.
pub fn encode<B: Backend>(
    observations: &[MemoryGameObservation],
    cards: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let width = cards + cards / 2;
    let mut rows = vec![0.0 as ElemType; observations.len() * width];
    for (row, observation) in rows.chunks_mut(width).zip(observations) {
        row[observation.card] = 1.0;
        row[cards + observation.symbol] = 1.0;
    }

    Tensor::<B, 1>::from_floats(rows.as_slice(), device).reshape([observations.len(), width])
}
