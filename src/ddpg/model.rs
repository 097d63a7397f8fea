use burn::prelude::*;
use burn::tensor::activation::relu;

use crate::burnrl::base::{ElemType, Space};
use crate::ddpg::target::SoftUpdate;

#[derive(Module, Debug)]
pub struct Actor<B: Backend> {
    linear1: nn::Linear<B>,
    linear2: nn::Linear<B>,
    linear3: nn::Linear<B>,
}

impl<B: Backend> Actor<B> {
    pub fn new(obs_dim: usize, action_dim: usize, hidden: usize, device: &B::Device) -> Self {
        let linear1 = nn::LinearConfig::new(obs_dim, hidden).init(device);
        let linear2 = nn::LinearConfig::new(hidden, hidden).init(device);
        let linear3 = nn::LinearConfig::new(hidden, action_dim)
            .with_initializer(nn::Initializer::Uniform {
                min: -3e-3,
                max: 3e-3,
            })
            .init(device);

        Self {
            linear1,
            linear2,
            linear3,
        }
    }

    /// Actions in `[-1, 1]`; see [`ActionBounds::scale`] for the environment range.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.linear1.forward(x));
        let x = relu(self.linear2.forward(x));
        self.linear3.forward(x).tanh()
    }
}

impl<B: Backend> SoftUpdate for Actor<B> {
    fn soft_update_from(&self, online: &Self, tau: f32) -> Self {
        Self {
            linear1: self.linear1.soft_update_from(&online.linear1, tau),
            linear2: self.linear2.soft_update_from(&online.linear2, tau),
            linear3: self.linear3.soft_update_from(&online.linear3, tau),
        }
    }
}

#[derive(Module, Debug)]
pub struct Critic<B: Backend> {
    linear1: nn::Linear<B>,
    linear2: nn::Linear<B>,
    linear3: nn::Linear<B>,
}

impl<B: Backend> Critic<B> {
    pub fn new(obs_dim: usize, action_dim: usize, hidden: usize, device: &B::Device) -> Self {
        let linear1 = nn::LinearConfig::new(obs_dim + action_dim, hidden).init(device);
        let linear2 = nn::LinearConfig::new(hidden, hidden).init(device);
        let linear3 = nn::LinearConfig::new(hidden, 1)
            .with_initializer(nn::Initializer::Uniform {
                min: -3e-3,
                max: 3e-3,
            })
            .init(device);

        Self {
            linear1,
            linear2,
            linear3,
        }
    }

    /// Expected return of taking `actions` in `states`, shape `[batch, 1]`.
    pub fn forward(&self, states: Tensor<B, 2>, actions: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = Tensor::cat(vec![states, actions], 1);
        let x = relu(self.linear1.forward(x));
        let x = relu(self.linear2.forward(x));
        self.linear3.forward(x)
    }
}

impl<B: Backend> SoftUpdate for Critic<B> {
    fn soft_update_from(&self, online: &Self, tau: f32) -> Self {
        Self {
            linear1: self.linear1.soft_update_from(&online.linear1, tau),
            linear2: self.linear2.soft_update_from(&online.linear2, tau),
            linear3: self.linear3.soft_update_from(&online.linear3, tau),
        }
    }
}

/// Affine map from the actor's `[-1, 1]` output to the action box.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBounds {
    low: Vec<ElemType>,
    high: Vec<ElemType>,
}

impl ActionBounds {
    pub fn new(low: Vec<ElemType>, high: Vec<ElemType>) -> Self {
        assert_eq!(low.len(), high.len(), "action bounds differ in length");
        Self { low, high }
    }

    /// `None` unless `space` is a continuous box.
    pub fn from_space(space: &Space) -> Option<Self> {
        space
            .bounds()
            .map(|(low, high)| Self::new(low.to_vec(), high.to_vec()))
    }

    pub fn dim(&self) -> usize {
        self.low.len()
    }

    pub fn low(&self) -> &[ElemType] {
        &self.low
    }

    pub fn high(&self) -> &[ElemType] {
        &self.high
    }

    pub fn scale<B: Backend>(&self, raw: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = raw.device();
        let shape = raw.shape();
        let half_range: Vec<ElemType> = self
            .low
            .iter()
            .zip(&self.high)
            .map(|(low, high)| (high - low) / 2.0)
            .collect();

        let low: Tensor<B, 2> = Tensor::<B, 1>::from_floats(self.low.as_slice(), &device)
            .reshape([1, self.dim()])
            .expand(shape.clone());
        let half_range: Tensor<B, 2> = Tensor::<B, 1>::from_floats(half_range.as_slice(), &device)
            .reshape([1, self.dim()])
            .expand(shape);

        low + raw.add_scalar(1.0) * half_range
    }

    pub fn clip(&self, action: &mut [ElemType]) {
        for ((value, low), high) in action.iter_mut().zip(&self.low).zip(&self.high) {
            *value = value.clamp(*low, *high);
        }
    }
}
