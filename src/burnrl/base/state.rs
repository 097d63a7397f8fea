use std::fmt::Debug;

use burn::tensor::{Tensor, backend::Backend};

use crate::burnrl::base::ElemType;

pub trait State: Debug + Clone {
    /// Flat feature vector fed to the networks.
    fn features(&self) -> Vec<ElemType>;

    fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        Tensor::from_floats(self.features().as_slice(), device)
    }

    fn size(&self) -> usize {
        self.features().len()
    }
}

impl<const N: usize> State for [ElemType; N] {
    fn features(&self) -> Vec<ElemType> {
        self.to_vec()
    }

    fn size(&self) -> usize {
        N
    }
}
