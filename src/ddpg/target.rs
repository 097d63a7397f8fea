//! Polyak averaging of target networks.
//!
//! ```text
//! θ_target ← (1 − τ) · θ_target + τ · θ_online
//! ```
//!
//! Parameters are matched field by field, so both networks must share the
//! architecture. Parameter ids of the target are preserved.

use burn::module::Param;
use burn::nn::Linear;
use burn::prelude::*;

/// Modules whose parameters can track another instance of the same module.
pub trait SoftUpdate: Sized {
    /// Returns `self` moved towards `online` by the interpolation weight `tau`.
    ///
    /// `tau <= 0` keeps the target, `tau >= 1` copies the online values.
    fn soft_update_from(&self, online: &Self, tau: f32) -> Self;
}

pub(crate) fn polyak<B: Backend, const D: usize>(
    target: &Param<Tensor<B, D>>,
    online: &Param<Tensor<B, D>>,
    tau: f32,
) -> Param<Tensor<B, D>> {
    let value = if tau <= 0.0 {
        target.val()
    } else if tau >= 1.0 {
        online.val()
    } else {
        target.val().mul_scalar(1.0 - tau) + online.val().mul_scalar(tau)
    };

    Param::initialized(target.id.clone(), value)
}

impl<B: Backend> SoftUpdate for Linear<B> {
    fn soft_update_from(&self, online: &Self, tau: f32) -> Self {
        let mut updated = self.clone();
        updated.weight = polyak(&self.weight, &online.weight, tau);
        updated.bias = match (&self.bias, &online.bias) {
            (Some(target), Some(online)) => Some(polyak(target, online, tau)),
            (target, _) => target.clone(),
        };
        updated
    }
}
