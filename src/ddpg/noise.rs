use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::burnrl::base::ElemType;

/// Mean-reverting, temporally correlated exploration noise.
///
/// Every sample advances `x ← x + θ(μ − x) + σ·N(0, 1)` and returns `x`.
#[derive(Debug, Clone)]
pub struct OrnsteinUhlenbeckNoise {
    mu: Vec<ElemType>,
    theta: ElemType,
    sigma: ElemType,
    state: Vec<ElemType>,
    rng: StdRng,
}

impl OrnsteinUhlenbeckNoise {
    pub fn new(dim: usize, mu: ElemType, theta: ElemType, sigma: ElemType, seed: u64) -> Self {
        let mu = vec![mu; dim];
        Self {
            state: mu.clone(),
            mu,
            theta,
            sigma,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn reset(&mut self) {
        self.state.copy_from_slice(&self.mu);
    }

    pub fn state(&self) -> &[ElemType] {
        &self.state
    }

    pub fn sample(&mut self) -> &[ElemType] {
        for (x, mu) in self.state.iter_mut().zip(&self.mu) {
            *x += self.theta * (mu - *x) + self.sigma * standard_normal(&mut self.rng);
        }
        &self.state
    }
}

/// Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> ElemType {
    let u1: ElemType = 1.0 - rng.random::<ElemType>();
    let u2: ElemType = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn reset_returns_to_mean() {
        let mut noise = OrnsteinUhlenbeckNoise::new(2, 0.5, 0.15, 0.2, 1);
        for _ in 0..10 {
            noise.sample();
        }
        assert_ne!(noise.state(), &[0.5, 0.5]);

        noise.reset();
        assert_eq!(noise.state(), &[0.5, 0.5]);
    }

    #[test]
    fn sequence_is_a_function_of_the_seed() {
        let mut a = OrnsteinUhlenbeckNoise::new(3, 0.0, 0.15, 0.2, 9);
        let mut b = OrnsteinUhlenbeckNoise::new(3, 0.0, 0.15, 0.2, 9);
        let mut c = OrnsteinUhlenbeckNoise::new(3, 0.0, 0.15, 0.2, 10);

        let xs: Vec<Vec<ElemType>> = (0..50).map(|_| a.sample().to_vec()).collect();
        let ys: Vec<Vec<ElemType>> = (0..50).map(|_| b.sample().to_vec()).collect();
        let zs: Vec<Vec<ElemType>> = (0..50).map(|_| c.sample().to_vec()).collect();

        assert_eq!(xs, ys);
        assert_ne!(xs, zs);
    }

    #[test]
    fn without_sigma_the_state_decays_to_the_mean() {
        let mut noise = OrnsteinUhlenbeckNoise::new(1, 0.0, 0.5, 0.0, 0);
        noise.state[0] = 1.0;
        assert_abs_diff_eq!(noise.sample()[0], 0.5);
        assert_abs_diff_eq!(noise.sample()[0], 0.25);
    }

    #[test]
    fn long_run_average_stays_near_the_mean() {
        let mut noise = OrnsteinUhlenbeckNoise::new(1, 0.0, 0.15, 0.2, 3);
        let steps = 20_000;
        let mean = (0..steps).map(|_| noise.sample()[0]).sum::<ElemType>() / steps as ElemType;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 0.1);
    }
}
