use anyhow::bail;
use burn::config::Config;

#[derive(Config, Debug)]
pub struct DdpgConfig {
    #[config(default = 64)]
    pub batch_size: usize,
    #[config(default = 0.99)]
    pub gamma: f32,
    #[config(default = 128)]
    pub hidden_layer_size: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Ornstein-Uhlenbeck noise scale.
    #[config(default = 0.2)]
    pub noise_sigma: f32,
    /// Ornstein-Uhlenbeck mean reversion rate.
    #[config(default = 0.15)]
    pub noise_theta: f32,
    /// Polyak weight of the online parameters in the target update.
    #[config(default = 0.005)]
    pub target_tau: f32,
    /// Training episodes between two evaluations.
    #[config(default = 50)]
    pub evaluate_each: usize,
    /// Episodes per evaluation, also used by the final evaluation.
    #[config(default = 50)]
    pub evaluate_for: usize,
    #[config(default = 10)]
    pub report_each: usize,
    /// Training episodes before the final evaluation starts.
    #[config(default = 500)]
    pub max_episodes: usize,
    #[config(default = 100_000)]
    pub replay_capacity: usize,
    /// Updates start once the buffer holds `warmup_batches * batch_size` transitions.
    #[config(default = 4)]
    pub warmup_batches: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 0)]
    pub render_each: usize,
}

impl DdpgConfig {
    pub fn warmup_size(&self) -> usize {
        self.warmup_batches.max(1) * self.batch_size
    }

    /// Seed of the exploration noise.
    pub fn noise_seed(&self) -> u64 {
        self.seed
    }

    /// Seed of the replay sampler, distinct from the noise stream.
    pub fn replay_seed(&self) -> u64 {
        self.seed.wrapping_add(1)
    }

    pub fn environment_seed(&self) -> u64 {
        self.seed.wrapping_add(2)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            bail!("the batch size must be positive");
        }
        if self.replay_capacity < self.warmup_size() {
            bail!(
                "replay capacity {} is smaller than the {} transitions needed before the first update",
                self.replay_capacity,
                self.warmup_size()
            );
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            bail!("gamma must lie in [0, 1], got {}", self.gamma);
        }
        if !(self.target_tau > 0.0 && self.target_tau <= 1.0) {
            bail!("target tau must lie in (0, 1], got {}", self.target_tau);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DdpgConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.warmup_size(), 256);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(DdpgConfig::new().with_batch_size(0).validate().is_err());
    }

    #[test]
    fn buffer_must_hold_the_warmup() {
        let config = DdpgConfig::new()
            .with_batch_size(8)
            .with_warmup_batches(4)
            .with_replay_capacity(16);
        assert!(config.validate().is_err());
        assert!(config.with_replay_capacity(32).validate().is_ok());
    }

    #[test]
    fn out_of_range_rates_are_rejected() {
        assert!(DdpgConfig::new().with_gamma(1.5).validate().is_err());
        assert!(DdpgConfig::new().with_target_tau(0.0).validate().is_err());
        assert!(DdpgConfig::new().with_gamma(0.0).with_target_tau(1.0).validate().is_ok());
    }

    #[test]
    fn random_streams_get_distinct_seeds() {
        let config = DdpgConfig::new().with_seed(u64::MAX);
        let seeds = [config.noise_seed(), config.replay_seed(), config.environment_seed()];
        assert_eq!(seeds, [u64::MAX, 0, 1]);
    }
}
