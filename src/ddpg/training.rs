use std::path::Path;

use anyhow::{Context, bail};
use burn::config::Config;
use burn::optim::Optimizer;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::burnrl::base::{
    ElemType, Environment, EvaluationEnv, EvaluationSummary, State, evaluate_episode,
    final_evaluation,
};
use crate::ddpg::agent::{DeterministicPolicy, Networks, UpdateStats, init_networks};
use crate::ddpg::config::DdpgConfig;
use crate::ddpg::model::{ActionBounds, Actor, Critic};
use crate::ddpg::noise::OrnsteinUhlenbeckNoise;
use crate::ddpg::replay_buffer::{ReplayBuffer, Transition};

pub const CONFIG_FILE: &str = "config.json";
pub const ACTOR_FILE: &str = "actor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Collecting transitions, no updates yet.
    Warmup,
    Train,
    /// Periodic noise-free evaluation between training episodes.
    Evaluate,
    /// Evaluation episodes counted towards the final summary.
    Final,
}

/// What a training run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// `(training episodes so far, mean evaluation return)` per evaluation.
    pub evaluations: Vec<(usize, ElemType)>,
    pub summary: EvaluationSummary,
    pub updates: usize,
}

/// Mutable state of a training run.
pub struct TrainingContext<B: AutodiffBackend, AO, CO> {
    pub networks: Networks<B, AO, CO>,
    pub replay_buffer: ReplayBuffer,
    pub noise: OrnsteinUhlenbeckNoise,
    rng: StdRng,
    phase: Phase,
    training_episodes: usize,
    updates: usize,
    warmup_size: usize,
    batch_size: usize,
}

impl<B, AO, CO> TrainingContext<B, AO, CO>
where
    B: AutodiffBackend,
    AO: Optimizer<Actor<B>, B>,
    CO: Optimizer<Critic<B>, B>,
{
    pub fn new(networks: Networks<B, AO, CO>, config: &DdpgConfig) -> Self {
        let noise = OrnsteinUhlenbeckNoise::new(
            networks.bounds().dim(),
            0.0,
            config.noise_theta,
            config.noise_sigma,
            config.noise_seed(),
        );

        Self {
            networks,
            replay_buffer: ReplayBuffer::new(config.replay_capacity),
            noise,
            rng: StdRng::seed_from_u64(config.replay_seed()),
            phase: Phase::Warmup,
            training_episodes: 0,
            updates: 0,
            warmup_size: config.warmup_size(),
            batch_size: config.batch_size,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn training_episodes(&self) -> usize {
        self.training_episodes
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!("Phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Online action plus exploration noise, clipped to the action bounds.
    pub fn explore(&mut self, state: &[ElemType]) -> Vec<ElemType> {
        let mut action = self
            .networks
            .predict_actions(state)
            .into_iter()
            .next()
            .unwrap_or_default();
        for (value, noise) in action.iter_mut().zip(self.noise.sample()) {
            *value += noise;
        }
        self.networks.bounds().clip(&mut action);
        action
    }

    /// Stores `transition` and runs one update once the buffer is warm.
    pub fn observe(&mut self, transition: Transition) -> Option<UpdateStats> {
        self.replay_buffer.push(transition);
        if self.replay_buffer.len() < self.warmup_size {
            self.set_phase(Phase::Warmup);
            return None;
        }

        self.set_phase(Phase::Train);
        let batch = self.replay_buffer.sample(self.batch_size, &mut self.rng)?;
        self.updates += 1;
        Some(self.networks.train(&batch))
    }

    /// Plays one noisy episode, learning from every step.
    pub fn train_episode<E>(&mut self, env: &mut EvaluationEnv<E>) -> anyhow::Result<ElemType>
    where
        E: Environment<ActionType = Vec<ElemType>>,
    {
        let (mut state, _) = env.reset(false, true)?;
        self.noise.reset();
        if self.phase != Phase::Warmup {
            self.set_phase(Phase::Train);
        }

        let mut episode_return = 0.0;
        let mut last_stats = None;
        loop {
            let features = state.features();
            let action = self.explore(&features);
            let snapshot = env.step(&action)?;
            episode_return += snapshot.reward;
            let done = snapshot.done();

            let transition = Transition {
                state: features,
                action,
                reward: snapshot.reward,
                done,
                terminal: snapshot.terminated,
                next_state: snapshot.state.features(),
            };
            if let Some(stats) = self.observe(transition) {
                last_stats = Some(stats);
            }

            state = snapshot.state;
            if done {
                break;
            }
        }

        self.training_episodes += 1;
        if let Some(stats) = last_stats {
            debug!(
                "Episode {}: return {:.2}, critic loss {:.4}, actor loss {:.4}",
                self.training_episodes, episode_return, stats.critic_loss, stats.actor_loss
            );
        }
        Ok(episode_return)
    }

    /// Mean return of `episodes` noise-free episodes that the wrapper does not log.
    pub fn evaluate<E>(&mut self, env: &mut EvaluationEnv<E>, episodes: usize) -> anyhow::Result<ElemType>
    where
        E: Environment<ActionType = Vec<ElemType>>,
    {
        self.set_phase(Phase::Evaluate);
        let mut policy = self.networks.policy();
        let mut total = 0.0;
        for _ in 0..episodes {
            total += evaluate_episode(env, &mut policy, false, false)?;
        }
        Ok(total / episodes.max(1) as ElemType)
    }
}

fn action_bounds<E: Environment>(env: &EvaluationEnv<E>) -> anyhow::Result<ActionBounds> {
    match ActionBounds::from_space(&env.action_space()) {
        Some(bounds) => Ok(bounds),
        None => bail!(
            "DDPG needs a continuous action space, got {:?}",
            env.action_space()
        ),
    }
}

/// Trains on `env` for `max_episodes` episodes, then runs the final evaluation.
pub fn train<B, E>(
    env: E,
    config: &DdpgConfig,
    device: &B::Device,
) -> anyhow::Result<(TrainingReport, DeterministicPolicy<B::InnerBackend>)>
where
    B: AutodiffBackend,
    E: Environment<ActionType = Vec<ElemType>>,
{
    config.validate()?;
    B::seed(config.seed);
    let mut env = EvaluationEnv::new(
        env,
        Some(config.environment_seed()),
        config.render_each,
        config.evaluate_for,
        config.report_each,
    );
    let bounds = action_bounds(&env)?;
    let state_dim = env.observation_space().dim();
    info!(
        "Training DDPG: {state_dim} state features, {} action dimensions, {} episodes",
        bounds.dim(),
        config.max_episodes
    );

    let networks = init_networks::<B>(config, state_dim, bounds, device);
    let mut context = TrainingContext::new(networks, config);
    let mut evaluations = Vec::new();

    while context.training_episodes() < config.max_episodes {
        context.train_episode(&mut env)?;

        let episode = context.training_episodes();
        if config.evaluate_each > 0 && episode % config.evaluate_each == 0 {
            let mean = context.evaluate(&mut env, config.evaluate_for)?;
            info!("Evaluation after episode {episode}: {mean:.2}");
            evaluations.push((episode, mean));
        }
    }

    context.set_phase(Phase::Final);
    let mut policy = context.networks.policy();
    let summary = final_evaluation(&mut env, &mut policy)?;

    let report = TrainingReport {
        evaluations,
        summary,
        updates: context.updates(),
    };
    Ok((report, policy))
}

/// Skips training and runs the final evaluation of a saved actor.
pub fn evaluate_checkpoint<B, E>(
    env: E,
    config: &DdpgConfig,
    checkpoint: &Path,
    device: &B::Device,
) -> anyhow::Result<EvaluationSummary>
where
    B: Backend,
    E: Environment<ActionType = Vec<ElemType>>,
{
    B::seed(config.seed);
    let mut env = EvaluationEnv::new(
        env,
        Some(config.environment_seed()),
        config.render_each,
        config.evaluate_for,
        config.report_each,
    );
    let bounds = action_bounds(&env)?;
    let state_dim = env.observation_space().dim();
    let mut policy = DeterministicPolicy::<B>::load(
        checkpoint,
        state_dim,
        config.hidden_layer_size,
        bounds,
        device,
    )?;
    info!("Evaluating checkpoint {}", checkpoint.display());

    Ok(final_evaluation(&mut env, &mut policy)?)
}

/// Writes the resolved config and the actor record into `dir`.
pub fn save_artifacts<B: Backend>(
    policy: &DeterministicPolicy<B>,
    config: &DdpgConfig,
    dir: &Path,
) -> anyhow::Result<()> {
    let config_path = dir.join(CONFIG_FILE);
    config
        .save(&config_path)
        .with_context(|| format!("failed to save config to {}", config_path.display()))?;
    policy.save(&dir.join(ACTOR_FILE))?;
    info!("Saved actor and config to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};

    use super::*;
    use crate::burnrl::base::{EnvError, Info, Snapshot, Space};
    use crate::burnrl::environments::{MemoryGame, Pendulum};

    type TestBackend = Autodiff<NdArray>;

    fn small_config() -> DdpgConfig {
        DdpgConfig::new()
            .with_batch_size(8)
            .with_hidden_layer_size(16)
            .with_warmup_batches(2)
            .with_evaluate_each(2)
            .with_evaluate_for(2)
            .with_max_episodes(3)
            .with_report_each(0)
    }

    fn context(
        config: &DdpgConfig,
    ) -> TrainingContext<
        TestBackend,
        impl Optimizer<Actor<TestBackend>, TestBackend> + use<>,
        impl Optimizer<Critic<TestBackend>, TestBackend> + use<>,
    > {
        let device = Default::default();
        let bounds = ActionBounds::new(vec![-2.0], vec![2.0]);
        TrainingContext::new(init_networks::<TestBackend>(config, 3, bounds, &device), config)
    }

    fn transition(i: usize) -> Transition {
        Transition {
            state: vec![i as ElemType, 0.0, 1.0],
            action: vec![0.5],
            reward: -1.0,
            done: false,
            terminal: false,
            next_state: vec![i as ElemType + 1.0, 0.0, 1.0],
        }
    }

    #[test]
    fn stays_in_warmup_until_buffer_is_warm() {
        let config = small_config();
        let mut context = context(&config);

        for i in 0..config.warmup_size() - 1 {
            assert!(context.observe(transition(i)).is_none());
            assert_eq!(context.phase(), Phase::Warmup);
        }

        let stats = context.observe(transition(99));
        assert!(stats.is_some());
        assert_eq!(context.phase(), Phase::Train);
        assert_eq!(context.updates(), 1);
    }

    #[test]
    fn explored_actions_respect_bounds() {
        let config = small_config().with_noise_sigma(10.0);
        let mut context = context(&config);

        for _ in 0..50 {
            let action = context.explore(&[0.3, -0.2, 1.0]);
            assert_eq!(action.len(), 1);
            assert!((-2.0..=2.0).contains(&action[0]), "{action:?}");
        }
    }

    #[test]
    fn short_run_produces_report() {
        let config = small_config();
        let device = Default::default();

        let (report, policy) =
            train::<TestBackend, _>(Pendulum::with_max_steps(10), &config, &device).unwrap();

        assert_eq!(report.evaluations.len(), 1);
        assert_eq!(report.evaluations[0].0, 2);
        assert_eq!(report.summary.episodes, 2);
        assert!(report.updates > 0);
        assert_eq!(policy.state_dim(), 3);
    }

    #[test]
    fn discrete_action_space_is_rejected() {
        #[derive(Debug)]
        struct VecActions(MemoryGame);

        impl Environment for VecActions {
            type StateType = <MemoryGame as Environment>::StateType;
            type ActionType = Vec<ElemType>;

            fn observation_space(&self) -> Space {
                self.0.observation_space()
            }

            fn action_space(&self) -> Space {
                self.0.action_space()
            }

            fn seed(&mut self, seed: u64) {
                self.0.seed(seed);
            }

            fn state(&self) -> Self::StateType {
                self.0.state()
            }

            fn reset(&mut self) -> (Self::StateType, Info) {
                self.0.reset()
            }

            fn render(&self) -> String {
                self.0.render()
            }

            fn step(
                &mut self,
                action: &Self::ActionType,
            ) -> Result<Snapshot<Self>, EnvError> {
                let snapshot = self.0.step(&(action[0] as usize))?;
                Ok(Snapshot::new(
                    snapshot.state,
                    snapshot.reward,
                    snapshot.terminated,
                    snapshot.truncated,
                ))
            }
        }

        let device = Default::default();
        let result = train::<TestBackend, _>(VecActions(MemoryGame::new(4)), &small_config(), &device);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_config_fails_before_training() {
        let config = small_config()
            .with_warmup_batches(4)
            .with_replay_capacity(16);
        let device = Default::default();

        let result = train::<TestBackend, _>(Pendulum::with_max_steps(10), &config, &device);
        let message = format!("{:#}", result.err().unwrap());
        assert!(message.contains("replay capacity"), "{message}");
    }

    #[test]
    fn noise_and_replay_sampler_use_separate_streams() {
        use rand::Rng;

        let config = small_config();
        let mut context = context(&config);

        let mut expected_noise = OrnsteinUhlenbeckNoise::new(
            1,
            0.0,
            config.noise_theta,
            config.noise_sigma,
            config.noise_seed(),
        );
        assert_eq!(context.noise.sample(), expected_noise.sample());

        let drawn = context.rng.random::<u64>();
        assert_eq!(drawn, StdRng::seed_from_u64(config.replay_seed()).random::<u64>());
        assert_ne!(drawn, StdRng::seed_from_u64(config.noise_seed()).random::<u64>());
    }
}
