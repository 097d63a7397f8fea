use std::path::Path;

use anyhow::{Context, anyhow};
use burn::config::Config;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::CompactRecorder;
use burn::tensor::ElementConversion;
use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::AutodiffBackend;
use log::{debug, info};

use crate::burnrl::base::{
    Agent, ElemType, EvaluationEnv, EvaluationSummary, evaluate_episode, final_evaluation,
};
use crate::burnrl::environments::{MemoryGame, MemoryGameObservation};
use crate::memory_game::config::MemoryGameConfig;
use crate::memory_game::model::{MemoryAgent, encode, zero_memory};
use crate::utils::{argmax, tensor_to_rows};

pub const CONFIG_FILE: &str = "config.json";
pub const AGENT_FILE: &str = "memory_agent";

pub type ExpertEpisode = Vec<(MemoryGameObservation, usize)>;

/// Sizes shared by the learner and the greedy policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dims {
    cards: usize,
    cells: usize,
    cell_size: usize,
}

impl Dims {
    fn new(config: &MemoryGameConfig) -> Self {
        Self {
            cards: config.cards,
            cells: config.memory_cells(),
            cell_size: config.memory_cell_size(),
        }
    }
}

/// Behavioural cloning of the expert with a memory agent.
pub struct MemoryGameLearner<B: AutodiffBackend, O> {
    agent: MemoryAgent<B>,
    optimizer: O,
    dims: Dims,
    learning_rate: f64,
    device: B::Device,
}

pub fn init_learner<B: AutodiffBackend>(
    config: &MemoryGameConfig,
    device: &B::Device,
) -> MemoryGameLearner<B, impl Optimizer<MemoryAgent<B>, B> + use<B>> {
    let dims = Dims::new(config);
    MemoryGameLearner {
        agent: MemoryAgent::new(dims.cell_size, config.hidden_layer(), dims.cards + 1, device),
        optimizer: AdamConfig::new().init::<B, MemoryAgent<B>>(),
        dims,
        learning_rate: config.learning_rate,
        device: device.clone(),
    }
}

impl<B, O> MemoryGameLearner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<MemoryAgent<B>, B>,
{
    /// Masked negative log-likelihood of the expert actions over a batch of
    /// episodes, before the update.
    pub fn loss(&self, episodes: &[ExpertEpisode]) -> ElemType {
        self.nll(&self.agent.valid(), episodes)
            .into_scalar()
            .elem::<ElemType>()
    }

    /// One Adam step on a batch of expert episodes; returns the loss.
    pub fn train_batch(&mut self, episodes: &[ExpertEpisode]) -> ElemType {
        let loss = self.nll(&self.agent, episodes);
        let loss_value = loss.clone().into_scalar().elem::<ElemType>();

        let grads = GradientsParams::from_grads(loss.backward(), &self.agent);
        self.agent = self
            .optimizer
            .step(self.learning_rate, self.agent.clone(), grads);

        loss_value
    }

    /// Unrolls `agent` over episodes padded to the longest one.
    fn nll<K: Backend<Device = B::Device>>(
        &self,
        agent: &MemoryAgent<K>,
        episodes: &[ExpertEpisode],
    ) -> Tensor<K, 1> {
        let batch = episodes.len();
        let steps = episodes.iter().map(Vec::len).max().unwrap_or(0);
        let padding = MemoryGameObservation { card: 0, symbol: 0 };

        let mut memory = zero_memory::<K>(batch, self.dims.cells, self.dims.cell_size, &self.device);
        let mut total = Tensor::<K, 1>::zeros([1], &self.device);
        let mut valid_steps = 0;

        for t in 0..steps {
            let mut observations = Vec::with_capacity(batch);
            let mut targets = Vec::with_capacity(batch);
            let mut mask = Vec::with_capacity(batch);
            for episode in episodes {
                match episode.get(t) {
                    Some((observation, action)) => {
                        observations.push(*observation);
                        targets.push(*action as i64);
                        mask.push(1.0 as ElemType);
                        valid_steps += 1;
                    }
                    None => {
                        observations.push(padding);
                        targets.push(0);
                        mask.push(0.0);
                    }
                }
            }

            let encoded = encode::<K>(&observations, self.dims.cards, &self.device);
            let (next_memory, logits) = agent.forward(memory, encoded);
            memory = next_memory;

            let targets = Tensor::<K, 2, Int>::from_data(TensorData::new(targets, [batch, 1]), &self.device);
            let mask = Tensor::<K, 1>::from_floats(mask.as_slice(), &self.device).reshape([batch, 1]);
            let log_probs = log_softmax(logits, 1).gather(1, targets);
            total = total - (log_probs * mask).sum();
        }

        total.div_scalar(valid_steps.max(1) as ElemType)
    }

    pub fn policy(&self) -> MemoryGamePolicy<B::InnerBackend> {
        MemoryGamePolicy::new(self.agent.valid(), self.dims, self.device.clone())
    }
}

/// Greedy policy that threads its memory through an episode.
#[derive(Debug, Clone)]
pub struct MemoryGamePolicy<B: Backend> {
    agent: MemoryAgent<B>,
    memory: Tensor<B, 3>,
    dims: Dims,
    device: B::Device,
}

impl<B: Backend> MemoryGamePolicy<B> {
    fn new(agent: MemoryAgent<B>, dims: Dims, device: B::Device) -> Self {
        Self {
            memory: zero_memory(1, dims.cells, dims.cell_size, &device),
            agent,
            dims,
            device,
        }
    }

    /// Restores an agent saved by [`MemoryGamePolicy::save`].
    pub fn load(path: &Path, config: &MemoryGameConfig, device: &B::Device) -> anyhow::Result<Self> {
        let dims = Dims::new(config);
        let agent = MemoryAgent::<B>::new(dims.cell_size, config.hidden_layer(), dims.cards + 1, device)
            .load_file(path.to_path_buf(), &CompactRecorder::new(), device)
            .map_err(|err| anyhow!("failed to load memory agent from {}: {err:?}", path.display()))?;
        Ok(Self::new(agent, dims, device.clone()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        self.agent
            .clone()
            .save_file(path.to_path_buf(), &CompactRecorder::new())
            .map_err(|err| anyhow!("failed to save memory agent to {}: {err:?}", path.display()))
    }

    /// Action probabilities for `observation`, advancing the memory.
    pub fn step(&mut self, observation: &MemoryGameObservation) -> Vec<ElemType> {
        let encoded = encode::<B>(&[*observation], self.dims.cards, &self.device);
        let (memory, logits) = self.agent.forward(self.memory.clone(), encoded);
        self.memory = memory;

        let probs = softmax(logits, 1);
        tensor_to_rows(probs).into_iter().next().unwrap_or_default()
    }

    pub fn memory(&self) -> &Tensor<B, 3> {
        &self.memory
    }
}

impl<B: Backend> Agent<MemoryGame> for MemoryGamePolicy<B> {
    fn begin_episode(&mut self) {
        self.memory = zero_memory(1, self.dims.cells, self.dims.cell_size, &self.device);
    }

    fn react(&mut self, state: &MemoryGameObservation) -> usize {
        argmax(&self.step(state))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryGameReport {
    /// Loss of every training batch.
    pub losses: Vec<ElemType>,
    /// `(expert episodes so far, mean evaluation return)` per evaluation.
    pub evaluations: Vec<(usize, ElemType)>,
    pub summary: EvaluationSummary,
}

/// Clones the expert for `max_episodes` episodes, then runs the final evaluation.
pub fn train<B: AutodiffBackend>(
    config: &MemoryGameConfig,
    device: &B::Device,
) -> anyhow::Result<(MemoryGameReport, MemoryGamePolicy<B::InnerBackend>)> {
    config.validate()?;
    B::seed(config.seed);

    let mut env = EvaluationEnv::new(
        MemoryGame::new(config.cards),
        Some(config.seed),
        config.render_each,
        config.evaluate_for,
        config.evaluate_for,
    );
    let mut learner = init_learner::<B>(config, device);
    info!(
        "Training memory agent: {} cards, {} memory cells, hidden layer {}",
        config.cards,
        config.memory_cells(),
        config.hidden_layer()
    );

    let mut expert_episodes = 0;
    let mut losses = Vec::new();
    let mut evaluations = Vec::new();

    while expert_episodes < config.max_episodes {
        for _ in 0..config.batches_per_evaluation() {
            let episodes: Vec<ExpertEpisode> = (0..config.batch_size)
                .map(|_| env.inner_mut().expert_episode())
                .collect();
            let loss = learner.train_batch(&episodes);
            expert_episodes += episodes.len();
            debug!("Expert episodes {expert_episodes}: loss {loss:.4}");
            losses.push(loss);
        }

        let mut policy = learner.policy();
        let mut total = 0.0;
        for _ in 0..config.evaluate_for {
            total += evaluate_episode(&mut env, &mut policy, false, true)?;
        }
        let mean = total / config.evaluate_for.max(1) as ElemType;
        info!("Evaluation after {expert_episodes} expert episodes: {mean:.2}");
        evaluations.push((expert_episodes, mean));
    }

    let mut policy = learner.policy();
    let summary = final_evaluation(&mut env, &mut policy)?;

    let report = MemoryGameReport {
        losses,
        evaluations,
        summary,
    };
    Ok((report, policy))
}

/// Skips training and runs the final evaluation of a saved agent.
pub fn evaluate_checkpoint<B: Backend>(
    config: &MemoryGameConfig,
    checkpoint: &Path,
    device: &B::Device,
) -> anyhow::Result<EvaluationSummary> {
    config.validate()?;
    B::seed(config.seed);

    let mut env = EvaluationEnv::new(
        MemoryGame::new(config.cards),
        Some(config.seed),
        config.render_each,
        config.evaluate_for,
        config.evaluate_for,
    );
    let mut policy = MemoryGamePolicy::<B>::load(checkpoint, config, device)?;
    info!("Evaluating checkpoint {}", checkpoint.display());

    Ok(final_evaluation(&mut env, &mut policy)?)
}

/// Writes the resolved config and the agent record into `dir`.
pub fn save_artifacts<B: Backend>(
    policy: &MemoryGamePolicy<B>,
    config: &MemoryGameConfig,
    dir: &Path,
) -> anyhow::Result<()> {
    let config_path = dir.join(CONFIG_FILE);
    config
        .save(&config_path)
        .with_context(|| format!("failed to save config to {}", config_path.display()))?;
    policy.save(&dir.join(AGENT_FILE))?;
    info!("Saved memory agent and config to {}", dir.display());
    Ok(())
}
