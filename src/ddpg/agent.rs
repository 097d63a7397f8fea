use std::path::Path;

use anyhow::anyhow;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::CompactRecorder;
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;

use crate::burnrl::base::{Agent, ElemType, Environment, State};
use crate::ddpg::config::DdpgConfig;
use crate::ddpg::model::{ActionBounds, Actor, Critic};
use crate::ddpg::replay_buffer::Batch;
use crate::ddpg::target::SoftUpdate;
use crate::utils::{rows_to_tensor, tensor_to_rows};

/// Losses of a single update, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpdateStats {
    pub critic_loss: ElemType,
    pub actor_loss: ElemType,
}

/// Online and target actor/critic with their optimizers.
///
/// The targets live on the inner (non-autodiff) backend: they are only ever
/// moved by [`SoftUpdate`], never by gradients.
pub struct Networks<B: AutodiffBackend, AO, CO> {
    actor: Actor<B>,
    critic: Critic<B>,
    target_actor: Actor<B::InnerBackend>,
    target_critic: Critic<B::InnerBackend>,
    actor_optimizer: AO,
    critic_optimizer: CO,
    bounds: ActionBounds,
    state_dim: usize,
    hidden: usize,
    gamma: f32,
    tau: f32,
    learning_rate: f64,
    device: B::Device,
}

/// Builds fresh networks with Adam optimizers; targets start as exact copies.
pub fn init_networks<B: AutodiffBackend>(
    config: &DdpgConfig,
    state_dim: usize,
    bounds: ActionBounds,
    device: &B::Device,
) -> Networks<
    B,
    impl Optimizer<Actor<B>, B> + use<B>,
    impl Optimizer<Critic<B>, B> + use<B>,
> {
    let hidden = config.hidden_layer_size;
    let actor = Actor::<B>::new(state_dim, bounds.dim(), hidden, device);
    let critic = Critic::<B>::new(state_dim, bounds.dim(), hidden, device);

    Networks {
        target_actor: actor.valid(),
        target_critic: critic.valid(),
        actor,
        critic,
        actor_optimizer: AdamConfig::new().init::<B, Actor<B>>(),
        critic_optimizer: AdamConfig::new().init::<B, Critic<B>>(),
        bounds,
        state_dim,
        hidden,
        gamma: config.gamma,
        tau: config.target_tau,
        learning_rate: config.learning_rate,
        device: device.clone(),
    }
}

impl<B, AO, CO> Networks<B, AO, CO>
where
    B: AutodiffBackend,
    AO: Optimizer<Actor<B>, B>,
    CO: Optimizer<Critic<B>, B>,
{
    pub fn bounds(&self) -> &ActionBounds {
        &self.bounds
    }

    pub fn actor(&self) -> &Actor<B> {
        &self.actor
    }

    pub fn target_actor(&self) -> &Actor<B::InnerBackend> {
        &self.target_actor
    }

    pub fn critic(&self) -> &Critic<B> {
        &self.critic
    }

    pub fn target_critic(&self) -> &Critic<B::InnerBackend> {
        &self.target_critic
    }

    /// One DDPG step: critic regression, deterministic policy gradient, then
    /// Polyak averaging of both targets.
    pub fn train(&mut self, batch: &Batch) -> UpdateStats {
        let device = self.device.clone();
        let states = rows_to_tensor::<B>(&batch.states, batch.state_dim, &device);
        let actions = rows_to_tensor::<B>(&batch.actions, batch.action_dim, &device);

        let returns = {
            let rewards = rows_to_tensor::<B::InnerBackend>(&batch.rewards, 1, &device);
            let not_terminals = rows_to_tensor::<B::InnerBackend>(&batch.not_terminals, 1, &device);
            let next_states =
                rows_to_tensor::<B::InnerBackend>(&batch.next_states, batch.state_dim, &device);

            rewards + self.target_values(next_states) * not_terminals.mul_scalar(self.gamma)
        };
        let returns = Tensor::<B, 2>::from_inner(returns);

        let values = self.critic.forward(states.clone(), actions);
        let critic_loss = (values - returns).powf_scalar(2.0).mean();
        let critic_loss_value = critic_loss.clone().into_scalar().elem::<ElemType>();
        let grads = GradientsParams::from_grads(critic_loss.backward(), &self.critic);
        self.critic = self
            .critic_optimizer
            .step(self.learning_rate, self.critic.clone(), grads);

        let policy_actions = self.bounds.scale(self.actor.forward(states.clone()));
        let actor_loss = self.critic.forward(states, policy_actions).mean().neg();
        let actor_loss_value = actor_loss.clone().into_scalar().elem::<ElemType>();
        let grads = GradientsParams::from_grads(actor_loss.backward(), &self.actor);
        self.actor = self
            .actor_optimizer
            .step(self.learning_rate, self.actor.clone(), grads);

        self.update_targets();

        UpdateStats {
            critic_loss: critic_loss_value,
            actor_loss: actor_loss_value,
        }
    }

    pub fn update_targets(&mut self) {
        self.target_actor = self
            .target_actor
            .soft_update_from(&self.actor.valid(), self.tau);
        self.target_critic = self
            .target_critic
            .soft_update_from(&self.critic.valid(), self.tau);
    }

    fn target_values(&self, states: Tensor<B::InnerBackend, 2>) -> Tensor<B::InnerBackend, 2> {
        let actions = self.bounds.scale(self.target_actor.forward(states.clone()));
        self.target_critic.forward(states, actions)
    }

    /// Noise-free actions of the online actor for row-major `states`.
    pub fn predict_actions(&self, states: &[ElemType]) -> Vec<Vec<ElemType>> {
        self.policy().act(states)
    }

    /// Target critic evaluated at the target actor's actions.
    pub fn predict_values(&self, states: &[ElemType]) -> Vec<ElemType> {
        let states = rows_to_tensor::<B::InnerBackend>(states, self.state_dim, &self.device);
        tensor_to_rows(self.target_values(states)).concat()
    }

    /// Snapshot of the online actor for inference.
    pub fn policy(&self) -> DeterministicPolicy<B::InnerBackend> {
        DeterministicPolicy {
            actor: self.actor.valid(),
            bounds: self.bounds.clone(),
            state_dim: self.state_dim,
            hidden: self.hidden,
            device: self.device.clone(),
        }
    }
}

/// Deterministic actor on a plain backend, used for evaluation rollouts.
#[derive(Debug, Clone)]
pub struct DeterministicPolicy<B: Backend> {
    actor: Actor<B>,
    bounds: ActionBounds,
    state_dim: usize,
    hidden: usize,
    device: B::Device,
}

impl<B: Backend> DeterministicPolicy<B> {
    /// Restores an actor saved by [`DeterministicPolicy::save`].
    pub fn load(
        path: &Path,
        state_dim: usize,
        hidden: usize,
        bounds: ActionBounds,
        device: &B::Device,
    ) -> anyhow::Result<Self> {
        let actor = Actor::<B>::new(state_dim, bounds.dim(), hidden, device)
            .load_file(path.to_path_buf(), &CompactRecorder::new(), device)
            .map_err(|err| anyhow!("failed to load actor from {}: {err:?}", path.display()))?;

        Ok(Self {
            actor,
            bounds,
            state_dim,
            hidden,
            device: device.clone(),
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        self.actor
            .clone()
            .save_file(path.to_path_buf(), &CompactRecorder::new())
            .map_err(|err| anyhow!("failed to save actor to {}: {err:?}", path.display()))
    }

    pub fn bounds(&self) -> &ActionBounds {
        &self.bounds
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    pub fn act(&self, states: &[ElemType]) -> Vec<Vec<ElemType>> {
        let states = rows_to_tensor::<B>(states, self.state_dim, &self.device);
        tensor_to_rows(self.bounds.scale(self.actor.forward(states)))
    }
}

impl<B, E> Agent<E> for DeterministicPolicy<B>
where
    B: Backend,
    E: Environment<ActionType = Vec<ElemType>>,
{
    fn react(&mut self, state: &E::StateType) -> Vec<ElemType> {
        let mut action = self
            .act(&state.features())
            .into_iter()
            .next()
            .unwrap_or_default();
        self.bounds.clip(&mut action);
        action
    }
}
