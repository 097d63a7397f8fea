//! Episode bookkeeping around an [`Environment`].
//!
//! [`EvaluationEnv`] counts logged episodes, reports the running mean return
//! every `report_each` episodes, renders every `render_each`-th episode and,
//! once evaluation has been started, finishes after `evaluate_for` evaluation
//! episodes with an [`EvaluationSummary`].

use std::fmt;

use log::info;
use rand::Rng;

use crate::burnrl::base::{Agent, ElemType, Environment, Info, Snapshot, Space};
use crate::utils::mean_std;

/// Errors raised by environments and the evaluation wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvError {
    EpisodeRunning,
    NoActiveEpisode,
    EvaluationFinished,
    InvalidAction { expected: String, got: String },
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvError::EpisodeRunning => write!(f, "cannot reset a running episode"),
            EnvError::NoActiveEpisode => {
                write!(f, "cannot step an environment without an active episode, reset it first")
            }
            EnvError::EvaluationFinished => {
                write!(f, "the final evaluation has already finished")
            }
            EnvError::InvalidAction { expected, got } => {
                write!(f, "invalid action: expected {expected}, got {got}")
            }
        }
    }
}

impl std::error::Error for EnvError {}

/// Mean and standard deviation of the final evaluation episodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationSummary {
    pub episodes: usize,
    pub mean: ElemType,
    pub std: ElemType,
}

#[derive(Debug)]
pub struct EvaluationEnv<E: Environment> {
    env: E,
    render_each: usize,
    evaluate_for: usize,
    report_each: usize,
    episode_running: bool,
    episode_return: Option<ElemType>,
    episode_returns: Vec<ElemType>,
    evaluating_from: Option<usize>,
    rendering: bool,
    summary: Option<EvaluationSummary>,
}

impl<E: Environment> EvaluationEnv<E> {
    /// Wraps `env`, seeding it once with `seed` (or a random seed).
    pub fn new(
        mut env: E,
        seed: Option<u64>,
        render_each: usize,
        evaluate_for: usize,
        report_each: usize,
    ) -> Self {
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        env.seed(seed);

        Self {
            env,
            render_each,
            evaluate_for: evaluate_for.max(1),
            report_each,
            episode_running: false,
            episode_return: None,
            episode_returns: Vec::new(),
            evaluating_from: None,
            rendering: false,
            summary: None,
        }
    }

    /// Number of finished episodes whose return was recorded.
    pub fn episode(&self) -> usize {
        self.episode_returns.len()
    }

    pub fn episode_returns(&self) -> &[ElemType] {
        &self.episode_returns
    }

    pub fn is_evaluating(&self) -> bool {
        self.evaluating_from.is_some()
    }

    pub fn evaluation_finished(&self) -> bool {
        self.summary.is_some()
    }

    pub fn summary(&self) -> Option<EvaluationSummary> {
        self.summary
    }

    pub fn observation_space(&self) -> Space {
        self.env.observation_space()
    }

    pub fn action_space(&self) -> Space {
        self.env.action_space()
    }

    pub fn inner(&self) -> &E {
        &self.env
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Starts a new episode.
    ///
    /// Returns of episodes started with `logging == false` are not recorded,
    /// unless evaluation is in progress. `start_evaluation` switches the
    /// wrapper into evaluation mode permanently.
    pub fn reset(
        &mut self,
        start_evaluation: bool,
        logging: bool,
    ) -> Result<(E::StateType, Info), EnvError> {
        if self.summary.is_some() {
            return Err(EnvError::EvaluationFinished);
        }
        if self.episode_running {
            return Err(EnvError::EpisodeRunning);
        }
        if start_evaluation && self.evaluating_from.is_none() {
            self.evaluating_from = Some(self.episode());
        }

        self.rendering = self.render_each > 0 && (self.episode() + 1) % self.render_each == 0;
        self.episode_running = true;
        self.episode_return = if logging || self.evaluating_from.is_some() {
            Some(0.0)
        } else {
            None
        };

        let (state, info) = self.env.reset();
        if self.rendering {
            info!(target: "render", "{}", self.env.render());
        }
        Ok((state, info))
    }

    pub fn step(&mut self, action: &E::ActionType) -> Result<Snapshot<E>, EnvError> {
        if !self.episode_running {
            return Err(EnvError::NoActiveEpisode);
        }

        let snapshot = self.env.step(action)?;
        if self.rendering {
            info!(target: "render", "{}", self.env.render());
        }

        let done = snapshot.done();
        self.episode_running = !done;
        if let Some(episode_return) = self.episode_return.as_mut() {
            *episode_return += snapshot.reward;
        }
        if done {
            if let Some(episode_return) = self.episode_return.take() {
                self.finish_episode(episode_return);
            }
        }

        Ok(snapshot)
    }

    fn finish_episode(&mut self, episode_return: ElemType) {
        self.episode_returns.push(episode_return);
        let episode = self.episode();

        if self.report_each > 0 && episode % self.report_each == 0 {
            let start = episode.saturating_sub(self.evaluate_for);
            let (mean, std) = mean_std(&self.episode_returns[start..]);
            info!(
                "Episode {episode}, mean {}-episode return {mean:.2} +-{std:.2}",
                self.evaluate_for
            );
        }

        if let Some(from) = self.evaluating_from {
            if episode >= from + self.evaluate_for {
                let (mean, std) = mean_std(&self.episode_returns[from..]);
                info!(
                    "The mean {}-episode return after evaluation {mean:.2} +-{std:.2}",
                    self.evaluate_for
                );
                self.summary = Some(EvaluationSummary {
                    episodes: episode - from,
                    mean,
                    std,
                });
            }
        }
    }
}

/// Plays one episode with `agent` and returns its undiscounted return.
pub fn evaluate_episode<E, A>(
    env: &mut EvaluationEnv<E>,
    agent: &mut A,
    start_evaluation: bool,
    logging: bool,
) -> Result<ElemType, EnvError>
where
    E: Environment,
    A: Agent<E>,
{
    let (mut state, _) = env.reset(start_evaluation, logging)?;
    agent.begin_episode();

    let mut rewards = 0.0;
    loop {
        let action = agent.react(&state);
        let snapshot = env.step(&action)?;
        rewards += snapshot.reward;
        let done = snapshot.done();
        state = snapshot.state;
        if done {
            return Ok(rewards);
        }
    }
}

/// Runs evaluation episodes until the wrapper has a summary.
pub fn final_evaluation<E, A>(
    env: &mut EvaluationEnv<E>,
    agent: &mut A,
) -> Result<EvaluationSummary, EnvError>
where
    E: Environment,
    A: Agent<E>,
{
    loop {
        if let Some(summary) = env.summary() {
            return Ok(summary);
        }
        evaluate_episode(env, agent, true, true)?;
    }
}
