pub mod agent;
pub mod config;
pub mod model;
pub mod noise;
pub mod replay_buffer;
pub mod target;
pub mod training;

pub use agent::{DeterministicPolicy, Networks, UpdateStats, init_networks};
pub use config::DdpgConfig;
pub use model::{ActionBounds, Actor, Critic};
pub use noise::OrnsteinUhlenbeckNoise;
pub use replay_buffer::{Batch, ReplayBuffer, Transition};
pub use target::SoftUpdate;
pub use training::{Phase, TrainingContext, TrainingReport, evaluate_checkpoint, save_artifacts, train};
