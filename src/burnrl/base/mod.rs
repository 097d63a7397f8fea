pub mod agent;
pub mod environment;
pub mod evaluation;
mod snapshot;
mod space;
mod state;

pub use agent::Agent;
pub use environment::{Environment, Info};
pub use evaluation::{
    EnvError, EvaluationEnv, EvaluationSummary, evaluate_episode, final_evaluation,
};
pub use snapshot::Snapshot;
pub use space::Space;
pub use state::State;

pub type ElemType = f32;
