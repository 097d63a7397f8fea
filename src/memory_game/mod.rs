pub mod config;
pub mod model;
pub mod training;

pub use config::MemoryGameConfig;
pub use model::MemoryAgent;
pub use training::{
    ExpertEpisode, MemoryGameLearner, MemoryGamePolicy, MemoryGameReport, evaluate_checkpoint,
    init_learner, save_artifacts, train,
};
