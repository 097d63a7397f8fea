pub mod memory_game;
pub mod mountain_car;
pub mod pendulum;

pub use memory_game::{MemoryGame, MemoryGameObservation};
pub use mountain_car::MountainCarContinuous;
pub use pendulum::Pendulum;
