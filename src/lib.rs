pub mod burnrl;
pub mod ddpg;
pub mod memory_game;
pub mod utils;
