pub mod base;
pub mod environments;
