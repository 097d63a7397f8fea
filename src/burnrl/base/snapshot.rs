use crate::burnrl::base::{ElemType, Environment, Info};

/// Result of a single environment step.
#[derive(Debug)]
pub struct Snapshot<E: Environment + ?Sized> {
    pub state: E::StateType,
    pub reward: ElemType,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

impl<E: Environment + ?Sized> Snapshot<E> {
    pub fn new(state: E::StateType, reward: ElemType, terminated: bool, truncated: bool) -> Self {
        Self {
            state,
            reward,
            terminated,
            truncated,
            info: Info::new(),
        }
    }

    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}
