use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::burnrl::base::{ElemType, EnvError, Snapshot, Space, State};

/// Auxiliary diagnostics returned next to observations.
pub type Info = BTreeMap<&'static str, ElemType>;

pub trait Environment: Debug {
    type StateType: State;
    type ActionType: Debug + Clone;

    fn observation_space(&self) -> Space;

    fn action_space(&self) -> Space;

    fn seed(&mut self, seed: u64);

    fn state(&self) -> Self::StateType;

    fn reset(&mut self) -> (Self::StateType, Info);

    fn render(&self) -> String;

    fn step(&mut self, action: &Self::ActionType) -> Result<Snapshot<Self>, EnvError>;
}
