use crate::burnrl::base::environment::Environment;

pub trait Agent<E: Environment> {
    /// Called before the first `react` of every episode.
    fn begin_episode(&mut self) {}

    fn react(&mut self, state: &E::StateType) -> E::ActionType;
}
