use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::burnrl::base::{ElemType, EnvError, Environment, Info, Snapshot, Space};

const MIN_POSITION: ElemType = -1.2;
const MAX_POSITION: ElemType = 0.6;
const MAX_SPEED: ElemType = 0.07;
const GOAL_POSITION: ElemType = 0.45;
const POWER: ElemType = 0.0015;

/// Under-powered car in a valley (MountainCarContinuous-v0 dynamics).
#[derive(Debug)]
pub struct MountainCarContinuous {
    position: ElemType,
    velocity: ElemType,
    step_count: usize,
    max_steps: usize,
    rng: StdRng,
}

impl MountainCarContinuous {
    pub const MAX_STEPS: usize = 999;

    pub fn new() -> Self {
        Self::with_max_steps(Self::MAX_STEPS)
    }

    pub fn with_max_steps(max_steps: usize) -> Self {
        Self {
            position: -0.5,
            velocity: 0.0,
            step_count: 0,
            max_steps,
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for MountainCarContinuous {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for MountainCarContinuous {
    type StateType = [ElemType; 2];
    type ActionType = Vec<ElemType>;

    fn observation_space(&self) -> Space {
        Space::bounded(vec![MIN_POSITION, -MAX_SPEED], vec![MAX_POSITION, MAX_SPEED])
    }

    fn action_space(&self) -> Space {
        Space::bounded(vec![-1.0], vec![1.0])
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn state(&self) -> Self::StateType {
        [self.position, self.velocity]
    }

    fn reset(&mut self) -> (Self::StateType, Info) {
        self.position = self.rng.random_range(-0.6..-0.4);
        self.velocity = 0.0;
        self.step_count = 0;
        (self.state(), Info::new())
    }

    fn render(&self) -> String {
        let width = 40;
        let column = ((self.position - MIN_POSITION) / (MAX_POSITION - MIN_POSITION)
            * (width - 1) as ElemType)
            .round() as usize;
        let goal = ((GOAL_POSITION - MIN_POSITION) / (MAX_POSITION - MIN_POSITION)
            * (width - 1) as ElemType)
            .round() as usize;

        (0..width)
            .map(|i| match i {
                i if i == column => 'o',
                i if i == goal => '|',
                _ => '_',
            })
            .collect()
    }

    fn step(&mut self, action: &Self::ActionType) -> Result<Snapshot<Self>, EnvError> {
        let [force] = action.as_slice() else {
            return Err(EnvError::InvalidAction {
                expected: "1 force value".to_string(),
                got: format!("{} values", action.len()),
            });
        };
        let force = force.clamp(-1.0, 1.0);

        self.velocity = (self.velocity + force * POWER - 0.0025 * (3.0 * self.position).cos())
            .clamp(-MAX_SPEED, MAX_SPEED);
        self.position = (self.position + self.velocity).clamp(MIN_POSITION, MAX_POSITION);
        if self.position == MIN_POSITION && self.velocity < 0.0 {
            self.velocity = 0.0;
        }
        self.step_count += 1;

        let terminated = self.position >= GOAL_POSITION && self.velocity >= 0.0;
        let mut reward = -0.1 * force * force;
        if terminated {
            reward += 100.0;
        }
        let truncated = !terminated && self.step_count >= self.max_steps;

        Ok(Snapshot::new(self.state(), reward, terminated, truncated))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn reaching_the_goal_terminates_with_bonus() {
        let mut env = MountainCarContinuous::new();
        env.reset();
        env.position = 0.44;
        env.velocity = 0.07;

        let snapshot = env.step(&vec![1.0]).unwrap();
        assert!(snapshot.terminated);
        assert_relative_eq!(snapshot.reward, 100.0 - 0.1);
    }

    #[test]
    fn left_wall_stops_the_car() {
        let mut env = MountainCarContinuous::new();
        env.reset();
        env.position = MIN_POSITION;
        env.velocity = -0.07;

        let snapshot = env.step(&vec![-1.0]).unwrap();
        assert_eq!(snapshot.state, [MIN_POSITION, 0.0]);
        assert!(!snapshot.done());
    }
}
