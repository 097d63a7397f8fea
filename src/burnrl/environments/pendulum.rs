use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::burnrl::base::{ElemType, EnvError, Environment, Info, Snapshot, Space};

const MAX_SPEED: ElemType = 8.0;
const MAX_TORQUE: ElemType = 2.0;
const DT: ElemType = 0.05;
const GRAVITY: ElemType = 10.0;
const MASS: ElemType = 1.0;
const LENGTH: ElemType = 1.0;

/// Inverted pendulum swing-up (Pendulum-v1 dynamics).
///
/// Observation is `[cos θ, sin θ, θ̇]`, the action a single torque in
/// `[-2, 2]`. Episodes never terminate and are truncated after
/// `max_steps` steps.
#[derive(Debug)]
pub struct Pendulum {
    theta: ElemType,
    theta_dot: ElemType,
    last_torque: ElemType,
    step_count: usize,
    max_steps: usize,
    rng: StdRng,
}

impl Pendulum {
    pub const MAX_STEPS: usize = 200;

    pub fn new() -> Self {
        Self::with_max_steps(Self::MAX_STEPS)
    }

    pub fn with_max_steps(max_steps: usize) -> Self {
        Self {
            theta: 0.0,
            theta_dot: 0.0,
            last_torque: 0.0,
            step_count: 0,
            max_steps,
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Self::new()
    }
}

fn angle_normalize(x: ElemType) -> ElemType {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Environment for Pendulum {
    type StateType = [ElemType; 3];
    type ActionType = Vec<ElemType>;

    fn observation_space(&self) -> Space {
        Space::bounded(vec![-1.0, -1.0, -MAX_SPEED], vec![1.0, 1.0, MAX_SPEED])
    }

    fn action_space(&self) -> Space {
        Space::bounded(vec![-MAX_TORQUE], vec![MAX_TORQUE])
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn state(&self) -> Self::StateType {
        [self.theta.cos(), self.theta.sin(), self.theta_dot]
    }

    fn reset(&mut self) -> (Self::StateType, Info) {
        self.theta = self.rng.random_range(-PI..PI);
        self.theta_dot = self.rng.random_range(-1.0..1.0);
        self.last_torque = 0.0;
        self.step_count = 0;
        (self.state(), Info::new())
    }

    fn render(&self) -> String {
        format!(
            "pendulum step={} theta={:+.3} theta_dot={:+.3} torque={:+.3}",
            self.step_count,
            angle_normalize(self.theta),
            self.theta_dot,
            self.last_torque
        )
    }

    fn step(&mut self, action: &Self::ActionType) -> Result<Snapshot<Self>, EnvError> {
        let [torque] = action.as_slice() else {
            return Err(EnvError::InvalidAction {
                expected: "1 torque value".to_string(),
                got: format!("{} values", action.len()),
            });
        };
        let u = torque.clamp(-MAX_TORQUE, MAX_TORQUE);

        let th = self.theta;
        let thdot = self.theta_dot;
        let cost = angle_normalize(th).powi(2) + 0.1 * thdot.powi(2) + 0.001 * u.powi(2);

        let new_thdot = (thdot
            + (3.0 * GRAVITY / (2.0 * LENGTH) * th.sin() + 3.0 / (MASS * LENGTH * LENGTH) * u)
                * DT)
            .clamp(-MAX_SPEED, MAX_SPEED);
        self.theta = th + new_thdot * DT;
        self.theta_dot = new_thdot;
        self.last_torque = u;
        self.step_count += 1;

        let truncated = self.step_count >= self.max_steps;
        Ok(Snapshot::new(self.state(), -cost, false, truncated))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn reset_is_deterministic_for_a_seed() {
        let mut a = Pendulum::new();
        let mut b = Pendulum::new();
        a.seed(3);
        b.seed(3);
        assert_eq!(a.reset().0, b.reset().0);
    }

    #[test]
    fn upright_and_still_costs_nothing() {
        let mut env = Pendulum::new();
        env.reset();
        env.theta = 0.0;
        env.theta_dot = 0.0;

        let snapshot = env.step(&vec![0.0]).unwrap();
        assert_relative_eq!(snapshot.reward, 0.0);
        assert_eq!(snapshot.state, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn torque_is_clipped_before_cost() {
        let mut env = Pendulum::new();
        env.reset();
        env.theta = 0.0;
        env.theta_dot = 0.0;

        let snapshot = env.step(&vec![10.0]).unwrap();
        assert_relative_eq!(snapshot.reward, -0.001 * 4.0);
        assert_relative_eq!(snapshot.state[2], 3.0 * 2.0 * DT);
    }

    #[test]
    fn truncates_after_max_steps() {
        let mut env = Pendulum::with_max_steps(2);
        env.reset();
        assert!(!env.step(&vec![0.0]).unwrap().done());
        let last = env.step(&vec![0.0]).unwrap();
        assert!(last.truncated && !last.terminated);
    }

    #[test]
    fn rejects_wrong_action_length() {
        let mut env = Pendulum::new();
        env.reset();
        assert!(matches!(
            env.step(&vec![0.0, 1.0]),
            Err(EnvError::InvalidAction { .. })
        ));
    }
}
