use burn::backend::{Autodiff, NdArray};

use ballistic_ddpg::burnrl::environments::Pendulum;
use ballistic_ddpg::ddpg::{self, DdpgConfig};

// Lives in its own test binary: the NdArray seed is process-wide.
#[test]
fn same_seed_same_run() {
    let device = Default::default();
    let config = DdpgConfig::new()
        .with_batch_size(8)
        .with_hidden_layer_size(16)
        .with_warmup_batches(1)
        .with_evaluate_each(1)
        .with_evaluate_for(2)
        .with_report_each(0)
        .with_max_episodes(3)
        .with_seed(7);

    let run = || {
        ddpg::train::<Autodiff<NdArray>, _>(Pendulum::with_max_steps(15), &config, &device).unwrap()
    };
    let (first, first_policy) = run();
    let (second, second_policy) = run();

    assert_eq!(first, second);
    let state = [0.1, 0.9, -3.0];
    assert_eq!(first_policy.act(&state), second_policy.act(&state));
}
