//! Shared T-maze fixture for integration tests.
//!
//! Layout: four locations (center, left arm, right arm, cue) over one
//! controllable location factor, plus an uncontrollable reward-condition
//! factor (reward-left / reward-right). Three modalities: location
//! (exact), reward (null / reward / punish), and cue (reveals the
//! condition, but only at the cue location).

#![allow(dead_code)]

use ndarray::{arr1, Array1, Array3, ArrayD, IxDyn};

use aif_core::env::Environment;
use aif_core::model::{GenerativeModel, ModelDimensions, NormalizationPolicy};

pub const LOC_CENTER: usize = 0;
pub const LOC_LEFT: usize = 1;
pub const LOC_RIGHT: usize = 2;
pub const LOC_CUE: usize = 3;

pub const COND_REWARD_LEFT: usize = 0;
pub const COND_REWARD_RIGHT: usize = 1;

pub const OBS_NULL: usize = 0;
pub const OBS_REWARD: usize = 1;
pub const OBS_PUNISH: usize = 2;

/// Probability that the matching arm actually pays out.
pub const REWARD_PROB: f64 = 0.7;

pub fn tmaze_dims() -> ModelDimensions {
    ModelDimensions::new(vec![4, 3, 2], vec![4, 2], vec![4, 1]).unwrap()
}

/// Build the T-maze generative model with preferences `C[reward] = [0, +3, -3]`
/// and the starting belief concentrated at the center location.
pub fn tmaze_model() -> GenerativeModel {
    let dims = tmaze_dims();

    // Location modality: exact readout of the location factor.
    let mut a_loc = ArrayD::zeros(IxDyn(&[4, 4, 2]));
    for loc in 0..4 {
        for cond in 0..2 {
            a_loc[[loc, loc, cond]] = 1.0;
        }
    }

    // Reward modality: null away from the arms; noisy payout at the arms.
    let mut a_rew = ArrayD::zeros(IxDyn(&[3, 4, 2]));
    for cond in 0..2 {
        a_rew[[OBS_NULL, LOC_CENTER, cond]] = 1.0;
        a_rew[[OBS_NULL, LOC_CUE, cond]] = 1.0;
    }
    for (arm, matching) in [(LOC_LEFT, COND_REWARD_LEFT), (LOC_RIGHT, COND_REWARD_RIGHT)] {
        for cond in 0..2 {
            let p_reward = if cond == matching {
                REWARD_PROB
            } else {
                1.0 - REWARD_PROB
            };
            a_rew[[OBS_REWARD, arm, cond]] = p_reward;
            a_rew[[OBS_PUNISH, arm, cond]] = 1.0 - p_reward;
        }
    }

    // Cue modality: reveals the condition at the cue location only.
    let mut a_cue = ArrayD::zeros(IxDyn(&[2, 4, 2]));
    for loc in 0..4 {
        for cond in 0..2 {
            if loc == LOC_CUE {
                a_cue[[cond, loc, cond]] = 1.0;
            } else {
                a_cue[[0, loc, cond]] = 0.5;
                a_cue[[1, loc, cond]] = 0.5;
            }
        }
    }

    // Location transitions: move-to-target from anywhere.
    let mut b_loc = Array3::zeros((4, 4, 4));
    for u in 0..4 {
        for prev in 0..4 {
            b_loc[(u, prev, u)] = 1.0;
        }
    }
    // The reward condition never changes within an episode.
    let mut b_cond = Array3::zeros((2, 2, 1));
    b_cond[(0, 0, 0)] = 1.0;
    b_cond[(1, 1, 0)] = 1.0;

    let c = vec![
        Array1::zeros(4),
        arr1(&[0.0, 3.0, -3.0]),
        Array1::zeros(2),
    ];
    let d = vec![arr1(&[1.0, 0.0, 0.0, 0.0]), arr1(&[0.5, 0.5])];

    GenerativeModel::new(
        dims,
        vec![a_loc, a_rew, a_cue],
        vec![b_loc, b_cond],
        Some(c),
        Some(d),
        NormalizationPolicy::Strict,
    )
    .unwrap()
}

/// Deterministic scripted T-maze: the matching arm always pays out, and the
/// cue always reveals the true condition.
pub struct TMaze {
    condition: usize,
    location: usize,
}

impl TMaze {
    pub fn new(condition: usize) -> Self {
        Self {
            condition,
            location: LOC_CENTER,
        }
    }

    fn observe(&self) -> Vec<usize> {
        let reward = match self.location {
            LOC_LEFT => {
                if self.condition == COND_REWARD_LEFT {
                    OBS_REWARD
                } else {
                    OBS_PUNISH
                }
            }
            LOC_RIGHT => {
                if self.condition == COND_REWARD_RIGHT {
                    OBS_REWARD
                } else {
                    OBS_PUNISH
                }
            }
            _ => OBS_NULL,
        };
        let cue = if self.location == LOC_CUE {
            self.condition
        } else {
            0
        };
        vec![self.location, reward, cue]
    }
}

impl Environment for TMaze {
    fn reset(&mut self) -> Vec<usize> {
        self.location = LOC_CENTER;
        self.observe()
    }

    fn step(&mut self, action: &[usize]) -> Vec<usize> {
        self.location = action[0];
        self.observe()
    }
}

/// Initialize test logging once; later calls are no-ops.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
