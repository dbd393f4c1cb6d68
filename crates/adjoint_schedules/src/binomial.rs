//! Binomial checkpointing arithmetic.
//!
//! The step rule implemented here decides, for `n` remaining forward steps
//! and `s` available checkpoint slots, how far the forward solver should
//! advance before the next checkpoint is stored. It follows the binomial
//! analysis of Griewank and Walther's revolve algorithm; the two
//! [`Trajectory`] variants correspond to the two optimal-region solutions
//! discussed there.

use adjoint_core::{ScheduleError, ScheduleResult};
use std::collections::HashMap;

/// Which solution of the binomial step problem to use.
///
/// When advancing `n` steps with `s` checkpoint slots there are in general
/// multiple optimal choices for the number of steps to advance before
/// storing the next checkpoint. This selector picks one deterministically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Trajectory {
    /// The maximum step size compatible with the optimal region.
    #[default]
    Maximum,
    /// The classical revolve step size.
    Revolve,
}

/// Returns the number of steps to advance before storing the next
/// checkpoint, for `n` remaining steps and `snapshots` available slots.
///
/// # Errors
///
/// [`ScheduleError::InvalidSteps`] when `n` is zero and
/// [`ScheduleError::InvalidBudget`] when `snapshots` is zero.
pub fn n_advance(n: usize, snapshots: usize, trajectory: Trajectory) -> ScheduleResult<usize> {
    if n < 1 {
        return Err(ScheduleError::InvalidSteps { steps: n });
    }
    if snapshots == 0 {
        return Err(ScheduleError::InvalidBudget {
            snapshots,
            steps: n,
        });
    }

    // Excess slots beyond n - 1 cannot be used.
    let s = snapshots.min(n - 1).max(1) as i128;
    let n = n as i128;
    if s == 1 {
        return Ok((n - 1) as usize); // Minimal storage
    }
    if s == n - 1 {
        return Ok(1); // Maximal storage
    }

    // Find the repetition number t with beta(s, t-1) < n <= beta(s, t),
    // computing the binomial coefficients incrementally.
    let mut t: i128 = 2;
    let mut b_s_tm2: i128 = 1;
    let mut b_s_tm1: i128 = s + 1;
    let mut b_s_t: i128 = ((s + 1) * (s + 2)) / 2;
    while b_s_tm1 >= n || n > b_s_t {
        t += 1;
        b_s_tm2 = b_s_tm1;
        b_s_tm1 = b_s_t;
        b_s_t = (b_s_t * (s + t)) / t;
    }

    let advance = match trajectory {
        Trajectory::Maximum => {
            let b_sm1_tm2 = (b_s_tm2 * s) / (s + t - 2);
            if n <= b_s_tm1 + b_sm1_tm2 {
                n - b_s_tm1 + b_s_tm2
            } else {
                let b_sm1_tm1 = (b_s_tm1 * s) / (s + t - 1);
                let b_sm2_tm1 = (b_sm1_tm1 * (s - 1)) / (s + t - 2);
                if n <= b_s_tm1 + b_sm2_tm1 + b_sm1_tm2 {
                    b_s_tm2 + b_sm1_tm2
                } else if n <= b_s_tm1 + b_sm1_tm1 + b_sm2_tm1 {
                    n - b_sm1_tm1 - b_sm2_tm1
                } else {
                    b_s_tm1
                }
            }
        }
        Trajectory::Revolve => {
            let b_sm1_tm1 = (b_s_tm1 * s) / (s + t - 1);
            let b_sm2_tm1 = (b_sm1_tm1 * (s - 1)) / (s + t - 2);
            if n <= b_s_tm1 + b_sm2_tm1 {
                b_s_tm2
            } else if n < b_s_tm1 + b_sm1_tm1 + b_sm2_tm1 {
                n - b_sm1_tm1 - b_sm2_tm1
            } else {
                b_s_tm1
            }
        }
    };

    if advance < 1 || advance >= n {
        return Err(ScheduleError::internal("binomial step out of range"));
    }
    Ok(advance as usize)
}

/// Returns the optimal number of recomputed forward steps for binomial
/// checkpointing of `n` steps with `s` slots.
///
/// # Errors
///
/// [`ScheduleError::InvalidSteps`] when `n` is zero and
/// [`ScheduleError::InvalidBudget`] when `s` is zero while more than one
/// step must be covered.
pub fn optimal_extra_steps(n: usize, s: usize) -> ScheduleResult<usize> {
    if n == 0 {
        return Err(ScheduleError::InvalidSteps { steps: n });
    }
    if s == 0 && n > 1 {
        return Err(ScheduleError::InvalidBudget {
            snapshots: s,
            steps: n,
        });
    }
    let mut memo = HashMap::new();
    Ok(extra_steps(n, s, &mut memo))
}

/// Returns the optimal total number of forward steps (initial sweep plus
/// recomputation) for binomial checkpointing of `n` steps with `s` slots.
///
/// # Errors
///
/// As [`optimal_extra_steps`].
pub fn optimal_steps(n: usize, s: usize) -> ScheduleResult<usize> {
    Ok(n + optimal_extra_steps(n, s)?)
}

fn extra_steps(n: usize, s: usize, memo: &mut HashMap<(usize, usize), usize>) -> usize {
    if n == 1 {
        return 0;
    }
    // Slots beyond n - 1 are never used.
    let s = s.min(n - 1);
    if let Some(&cached) = memo.get(&(n, s)) {
        return cached;
    }
    let result = if s == 1 {
        n * (n - 1) / 2
    } else {
        (1..n)
            .map(|i| i + extra_steps(i, s, memo) + extra_steps(n - i, s - 1, memo))
            .min()
            .unwrap()
    };
    memo.insert((n, s), result);
    result
}
