use super::types::PrivateCommitments;

/// Per-year capital calls and distributions, indexed by simulation year
/// `0..=years`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitmentSchedule {
    pub calls: Vec<f64>,
    pub distributions: Vec<f64>,
}

impl CommitmentSchedule {
    fn zeroed(len: usize) -> Self {
        Self {
            calls: vec![0.0; len],
            distributions: vec![0.0; len],
        }
    }

    pub fn call(&self, year: u32) -> f64 {
        self.calls.get(year as usize).copied().unwrap_or(0.0)
    }

    pub fn distribution(&self, year: u32) -> f64 {
        self.distributions.get(year as usize).copied().unwrap_or(0.0)
    }
}

/// Linear pacing: equal calls over the call period, then equal distributions
/// of `dist_multiple` times the called capital after the lag. No recycling,
/// no carry.
pub fn schedule_commitments(commitments: &PrivateCommitments, years: u32) -> CommitmentSchedule {
    let horizon = years as usize + 1;
    let mut schedule = CommitmentSchedule::zeroed(horizon);
    if !commitments.enabled || commitments.total_commitment <= 0.0 {
        return schedule;
    }

    let call_years = (commitments.call_years as usize).min(horizon);
    let call_per_year = commitments.total_commitment / call_years.max(1) as f64;
    for call in schedule.calls.iter_mut().take(call_years) {
        *call = call_per_year;
    }

    let total_called = call_per_year * call_years as f64;
    let total_return = total_called * commitments.dist_multiple;

    let lag = commitments.dist_lag_years as usize;
    let room = horizon.saturating_sub(lag);
    let dist_years = (commitments.dist_years as usize).min(room).max(1);
    let dist_per_year = total_return / dist_years as f64;
    let dist_end = (lag + dist_years).min(horizon);
    if lag < dist_end {
        for dist in &mut schedule.distributions[lag..dist_end] {
            *dist = dist_per_year;
        }
    }

    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn commitments(total: f64, call_years: u32, lag: u32, dist_years: u32, multiple: f64) -> PrivateCommitments {
        PrivateCommitments {
            enabled: true,
            total_commitment: total,
            call_years,
            dist_lag_years: lag,
            dist_years,
            dist_multiple: multiple,
        }
    }

    #[test]
    fn four_year_call_period_splits_commitment_evenly() {
        let schedule = schedule_commitments(&commitments(2_000_000.0, 4, 4, 5, 1.5), 10);
        assert_eq!(schedule.calls.len(), 11);
        assert_eq!(schedule.distributions.len(), 11);
        for year in 0..4 {
            assert_eq!(schedule.calls[year], 500_000.0);
        }
        assert!(schedule.calls[4..].iter().all(|c| *c == 0.0));

        let non_zero: Vec<f64> = schedule
            .distributions
            .iter()
            .copied()
            .filter(|d| *d != 0.0)
            .collect();
        assert_eq!(non_zero.len(), 5);
        assert!(non_zero.iter().all(|d| *d == non_zero[0]));
        assert_eq!(non_zero[0], 600_000.0);
        assert_eq!(schedule.distributions[3], 0.0);
        assert_eq!(schedule.distributions[4], 600_000.0);
        assert_eq!(schedule.distributions[9], 0.0);
    }

    #[test]
    fn disabled_or_empty_commitment_is_all_zero() {
        let mut c = commitments(1_000_000.0, 3, 2, 4, 2.0);
        c.enabled = false;
        let schedule = schedule_commitments(&c, 6);
        assert!(schedule.calls.iter().chain(&schedule.distributions).all(|v| *v == 0.0));

        let schedule = schedule_commitments(&commitments(0.0, 3, 2, 4, 2.0), 6);
        assert!(schedule.calls.iter().chain(&schedule.distributions).all(|v| *v == 0.0));
    }

    #[test]
    fn call_period_longer_than_horizon_calls_everything_inside_it() {
        let schedule = schedule_commitments(&commitments(900.0, 10, 0, 1, 1.0), 2);
        assert_eq!(schedule.calls, vec![300.0, 300.0, 300.0]);
    }

    #[test]
    fn distribution_window_is_clamped_to_horizon() {
        // Horizon covers years 0..=5; lag 3 leaves room for 3 distribution years.
        let schedule = schedule_commitments(&commitments(1_000.0, 2, 3, 10, 3.0), 5);
        assert_eq!(schedule.distributions, vec![0.0, 0.0, 0.0, 1_000.0, 1_000.0, 1_000.0]);
    }

    #[test]
    fn lag_beyond_horizon_distributes_nothing() {
        let schedule = schedule_commitments(&commitments(1_000.0, 2, 8, 3, 2.0), 5);
        assert!(schedule.distributions.iter().all(|d| *d == 0.0));
        assert_eq!(schedule.distribution(8), 0.0);
    }

    proptest! {
        #[test]
        fn prop_calls_sum_to_commitment_and_distributions_never_exceed_moic(
            total in 1u32..50_000_000,
            call_years in 1u32..12,
            lag in 0u32..12,
            dist_years in 1u32..12,
            multiple_pct in 0u32..400,
            years in 1u32..60,
        ) {
            let multiple = multiple_pct as f64 / 100.0;
            let schedule = schedule_commitments(
                &commitments(total as f64, call_years, lag, dist_years, multiple),
                years,
            );
            prop_assert_eq!(schedule.calls.len(), years as usize + 1);
            prop_assert_eq!(schedule.distributions.len(), years as usize + 1);

            let called: f64 = schedule.calls.iter().sum();
            prop_assert!((called - total as f64).abs() <= 1e-6 * total as f64);

            let distributed: f64 = schedule.distributions.iter().sum();
            prop_assert!(distributed <= called * multiple + 1e-6 * total as f64);
            prop_assert!(schedule.distributions.iter().all(|d| *d >= 0.0));
        }
    }
}
