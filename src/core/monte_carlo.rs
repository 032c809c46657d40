use rayon::prelude::*;
use tracing::info;

use super::engine::run_deterministic_with_returns;
use super::types::{AssetMix, MonteCarloResult, PercentileBand, ScenarioParams};
use super::validation::{ScenarioError, validate};

pub const BAND_PERCENTILES: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

/// Runs `num_paths` return-perturbed projections of a scenario. Each path
/// draws one return triple from its own seeded generator, so results depend
/// only on `params.seed`.
pub fn run_monte_carlo(params: &ScenarioParams) -> Result<MonteCarloResult, ScenarioError> {
    validate(params)?;

    let horizon = params.years() as usize + 1;
    let paths: Vec<Vec<f64>> = (0..params.num_paths)
        .into_par_iter()
        .map(|path_id| {
            let mut rng = Rng::for_path(params.seed, path_id);
            let returns = sample_returns(params, &mut rng);
            let result = run_deterministic_with_returns(params, returns);
            wealth_trajectory(result.rows.iter().map(|row| row.wealth), horizon)
        })
        .collect();

    let bands = percentile_bands(&paths, params.current_age, horizon);
    let ruin_probability = ruin_probability(&paths);
    let median_terminal_wealth = bands.last().map_or(0.0, |band| band.p50);

    info!(
        num_paths = params.num_paths,
        seed = params.seed,
        ruin_probability,
        median_terminal_wealth,
        "monte carlo run complete"
    );

    Ok(MonteCarloResult {
        num_paths: params.num_paths,
        seed: params.seed,
        paths,
        bands,
        ruin_probability,
        median_terminal_wealth,
    })
}

fn sample_returns(params: &ScenarioParams, rng: &mut Rng) -> AssetMix {
    let z_public = rng.standard_normal();
    let z_private = rng.standard_normal();
    let z_cash = rng.standard_normal();

    let mean = params.asset_return;
    let vol = params.asset_vol;
    AssetMix {
        public: mean.public + vol.public * z_public,
        private: mean.private + vol.private * z_private,
        cash: mean.cash + vol.cash * z_cash,
    }
}

/// Pads a path that ended in ruin by repeating its last value, so every
/// trajectory covers the full horizon.
fn wealth_trajectory(wealth: impl Iterator<Item = f64>, horizon: usize) -> Vec<f64> {
    let mut trajectory: Vec<f64> = wealth.take(horizon).collect();
    let last = trajectory.last().copied().unwrap_or(0.0);
    trajectory.resize(horizon, last);
    trajectory
}

fn percentile_bands(paths: &[Vec<f64>], current_age: u32, horizon: usize) -> Vec<PercentileBand> {
    let mut column = Vec::with_capacity(paths.len());
    (0..horizon)
        .map(|year| {
            column.clear();
            column.extend(paths.iter().map(|path| path[year]));
            column.sort_by(|a, b| a.total_cmp(b));
            let [p5, p25, p50, p75, p95] =
                BAND_PERCENTILES.map(|q| nearest_rank_percentile(&column, q).max(0.0));
            PercentileBand {
                year: year as u32,
                age: current_age + year as u32,
                p5,
                p25,
                p50,
                p75,
                p95,
            }
        })
        .collect()
}

/// `sorted[floor(q/100 * (n-1))]` on an ascending slice.
fn nearest_rank_percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((q / 100.0) * (sorted.len() as f64 - 1.0)).floor() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

fn ruin_probability(paths: &[Vec<f64>]) -> f64 {
    if paths.is_empty() {
        return 0.0;
    }
    let ruined = paths
        .iter()
        .filter(|path| path.iter().any(|wealth| wealth.is_nan() || *wealth <= 0.0))
        .count();
    ruined as f64 / paths.len() as f64
}

/// Per-path generator: xorshift64* for uniforms, polar Box-Muller for
/// normals, with the spare normal of each pair held for the next draw.
struct Rng {
    state: u64,
    spare: Option<f64>,
}

impl Rng {
    /// Stream for one Monte Carlo path. The path index is hashed separately
    /// and folded into the scenario seed, so neighbouring paths and
    /// neighbouring seeds land far apart.
    fn for_path(seed: u64, path_id: u32) -> Self {
        let path_key = mix64(u64::from(path_id).wrapping_add(0x632B_E59B_D9B4_E019));
        Self::new(mix64(seed.rotate_left(17) ^ path_key))
    }

    fn new(seed: u64) -> Self {
        // xorshift has a fixed point at zero.
        Self {
            state: if seed == 0 { 0x853C_49E6_748F_EA9B } else { seed },
            spare: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform on the open interval (-1, 1).
    fn next_signed_unit(&mut self) -> f64 {
        let bits = self.next_u64() >> 11;
        (bits as f64 + 0.5) * (2.0 / (1u64 << 53) as f64) - 1.0
    }

    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        loop {
            let u = self.next_signed_unit();
            let v = self.next_signed_unit();
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                let scale = (-2.0 * s.ln() / s).sqrt();
                self.spare = Some(v * scale);
                return u * scale;
            }
        }
    }
}

/// SplitMix64 finalizer.
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::run_deterministic;
    use crate::core::types::{
        MAX_ANNUAL_RETURN, MAX_ANNUAL_VOLATILITY, MAX_HORIZON_YEARS, MAX_PATHS, SpendingRule,
    };
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};

    fn sample_params() -> ScenarioParams {
        let mut params = ScenarioParams::default();
        params.current_age = 60;
        params.death_age = 80;
        params.num_paths = 200;
        params.seed = 7;
        params
    }

    #[test]
    fn fixed_seed_reruns_are_identical() {
        let params = sample_params();
        let a = run_monte_carlo(&params).expect("valid scenario");
        let b = run_monte_carlo(&params).expect("valid scenario");
        assert_eq!(a.paths, b.paths);
        assert_eq!(a.bands, b.bands);
        assert_eq!(a.ruin_probability, b.ruin_probability);
    }

    #[test]
    fn different_seeds_produce_different_paths() {
        let mut params = sample_params();
        let a = run_monte_carlo(&params).expect("valid scenario");
        params.seed = 8;
        let b = run_monte_carlo(&params).expect("valid scenario");
        assert_ne!(a.paths, b.paths);
    }

    #[test]
    fn zero_volatility_paths_match_deterministic_run() {
        let mut params = sample_params();
        params.asset_vol = AssetMix::default();
        let deterministic = run_deterministic(&params);
        let mc = run_monte_carlo(&params).expect("valid scenario");

        let expected: Vec<f64> = deterministic.rows.iter().map(|r| r.wealth).collect();
        for path in &mc.paths {
            assert_eq!(path, &expected);
        }
        assert_eq!(mc.ruin_probability, 0.0);
        assert_eq!(mc.bands.last().map(|b| b.p50), expected.last().copied());
    }

    #[test]
    fn rejects_path_count_above_ceiling() {
        let mut params = sample_params();
        params.num_paths = MAX_PATHS + 1;
        let err = run_monte_carlo(&params).expect_err("must reject");
        assert_eq!(err.field(), Some("numPaths"));
    }

    #[test]
    fn certain_ruin_pads_paths_and_reports_full_probability() {
        let mut params = sample_params();
        params.start_wealth = 1_000_000.0;
        params.spending_rule = SpendingRule::Fixed;
        params.annual_expense_now = 600_000.0;
        params.asset_vol = AssetMix::new(0.01, 0.01, 0.0);

        let mc = run_monte_carlo(&params).expect("valid scenario");
        assert_eq!(mc.ruin_probability, 1.0);
        for path in &mc.paths {
            assert_eq!(path.len(), 21);
            assert!(path[20] <= 0.0);
        }
        assert!(mc.bands.iter().skip(2).all(|band| band.p95 == 0.0));
    }

    #[test]
    fn returns_and_volatility_at_their_caps_stay_finite() {
        let mut params = sample_params();
        params.current_age = 0;
        params.death_age = MAX_HORIZON_YEARS;
        params.spending_rule = SpendingRule::Guardrails;
        params.num_paths = 100;
        params.asset_return = AssetMix::new(MAX_ANNUAL_RETURN, MAX_ANNUAL_RETURN, MAX_ANNUAL_RETURN);
        params.asset_vol = AssetMix::new(
            MAX_ANNUAL_VOLATILITY,
            MAX_ANNUAL_VOLATILITY,
            MAX_ANNUAL_VOLATILITY,
        );

        let mc = run_monte_carlo(&params).expect("inputs at the caps are valid");
        assert_eq!(mc.bands.len(), MAX_HORIZON_YEARS as usize + 1);
        for band in &mc.bands {
            for value in [band.p5, band.p25, band.p50, band.p75, band.p95] {
                assert!(value.is_finite() && value >= 0.0);
            }
        }
        assert!((0.0..=1.0).contains(&mc.ruin_probability));
    }

    #[test]
    fn nearest_rank_percentile_floors_the_rank() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(nearest_rank_percentile(&sorted, 5.0), 1.0);
        assert_eq!(nearest_rank_percentile(&sorted, 25.0), 2.0);
        assert_eq!(nearest_rank_percentile(&sorted, 50.0), 3.0);
        assert_eq!(nearest_rank_percentile(&sorted, 95.0), 4.0);
        assert_eq!(nearest_rank_percentile(&sorted, 100.0), 5.0);
        assert_eq!(nearest_rank_percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn trajectory_padding_repeats_last_value() {
        let padded = wealth_trajectory([5.0, 3.0, -1.0].into_iter(), 6);
        assert_eq!(padded, vec![5.0, 3.0, -1.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn standard_normal_has_unit_moments() {
        let mut rng = Rng::new(99);
        let n = 50_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.standard_normal()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.02, "mean {mean}");
        assert!((var - 1.0).abs() < 0.03, "variance {var}");
    }

    #[test]
    fn path_streams_differ_by_path_and_seed() {
        let first = |mut rng: Rng| rng.next_u64();
        let a = first(Rng::for_path(42, 0));
        assert_ne!(a, first(Rng::for_path(42, 1)));
        assert_ne!(a, first(Rng::for_path(43, 0)));
        assert_eq!(a, first(Rng::for_path(42, 0)));
    }

    #[test]
    fn signed_unit_stays_inside_open_interval() {
        let mut rng = Rng::new(0);
        for _ in 0..10_000 {
            let u = rng.next_signed_unit();
            assert!(u > -1.0 && u < 1.0);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(12))]

        #[test]
        fn prop_ruin_probability_is_fraction_of_touching_paths(
            seed in any::<u64>(),
            expense in 0u32..4_000_000,
            public_vol_bp in 0u32..4000,
            num_paths in 100u32..300,
        ) {
            let mut params = sample_params();
            params.seed = seed;
            params.num_paths = num_paths;
            params.start_wealth = 20_000_000.0;
            params.annual_expense_now = expense as f64;
            params.asset_vol.public = public_vol_bp as f64 / 10_000.0;

            let mc = run_monte_carlo(&params).expect("valid scenario");
            prop_assert_eq!(mc.paths.len(), num_paths as usize);
            let touching = mc
                .paths
                .iter()
                .filter(|p| p.iter().any(|w| *w <= 0.0))
                .count();
            prop_assert_eq!(mc.ruin_probability, touching as f64 / num_paths as f64);
            prop_assert!((0.0..=1.0).contains(&mc.ruin_probability));

            for band in &mc.bands {
                prop_assert!(band.p5 >= 0.0);
                prop_assert!(band.p5 <= band.p25);
                prop_assert!(band.p25 <= band.p50);
                prop_assert!(band.p50 <= band.p75);
                prop_assert!(band.p75 <= band.p95);
            }
        }
    }
}
