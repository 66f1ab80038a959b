use super::engine;
use super::types::{Inputs, Suggestions};

const EQUILIBRIUM_ITERATIONS: u32 = 60;
const EQUILIBRIUM_TOLERANCE: f64 = 1.0;
const CONTRIBUTION_ITERATIONS: u32 = 50;
const MAX_EXTRA_YEARS: u32 = 20;

/// Initial monthly withdrawal, in today's purchasing power, that exhausts the
/// portfolio exactly at the end of the retirement horizon. The inner loop
/// tracks signed wealth so the bisection has a usable direction; the upper
/// bound is a deliberate overestimate of an even spread of the capital.
pub fn equilibrium_monthly_withdrawal(
    starting_wealth: f64,
    inflation: f64,
    annual_return: f64,
    years_to_retirement: u32,
    years_in_retirement: u32,
) -> f64 {
    let rate = engine::monthly_rate(annual_return);
    let mut lo = 0.0;
    let mut hi = starting_wealth / (years_in_retirement as f64 * 12.0) * 2.0;

    for _ in 0..EQUILIBRIUM_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        let mut wealth = starting_wealth;
        'years: for year in 0..years_in_retirement {
            let withdrawal =
                engine::withdrawal_at_year(mid, inflation, years_to_retirement, year);
            for _ in 0..12 {
                wealth = wealth * (1.0 + rate) - withdrawal;
                if wealth < 0.0 {
                    break 'years;
                }
            }
        }
        if wealth.abs() < EQUILIBRIUM_TOLERANCE {
            return mid;
        }
        if wealth > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    (lo + hi) / 2.0
}

pub fn suggest_adjustments(
    inputs: &Inputs,
    required_capital: f64,
    projected_wealth: f64,
) -> Suggestions {
    if projected_wealth >= required_capital {
        return Suggestions {
            extra_monthly_contribution: None,
            extra_working_years: None,
        };
    }

    let shortfall = required_capital - projected_wealth;
    Suggestions {
        extra_monthly_contribution: solve_extra_contribution(inputs, required_capital, shortfall),
        extra_working_years: search_extra_years(inputs, required_capital),
    }
}

fn wealth_at_retirement_with_extra(inputs: &Inputs, extra_monthly: f64) -> f64 {
    // One-off events stay out of this what-if, matching how the shortfall
    // itself is quoted against the recurring contribution schedule.
    let mut trial = inputs.clone();
    trial.monthly_contribution = inputs.monthly_contribution + extra_monthly;
    trial.events = Vec::new();

    engine::simulate_accumulation(&trial)
        .last()
        .map(|snapshot| snapshot.end_wealth)
        .unwrap_or(trial.current_wealth)
}

/// Flat extra monthly amount, itself inflation-indexed like every other
/// contribution, that lifts projected wealth at retirement to the required
/// capital. None when the plan needs less than a cent.
fn solve_extra_contribution(
    inputs: &Inputs,
    required_capital: f64,
    shortfall: f64,
) -> Option<f64> {
    let mut lo = 0.0;
    let mut hi = (shortfall / 12.0).max(inputs.monthly_contribution * 3.0);

    for _ in 0..CONTRIBUTION_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        if wealth_at_retirement_with_extra(inputs, mid) >= required_capital {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    let extra = (((lo + hi) / 2.0) * 100.0).round() / 100.0;
    (extra > 0.01).then_some(extra)
}

/// Bounded search for extra working years: each candidate shifts both the
/// retirement age and the life expectancy, re-runs the whole projection, and
/// must clear the original capital requirement without running dry.
fn search_extra_years(inputs: &Inputs, required_capital: f64) -> Option<u32> {
    for extra in 1..=MAX_EXTRA_YEARS {
        let mut shifted = inputs.clone();
        shifted.retirement_age = inputs.retirement_age + extra;
        shifted.life_expectancy = inputs.life_expectancy + extra;

        let result = engine::project_without_suggestions(&shifted);
        if result.projected_wealth >= required_capital && !result.depleted_early {
            return Some(extra);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::{required_capital, run_projection, simulate_decumulation};
    use crate::core::types::PlanStatus;

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn flat_inputs() -> Inputs {
        Inputs {
            current_age: 40,
            current_wealth: 50_000.0,
            monthly_contribution: 1_000.0,
            retirement_age: 50,
            desired_monthly_income: 1_000.0,
            life_expectancy: 70,
            inflation: 0.0,
            annual_return: 0.0,
            events: Vec::new(),
        }
    }

    #[test]
    fn equilibrium_withdrawal_spreads_flat_capital_evenly() {
        let solved = equilibrium_monthly_withdrawal(240_000.0, 0.0, 0.0, 0, 20);
        assert_approx_tol(solved, 1_000.0, 0.01);
    }

    #[test]
    fn equilibrium_withdrawal_exhausts_the_portfolio() {
        let starting_wealth = 500_000.0;
        let inputs = Inputs {
            current_age: 45,
            current_wealth: 0.0,
            monthly_contribution: 0.0,
            retirement_age: 55,
            desired_monthly_income: 0.0,
            life_expectancy: 80,
            inflation: 0.03,
            annual_return: 0.07,
            events: Vec::new(),
        };

        let solved = equilibrium_monthly_withdrawal(starting_wealth, 0.03, 0.07, 10, 25);
        assert!(solved > 0.0);

        let mut replay = inputs.clone();
        replay.desired_monthly_income = solved;
        let outcome = simulate_decumulation(&replay, starting_wealth);
        assert!(outcome.final_wealth.abs() <= 2.0);
        if outcome.depleted_early {
            assert_eq!(outcome.depletion_age, Some(79));
        }
    }

    #[test]
    fn equilibrium_withdrawal_handles_zero_starting_wealth() {
        let solved = equilibrium_monthly_withdrawal(0.0, 0.04, 0.08, 5, 20);
        assert_approx_tol(solved, 0.0, 1e-9);
    }

    #[test]
    fn no_suggestions_when_projection_already_covers_the_target() {
        let inputs = flat_inputs();
        let suggestions = suggest_adjustments(&inputs, 100_000.0, 170_000.0);
        assert!(suggestions.extra_monthly_contribution.is_none());
        assert!(suggestions.extra_working_years.is_none());
    }

    #[test]
    fn extra_contribution_closes_the_flat_shortfall_exactly() {
        // Projected 170k against 240k required: 120 payments must carry the
        // remaining 70k, so the extra is 583.33 a month.
        let inputs = flat_inputs();
        let suggestions = suggest_adjustments(&inputs, 240_000.0, 170_000.0);
        let extra = suggestions
            .extra_monthly_contribution
            .expect("shortfall needs an extra contribution");
        assert_approx_tol(extra, 583.33, 0.01);

        let lifted = wealth_at_retirement_with_extra(&inputs, extra);
        assert!(lifted >= 240_000.0 - 1.0);
    }

    #[test]
    fn extra_years_search_finds_the_first_working_shift() {
        // Each extra year adds 12k of contributions: the 70k gap closes at
        // six years, and the longer runway never drains dry.
        let inputs = flat_inputs();
        let suggestions = suggest_adjustments(&inputs, 240_000.0, 170_000.0);
        assert_eq!(suggestions.extra_working_years, Some(6));
    }

    #[test]
    fn extra_years_search_gives_up_beyond_the_bound() {
        let mut inputs = flat_inputs();
        inputs.current_wealth = 0.0;
        inputs.monthly_contribution = 0.0;

        let required = required_capital(1_000.0, 0.0, 0.0, 20, 10);
        let suggestions = suggest_adjustments(&inputs, required, 0.0);
        assert!(suggestions.extra_working_years.is_none());
        assert!(suggestions.extra_monthly_contribution.is_some());
    }

    #[test]
    fn insufficient_projection_carries_both_suggestions_end_to_end() {
        let inputs = flat_inputs();
        let result = run_projection(&inputs);
        assert_eq!(result.status, PlanStatus::Insufficient);

        let suggestions = result.suggestions.expect("insufficient plan");
        assert_approx_tol(
            suggestions
                .extra_monthly_contribution
                .expect("extra contribution"),
            583.33,
            0.01,
        );
        assert_eq!(suggestions.extra_working_years, Some(6));
    }
}
