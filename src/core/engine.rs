use super::solver;
use super::types::{
    AccumulationYear, AmountBasis, CashFlowEvent, ContributionTrajectory, DecumulationOutcome,
    DecumulationYear, EventKind, Inputs, PlanStatus, ProjectionResult,
};

pub fn monthly_rate(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).powf(1.0 / 12.0) - 1.0
}

pub fn present_value(nominal: f64, inflation: f64, years_elapsed: u32) -> f64 {
    if years_elapsed == 0 {
        return nominal;
    }
    nominal / (1.0 + inflation).powi(years_elapsed as i32)
}

/// A quantity held constant in today's purchasing power grows nominally with
/// inflation; year 0 is the first projected year.
pub fn nominal_at_year(base: f64, inflation: f64, year: u32) -> f64 {
    base * (1.0 + inflation).powi(year as i32)
}

/// Nominal monthly withdrawal in a given retirement year. Indexing continues
/// from the accumulation phase, so year 0 of retirement is already
/// `years_to_retirement` years of inflation away from today.
pub fn withdrawal_at_year(
    desired_monthly: f64,
    inflation: f64,
    years_to_retirement: u32,
    retirement_year: u32,
) -> f64 {
    desired_monthly * (1.0 + inflation).powi((years_to_retirement + retirement_year) as i32)
}

fn resolved_event_amount(event: &CashFlowEvent, inflation: f64, current_age: u32) -> f64 {
    match event.basis {
        AmountBasis::Nominal => event.amount,
        AmountBasis::PresentValue => {
            let years_from_now = event.age.saturating_sub(current_age);
            event.amount * (1.0 + inflation).powi(years_from_now as i32)
        }
    }
}

fn net_events_at_age(events: &[CashFlowEvent], age: u32, inflation: f64, current_age: u32) -> f64 {
    events
        .iter()
        .filter(|e| e.age == age)
        .map(|e| {
            let amount = resolved_event_amount(e, inflation, current_age);
            match e.kind {
                EventKind::Contribution => amount,
                EventKind::Withdrawal => -amount,
            }
        })
        .sum()
}

pub fn simulate_accumulation(inputs: &Inputs) -> Vec<AccumulationYear> {
    let rate = monthly_rate(inputs.annual_return);
    let years = inputs.retirement_age.saturating_sub(inputs.current_age);
    let mut snapshots = Vec::with_capacity(years as usize);
    let mut wealth = inputs.current_wealth;

    for year in 0..years {
        let age_this_year = inputs.current_age + year;
        let one_off = net_events_at_age(
            &inputs.events,
            age_this_year,
            inputs.inflation,
            inputs.current_age,
        );
        wealth += one_off;

        let contribution = nominal_at_year(inputs.monthly_contribution, inputs.inflation, year);
        for _ in 0..12 {
            wealth = wealth * (1.0 + rate) + contribution;
        }

        snapshots.push(AccumulationYear {
            year: year + 1,
            age: age_this_year + 1,
            monthly_contribution: contribution,
            end_wealth: wealth,
            end_wealth_real: present_value(wealth, inputs.inflation, year + 1),
            one_off_net: (one_off != 0.0).then_some(one_off),
        });
    }

    snapshots
}

pub fn simulate_decumulation(inputs: &Inputs, starting_wealth: f64) -> DecumulationOutcome {
    let rate = monthly_rate(inputs.annual_return);
    let years_to_retirement = inputs.retirement_age.saturating_sub(inputs.current_age);
    let years = inputs.life_expectancy.saturating_sub(inputs.retirement_age);
    let mut snapshots = Vec::with_capacity(years as usize);
    let mut wealth = starting_wealth;
    let mut depleted_early = false;
    let mut depletion_age = None;

    for year in 0..years {
        let age_this_year = inputs.retirement_age + year;
        let one_off = net_events_at_age(
            &inputs.events,
            age_this_year,
            inputs.inflation,
            inputs.current_age,
        );
        wealth += one_off;
        if wealth < 0.0 {
            wealth = 0.0;
        }

        let withdrawal = withdrawal_at_year(
            inputs.desired_monthly_income,
            inputs.inflation,
            years_to_retirement,
            year,
        );
        for _ in 0..12 {
            wealth = wealth * (1.0 + rate) - withdrawal;
            if wealth <= 0.0 {
                depleted_early = true;
                // Coarse by design: the recorded age is the start of the
                // year the portfolio ran out, not the exact month.
                depletion_age = Some(age_this_year);
                break;
            }
        }

        snapshots.push(DecumulationYear {
            year: year + 1,
            age: age_this_year,
            monthly_withdrawal: withdrawal,
            end_wealth: wealth.max(0.0),
            end_wealth_real: present_value(wealth, inputs.inflation, years_to_retirement + year + 1),
            one_off_net: (one_off != 0.0).then_some(one_off),
        });

        if depleted_early {
            break;
        }
    }

    DecumulationOutcome {
        final_wealth: if depleted_early { 0.0 } else { wealth },
        years: snapshots,
        depleted_early,
        depletion_age,
    }
}

fn annuity_factor(rate: f64) -> f64 {
    if rate.abs() < 1e-9 {
        // Limit of the ordinary-annuity factor as the rate goes to zero.
        return 12.0;
    }
    let growth = (1.0 + rate).powi(12);
    (growth - 1.0) / (rate * growth)
}

/// Present value, at the start of retirement, of every future withdrawal:
/// each retirement year's 12 payments are annuitized to an end-of-year value
/// and discounted back at the annual return rate.
pub fn required_capital(
    desired_monthly_income: f64,
    inflation: f64,
    annual_return: f64,
    years_in_retirement: u32,
    years_to_retirement: u32,
) -> f64 {
    let rate = monthly_rate(annual_return);
    let factor = annuity_factor(rate);
    let mut total = 0.0;

    for year in 0..years_in_retirement {
        let withdrawal =
            withdrawal_at_year(desired_monthly_income, inflation, years_to_retirement, year);
        total += withdrawal * factor / (1.0 + annual_return).powi(year as i32);
    }

    total
}

fn classify_status(ratio: f64, depleted_early: bool) -> PlanStatus {
    if ratio >= 1.05 {
        PlanStatus::Surplus
    } else if ratio < 0.95 || depleted_early {
        PlanStatus::Insufficient
    } else {
        PlanStatus::Adequate
    }
}

pub fn run_projection(inputs: &Inputs) -> ProjectionResult {
    let mut result = project_without_suggestions(inputs);
    if result.status == PlanStatus::Insufficient {
        result.suggestions = Some(solver::suggest_adjustments(
            inputs,
            result.required_capital,
            result.projected_wealth,
        ));
    }
    result
}

pub(crate) fn project_without_suggestions(inputs: &Inputs) -> ProjectionResult {
    let years_to_retirement = inputs.retirement_age.saturating_sub(inputs.current_age);
    let years_in_retirement = inputs.life_expectancy.saturating_sub(inputs.retirement_age);

    let accumulation = simulate_accumulation(inputs);
    let (projected_wealth, projected_wealth_real) = match accumulation.last() {
        Some(last) => (last.end_wealth, last.end_wealth_real),
        None => (inputs.current_wealth, inputs.current_wealth),
    };

    let required_capital = required_capital(
        inputs.desired_monthly_income,
        inputs.inflation,
        inputs.annual_return,
        years_in_retirement,
        years_to_retirement,
    );

    let outcome = simulate_decumulation(inputs, projected_wealth);

    let ratio = if required_capital > 0.0 {
        projected_wealth / required_capital
    } else {
        1.0
    };
    let status = classify_status(ratio, outcome.depleted_early);

    let first_withdrawal = outcome
        .years
        .first()
        .map(|y| y.monthly_withdrawal)
        .unwrap_or(inputs.desired_monthly_income);
    let last_withdrawal = outcome
        .years
        .last()
        .map(|y| y.monthly_withdrawal)
        .unwrap_or(inputs.desired_monthly_income);

    let contribution_trajectory = ContributionTrajectory {
        first_year: accumulation
            .first()
            .map(|y| y.monthly_contribution)
            .unwrap_or(inputs.monthly_contribution),
        year_five: (accumulation.len() >= 5).then(|| accumulation[4].monthly_contribution),
        year_ten: (accumulation.len() >= 10).then(|| accumulation[9].monthly_contribution),
        final_year: accumulation.last().map(|y| y.monthly_contribution),
    };

    let mut bequest = None;
    let mut bequest_real = None;
    let mut equilibrium_withdrawal = None;
    if !outcome.depleted_early && outcome.final_wealth > 0.0 {
        bequest = Some(outcome.final_wealth);
        bequest_real = Some(present_value(
            outcome.final_wealth,
            inputs.inflation,
            years_to_retirement + years_in_retirement,
        ));
        equilibrium_withdrawal = Some(solver::equilibrium_monthly_withdrawal(
            projected_wealth,
            inputs.inflation,
            inputs.annual_return,
            years_to_retirement,
            years_in_retirement,
        ));
    }

    ProjectionResult {
        accumulation,
        decumulation: outcome.years,
        required_capital,
        projected_wealth,
        projected_wealth_real,
        status,
        first_withdrawal,
        last_withdrawal,
        depleted_early: outcome.depleted_early,
        depletion_age: outcome.depletion_age,
        contribution_trajectory,
        years_to_retirement,
        years_in_retirement,
        bequest,
        bequest_real,
        equilibrium_withdrawal,
        desired_monthly_income: inputs.desired_monthly_income,
        suggestions: None,
    }
}
