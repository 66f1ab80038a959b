use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventKind {
    Contribution,
    Withdrawal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AmountBasis {
    Nominal,
    PresentValue,
}

/// One-off cash flow scheduled for a specific age. The amount may be declared
/// in the currency of the year it occurs (nominal) or in today's purchasing
/// power (present value).
#[derive(Debug, Clone)]
pub struct CashFlowEvent {
    pub id: String,
    pub kind: EventKind,
    pub amount: f64,
    pub basis: AmountBasis,
    pub age: u32,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Inputs {
    pub current_age: u32,
    pub current_wealth: f64,
    pub monthly_contribution: f64,
    pub retirement_age: u32,
    pub desired_monthly_income: f64,
    pub life_expectancy: u32,
    pub inflation: f64,
    pub annual_return: f64,
    pub events: Vec<CashFlowEvent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationYear {
    pub year: u32,
    pub age: u32,
    pub monthly_contribution: f64,
    pub end_wealth: f64,
    pub end_wealth_real: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_off_net: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecumulationYear {
    pub year: u32,
    pub age: u32,
    pub monthly_withdrawal: f64,
    pub end_wealth: f64,
    pub end_wealth_real: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_off_net: Option<f64>,
}

/// Outcome of the decumulation phase. The snapshot list is shorter than the
/// full retirement horizon when the portfolio runs out early.
#[derive(Debug, Clone)]
pub struct DecumulationOutcome {
    pub years: Vec<DecumulationYear>,
    pub depleted_early: bool,
    pub depletion_age: Option<u32>,
    pub final_wealth: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Surplus,
    Adequate,
    Insufficient,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionTrajectory {
    pub first_year: f64,
    pub year_five: Option<f64>,
    pub year_ten: Option<f64>,
    pub final_year: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    pub extra_monthly_contribution: Option<f64>,
    pub extra_working_years: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub accumulation: Vec<AccumulationYear>,
    pub decumulation: Vec<DecumulationYear>,
    pub required_capital: f64,
    pub projected_wealth: f64,
    pub projected_wealth_real: f64,
    pub status: PlanStatus,
    pub first_withdrawal: f64,
    pub last_withdrawal: f64,
    pub depleted_early: bool,
    pub depletion_age: Option<u32>,
    pub contribution_trajectory: ContributionTrajectory,
    pub years_to_retirement: u32,
    pub years_in_retirement: u32,
    pub bequest: Option<f64>,
    pub bequest_real: Option<f64>,
    pub equilibrium_withdrawal: Option<f64>,
    pub desired_monthly_income: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}
