mod engine;
mod solver;
mod types;

pub use engine::{
    monthly_rate, nominal_at_year, present_value, required_capital, run_projection,
    simulate_accumulation, simulate_decumulation, withdrawal_at_year,
};
pub use solver::{equilibrium_monthly_withdrawal, suggest_adjustments};
pub use types::{
    AccumulationYear, AmountBasis, CashFlowEvent, ContributionTrajectory, DecumulationOutcome,
    DecumulationYear, EventKind, Inputs, PlanStatus, ProjectionResult, Suggestions,
};
