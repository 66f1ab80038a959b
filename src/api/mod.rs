use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{AmountBasis, CashFlowEvent, EventKind, Inputs, ProjectionResult, run_projection};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiEventKind {
    Contribution,
    Withdrawal,
}

impl From<ApiEventKind> for EventKind {
    fn from(value: ApiEventKind) -> Self {
        match value {
            ApiEventKind::Contribution => EventKind::Contribution,
            ApiEventKind::Withdrawal => EventKind::Withdrawal,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiAmountBasis {
    Nominal,
    #[serde(alias = "presentValue", alias = "present_value")]
    PresentValue,
}

impl From<ApiAmountBasis> for AmountBasis {
    fn from(value: ApiAmountBasis) -> Self {
        match value {
            ApiAmountBasis::Nominal => AmountBasis::Nominal,
            ApiAmountBasis::PresentValue => AmountBasis::PresentValue,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPayload {
    #[serde(default)]
    id: Option<String>,
    kind: ApiEventKind,
    amount: f64,
    basis: ApiAmountBasis,
    age: u32,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    current_age: Option<u32>,
    current_wealth: Option<f64>,
    monthly_contribution: Option<f64>,
    retirement_age: Option<u32>,
    desired_monthly_income: Option<f64>,
    life_expectancy: Option<u32>,
    inflation_rate: Option<f64>,
    return_rate: Option<f64>,
    events: Option<Vec<EventPayload>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "glidepath",
    about = "Deterministic retirement projector (inflation-indexed contributions and withdrawals)"
)]
struct Cli {
    #[arg(long, default_value_t = 18)]
    current_age: u32,
    #[arg(long, default_value_t = 0.0, help = "Investable wealth today")]
    current_wealth: f64,
    #[arg(long, default_value_t = 3000.0, help = "Monthly savings in today's money")]
    monthly_contribution: f64,
    #[arg(long, default_value_t = 60)]
    retirement_age: u32,
    #[arg(
        long,
        default_value_t = 15000.0,
        help = "Desired monthly retirement income in today's money"
    )]
    desired_monthly_income: f64,
    #[arg(long, default_value_t = 80)]
    life_expectancy: u32,
    #[arg(long, default_value_t = 5.0, help = "Expected annual inflation in percent")]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 12.0,
        help = "Expected nominal annual return in percent"
    )]
    return_rate: f64,
}

#[derive(Debug, Error)]
enum InputError {
    #[error("currentAge must be between 12 and 100")]
    CurrentAge,
    #[error("retirementAge must be between 18 and 100")]
    RetirementAge,
    #[error("retirementAge must be greater than currentAge")]
    RetirementBeforeCurrent,
    #[error("lifeExpectancy must be between 60 and 120")]
    LifeExpectancy,
    #[error("lifeExpectancy must be greater than retirementAge")]
    LifeEndsBeforeRetirement,
    #[error("{field} must be finite and >= 0")]
    NegativeAmount { field: &'static str },
    #[error("inflationRate must be between 0 and 50 percent")]
    InflationRange,
    #[error("returnRate must be between 0 and 100 percent")]
    ReturnRange,
    #[error("events[{index}]: amount must be finite and >= 0")]
    EventAmount { index: usize },
    #[error("events[{index}]: age must be between 18 and 120")]
    EventAge { index: usize },
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn resolve_events(raw: Vec<EventPayload>) -> Result<Vec<CashFlowEvent>, InputError> {
    let mut used: HashSet<String> = raw
        .iter()
        .filter_map(|e| e.id.clone().filter(|id| !id.is_empty()))
        .collect();
    let mut next = 1u32;
    let mut events = Vec::with_capacity(raw.len());

    for (index, event) in raw.into_iter().enumerate() {
        if !event.amount.is_finite() || event.amount < 0.0 {
            return Err(InputError::EventAmount { index });
        }
        if !(18..=120).contains(&event.age) {
            return Err(InputError::EventAge { index });
        }

        // Events restored from storage may arrive without an id; stamp a
        // fresh one that cannot collide with the ids already present.
        let id = match event.id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => loop {
                let candidate = format!("event-{next}");
                next += 1;
                if used.insert(candidate.clone()) {
                    break candidate;
                }
            },
        };

        events.push(CashFlowEvent {
            id,
            kind: event.kind.into(),
            amount: event.amount,
            basis: event.basis.into(),
            age: event.age,
            label: event.label,
        });
    }

    Ok(events)
}

fn build_inputs(cli: Cli, raw_events: Vec<EventPayload>) -> Result<Inputs, InputError> {
    if !(12..=100).contains(&cli.current_age) {
        return Err(InputError::CurrentAge);
    }
    if !(18..=100).contains(&cli.retirement_age) {
        return Err(InputError::RetirementAge);
    }
    if cli.retirement_age <= cli.current_age {
        return Err(InputError::RetirementBeforeCurrent);
    }
    if !(60..=120).contains(&cli.life_expectancy) {
        return Err(InputError::LifeExpectancy);
    }
    if cli.life_expectancy <= cli.retirement_age {
        return Err(InputError::LifeEndsBeforeRetirement);
    }

    for (field, value) in [
        ("currentWealth", cli.current_wealth),
        ("monthlyContribution", cli.monthly_contribution),
        ("desiredMonthlyIncome", cli.desired_monthly_income),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(InputError::NegativeAmount { field });
        }
    }

    if !(0.0..=50.0).contains(&cli.inflation_rate) {
        return Err(InputError::InflationRange);
    }
    if !(0.0..=100.0).contains(&cli.return_rate) {
        return Err(InputError::ReturnRange);
    }

    Ok(Inputs {
        current_age: cli.current_age,
        current_wealth: cli.current_wealth,
        monthly_contribution: cli.monthly_contribution,
        retirement_age: cli.retirement_age,
        desired_monthly_income: cli.desired_monthly_income,
        life_expectancy: cli.life_expectancy,
        inflation: cli.inflation_rate / 100.0,
        annual_return: cli.return_rate / 100.0,
        events: resolve_events(raw_events)?,
    })
}

fn inputs_from_payload(payload: ProjectPayload) -> Result<Inputs, InputError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.current_wealth {
        cli.current_wealth = v;
    }
    if let Some(v) = payload.monthly_contribution {
        cli.monthly_contribution = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.desired_monthly_income {
        cli.desired_monthly_income = v;
    }
    if let Some(v) = payload.life_expectancy {
        cli.life_expectancy = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.return_rate {
        cli.return_rate = v;
    }

    // A missing event list means no one-off events, not an error.
    build_inputs(cli, payload.events.unwrap_or_default())
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 18,
        current_wealth: 0.0,
        monthly_contribution: 3_000.0,
        retirement_age: 60,
        desired_monthly_income: 15_000.0,
        life_expectancy: 80,
        inflation_rate: 5.0,
        return_rate: 12.0,
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route(
            "/api/project.csv",
            get(project_csv_get_handler).post(project_csv_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("glidepath HTTP API listening on http://{addr}");
    log::info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_handler_impl(payload: ProjectPayload) -> Response {
    match inputs_from_payload(payload) {
        Ok(inputs) => json_response(StatusCode::OK, run_projection(&inputs)),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn project_csv_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_csv_handler_impl(payload).await
}

async fn project_csv_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_csv_handler_impl(payload).await
}

async fn project_csv_handler_impl(payload: ProjectPayload) -> Response {
    match inputs_from_payload(payload) {
        Ok(inputs) => {
            let result = run_projection(&inputs);
            csv_response(projection_csv(&result))
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

fn projection_csv(result: &ProjectionResult) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    write_csv_record(
        &mut writer,
        [
            "phase".to_string(),
            "year".to_string(),
            "age".to_string(),
            "monthlyFlow".to_string(),
            "endWealth".to_string(),
            "endWealthReal".to_string(),
            "oneOffNet".to_string(),
        ],
    );

    for row in &result.accumulation {
        write_csv_record(
            &mut writer,
            [
                "accumulation".to_string(),
                row.year.to_string(),
                row.age.to_string(),
                format!("{:.2}", row.monthly_contribution),
                format!("{:.2}", row.end_wealth),
                format!("{:.2}", row.end_wealth_real),
                row.one_off_net.map(|v| format!("{v:.2}")).unwrap_or_default(),
            ],
        );
    }

    for row in &result.decumulation {
        write_csv_record(
            &mut writer,
            [
                "decumulation".to_string(),
                row.year.to_string(),
                row.age.to_string(),
                format!("{:.2}", row.monthly_withdrawal),
                format!("{:.2}", row.end_wealth),
                format!("{:.2}", row.end_wealth_real),
                row.one_off_net.map(|v| format!("{v:.2}")).unwrap_or_default(),
            ],
        );
    }

    let bytes = writer.into_inner().unwrap_or_default();
    String::from_utf8(bytes).unwrap_or_default()
}

fn write_csv_record(writer: &mut csv::Writer<Vec<u8>>, record: [String; 7]) {
    writer
        .write_record(&record)
        .expect("csv write to memory buffer");
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn csv_response(body: String) -> Response {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        body,
    ))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload).map_err(|e| e.to_string())
}
