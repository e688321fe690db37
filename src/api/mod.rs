use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{Params, Projection, TaxType, project};
use crate::insight::{FALLBACK_INSIGHT, InsightClient};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliTaxType {
    TaxFree,
    General,
}

impl From<CliTaxType> for TaxType {
    fn from(value: CliTaxType) -> Self {
        match value {
            CliTaxType::TaxFree => TaxType::TaxFree,
            CliTaxType::General => TaxType::General,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiTaxType {
    #[serde(alias = "taxFree", alias = "tax_free")]
    TaxFree,
    General,
}

impl From<ApiTaxType> for CliTaxType {
    fn from(value: ApiTaxType) -> Self {
        match value {
            ApiTaxType::TaxFree => CliTaxType::TaxFree,
            ApiTaxType::General => CliTaxType::General,
        }
    }
}

impl From<TaxType> for ApiTaxType {
    fn from(value: TaxType) -> Self {
        match value {
            TaxType::TaxFree => ApiTaxType::TaxFree,
            TaxType::General => ApiTaxType::General,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    lump_sum: Option<f64>,
    monthly_deposit: Option<f64>,
    adjust_deposit_for_inflation: Option<bool>,
    annual_return: Option<f64>,
    investment_period: Option<u32>,
    inflation_rate: Option<f64>,
    tax_type: Option<ApiTaxType>,
}

#[derive(Parser, Debug)]
#[command(
    name = "snowball",
    about = "Compound-interest projection calculator (lump sum + monthly deposits, inflation and tax aware)"
)]
struct Cli {
    #[arg(long, default_value_t = 10_000_000.0, help = "Initial deposit at time zero")]
    lump_sum: f64,
    #[arg(
        long,
        default_value_t = 1_000_000.0,
        help = "Nominal contribution per month during year 1"
    )]
    monthly_deposit: f64,
    #[arg(
        long,
        help = "Scale each later year's monthly deposit by cumulative inflation"
    )]
    adjust_deposit_for_inflation: bool,
    #[arg(
        long,
        default_value_t = 13.8,
        help = "Expected annual total return in percent, e.g. 13.8"
    )]
    annual_return: f64,
    #[arg(long, default_value_t = 20, help = "Number of years simulated (1-60)")]
    investment_period: u32,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Expected annual inflation in percent"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliTaxType::TaxFree,
        help = "Tax treatment of realized gains: tax-free or general (15.4%)"
    )]
    tax_type: CliTaxType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    lump_sum: f64,
    monthly_deposit: f64,
    adjust_deposit_for_inflation: bool,
    annual_return: f64,
    investment_period: u32,
    inflation_rate: f64,
    tax_type: ApiTaxType,
    #[serde(flatten)]
    projection: Projection,
}

#[derive(Debug, Serialize)]
struct InsightResponse {
    insight: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_params(cli: Cli) -> Result<Params, String> {
    for (name, value) in [
        ("--lump-sum", cli.lump_sum),
        ("--monthly-deposit", cli.monthly_deposit),
        ("--annual-return", cli.annual_return),
        ("--inflation-rate", cli.inflation_rate),
    ] {
        if !value.is_finite() {
            return Err(format!("{name} must be a finite number"));
        }
    }

    if cli.lump_sum < 0.0 {
        return Err("--lump-sum must be >= 0".to_string());
    }

    if cli.monthly_deposit < 0.0 {
        return Err("--monthly-deposit must be >= 0".to_string());
    }

    if !(-100.0..=150.0).contains(&cli.annual_return) {
        return Err("--annual-return must be between -100 and 150".to_string());
    }

    if cli.investment_period == 0 || cli.investment_period > 60 {
        return Err("--investment-period must be between 1 and 60".to_string());
    }

    if cli.inflation_rate <= -100.0 || cli.inflation_rate > 100.0 {
        return Err("--inflation-rate must be between -100 and 100".to_string());
    }

    Ok(Params {
        lump_sum: cli.lump_sum,
        monthly_deposit: cli.monthly_deposit,
        adjust_deposit_for_inflation: cli.adjust_deposit_for_inflation,
        annual_return: cli.annual_return,
        investment_period: cli.investment_period,
        inflation_rate: cli.inflation_rate,
        tax_type: cli.tax_type.into(),
    })
}

/// One-shot mode: parse flags, run a single projection, return it as pretty
/// JSON for stdout.
pub fn run_cli() -> Result<String, String> {
    let cli = Cli::parse();
    let params = build_params(cli)?;
    let response = build_project_response(&params, project(&params));
    serde_json::to_string_pretty(&response).map_err(|e| e.to_string())
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
        .route("/api/insight", post(insight_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("snowball HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

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
    project_handler_impl(payload)
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    let params = match params_from_payload(payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let response = build_project_response(&params, project(&params));
    json_response(StatusCode::OK, response)
}

async fn insight_handler(Json(payload): Json<ProjectPayload>) -> Response {
    let params = match params_from_payload(payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let projection = project(&params);

    // The advisory call is strictly non-fatal: one attempt, and any failure
    // (no key, transport error, malformed body) degrades to the fixed
    // fallback sentence without touching the projection.
    let insight = match InsightClient::from_env() {
        Some(client) => client
            .summarize(&params, &projection)
            .await
            .unwrap_or_else(|e| {
                eprintln!("insight request failed: {e}");
                FALLBACK_INSIGHT.to_string()
            }),
        None => FALLBACK_INSIGHT.to_string(),
    };

    json_response(StatusCode::OK, InsightResponse { insight })
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

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn params_from_json(json: &str) -> Result<Params, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    params_from_payload(payload)
}

fn params_from_payload(payload: ProjectPayload) -> Result<Params, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.lump_sum {
        cli.lump_sum = v;
    }
    if let Some(v) = payload.monthly_deposit {
        cli.monthly_deposit = v;
    }
    if let Some(v) = payload.adjust_deposit_for_inflation {
        cli.adjust_deposit_for_inflation = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.investment_period {
        cli.investment_period = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.tax_type {
        cli.tax_type = v.into();
    }

    build_params(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        lump_sum: 10_000_000.0,
        monthly_deposit: 1_000_000.0,
        adjust_deposit_for_inflation: false,
        annual_return: 13.8,
        investment_period: 20,
        inflation_rate: 4.0,
        tax_type: CliTaxType::TaxFree,
    }
}

fn build_project_response(params: &Params, projection: Projection) -> ProjectResponse {
    ProjectResponse {
        lump_sum: params.lump_sum,
        monthly_deposit: params.monthly_deposit,
        adjust_deposit_for_inflation: params.adjust_deposit_for_inflation,
        annual_return: params.annual_return,
        investment_period: params.investment_period,
        inflation_rate: params.inflation_rate,
        tax_type: params.tax_type.into(),
        projection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_params_accepts_the_defaults() {
        let params = build_params(sample_cli()).expect("defaults must validate");
        assert_approx(params.lump_sum, 10_000_000.0);
        assert_approx(params.monthly_deposit, 1_000_000.0);
        assert!(!params.adjust_deposit_for_inflation);
        assert_approx(params.annual_return, 13.8);
        assert_eq!(params.investment_period, 20);
        assert_approx(params.inflation_rate, 4.0);
        assert_eq!(params.tax_type, TaxType::TaxFree);
    }

    #[test]
    fn build_params_rejects_negative_amounts() {
        let mut cli = sample_cli();
        cli.lump_sum = -1.0;
        let err = build_params(cli).expect_err("must reject negative lump sum");
        assert!(err.contains("--lump-sum"));

        let mut cli = sample_cli();
        cli.monthly_deposit = -0.5;
        let err = build_params(cli).expect_err("must reject negative deposit");
        assert!(err.contains("--monthly-deposit"));
    }

    #[test]
    fn build_params_rejects_out_of_range_return() {
        let mut cli = sample_cli();
        cli.annual_return = 150.5;
        let err = build_params(cli).expect_err("must reject > 150");
        assert!(err.contains("--annual-return"));

        let mut cli = sample_cli();
        cli.annual_return = f64::NAN;
        let err = build_params(cli).expect_err("must reject NaN");
        assert!(err.contains("--annual-return"));
    }

    #[test]
    fn build_params_rejects_out_of_range_period() {
        let mut cli = sample_cli();
        cli.investment_period = 0;
        let err = build_params(cli).expect_err("must reject 0 years");
        assert!(err.contains("--investment-period"));

        let mut cli = sample_cli();
        cli.investment_period = 61;
        let err = build_params(cli).expect_err("must reject > 60 years");
        assert!(err.contains("--investment-period"));
    }

    #[test]
    fn build_params_rejects_out_of_range_inflation() {
        let mut cli = sample_cli();
        cli.inflation_rate = -100.0;
        let err = build_params(cli).expect_err("must reject <= -100 inflation");
        assert!(err.contains("--inflation-rate"));
    }

    #[test]
    fn params_from_json_parses_web_keys() {
        let json = r#"{
          "lumpSum": 5000000,
          "monthlyDeposit": 300000,
          "adjustDepositForInflation": true,
          "annualReturn": 7.5,
          "investmentPeriod": 15,
          "inflationRate": 2.5,
          "taxType": "general"
        }"#;
        let params = params_from_json(json).expect("json should parse");

        assert_approx(params.lump_sum, 5_000_000.0);
        assert_approx(params.monthly_deposit, 300_000.0);
        assert!(params.adjust_deposit_for_inflation);
        assert_approx(params.annual_return, 7.5);
        assert_eq!(params.investment_period, 15);
        assert_approx(params.inflation_rate, 2.5);
        assert_eq!(params.tax_type, TaxType::General);
    }

    #[test]
    fn params_from_json_accepts_tax_type_aliases() {
        for spelling in ["\"tax-free\"", "\"taxFree\"", "\"tax_free\""] {
            let json = format!("{{ \"taxType\": {spelling} }}");
            let params = params_from_json(&json).expect("alias should parse");
            assert_eq!(params.tax_type, TaxType::TaxFree);
        }
    }

    #[test]
    fn params_from_json_falls_back_to_defaults_for_missing_fields() {
        let params = params_from_json(r#"{ "investmentPeriod": 5 }"#).expect("json should parse");
        assert_eq!(params.investment_period, 5);
        assert_approx(params.lump_sum, 10_000_000.0);
        assert_eq!(params.tax_type, TaxType::TaxFree);
    }

    #[test]
    fn params_from_json_surfaces_validation_errors() {
        let err = params_from_json(r#"{ "investmentPeriod": 0 }"#)
            .expect_err("must reject 0 years through the payload path");
        assert!(err.contains("--investment-period"));
    }

    #[test]
    fn project_response_serialization_contains_expected_fields() {
        let params = build_params(sample_cli()).expect("valid params");
        let response = build_project_response(&params, project(&params));
        let json = serde_json::to_string(&response).expect("response should serialize");

        assert!(json.contains("\"lumpSum\""));
        assert!(json.contains("\"taxType\":\"tax-free\""));
        assert!(json.contains("\"totalPrincipal\""));
        assert!(json.contains("\"nominalFutureValue\""));
        assert!(json.contains("\"afterTaxNominalValue\""));
        assert!(json.contains("\"realPurchasingPower\""));
        assert!(json.contains("\"yearlyUsableReal\""));
        assert!(json.contains("\"monthlyUsableReal\""));
        assert!(json.contains("\"chartData\""));
        assert!(json.contains("\"nominalValue\""));
    }

    #[test]
    fn project_response_chart_matches_the_period() {
        let mut cli = sample_cli();
        cli.investment_period = 7;
        let params = build_params(cli).expect("valid params");
        let response = build_project_response(&params, project(&params));
        assert_eq!(response.projection.chart_data.len(), 8);
        assert_eq!(response.investment_period, 7);
    }
}
