use std::fmt;

use serde_json::{Value, json};

use crate::core::{Params, Projection, TaxType};

/// Shown to the user whenever the advisory call cannot produce text. The
/// projection itself is never affected by this path.
pub const FALLBACK_INSIGHT: &str =
    "The AI insight service is currently unavailable. Please try again later.";

const GENERATE_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-flash-preview:generateContent";

#[derive(Debug)]
pub enum InsightError {
    ServiceUnavailable(String),
}

impl fmt::Display for InsightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightError::ServiceUnavailable(reason) => {
                write!(f, "insight service unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for InsightError {}

/// Thin client for the generative-text service that turns a projection into a
/// short natural-language commentary. One attempt per request, no retries;
/// every failure mode collapses into `ServiceUnavailable` so callers can
/// substitute [`FALLBACK_INSIGHT`] without inspecting the cause.
pub struct InsightClient {
    http: reqwest::Client,
    api_key: String,
}

impl InsightClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Builds a client from `GEMINI_API_KEY`, or `None` when no key is set.
    pub fn from_env() -> Option<Self> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(Self::new)
    }

    pub async fn summarize(
        &self,
        params: &Params,
        projection: &Projection,
    ) -> Result<String, InsightError> {
        let response = self
            .http
            .post(GENERATE_ENDPOINT)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(params, projection))
            .send()
            .await
            .map_err(|e| InsightError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InsightError::ServiceUnavailable(format!(
                "upstream returned {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InsightError::ServiceUnavailable(e.to_string()))?;
        extract_text(&body).ok_or_else(|| {
            InsightError::ServiceUnavailable("response carried no candidate text".to_string())
        })
    }
}

fn request_body(params: &Params, projection: &Projection) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": build_prompt(params, projection) }] }],
        "generationConfig": { "temperature": 0.7, "topP": 0.95 }
    })
}

/// Renders the parameter set and the projection outcome into the advisory
/// prompt. Pure, so the prompt shape is testable without the network.
pub fn build_prompt(params: &Params, projection: &Projection) -> String {
    let tax_label = match params.tax_type {
        TaxType::TaxFree => "tax-free",
        TaxType::General => "general (15.4% on gains)",
    };

    format!(
        "As a professional wealth manager, give a concise analysis of the \
         following investment plan in three to four sentences, in a friendly \
         and professional tone.\n\
         \n\
         Plan:\n\
         - Lump sum: {lump}\n\
         - Monthly deposit: {deposit} (inflation-adjusted: {adjusted})\n\
         - Expected annual return: {return_rate}%\n\
         - Investment period: {period} years\n\
         - Expected annual inflation: {inflation}%\n\
         - Tax treatment: {tax_label}\n\
         \n\
         Projection:\n\
         - Final after-tax nominal value: {after_tax}\n\
         - Final real purchasing power (present-day terms): {real}\n\
         - Sustainable monthly amount in real terms: {monthly_usable}\n\
         \n\
         Help the reader understand the impact of inflation and encourage \
         them to make the most of long-term compounding.",
        lump = format_amount(params.lump_sum),
        deposit = format_amount(params.monthly_deposit),
        adjusted = if params.adjust_deposit_for_inflation { "yes" } else { "no" },
        return_rate = params.annual_return,
        period = params.investment_period,
        inflation = params.inflation_rate,
        after_tax = format_amount(projection.after_tax_nominal_value),
        real = format_amount(projection.real_purchasing_power),
        monthly_usable = format_amount(projection.monthly_usable_real),
    )
}

fn extract_text(body: &Value) -> Option<String> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Whole currency units with thousands separators, e.g. 1234567 -> "1,234,567".
fn format_amount(value: f64) -> String {
    let negative = value < 0.0;
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project;

    fn sample_params() -> Params {
        Params {
            lump_sum: 10_000_000.0,
            monthly_deposit: 1_000_000.0,
            adjust_deposit_for_inflation: false,
            annual_return: 13.8,
            investment_period: 20,
            inflation_rate: 4.0,
            tax_type: TaxType::TaxFree,
        }
    }

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1_000.0), "1,000");
        assert_eq!(format_amount(250_000_000.0), "250,000,000");
        assert_eq!(format_amount(-12_345.0), "-12,345");
    }

    #[test]
    fn prompt_carries_the_plan_and_the_projection() {
        let params = sample_params();
        let projection = project(&params);
        let prompt = build_prompt(&params, &projection);

        assert!(prompt.contains("10,000,000"));
        assert!(prompt.contains("13.8%"));
        assert!(prompt.contains("20 years"));
        assert!(prompt.contains("inflation-adjusted: no"));
        assert!(prompt.contains("tax-free"));
        assert!(prompt.contains(&format_amount(projection.real_purchasing_power)));
    }

    #[test]
    fn request_body_pins_the_sampling_config() {
        let params = sample_params();
        let projection = project(&params);
        let body = request_body(&params, &projection);

        assert_eq!(body["generationConfig"]["temperature"], 0.7);
        assert_eq!(body["generationConfig"]["topP"], 0.95);
        assert!(
            body["contents"][0]["parts"][0]["text"]
                .as_str()
                .is_some_and(|text| text.contains("wealth manager"))
        );
    }

    #[test]
    fn extract_text_reads_the_first_candidate() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "  Keep compounding.  " }] }
            }]
        });
        assert_eq!(extract_text(&body).as_deref(), Some("Keep compounding."));
    }

    #[test]
    fn extract_text_rejects_empty_or_malformed_responses() {
        assert_eq!(extract_text(&serde_json::json!({})), None);
        assert_eq!(
            extract_text(&serde_json::json!({ "candidates": [] })),
            None
        );
        let blank = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "   " }] } }]
        });
        assert_eq!(extract_text(&blank), None);
    }
}
