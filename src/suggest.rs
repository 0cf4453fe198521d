//! Generative detail suggestions for grocery items.
//!
//! Given an item name and a currency code, a model call guesses a
//! common quantity, unit, brand, and unit price. The call is strictly
//! best-effort: any failure is recoverable and the add-item flow falls
//! back to manual entry. Names shorter than three characters get a
//! fixed default without spending a model call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::Unit;

/// Minimum name length worth a model call.
const MIN_NAME_LEN: usize = 3;

/// Prompt sent for every suggestion request.
const PROMPT_TEMPLATE: &str = "You are an intelligent grocery list assistant. Based on the item \
name provided, suggest a common quantity, a suitable unit, a popular brand, and an estimated \
price in the specified currency.\n\nFor the unit, please choose from the following list: 'pcs', \
'kg', 'g', 'ltr', 'ml', 'pack', 'dozen'.\n\nIf you don't know a good brand or price, you can \
leave it blank or use a reasonable estimate.\n\nRespond with a JSON object with keys \
\"quantity\", \"unit\", \"brand\" and \"price\".\n\nItem Name: {name}\nCurrency: {currency}";

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("suggestion backend failed: {0}")]
    Backend(String),
    #[error("suggestion did not match the expected schema: {0}")]
    InvalidResponse(String),
}

/// A structured guess for a grocery item's details.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SuggestedDetails {
    pub quantity: f64,
    pub unit: Unit,
    pub brand: String,
    pub price: f64,
}

impl SuggestedDetails {
    /// The fixed fallback used when input is too short to be
    /// meaningful.
    pub fn default_guess() -> Self {
        Self {
            quantity: 1.0,
            unit: Unit::Pcs,
            brand: String::new(),
            price: 0.0,
        }
    }
}

/// Model endpoint seam; tests substitute a canned backend.
#[async_trait]
pub trait SuggestionBackend: Send + Sync {
    /// Run one completion and return the model's JSON output.
    async fn complete(&self, prompt: &str) -> Result<Value, SuggestionError>;
}

/// HTTP backend posting the prompt to the suggestion endpoint.
pub struct HttpSuggestionBackend {
    url: String,
    api_key: String,
    http: reqwest::Client,
}

impl HttpSuggestionBackend {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            url,
            api_key,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SuggestionBackend for HttpSuggestionBackend {
    async fn complete(&self, prompt: &str) -> Result<Value, SuggestionError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "prompt": prompt, "format": "json" }))
            .send()
            .await
            .map_err(|e| SuggestionError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SuggestionError::Backend(format!(
                "server returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SuggestionError::Backend(e.to_string()))
    }
}

/// Suggests item details via a [`SuggestionBackend`].
pub struct Suggester {
    backend: Arc<dyn SuggestionBackend>,
}

impl Suggester {
    pub fn new(backend: Arc<dyn SuggestionBackend>) -> Self {
        Self { backend }
    }

    /// Suggest details for `name`, pricing in `currency`.
    ///
    /// Short names return the fixed default without any backend call;
    /// a well-formed model response is returned unmodified.
    pub async fn suggest(
        &self,
        name: &str,
        currency: &str,
    ) -> Result<SuggestedDetails, SuggestionError> {
        if name.chars().count() < MIN_NAME_LEN {
            debug!(name = %name, "name too short, returning default suggestion");
            return Ok(SuggestedDetails::default_guess());
        }

        let prompt = PROMPT_TEMPLATE
            .replace("{name}", name)
            .replace("{currency}", currency);
        let output = self.backend.complete(&prompt).await?;
        validate(output)
    }
}

/// Schema-validate the model output.
fn validate(output: Value) -> Result<SuggestedDetails, SuggestionError> {
    let details: SuggestedDetails = serde_json::from_value(output)
        .map_err(|e| SuggestionError::InvalidResponse(e.to_string()))?;

    if !details.quantity.is_finite() || details.quantity < 0.0 {
        return Err(SuggestionError::InvalidResponse(format!(
            "quantity {} out of range",
            details.quantity
        )));
    }
    if !details.price.is_finite() || details.price < 0.0 {
        return Err(SuggestionError::InvalidResponse(format!(
            "price {} out of range",
            details.price
        )));
    }
    Ok(details)
}
