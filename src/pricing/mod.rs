#[cfg(test)]
mod tests;

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Multiplicative commercial markup applied to every raw provider cost.
pub const MARGIN: f64 = 1.3;

/// Fallback rate for models absent from the table, USD per 1M tokens.
pub const DEFAULT_RATE: Rate = Rate {
    input: 0.10,
    output: 0.30,
};

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

/// USD per 1M tokens, input and output priced separately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rate {
    pub input: f64,
    pub output: f64,
}

/// Static rate table: provider -> model -> per-1M-token rates.
/// BTreeMap keeps serialization and scan order deterministic.
pub static PRICING_TABLE: Lazy<BTreeMap<&'static str, BTreeMap<&'static str, Rate>>> =
    Lazy::new(|| {
        let mut providers = BTreeMap::new();

        let mut openai = BTreeMap::new();
        openai.insert("gpt-4o", Rate { input: 2.50, output: 10.00 });
        openai.insert("gpt-4o-mini", Rate { input: 0.15, output: 0.60 });
        openai.insert("gpt-4-turbo", Rate { input: 10.00, output: 30.00 });
        openai.insert("gpt-3.5-turbo", Rate { input: 0.50, output: 1.50 });
        providers.insert("openai", openai);

        let mut groq = BTreeMap::new();
        groq.insert("llama-3.3-70b-versatile", Rate { input: 0.59, output: 0.79 });
        groq.insert("llama-3.1-8b-instant", Rate { input: 0.05, output: 0.08 });
        groq.insert("mixtral-8x7b-32768", Rate { input: 0.24, output: 0.24 });
        groq.insert("gemma2-9b-it", Rate { input: 0.20, output: 0.20 });
        providers.insert("groq", groq);

        let mut anthropic = BTreeMap::new();
        anthropic.insert("claude-3-5-sonnet", Rate { input: 3.00, output: 15.00 });
        anthropic.insert("claude-3-5-haiku", Rate { input: 0.80, output: 4.00 });
        anthropic.insert("claude-3-haiku", Rate { input: 0.25, output: 1.25 });
        providers.insert("anthropic", anthropic);

        let mut gemini = BTreeMap::new();
        gemini.insert("gemini-1.5-pro", Rate { input: 1.25, output: 5.00 });
        gemini.insert("gemini-1.5-flash", Rate { input: 0.075, output: 0.30 });
        gemini.insert("gemini-2.0-flash", Rate { input: 0.10, output: 0.40 });
        providers.insert("gemini", gemini);

        providers
    });

/// How the rate for a requested model was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateMatch {
    Exact,
    /// Substring match against a known model key.
    Fuzzy(&'static str),
    /// Unknown provider or model; [`DEFAULT_RATE`] applied.
    Default,
}

/// Margin-scaled cost components. `input_cost + output_cost` equals the
/// final cost; `margin` is the markup portion of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub cost_usd: f64,
    pub breakdown: CostBreakdown,
    pub rate: Rate,
    pub matched: RateMatch,
}

impl CostEstimate {
    pub fn note(&self) -> String {
        match &self.matched {
            RateMatch::Exact => "Exact model rate, 30% service margin included.".to_string(),
            RateMatch::Fuzzy(key) => {
                format!("Rate matched from '{}', 30% service margin included.", key)
            }
            RateMatch::Default => {
                "Unknown model; default fallback rate applied, 30% service margin included."
                    .to_string()
            }
        }
    }
}

/// Find the per-token rate for a provider/model pair.
///
/// Lookup order: exact model key, then substring match (either direction)
/// scanning known keys longest-first so versioned or suffixed model names
/// resolve deterministically, then the default rate.
fn resolve_rate(provider: &str, model: &str) -> (Rate, RateMatch) {
    let provider_lc = provider.to_lowercase();
    let model_lc = model.to_lowercase();

    let Some(models) = PRICING_TABLE.get(provider_lc.as_str()) else {
        warn!(provider, model, "Unknown provider in pricing lookup, using default rate");
        return (DEFAULT_RATE, RateMatch::Default);
    };

    if let Some(rate) = models.get(model_lc.as_str()) {
        return (*rate, RateMatch::Exact);
    }

    let mut keys: Vec<&'static str> = models.keys().copied().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    for key in keys {
        if model_lc.contains(key) || key.contains(model_lc.as_str()) {
            return (models[key], RateMatch::Fuzzy(key));
        }
    }

    warn!(provider, model, "Unknown model in pricing lookup, using default rate");
    (DEFAULT_RATE, RateMatch::Default)
}

/// Compute the billed cost for a token usage. Pure and deterministic;
/// never fails, unknown models fall back to the default rate.
pub fn calculate_cost(
    provider: &str,
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
) -> CostEstimate {
    let (rate, matched) = resolve_rate(provider, model);

    let input_base = (input_tokens as f64 / TOKENS_PER_UNIT) * rate.input;
    let output_base = (output_tokens as f64 / TOKENS_PER_UNIT) * rate.output;

    // Each component is margin-scaled individually so the breakdown sums
    // to the final figure.
    let input_cost = input_base * MARGIN;
    let output_cost = output_base * MARGIN;
    let cost_usd = input_cost + output_cost;

    CostEstimate {
        cost_usd,
        breakdown: CostBreakdown {
            input_cost,
            output_cost,
            margin: (input_base + output_base) * (MARGIN - 1.0),
        },
        rate,
        matched,
    }
}
