use super::*;

#[test]
fn test_margin_on_known_rate() {
    // gpt-4o-mini: $0.15 in / $0.60 out per 1M tokens.
    let estimate = calculate_cost("OpenAI", "gpt-4o-mini", 1_000_000, 1_000_000);
    let expected = (0.15 + 0.60) * MARGIN;
    assert!((estimate.cost_usd - expected).abs() < 1e-9);
    assert!((estimate.cost_usd - 0.975).abs() < 1e-9);
    assert_eq!(estimate.matched, RateMatch::Exact);
}

#[test]
fn test_breakdown_sums_to_total() {
    let estimate = calculate_cost("Groq", "llama-3.1-8b-instant", 123_456, 654_321);
    let sum = estimate.breakdown.input_cost + estimate.breakdown.output_cost;
    assert!((sum - estimate.cost_usd).abs() < 1e-12);

    let base = estimate.cost_usd / MARGIN;
    assert!((estimate.breakdown.margin - (estimate.cost_usd - base)).abs() < 1e-9);
}

#[test]
fn test_deterministic() {
    let a = calculate_cost("Anthropic", "claude-3-5-sonnet", 10_000, 20_000);
    let b = calculate_cost("Anthropic", "claude-3-5-sonnet", 10_000, 20_000);
    assert_eq!(a, b);
}

#[test]
fn test_substring_match_versioned_model() {
    // Suffixed identifiers resolve to the longest matching known key.
    let estimate = calculate_cost("OpenAI", "gpt-4o-mini-2024-07-18", 1_000_000, 0);
    assert_eq!(estimate.matched, RateMatch::Fuzzy("gpt-4o-mini"));
    assert!((estimate.rate.input - 0.15).abs() < 1e-12);

    // "gpt-4o-mini-..." must not fall back to the shorter "gpt-4o" key.
    let plain = calculate_cost("OpenAI", "gpt-4o-2024-08-06", 1_000_000, 0);
    assert_eq!(plain.matched, RateMatch::Fuzzy("gpt-4o"));
}

#[test]
fn test_unknown_model_falls_back_to_default() {
    let estimate = calculate_cost("OpenAI", "some-future-model", 1_000_000, 1_000_000);
    assert_eq!(estimate.matched, RateMatch::Default);
    let expected = (DEFAULT_RATE.input + DEFAULT_RATE.output) * MARGIN;
    assert!((estimate.cost_usd - expected).abs() < 1e-9);
}

#[test]
fn test_unknown_provider_falls_back_to_default() {
    let estimate = calculate_cost("nonexistent", "whatever", 500_000, 0);
    assert_eq!(estimate.matched, RateMatch::Default);
    assert!((estimate.cost_usd - 0.5 * DEFAULT_RATE.input * MARGIN).abs() < 1e-9);
}

#[test]
fn test_provider_lookup_is_case_insensitive() {
    let upper = calculate_cost("GROQ", "mixtral-8x7b-32768", 1_000, 1_000);
    let lower = calculate_cost("groq", "mixtral-8x7b-32768", 1_000, 1_000);
    assert_eq!(upper, lower);
    assert_eq!(upper.matched, RateMatch::Exact);
}

#[test]
fn test_zero_tokens_cost_nothing() {
    let estimate = calculate_cost("OpenAI", "gpt-4o", 0, 0);
    assert_eq!(estimate.cost_usd, 0.0);
    assert_eq!(estimate.breakdown.margin, 0.0);
}
