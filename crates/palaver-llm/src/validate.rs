//! Configuration validation against the capability registry.
//!
//! Runs before any network call. Collects *every* violated rule in one pass
//! so the settings UI can show the complete list, not just the first hit.

use std::ops::RangeInclusive;

use crate::capability::{PENALTY_RANGE, capabilities};
use crate::config::ServiceConfig;
use crate::vendor::VendorId;

/// The outcome of validating one [`ServiceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check a candidate configuration against the capability registry.
///
/// Checks, in order: credential presence, model id presence, each supplied
/// numeric parameter against its registered range, then vendor-specific
/// cross-parameter rules. Out-of-range values are errors, never clamped.
pub fn validate(config: &ServiceConfig) -> ValidationReport {
    let caps = capabilities(config.vendor);
    let mut errors = Vec::new();

    if caps.requires_credential && config.credential.trim().is_empty() {
        errors.push(format!("{}: credential is required", config.vendor));
    }

    if config.model.trim().is_empty() {
        errors.push(format!("{}: model id must not be empty", config.vendor));
    }

    check_range(
        &mut errors,
        config.vendor,
        "temperature",
        config.temperature,
        &caps.temperature,
    );
    check_range(&mut errors, config.vendor, "top_p", config.top_p, &caps.top_p);
    check_range(
        &mut errors,
        config.vendor,
        "frequency_penalty",
        config.frequency_penalty,
        &PENALTY_RANGE,
    );
    check_range(
        &mut errors,
        config.vendor,
        "presence_penalty",
        config.presence_penalty,
        &PENALTY_RANGE,
    );

    if let Some(max) = config.max_output_tokens
        && !caps.max_output_tokens.contains(&max)
    {
        errors.push(format!(
            "{}: max_output_tokens {} outside allowed range {}..={}",
            config.vendor,
            max,
            caps.max_output_tokens.start(),
            caps.max_output_tokens.end()
        ));
    }

    // Anthropic rejects requests that pin both samplers; flag it here
    // instead of silently preferring one.
    if config.vendor == VendorId::Claude
        && config.temperature.is_some()
        && config.top_p.is_some()
    {
        errors.push(format!(
            "{}: temperature and top_p cannot both be set",
            config.vendor
        ));
    }

    ValidationReport::from_errors(errors)
}

fn check_range(
    errors: &mut Vec<String>,
    vendor: VendorId,
    name: &str,
    value: Option<f64>,
    range: &RangeInclusive<f64>,
) {
    if let Some(v) = value
        && !range.contains(&v)
    {
        errors.push(format!(
            "{vendor}: {name} {v} outside allowed range {}..={}",
            range.start(),
            range.end()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(vendor: VendorId) -> ServiceConfig {
        let mut config = ServiceConfig::new(vendor, capabilities(vendor).default_model);
        config.credential = "test-credential".into();
        config
    }

    #[test]
    fn minimal_valid_config_passes() {
        for vendor in VendorId::ALL {
            let report = validate(&valid_config(vendor));
            assert!(report.valid, "{vendor}: {:?}", report.errors);
            assert!(report.errors.is_empty());
        }
    }

    #[test]
    fn missing_credential_fails_where_required() {
        let mut config = valid_config(VendorId::OpenAi);
        config.credential = String::new();
        let report = validate(&config);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("credential is required"));
    }

    #[test]
    fn whitespace_credential_counts_as_missing() {
        let mut config = valid_config(VendorId::Grok);
        config.credential = "   ".into();
        assert!(!validate(&config).valid);
    }

    #[test]
    fn ollama_accepts_empty_credential() {
        let mut config = ServiceConfig::new(VendorId::Ollama, "llama3.1");
        config.credential = String::new();
        let report = validate(&config);
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn out_of_range_temperature_is_an_error_not_a_clamp() {
        let mut config = valid_config(VendorId::OpenAi);
        config.temperature = Some(5.0);
        let report = validate(&config);
        assert!(!report.valid);
        assert!(report.errors[0].contains("temperature 5"));
    }

    #[test]
    fn boundary_values_are_legal() {
        let mut config = valid_config(VendorId::OpenAi);
        config.temperature = Some(2.0);
        config.top_p = Some(0.0);
        assert!(validate(&config).valid);
    }

    #[test]
    fn all_violations_reported_in_one_pass() {
        // Empty required credential AND out-of-range temperature must yield
        // two distinct errors, not just the first.
        let mut config = ServiceConfig::new(VendorId::OpenAi, "gpt-4o");
        config.temperature = Some(5.0);
        let report = validate(&config);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().any(|e| e.contains("credential")));
        assert!(report.errors.iter().any(|e| e.contains("temperature")));
    }

    #[test]
    fn claude_rejects_temperature_and_top_p_together() {
        let mut config = valid_config(VendorId::Claude);
        config.temperature = Some(0.5);
        config.top_p = Some(0.9);
        let report = validate(&config);
        assert!(!report.valid);
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.contains("temperature and top_p cannot both be set"))
        );
    }

    #[test]
    fn claude_accepts_either_sampler_alone() {
        let mut config = valid_config(VendorId::Claude);
        config.temperature = Some(0.5);
        assert!(validate(&config).valid);

        let mut config = valid_config(VendorId::Claude);
        config.top_p = Some(0.9);
        assert!(validate(&config).valid);
    }

    #[test]
    fn other_vendors_allow_both_samplers() {
        let mut config = valid_config(VendorId::OpenAi);
        config.temperature = Some(0.5);
        config.top_p = Some(0.9);
        assert!(validate(&config).valid);
    }

    #[test]
    fn penalties_checked_against_shared_range() {
        let mut config = valid_config(VendorId::OpenAi);
        config.frequency_penalty = Some(-3.0);
        config.presence_penalty = Some(2.5);
        let report = validate(&config);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn max_output_tokens_zero_rejected() {
        let mut config = valid_config(VendorId::Gemini);
        config.max_output_tokens = Some(0);
        let report = validate(&config);
        assert!(!report.valid);
        assert!(report.errors[0].contains("max_output_tokens"));
    }

    #[test]
    fn empty_model_rejected() {
        let mut config = valid_config(VendorId::Qwen);
        config.model = "  ".into();
        let report = validate(&config);
        assert!(report.errors.iter().any(|e| e.contains("model id")));
    }
}
