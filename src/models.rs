//! Data models for the evaluation dashboard.
//!
//! This module contains the stored evaluation records, the per-user
//! settings, and the derived structures produced by aggregation.

use crate::error::{DashError, Result};
use crate::privacy::obfuscate;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores at or above this value count as a successful evaluation.
pub const SUCCESS_THRESHOLD: f64 = 0.7;

/// A single stored evaluation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Opaque unique identifier assigned by the store.
    pub id: String,
    /// Owner of the record.
    pub user_id: String,
    /// Caller-supplied correlation key.
    pub interaction_id: String,
    /// Prompt sent to the agent.
    pub prompt: String,
    /// Response produced by the agent.
    pub response: String,
    /// Evaluation score, nominally in [0.0, 1.0].
    pub score: f64,
    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
    /// Free-form labels attached at ingest.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Number of PII tokens redacted before storage.
    #[serde(default)]
    pub pii_tokens_redacted: u64,
    /// RFC 3339 timestamp exactly as stored.
    pub created_at: String,
}

impl EvaluationRecord {
    /// Parses the stored creation timestamp.
    pub fn created_at(&self) -> Result<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.created_at).map_err(|_| DashError::MalformedRecord {
            id: self.id.clone(),
            value: self.created_at.clone(),
        })
    }

    /// Returns true if the score meets the success threshold.
    pub fn is_success(&self) -> bool {
        self.score >= SUCCESS_THRESHOLD
    }
}

/// A validated ingest payload, before the store assigns identity and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvaluation {
    pub interaction_id: String,
    pub prompt: String,
    pub response: String,
    pub score: f64,
    pub latency_ms: u64,
    pub flags: Vec<String>,
    pub pii_tokens_redacted: u64,
}

impl NewEvaluation {
    /// Turns the payload into a stored record.
    pub fn into_record(
        self,
        id: String,
        user_id: String,
        created_at: DateTime<Utc>,
    ) -> EvaluationRecord {
        EvaluationRecord {
            id,
            user_id,
            interaction_id: self.interaction_id,
            prompt: self.prompt,
            response: self.response,
            score: self.score,
            latency_ms: self.latency_ms,
            flags: self.flags,
            pii_tokens_redacted: self.pii_tokens_redacted,
            created_at: created_at.to_rfc3339(),
        }
    }
}

/// Aggregated values for one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub count: usize,
    pub avg_score: f64,
    pub avg_latency_ms: f64,
}

/// Summary statistics over a whole window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Number of records in the window.
    pub total: usize,
    /// Mean score, 0 when empty.
    pub avg_score: f64,
    /// Mean latency in milliseconds, 0 when empty.
    pub avg_latency_ms: f64,
    /// Percentage of records at or above [`SUCCESS_THRESHOLD`].
    pub success_rate_pct: f64,
}

/// Result of one aggregation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Window the records were selected for, in days.
    pub window_days: u32,
    pub summary: SummaryStats,
    /// One point per distinct date, oldest first.
    pub trend: Vec<TrendPoint>,
}

/// Metadata about a dashboard report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Owner the report was generated for.
    pub user_id: String,
    /// Trailing window, in days.
    pub window_days: u32,
    /// Date and time of generation.
    pub generated_at: DateTime<Utc>,
    /// Store the records were read from.
    pub source: String,
}

/// A complete dashboard: statistics, trend and the latest records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub aggregation: Aggregation,
    /// Most recent evaluations, newest first, prepared for display.
    pub recent: Vec<EvaluationView>,
}

/// A single evaluation prepared for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationView {
    /// The record, with prompt and response already obfuscated if requested.
    pub evaluation: EvaluationRecord,
    /// Whether PII obfuscation was applied.
    pub obfuscated: bool,
}

impl EvaluationView {
    /// Prepare `record` for display under the owner's obfuscation setting.
    pub fn new(record: EvaluationRecord, obfuscate_pii: bool) -> Self {
        let evaluation = EvaluationRecord {
            prompt: obfuscate(&record.prompt, obfuscate_pii),
            response: obfuscate(&record.response, obfuscate_pii),
            ..record
        };
        Self {
            evaluation,
            obfuscated: obfuscate_pii,
        }
    }
}

/// When evaluations should be run for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPolicy {
    /// Evaluate every interaction.
    #[default]
    Always,
    /// Evaluate a percentage of interactions.
    Sampled,
}

impl fmt::Display for RunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPolicy::Always => write!(f, "always"),
            RunPolicy::Sampled => write!(f, "sampled"),
        }
    }
}

/// Per-user evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub run_policy: RunPolicy,

    /// Percentage of interactions evaluated when sampled.
    #[serde(default = "default_sample_rate")]
    pub sample_rate_pct: u8,

    /// Redact PII when displaying prompts and responses.
    #[serde(default)]
    pub obfuscate_pii: bool,

    #[serde(default = "default_max_eval_per_day")]
    pub max_eval_per_day: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            run_policy: RunPolicy::default(),
            sample_rate_pct: default_sample_rate(),
            obfuscate_pii: false,
            max_eval_per_day: default_max_eval_per_day(),
            updated_at: None,
        }
    }
}

fn default_sample_rate() -> u8 {
    100
}

fn default_max_eval_per_day() -> u32 {
    1000
}

impl UserSettings {
    /// Checks that numeric settings are within range.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_pct > 100 {
            return Err(DashError::InvalidSettings(format!(
                "sample_rate_pct must be between 0 and 100, got {}",
                self.sample_rate_pct
            )));
        }
        if self.max_eval_per_day == 0 {
            return Err(DashError::InvalidSettings(
                "max_eval_per_day must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(created_at: &str) -> EvaluationRecord {
        EvaluationRecord {
            id: "rec-1".to_string(),
            user_id: "user-1".to_string(),
            interaction_id: "int_1".to_string(),
            prompt: "What is machine learning?".to_string(),
            response: "A subset of AI.".to_string(),
            score: 0.7,
            latency_ms: 120,
            flags: Vec::new(),
            pii_tokens_redacted: 0,
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_created_at_parsing() {
        let rec = record("2024-03-01T10:15:00+02:00");
        let ts = rec.created_at().unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 2 * 3600);

        let bad = record("last tuesday");
        match bad.created_at() {
            Err(DashError::MalformedRecord { id, value }) => {
                assert_eq!(id, "rec-1");
                assert_eq!(value, "last tuesday");
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_success_threshold_is_inclusive() {
        let mut rec = record("2024-03-01T10:15:00Z");
        assert!(rec.is_success());
        rec.score = 0.699_999;
        assert!(!rec.is_success());
    }

    #[test]
    fn test_record_defaults_on_deserialize() {
        let json = r#"{
            "id": "a", "user_id": "u", "interaction_id": "i",
            "prompt": "p", "response": "r", "score": 0.9,
            "latency_ms": 10, "created_at": "2024-03-01T00:00:00Z"
        }"#;
        let rec: EvaluationRecord = serde_json::from_str(json).unwrap();
        assert!(rec.flags.is_empty());
        assert_eq!(rec.pii_tokens_redacted, 0);
    }

    #[test]
    fn test_settings_defaults_and_validation() {
        let settings: UserSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, UserSettings::default());
        assert_eq!(settings.run_policy, RunPolicy::Always);
        assert_eq!(settings.sample_rate_pct, 100);
        assert!(!settings.obfuscate_pii);
        assert_eq!(settings.max_eval_per_day, 1000);
        assert!(settings.validate().is_ok());

        let too_high = UserSettings {
            sample_rate_pct: 101,
            ..UserSettings::default()
        };
        assert!(too_high.validate().is_err());

        let zero_cap = UserSettings {
            max_eval_per_day: 0,
            ..UserSettings::default()
        };
        assert!(zero_cap.validate().is_err());
    }

    #[test]
    fn test_evaluation_view_obfuscation() {
        let mut rec = record("2024-03-01T10:15:00Z");
        rec.prompt = "Email Jane Doe at jane@example.com".to_string();
        rec.response = "Call 555-123-4567".to_string();

        let plain = EvaluationView::new(rec.clone(), false);
        assert!(!plain.obfuscated);
        assert_eq!(plain.evaluation, rec);

        let redacted = EvaluationView::new(rec, true);
        assert!(redacted.obfuscated);
        assert_eq!(redacted.evaluation.prompt, "Email [NAME] at [EMAIL]");
        assert_eq!(redacted.evaluation.response, "Call [PHONE]");
        assert_eq!(redacted.evaluation.id, "rec-1");
    }

    #[test]
    fn test_run_policy_serde() {
        let json = serde_json::to_string(&RunPolicy::Sampled).unwrap();
        assert_eq!(json, "\"sampled\"");
        assert_eq!(RunPolicy::Always.to_string(), "always");
    }
}
