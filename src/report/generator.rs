//! Markdown and JSON report generation.
//!
//! Aggregates arrive at full precision; all rounding for display
//! (scores to 2 decimals, latency to whole milliseconds, success rate to
//! 1 decimal) happens here.

use crate::models::{
    DashboardReport, EvaluationRecord, EvaluationView, ReportMetadata, SummaryStats, TrendPoint,
};
use anyhow::Result;
use chrono::{DateTime, Local};

/// Generate a complete Markdown dashboard.
pub fn generate_markdown_dashboard(report: &DashboardReport) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# EvalDash Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.aggregation.summary));
    output.push_str(&generate_trend_section(&report.aggregation.trend));
    output.push_str(&generate_recent_section(&report.recent));
    output.push_str(&generate_footer());

    output
}

/// Generate a JSON dashboard.
pub fn generate_json_dashboard(report: &DashboardReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **User:** {}\n", metadata.user_id));
    section.push_str(&format!(
        "- **Window:** last {} day{}\n",
        metadata.window_days,
        if metadata.window_days == 1 { "" } else { "s" }
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push('\n');

    section
}

/// Generate the stat cards.
fn generate_summary_section(summary: &SummaryStats) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Total Evaluations | Avg Score | Avg Latency | Success Rate |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        summary.total,
        format_score(summary.avg_score),
        format_latency(summary.avg_latency_ms),
        format_rate(summary.success_rate_pct)
    ));

    section
}

/// Generate the daily score/latency trend table.
fn generate_trend_section(trend: &[TrendPoint]) -> String {
    let mut section = String::new();

    section.push_str("## Daily Trend\n\n");

    if trend.is_empty() {
        section.push_str("No evaluation data yet. ");
        section.push_str("Use `evaldash ingest` to add evaluations.\n\n");
        return section;
    }

    section.push_str("| Date | Evaluations | Avg Score | Avg Latency |\n");
    section.push_str("|:---|:---:|:---:|:---:|\n");

    for point in trend {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            point.date.format("%Y-%m-%d"),
            point.count,
            format_score(point.avg_score),
            format_latency(point.avg_latency_ms)
        ));
    }
    section.push('\n');

    section
}

/// Generate the recent evaluations table.
fn generate_recent_section(recent: &[EvaluationView]) -> String {
    if recent.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recent Evaluations\n\n");
    section.push_str("| ID | Interaction | Score | Latency | Flags | Date |\n");
    section.push_str("|:---|:---|:---:|:---:|:---|:---|\n");

    for view in recent {
        let record = &view.evaluation;
        let interaction: String = record.interaction_id.chars().take(12).collect();
        section.push_str(&format!(
            "| `{}` | {} | {} | {}ms | {} | {} |\n",
            record.id,
            interaction,
            score_badge(record),
            record.latency_ms,
            format_flags(&record.flags),
            format_timestamp(record)
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by EvalDash*\n".to_string()
}

/// Generate a Markdown detail view of one evaluation.
pub fn generate_markdown_detail(view: &EvaluationView) -> String {
    let record = &view.evaluation;
    let mut output = String::new();

    output.push_str("# Evaluation Details\n\n");

    output.push_str("## Overview\n\n");
    output.push_str(&format!("- **ID:** `{}`\n", record.id));
    output.push_str(&format!("- **Interaction ID:** `{}`\n", record.interaction_id));
    output.push_str(&format!("- **Score:** {}\n", score_badge(record)));
    output.push_str(&format!("- **Latency:** {}ms\n", record.latency_ms));
    output.push_str(&format!("- **Date:** {}\n\n", format_timestamp(record)));

    if record.pii_tokens_redacted > 0 {
        output.push_str(&format!(
            "> 🔒 {} PII token(s) redacted\n\n",
            record.pii_tokens_redacted
        ));
    }

    if !record.flags.is_empty() {
        output.push_str(&format!("> ⚠️ Flags: {}\n\n", record.flags.join(", ")));
    }

    output.push_str(&generate_text_block("Prompt", &record.prompt, view.obfuscated));
    output.push_str(&generate_text_block("Response", &record.response, view.obfuscated));

    output
}

/// Generate a JSON detail view.
pub fn generate_json_detail(view: &EvaluationView) -> Result<String> {
    serde_json::to_string_pretty(view).map_err(Into::into)
}

fn generate_text_block(title: &str, text: &str, obfuscated: bool) -> String {
    let mut block = String::new();

    block.push_str(&format!("## {}\n\n```text\n{}\n```\n\n", title, text));
    if obfuscated {
        block.push_str("*PII obfuscation is enabled*\n\n");
    }

    block
}

fn format_score(score: f64) -> String {
    format!("{:.2}", score)
}

fn format_latency(latency_ms: f64) -> String {
    format!("{}ms", latency_ms.round() as u64)
}

fn format_rate(rate_pct: f64) -> String {
    format!("{:.1}%", rate_pct)
}

fn format_flags(flags: &[String]) -> String {
    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.join(", ")
    }
}

/// Score with a pass/fail marker.
fn score_badge(record: &EvaluationRecord) -> String {
    let marker = if record.is_success() { "🟢" } else { "🔴" };
    format!("{} {}", marker, format_score(record.score))
}

/// Creation time in local time, or the raw stored value if it does not parse.
fn format_timestamp(record: &EvaluationRecord) -> String {
    match record.created_at() {
        Ok(ts) => DateTime::<Local>::from(ts)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => record.created_at.clone(),
    }
}
