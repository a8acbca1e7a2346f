//! Evaluation aggregation and statistics.
//!
//! This module turns a snapshot of evaluation records into summary
//! statistics and a per-day trend series. Everything here is a pure
//! computation over borrowed records; nothing is cached between calls.

use crate::error::Result;
use crate::models::{Aggregation, EvaluationRecord, SummaryStats, TrendPoint};
use chrono::{DateTime, Local, NaiveDate, TimeDelta, TimeZone, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Running totals for one calendar date.
#[derive(Debug, Default)]
struct DayBucket {
    count: usize,
    score_sum: f64,
    latency_sum: f64,
}

impl DayBucket {
    fn add(&mut self, record: &EvaluationRecord) {
        self.count += 1;
        self.score_sum += record.score;
        self.latency_sum += record.latency_ms as f64;
    }

    fn into_point(self, date: NaiveDate) -> TrendPoint {
        TrendPoint {
            date,
            count: self.count,
            avg_score: self.score_sum / self.count as f64,
            avg_latency_ms: self.latency_sum / self.count as f64,
        }
    }
}

/// Aggregate records using the local timezone for day boundaries.
///
/// `records` must already be restricted to one owner and to the window;
/// `window_days` is carried into the result for the presentation layer.
pub fn compute_aggregation(records: &[EvaluationRecord], window_days: u32) -> Result<Aggregation> {
    compute_aggregation_in(records, window_days, &Local)
}

/// Aggregate records, bucketing by calendar date in `tz`.
///
/// Fails with `MalformedRecord` on the first unparsable timestamp; no
/// record is ever skipped, so the trend counts always add up to the total.
pub fn compute_aggregation_in<Tz: TimeZone>(
    records: &[EvaluationRecord],
    window_days: u32,
    tz: &Tz,
) -> Result<Aggregation> {
    let mut buckets: HashMap<NaiveDate, DayBucket> = HashMap::new();
    let mut score_sum = 0.0;
    let mut latency_sum = 0.0;
    let mut successes = 0usize;

    for record in records {
        let date = record.created_at()?.with_timezone(tz).date_naive();
        buckets.entry(date).or_default().add(record);

        score_sum += record.score;
        latency_sum += record.latency_ms as f64;
        if record.is_success() {
            successes += 1;
        }
    }

    let total = records.len();
    let summary = if total == 0 {
        SummaryStats::default()
    } else {
        SummaryStats {
            total,
            avg_score: score_sum / total as f64,
            avg_latency_ms: latency_sum / total as f64,
            success_rate_pct: successes as f64 / total as f64 * 100.0,
        }
    };

    // HashMap iteration order is arbitrary
    let mut trend: Vec<TrendPoint> = buckets
        .into_iter()
        .map(|(date, bucket)| bucket.into_point(date))
        .collect();
    trend.sort_by_key(|point| point.date);

    debug!(
        "Aggregated {} records into {} daily buckets ({} day window)",
        total,
        trend.len(),
        window_days
    );

    Ok(Aggregation {
        window_days,
        summary,
        trend,
    })
}

/// Start of a trailing window of `window_days` ending at `now`.
///
/// Windows reaching past the earliest representable instant cover all time.
pub fn window_start(now: DateTime<Utc>, window_days: u32) -> DateTime<Utc> {
    TimeDelta::try_days(i64::from(window_days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Return the `limit` most recent records, newest first.
pub fn recent_evaluations(
    records: &[EvaluationRecord],
    limit: usize,
) -> Result<Vec<&EvaluationRecord>> {
    let mut stamped = records
        .iter()
        .map(|record| -> Result<_> { Ok((record.created_at()?, record)) })
        .collect::<Result<Vec<_>>>()?;

    stamped.sort_by(|a, b| b.0.cmp(&a.0));
    stamped.truncate(limit);

    Ok(stamped.into_iter().map(|(_, record)| record).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashError;
    use chrono::FixedOffset;

    fn create_test_record(
        id: &str,
        score: f64,
        latency_ms: u64,
        created_at: &str,
    ) -> EvaluationRecord {
        EvaluationRecord {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            interaction_id: format!("int_{}", id),
            prompt: "What is deep learning?".to_string(),
            response: "Deep learning uses multiple layers...".to_string(),
            score,
            latency_ms,
            flags: Vec::new(),
            pii_tokens_redacted: 0,
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_empty_input_yields_zeros() {
        for window in [0, 7, 30] {
            let agg = compute_aggregation_in(&[], window, &Utc).unwrap();
            assert_eq!(agg.window_days, window);
            assert_eq!(agg.summary, SummaryStats::default());
            assert_eq!(agg.summary.avg_score, 0.0);
            assert_eq!(agg.summary.avg_latency_ms, 0.0);
            assert!(agg.trend.is_empty());
        }
    }

    #[test]
    fn test_single_day_means() {
        let records = vec![
            create_test_record("a", 0.8, 100, "2024-05-10T08:00:00Z"),
            create_test_record("b", 0.6, 200, "2024-05-10T12:30:00Z"),
            create_test_record("c", 1.0, 300, "2024-05-10T23:59:59Z"),
        ];

        let agg = compute_aggregation_in(&records, 7, &Utc).unwrap();

        assert_eq!(agg.trend.len(), 1);
        let point = &agg.trend[0];
        assert_eq!(point.date, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
        assert_eq!(point.count, 3);
        assert!((point.avg_score - 0.8).abs() < 1e-9);
        assert!((point.avg_latency_ms - 200.0).abs() < 1e-9);

        assert_eq!(agg.summary.total, 3);
        assert!((agg.summary.success_rate_pct - 66.666_666).abs() < 1e-3);
    }

    #[test]
    fn test_trend_is_chronological_and_sums_to_total() {
        // Store order is arbitrary; newest first here
        let records = vec![
            create_test_record("a", 0.9, 150, "2024-05-12T09:00:00Z"),
            create_test_record("b", 0.5, 400, "2024-05-03T09:00:00Z"),
            create_test_record("c", 0.7, 250, "2024-05-12T18:00:00Z"),
            create_test_record("d", 0.2, 600, "2024-04-28T09:00:00Z"),
            create_test_record("e", 0.95, 100, "2024-05-07T09:00:00Z"),
        ];

        let agg = compute_aggregation_in(&records, 30, &Utc).unwrap();

        let dates: Vec<NaiveDate> = agg.trend.iter().map(|p| p.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
        assert_eq!(dates.len(), 4);

        let bucket_total: usize = agg.trend.iter().map(|p| p.count).sum();
        assert_eq!(bucket_total, agg.summary.total);
        assert_eq!(agg.summary.total, 5);
    }

    #[test]
    fn test_success_threshold_boundary() {
        let at_threshold = vec![create_test_record("a", 0.7, 100, "2024-05-10T08:00:00Z")];
        let agg = compute_aggregation_in(&at_threshold, 7, &Utc).unwrap();
        assert_eq!(agg.summary.success_rate_pct, 100.0);

        let below = vec![create_test_record("a", 0.699_999_9, 100, "2024-05-10T08:00:00Z")];
        let agg = compute_aggregation_in(&below, 7, &Utc).unwrap();
        assert_eq!(agg.summary.success_rate_pct, 0.0);
    }

    #[test]
    fn test_buckets_follow_display_timezone() {
        let records = vec![
            create_test_record("a", 0.8, 100, "2024-05-10T21:00:00Z"),
            create_test_record("b", 0.8, 100, "2024-05-10T23:30:00Z"),
        ];

        let utc = compute_aggregation_in(&records, 7, &Utc).unwrap();
        assert_eq!(utc.trend.len(), 1);

        // 23:30Z is already the 11th two hours east of UTC
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        let shifted = compute_aggregation_in(&records, 7, &east).unwrap();
        assert_eq!(shifted.trend.len(), 2);
        assert_eq!(
            shifted.trend[1].date,
            NaiveDate::from_ymd_opt(2024, 5, 11).unwrap()
        );
    }

    #[test]
    fn test_scores_are_not_clamped() {
        let records = vec![
            create_test_record("a", 1.5, 100, "2024-05-10T08:00:00Z"),
            create_test_record("b", -0.5, 100, "2024-05-10T09:00:00Z"),
        ];
        let agg = compute_aggregation_in(&records, 7, &Utc).unwrap();
        assert!((agg.summary.avg_score - 0.5).abs() < 1e-9);
        assert_eq!(agg.summary.success_rate_pct, 50.0);
    }

    #[test]
    fn test_malformed_timestamp_fails_fast() {
        let records = vec![
            create_test_record("good", 0.8, 100, "2024-05-10T08:00:00Z"),
            create_test_record("bad", 0.8, 100, "10/05/2024"),
        ];

        match compute_aggregation_in(&records, 7, &Utc) {
            Err(DashError::MalformedRecord { id, .. }) => assert_eq!(id, "bad"),
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_window_start() {
        let now = DateTime::parse_from_rfc3339("2024-05-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(window_start(now, 0), now);
        assert_eq!(
            window_start(now, 7),
            DateTime::parse_from_rfc3339("2024-05-03T12:00:00Z").unwrap()
        );
        // Far beyond the supported date range
        assert_eq!(window_start(now, 100_000_000), DateTime::<Utc>::MIN_UTC);
        assert_eq!(window_start(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_recent_evaluations() {
        let records = vec![
            create_test_record("old", 0.8, 100, "2024-05-01T08:00:00Z"),
            create_test_record("newest", 0.8, 100, "2024-05-12T08:00:00Z"),
            create_test_record("middle", 0.8, 100, "2024-05-06T08:00:00+05:00"),
        ];

        let recent = recent_evaluations(&records, 2).unwrap();

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "newest");
        assert_eq!(recent[1].id, "middle");

        assert!(recent_evaluations(&records, 0).unwrap().is_empty());
    }
}
