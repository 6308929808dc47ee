//! Validator: rejects implausible meter readings ahead of upload.

use chrono::{Duration as ChronoDuration, Utc};

use crate::models::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Reject: row is excluded from the batch and marked `failed_validation`.
    Error,
    /// Proceed, but log.
    Warning,
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub reason: String,
}

const VOLTAGE_RANGE: (f64, f64) = (200.0, 480.0);
const CURRENT_RANGE: (f64, f64) = (0.1, 1000.0);
const FREQUENCY_RANGE: (f64, f64) = (45.0, 65.0);
const POWER_FACTOR_RANGE: (f64, f64) = (0.0, 1.0);

/// Validates one reading. Returns every issue found; the row is rejected
/// overall if any issue is `Severity::Error`.
pub fn validate(reading: &Reading) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    check_timestamp(reading, &mut issues);
    check_ranges(reading, &mut issues);
    check_mock_patterns(reading, &mut issues);

    issues
}

pub fn is_rejected(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}

fn check_timestamp(reading: &Reading, issues: &mut Vec<ValidationIssue>) {
    let now = Utc::now();
    if reading.created_at > now {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            reason: "created_at is in the future".into(),
        });
    }
    if reading.created_at < now - ChronoDuration::days(365) {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            reason: "created_at is older than one year".into(),
        });
    }
}

fn check_range(value: Option<f64>, range: (f64, f64), field: &str, issues: &mut Vec<ValidationIssue>) {
    if let Some(v) = value {
        if v < range.0 || v > range.1 {
            issues.push(ValidationIssue {
                severity: Severity::Error,
                reason: format!("{field}={v} outside plausible range [{}, {}]", range.0, range.1),
            });
        }
    }
}

fn check_ranges(reading: &Reading, issues: &mut Vec<ValidationIssue>) {
    for (value, field) in [
        (reading.voltage_a, "voltage_a"),
        (reading.voltage_b, "voltage_b"),
        (reading.voltage_c, "voltage_c"),
    ] {
        check_range(value, VOLTAGE_RANGE, field, issues);
    }
    for (value, field) in [
        (reading.current_a, "current_a"),
        (reading.current_b, "current_b"),
        (reading.current_c, "current_c"),
    ] {
        check_range(value, CURRENT_RANGE, field, issues);
    }
    check_range(reading.frequency, FREQUENCY_RANGE, "frequency", issues);
    check_range(reading.power_factor, POWER_FACTOR_RANGE, "power_factor", issues);
}

/// Heuristics for collector test/mock data: three or more "perfect round"
/// values, three or more zeros across core measurements, or a test
/// substring in `sync_status`.
fn check_mock_patterns(reading: &Reading, issues: &mut Vec<ValidationIssue>) {
    let core = [
        reading.voltage_a,
        reading.voltage_b,
        reading.voltage_c,
        reading.current_a,
        reading.current_b,
        reading.current_c,
        reading.power_active,
        reading.power_reactive,
        reading.power_apparent,
    ];

    let round_count = core
        .iter()
        .filter(|v| v.is_some_and(|x| x != 0.0 && (x.fract()).abs() < f64::EPSILON))
        .count();
    if round_count >= 3 {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            reason: format!("{round_count} perfectly round measurements, looks like mock data"),
        });
    }

    let zero_count = core.iter().filter(|v| v.is_some_and(|x| x == 0.0)).count();
    if zero_count >= 3 {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            reason: format!("{zero_count} zero-valued core measurements, looks like mock data"),
        });
    }

    let lower = reading.sync_status.to_lowercase();
    if lower.contains("test") || lower.contains("mock") || lower.contains("dummy") {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            reason: format!("sync_status {:?} looks like test data", reading.sync_status),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn base_reading() -> Reading {
        Reading {
            meter_reading_id: Uuid::new_v4(),
            created_at: Utc::now(),
            tenant_id: 1,
            meter_id: 1,
            meter_element_id: None,
            voltage_a: Some(230.0),
            voltage_b: Some(231.0),
            voltage_c: Some(229.5),
            current_a: Some(10.2),
            current_b: Some(10.1),
            current_c: Some(9.9),
            power_active: Some(1234.5),
            power_reactive: Some(12.3),
            power_apparent: Some(1234.6),
            energy_active: Some(1000.0),
            energy_reactive: Some(10.0),
            frequency: Some(50.0),
            power_factor: Some(0.98),
            thd_voltage: None,
            thd_current: None,
            sync_status: "pending".into(),
            is_synchronized: false,
            retry_count: 0,
        }
    }

    #[test]
    fn plausible_reading_has_no_errors() {
        let issues = validate(&base_reading());
        assert!(!is_rejected(&issues));
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let mut reading = base_reading();
        reading.created_at = Utc::now() + ChronoDuration::days(1);
        let issues = validate(&reading);
        assert!(is_rejected(&issues));
    }

    #[test]
    fn out_of_range_voltage_is_rejected() {
        let mut reading = base_reading();
        reading.voltage_a = Some(900.0);
        let issues = validate(&reading);
        assert!(is_rejected(&issues));
    }

    #[test]
    fn round_numbers_warn_but_do_not_reject() {
        let mut reading = base_reading();
        reading.voltage_a = Some(230.0);
        reading.voltage_b = Some(230.0);
        reading.voltage_c = Some(230.0);
        reading.current_a = Some(230.0);
        let issues = validate(&reading);
        assert!(!is_rejected(&issues));
        assert!(issues.iter().any(|i| i.severity == Severity::Warning));
    }

    #[test]
    fn test_sync_status_warns() {
        let mut reading = base_reading();
        reading.sync_status = "test_pending".into();
        let issues = validate(&reading);
        assert!(!is_rejected(&issues));
        assert!(issues.iter().any(|i| i.reason.contains("test data")));
    }
}
