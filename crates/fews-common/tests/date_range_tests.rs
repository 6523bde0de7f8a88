//! Tests for request date resolution.

use chrono::DateTime;
use chrono::Timelike;
use fews_common::time::{format_iso, format_jdbc, window_anchor};
use fews_common::{DateRangeInput, DateRangeResolver, FewsError};

fn fixed_now() -> chrono::DateTime<chrono::FixedOffset> {
    DateTime::parse_from_rfc3339("2011-03-10T00:00:00+01:00").unwrap()
}

// ============================================================================
// Resolution priority
// ============================================================================

#[test]
fn test_start_and_end_ignore_period() {
    let resolver = DateRangeResolver::default();
    let input = DateRangeInput {
        start: Some("2011-01-01".to_string()),
        end: Some("2011-01-10".to_string()),
        period: Some(5),
    };

    let range = resolver.resolve_at(&input, fixed_now()).unwrap();
    assert_eq!(format_iso(&range.start), "2011-01-01T00:00:00+01:00");
    assert_eq!(format_iso(&range.end), "2011-01-10T00:00:00+01:00");
}

#[test]
fn test_period_only() {
    let resolver = DateRangeResolver::default();
    let range = resolver
        .resolve_at(&DateRangeInput::period(7), fixed_now())
        .unwrap();

    assert_eq!(format_iso(&range.start), "2011-03-03T00:00:00+01:00");
    assert_eq!(format_iso(&range.end), "2011-03-10T00:00:00+01:00");
}

#[test]
fn test_no_input_uses_injected_default() {
    let resolver = DateRangeResolver::new(10);
    let range = resolver
        .resolve_at(&DateRangeInput::default(), fixed_now())
        .unwrap();

    assert_eq!(format_iso(&range.start), "2011-02-28T00:00:00+01:00");
    assert_eq!(range.end, fixed_now());
}

#[test]
fn test_unparsable_lone_start_is_ignored_with_period() {
    let resolver = DateRangeResolver::default();
    let input = DateRangeInput {
        start: Some("not a date".to_string()),
        end: None,
        period: Some(7),
    };

    let range = resolver.resolve_at(&input, fixed_now()).unwrap();
    assert_eq!(format_iso(&range.start), "2011-03-03T00:00:00+01:00");
    assert_eq!(range.end, fixed_now());
}

#[test]
fn test_unparsable_lone_start_without_period_is_invalid() {
    let resolver = DateRangeResolver::default();
    let input = DateRangeInput {
        start: Some("not a date".to_string()),
        ..Default::default()
    };
    let err = resolver.resolve_at(&input, fixed_now()).unwrap_err();
    assert!(matches!(err, FewsError::InvalidDate(_)));
}

// ============================================================================
// Relative windows
// ============================================================================

#[test]
fn test_window_anchor_is_a_whole_hour() {
    let anchor = window_anchor();
    assert_eq!((anchor.minute(), anchor.second(), anchor.nanosecond()), (0, 0, 0));
    assert!(anchor > fews_common::time::now());
}

#[test]
fn test_relative_ranges_are_stable_between_calls() {
    let resolver = DateRangeResolver::default();
    let input = DateRangeInput::period(3);

    let first = resolver.resolve(&input).unwrap();
    let second = resolver.resolve(&input).unwrap();
    // Only an hour boundary between the two calls can move the anchor.
    assert!(first == second || second.end - first.end == chrono::Duration::hours(1));
    assert_eq!(first.end - first.start, chrono::Duration::days(3));
    assert_eq!(first.end.minute(), 0);
}

// ============================================================================
// Normalization
// ============================================================================

#[test]
fn test_utc_input_is_normalized_to_gmt_plus_one() {
    let resolver = DateRangeResolver::default();
    let input = DateRangeInput::explicit("2011-01-01T23:30:00Z", "2011-01-02T00:00:00-05:00");
    let range = resolver.resolve_at(&input, fixed_now()).unwrap();

    assert_eq!(format_iso(&range.start), "2011-01-02T00:30:00+01:00");
    assert_eq!(format_iso(&range.end), "2011-01-02T06:00:00+01:00");
    assert_eq!(format_jdbc(&range.start), "2011-01-02 00:30:00");
}

// ============================================================================
// Errors and empty ranges
// ============================================================================

#[test]
fn test_garbage_start_is_invalid_date() {
    let resolver = DateRangeResolver::default();
    let input = DateRangeInput::explicit("01/01/2011", "2011-01-10");
    let err = resolver.resolve_at(&input, fixed_now()).unwrap_err();
    assert!(matches!(err, FewsError::InvalidDate(_)));
    assert_eq!(err.http_status_code(), 400);
}

#[test]
fn test_start_after_end_is_empty_not_error() {
    let resolver = DateRangeResolver::default();
    let input = DateRangeInput::explicit("2011-02-01", "2011-01-01");
    let range = resolver.resolve_at(&input, fixed_now()).unwrap();
    assert!(range.is_empty());
}

#[test]
fn test_zero_period_is_instant() {
    let resolver = DateRangeResolver::default();
    let range = resolver
        .resolve_at(&DateRangeInput::period(0), fixed_now())
        .unwrap();
    assert_eq!(range.start, range.end);
    assert!(!range.is_empty());
}
