//! Detection of queries that produced no evaluation record

use serde::Serialize;

/// Outcome of comparing a query set's size with the records retrieved for it
///
/// Advisory only: queries with zero search hits upstream are legitimate, this
/// just tells the caller how many are unaccounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZeroResultReport {
    pub expected: usize,
    pub retrieved: usize,
    pub missing: usize,
    pub should_warn: bool,
}

pub fn detect_zero_results(expected: usize, retrieved: usize) -> ZeroResultReport {
    let missing = expected.saturating_sub(retrieved);
    ZeroResultReport {
        expected,
        retrieved,
        missing,
        should_warn: missing > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_records_warn() {
        let report = detect_zero_results(50, 47);
        assert_eq!(report.missing, 3);
        assert!(report.should_warn);
    }

    #[test]
    fn test_exact_count_is_quiet() {
        let report = detect_zero_results(50, 50);
        assert_eq!(report.missing, 0);
        assert!(!report.should_warn);
    }

    #[test]
    fn test_surplus_never_goes_negative() {
        let report = detect_zero_results(10, 12);
        assert_eq!(report.missing, 0);
        assert!(!report.should_warn);
    }
}
