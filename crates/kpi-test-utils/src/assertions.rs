//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for boundary status codes and text
//! exposition output.

use kpi_metrics::KpiError;

/// Assertions on C ABI status codes.
///
/// # Example
/// ```rust,ignore
/// unsafe { SetMetric(name, 42.0, labels, 4) }.assert_status_of(&KpiError::IllegalOperation {
///     metric: String::new(),
///     kind: "counter",
///     operation: "set",
/// });
/// ```
pub trait StatusAssertions {
    /// Assert the call succeeded
    fn assert_ok(&self) -> &Self;

    /// Assert the call failed with any nonzero status
    fn assert_failed(&self) -> &Self;

    /// Assert the call failed with the status of `expected`'s variant
    fn assert_status_of(&self, expected: &KpiError) -> &Self;
}

impl StatusAssertions for i32 {
    fn assert_ok(&self) -> &Self {
        assert_eq!(*self, 0, "Expected success status, got {self}");
        self
    }

    fn assert_failed(&self) -> &Self {
        assert_ne!(*self, 0, "Expected a failure status, got 0");
        self
    }

    fn assert_status_of(&self, expected: &KpiError) -> &Self {
        assert_eq!(
            *self,
            expected.status_code(),
            "Expected status {} ({}), got {self}",
            expected.status_code(),
            expected.error_type_label()
        );
        self
    }
}

/// Assertions on Prometheus text exposition output.
pub trait ExpositionAssertions {
    /// Assert a `# TYPE` line exists for `family` with the given type
    fn assert_has_type(&self, family: &str, kind: &str) -> &Self;

    /// Assert some sample of `family` has exactly `value`
    fn assert_has_series(&self, family: &str, value: f64) -> &Self;

    /// Assert no sample line of `family` exists
    fn assert_no_series(&self, family: &str) -> &Self;
}

fn samples<'a>(text: &'a str, family: &'a str) -> impl Iterator<Item = &'a str> {
    text.lines().filter(move |line| {
        !line.starts_with('#')
            && line
                .strip_prefix(family)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
    })
}

impl ExpositionAssertions for String {
    fn assert_has_type(&self, family: &str, kind: &str) -> &Self {
        let expected = format!("# TYPE {family} {kind}");
        assert!(
            self.lines().any(|line| line == expected),
            "Missing '{expected}' in exposition:\n{self}"
        );
        self
    }

    fn assert_has_series(&self, family: &str, value: f64) -> &Self {
        let found = samples(self, family).any(|line| {
            line.rsplit(' ')
                .next()
                .and_then(|v| v.parse::<f64>().ok())
                .is_some_and(|v| v == value)
        });
        assert!(
            found,
            "No sample of {family} with value {value} in exposition:\n{self}"
        );
        self
    }

    fn assert_no_series(&self, family: &str) -> &Self {
        let lines: Vec<_> = samples(self, family).collect();
        assert!(
            lines.is_empty(),
            "Expected no samples of {family}, found: {lines:?}"
        );
        self
    }
}
