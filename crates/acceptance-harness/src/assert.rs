// crates/acceptance-harness/src/assert.rs
// ============================================================================
// Module: Scenario Assertions
// Description: Result-returning expectation helpers for scenario bodies.
// Purpose: Turn violated expectations into assertion failures with context.
// Dependencies: std
// ============================================================================

//! Scenario assertions that fail with [`crate::HarnessError::Assertion`].

use std::fmt;

use crate::error::HarnessError;

/// Fails with `message` unless `condition` holds.
///
/// # Errors
///
/// Returns [`HarnessError::Assertion`] when `condition` is false.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), HarnessError> {
    if condition { Ok(()) } else { Err(HarnessError::Assertion(message())) }
}

/// Fails unless `actual == expected`.
///
/// # Errors
///
/// Returns [`HarnessError::Assertion`] naming `what` and both values.
pub fn ensure_eq<T>(what: &str, expected: &T, actual: &T) -> Result<(), HarnessError>
where
    T: PartialEq + fmt::Display + ?Sized,
{
    ensure(expected == actual, || format!("{what}: expected '{expected}', got '{actual}'"))
}

/// Fails unless two byte sequences are identical.
///
/// # Errors
///
/// Returns [`HarnessError::Assertion`] with lengths and a lossy rendering.
pub fn ensure_bytes_eq(what: &str, expected: &[u8], actual: &[u8]) -> Result<(), HarnessError> {
    ensure(expected == actual, || {
        format!(
            "{what}: content mismatch: expected {} byte(s) '{}', got {} byte(s) '{}'",
            expected.len(),
            String::from_utf8_lossy(expected),
            actual.len(),
            String::from_utf8_lossy(actual)
        )
    })
}

/// Treats a failed step inside a scenario body as an assertion failure.
///
/// # Errors
///
/// Returns [`HarnessError::Assertion`] reading `failed to {what}: {err}`.
pub fn ensure_ok<T, E: fmt::Display>(what: &str, result: Result<T, E>) -> Result<T, HarnessError> {
    result.map_err(|err| HarnessError::Assertion(format!("failed to {what}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::ensure_bytes_eq;
    use super::ensure_eq;
    use super::ensure_ok;
    use crate::error::FailureKind;

    #[test]
    fn mismatches_are_assertion_failures() {
        assert!(ensure_eq("name", "Alice", "Alice").is_ok());
        let err = ensure_eq("name", "Alice", "Bob").err().map(|err| (err.kind(), err.to_string()));
        assert_eq!(
            err,
            Some((FailureKind::Assertion, "assertion failed: name: expected 'Alice', got 'Bob'".to_string()))
        );

        let err = ensure_bytes_eq("payload", b"Hello, SFTP!", b"Hello").err().map(|err| err.to_string());
        assert!(err.is_some_and(|msg| msg.contains("expected 12 byte(s)") && msg.contains("got 5 byte(s)")));
    }

    #[test]
    fn failed_steps_carry_context() {
        let result: Result<(), String> = Err("relation exists".to_string());
        let err = ensure_ok("create table", result).err().map(|err| err.to_string());
        assert_eq!(err.as_deref(), Some("assertion failed: failed to create table: relation exists"));
    }
}
