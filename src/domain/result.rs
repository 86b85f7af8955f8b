//! Result type alias for fhir-bridge

use super::errors::BridgeError;

/// Result type alias for fhir-bridge operations
///
/// # Examples
///
/// ```
/// use fhir_bridge::domain::result::Result;
/// use fhir_bridge::domain::errors::BridgeError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(BridgeError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i64> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(BridgeError::Concurrency);
        assert!(result.is_err());
    }
}
