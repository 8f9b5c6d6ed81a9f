//! Small helpers shared by the codec modules.

/// Returns early with an error if a condition is not met.
///
/// Like `assert!`, but for validation on untrusted input where a failure must
/// become an `Err` instead of a panic.
///
/// ```ignore
/// ensure!(code.len() == 3, ParseError::malformed_status_code(code));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
