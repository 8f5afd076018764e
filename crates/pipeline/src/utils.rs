//! Helper macros used across the crate.

/// Returns early with `$error` unless `$predicate` holds.
///
/// ```ignore
/// ensure!(written <= length, SendError::invalid_body("body exceeds content length"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
