//! Mapping of Tantivy errors into the shared error type.

use quarry_core::Error;
use tantivy::TantivyError;

/// Whether a Tantivy error leaves the writer unusable.
pub fn is_fatal(error: &TantivyError) -> bool {
    matches!(
        error,
        TantivyError::IoError(_)
            | TantivyError::Poisoned
            | TantivyError::ErrorInThread(_)
            | TantivyError::DataCorruption(_)
    )
}

/// Wrap a Tantivy error with the operation that failed.
pub fn backend_error(context: &str, error: TantivyError) -> Error {
    let message = format!("{context}: {error}");
    if is_fatal(&error) {
        Error::Backend {
            message,
            fatal: true,
            source: Some(Box::new(error)),
        }
    } else {
        Error::backend_with_source(message, error)
    }
}
