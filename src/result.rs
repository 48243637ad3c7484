//! Result alias and mapping helpers.

use crate::error::FetchError;

/// The outcome of a fetch: a parsed value or a [`FetchError`].
///
/// Plain value-preserving mapping is `Result::map`; [`FetchResultExt`] adds
/// the fallible variant.
pub type FetchResult<T> = Result<T, FetchError>;

/// Fallible mapping over the success case of a [`FetchResult`].
pub trait FetchResultExt<T> {
    /// Attempts to map the success value with a fallible transform.
    ///
    /// Mapping a failure is a no-op that preserves the original error. If the
    /// transform itself fails, its error becomes the new failure.
    fn try_map<U, E, F>(self, transform: F) -> FetchResult<U>
    where
        F: FnOnce(T) -> Result<U, E>,
        E: Into<FetchError>;
}

impl<T> FetchResultExt<T> for FetchResult<T> {
    fn try_map<U, E, F>(self, transform: F) -> FetchResult<U>
    where
        F: FnOnce(T) -> Result<U, E>,
        E: Into<FetchError>,
    {
        match self {
            Ok(value) => transform(value).map_err(Into::into),
            Err(error) => Err(error),
        }
    }
}
