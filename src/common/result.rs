use crate::common::error::{BoxError, ErrorKind, GitError};

/// Result type used by every repository operation
///
/// # Examples
///
/// ```
/// use gitpoller::common::result::GitResult;
/// use gitpoller::common::error::ErrorKind;
///
/// fn example_function() -> GitResult<String> {
///     Ok("success".to_string())
/// }
///
/// fn example_with_error() -> GitResult<()> {
///     Err(ErrorKind::Fetch.error("remote hung up"))
/// }
/// ```
pub type GitResult<T> = Result<T, GitError>;

/// Rewrap foreign errors into a [`GitError`] of the operation's kind
pub trait ResultExt<T, E> {
    /// Convert the error into `kind`, keeping it as the source
    ///
    /// # Examples
    ///
    /// ```
    /// use gitpoller::common::error::{ErrorKind, GitError};
    /// use gitpoller::common::result::{GitResult, ResultExt};
    ///
    /// let result: Result<(), std::io::Error> = Err(std::io::Error::new(
    ///     std::io::ErrorKind::NotFound,
    ///     "missing",
    /// ));
    /// let wrapped: GitResult<()> = result.or_git_err(ErrorKind::Clean, "clean failed");
    /// assert!(matches!(wrapped, Err(GitError::CleanError { .. })));
    /// ```
    fn or_git_err(self, kind: ErrorKind, message: impl Into<String>) -> GitResult<T>;
}

impl<T, E> ResultExt<T, E> for Result<T, E>
where
    E: Into<BoxError>,
{
    fn or_git_err(self, kind: ErrorKind, message: impl Into<String>) -> GitResult<T> {
        self.map_err(|e| kind.error_with_source(message, e))
    }
}

/// Helpers on results that already carry a [`GitError`]
pub trait GitResultExt<T> {
    /// Log the error and fall back to `None`
    fn to_option_logged(self) -> Option<T>;
}

impl<T> GitResultExt<T> for GitResult<T> {
    fn to_option_logged(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("ignoring repository error: {}", e);
                None
            }
        }
    }
}
