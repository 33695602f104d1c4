use thiserror::Error;

/// Boxed error used as the `source` of every [`GitError`] variant
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error raised at the boundary of a repository operation.
///
/// Every backend rewraps engine-level failures (`git2::Error`, `std::io::Error`,
/// a failed `git` process) into the variant matching the operation that was
/// running, keeping the original failure as `source`.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("check connection failed: {message}")]
    ConnectionError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("clone failed: {message}")]
    CloneError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("fetch failed: {message}")]
    FetchError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("checkout failed: {message}")]
    CheckoutError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("reset failed: {message}")]
    ResetError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("clean failed: {message}")]
    CleanError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("gc failed: {message}")]
    GcError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("sub-module operation failed: {message}")]
    SubmoduleError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("repository query failed: {message}")]
    QueryError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("local repository operation failed: {message}")]
    LocalError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

/// Discriminant of [`GitError`], used to pick the variant when rewrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Clone,
    Fetch,
    Checkout,
    Reset,
    Clean,
    Gc,
    Submodule,
    Query,
    Local,
    Config,
}

impl ErrorKind {
    /// Build an error of this kind without an underlying cause
    pub fn error(self, message: impl Into<String>) -> GitError {
        GitError::new(self, message, None)
    }

    /// Build an error of this kind wrapping `source`
    pub fn error_with_source(self, message: impl Into<String>, source: impl Into<BoxError>) -> GitError {
        GitError::new(self, message, Some(source.into()))
    }
}

impl GitError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, source: Option<BoxError>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Connection => Self::ConnectionError { message, source },
            ErrorKind::Clone => Self::CloneError { message, source },
            ErrorKind::Fetch => Self::FetchError { message, source },
            ErrorKind::Checkout => Self::CheckoutError { message, source },
            ErrorKind::Reset => Self::ResetError { message, source },
            ErrorKind::Clean => Self::CleanError { message, source },
            ErrorKind::Gc => Self::GcError { message, source },
            ErrorKind::Submodule => Self::SubmoduleError { message, source },
            ErrorKind::Query => Self::QueryError { message, source },
            ErrorKind::Local => Self::LocalError { message, source },
            ErrorKind::Config => Self::ConfigError { message, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionError { .. } => ErrorKind::Connection,
            Self::CloneError { .. } => ErrorKind::Clone,
            Self::FetchError { .. } => ErrorKind::Fetch,
            Self::CheckoutError { .. } => ErrorKind::Checkout,
            Self::ResetError { .. } => ErrorKind::Reset,
            Self::CleanError { .. } => ErrorKind::Clean,
            Self::GcError { .. } => ErrorKind::Gc,
            Self::SubmoduleError { .. } => ErrorKind::Submodule,
            Self::QueryError { .. } => ErrorKind::Query,
            Self::LocalError { .. } => ErrorKind::Local,
            Self::ConfigError { .. } => ErrorKind::Config,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::ConnectionError { message, .. }
            | Self::CloneError { message, .. }
            | Self::FetchError { message, .. }
            | Self::CheckoutError { message, .. }
            | Self::ResetError { message, .. }
            | Self::CleanError { message, .. }
            | Self::GcError { message, .. }
            | Self::SubmoduleError { message, .. }
            | Self::QueryError { message, .. }
            | Self::LocalError { message, .. }
            | Self::ConfigError { message, .. } => message,
        }
    }

    pub fn connection_error(message: impl Into<String>) -> Self {
        ErrorKind::Connection.error(message)
    }

    pub fn clone_error(message: impl Into<String>) -> Self {
        ErrorKind::Clone.error(message)
    }

    pub fn reset_error(message: impl Into<String>) -> Self {
        ErrorKind::Reset.error(message)
    }

    pub fn clean_error_with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ErrorKind::Clean.error_with_source(message, source)
    }

    pub fn submodule_error(message: impl Into<String>) -> Self {
        ErrorKind::Submodule.error(message)
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        ErrorKind::Config.error(message)
    }
}
