use crate::http::Challenge;
use thiserror::Error;

/// Boxed error returned by external collaborators (resolvers, sessions, hashers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Deployment or programming mistakes, raised while components are built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{kind} class `{name}` was not found")]
    ClassNotFound { kind: &'static str, name: String },
    #[error("`{name}` does not implement the {expected} capability")]
    CapabilityMismatch {
        name: String,
        expected: &'static str,
    },
    #[error("{kind} alias `{alias}` is already loaded")]
    DuplicateAlias { kind: &'static str, alias: String },
    #[error("invalid `{component}` config: {source}")]
    Invalid {
        component: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{component}` requires `{key}`")]
    Missing {
        component: &'static str,
        key: &'static str,
    },
    #[error("invalid url pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid key material for `{component}`: {reason}")]
    InvalidKey {
        component: &'static str,
        reason: String,
    },
    #[error("unsupported `{key}` value `{value}` for `{component}`")]
    Unsupported {
        component: &'static str,
        key: &'static str,
        value: String,
    },
    #[error("callback `{0}` is not registered")]
    UnknownCallback(String),
    #[error("no authenticators loaded, load at least one authenticator")]
    NoAuthenticators,
    #[error("authenticator `{0}` does not support impersonation")]
    NotImpersonationCapable(String),
    #[error("no authenticator has produced a valid result yet")]
    NoProvider,
    #[error("unable to connect to directory server `{host}`: {source}")]
    Connect {
        host: String,
        #[source]
        source: BoxError,
    },
}

/// A success result was built without identity data.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("identity can not be empty with status success")]
pub struct InvalidResult;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("authentication challenge issued")]
    Challenge(Box<Challenge>),
    #[error(transparent)]
    InvalidResult(#[from] InvalidResult),
    #[error("backend failure: {0}")]
    Backend(#[source] BoxError),
    #[error("invalid return type of callback `{callback}`: expected an object or null, got {found}")]
    InvalidCallbackReturn {
        callback: String,
        found: &'static str,
    },
    #[error("already impersonating a user, stop the current impersonation first")]
    AlreadyImpersonating,
    #[error("request has no session attached")]
    NoSession,
    #[error("invalid header value: {0}")]
    Header(#[from] http::header::InvalidHeaderValue),
}

impl Error {
    #[must_use]
    pub fn is_challenge(&self) -> bool {
        matches!(self, Self::Challenge(_))
    }

    /// Split off the challenge channel; other errors are handed back untouched.
    ///
    /// # Errors
    ///
    /// Returns `self` when it is not a challenge.
    pub fn into_challenge(self) -> Result<Challenge, Self> {
        match self {
            Self::Challenge(challenge) => Ok(*challenge),
            other => Err(other),
        }
    }

    pub(crate) fn backend(err: impl Into<BoxError>) -> Self {
        Self::Backend(err.into())
    }
}

impl From<Challenge> for Error {
    fn from(challenge: Challenge) -> Self {
        Self::Challenge(Box::new(challenge))
    }
}
