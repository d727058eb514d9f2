use crate::error::InvalidResult;
use crate::identity::IdentityData;
use std::fmt;

/// Outcome status of one authentication attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    /// Required fields were absent or empty; the identifier was never consulted.
    CredentialsMissing,
    /// Extraction succeeded but verification failed (password, token hash, nonce, decoding).
    CredentialsInvalid,
    /// No backing record matched.
    IdentityNotFound,
    /// Login URL mismatch or anything not covered above.
    Other,
}

impl Status {
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::CredentialsMissing => "FAILURE_CREDENTIALS_MISSING",
            Self::CredentialsInvalid => "FAILURE_CREDENTIALS_INVALID",
            Self::IdentityNotFound => "FAILURE_IDENTITY_NOT_FOUND",
            Self::Other => "FAILURE_OTHER",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable authentication outcome.
///
/// `status == Success` if and only if `data` is present and non-empty.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthResult {
    status: Status,
    data: Option<IdentityData>,
    errors: Vec<String>,
}

impl AuthResult {
    /// # Errors
    ///
    /// Returns [`InvalidResult`] for a success status without non-empty data.
    pub fn new(
        status: Status,
        data: Option<IdentityData>,
        errors: Vec<String>,
    ) -> Result<Self, InvalidResult> {
        let has_data = data.as_ref().is_some_and(|data| !data.is_empty());
        if status.is_success() && !has_data {
            return Err(InvalidResult);
        }
        Ok(Self {
            status,
            data,
            errors,
        })
    }

    /// # Errors
    ///
    /// Returns [`InvalidResult`] when `data` is empty.
    pub fn success(data: IdentityData) -> Result<Self, InvalidResult> {
        Self::new(Status::Success, Some(data), Vec::new())
    }

    /// Failure without identity data. A `Success` status here is a caller bug
    /// and is reported as [`Status::Other`].
    #[must_use]
    pub fn failure(status: Status, errors: Vec<String>) -> Self {
        debug_assert!(!status.is_success(), "failure built with a success status");
        let status = if status.is_success() {
            Status::Other
        } else {
            status
        };
        Self {
            status,
            data: None,
            errors,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status.is_success()
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn data(&self) -> Option<&IdentityData> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}
