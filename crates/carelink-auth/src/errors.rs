//! Authentication and authorization errors.

use thiserror::Error;

/// Why a connection was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No `token` was supplied.
    #[error("missing credential")]
    MissingCredential,
    /// The token failed signature or claim validation.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// The token's `exp` is in the past.
    #[error("token expired")]
    TokenExpired,
    /// The `sub` claim is not an account id.
    #[error("malformed subject: {0}")]
    MalformedSubject(String),
    /// The account exists but is not active.
    #[error("inactive account")]
    Inactive,
    /// The identity lacks the privilege the endpoint requires.
    #[error("insufficient permissions")]
    Forbidden,
    /// The resolver cannot verify anything (e.g. no secret configured).
    #[error("auth configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Short label for metrics and logs.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidToken(_) => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::MalformedSubject(_) => "malformed_subject",
            Self::Inactive => "inactive",
            Self::Forbidden => "forbidden",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Reason text carried by the policy-violation close frame.
    ///
    /// Token details stay in the server log.
    #[must_use]
    pub const fn close_reason(&self) -> &'static str {
        match self {
            Self::Forbidden => "Not authorized",
            Self::Inactive => "Inactive user",
            _ => "Could not validate credentials",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let all = [
            AuthError::MissingCredential,
            AuthError::InvalidToken(String::new()),
            AuthError::TokenExpired,
            AuthError::MalformedSubject(String::new()),
            AuthError::Inactive,
            AuthError::Forbidden,
            AuthError::Configuration(String::new()),
        ];
        let mut codes: Vec<_> = all.iter().map(AuthError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn close_reason_hides_token_details() {
        let err = AuthError::InvalidToken("InvalidSignature".into());
        assert_eq!(err.close_reason(), "Could not validate credentials");
        assert_eq!(AuthError::Forbidden.close_reason(), "Not authorized");
        assert_eq!(AuthError::Inactive.close_reason(), "Inactive user");
    }

    #[test]
    fn display() {
        assert_eq!(
            AuthError::MalformedSubject("abc".into()).to_string(),
            "malformed subject: abc"
        );
        assert_eq!(AuthError::TokenExpired.to_string(), "token expired");
    }
}
