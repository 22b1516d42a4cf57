//! HMAC-signed JWT identity resolver.
//!
//! Accepted claims:
//! - `sub`: account id, as an integer or a numeric string
//! - `exp`: expiry (unix seconds), required
//! - `is_active`: defaults to `true`
//! - `is_superuser`: defaults to `false`
//! - `role`: `psicologo`, `psychologist` or `admin` also grant elevation

use std::str::FromStr;

use async_trait::async_trait;
use carelink_core::Identity;
use carelink_settings::AuthSettings;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AuthError;
use crate::resolver::IdentityResolver;

const ELEVATED_ROLES: &[&str] = &["psicologo", "psychologist", "admin"];

/// `sub` claim, which issuers encode either way.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subject {
    /// `"sub": 42`
    Int(i64),
    /// `"sub": "42"`
    Str(String),
}

impl Subject {
    fn account_id(&self) -> Result<i64, AuthError> {
        match self {
            Self::Int(id) => Ok(*id),
            Self::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| AuthError::MalformedSubject(s.clone())),
        }
    }
}

/// Token claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: Subject,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Issued at, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Account active flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    /// Elevated-privilege flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    /// Free-form role name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Claims {
    /// The identity these claims vouch for.
    pub fn identity(&self) -> Result<Identity, AuthError> {
        let role_elevated = self
            .role
            .as_deref()
            .is_some_and(|r| ELEVATED_ROLES.iter().any(|e| r.eq_ignore_ascii_case(e)));
        Ok(Identity {
            id: self.sub.account_id()?,
            is_active: self.is_active.unwrap_or(true),
            elevated: self.is_superuser.unwrap_or(false) || role_elevated,
        })
    }
}

/// Parameters for minting a token with [`JwtIdentityResolver::issue`].
#[derive(Clone, Debug)]
pub struct TokenRequest {
    /// Account id.
    pub sub: i64,
    /// Grant elevation.
    pub superuser: bool,
    /// Account active flag.
    pub active: bool,
    /// Lifetime in seconds.
    pub ttl_secs: i64,
}

impl TokenRequest {
    /// Active, non-elevated, one hour.
    #[must_use]
    pub const fn seeker(sub: i64) -> Self {
        Self {
            sub,
            superuser: false,
            active: true,
            ttl_secs: 3600,
        }
    }

    /// Active, elevated, one hour.
    #[must_use]
    pub const fn responder(sub: i64) -> Self {
        Self {
            sub,
            superuser: true,
            active: true,
            ttl_secs: 3600,
        }
    }
}

/// Verifies HMAC-signed JWTs.
pub struct JwtIdentityResolver {
    keys: Option<(DecodingKey, EncodingKey)>,
    algorithm: Algorithm,
    validation: Validation,
}

impl std::fmt::Debug for JwtIdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityResolver")
            .field("configured", &self.keys.is_some())
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl JwtIdentityResolver {
    /// Build a resolver. An empty `secret` yields one that rejects every
    /// token.
    pub fn new(secret: &str, algorithm: Algorithm, leeway_secs: u64) -> Result<Self, AuthError> {
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::Configuration(format!(
                "unsupported algorithm {algorithm:?}, expected an HMAC algorithm"
            )));
        }

        let keys = (!secret.is_empty()).then(|| {
            (
                DecodingKey::from_secret(secret.as_bytes()),
                EncodingKey::from_secret(secret.as_bytes()),
            )
        });

        let mut validation = Validation::new(algorithm);
        validation.leeway = leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            keys,
            algorithm,
            validation,
        })
    }

    /// Build from the `auth` settings section.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let algorithm = Algorithm::from_str(&settings.algorithm).map_err(|e| {
            AuthError::Configuration(format!("algorithm {:?}: {e}", settings.algorithm))
        })?;
        Self::new(&settings.jwt_secret, algorithm, settings.leeway_secs)
    }

    /// Whether a secret is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (decoding, _) = self
            .keys
            .as_ref()
            .ok_or_else(|| AuthError::Configuration("no JWT secret configured".into()))?;

        let data = decode::<Claims>(token, decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "JWT validation failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }

    /// Mint a signed token.
    pub fn issue(&self, request: &TokenRequest) -> Result<String, AuthError> {
        let (_, encoding) = self
            .keys
            .as_ref()
            .ok_or_else(|| AuthError::Configuration("no JWT secret configured".into()))?;

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Subject::Str(request.sub.to_string()),
            exp: now + request.ttl_secs,
            iat: Some(now),
            is_active: Some(request.active),
            is_superuser: Some(request.superuser),
            role: None,
        };

        encode(&Header::new(self.algorithm), &claims, encoding)
            .map_err(|e| AuthError::Configuration(e.to_string()))
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<Identity, AuthError> {
        if credential.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        self.verify(credential)?.identity()
    }
}
