//! Login grants and their verification.
//!
//! A [`LoginGrant`] is whatever a login callback carried in its query string.
//! The only way to obtain a [`VerifiedGrant`] is [`LoginGrant::verify`], and
//! the identity exchange accepts nothing else.

use larkspur_core::Usid;
use thiserror::Error;

/// Errors found while checking a grant, before any network call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrantError {
    #[error("authorization code is missing")]
    MissingCode,
    #[error("shopper session id is missing")]
    MissingUsid,
    #[error("passwordless token is missing")]
    MissingToken,
    #[error("passwordless token is not valid percent-encoding")]
    InvalidEncoding,
}

/// An unverified login artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginGrant {
    /// Code and shopper session from a hosted login redirect.
    RegisteredCode {
        code: String,
        usid: String,
        redirect_uri: String,
        code_verifier: Option<String>,
    },
    /// Token from a passwordless magic link.
    Passwordless { token: String },
    /// Code from a third-party identity provider redirect.
    Idp {
        code: String,
        redirect_uri: String,
        usid: Option<String>,
        code_verifier: Option<String>,
    },
}

/// A grant that passed [`LoginGrant::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedGrant(Artifact);

/// Checked artifact carried by a [`VerifiedGrant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    RegisteredCode {
        code: String,
        usid: Usid,
        redirect_uri: String,
        code_verifier: Option<String>,
    },
    Passwordless {
        token: String,
    },
    Idp {
        code: String,
        redirect_uri: String,
        usid: Option<Usid>,
        code_verifier: Option<String>,
    },
}

impl LoginGrant {
    /// Check the grant's artifacts.
    ///
    /// Codes and session ids must be non-empty. Passwordless tokens arrive
    /// percent-encoded inside the magic link and are decoded once here.
    ///
    /// # Errors
    ///
    /// Returns a [`GrantError`] naming the first missing or invalid artifact.
    pub fn verify(self) -> Result<VerifiedGrant, GrantError> {
        let artifact = match self {
            Self::RegisteredCode {
                code,
                usid,
                redirect_uri,
                code_verifier,
            } => Artifact::RegisteredCode {
                code: non_empty(code).ok_or(GrantError::MissingCode)?,
                usid: non_empty(usid).map(Usid::new).ok_or(GrantError::MissingUsid)?,
                redirect_uri,
                code_verifier: code_verifier.and_then(non_empty),
            },
            Self::Passwordless { token } => {
                let token = non_empty(token).ok_or(GrantError::MissingToken)?;
                let decoded = urlencoding::decode(&token)
                    .map_err(|_| GrantError::InvalidEncoding)?
                    .into_owned();
                Artifact::Passwordless {
                    token: non_empty(decoded).ok_or(GrantError::MissingToken)?,
                }
            }
            Self::Idp {
                code,
                redirect_uri,
                usid,
                code_verifier,
            } => Artifact::Idp {
                code: non_empty(code).ok_or(GrantError::MissingCode)?,
                redirect_uri,
                usid: usid.and_then(non_empty).map(Usid::new),
                code_verifier: code_verifier.and_then(non_empty),
            },
        };

        Ok(VerifiedGrant(artifact))
    }
}

impl VerifiedGrant {
    /// The checked artifact.
    #[must_use]
    pub fn artifact(&self) -> &Artifact {
        &self.0
    }

    /// Short name of the grant kind, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self.0 {
            Artifact::RegisteredCode { .. } => "registered_code",
            Artifact::Passwordless { .. } => "passwordless",
            Artifact::Idp { .. } => "idp",
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}
