//! Request authentication hooks
//!
//! The engine itself never authenticates; front ends ask the attached
//! `Authenticator` before calling in. Without configuration every request
//! is permitted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{EngineError, EngineErrorCode, EngineResult};

/// Operation classes a token may be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Delete,
    Admin,
}

/// How strictly JSON front ends validate request bodies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStrictness {
    /// Reject malformed requests
    Strict,
    /// Log and continue
    #[default]
    Warning,
    /// Skip validation
    None,
}

impl ValidationStrictness {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStrictness::Strict => "strict",
            ValidationStrictness::Warning => "warning",
            ValidationStrictness::None => "none",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "strict" => Some(ValidationStrictness::Strict),
            "warning" => Some(ValidationStrictness::Warning),
            "none" => Some(ValidationStrictness::None),
            _ => None,
        }
    }
}

/// Permission check consulted by front ends
pub trait Authenticator: Send + Sync {
    fn is_permitted(
        &self,
        token: &str,
        domain_key: &str,
        ip_address: &str,
        permission: Permission,
    ) -> bool;
}

/// Allows everything
#[derive(Debug, Default, Clone, Copy)]
pub struct PermitAll;

impl Authenticator for PermitAll {
    fn is_permitted(&self, _: &str, _: &str, _: &str, _: Permission) -> bool {
        true
    }
}

/// One credential from the authentication file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub token: String,
    /// Domain keys, or "*" for all
    #[serde(default = "wildcard")]
    pub domains: Vec<String>,
    /// Client addresses, or "*" for any
    #[serde(default = "wildcard")]
    pub ip_addresses: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

fn wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

fn matches_any(patterns: &[String], value: &str) -> bool {
    patterns.iter().any(|p| p == "*" || p == value)
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    #[serde(default)]
    tokens: Vec<TokenGrant>,
}

/// Static token table loaded from JSON
#[derive(Debug, Clone)]
pub struct TokenAuthenticator {
    path: PathBuf,
    grants: Vec<TokenGrant>,
}

impl TokenAuthenticator {
    pub fn new(grants: Vec<TokenGrant>) -> Self {
        Self {
            path: PathBuf::new(),
            grants,
        }
    }

    /// Load `{"tokens": [...]}` from `path`
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            EngineError::io(
                EngineErrorCode::FailedToInitConfig,
                "failed to read authentication file",
                e,
            )
            .with_details(path.display().to_string())
        })?;
        let invalid = || {
            EngineError::new(
                EngineErrorCode::FailedToInitConfig,
                "invalid authentication file",
            )
            .with_details(path.display().to_string())
        };
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| invalid().with_source(e))?;
        // The derived visitor would also take a sequence
        if !value.is_object() {
            return Err(invalid());
        }
        let file: TokenFile =
            serde_json::from_value(value).map_err(|e| invalid().with_source(e))?;
        Ok(Self {
            path: path.to_path_buf(),
            grants: file.tokens,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl Authenticator for TokenAuthenticator {
    fn is_permitted(
        &self,
        token: &str,
        domain_key: &str,
        ip_address: &str,
        permission: Permission,
    ) -> bool {
        self.grants.iter().any(|grant| {
            grant.token == token
                && matches_any(&grant.domains, domain_key)
                && matches_any(&grant.ip_addresses, ip_address)
                && (grant.permissions.contains(&permission)
                    || grant.permissions.contains(&Permission::Admin))
        })
    }
}
