//! Requester resolution.
//!
//! The session layer is external; the pipeline only needs to turn a bearer token into a
//! requester with a role. `StaticTokenAuthorizer` serves tokens declared in config.

use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

/// Authenticated caller of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: String,
    pub role: Role,
}

impl Requester {
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Resolve a bearer token to a requester, or fail with `Authorization`.
    async fn resolve(&self, token: &str) -> Result<Requester, PipelineError>;
}

/// Only admins may trigger generation.
pub fn require_admin(requester: &Requester) -> Result<(), PipelineError> {
    if requester.role == Role::Admin {
        Ok(())
    } else {
        Err(PipelineError::Authorization(
            "Admin access required".to_string(),
        ))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, PipelineError> {
    let header = header
        .ok_or_else(|| PipelineError::Authorization("Missing Authorization header".to_string()))?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            PipelineError::Authorization(
                "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
            )
        })
}

/// A token declared in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub user_id: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Admin
}

/// `[auth]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenGrant>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for grant in &self.tokens {
            if grant.token.trim().is_empty() {
                return Err(format!("Empty token for user '{}'", grant.user_id));
            }
            if grant.user_id.trim().is_empty() {
                return Err("Token grant has an empty user_id".to_string());
            }
            if !seen.insert(grant.token.as_str()) {
                return Err(format!("Duplicate token for user '{}'", grant.user_id));
            }
        }
        Ok(())
    }
}

pub struct StaticTokenAuthorizer {
    grants: HashMap<String, Requester>,
}

impl StaticTokenAuthorizer {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.tokens.iter().map(|grant| {
            (
                grant.token.clone(),
                Requester {
                    user_id: grant.user_id.clone(),
                    role: grant.role,
                },
            )
        }))
    }

    pub fn new(grants: impl IntoIterator<Item = (String, Requester)>) -> Self {
        Self {
            grants: grants.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticTokenAuthorizer {
    async fn resolve(&self, token: &str) -> Result<Requester, PipelineError> {
        self.grants
            .get(token)
            .cloned()
            .ok_or_else(|| PipelineError::Authorization("Invalid token".to_string()))
    }
}
