use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;

/// One of the three business verticals served by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    AiHrms,
    Nose,
    WebHunter,
}

impl Framework {
    /// Resolve a framework name as used by the permission gate. Accepts the
    /// historical aliases (`HRMS`, `NOSE-RESEARCH`) case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "AI-HRMS" | "HRMS" => Some(Framework::AiHrms),
            "NOSE" | "NOSE-RESEARCH" => Some(Framework::Nose),
            "WEB-HUNTER" => Some(Framework::WebHunter),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Framework::AiHrms => "AI-HRMS",
            Framework::Nose => "NOSE",
            Framework::WebHunter => "WEB-HUNTER",
        }
    }
}

/// Access a user holds inside one framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkGrant {
    pub enabled: bool,
    pub role: String,
    pub permissions: Vec<String>,
}

impl FrameworkGrant {
    pub fn new(role: impl Into<String>, permissions: &[&str]) -> Self {
        Self {
            enabled: true,
            role: role.into(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn allows_access(&self) -> bool {
        self.enabled && !self.permissions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrameworkGrants {
    pub ai_hrms: FrameworkGrant,
    pub nose: FrameworkGrant,
    pub web_hunter: FrameworkGrant,
}

impl FrameworkGrants {
    pub fn get(&self, framework: Framework) -> &FrameworkGrant {
        match framework {
            Framework::AiHrms => &self.ai_hrms,
            Framework::Nose => &self.nose,
            Framework::WebHunter => &self.web_hunter,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.ai_hrms.role == "super_admin" || self.nose.role == "admin" || self.web_hunter.role == "admin"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_status")]
    pub status: String,
    /// Unix seconds until which the account is locked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<i64>,
    #[serde(default)]
    pub frameworks: FrameworkGrants,
    pub exp: i64,
    pub iat: i64,
}

fn default_status() -> String {
    "active".to_string()
}

impl Claims {
    pub fn new(sub: String, email: String, name: String, frameworks: FrameworkGrants) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub,
            email,
            name,
            status: default_status(),
            lock_until: None,
            frameworks,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    generate_jwt_with_secret(claims, &config::config().security.jwt_secret)
}

pub fn generate_jwt_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate a token and extract its claims, separating expiry from other failures.
pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid,
        })
}
