use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::auth::{validate_jwt, Claims, Framework, FrameworkGrants, JwtError};
use crate::error::ApiError;

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub frameworks: FrameworkGrants,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            frameworks: claims.frameworks,
        }
    }
}

/// JWT authentication middleware that validates tokens, checks account
/// state and injects the `AuthUser` into request extensions.
pub async fn jwt_auth_middleware(headers: HeaderMap, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).ok_or_else(|| ApiError::unauthorized("Access token is required"))?;

    let claims = validate_jwt(&token).map_err(|e| {
        tracing::warn!(path = %request.uri().path(), "Rejected token: {}", e);
        match e {
            JwtError::Expired => ApiError::unauthorized("Token expired"),
            _ => ApiError::unauthorized("Invalid token"),
        }
    })?;

    check_account(&claims)?;

    tracing::debug!(user_id = %claims.sub, email = %claims.email, "User authenticated");

    // Convert claims to AuthUser and inject into request
    let auth_user = AuthUser::from(claims);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get("authorization")?.to_str().ok()?;
    let token = auth_str.split_whitespace().nth(1)?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn check_account(claims: &Claims) -> Result<(), ApiError> {
    if claims.status == "suspended" || claims.status == "deactivated" {
        return Err(ApiError::unauthorized("Account is suspended or deactivated"));
    }

    if let Some(lock_until) = claims.lock_until {
        let remaining_secs = lock_until - Utc::now().timestamp();
        if remaining_secs > 0 {
            let minutes = (remaining_secs + 59) / 60;
            return Err(ApiError::locked(format!("Account is locked. Try again in {} minutes", minutes)));
        }
    }

    Ok(())
}

fn current_user(request: &Request) -> Result<&AuthUser, ApiError> {
    request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// Per-framework gate, mounted with `from_fn_with_state(name, require_framework)`.
pub async fn require_framework(State(name): State<&'static str>, request: Request, next: Next) -> Result<Response, ApiError> {
    let user = current_user(&request)?;
    let framework = Framework::from_name(name).ok_or_else(|| ApiError::bad_request("Invalid framework name"))?;

    if !user.frameworks.get(framework).allows_access() {
        tracing::warn!(user_id = %user.id, email = %user.email, framework = name, "Access denied for framework");
        return Err(ApiError::forbidden(format!("Access denied for {} framework", name)));
    }

    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = current_user(&request)?;

    if !user.frameworks.is_admin() {
        tracing::warn!(user_id = %user.id, email = %user.email, "Admin access denied");
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FrameworkGrant;

    fn claims() -> Claims {
        Claims::new(
            "u1".into(),
            "u1@example.com".into(),
            "User One".into(),
            FrameworkGrants {
                ai_hrms: FrameworkGrant::new("employee", &["read"]),
                ..Default::default()
            },
        )
    }

    #[test]
    fn bearer_token_is_second_word() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc.def".parse().unwrap());
        assert_eq!(extract_jwt_from_headers(&headers).as_deref(), Some("abc.def"));

        headers.insert("authorization", "Bearer".parse().unwrap());
        assert_eq!(extract_jwt_from_headers(&headers), None);
        assert_eq!(extract_jwt_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn suspended_account_is_rejected() {
        let mut c = claims();
        c.status = "suspended".into();
        let err = check_account(&c).unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.message(), "Account is suspended or deactivated");
    }

    #[test]
    fn locked_account_reports_remaining_minutes() {
        let mut c = claims();
        c.lock_until = Some(Utc::now().timestamp() + 4 * 60 + 10);
        let err = check_account(&c).unwrap_err();
        assert_eq!(err.status_code(), 423);
        assert_eq!(err.message(), "Account is locked. Try again in 5 minutes");

        c.lock_until = Some(Utc::now().timestamp() - 10);
        assert!(check_account(&c).is_ok());
    }
}
