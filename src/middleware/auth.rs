use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{decode_jwt, Claims};
use crate::error::ApiError;
use crate::types::Role;

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub sub: String,
    pub role: Role,
    pub student_id: Option<i64>,
    pub teacher_id: Option<i64>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            sub: claims.sub,
            role: claims.role,
            student_id: claims.student_id,
            teacher_id: claims.teacher_id,
        }
    }
}

impl AuthUser {
    /// Student id carried by the token
    pub fn student_id(&self) -> Result<i64, ApiError> {
        self.student_id
            .ok_or_else(|| ApiError::forbidden("Token carries no student id"))
    }

    /// Teacher id carried by the token
    pub fn teacher_id(&self) -> Result<i64, ApiError> {
        self.teacher_id
            .ok_or_else(|| ApiError::forbidden("Token carries no teacher id"))
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(headers: HeaderMap, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;

    let claims = decode_jwt(&token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        ApiError::unauthorized(e.to_string())
    })?;

    let auth_user = AuthUser::from(claims);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

fn require_role(request: &Request, role: Role) -> Result<(), ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required"))?;

    if auth_user.role != role {
        tracing::warn!(
            "User '{}' with role {} denied access to {} route",
            auth_user.sub,
            auth_user.role.as_str(),
            role.as_str()
        );
        return Err(ApiError::forbidden(format!("{} role required", role.as_str())));
    }
    Ok(())
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&request, Role::Admin)?;
    Ok(next.run(request).await)
}

pub async fn require_student(request: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&request, Role::Student)?;
    Ok(next.run(request).await)
}

pub async fn require_teacher(request: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&request, Role::Teacher)?;
    Ok(next.run(request).await)
}
