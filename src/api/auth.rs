use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Actor, Role};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Bearer-token authentication middleware.
///
/// If `API_TOKEN` is set, every request must carry
/// `Authorization: Bearer <token>` matching that value.
/// If `API_TOKEN` is empty / unset, authentication is disabled (dev mode).
pub async fn require_auth(req: Request, next: Next) -> Response {
    let expected = std::env::var("API_TOKEN").unwrap_or_default();

    // No token configured → auth disabled (dev mode)
    if expected.is_empty() {
        return next.run(req).await;
    }

    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    match auth_header.and_then(|v| v.strip_prefix("Bearer ")) {
        Some(token) if token == expected => next.run(req).await,
        Some(_) => (StatusCode::UNAUTHORIZED, "Invalid token").into_response(),
        None => (StatusCode::UNAUTHORIZED, "Missing or invalid Authorization header").into_response(),
    }
}

/// Caller identity as asserted by the upstream gateway in
/// `X-Actor-Id` / `X-Actor-Role`. The `system` role is never accepted.
#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let (Some(raw_id), Some(raw_role)) = (header(ACTOR_ID_HEADER), header(ACTOR_ROLE_HEADER))
        else {
            return Err(AppError::Unauthorized);
        };

        let id = Uuid::parse_str(raw_id)
            .map_err(|_| AppError::BadRequest(format!("invalid {ACTOR_ID_HEADER}")))?;
        let role = Role::from_client_str(raw_role)
            .ok_or_else(|| AppError::BadRequest(format!("invalid {ACTOR_ROLE_HEADER}")))?;

        Ok(Actor::new(id, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn extract(builder: axum::http::request::Builder) -> Result<Actor, AppError> {
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn actor_from_headers() {
        let id = Uuid::new_v4();
        let actor = extract(
            HttpRequest::builder()
                .header(ACTOR_ID_HEADER, id.to_string())
                .header(ACTOR_ROLE_HEADER, "Shipper"),
        )
        .await
        .unwrap();
        assert_eq!(actor, Actor::shipper(id));
    }

    #[tokio::test]
    async fn system_role_rejected() {
        let result = extract(
            HttpRequest::builder()
                .header(ACTOR_ID_HEADER, Uuid::new_v4().to_string())
                .header(ACTOR_ROLE_HEADER, "system"),
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn missing_headers_unauthorized() {
        let result = extract(HttpRequest::builder()).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }
}
