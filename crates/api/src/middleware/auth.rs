//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use charm_core::error::CoreError;
use charm_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the `Authorization` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's id (from `claims.sub`).
    pub user_id: DbId,
    /// Role name from the token, recorded on review and rubric log lines.
    pub role: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use charm_db::MemoryProposalStore;
    use charm_events::EventBus;

    use super::*;
    use crate::auth::jwt::{generate_access_token, JwtConfig};
    use crate::config::{ServerConfig, StoreBackend};

    fn state() -> AppState {
        AppState {
            store: Arc::new(MemoryProposalStore::new()),
            config: Arc::new(ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec![],
                request_timeout_secs: 30,
                shutdown_timeout_secs: 30,
                store_backend: StoreBackend::Memory,
                database_url: None,
                analytics_webhook_url: None,
                jwt: JwtConfig {
                    secret: "auth-extractor-test-secret".to_string(),
                    access_token_expiry_mins: 15,
                },
            }),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    fn parts(authorization: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/proposals");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn extracts_user_and_role_from_bearer_token() {
        let state = state();
        let user_id = DbId::new_v4();
        let token = generate_access_token(user_id, "reviewer", &state.config.jwt).unwrap();

        let mut parts = parts(Some(format!("Bearer {token}")));
        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, "reviewer");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let state = state();
        let mut parts = parts(None);
        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AppError::Core(CoreError::Unauthorized(_))));
    }
}
