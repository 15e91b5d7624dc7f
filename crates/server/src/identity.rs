//! Actor resolution for the JSON API.
//!
//! The deployment fronts this service with the company identity provider,
//! which forwards the authenticated account as an `X-Actor-Id` header. The
//! handlers resolve that id against the users table and enforce active/admin
//! requirements here, at the boundary; workflow code below this layer takes
//! explicit actor ids and performs no authentication of its own.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use quotedesk_core::domain::user::{User, UserId};
use quotedesk_db::repositories::SqlUserRepository;
use quotedesk_db::DbPool;

use crate::errors::{repository_error, ApiError};

pub const ACTOR_HEADER: &str = "x-actor-id";

pub async fn resolve_actor(
    pool: &DbPool,
    headers: &HeaderMap,
    correlation_id: &str,
) -> Result<User, (StatusCode, Json<ApiError>)> {
    let actor_id = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| unauthorized("missing or malformed actor identity", correlation_id))?;

    let user = SqlUserRepository::new(pool.clone())
        .find_by_id(&UserId(actor_id))
        .await
        .map_err(|error| repository_error(error, correlation_id))?
        .ok_or_else(|| unauthorized("unknown actor identity", correlation_id))?;

    if !user.is_active {
        return Err(forbidden("actor account is not active", correlation_id));
    }

    Ok(user)
}

pub async fn require_admin(
    pool: &DbPool,
    headers: &HeaderMap,
    correlation_id: &str,
) -> Result<User, (StatusCode, Json<ApiError>)> {
    let user = resolve_actor(pool, headers, correlation_id).await?;
    if !user.is_admin() {
        return Err(forbidden("administrator role required", correlation_id));
    }
    Ok(user)
}

fn unauthorized(message: &str, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError {
            error: message.to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}

fn forbidden(message: &str, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::FORBIDDEN,
        Json(ApiError {
            error: message.to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, StatusCode};

    use quotedesk_core::domain::user::{NewUser, UserRole};
    use quotedesk_db::repositories::SqlUserRepository;
    use quotedesk_db::{connect_with_settings, migrations, DbPool};

    use super::{require_admin, resolve_actor, ACTOR_HEADER};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn headers_for(actor_id: i64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_str(&actor_id.to_string()).unwrap());
        headers
    }

    async fn activate(pool: &DbPool, user_id: i64) {
        sqlx::query("UPDATE users SET is_active = 1 WHERE id = ?")
            .bind(user_id)
            .execute(pool)
            .await
            .expect("activate user");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let pool = setup().await;

        let result = resolve_actor(&pool, &HeaderMap::new(), "req-1").await;
        let (status, _) = result.expect_err("should fail");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn inactive_actor_is_forbidden() {
        let pool = setup().await;
        let user = SqlUserRepository::new(pool.clone())
            .create(NewUser {
                login_id: "sales-01".to_string(),
                display_name: "Sales Rep".to_string(),
                role: UserRole::User,
            })
            .await
            .expect("create user");

        let result = resolve_actor(&pool, &headers_for(user.id.0), "req-2").await;
        let (status, _) = result.expect_err("should fail");
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_guard_rejects_plain_users_and_accepts_admins() {
        let pool = setup().await;
        let users = SqlUserRepository::new(pool.clone());

        let plain = users
            .create(NewUser {
                login_id: "sales-01".to_string(),
                display_name: "Sales Rep".to_string(),
                role: UserRole::User,
            })
            .await
            .expect("create user");
        let admin = users
            .create(NewUser {
                login_id: "admin".to_string(),
                display_name: "Administrator".to_string(),
                role: UserRole::Admin,
            })
            .await
            .expect("create admin");
        activate(&pool, plain.id.0).await;
        activate(&pool, admin.id.0).await;

        let (status, _) = require_admin(&pool, &headers_for(plain.id.0), "req-3")
            .await
            .expect_err("plain user should be rejected");
        assert_eq!(status, StatusCode::FORBIDDEN);

        let resolved = require_admin(&pool, &headers_for(admin.id.0), "req-4")
            .await
            .expect("admin should pass");
        assert_eq!(resolved.id, admin.id);
    }
}
