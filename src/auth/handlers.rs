use std::str::FromStr;

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    api::{extract::FieldJson, ok_json},
    auth::{
        auth::bearer_token,
        identity::live_user,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::{AppError, FieldErrors},
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, LoginResponse, TokenPair, TokenType},
    storage::{AccountStore, AppState},
};

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[serde(alias = "refresh")]
    pub refresh_token: String,
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token encoding failed: {e}"))
}

fn expiry(claims: &Claims) -> DateTime<Utc> {
    DateTime::from_timestamp(claims.exp as i64, 0).unwrap_or_else(Utc::now)
}

/// Issues a fresh access/refresh pair and records the refresh `jti`.
async fn issue_tokens(
    accounts: &dyn AccountStore,
    config: &Config,
    user_id: u64,
    username: &str,
    role: Role,
) -> Result<TokenPair, AppError> {
    let access_token = generate_access_token(
        user_id,
        username,
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        username,
        role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");
    accounts
        .store_refresh_token(user_id, &refresh_claims.jti, expiry(&refresh_claims))
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Identity id and display name of `user` under `role`.
async fn linked_identity(
    accounts: &dyn AccountStore,
    user: &User,
    role: Role,
) -> Result<(u64, String), AppError> {
    let identity = match role {
        Role::Worker => accounts
            .worker_for_user(user.id)
            .await?
            .filter(|w| w.is_active)
            .map(|w| (w.id, w.full_name)),
        Role::Staff => accounts
            .staff_for_user(user.id)
            .await?
            .filter(|s| s.is_active)
            .map(|s| (s.id, s.full_name)),
        Role::Owner => accounts
            .owner_for_user(user.id)
            .await?
            .map(|o| (o.id, user.display_name())),
    };

    identity.ok_or_else(|| AppError::forbidden(format!("No active {role} profile for this account")))
}

#[utoipa::path(
    post,
    path = "/auth/{role}/login",
    request_body = LoginReqDto,
    params(
        ("role", description = "worker, staff or owner")
    ),
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing login or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account not linked to this role")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(state, config, user, role),
    fields(login = %user.login, role = %role)
)]
pub async fn login(
    role: web::Path<String>,
    user: FieldJson<LoginReqDto>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");
    let role = Role::from_str(&role)
        .map_err(|_| AppError::NotFound(format!("Unknown login role {role}")))?;

    let mut errors = FieldErrors::new();
    if user.login.trim().is_empty() {
        errors.add("login", "This field may not be blank.");
    }
    if user.password.is_empty() {
        errors.add("password", "This field may not be blank.");
    }
    errors.into_result()?;

    let db_user = match state.accounts.find_user_by_login(user.login.trim()).await? {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Invalid credentials: inactive user");
            return Err(AppError::Unauthenticated("Invalid credentials".into()));
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthenticated("Invalid credentials".into()));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthenticated("Invalid credentials".into()));
    }

    let (identity_id, name) = linked_identity(state.accounts.as_ref(), &db_user, role).await?;
    let tokens = issue_tokens(
        state.accounts.as_ref(),
        &config,
        db_user.id,
        &db_user.username,
        role,
    )
    .await?;

    info!(user_id = db_user.id, identity_id, "Login successful");

    Ok(ok_json(
        "Login successful",
        LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            name,
            role,
            identity_id,
        },
    ))
}

/// Refresh token from the JSON body, else from the Authorization header.
fn presented_refresh_token(req: &HttpRequest, body: Option<web::Json<RefreshRequest>>) -> Option<String> {
    body.map(|b| b.into_inner().refresh_token)
        .or_else(|| bearer_token(req).map(str::to_string))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, expired or already used, or account inactive"),
        (status = 403, description = "Account no longer linked to this role")
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = presented_refresh_token(&req, body)
        .ok_or_else(|| AppError::Unauthenticated("No token".into()))?;

    let claims = verify_token(&token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthenticated("Invalid token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthenticated("Refresh token required".into()));
    }

    // Single use: a second presentation of the same jti finds nothing to revoke.
    if !state
        .accounts
        .consume_refresh_token(&claims.jti, Utc::now())
        .await?
    {
        warn!(user_id = claims.user_id, jti = %claims.jti, "Refresh token reuse or expiry");
        return Err(AppError::Unauthenticated("Invalid token".into()));
    }

    let user = live_user(state.accounts.as_ref(), claims.user_id).await?;
    linked_identity(state.accounts.as_ref(), &user, claims.role).await?;

    let tokens = issue_tokens(
        state.accounts.as_ref(),
        &config,
        user.id,
        &user.username,
        claims.role,
    )
    .await?;

    Ok(ok_json("Token refreshed", tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Refresh token revoked (or nothing to revoke)")
    ),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = presented_refresh_token(&req, body) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // Idempotent
    if let Err(e) = state
        .accounts
        .consume_refresh_token(&claims.jti, Utc::now())
        .await
    {
        warn!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use crate::test_support::{PASSWORD, TestApp, anonymous, body_json};
    use actix_web::http::{Method, StatusCode};
    use actix_web::test;
    use serde_json::json;

    #[actix_web::test]
    async fn login_is_scoped_to_the_requested_role() {
        let app = TestApp::new();
        let (_, worker_id) = app.worker_login("ravi", "Ravi Das", "W-01");
        let svc = test::init_service(app.build()).await;

        let req = anonymous(Method::POST, "/auth/worker/login")
            .set_json(json!({"username": "ravi", "password": PASSWORD}))
            .to_request();
        let resp = test::call_service(&svc, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let data = body_json(resp).await["data"].clone();
        assert_eq!(data["role"], "worker");
        assert_eq!(data["identity_id"], worker_id);
        assert_eq!(data["name"], "Ravi Das");
        assert!(data["access_token"].is_string());

        let req = anonymous(Method::POST, "/auth/staff/login")
            .set_json(json!({"login": "ravi", "password": PASSWORD}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::FORBIDDEN);

        let req = anonymous(Method::POST, "/auth/worker/login")
            .set_json(json!({"email": "ravi@example.com", "password": "wrong"}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = anonymous(Method::POST, "/auth/admin/login")
            .set_json(json!({"login": "ravi", "password": PASSWORD}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn blank_credentials_are_field_errors() {
        let app = TestApp::new();
        let svc = test::init_service(app.build()).await;

        let req = anonymous(Method::POST, "/auth/owner/login")
            .set_json(json!({"login": " ", "password": ""}))
            .to_request();
        let resp = test::call_service(&svc, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert!(body["errors"]["login"].is_array());
        assert!(body["errors"]["password"].is_array());
    }

    #[actix_web::test]
    async fn refresh_rotates_and_logout_revokes() {
        let app = TestApp::new();
        app.staff_login("sara", "Sara Khan", "S-01");
        let svc = test::init_service(app.build()).await;

        let req = anonymous(Method::POST, "/auth/staff/login")
            .set_json(json!({"login": "sara", "password": PASSWORD}))
            .to_request();
        let data = body_json(test::call_service(&svc, req).await).await["data"].clone();
        let first = data["refresh_token"].as_str().unwrap().to_string();

        let req = anonymous(Method::POST, "/auth/refresh")
            .set_json(json!({"refresh_token": first}))
            .to_request();
        let resp = test::call_service(&svc, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let second = body_json(resp).await["data"]["refresh_token"]
            .as_str()
            .unwrap()
            .to_string();

        // The rotated-out token is single use.
        let req = anonymous(Method::POST, "/auth/refresh")
            .set_json(json!({"refresh_token": first}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = anonymous(Method::POST, "/auth/logout")
            .set_json(json!({"refresh": second}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::NO_CONTENT);

        let req = anonymous(Method::POST, "/auth/refresh")
            .set_json(json!({"refresh_token": second}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = anonymous(Method::POST, "/auth/logout").to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::NO_CONTENT);
    }

    /// Worker login through the API; yields (access, refresh).
    macro_rules! login_tokens {
        ($svc:expr, $login:expr) => {{
            let req = anonymous(Method::POST, "/auth/worker/login")
                .set_json(json!({"login": $login, "password": PASSWORD}))
                .to_request();
            let data = body_json(test::call_service($svc, req).await).await["data"].clone();
            (
                data["access_token"].as_str().unwrap().to_string(),
                data["refresh_token"].as_str().unwrap().to_string(),
            )
        }};
    }

    #[actix_web::test]
    async fn refresh_rechecks_the_account() {
        let app = TestApp::new();
        app.worker_login("ravi", "Ravi Das", "W-01");
        let (_, mina_worker) = app.worker_login("mina", "Mina Roy", "W-02");
        let svc = test::init_service(app.build()).await;

        let (access, refresh) = login_tokens!(&svc, "ravi");
        app.store.remove_user(1);

        let req = anonymous(Method::POST, "/auth/refresh")
            .set_json(json!({"refresh_token": refresh}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = app
            .post("/api/v1/attendance", &access)
            .set_json(json!({"shift_type": "day"}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.store.shift_count(), 0);

        let (_, refresh) = login_tokens!(&svc, "mina");
        app.store.set_user_active(2, false);
        let req = anonymous(Method::POST, "/auth/refresh")
            .set_json(json!({"refresh_token": refresh}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);

        app.store.set_user_active(2, true);
        let (_, refresh) = login_tokens!(&svc, "mina");
        app.store.set_worker_active(mina_worker, false);
        let req = anonymous(Method::POST, "/auth/refresh")
            .set_json(json!({"refresh_token": refresh}))
            .to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn access_token_cannot_refresh() {
        let app = TestApp::new();
        let (token, _) = app.worker_login("ravi", "Ravi Das", "W-01");
        let svc = test::init_service(app.build()).await;

        let req = app.post("/auth/refresh", &token).to_request();
        assert_eq!(test::call_service(&svc, req).await.status(), StatusCode::UNAUTHORIZED);
    }
}
