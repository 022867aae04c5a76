use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use tracing::debug;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;

/// Verifies the bearer access token and stores the principal in the request
/// extensions. Rejections are answered here with the standard envelope.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let secret = match req.app_data::<Data<Config>>() {
        Some(config) => config.jwt_secret.clone(),
        None => {
            let resp = AppError::Internal("App config missing".into()).error_response();
            return Ok(req.into_response(resp));
        }
    };

    let header_value = match req.headers().get("Authorization") {
        Some(h) => h.to_str().ok(),
        None => {
            let resp = AppError::Unauthenticated("Missing Authorization header".into())
                .error_response();
            return Ok(req.into_response(resp));
        }
    };

    let token = match header_value.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(t) => t.to_string(),
        None => {
            let resp = AppError::Unauthenticated(
                "Authorization header must start with Bearer".into(),
            )
            .error_response();
            return Ok(req.into_response(resp));
        }
    };

    let auth_user = match AuthUser::from_access_token(&token, &secret) {
        Ok(user) => user,
        Err(e) => {
            debug!(path = %req.path(), "Rejected token");
            return Ok(req.into_response(e.error_response()));
        }
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
