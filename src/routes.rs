use crate::{
    api::{attendance, attendance_summary, staff_shift},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::{AppError, NON_FIELD_ERRORS},
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP quotas, built once and shared by every worker thread.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min}/min"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Refresh and logout bodies; other payloads go through the field-aware extractors.
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        AppError::invalid(NON_FIELD_ERRORS, err.to_string()).into()
    }));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            )
            // /auth/{worker|staff|owner}/login
            .service(
                web::resource("/{role}/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .configure(api_routes),
    );
}

fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/attendance")
            // /attendance
            .service(
                web::resource("")
                    .route(web::post().to(attendance::upsert_attendance))
                    .route(web::get().to(attendance::get_attendance)),
            )
            // /attendance/history
            .service(
                web::resource("/history").route(web::get().to(attendance::attendance_history)),
            ),
    )
    .service(
        web::scope("/staff")
            // /staff/shifts
            .service(
                web::resource("/shifts")
                    .route(web::get().to(staff_shift::list_shifts))
                    .route(web::patch().to(staff_shift::edit_shift)),
            )
            // /staff/shifts/{id}
            .service(
                web::resource("/shifts/{id}")
                    .route(web::get().to(staff_shift::get_shift))
                    .route(web::delete().to(staff_shift::delete_shift)),
            )
            // /staff/shifts/{id}/audits
            .service(
                web::resource("/shifts/{id}/audits")
                    .route(web::get().to(staff_shift::shift_audits)),
            )
            // /staff/attendance-summary
            .service(
                web::resource("/attendance-summary")
                    .route(web::get().to(attendance_summary::monthly_summary)),
            ),
    );
}

// LOGIN /auth/{role}/login
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days, single use)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new token pair, old refresh token revoked
