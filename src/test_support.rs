use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::Method;
use actix_web::test::{self, TestRequest};
use actix_web::web::Data;
use actix_web::{App, Error};
use serde_json::Value;

use crate::auth::jwt::generate_access_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::routes::{self, Limiters};
use crate::storage::AppState;
use crate::storage::memory::MemoryStore;

pub const PASSWORD: &str = "s3cret-pass";

pub fn test_config() -> Config {
    Config {
        database_url: "mysql://unused".to_string(),
        jwt_secret: "test-secret".to_string(),
        server_addr: "127.0.0.1:0".to_string(),
        access_token_ttl: 900,
        refresh_token_ttl: 3600,
        rate_login_per_min: 1000,
        rate_refresh_per_min: 1000,
        rate_protected_per_min: 1000,
        api_prefix: "/api/v1".to_string(),
        summary_page_size: 25,
        max_page_size: 100,
        log_dir: "logs".to_string(),
        log_level: "debug".to_string(),
    }
}

/// Full route table over one in-memory store.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub config: Config,
    limiters: Limiters,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let limiters = Limiters::from_config(&config).expect("limiters");
        Self {
            store: Arc::new(MemoryStore::new()),
            config,
            limiters,
        }
    }

    pub fn build(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl MessageBody + use<>>,
            Error = Error,
            InitError = (),
        > + use<>,
    > {
        let state = AppState {
            shifts: self.store.clone(),
            accounts: self.store.clone(),
        };
        let config = self.config.clone();
        let limiters = self.limiters.clone();

        App::new()
            .app_data(Data::new(state))
            .app_data(Data::new(config.clone()))
            .configure(move |cfg| routes::configure(cfg, &config, &limiters))
    }

    fn token(&self, user_id: u64, username: &str, role: Role) -> String {
        generate_access_token(
            user_id,
            username,
            role,
            &self.config.jwt_secret,
            self.config.access_token_ttl,
        )
        .expect("token")
    }

    /// Seeds a worker login and returns (access token, worker id).
    pub fn worker_login(&self, username: &str, full_name: &str, code: &str) -> (String, u64) {
        let user = self.store.add_user(username, PASSWORD, full_name, "");
        let worker = self.store.add_worker(Some(user), full_name, code);
        (self.token(user, username, Role::Worker), worker)
    }

    /// Seeds a staff login and returns (access token, staff id).
    pub fn staff_login(&self, username: &str, full_name: &str, code: &str) -> (String, u64) {
        let user = self.store.add_user(username, PASSWORD, full_name, "");
        let staff = self.store.add_staff(Some(user), full_name, code);
        (self.token(user, username, Role::Staff), staff)
    }

    /// Seeds an owner login and returns (access token, owner id).
    pub fn owner_login(&self, username: &str, first_name: &str, last_name: &str) -> (String, u64) {
        let user = self.store.add_user(username, PASSWORD, first_name, last_name);
        let owner = self.store.add_owner(user);
        (self.token(user, username, Role::Owner), owner)
    }

    pub fn request(&self, method: Method, uri: &str, token: &str) -> TestRequest {
        anonymous(method, uri).insert_header(("Authorization", format!("Bearer {token}")))
    }

    pub fn get(&self, uri: &str, token: &str) -> TestRequest {
        self.request(Method::GET, uri, token)
    }

    pub fn post(&self, uri: &str, token: &str) -> TestRequest {
        self.request(Method::POST, uri, token)
    }

    pub fn patch(&self, uri: &str, token: &str) -> TestRequest {
        self.request(Method::PATCH, uri, token)
    }

    pub fn delete(&self, uri: &str, token: &str) -> TestRequest {
        self.request(Method::DELETE, uri, token)
    }
}

/// A request without credentials. Carries a peer address for the limiter.
pub fn anonymous(method: Method, uri: &str) -> TestRequest {
    let peer: SocketAddr = "127.0.0.1:40000".parse().expect("addr");
    TestRequest::default()
        .method(method)
        .uri(uri)
        .peer_addr(peer)
}

pub async fn body_json<B: MessageBody>(resp: ServiceResponse<B>) -> Value {
    test::read_body_json(resp).await
}
