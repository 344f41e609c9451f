//! The HTTP front-end: JSON API + DynDNS-style "simple" API under a
//! configurable prefix, plus an optional welcome route. Built on `axum`,
//! the stack the closest HTTP-serving repo in the example pack
//! (`bindcar`) uses for its own REST API, with a hand-rolled logging
//! layer in the teacher's own `log`-based idiom rather than a second
//! logging framework.

mod auth;
mod json_api;
mod simple_api;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::backend::Backend;
use crate::config::HttpConfig;
use crate::engine::UpdateEngine;
use crate::error::Result;
use crate::metric::{self, Counters};

pub struct AppState {
    backend: Arc<dyn Backend>,
    engine: Arc<UpdateEngine>,
    default_ttl: u32,
}

pub struct HttpFrontend {
    state: Arc<AppState>,
    stats: Arc<Counters>,
    enable_metrics: bool,
}

impl HttpFrontend {
    pub fn new(backend: Arc<dyn Backend>, engine: Arc<UpdateEngine>, default_ttl: u32, enable_metrics: bool) -> Self {
        Self {
            state: Arc::new(AppState { backend, engine, default_ttl }),
            stats: Arc::new(Counters::default()),
            enable_metrics,
        }
    }

    pub async fn run(self, config: &HttpConfig) -> Result<()> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        log::info!(target: "http", "listening on {}", config.bind_addr);

        if self.enable_metrics {
            tokio::spawn(metric::log_periodically("http", self.stats.clone()));
        }

        let app = self.router(config);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!(target: "http", "http server exited: {e}");
            }
        });

        Ok(())
    }

    fn router(self, config: &HttpConfig) -> Router {
        let prefix = config.prefix.trim_end_matches('/');
        let mut router = Router::new();

        if config.enable_json_api {
            router = router.route(&format!("{prefix}/v1/update"), post(json_api::handle_update));
        }
        if config.enable_simple_api {
            router = router.route(&format!("{prefix}/v1/simple"), get(simple_api::handle_simple));
        }
        if config.enable_welcome {
            router = router.route(prefix, get(welcome));
        }

        router
            .with_state(self.state)
            .layer(middleware::from_fn_with_state(self.stats, log_requests))
    }
}

/// Minimal placeholder: per spec section 1's Non-goals, the welcome
/// page's *content* is out of scope, only the route's existence is not.
async fn welcome() -> &'static str {
    "dnsup dynamic DNS update service"
}

async fn log_requests(State(stats): State<Arc<Counters>>, request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    stats.record(response.status().is_success());
    log::info!(
        target: "http",
        "{method} {path} -> {} in {:?}",
        response.status(),
        started.elapsed()
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::{KeyInfo, ZoneInfo};
    use crate::config::HttpConfig;
    use crate::engine::UpdateEngine;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use tower::ServiceExt;

    async fn test_app() -> (Router, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .add_zone(ZoneInfo {
                name: "example.org".to_string(),
                hostname: "ns1.example.org".to_string(),
                serial: 1,
                ttl: 300,
            })
            .await;
        backend
            .add_key(KeyInfo {
                name: "update-key".to_string(),
                secret: b"s3cret".to_vec(),
                algorithm: "hmac-sha256".to_string(),
                zones: vec!["example.org".to_string()],
            })
            .await;

        let engine = Arc::new(UpdateEngine::new(backend.clone(), 120));
        let frontend = HttpFrontend::new(backend.clone(), engine, 300, false);
        let router = frontend.router(&HttpConfig {
            prefix: "/dnsup".to_string(),
            enable_welcome: true,
            ..Default::default()
        });
        (router, backend)
    }

    #[tokio::test]
    async fn json_update_persists_and_returns_ok() {
        let (app, backend) = test_app().await;
        let body = serde_json::json!({
            "zone": "example.org",
            "key": "s3cret",
            "updates": [{"op": "add", "dns_name": "www.example.org", "type": "A", "ttl": 300, "data": "1.2.3.4"}]
        });
        let request = Request::builder()
            .method("POST")
            .uri("/dnsup/v1/update")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(std::str::from_utf8(&bytes).unwrap().contains("\"ok\""));

        let zones = backend.get_all_zones().await.unwrap();
        assert_eq!(zones["example.org"].serial, 2);
    }

    #[tokio::test]
    async fn json_update_below_minimum_ttl_is_rejected_with_no_change() {
        let (app, backend) = test_app().await;
        let body = serde_json::json!({
            "zone": "example.org",
            "key": "s3cret",
            "updates": [{"op": "add", "dns_name": "www.example.org", "type": "A", "ttl": 60, "data": "1.2.3.4"}]
        });
        let request = Request::builder()
            .method("POST")
            .uri("/dnsup/v1/update")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let zones = backend.get_all_zones().await.unwrap();
        assert_eq!(zones["example.org"].serial, 1);
    }

    #[tokio::test]
    async fn json_update_wrong_key_is_forbidden() {
        let (app, _backend) = test_app().await;
        let body = serde_json::json!({
            "zone": "example.org",
            "key": "not-the-secret",
            "updates": [{"op": "add", "dns_name": "www.example.org", "type": "A", "ttl": 300, "data": "1.2.3.4"}]
        });
        let request = Request::builder()
            .method("POST")
            .uri("/dnsup/v1/update")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn simple_update_adds_a_and_aaaa_records() {
        let (app, backend) = test_app().await;
        let auth = format!("Basic {}", STANDARD.encode(b"example.org:s3cret"));
        let request = Request::builder()
            .uri("/dnsup/v1/simple?hostname=h.example.org&myip=1.2.3.4,2001:db8::1")
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), "good 1.2.3.4,2001:db8::1");

        let zones = backend.get_all_zones().await.unwrap();
        assert_eq!(zones["example.org"].serial, 2);
    }

    #[tokio::test]
    async fn simple_update_bad_secret_returns_badauth() {
        let (app, _backend) = test_app().await;
        let auth = format!("Basic {}", STANDARD.encode(b"example.org:wrong"));
        let request = Request::builder()
            .uri("/dnsup/v1/simple?hostname=h.example.org&myip=1.2.3.4")
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), "badauth");
    }

    #[tokio::test]
    async fn welcome_route_is_served_when_enabled() {
        let (app, _backend) = test_app().await;
        let request = Request::builder().uri("/dnsup").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
