//! Router-level tests with no live database
//!
//! The pool is constructed lazily against a dead address, so handlers
//! that touch the database surface their failure paths while the rest of
//! the routing is exercised for real.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use tapestry_ingest::orchestrator::Orchestrator;
use tapestry_ingest::store::{ItemStore, PgItemStore};
use tapestry_server::{config::Config, create_router, AppState};

fn test_state() -> AppState {
    // Port 9 is discard; nothing listens there, so any query fails fast.
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy("postgresql://postgres@127.0.0.1:9/none")
        .unwrap();

    let orchestrator = Orchestrator::with_parts(
        Arc::new(PgItemStore::new(pool.clone())) as Arc<dyn ItemStore>,
        Vec::new(),
        Duration::from_secs(5),
        Duration::ZERO,
        None,
    );

    AppState {
        db: pool,
        orchestrator: Arc::new(orchestrator),
    }
}

fn with_peer(mut request: Request<Body>) -> Request<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40001))));
    request
}

#[tokio::test]
async fn root_banner_responds() {
    let app = create_router(test_state(), &Config::default());
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_reports_unavailable_without_a_database() {
    let app = create_router(test_state(), &Config::default());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn sources_listing_responds() {
    let app = create_router(test_state(), &Config::default());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/sources")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_source_trigger_is_not_found() {
    let app = create_router(test_state(), &Config::default());
    let request = with_peer(
        Request::builder()
            .method("POST")
            .uri("/api/ingest/no-such-source")
            .body(Body::empty())
            .unwrap(),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = create_router(test_state(), &Config::default());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/nothing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
