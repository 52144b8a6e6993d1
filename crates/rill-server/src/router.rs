use axum::routing::{get, post};
use axum::Router;
use rill_pipeline::Pipeline;
use tower_http::trace::TraceLayer;

use crate::handler;

/// Build the axum router with all Rill endpoints.
pub fn build_router(pipeline: Pipeline) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/ingest/:endpoint", post(handler::ingest_handler))
        .route("/v1/tables/:name", get(handler::table_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use rill_events::{DiagnosticSink, Dispatcher, MemorySink};
    use rill_pipeline::PipelineConfig;
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::*;

    fn pipeline(dir: &std::path::Path) -> Pipeline {
        pipeline_with_sink(dir).0
    }

    fn pipeline_with_sink(dir: &std::path::Path) -> (Pipeline, Arc<MemorySink>) {
        let config = PipelineConfig {
            data_dir: dir.to_path_buf(),
            encode_delay_ms: 10,
            max_inflight: 8,
        };
        let sink = Arc::new(MemorySink::new());
        let dispatcher =
            Dispatcher::new(config.dispatch(), sink.clone() as Arc<dyn DiagnosticSink>).unwrap();
        (Pipeline::build(&config, dispatcher).unwrap(), sink)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn ingest(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(pipeline(dir.path()));
        let response = app.oneshot(get("/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ingest_then_read_table() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let app = build_router(pipeline.clone());

        let response = app
            .clone()
            .oneshot(ingest("/v1/ingest/rawMovies?id=m1&status=active", r#"{"title":"Foo"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], "m1");
        assert_eq!(body["status"], "active");
        assert_eq!(body["source"], "rawMovies");
        assert_eq!(body["outcome"], "update");

        pipeline.settle().await;

        let response = app.oneshot(get("/v1/tables/standardVideo")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let records = json_body(response).await;
        assert_eq!(records[0]["id"], "m1");
        assert_eq!(records[0]["data"]["title"], "Foo");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn status_defaults_to_active() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(pipeline(dir.path()));
        let response = app
            .oneshot(ingest("/v1/ingest/rawActors?id=a1", r#"{"name":"Ada"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "active");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unknown_endpoint_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(pipeline(dir.path()));
        let response = app
            .oneshot(ingest("/v1/ingest/rawEpisodes?id=e1", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unknown_table_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(pipeline(dir.path()));
        let response = app.oneshot(get("/v1/tables/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn bad_status_and_body_are_400() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, sink) = pipeline_with_sink(dir.path());
        let app = build_router(pipeline);

        let response = app
            .clone()
            .oneshot(ingest("/v1/ingest/rawMovies?id=m1&status=archived", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(ingest("/v1/ingest/rawMovies?id=m1", "{oops"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("decode"));

        let errors = sink.errors();
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].contains("archived"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn missing_id_is_rejected_with_a_line() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, sink) = pipeline_with_sink(dir.path());
        let app = build_router(pipeline);

        let response = app.oneshot(ingest("/v1/ingest/rawMovies", "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("missing id"));
    }
}
