//! Integration test: prediction server endpoints

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use mushroom_classifier::config::PipelineConfig;
use mushroom_classifier::pipeline::TrainingPipeline;
use mushroom_classifier::server::{create_router, AppState};
use mushroom_classifier::training::CandidateSet;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const EDIBLE_JSON: &str = r#"{"bruises":"t","gill-spacing":"c","gill-size":"b","gill-color":"n","stalk-root":"b","ring-type":"p","spore-print-color":"n"}"#;
const POISONOUS_FORM: &str =
    "bruises=f&gill-spacing=w&gill-size=n&gill-color=b&stalk-root=%3F&ring-type=e&spore-print-color=k";

fn test_app(config: PipelineConfig) -> axum::Router {
    create_router(Arc::new(AppState::new(config)))
}

/// Train on a small separable dataset so the artifacts exist
fn trained_config(dir: &Path) -> PipelineConfig {
    let mut lines = vec![
        "class,bruises,gill-spacing,gill-size,gill-color,stalk-root,ring-type,spore-print-color".to_string(),
    ];
    // Uneven category frequencies so the fitted scale factors are not short decimals
    for i in 0..10 {
        let edible_color = ["n", "n", "w"][i % 3];
        let poison_root = ["?", "c", "?"][i % 3];
        lines.push(format!("e,t,c,b,{},b,p,n", edible_color));
        lines.push(format!("p,f,w,n,b,{},e,k", poison_root));
    }
    let source = dir.join("mushrooms.csv");
    std::fs::write(&source, lines.join("\n") + "\n").unwrap();

    let config = PipelineConfig::with_artifacts_dir(dir.join("artifacts"));
    let candidates = CandidateSet::builtin().unwrap().retain_names(&["Decision Tree"]);
    TrainingPipeline::new(config.clone())
        .with_candidates(candidates)
        .run(&source)
        .unwrap();
    config
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn json_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(PipelineConfig::with_artifacts_dir(dir.path()));
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_ready"], false);
}

#[tokio::test]
async fn test_root_serves_form() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(PipelineConfig::with_artifacts_dir(dir.path()));
    for uri in ["/", "/predict_datapoint"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("name=\"spore-print-color\""));
        assert!(page.contains("action=\"/predict_datapoint\""));
    }
}

#[tokio::test]
async fn test_missing_field_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(PipelineConfig::with_artifacts_dir(dir.path()));
    let response = app.oneshot(json_request(r#"{"bruises":"t"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "Missing field: gill-spacing");
}

#[tokio::test]
async fn test_untrained_server_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(PipelineConfig::with_artifacts_dir(dir.path()));
    let response = app.oneshot(json_request(EDIBLE_JSON)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_json_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(trained_config(dir.path()));
    let response = app.oneshot(json_request(EDIBLE_JSON)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["prediction"], "edible");
}

#[tokio::test]
async fn test_form_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(trained_config(dir.path()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict_datapoint")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(POISONOUS_FORM))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("The mushroom is poisonous"));
}

#[tokio::test]
async fn test_form_with_blank_field_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(trained_config(dir.path()));
    let form = POISONOUS_FORM.replace("ring-type=e", "ring-type=");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict_datapoint")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Missing field: ring-type"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(PipelineConfig::with_artifacts_dir(dir.path()));
    let response = app
        .oneshot(Request::builder().uri("/api/unknown").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
