//! Video analysis flow tests.
//!
//! Drives `/api/analyze-video` past the request guards: the frame-dir
//! cleanup contract on failure, and the probe/extract/sample/VLM pipeline
//! against a generated clip when the ffmpeg suite is installed.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use burnsight::config::{Config, VlmConfig};
use burnsight::server::{create_router, AppContext};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIDEO_ID: &str = "20231004_153000";

fn create_test_context() -> (AppContext, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();

    (AppContext::from_config(config), dir)
}

async fn body_to_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn analyze_request() -> Request<Body> {
    let body = serde_json::json!({ "video_id": VIDEO_ID });
    Request::post("/api/analyze-video")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn ffmpeg_suite_available() -> bool {
    burnsight::video::check_tools().iter().all(|t| t.available)
}

/// Analysis of a broken upload must fail with a server error and still
/// remove the per-video frame directory.
#[tokio::test]
async fn test_analyze_video_failure_cleans_frame_dir() {
    let (ctx, dir) = create_test_context();
    let app = create_router(ctx, None);

    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    std::fs::write(
        uploads.join(format!("{VIDEO_ID}_broken.mp4")),
        b"not a real video",
    )
    .unwrap();

    // Stale frames from an earlier run sit in the per-id directory; failure
    // must not leave them behind.
    let frames_dir = dir.path().join("frames").join(VIDEO_ID);
    std::fs::create_dir_all(&frames_dir).unwrap();
    std::fs::write(frames_dir.join("frame_0001.jpg"), b"stale").unwrap();

    let response = app.oneshot(analyze_request()).await.unwrap();

    // Probing garbage fails whether or not ffprobe is installed.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], false);
    assert!(json["message"].is_string());

    assert!(!frames_dir.exists());
}

/// Full pipeline: a synthetic clip is probed, frames are extracted and
/// sampled, and the batched VLM response is relayed. Frames are cleaned up
/// on success too.
#[tokio::test]
async fn test_analyze_video_extracts_frames_and_relays_analysis() {
    if !ffmpeg_suite_available() {
        eprintln!("ffmpeg suite not installed, skipping");
        return;
    }

    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("image_url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Two deer cross the clearing." }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.vlm = VlmConfig {
        api_url: server.uri(),
        api_key: Some("test-key".to_string()),
        requests_per_second: 50,
        ..VlmConfig::default()
    };

    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    let video_path = uploads.join(format!("{VIDEO_ID}_clip.mp4"));

    // Three seconds of test pattern; mpeg4 keeps the encoder in the stock
    // ffmpeg build.
    let status = std::process::Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=3:size=64x64:rate=2",
            "-c:v",
            "mpeg4",
        ])
        .arg(&video_path)
        .status()
        .unwrap();
    assert!(status.success(), "failed to generate test clip");

    let app = create_router(AppContext::from_config(config), None);
    let response = app.oneshot(analyze_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["video_id"], VIDEO_ID);
    assert_eq!(json["analysis"], "Two deer cross the clearing.");
    assert!(json["frames_analyzed"].as_u64().unwrap() >= 1);
    assert!(json["video_metadata"]["duration_secs"].as_f64().unwrap() > 0.0);

    // Frames are scratch data; gone after a successful run as well.
    assert!(!dir.path().join("frames").join(VIDEO_ID).exists());
}
