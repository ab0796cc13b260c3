//! Integration tests for HttpBackend using wiremock.
//!
//! These tests check the REST contract against a mock backend.

use std::{sync::Arc, time::Duration};

use agri_core::{
    AgriBackend, ApiError, Config, DetectionKind, HttpBackend, ImageUpload, PredictionView,
    ReplyFormat, Session, WeatherView,
};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn leaf() -> ImageUpload {
    ImageUpload::from_bytes("leaf.jpg".into(), b"fake-jpeg-bytes".to_vec(), 1024).unwrap()
}

#[tokio::test]
async fn test_disease_prediction_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/disease-prediction/"))
        .and(body_string_contains("name=\"file\"; filename=\"leaf.jpg\""))
        .and(body_string_contains("fake-jpeg-bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "disease": "Tomato__Late_blight",
            "confidence": 92.3
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let diagnosis = backend.predict_disease(&leaf()).await.unwrap();

    assert_eq!(diagnosis.plant.as_deref(), Some("Tomato"));
    assert_eq!(diagnosis.name, "Late blight");
    assert_eq!(diagnosis.confidence.unwrap().to_string(), "92.3%");
}

#[tokio::test]
async fn test_pest_prediction_with_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pest-prediction/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "predicted_pest": "armyworm",
            "confidence": 88.5,
            "top_3_predictions": [
                {"pest": "armyworm", "confidence": 88.5},
                {"pest": "bollworm", "confidence": 7.1}
            ]
        })))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let diagnosis = backend.predict_pest(&leaf()).await.unwrap();

    assert_eq!(diagnosis.kind, DetectionKind::Pest);
    assert_eq!(diagnosis.name, "armyworm");
    assert_eq!(diagnosis.candidates.len(), 2);
    assert_eq!(diagnosis.candidates[1].label, "bollworm");
}

#[tokio::test]
async fn test_prediction_backend_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/disease-prediction/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error": "Failed to preprocess image"
        })))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let err = backend.predict_disease(&leaf()).await.unwrap_err();

    assert!(matches!(err, ApiError::Backend(ref msg) if msg == "Failed to preprocess image"));
}

#[tokio::test]
async fn test_prediction_malformed_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pest-prediction/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let err = backend.predict_pest(&leaf()).await.unwrap_err();

    assert!(matches!(err, ApiError::Decode { context: "pest prediction", .. }));
}

#[tokio::test]
async fn test_session_renders_error_on_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/disease-prediction/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let mut session = Session::new(Box::new(backend), Config::default());

    let view = session.predict(DetectionKind::Disease, &leaf()).await;
    assert_eq!(view.label(), "Error");
    assert_eq!(view.confidence_text(), "--");
}

#[tokio::test]
async fn test_chat_query_is_encoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chatbot/"))
        .and(query_param("query", "rice & wheat?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "```html\n<p>Rotate them.</p>\n```"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let reply = backend.chat("rice & wheat?").await.unwrap();

    assert_eq!(reply.format, ReplyFormat::Markup);
    assert_eq!(reply.body, "<p>Rotate them.</p>");
}

#[tokio::test]
async fn test_newer_chat_cancels_older() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chatbot/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"response": "ok"}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let backend = Arc::new(HttpBackend::new(&mock_server.uri()).unwrap());

    let older = {
        let backend = Arc::clone(&backend);
        tokio::spawn(async move { backend.chat("first").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let newer = backend.chat("second").await.unwrap();
    assert_eq!(newer.body, "ok");
    assert!(matches!(older.await.unwrap(), Err(ApiError::Cancelled)));
}

#[tokio::test]
async fn test_clear_memory_posts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/clear-memory/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    backend.clear_memory().await.unwrap();
}

#[tokio::test]
async fn test_clear_memory_missing_route_still_resets_transcript() {
    let mock_server = MockServer::start().await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    assert!(matches!(backend.clear_memory().await, Err(ApiError::Status { .. })));

    let mut session = Session::new(Box::new(backend), Config::default());
    session.clear_memory().await;
    assert_eq!(session.transcript().len(), 1);
}

#[tokio::test]
async fn test_set_location_put_with_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/set-location/"))
        .and(query_param("location", "Pune"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "Location set to Pune"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let mut session = Session::new(Box::new(backend), Config::default());

    let confirmation = session.set_location("Pune").await.unwrap();
    assert_eq!(confirmation, "Location set to Pune");
    assert_eq!(session.location(), Some("Pune"));
}

#[tokio::test]
async fn test_weather_for_location() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather/New%20Delhi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "location": "New Delhi",
            "region": "Delhi",
            "country": "India",
            "temperature": 34.0,
            "conditions": "Haze",
            "humidity": 38,
            "rainfall": 0.2,
            "wind_speed": 14.4,
            "uv_index": 8.0,
            "forecast": [{"day": {"condition": {"text": "Hazy", "icon": "//cdn.weatherapi.com/x.png"}}}]
        })))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let report = backend.weather(Some("New Delhi")).await.unwrap();

    assert_eq!(report.display_name(), "New Delhi, Delhi");
    assert_eq!(report.condition_text(), "Hazy");
    assert_eq!(report.icon_url().as_deref(), Some("https://cdn.weatherapi.com/x.png"));
}

#[tokio::test]
async fn test_weather_failure_is_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather/"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": "Failed to fetch weather data"
        })))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let session = Session::new(Box::new(backend), Config::default());

    assert_eq!(session.weather(None).await, WeatherView::Unavailable);
}

#[tokio::test]
async fn test_session_disease_with_formatted_confidence() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/disease-prediction/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "disease": "Tomato___Late_blight",
            "confidence": "92.30%"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let mut session = Session::new(Box::new(backend), Config::default());

    let view = session.predict(DetectionKind::Disease, &leaf()).await;
    assert_eq!(view.plant(), Some("Tomato"));
    assert_eq!(view.label(), "Late blight");
    assert_eq!(view.confidence_text(), "92.3%");
    assert!(session.last_detection(DetectionKind::Disease).is_some());
}

#[tokio::test]
async fn test_session_pest_success_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pest-prediction/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "predicted_pest": "Aphids",
            "confidence": 87.42,
            "top_3_predictions": [
                {"pest": "Aphids", "confidence": 87.42},
                {"pest": "Whitefly", "confidence": 8.13},
                {"pest": "Thrips", "confidence": 2.05}
            ]
        })))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let mut session = Session::new(Box::new(backend), Config::default());

    let view = session.predict(DetectionKind::Pest, &leaf()).await;
    assert_eq!(view.label(), "Aphids");
    assert_eq!(view.confidence_text(), "87.42%");

    let diagnosis = view.diagnosis().unwrap();
    assert_eq!(diagnosis.candidates.len(), 3);
    assert_eq!(diagnosis.candidates[2].label, "Thrips");
    assert_eq!(diagnosis.candidates[2].confidence, 2.05);
}

#[tokio::test]
async fn test_session_pest_rejected_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pest-prediction/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error": "Model not loaded"
        })))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let mut session = Session::new(Box::new(backend), Config::default());

    let view = session.predict(DetectionKind::Pest, &leaf()).await;
    assert_eq!(view, PredictionView::Rejected { message: "Model not loaded".into() });
    assert_eq!(view.label(), "Error");
    assert!(session.last_detection(DetectionKind::Pest).is_none());
}

#[tokio::test]
async fn test_cached_location_weather_uses_bare_route() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "location": "Pune",
            "temperature": 31.0,
            "conditions": "Sunny",
            "humidity": 35,
            "rainfall": 0.0,
            "wind_speed": 11.2,
            "uv_index": 7.0,
            "forecast": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weather/Pune"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut cfg = Config::default();
    cfg.set_location("Pune").unwrap();
    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let session = Session::new(Box::new(backend), cfg);

    let view = session.startup_weather().await.unwrap();
    assert!(matches!(view, WeatherView::Ready(ref r) if r.location == "Pune"));
}

#[tokio::test]
async fn test_crop_advice_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crop-advice/"))
        .and(query_param("crop_name", "basmati rice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "advice": "```html\n<p>Transplant seedlings after 25 days.</p>\n```"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let session = Session::new(Box::new(backend), Config::default());

    let reply = session.advice(" basmati rice ").await.unwrap();
    assert_eq!(reply.format, ReplyFormat::Markup);
    assert_eq!(reply.body, "<p>Transplant seedlings after 25 days.</p>");
}

#[tokio::test]
async fn test_crop_advice_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crop-advice/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri()).unwrap();
    let err = backend.advice("wheat").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { .. }));
}
