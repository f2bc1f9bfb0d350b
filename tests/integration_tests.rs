/// End-to-end tests: train on a synthetic CSV, reload the artifact from disk,
/// and drive the HTTP router.
///
/// Run with: cargo test --test integration_tests -- --nocapture

use std::io::Write;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use delay_predictor::config::TrainConfig;
use delay_predictor::model::Model;
use delay_predictor::server::{router, AppState};
use delay_predictor::trainer;

const HEADER: &str = "DayOfWeek,Date,DepTime,ArrTime,CRSArrTime,UniqueCarrier,Airline,FlightNum,Origin,Dest,CarrierDelay,WeatherDelay,NASDelay,SecurityDelay,LateAircraftDelay";

const ROUTES: [(&str, &str, &str); 4] = [
    ("American Eagle Airlines Inc.", "ORD", "EWR"),
    ("Southwest Airlines Co.", "LAX", "SFO"),
    ("Delta Air Lines Inc.", "ATL", "ORD"),
    ("Southwest Airlines Co.", "SFO", "LAX"),
];

/// Evening departures are delayed, everything else is on time.
fn write_dataset(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("Flight_delay.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "{HEADER}").unwrap();
    for i in 0..240u32 {
        let (airline, origin, dest) = ROUTES[(i % 4) as usize];
        let evening = i % 3 == 0;
        let dep = if evening { 1700 + (i % 60) } else { 600 + (i % 60) };
        let arr = dep + 200;
        let day = 1 + i % 28;
        let month = 1 + i % 12;
        let late = if evening { "45" } else { "" };
        writeln!(
            f,
            "{},{:02}-{:02}-2019,{dep},{arr},{arr},XX,{airline},{i},{origin},{dest},0,0,0,0,{late}",
            1 + i % 7,
            day,
            month
        )
        .unwrap();
    }
    path
}

struct Fixture {
    _dir: tempfile::TempDir,
    app: Router,
    features: usize,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let cfg = TrainConfig {
        data_path: write_dataset(dir.path()),
        output_path: dir.path().join("model.json"),
        ..TrainConfig::default()
    };
    trainer::run(&cfg).unwrap();

    let model = Model::load(&cfg.output_path).unwrap();
    let features = model.schema().len();
    Fixture {
        _dir: dir,
        app: router(AppState::new(model, true)),
        features,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    match body {
        Some(b) => send(app, method, uri, Some("application/json"), b.to_string()).await,
        None => send(app, method, uri, None, String::new()).await,
    }
}

/// Sends a raw body, so tests can break the JSON or drop the content type.
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    content_type: Option<&str>,
    body: String,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(ct) = content_type {
        req = req.header("content-type", ct);
    }
    let req = req.body(Body::from(body)).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn scenario_a() -> Value {
    json!({
        "dayOfWeek": 5, "month": 12, "day": 15,
        "departureTime": 1830, "arrivalTime": 2100,
        "airline": "American Eagle Airlines Inc.",
        "originAirport": "ORD", "destAirport": "EWR"
    })
}

fn scenario_b() -> Value {
    json!({
        "dayOfWeek": 2, "month": 3, "day": 10,
        "departureTime": 1000, "arrivalTime": 1200,
        "airline": "Southwest Airlines Co.",
        "originAirport": "LAX", "destAirport": "SFO"
    })
}

fn assert_probabilities(v: &Value) {
    let p_delayed = v["probability_delayed"].as_f64().unwrap();
    let p_ontime = v["probability_ontime"].as_f64().unwrap();
    let confidence = v["confidence"].as_f64().unwrap();
    assert!((p_delayed + p_ontime - 100.0).abs() <= 0.011, "{p_delayed} + {p_ontime}");
    assert_eq!(confidence, p_delayed.max(p_ontime));
    assert_eq!(v["isDelayed"].as_bool().unwrap(), v["prediction"] == "delayed");
}

#[tokio::test]
async fn test_home_and_info() {
    println!("\n=== Test: Home and Info ===");
    let fx = fixture();

    let (status, home) = call(&fx.app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(home["message"], "Flight Delay Prediction API");
    assert!(home["accuracy"].as_str().unwrap().ends_with('%'));
    assert!(home["endpoints"]["/predict"].is_string());

    let (status, info) = call(&fx.app, "GET", "/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["total_features"], fx.features);
    assert_eq!(
        info["airlines"],
        json!(["American Eagle Airlines Inc.", "Delta Air Lines Inc.", "Southwest Airlines Co."])
    );
    assert_eq!(info["origins"], json!(["ATL", "LAX", "ORD", "SFO"]));
    assert_eq!(info["destinations"], json!(["EWR", "LAX", "ORD", "SFO"]));
    // 6 numeric + 3 airlines + 4 origins + 4 destinations
    assert_eq!(fx.features, 17);
    println!("✓ accuracy={} features={}", home["accuracy"], fx.features);
}

#[tokio::test]
async fn test_scenario_a_evening_flight() {
    println!("\n=== Test: Scenario A ===");
    let fx = fixture();
    let (status, out) = call(&fx.app, "POST", "/predict", Some(scenario_a())).await;
    assert_eq!(status, StatusCode::OK);
    assert_probabilities(&out);
    assert_eq!(out["prediction"], "delayed");
    println!("✓ {out}");
}

#[tokio::test]
async fn test_scenario_b_morning_flight() {
    println!("\n=== Test: Scenario B ===");
    let fx = fixture();
    let (status, out) = call(&fx.app, "POST", "/predict", Some(scenario_b())).await;
    assert_eq!(status, StatusCode::OK);
    assert_probabilities(&out);
    assert_eq!(out["prediction"], "on-time");
    assert_eq!(out["isDelayed"], false);
    println!("✓ {out}");
}

#[tokio::test]
async fn test_scenario_c_month_out_of_range() {
    let fx = fixture();
    let mut body = scenario_a();
    body["month"] = json!(13);
    let (status, out) = call(&fx.app, "POST", "/predict", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out, json!({ "error": "Month must be between 1-12" }));

    let mut body = scenario_a();
    body["day"] = json!(0);
    let (status, out) = call(&fx.app, "POST", "/predict", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out, json!({ "error": "Day must be between 1-31" }));
}

#[tokio::test]
async fn test_scenario_d_missing_field() {
    let fx = fixture();
    let mut body = scenario_a();
    body.as_object_mut().unwrap().remove("airline");
    let (status, out) = call(&fx.app, "POST", "/predict", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out, json!({ "error": "Missing field: airline" }));

    for field in ["dayOfWeek", "departureTime", "destAirport"] {
        let mut body = scenario_b();
        body.as_object_mut().unwrap().remove(field);
        let (status, out) = call(&fx.app, "POST", "/predict", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(out["error"], format!("Missing field: {field}"));
    }
}

#[tokio::test]
async fn test_unreadable_body_is_json_error() {
    println!("\n=== Test: Unreadable Body ===");
    let fx = fixture();
    let cases = [
        (Some("application/json"), "{not json".to_string()),
        (Some("application/json"), r#"{"dayOfWeek": 5, "month""#.to_string()),
        (None, scenario_a().to_string()),
        (Some("text/plain"), scenario_a().to_string()),
    ];
    for (content_type, body) in cases {
        let (status, out) = send(&fx.app, "POST", "/predict", content_type, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(out.is_object(), "{out}");
        assert!(out["error"].is_string(), "{out}");
        assert!(out["trace"].is_string(), "{out}");
        println!("✓ {content_type:?} -> {}", out["error"]);
    }
}

#[tokio::test]
async fn test_coercion_failure_is_server_error_with_trace() {
    let fx = fixture();
    let mut body = scenario_a();
    body["arrivalTime"] = json!("late evening");
    let (status, out) = call(&fx.app, "POST", "/predict", Some(body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(out["error"].as_str().unwrap().contains("arrivalTime"));
    assert!(out["trace"].is_string());
}

#[tokio::test]
async fn test_string_times_from_browser_form() {
    let fx = fixture();
    let mut body = scenario_b();
    body["departureTime"] = json!("1000");
    body["arrivalTime"] = json!("1200");
    let (_, as_numbers) = call(&fx.app, "POST", "/predict", Some(scenario_b())).await;
    let (status, as_strings) = call(&fx.app, "POST", "/predict", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_numbers, as_strings);
}

#[tokio::test]
async fn test_predict_is_idempotent() {
    println!("\n=== Test: Idempotence ===");
    let fx = fixture();
    let (_, first) = call(&fx.app, "POST", "/predict", Some(scenario_a())).await;
    for _ in 0..5 {
        let (_, again) = call(&fx.app, "POST", "/predict", Some(scenario_a())).await;
        assert_eq!(first, again);
    }
    println!("✓ identical output across repeated calls");
}

#[tokio::test]
async fn test_artifact_reload_gives_same_answers() {
    let a = fixture();
    let b = fixture();
    for body in [scenario_a(), scenario_b()] {
        let (_, x) = call(&a.app, "POST", "/predict", Some(body.clone())).await;
        let (_, y) = call(&b.app, "POST", "/predict", Some(body)).await;
        assert_eq!(x, y);
    }
}

#[tokio::test]
async fn test_unseen_categories_do_not_fail() {
    println!("\n=== Test: Unseen Categories ===");
    let fx = fixture();
    let mut body = scenario_a();
    body["airline"] = json!("Brand New Airways");
    body["originAirport"] = json!("ZZZ");
    body["destAirport"] = json!("YYY");
    let (status, out) = call(&fx.app, "POST", "/predict", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_probabilities(&out);
    println!("✓ unseen categories treated as absent: {out}");
}

#[tokio::test]
async fn test_concurrent_requests_agree() {
    println!("\n=== Test: Concurrent Requests ===");
    let fx = fixture();
    let calls = (0..16).map(|i| {
        let body = if i % 2 == 0 { scenario_a() } else { scenario_b() };
        let app = fx.app.clone();
        async move { call(&app, "POST", "/predict", Some(body)).await }
    });
    let results = futures::future::join_all(calls).await;

    let (_, a) = &results[0];
    let (_, b) = &results[1];
    for (i, (status, out)) in results.iter().enumerate() {
        assert_eq!(*status, StatusCode::OK);
        assert_eq!(out, if i % 2 == 0 { a } else { b });
    }
    println!("✓ {} concurrent predictions consistent", results.len());
}

#[test]
fn test_aligned_width_matches_schema_for_any_input() {
    let fx_dir = tempfile::tempdir().unwrap();
    let cfg = TrainConfig {
        data_path: write_dataset(fx_dir.path()),
        output_path: fx_dir.path().join("model.json"),
        ..TrainConfig::default()
    };
    let artifact = trainer::run(&cfg).unwrap();
    let model = Model::new(artifact).unwrap();

    for (airline, origin, dest) in ROUTES.iter().copied().chain([("?", "??", "???")]) {
        let body = json!({
            "dayOfWeek": 1, "month": 1, "day": 1,
            "departureTime": 900, "arrivalTime": 1100,
            "airline": airline, "originAirport": origin, "destAirport": dest
        });
        let req = delay_predictor::PredictionRequest::from_json(&body).unwrap();
        let scored = model.score(&req.row()).unwrap();
        assert_eq!(scored.features.values.len(), model.schema().len());
        let indicators = scored.features.values[6..].iter().filter(|v| **v != 0.0).count();
        assert_eq!(indicators + scored.features.dropped.len(), 3);
    }
}
