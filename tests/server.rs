use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use exam_timetabler::server::{ComparisonEntry, router};
use exam_timetabler::{Encoding, HighsSolver, Timetable};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

async fn post(uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let app = router(Arc::new(HighsSolver::default()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn path_instance() -> Value {
    json!({
        "subjects": [
            { "id": 0, "demand": 10 },
            { "id": 1, "demand": 10 },
            { "id": 2, "demand": 10 },
            { "id": 3, "demand": 10 }
        ],
        "rooms": [
            { "id": 0, "capacity": 10 },
            { "id": 1, "capacity": 10 }
        ],
        "conflicts": [[0, 1], [1, 2], [2, 3]]
    })
}

#[tokio::test]
async fn test_solve_route_returns_timetable() {
    let (status, body) = post(
        "/v1/timetable/solve",
        json!({ "instance": path_instance(), "options": { "encoding": "all-different-cp" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let timetable: Timetable = serde_json::from_slice(&body).unwrap();
    assert_eq!(timetable.encoding, Encoding::AllDifferentCp);
    assert_eq!(timetable.slots_used, 2);
}

#[tokio::test]
async fn test_solve_route_defaults_options() {
    let (status, body) = post("/v1/timetable/solve", json!({ "instance": path_instance() })).await;
    assert_eq!(status, StatusCode::OK);
    let timetable: Timetable = serde_json::from_slice(&body).unwrap();
    assert_eq!(timetable.encoding, Encoding::FlatSlotMip);
}

#[tokio::test]
async fn test_self_loop_is_bad_request() {
    let mut instance = path_instance();
    instance["conflicts"] = json!([[1, 1]]);
    let (status, body) = post("/v1/timetable/solve", json!({ "instance": instance })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().contains("self-loop"));
}

#[tokio::test]
async fn test_negative_demand_is_bad_request() {
    let mut instance = path_instance();
    instance["subjects"][0]["demand"] = json!(-5);
    let (status, _) = post("/v1/timetable/solve", json!({ "instance": instance })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fractional_capacity_is_bad_request_on_compare() {
    let mut instance = path_instance();
    instance["rooms"][1]["capacity"] = json!(9.5);
    let (status, _) = post("/v1/timetable/compare", json!({ "instance": instance })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_infeasible_is_unprocessable() {
    let instance = json!({
        "subjects": [{ "id": 0, "demand": 50 }],
        "rooms": [{ "id": 0, "capacity": 40 }]
    });
    let (status, _) = post("/v1/timetable/solve", json!({ "instance": instance })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_compare_route_runs_every_encoding() {
    let (status, body) =
        post("/v1/timetable/compare", json!({ "instance": path_instance() })).await;
    assert_eq!(status, StatusCode::OK);
    let entries: Vec<ComparisonEntry> = serde_json::from_slice(&body).unwrap();
    let encodings: Vec<Encoding> = entries.iter().map(|e| e.encoding).collect();
    assert_eq!(encodings, Encoding::ALL.to_vec());
    for entry in entries {
        assert_eq!(entry.error, None);
        assert_eq!(entry.timetable.unwrap().slots_used, 2);
    }
}
