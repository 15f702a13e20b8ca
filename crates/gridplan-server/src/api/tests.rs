use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use gridplan_core::Grid;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::{api, config::Config, state::AppState};

fn setup_app_with(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    let app = api::routes().with_state(state.clone());
    (app, state)
}

fn setup_app() -> (axum::Router, Arc<AppState>) {
    setup_app_with(Config::default())
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn grid_json(grid: &Grid) -> Value {
    serde_json::to_value(grid).unwrap()
}

#[tokio::test]
async fn health_reports_ok_with_request_id() {
    let (app, _state) = setup_app();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn plan_square_route() {
    let (app, _state) = setup_app();
    let req = post_json(
        "/v1/routes/plan",
        json!({
            "grid": grid_json(&Grid::new(6, 6)),
            "waypoints": [
                {"point": {"row": 0, "col": 0}},
                {"point": {"row": 0, "col": 5}},
                {"point": {"row": 5, "col": 5}},
                {"point": {"row": 5, "col": 0}}
            ]
        }),
    );
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;

    assert_eq!(body["ok"], true);
    let order: Vec<u64> = serde_json::from_value(body["order"].clone()).unwrap();
    assert!(order == vec![0, 1, 2, 3] || order == vec![0, 3, 2, 1]);
    let path = body["path"].as_array().unwrap();
    assert_eq!(path.first(), Some(&json!({"row": 0, "col": 0})));
    assert_eq!(path.last(), Some(&json!({"row": 0, "col": 0})));
    assert!(body["return_start_index"].as_u64().is_some());
    assert!((body["length"].as_f64().unwrap() - 20.0).abs() < 1e-9);
    assert!(!body["playback"].as_array().unwrap().is_empty());
    assert_eq!(body["waypoints"][0]["status"], "pending");
}

#[tokio::test]
async fn unreachable_route_is_unprocessable() {
    let (app, _state) = setup_app();
    let grid = Grid::from_ascii("....\n####\n....").unwrap();
    let req = post_json(
        "/v1/routes/plan",
        json!({
            "grid": grid_json(&grid),
            "waypoints": [
                {"point": {"row": 0, "col": 0}},
                {"point": {"row": 2, "col": 3}}
            ]
        }),
    );
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(res).await;
    assert_eq!(body["error"], "no_path_found");
    assert!(body["message"].as_str().unwrap().contains("no path"));
}

#[tokio::test]
async fn single_waypoint_is_rejected() {
    let (app, _state) = setup_app();
    let req = post_json(
        "/v1/routes/plan",
        json!({
            "grid": grid_json(&Grid::new(4, 4)),
            "waypoints": [{"point": {"row": 1, "col": 1}}]
        }),
    );
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(res).await["error"], "insufficient_waypoints");
}

#[tokio::test]
async fn buffered_failure_falls_back_and_reports_it() {
    let (app, _state) = setup_app();
    let grid = Grid::from_ascii(
        "\
.........
.........
####.####
.........
.........",
    )
    .unwrap();
    let req = post_json(
        "/v1/routes/plan",
        json!({
            "grid": grid_json(&grid),
            "waypoints": [
                {"point": {"row": 0, "col": 1}},
                {"point": {"row": 4, "col": 7}}
            ],
            "rules": {"buffer_radius": 1}
        }),
    );
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_waypoints_are_skipped() {
    let (app, _state) = setup_app();
    let req = post_json(
        "/v1/routes/plan",
        json!({
            "grid": grid_json(&Grid::new(8, 8)),
            "waypoints": [
                {"point": {"row": 1, "col": 1}},
                {"point": {"row": 6, "col": 6}, "status": "failed"},
                {"point": {"row": 1, "col": 6}}
            ]
        }),
    );
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["order"], json!([0, 2]));
    assert_eq!(body["waypoints"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn coverage_reports_outcome() {
    let (app, _state) = setup_app();
    let req = post_json(
        "/v1/coverage/plan",
        json!({
            "grid": grid_json(&Grid::new(9, 9)),
            "sensor_range": 20.0,
            "rules": {"edge_inset": 0, "clearance_radius": 0.0}
        }),
    );
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["outcome"], "fully_covered");
    assert_eq!(body["fully_covered"], true);
    assert_eq!(body["free_cells"], 81);
}

#[tokio::test]
async fn coverage_without_placement_is_distinct() {
    let (app, _state) = setup_app();
    let req = post_json(
        "/v1/coverage/plan",
        json!({"grid": grid_json(&Grid::new(8, 8)), "sensor_range": 5.0}),
    );
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["outcome"], "no_valid_placement");
    assert_eq!(body["placements"], json!([]));
}

#[tokio::test]
async fn exploration_requires_one_seed() {
    let (app, _state) = setup_app();
    let req = post_json(
        "/v1/explorations",
        json!({
            "grid": grid_json(&Grid::new(10, 10)),
            "seeds": [{"row": 1, "col": 1}, {"row": 2, "col": 2}]
        }),
    );
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(res).await["error"], "invalid_exploration_seed");
}

#[tokio::test]
async fn exploration_lifecycle() {
    let (app, state) = setup_app();
    let req = post_json(
        "/v1/explorations",
        json!({
            "grid": grid_json(&Grid::new(60, 60)),
            "seeds": [{"row": 30, "col": 30}],
            "rules": {"speed_cells_per_sec": 1.0}
        }),
    );
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let session_id = read_json(res).await["session_id"].as_str().unwrap().to_string();
    assert_eq!(state.running_sessions(), 1);

    let get_req = Request::builder()
        .uri(format!("/v1/explorations/{}", session_id))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(get_req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let view = read_json(res).await;
    assert_eq!(view["session_id"], session_id.as_str());
    assert_eq!(view["snapshot"]["position"], json!({"row": 30, "col": 30}));

    let delete_req = Request::builder()
        .method("DELETE")
        .uri(format!("/v1/explorations/{}", session_id))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(delete_req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let (app, _state) = setup_app();
    let req = Request::builder()
        .method("DELETE")
        .uri("/v1/explorations/does-not-exist")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(res).await["error"], "session_not_found");
}

#[tokio::test]
async fn session_cap_is_enforced() {
    let config = Config {
        max_sessions: 1,
        ..Config::default()
    };
    let (app, _state) = setup_app_with(config);
    let body = json!({
        "grid": grid_json(&Grid::new(60, 60)),
        "seeds": [{"row": 30, "col": 30}],
        "rules": {"speed_cells_per_sec": 0.5}
    });

    let res = app.clone().oneshot(post_json("/v1/explorations", body.clone())).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = app.clone().oneshot(post_json("/v1/explorations", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(read_json(res).await["error"], "too_many_sessions");
}
