use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use driver_missions::api::rest::router;
use driver_missions::geo::geocoder::{StaticGeocoder, ZipRecord};
use driver_missions::state::AppState;
use driver_missions::storage::MemoryObjectStorage;
use serde_json::{Value, json};
use tower::ServiceExt;

const ALBANY: (f64, f64) = (42.6526, -73.7562);
const NEWARK: (f64, f64) = (40.7357, -74.1724);

fn state() -> Arc<AppState> {
    let geocoder = StaticGeocoder::new(
        vec![
            ZipRecord {
                zip: "12207".to_string(),
                state: "NY".to_string(),
                lat: ALBANY.0,
                lng: ALBANY.1,
            },
            ZipRecord {
                zip: "07102".to_string(),
                state: "NJ".to_string(),
                lat: NEWARK.0,
                lng: NEWARK.1,
            },
        ],
        25.0,
    );

    Arc::new(AppState::new(
        Arc::new(geocoder),
        Arc::new(MemoryObjectStorage::new("memory://evidence")),
        1024,
    ))
}

fn setup() -> axum::Router {
    router(state())
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn photo_request(uri: &str, photo: &'static [u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "image/jpeg")
        .body(Body::from(photo))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Driver in Albany with a primary address, plus a NY-only campaign.
async fn seed(app: &axum::Router, rank: &str, bags_count: u32, remaining: u32) -> (String, String) {
    let (_, driver) = send(
        app,
        json_request("POST", "/drivers", json!({ "name": "Morgan", "rank": rank })),
    )
    .await;
    let driver_id = driver["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        app,
        json_request(
            "PUT",
            &format!("/drivers/{driver_id}/service-area"),
            json!({ "zip_codes": ["12207"], "miles_radius": 10 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        app,
        json_request(
            "POST",
            &format!("/drivers/{driver_id}/addresses"),
            json!({ "line1": "1 State St", "city": "Albany", "state": "ny", "zip": "12207" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, advertiser) = send(
        app,
        json_request(
            "POST",
            "/advertisers",
            json!({ "name": "Acme", "logo_url": "//cdn.acme.test/logo.png" }),
        ),
    )
    .await;

    let (status, campaign) = send(
        app,
        json_request(
            "POST",
            "/campaigns",
            json!({
                "advertiser_id": advertiser["id"],
                "name": "Upstate Spring",
                "states": ["ny"],
                "bags_count": bags_count,
                "remaining_bags": remaining
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    (driver_id, campaign["id"].as_str().unwrap().to_string())
}

async fn claim_and_activate(app: &axum::Router, driver_id: &str, campaign_id: &str, bags: u32) -> String {
    let (status, claim) = send(
        app,
        json_request(
            "POST",
            &format!("/drivers/{driver_id}/claims"),
            json!({ "campaign_id": campaign_id, "bags": bags }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claim["status"], "requested");

    let (status, scan) = send(
        app,
        json_request(
            "POST",
            &format!("/drivers/{driver_id}/scan"),
            json!({ "payload": campaign_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scan["outcome"], "activated");
    assert_eq!(scan["driver_campaign"]["status"], "active");

    claim["id"].as_str().unwrap().to_string()
}

async fn start(app: &axum::Router, driver_id: &str, campaign_id: &str, claim_id: &str) -> String {
    let (status, mission) = send(
        app,
        json_request(
            "POST",
            &format!("/claims/{claim_id}/missions"),
            json!({
                "driver_id": driver_id,
                "qr_payload": campaign_id,
                "pickup_location_name": "Library",
                "recipient_name": "Ana",
                "location": { "lat": ALBANY.0, "lng": ALBANY.1 }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mission["status"], "active");
    mission["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["campaigns"], 0);
    assert_eq!(body["missions"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_missions"));
    assert!(body.contains("bags_claimed_total"));
}

#[tokio::test]
async fn create_driver_empty_name_returns_400() {
    let app = setup();
    let (status, _) = send(&app, json_request("POST", "/drivers", json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn legacy_rank_names_are_canonicalized() {
    let app = setup();
    let (status, driver) = send(
        &app,
        json_request("POST", "/drivers", json!({ "name": "Kit", "rank": "Knight" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(driver["rank"], "Captain");
    assert_eq!(driver["uncompleted_missions_count"], 0);
}

#[tokio::test]
async fn service_area_derives_states_and_rejects_unknown_zip() {
    let app = setup();
    let (_, driver) = send(&app, json_request("POST", "/drivers", json!({ "name": "Val" }))).await;
    let id = driver["id"].as_str().unwrap();

    let (status, updated) = send(
        &app,
        json_request(
            "PUT",
            &format!("/drivers/{id}/service-area"),
            json!({ "zip_codes": ["12207", "07102"], "miles_radius": 15 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["states"], json!(["NJ", "NY"]));
    assert_eq!(updated["miles_radius"], 15);

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/drivers/{id}/service-area"),
            json!({ "zip_codes": ["99999"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn switching_primary_address_keeps_exactly_one() {
    let app = setup();
    let (_, driver) = send(&app, json_request("POST", "/drivers", json!({ "name": "Ira" }))).await;
    let id = driver["id"].as_str().unwrap();

    let (_, first) = send(
        &app,
        json_request(
            "POST",
            &format!("/drivers/{id}/addresses"),
            json!({ "line1": "1 A St", "city": "Albany", "state": "NY", "zip": "12207" }),
        ),
    )
    .await;
    let (_, second) = send(
        &app,
        json_request(
            "POST",
            &format!("/drivers/{id}/addresses"),
            json!({ "line1": "2 B St", "city": "Albany", "state": "NY", "zip": "12207" }),
        ),
    )
    .await;
    assert_eq!(first["is_primary"], true);
    assert_eq!(second["is_primary"], false);

    let second_id = second["id"].as_str().unwrap();
    let (status, addresses) = send(
        &app,
        json_request(
            "PUT",
            &format!("/drivers/{id}/addresses/{second_id}/primary"),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let primaries: Vec<&Value> = addresses
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["is_primary"] == true)
        .collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(primaries[0]["id"], second["id"]);
}

#[tokio::test]
async fn campaign_remaining_above_total_returns_400() {
    let app = setup();
    let (_, advertiser) = send(
        &app,
        json_request("POST", "/advertisers", json!({ "name": "Acme" })),
    )
    .await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/campaigns",
            json!({
                "advertiser_id": advertiser["id"],
                "name": "Broken",
                "nation": true,
                "bags_count": 10,
                "remaining_bags": 11
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn matching_campaigns_include_advertiser_branding() {
    let app = setup();
    let (driver_id, campaign_id) = seed(&app, "Recruit", 100, 100).await;

    let (status, listings) = send(&app, get_request(&format!("/drivers/{driver_id}/campaigns"))).await;
    assert_eq!(status, StatusCode::OK);

    let list = listings.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], campaign_id);
    assert_eq!(list[0]["advertiser_name"], "Acme");
    assert_eq!(list[0]["advertiser_logo"], "https://cdn.acme.test/logo.png");
}

#[tokio::test]
async fn recruit_sees_only_twenty_five_with_thirty_left() {
    let app = setup();
    let (driver_id, campaign_id) = seed(&app, "Page", 100, 30).await;

    let (status, body) = send(
        &app,
        get_request(&format!("/drivers/{driver_id}/campaigns/{campaign_id}/batch-sizes")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sizes"], json!([25]));
}

#[tokio::test]
async fn claim_without_primary_address_returns_422() {
    let app = setup();
    let (_, driver) = send(&app, json_request("POST", "/drivers", json!({ "name": "Noa" }))).await;
    let driver_id = driver["id"].as_str().unwrap();
    let (_, campaign_id) = seed(&app, "Recruit", 100, 100).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/drivers/{driver_id}/claims"),
            json!({ "campaign_id": campaign_id, "bags": 25 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("primary"));

    let (_, campaign) = send(&app, get_request(&format!("/campaigns/{campaign_id}"))).await;
    assert_eq!(campaign["remaining_bags"], 100);
}

#[tokio::test]
async fn claim_beyond_inventory_returns_422() {
    let app = setup();
    let (driver_id, campaign_id) = seed(&app, "General", 500, 40).await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/drivers/{driver_id}/claims"),
            json!({ "campaign_id": campaign_id, "bags": 50, "flow": "ship" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, campaign) = send(&app, get_request(&format!("/campaigns/{campaign_id}"))).await;
    assert_eq!(campaign["remaining_bags"], 40);
}

#[tokio::test]
async fn full_mission_flow() {
    let app = setup();
    let (driver_id, campaign_id) = seed(&app, "Recruit", 100, 100).await;
    let claim_id = claim_and_activate(&app, &driver_id, &campaign_id, 25).await;

    let (_, campaign) = send(&app, get_request(&format!("/campaigns/{campaign_id}"))).await;
    assert_eq!(campaign["remaining_bags"], 75);

    let mission_id = start(&app, &driver_id, &campaign_id, &claim_id).await;

    let (status, completion) = send(
        &app,
        photo_request(
            &format!("/missions/{mission_id}/complete?driver_id={driver_id}&lat={}&lng={}", ALBANY.0, ALBANY.1),
            b"\xff\xd8\xff\xe0jpeg",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completion["mission"]["status"], "completed");
    assert!(
        completion["mission"]["photo_url"]
            .as_str()
            .unwrap()
            .starts_with("memory://evidence/missions/")
    );
    assert_eq!(completion["progress"]["driver_campaign"]["bags_delivered"], 1);
    assert_eq!(completion["progress"]["driver_campaign"]["potential_earnings"], 1.0);
    assert_eq!(completion["progress"]["earnings_delta"], 0.0);

    let (_, driver) = send(&app, get_request(&format!("/drivers/{driver_id}"))).await;
    assert_eq!(driver["completed_missions_count"], 1);
    assert_eq!(driver["uncompleted_missions_count"], 24);
    assert_eq!(driver["current_earnings"], 0.0);

    let (_, missions) = send(&app, get_request(&format!("/drivers/{driver_id}/missions"))).await;
    assert_eq!(missions.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn drop_off_outside_campaign_area_returns_422() {
    let app = setup();
    let (driver_id, campaign_id) = seed(&app, "Recruit", 100, 100).await;
    let claim_id = claim_and_activate(&app, &driver_id, &campaign_id, 25).await;
    let mission_id = start(&app, &driver_id, &campaign_id, &claim_id).await;

    let (status, _) = send(
        &app,
        photo_request(
            &format!("/missions/{mission_id}/complete?driver_id={driver_id}&lat={}&lng={}", NEWARK.0, NEWARK.1),
            b"jpeg",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, mission) = send(&app, get_request(&format!("/missions/{mission_id}"))).await;
    assert_eq!(mission["status"], "active");
}

#[tokio::test]
async fn empty_photo_returns_502_and_keeps_mission_active() {
    let app = setup();
    let (driver_id, campaign_id) = seed(&app, "Recruit", 100, 100).await;
    let claim_id = claim_and_activate(&app, &driver_id, &campaign_id, 25).await;
    let mission_id = start(&app, &driver_id, &campaign_id, &claim_id).await;

    let (status, _) = send(
        &app,
        photo_request(
            &format!("/missions/{mission_id}/complete?driver_id={driver_id}&lat={}&lng={}", ALBANY.0, ALBANY.1),
            b"",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, mission) = send(&app, get_request(&format!("/missions/{mission_id}"))).await;
    assert_eq!(mission["status"], "active");
}

#[tokio::test]
async fn completing_case_early_fails_remaining_bags() {
    let app = setup();
    let (driver_id, campaign_id) = seed(&app, "Recruit", 100, 100).await;
    let claim_id = claim_and_activate(&app, &driver_id, &campaign_id, 25).await;

    for _ in 0..4 {
        let mission_id = start(&app, &driver_id, &campaign_id, &claim_id).await;
        let (status, _) = send(
            &app,
            photo_request(
                &format!("/missions/{mission_id}/complete?driver_id={driver_id}&lat={}&lng={}", ALBANY.0, ALBANY.1),
                b"jpeg",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, closure) = send(
        &app,
        json_request(
            "POST",
            &format!("/claims/{claim_id}/complete"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closure["bags_failed"], 21);
    assert_eq!(closure["driver_campaign"]["status"], "completed");
    assert_eq!(closure["driver_campaign"]["potential_earnings"], 2.0);

    let (_, driver) = send(&app, get_request(&format!("/drivers/{driver_id}"))).await;
    assert_eq!(driver["failed_missions_count"], 21);
    assert_eq!(driver["uncompleted_missions_count"], 0);

    let (_, missions) = send(&app, get_request(&format!("/drivers/{driver_id}/missions"))).await;
    let missions = missions.as_array().unwrap();
    assert_eq!(missions.len(), 4);
    assert!(missions.iter().all(|m| m["status"] == "completed"));

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/claims/{claim_id}/complete"),
            json!({ "driver_id": driver_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn reassign_code_hands_claim_to_scanner() {
    let app = setup();
    let (driver_id, campaign_id) = seed(&app, "Recruit", 100, 100).await;
    let claim_id = claim_and_activate(&app, &driver_id, &campaign_id, 25).await;

    let (_, other) = send(&app, json_request("POST", "/drivers", json!({ "name": "Quinn" }))).await;
    let other_id = other["id"].as_str().unwrap();

    let (status, scan) = send(
        &app,
        json_request(
            "POST",
            &format!("/drivers/{other_id}/scan"),
            json!({ "payload": format!("REASSIGN_{claim_id}") }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scan["outcome"], "reassigned");
    assert_eq!(scan["previous_driver_id"], driver_id.as_str());
    assert_eq!(scan["driver_campaign"]["driver_id"], other_id);

    let (_, first_owner) = send(&app, get_request(&format!("/drivers/{driver_id}"))).await;
    let (_, scanner) = send(&app, get_request(&format!("/drivers/{other_id}"))).await;
    assert_eq!(first_owner["uncompleted_missions_count"], 0);
    assert_eq!(scanner["uncompleted_missions_count"], 25);
}

#[tokio::test]
async fn get_nonexistent_mission_returns_404() {
    let app = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/missions/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn completing_someone_elses_mission_returns_409() {
    let app = setup();
    let (driver_id, campaign_id) = seed(&app, "Recruit", 100, 100).await;
    let claim_id = claim_and_activate(&app, &driver_id, &campaign_id, 25).await;
    let mission_id = start(&app, &driver_id, &campaign_id, &claim_id).await;

    let stranger = "00000000-0000-0000-0000-000000000001";
    let (status, _) = send(
        &app,
        photo_request(
            &format!(
                "/missions/{mission_id}/complete?driver_id={stranger}&lat={}&lng={}",
                ALBANY.0, ALBANY.1
            ),
            b"jpeg",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, mission) = send(&app, get_request(&format!("/missions/{mission_id}"))).await;
    assert_eq!(mission["status"], "active");
}
