#![deny(unsafe_code)]

pub mod config;
pub mod server;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use slumlink_core::validate::{non_empty, positive_id, positive_id_str, quantity};
use slumlink_core::{
    store, DistributionEngine, DistributionError, OpenSession, RecordEntry, VerificationMethod,
};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ServiceConfig;

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<DistributionEngine>,
}

impl ServiceState {
    pub async fn bootstrap(config: &ServiceConfig) -> Result<Self, DistributionError> {
        let store = store::bootstrap(&config.storage).await?;
        let engine = DistributionEngine::new(store, config.distribution.clone());
        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}

pub fn build_router(state: ServiceState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/api/health", get(health))
        .route("/api/distribution-sessions", post(create_session))
        .route("/api/distribution-sessions/:session_id", get(get_session))
        .route(
            "/api/distribution-sessions/:session_id/entries",
            post(add_entry),
        )
        .route(
            "/api/distribution-sessions/:session_id/finish",
            post(finish_session),
        )
        .route(
            "/api/distribution/families/:slum_code/snapshot",
            get(family_snapshot),
        )
        .route(
            "/api/campaigns/:campaign_id/distribution-history",
            get(campaign_history),
        )
        .route("/api/campaigns/:campaign_id/impact", get(campaign_impact))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Core(#[from] DistributionError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http { status, message } => {
                (status, Json(json!({ "success": false, "message": message }))).into_response()
            }
            ApiError::Core(err) if err.is_internal() => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Internal server error",
                    "error": err.to_string(),
                })),
            )
                .into_response(),
            ApiError::Core(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (
                    status,
                    Json(json!({ "success": false, "message": err.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

/// `{success: true, data}` envelope for read endpoints.
#[derive(Debug, Serialize)]
struct DataResponse<T> {
    success: bool,
    data: T,
}

fn ok_data<T: Serialize>(data: T) -> Json<DataResponse<T>> {
    Json(DataResponse {
        success: true,
        data,
    })
}

/// Request bodies are parsed leniently: an empty body is an empty object and
/// anything that is not a JSON object is rejected.
fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ApiError::bad_request("Request body must be a JSON object")),
        Err(e) => Err(ApiError::bad_request(format!("Invalid JSON body: {e}"))),
    }
}

/// First present, non-null value among `keys`.
fn field<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| body.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(body: &Value, keys: &[&str]) -> Option<String> {
    match field(body, keys)? {
        Value::String(s) => non_empty(Some(s.as_str())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    storage_backend: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "slumlink-service",
        storage_backend: state.engine.store_backend(),
    })
}

async fn create_session(
    State(state): State<ServiceState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body = parse_body(&body)?;
    let request = OpenSession {
        org_id: positive_id(field(&body, &["org_id", "orgId"]), "org_id")?,
        campaign_id: positive_id(field(&body, &["campaignId", "campaign_id"]), "campaignId")?,
        aid_type_id: positive_id(field(&body, &["aidTypeId", "aid_type_id"]), "aidTypeId")?,
        performed_by: text_field(&body, &["performed_by", "performedBy"]),
    };

    let session_id = state.engine.open_session(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "sessionId": session_id })),
    ))
}

async fn get_session(
    State(state): State<ServiceState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = positive_id_str(&session_id, "sessionId")?;
    Ok(ok_data(state.engine.session_detail(session_id).await?))
}

async fn add_entry(
    State(state): State<ServiceState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = positive_id_str(&session_id, "sessionId")?;
    let body = parse_body(&body)?;
    let org_id = positive_id(field(&body, &["org_id", "orgId"]), "org_id")?;
    let family_code = text_field(&body, &["familyCode", "family_code"])
        .ok_or_else(|| ApiError::bad_request("familyCode is required"))?;
    let verification_method = field(&body, &["verification_method", "verificationMethod"])
        .and_then(Value::as_str);

    let recorded = state
        .engine
        .record_entry(RecordEntry {
            session_id,
            org_id,
            family_code,
            quantity: quantity(field(&body, &["quantity"])),
            comment: text_field(&body, &["comment"]),
            verification_method: VerificationMethod::normalize(verification_method),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Distribution recorded",
            "data": recorded,
        })),
    ))
}

async fn finish_session(
    State(state): State<ServiceState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = positive_id_str(&session_id, "sessionId")?;
    let body = parse_body(&body)?;
    let org_id = positive_id(field(&body, &["org_id", "orgId"]), "org_id")?;

    let outcome = state.engine.finish_session(session_id, org_id).await?;
    Ok(Json(json!({ "success": true, "message": outcome.message() })))
}

async fn family_snapshot(
    State(state): State<ServiceState>,
    Path(slum_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let slum_code = non_empty(Some(slum_code.as_str()))
        .ok_or_else(|| ApiError::bad_request("slum_code is required"))?;
    Ok(ok_data(state.engine.family_snapshot(&slum_code).await?))
}

async fn campaign_history(
    State(state): State<ServiceState>,
    Path(campaign_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign_id = positive_id_str(&campaign_id, "campaignId")?;
    Ok(ok_data(state.engine.campaign_history(campaign_id).await?))
}

async fn campaign_impact(
    State(state): State<ServiceState>,
    Path(campaign_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign_id = positive_id_str(&campaign_id, "campaignId")?;
    Ok(ok_data(state.engine.campaign_impact(campaign_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{Duration, NaiveDate, Utc};
    use slumlink_core::{
        AidType, BeneficiaryFamily, Campaign, CampaignStatus, CampaignTarget, EngineConfig,
        FamilyMember, FamilyStatus, InMemoryStore, MemberRelation, Notification, Organization,
        OrganizationStatus, SeedData,
    };
    use tower::ServiceExt;

    fn seed() -> SeedData {
        let today = Utc::now().date_naive();
        let org = |id, name: &str| Organization {
            id,
            name: name.to_string(),
            status: OrganizationStatus::Accepted,
        };
        let family = |code: &str, members| BeneficiaryFamily {
            slum_code: code.to_string(),
            head_name: format!("head of {code}"),
            status: FamilyStatus::Accepted,
            dob: NaiveDate::from_ymd_opt(1985, 3, 2),
            family_members: members,
        };
        let member = |relation, dob| FamilyMember {
            slum_code: "SL-0001".to_string(),
            relation,
            name: "member".to_string(),
            dob,
            active: true,
        };
        SeedData {
            organizations: vec![org(1, "Helping Hands"), org(2, "Ward Relief Office")],
            campaigns: vec![Campaign {
                id: 10,
                org_id: 1,
                title: "Winter ration drive".to_string(),
                start_date: today - Duration::days(3),
                end_date: today + Duration::days(3),
                status: CampaignStatus::Active,
            }],
            aid_types: vec![
                AidType {
                    id: 1,
                    name: "Food".to_string(),
                    requires_quantity: true,
                    unit_label: Some("kg".to_string()),
                },
                AidType {
                    id: 2,
                    name: "Clothing".to_string(),
                    requires_quantity: false,
                    unit_label: None,
                },
            ],
            families: vec![
                family("SL-0001", 4),
                family("SL-0002", 5),
                family("SL-0003", 2),
            ],
            family_members: vec![
                member(MemberRelation::Spouse, NaiveDate::from_ymd_opt(1987, 8, 20)),
                member(MemberRelation::Child, NaiveDate::from_ymd_opt(2012, 1, 5)),
                member(MemberRelation::Child, NaiveDate::from_ymd_opt(2015, 11, 30)),
            ],
            campaign_targets: vec![CampaignTarget {
                campaign_id: 10,
                slum_code: "SL-0001".to_string(),
            }],
            notifications: vec![Notification {
                id: 1,
                campaign_id: Some(10),
                slum_code: Some("SL-0002".to_string()),
                kind: "campaign_updated".to_string(),
            }],
        }
    }

    fn app() -> Router {
        let engine = DistributionEngine::new(
            Arc::new(InMemoryStore::from_seed(seed())),
            EngineConfig::default(),
        );
        build_router(
            ServiceState {
                engine: Arc::new(engine),
            },
            false,
        )
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn open_session(app: &Router, aid_type_id: i64) -> i64 {
        let (status, body) = send(
            app,
            "POST",
            "/api/distribution-sessions",
            Some(json!({ "org_id": 1, "campaignId": 10, "aidTypeId": aid_type_id, "performed_by": "Asha" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["success"], json!(true));
        body["sessionId"].as_i64().unwrap()
    }

    fn entries_uri(session_id: i64) -> String {
        format!("/api/distribution-sessions/{session_id}/entries")
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let (status, body) = send(&app(), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
        assert_eq!(body["storage_backend"], json!("memory"));
    }

    #[tokio::test]
    async fn food_entry_requires_quantity_and_eligibility() {
        let app = app();
        let session_id = open_session(&app, 1).await;

        let (status, body) = send(
            &app,
            "POST",
            &entries_uri(session_id),
            Some(json!({ "org_id": "1", "familyCode": "SL-0001", "quantity": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["message"], json!("Distribution recorded"));
        assert_eq!(body["data"]["round_no"], json!(1));
        assert!(body["data"]["entry_id"].as_i64().is_some());
        assert!(body["data"]["distributed_at"].is_string());

        let (status, body) = send(
            &app,
            "POST",
            &entries_uri(session_id),
            Some(json!({ "org_id": 1, "familyCode": "SL-0001" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(body["message"].as_str().unwrap().contains("Food"));

        let (status, body) = send(
            &app,
            "POST",
            &entries_uri(session_id),
            Some(json!({ "org_id": 1, "familyCode": "SL-0003", "quantity": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["message"].as_str().unwrap().contains("not included"));
    }

    #[tokio::test]
    async fn legacy_notification_makes_family_eligible() {
        let app = app();
        let session_id = open_session(&app, 2).await;

        let (status, _) = send(
            &app,
            "POST",
            &entries_uri(session_id),
            Some(json!({ "org_id": 1, "family_code": "SL-0002", "quantity": 9, "verification_method": "QR" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/distribution-sessions/{session_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entry = &body["data"]["entries"][0];
        assert_eq!(entry["quantity"], Value::Null);
        assert_eq!(entry["verification_method"], json!("QR"));
        assert_eq!(body["data"]["session"]["status"], json!("OPEN"));
    }

    #[tokio::test]
    async fn session_creation_validates_input_and_conflicts() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/distribution-sessions",
            Some(json!({ "org_id": 1, "campaignId": "abc", "aidTypeId": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));

        let (status, _) = send(
            &app,
            "POST",
            "/api/distribution-sessions",
            Some(json!({ "org_id": 2, "campaignId": 10, "aidTypeId": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        open_session(&app, 1).await;
        let (status, _) = send(
            &app,
            "POST",
            "/api/distribution-sessions",
            Some(json!({ "org_id": 1, "campaignId": 10, "aidTypeId": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn finish_is_owned_and_idempotent() {
        let app = app();
        let session_id = open_session(&app, 1).await;
        let finish_uri = format!("/api/distribution-sessions/{session_id}/finish");

        let (status, _) = send(&app, "POST", &finish_uri, Some(json!({ "org_id": 2 }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "POST", &finish_uri, Some(json!({ "org_id": 1 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("Session closed"));

        let (status, body) = send(&app, "POST", &finish_uri, Some(json!({ "org_id": 1 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("Session already closed"));

        let (status, body) = send(
            &app,
            "POST",
            &entries_uri(session_id),
            Some(json!({ "org_id": 1, "familyCode": "SL-0001", "quantity": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], json!("Session is closed"));
    }

    #[tokio::test]
    async fn malformed_path_ids_are_bad_requests() {
        let app = app();
        for uri in [
            "/api/distribution-sessions/abc",
            "/api/campaigns/0/impact",
            "/api/campaigns/-3/distribution-history",
        ] {
            let (status, body) = send(&app, "GET", uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["success"], json!(false));
        }

        let (status, _) = send(
            &app,
            "POST",
            "/api/distribution-sessions/x/finish",
            Some(json!({ "org_id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn snapshot_history_and_impact() {
        let app = app();
        let session_id = open_session(&app, 1).await;
        for (family, qty) in [("SL-0001", 5), ("SL-0001", 3), ("SL-0002", 4)] {
            let (status, _) = send(
                &app,
                "POST",
                &entries_uri(session_id),
                Some(json!({ "org_id": 1, "familyCode": family, "quantity": qty })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, "GET", "/api/distribution/families/SL-0001/snapshot", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["family"]["size"], json!(4));
        assert_eq!(body["data"]["family"]["ages"].as_array().unwrap().len(), 4);
        assert_eq!(body["data"]["allHistory"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app, "GET", "/api/campaigns/10/distribution-history", None).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["campaign_title"], json!("Winter ration drive"));
        let day = &data["history"][0];
        assert_eq!(day["families_count"], json!(2));
        assert_eq!(day["people_count"], json!(9));
        assert_eq!(day["distributions"].as_array().unwrap().len(), 3);

        let (status, body) = send(&app, "GET", "/api/campaigns/10/impact", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!({ "families_helped": 2, "people_helped": 9, "beneficiaries": 9 })
        );
    }

    #[tokio::test]
    async fn unknown_entities_are_not_found() {
        let app = app();
        for uri in [
            "/api/distribution/families/SL-9999/snapshot",
            "/api/campaigns/77/distribution-history",
            "/api/campaigns/77/impact",
            "/api/distribution-sessions/77",
        ] {
            let (status, body) = send(&app, "GET", uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["success"], json!(false));
        }
    }

    #[tokio::test]
    async fn malformed_json_body_is_rejected() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/distribution-sessions")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
