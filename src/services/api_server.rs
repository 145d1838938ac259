// src/services/api_server.rs
//! HTTP API for the credential registry
//!
//! Thin axum layer over [`AnchorCoordinator`]. Endpoints:
//! - issuing, listing, looking up and deleting credentials
//! - recording a confirmed anchor the store missed at issuance
//! - verifying a fingerprint or a certificate verification URL
//! - registry statistics and ledger status

use crate::blockchain::ledger_client::AnchorReceipt;
use crate::error::{AdminError, ErrorKind, IssuanceError, VerificationError};
use crate::models::credential::{CredentialFields, CredentialFingerprint, CredentialRecord, RecordFilter};
use crate::models::verification::VerificationReport;
use crate::services::anchor_coordinator::{AnchorCoordinator, LedgerStatus};
use crate::services::credential_issuer::{AnchorState, IssuanceReport};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by handlers, rendered as JSON bodies.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A submitted field failed validation
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Issuance(#[from] IssuanceError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl AppError {
    fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::NotFound(_) | AppError::Validation(_) => None,
            AppError::Issuance(e) => Some(e.kind()),
            AppError::Verification(e) => Some(e.kind()),
            AppError::Storage(_) => Some(ErrorKind::StorageFailure),
        }
    }
}

impl From<AdminError> for AppError {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::NotFound(fp) => AppError::NotFound(format!("no credential with fingerprint {}", fp)),
            AdminError::Storage(reason) => AppError::Storage(reason),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            Some(ErrorKind::DuplicateCredential) => StatusCode::CONFLICT,
            Some(ErrorKind::MalformedVerificationQuery) => StatusCode::BAD_REQUEST,
            Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
            None => match &self {
                AppError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": status.as_u16(),
                "kind": kind,
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Response for an issuance that created a record.
///
/// `record_created` and `anchored` are reported separately so a caller can
/// never mistake a database-only issuance for an anchored one.
#[derive(Serialize)]
struct IssueResponse {
    success: bool,
    message: String,
    record_created: bool,
    anchored: bool,
    #[serde(flatten)]
    anchoring: AnchorState,
    warning: Option<String>,
    warning_kind: Option<ErrorKind>,
    record: CredentialRecord,
}

impl From<IssuanceReport> for IssueResponse {
    fn from(report: IssuanceReport) -> Self {
        let warning = match &report.anchoring {
            AnchorState::Failed { failure } => Some(failure.reason.clone()),
            AnchorState::Diverged { reason, .. } => Some(reason.clone()),
            AnchorState::Anchored { .. } | AnchorState::Skipped => None,
        };
        IssueResponse {
            success: true,
            message: report.summary(),
            record_created: true,
            anchored: report.anchored_on_ledger(),
            warning_kind: report.warning(),
            warning,
            anchoring: report.anchoring,
            record: report.record,
        }
    }
}

#[derive(Serialize)]
struct ListResponse {
    total: usize,
    records: Vec<CredentialRecord>,
    /// Filter menu values
    programs: Vec<String>,
    years: Vec<String>,
}

#[derive(Deserialize)]
struct VerifyQuery {
    hash: Option<String>,
}

#[derive(Deserialize)]
struct VerifyRequest {
    certificate_hash: String,
}

#[derive(Serialize)]
struct VerifyResponse {
    store_hit: bool,
    ledger_hit: Option<bool>,
    sources_disagree: bool,
    #[serde(flatten)]
    report: VerificationReport,
}

impl From<VerificationReport> for VerifyResponse {
    fn from(report: VerificationReport) -> Self {
        VerifyResponse {
            store_hit: report.store_hit(),
            ledger_hit: report.ledger_hit(),
            sources_disagree: report.sources_disagree(),
            report,
        }
    }
}

#[derive(Serialize)]
struct LedgerStatusResponse {
    enabled: bool,
    #[serde(flatten)]
    status: Option<LedgerStatus>,
}

/// API server state
#[derive(Clone)]
pub struct ApiServer {
    coordinator: Arc<AnchorCoordinator>,
}

impl ApiServer {
    pub fn new(coordinator: Arc<AnchorCoordinator>) -> Self {
        ApiServer { coordinator }
    }

    /// Builds the application router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/credentials", get(Self::list_handler).post(Self::issue_handler))
            .route(
                "/credentials/:fingerprint",
                get(Self::find_handler).delete(Self::delete_handler),
            )
            .route("/credentials/:fingerprint/anchor", post(Self::record_anchor_handler))
            .route("/students/*student_id", get(Self::find_student_handler))
            .route("/verify", get(Self::verify_query_handler).post(Self::verify_body_handler))
            .route("/stats", get(Self::stats_handler))
            .route("/ledger/status", get(Self::ledger_status_handler))
            .with_state(Arc::new(self.clone()))
    }

    /// Binds `addr` and serves requests until the process stops.
    pub async fn run(&self, addr: &str) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await
    }

    // =====================
    // Credential Handlers
    // =====================

    /// POST /credentials
    ///
    /// # Responses
    /// - 201 Created: record created, with or without a ledger anchor
    /// - 409 Conflict: fingerprint or student already registered
    /// - 422 Unprocessable Entity: a field is blank
    /// - 500 Internal Server Error: record could not be stored
    async fn issue_handler(
        State(state): State<Arc<ApiServer>>,
        Json(fields): Json<CredentialFields>,
    ) -> Result<(StatusCode, Json<IssueResponse>), AppError> {
        let fields = fields.trimmed();
        if let Some(field) = fields.first_blank_field() {
            return Err(AppError::Validation(format!("{} must not be blank", field)));
        }
        let report = state.coordinator.issue(fields).await?;
        Ok((StatusCode::CREATED, Json(report.into())))
    }

    /// GET /credentials?program=&year=
    async fn list_handler(
        State(state): State<Arc<ApiServer>>,
        Query(filter): Query<RecordFilter>,
    ) -> Result<Json<ListResponse>, AppError> {
        let records = state.coordinator.list(&filter).await?;
        Ok(Json(ListResponse {
            total: records.len(),
            records,
            programs: state.coordinator.distinct_programs().await?,
            years: state.coordinator.distinct_years().await?,
        }))
    }

    /// GET /credentials/:fingerprint
    async fn find_handler(
        State(state): State<Arc<ApiServer>>,
        Path(fingerprint): Path<String>,
    ) -> Result<Json<CredentialRecord>, AppError> {
        let fingerprint = parse_path_fingerprint(&fingerprint)?;
        state
            .coordinator
            .find(&fingerprint)
            .await?
            .map(Json)
            .ok_or_else(|| AppError::NotFound(format!("no credential with fingerprint {}", fingerprint)))
    }

    /// DELETE /credentials/:fingerprint
    ///
    /// Removes the record only; an anchor already on the ledger remains.
    async fn delete_handler(
        State(state): State<Arc<ApiServer>>,
        Path(fingerprint): Path<String>,
    ) -> Result<Json<CredentialRecord>, AppError> {
        let fingerprint = parse_path_fingerprint(&fingerprint)?;
        Ok(Json(state.coordinator.delete(&fingerprint).await?))
    }

    /// POST /credentials/:fingerprint/anchor
    ///
    /// Writes back the receipt of a diverged issuance once the store is
    /// healthy again. The receipt is the one reported in the issue response.
    async fn record_anchor_handler(
        State(state): State<Arc<ApiServer>>,
        Path(fingerprint): Path<String>,
        Json(receipt): Json<AnchorReceipt>,
    ) -> Result<Json<CredentialRecord>, AppError> {
        let fingerprint = parse_path_fingerprint(&fingerprint)?;
        Ok(Json(state.coordinator.record_anchor(&fingerprint, &receipt).await?))
    }

    /// GET /students/*student_id
    async fn find_student_handler(
        State(state): State<Arc<ApiServer>>,
        Path(student_id): Path<String>,
    ) -> Result<Json<CredentialRecord>, AppError> {
        let student_id = student_id.trim_start_matches('/');
        state
            .coordinator
            .find_by_student(student_id)
            .await?
            .map(Json)
            .ok_or_else(|| AppError::NotFound(format!("no credential for student {}", student_id)))
    }

    // =====================
    // Verification Handlers
    // =====================

    /// GET /verify?hash=
    ///
    /// # Responses
    /// - 200 OK: findings from both sources, whether or not either hit
    /// - 400 Bad Request: the hash is not a fingerprint
    async fn verify_query_handler(
        State(state): State<Arc<ApiServer>>,
        Query(query): Query<VerifyQuery>,
    ) -> Result<Json<VerifyResponse>, AppError> {
        let submitted = query.hash.unwrap_or_default();
        let report = state.coordinator.verify(&submitted).await?;
        Ok(Json(report.into()))
    }

    /// POST /verify
    ///
    /// Accepts a bare fingerprint or a full verification URL.
    async fn verify_body_handler(
        State(state): State<Arc<ApiServer>>,
        Json(request): Json<VerifyRequest>,
    ) -> Result<Json<VerifyResponse>, AppError> {
        let report = state.coordinator.verify(&request.certificate_hash).await?;
        Ok(Json(report.into()))
    }

    // =====================
    // Status Handlers
    // =====================

    async fn stats_handler(State(state): State<Arc<ApiServer>>) -> Result<impl IntoResponse, AppError> {
        Ok(Json(state.coordinator.stats().await?))
    }

    async fn ledger_status_handler(State(state): State<Arc<ApiServer>>) -> impl IntoResponse {
        let status = state.coordinator.ledger_status().await;
        Json(LedgerStatusResponse {
            enabled: status.is_some(),
            status,
        })
    }
}

fn parse_path_fingerprint(raw: &str) -> Result<CredentialFingerprint, AppError> {
    CredentialFingerprint::parse(raw).ok_or_else(|| VerificationError::malformed(raw).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ledger_client::{AnchorFailureKind, LedgerClient};
    use crate::services::test_support::{jane_doe, FlakyStore, ScriptedLedger};
    use std::sync::atomic::Ordering;
    use crate::storage::memory_store::MemoryRecordStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const JANE_FP: &str = "baf3559c207c70c377a05b8166e6a3fde0b751b8861991396ccf34f49fd2dfd8";

    fn app(ledger: Option<Arc<ScriptedLedger>>) -> Router {
        let store = Arc::new(MemoryRecordStore::new());
        let ledger = ledger.map(|l| l as Arc<dyn LedgerClient>);
        ApiServer::new(Arc::new(AnchorCoordinator::new(store, ledger))).router()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn jane_json() -> Value {
        serde_json::to_value(jane_doe()).unwrap()
    }

    #[tokio::test]
    async fn test_issue_reports_anchor_separately() {
        let app = app(Some(Arc::new(ScriptedLedger::confirming())));
        let (status, body) = send(&app, post_json("/credentials", jane_json())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["record_created"], true);
        assert_eq!(body["anchored"], true);
        assert_eq!(body["state"], "anchored");
        assert_eq!(body["warning_kind"], Value::Null);
        assert_eq!(body["record"]["fingerprint"], JANE_FP);
    }

    #[tokio::test]
    async fn test_issue_with_failed_anchor_is_created_with_warning() {
        let app = app(Some(Arc::new(ScriptedLedger::failing(AnchorFailureKind::InsufficientFunds))));
        let (status, body) = send(&app, post_json("/credentials", jane_json())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["record_created"], true);
        assert_eq!(body["anchored"], false);
        assert_eq!(body["state"], "failed");
        assert_eq!(body["warning_kind"], "ledger_insufficient_resource");
        assert!(body["message"].as_str().unwrap().contains("database only"));
    }

    #[tokio::test]
    async fn test_duplicate_issue_is_conflict() {
        let app = app(None);
        send(&app, post_json("/credentials", jane_json())).await;
        let (status, body) = send(&app, post_json("/credentials", jane_json())).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "duplicate_credential");
    }

    #[tokio::test]
    async fn test_blank_field_is_unprocessable() {
        let app = app(None);
        let mut fields = jane_json();
        fields["honors"] = Value::from("   ");
        let (status, body) = send(&app, post_json("/credentials", fields)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["message"].as_str().unwrap().contains("honors"));
    }

    #[tokio::test]
    async fn test_verify_by_query_and_body() {
        let app = app(Some(Arc::new(ScriptedLedger::confirming())));
        send(&app, post_json("/credentials", jane_json())).await;

        let (status, body) = send(&app, get(&format!("/verify?hash={}", JANE_FP))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store_hit"], true);
        assert_eq!(body["ledger_hit"], true);
        assert_eq!(body["store"]["status"], "found");

        let url = format!("https://registry.example.edu/verify?hash={}", JANE_FP);
        let (status, body) = send(&app, post_json("/verify", serde_json::json!({ "certificate_hash": url }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fingerprint"], JANE_FP);
    }

    #[tokio::test]
    async fn test_malformed_verify_is_bad_request_not_not_found() {
        let app = app(None);
        let (status, body) = send(&app, get("/verify?hash=abc123")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "malformed_verification_query");

        let (status, _) = send(&app, get("/verify")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_fingerprint_verifies_as_not_found_in_both() {
        let app = app(Some(Arc::new(ScriptedLedger::confirming())));
        let (status, body) = send(&app, get(&format!("/verify?hash={}", JANE_FP))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"]["status"], "not_found");
        assert_eq!(body["ledger"]["status"], "not_found");
        assert_eq!(body["sources_disagree"], false);
    }

    #[tokio::test]
    async fn test_lookup_and_delete() {
        let app = app(None);
        send(&app, post_json("/credentials", jane_json())).await;

        let (status, body) = send(&app, get(&format!("/credentials/{}", JANE_FP))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["student_id"], "CS/2020/001");

        let (status, body) = send(&app, get("/students/CS/2020/001")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fingerprint"], JANE_FP);

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/credentials/{}", JANE_FP))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, get(&format!("/credentials/{}", JANE_FP))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, get("/credentials/not-a-hash")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_with_filter() {
        let app = app(None);
        send(&app, post_json("/credentials", jane_json())).await;

        let (status, body) = send(&app, get("/credentials?program=Physics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        assert_eq!(body["programs"], serde_json::json!(["Computer Science"]));

        let (_, body) = send(&app, get("/credentials?program=Computer%20Science&year=2024")).await;
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn test_stats_and_ledger_status() {
        let app = app(None);
        send(&app, post_json("/credentials", jane_json())).await;

        let (status, body) = send(&app, get("/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_records"], 1);
        assert_eq!(body["anchored_records"], 0);
        assert_eq!(body["ledger_enabled"], false);

        let (status, body) = send(&app, get("/ledger/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "enabled": false }));
    }

    #[tokio::test]
    async fn test_diverged_issue_can_be_repaired_with_its_receipt() {
        let store = Arc::new(FlakyStore::new());
        FlakyStore::set(&store.fail_update);
        let ledger: Arc<dyn LedgerClient> = Arc::new(ScriptedLedger::confirming());
        let app = ApiServer::new(Arc::new(AnchorCoordinator::new(store.clone(), Some(ledger)))).router();

        let (status, body) = send(&app, post_json("/credentials", jane_json())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["state"], "diverged");
        assert_eq!(body["anchored"], true);
        assert_eq!(body["warning_kind"], "partial_anchor_persistence");
        assert_eq!(body["record"]["anchor"]["anchored"], false);

        store.fail_update.store(false, Ordering::SeqCst);
        let uri = format!("/credentials/{}/anchor", JANE_FP);
        let (status, body) = send(&app, post_json(&uri, body["receipt"].clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["anchor"]["anchored"], true);
        assert_eq!(body["anchor"]["tx_hash"], format!("0x{}", JANE_FP));
        assert_eq!(body["anchor"]["block_number"], 1234);

        let (status, _) = send(&app, post_json("/credentials/not-a-hash/anchor", body["anchor"].clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
