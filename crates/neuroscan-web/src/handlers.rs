//! HTTP处理器

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use neuroscan_core::{NeuroscanError, PatientFields};
use neuroscan_dashboard::scan_history::history_rows;
use neuroscan_dashboard::{ScanUploadRequest, SubmitOutcome};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::metrics::Metrics;
use crate::state::{AppState, Workspace};

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "NeuroScan Dashboard API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "login": "/auth/login",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.workspace_count().await
    }))
}

/// Prometheus指标
pub async fn metrics_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state.metrics().render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// 看板视图，首次访问时加载
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(workspace): Extension<Arc<Workspace>>,
) -> ApiResult<impl IntoResponse> {
    let dashboard = workspace.loaded_dashboard().await.map_err(|e| {
        state.metrics().record_backend_failure("load");
        e
    })?;
    Ok(Json(dashboard.view()))
}

/// 重新读取患者列表和选中患者的扫描
pub async fn refresh_dashboard(
    State(state): State<AppState>,
    Extension(workspace): Extension<Arc<Workspace>>,
) -> ApiResult<impl IntoResponse> {
    let mut dashboard = workspace.dashboard().await;
    let selected_before = dashboard.selected_patient_id();
    let result = if dashboard.is_loaded() {
        dashboard.refresh_patients().await
    } else {
        dashboard.load().await
    };
    // 自动选择时患者刷新已经读过扫描
    let result = match result {
        Ok(()) if selected_before.is_some() => dashboard.refresh_scans().await,
        other => other,
    };
    result.map_err(|e| {
        state.metrics().record_backend_failure("refresh");
        e
    })?;

    Ok(Json(dashboard.view()))
}

/// 选择请求
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub patient_id: Uuid,
}

/// 选中患者并读取其扫描
pub async fn update_selection(
    State(state): State<AppState>,
    Extension(workspace): Extension<Arc<Workspace>>,
    Json(request): Json<SelectionRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut dashboard = workspace.loaded_dashboard().await?;
    dashboard
        .select_patient(request.patient_id)
        .await
        .map_err(|e| {
            if !matches!(e, NeuroscanError::NotFound(_)) {
                state.metrics().record_backend_failure("scans");
            }
            e
        })?;

    Ok(Json(dashboard.view()))
}

/// 当前账户的患者列表（最新在前）
pub async fn list_patients(
    Extension(workspace): Extension<Arc<Workspace>>,
) -> ApiResult<impl IntoResponse> {
    let dashboard = workspace.loaded_dashboard().await?;
    let patients = dashboard.patients().unwrap_or(&[]);

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

/// 提交患者建档表单
pub async fn create_patient(
    State(state): State<AppState>,
    Extension(workspace): Extension<Arc<Workspace>>,
    Json(fields): Json<PatientFields>,
) -> ApiResult<impl IntoResponse> {
    let form = workspace.patient_form();
    let patient = settle("patient", form.submit_fields(fields).await, state.metrics())?;
    info!("Patient {} created for user {}", patient.id, workspace.user().id);

    let view = workspace.apply_mutations(state.metrics()).await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "patient": patient, "dashboard": view })),
    ))
}

/// 患者的扫描记录及历史表格
pub async fn list_patient_scans(
    State(state): State<AppState>,
    Extension(workspace): Extension<Arc<Workspace>>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let scans = workspace
        .store()
        .list_scans_for_patient(&workspace.user().id, Some(&patient_id))
        .await
        .map_err(|e| {
            state.metrics().record_backend_failure("scans");
            e
        })?;

    Ok(Json(json!({
        "history": history_rows(&scans),
        "scans": scans,
    })))
}

/// 为患者创建扫描记录
pub async fn upload_scan(
    State(state): State<AppState>,
    Extension(workspace): Extension<Arc<Workspace>>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<ScanUploadRequest>,
) -> ApiResult<impl IntoResponse> {
    {
        let dashboard = workspace.loaded_dashboard().await?;
        let known = dashboard
            .patients()
            .map_or(false, |patients| patients.iter().any(|p| p.id == patient_id));
        if !known {
            return Err(NeuroscanError::NotFound(format!("Patient {} not found", patient_id)).into());
        }
    }

    let scan = settle(
        "scan",
        workspace.scan_upload().upload(patient_id, request).await,
        state.metrics(),
    )?;

    let view = workspace.apply_mutations(state.metrics()).await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "scan": scan, "dashboard": view })),
    ))
}

/// 当前通知，过期的先移除
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(workspace): Extension<Arc<Workspace>>,
) -> impl IntoResponse {
    let toaster = workspace.toaster();
    toaster.dismiss_expired(state.toast_ttl()).await;
    Json(json!({ "notifications": toaster.list().await }))
}

/// 关闭一条通知
pub async fn dismiss_notification(
    Extension(workspace): Extension<Arc<Workspace>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if workspace.toaster().dismiss(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(NeuroscanError::NotFound(format!("Notification {} not found", id)).into())
    }
}

/// 把表单提交结果映射为HTTP结果并计数
fn settle<T>(kind: &str, outcome: SubmitOutcome<T>, metrics: &Metrics) -> ApiResult<T> {
    let (label, result) = match outcome {
        SubmitOutcome::Created(value) => ("created", Ok(value)),
        SubmitOutcome::Rejected(message) => {
            ("rejected", Err(ApiError::new(StatusCode::BAD_REQUEST, message)))
        }
        SubmitOutcome::Failed(message) => {
            ("failed", Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, message)))
        }
        SubmitOutcome::Busy => (
            "busy",
            Err(ApiError::new(
                StatusCode::CONFLICT,
                "A submission is already in progress",
            )),
        ),
        SubmitOutcome::NoSession => (
            "no_session",
            Err(ApiError::new(StatusCode::UNAUTHORIZED, "Not signed in")),
        ),
    };

    if label != "created" {
        warn!("{} submission ended as {}", kind, label);
    }
    metrics.record_mutation(kind, label);
    result
}
