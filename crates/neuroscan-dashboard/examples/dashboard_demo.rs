//! 看板演示
//!
//! 使用内存存储走一遍完整流程：空看板 → 建档 → 自动选中 → 上传扫描 → AI结果写回。

use chrono::Utc;
use neuroscan_core::{PatientFields, Prediction, SessionUser};
use neuroscan_dashboard::{Dashboard, ScanUploadRequest, SubmitOutcome, Toaster};
use neuroscan_database::MemoryStore;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let store = Arc::new(MemoryStore::new());
    let user = SessionUser {
        id: Uuid::new_v4(),
        email: Some("radiology@clinic.test".to_string()),
        full_name: Some("Dr. Amara Obi".to_string()),
    };

    let mut dashboard = Dashboard::new(store.clone(), Some(user));
    dashboard.load().await?;
    info!("初始看板: {}", summarize(&dashboard));

    // 建档
    let toaster = Toaster::default();
    let form = dashboard.patient_form(toaster.clone());
    form.set_draft(PatientFields {
        patient_id: "MRN-0001".to_string(),
        allergies: Some("penicillin".to_string()),
        ..Default::default()
    })
    .await;
    if let SubmitOutcome::Created(patient) = form.submit().await {
        info!("已创建患者 {}", patient.patient_id);
    }
    dashboard.process_events().await?;

    // 上传扫描
    let patient_id = dashboard
        .selected_patient_id()
        .ok_or_else(|| anyhow::anyhow!("no patient selected"))?;
    let upload = dashboard.scan_upload(toaster.clone());
    let scan = match upload
        .upload(
            patient_id,
            ScanUploadRequest {
                image_url: Some("scans/mrn-0001/t1.png".to_string()),
                original_filename: Some("t1.png".to_string()),
                file_size: Some(734_003),
                referring_doctor: Some("Dr. Osei".to_string()),
                ..Default::default()
            },
        )
        .await
    {
        SubmitOutcome::Created(scan) => scan,
        other => anyhow::bail!("upload failed: {:?}", other),
    };
    dashboard.process_events().await?;

    // AI管线写回结果
    store
        .insert_prediction(Prediction {
            id: Uuid::new_v4(),
            scan_id: scan.id,
            prediction_result: "glioma".to_string(),
            confidence_score: Some(0.913),
            tumor_location: Some("left frontal lobe".to_string()),
            tumor_size_mm: Some(23.5),
            additional_findings: None,
            doctor_notes: None,
            reviewed_by_doctor: Some(false),
            model_version: "v1.0".to_string(),
            processing_time_ms: Some(1840),
            created_at: Utc::now(),
        })
        .await;
    store.set_scan_status(&scan.id, Some("completed")).await?;
    dashboard.refresh_scans().await?;

    info!("最终看板: {}", summarize(&dashboard));
    for toast in toaster.list().await {
        info!("通知: {} - {}", toast.title, toast.description);
    }
    Ok(())
}

fn summarize(dashboard: &Dashboard) -> String {
    let stats = dashboard.stats();
    format!(
        "{} | patients={} scans={} ai_analyses={} pending={}",
        dashboard.greeting(),
        stats.total_patients,
        stats.total_scans,
        stats.ai_analyses,
        stats.pending
    )
}
