//! 扫描上传
//!
//! 只负责创建扫描记录（初始状态 "pending"）；影像文件传输由存储服务完成，
//! 这里接收其返回的存储路径。成功后发出唯一的对外信号：上传完成。

use chrono::{DateTime, Utc};
use neuroscan_core::{NewScan, Scan, SessionUser, SharedStore, SCAN_STATUS_PENDING};
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::{MutationEvent, MutationSender};
use crate::notifications::Toaster;
use crate::patient_form::{InFlight, SubmitOutcome};

pub const SCAN_UPLOADED_MESSAGE: &str = "Scan uploaded successfully!";
pub const SCAN_UPLOAD_FALLBACK: &str = "Failed to upload scan";

/// 上传表单内容
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanUploadRequest {
    #[serde(default)]
    pub scan_type: Option<String>,
    #[serde(default)]
    pub scan_date: Option<DateTime<Utc>>,
    /// 文件在存储中的位置
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub scan_notes: Option<String>,
    #[serde(default)]
    pub referring_doctor: Option<String>,
    #[serde(default)]
    pub technician_name: Option<String>,
}

impl ScanUploadRequest {
    fn validate(&self) -> Result<(), String> {
        let has_file = [&self.image_url, &self.original_filename]
            .iter()
            .any(|v| v.as_deref().map_or(false, |s| !s.trim().is_empty()));
        if !has_file {
            return Err("Please select a scan image to upload".to_string());
        }
        if matches!(self.file_size, Some(size) if size < 0) {
            return Err("File size cannot be negative".to_string());
        }
        Ok(())
    }

    fn into_new_scan(self, patient_id: Uuid) -> NewScan {
        NewScan {
            patient_id,
            scan_type: self.scan_type,
            scan_date: self.scan_date,
            image_url: self.image_url,
            original_filename: self.original_filename,
            file_size: self.file_size,
            scan_notes: self.scan_notes,
            referring_doctor: self.referring_doctor,
            technician_name: self.technician_name,
            status: Some(SCAN_STATUS_PENDING.to_string()),
        }
    }
}

/// 扫描上传控制器
pub struct ScanUpload {
    store: SharedStore,
    user: Option<SessionUser>,
    uploading: AtomicBool,
    events: MutationSender,
    toaster: Toaster,
}

impl ScanUpload {
    pub fn new(
        store: SharedStore,
        user: Option<SessionUser>,
        events: MutationSender,
        toaster: Toaster,
    ) -> Self {
        Self {
            store,
            user,
            uploading: AtomicBool::new(false),
            events,
            toaster,
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(std::sync::atomic::Ordering::Acquire)
    }

    /// 为选中的患者创建扫描记录
    pub async fn upload(&self, patient_id: Uuid, request: ScanUploadRequest) -> SubmitOutcome<Scan> {
        let Some(user) = self.user.as_ref() else {
            return SubmitOutcome::NoSession;
        };
        if let Err(message) = request.validate() {
            return SubmitOutcome::Rejected(message);
        }
        let Some(_in_flight) = InFlight::acquire(&self.uploading) else {
            return SubmitOutcome::Busy;
        };

        let new_scan = request.into_new_scan(patient_id);
        match self.store.create_scan(&user.id, &new_scan).await {
            Ok(scan) => {
                info!("Scan {} uploaded for patient {}", scan.id, patient_id);
                self.toaster.success(SCAN_UPLOADED_MESSAGE).await;
                self.events.send(MutationEvent::ScanUploaded {
                    patient_id,
                    scan_id: scan.id,
                });
                SubmitOutcome::Created(scan)
            }
            Err(e) => {
                let message = Some(e.user_message())
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| SCAN_UPLOAD_FALLBACK.to_string());
                warn!("Scan upload failed for patient {}: {}", patient_id, message);
                self.toaster.error(&message).await;
                SubmitOutcome::Failed(message)
            }
        }
    }
}
