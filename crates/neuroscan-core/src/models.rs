//! 核心数据模型定义
//!
//! 四张表（patients、scans、predictions、profiles）的行模型以及插入模型。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::deserialize_flexible_datetime;

/// 唯一有据可查的扫描状态值
pub const SCAN_STATUS_PENDING: &str = "pending";

/// 患者档案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub patient_id: String, // 用户自定义的患者编号
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub user_id: Uuid, // 所属账户
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// MRI扫描记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub patient_id: Uuid, // 关联 patients.id
    pub scan_type: String,
    #[serde(deserialize_with = "deserialize_flexible_datetime")]
    pub scan_date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub original_filename: Option<String>,
    pub file_size: Option<i64>, // 字节
    pub scan_notes: Option<String>,
    pub referring_doctor: Option<String>,
    pub technician_name: Option<String>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scan {
    /// 状态严格等于 "pending"
    pub fn is_pending(&self) -> bool {
        self.status.as_deref() == Some(SCAN_STATUS_PENDING)
    }
}

/// AI推理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    pub scan_id: Uuid, // 关联 scans.id
    pub prediction_result: String,
    pub confidence_score: Option<f64>,
    pub tumor_location: Option<String>,
    pub tumor_size_mm: Option<f64>,
    pub additional_findings: Option<String>,
    pub doctor_notes: Option<String>,
    pub reviewed_by_doctor: Option<bool>,
    pub model_version: String,
    pub processing_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Prediction {
    pub fn is_reviewed(&self) -> bool {
        self.reviewed_by_doctor.unwrap_or(false)
    }
}

/// 账户资料，每个用户一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid, // 与认证用户ID相同
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 扫描及其嵌套的推理结果（与后端嵌入式关联查询的返回形状一致）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanWithPredictions {
    #[serde(flatten)]
    pub scan: Scan,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

impl ScanWithPredictions {
    /// 至少有一条AI推理结果
    pub fn has_analysis(&self) -> bool {
        !self.predictions.is_empty()
    }

    /// 最新创建的推理结果
    pub fn latest_prediction(&self) -> Option<&Prediction> {
        self.predictions.iter().max_by_key(|p| p.created_at)
    }
}

/// 患者表单字段
///
/// `None` 表示未填写（存为 null），`Some("")` 表示明确留空。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientFields {
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub current_medications: Option<String>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
}

/// 新患者插入模型
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPatient {
    pub user_id: Uuid,
    pub patient_id: String,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

impl NewPatient {
    /// 所属账户总是取自认证会话，而不是表单
    pub fn from_fields(user_id: Uuid, fields: &PatientFields) -> Self {
        Self {
            user_id,
            patient_id: fields.patient_id.clone(),
            medical_history: fields.medical_history.clone(),
            allergies: fields.allergies.clone(),
            current_medications: fields.current_medications.clone(),
            emergency_contact_name: fields.emergency_contact_name.clone(),
            emergency_contact_phone: fields.emergency_contact_phone.clone(),
        }
    }
}

/// 新扫描插入模型
///
/// `scan_type` 和 `scan_date` 为空时由后端填充默认值。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewScan {
    pub patient_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub original_filename: Option<String>,
    pub file_size: Option<i64>,
    pub scan_notes: Option<String>,
    pub referring_doctor: Option<String>,
    pub technician_name: Option<String>,
    pub status: Option<String>,
}

/// 当前登录用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>, // 来自会话元数据
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scan_json(status: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "7f1d2c3e-0000-4000-8000-000000000001",
            "patient_id": "7f1d2c3e-0000-4000-8000-000000000002",
            "scan_type": "MRI",
            "scan_date": "2024-03-05",
            "image_url": null,
            "original_filename": "brain_t1.png",
            "file_size": 524288,
            "scan_notes": null,
            "referring_doctor": "Dr. Osei",
            "technician_name": null,
            "status": status,
            "created_at": "2024-03-05T09:12:00.123456+00:00",
            "updated_at": "2024-03-05T09:12:00+00:00",
            "predictions": [{
                "id": "7f1d2c3e-0000-4000-8000-000000000003",
                "scan_id": "7f1d2c3e-0000-4000-8000-000000000001",
                "prediction_result": "glioma",
                "confidence_score": 0.913,
                "tumor_location": "left frontal lobe",
                "tumor_size_mm": 23.5,
                "additional_findings": null,
                "doctor_notes": null,
                "reviewed_by_doctor": null,
                "model_version": "v1.0",
                "processing_time_ms": 1840,
                "created_at": "2024-03-05T09:13:00+00:00"
            }]
        })
    }

    #[test]
    fn test_embedded_scan_deserializes() {
        let scan: ScanWithPredictions = serde_json::from_value(scan_json(json!("pending"))).unwrap();
        assert!(scan.scan.is_pending());
        assert!(scan.has_analysis());
        assert_eq!(scan.scan.scan_date.to_rfc3339(), "2024-03-05T00:00:00+00:00");
        assert!(!scan.predictions[0].is_reviewed());
    }

    #[test]
    fn test_pending_is_exact_match() {
        for status in [json!(null), json!("Pending"), json!("done"), json!(" pending")] {
            let scan: ScanWithPredictions = serde_json::from_value(scan_json(status)).unwrap();
            assert!(!scan.scan.is_pending());
        }
    }

    #[test]
    fn test_new_patient_keeps_null_and_blank_apart() {
        let fields = PatientFields {
            patient_id: "A1".to_string(),
            allergies: Some(String::new()),
            ..Default::default()
        };
        let owner = Uuid::new_v4();
        let value = serde_json::to_value(NewPatient::from_fields(owner, &fields)).unwrap();
        assert_eq!(value["allergies"], json!(""));
        assert_eq!(value["medical_history"], json!(null));
        assert_eq!(value["user_id"], json!(owner.to_string()));
    }

    #[test]
    fn test_new_scan_omits_backend_defaults() {
        let new_scan = NewScan {
            patient_id: Uuid::new_v4(),
            scan_type: None,
            scan_date: None,
            image_url: None,
            original_filename: Some("scan.png".to_string()),
            file_size: Some(10),
            scan_notes: None,
            referring_doctor: None,
            technician_name: None,
            status: Some(SCAN_STATUS_PENDING.to_string()),
        };
        let value = serde_json::to_value(&new_scan).unwrap();
        assert!(value.get("scan_type").is_none());
        assert!(value.get("scan_date").is_none());
        assert_eq!(value["scan_notes"], json!(null));
    }
}
