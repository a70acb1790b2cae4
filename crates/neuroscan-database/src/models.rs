//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use neuroscan_core::models::*;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub patient_id: String,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(db_patient: DbPatient) -> Self {
        Patient {
            id: db_patient.id,
            patient_id: db_patient.patient_id,
            medical_history: db_patient.medical_history,
            allergies: db_patient.allergies,
            current_medications: db_patient.current_medications,
            emergency_contact_name: db_patient.emergency_contact_name,
            emergency_contact_phone: db_patient.emergency_contact_phone,
            user_id: db_patient.user_id,
            created_at: db_patient.created_at,
            updated_at: db_patient.updated_at,
        }
    }
}

/// 数据库扫描表
#[derive(Debug, FromRow)]
pub struct DbScan {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub scan_type: String,
    pub scan_date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub original_filename: Option<String>,
    pub file_size: Option<i64>,
    pub scan_notes: Option<String>,
    pub referring_doctor: Option<String>,
    pub technician_name: Option<String>,
    pub status: Option<String>, // 自由文本，原样保留
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbScan> for Scan {
    fn from(db_scan: DbScan) -> Self {
        Scan {
            id: db_scan.id,
            patient_id: db_scan.patient_id,
            scan_type: db_scan.scan_type,
            scan_date: db_scan.scan_date,
            image_url: db_scan.image_url,
            original_filename: db_scan.original_filename,
            file_size: db_scan.file_size,
            scan_notes: db_scan.scan_notes,
            referring_doctor: db_scan.referring_doctor,
            technician_name: db_scan.technician_name,
            status: db_scan.status,
            created_at: db_scan.created_at,
            updated_at: db_scan.updated_at,
        }
    }
}

/// 数据库推理结果表
#[derive(Debug, FromRow)]
pub struct DbPrediction {
    pub id: Uuid,
    pub scan_id: Uuid,
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

impl From<DbPrediction> for Prediction {
    fn from(db_prediction: DbPrediction) -> Self {
        Prediction {
            id: db_prediction.id,
            scan_id: db_prediction.scan_id,
            prediction_result: db_prediction.prediction_result,
            confidence_score: db_prediction.confidence_score,
            tumor_location: db_prediction.tumor_location,
            tumor_size_mm: db_prediction.tumor_size_mm,
            additional_findings: db_prediction.additional_findings,
            doctor_notes: db_prediction.doctor_notes,
            reviewed_by_doctor: db_prediction.reviewed_by_doctor,
            model_version: db_prediction.model_version,
            processing_time_ms: db_prediction.processing_time_ms,
            created_at: db_prediction.created_at,
        }
    }
}

/// 数据库账户资料表
#[derive(Debug, FromRow)]
pub struct DbProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbProfile> for Profile {
    fn from(db_profile: DbProfile) -> Self {
        Profile {
            id: db_profile.id,
            full_name: db_profile.full_name,
            email: db_profile.email,
            phone: db_profile.phone,
            date_of_birth: db_profile.date_of_birth,
            role: db_profile.role,
            created_at: db_profile.created_at,
            updated_at: db_profile.updated_at,
        }
    }
}

/// 把推理结果挂到各自的扫描下，保持扫描的原有顺序
pub fn attach_predictions(
    scans: Vec<Scan>,
    predictions: Vec<Prediction>,
) -> Vec<ScanWithPredictions> {
    let mut by_scan: HashMap<Uuid, Vec<Prediction>> = HashMap::new();
    for prediction in predictions {
        by_scan.entry(prediction.scan_id).or_default().push(prediction);
    }

    scans
        .into_iter()
        .map(|scan| {
            let predictions = by_scan.remove(&scan.id).unwrap_or_default();
            ScanWithPredictions { scan, predictions }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scan(id: Uuid, minute: u32) -> Scan {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 8, minute, 0).unwrap();
        Scan {
            id,
            patient_id: Uuid::nil(),
            scan_type: "MRI".to_string(),
            scan_date: at,
            image_url: None,
            original_filename: None,
            file_size: None,
            scan_notes: None,
            referring_doctor: None,
            technician_name: None,
            status: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn prediction(scan_id: Uuid) -> Prediction {
        Prediction {
            id: Uuid::new_v4(),
            scan_id,
            prediction_result: "no_tumor".to_string(),
            confidence_score: Some(0.5),
            tumor_location: None,
            tumor_size_mm: None,
            additional_findings: None,
            doctor_notes: None,
            reviewed_by_doctor: Some(false),
            model_version: "v1.0".to_string(),
            processing_time_ms: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_attach_predictions_groups_by_scan() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let scans = vec![scan(a, 3), scan(b, 2), scan(c, 1)];
        let predictions = vec![prediction(b), prediction(a), prediction(b), prediction(Uuid::new_v4())];

        let joined = attach_predictions(scans, predictions);
        let ids: Vec<Uuid> = joined.iter().map(|s| s.scan.id).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(joined[0].predictions.len(), 1);
        assert_eq!(joined[1].predictions.len(), 2);
        assert!(joined[2].predictions.is_empty());
    }
}
