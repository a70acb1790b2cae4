//! 进程内存储
//!
//! 与PostgreSQL实现语义一致的内存版数据访问层：按用户限定、按创建时间倒序、
//! 同一用户下患者编号唯一。可注入读写故障，并记录调用次数。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neuroscan_core::utils::validate_patient_fields;
use neuroscan_core::{
    ClinicalStore, NeuroscanError, NewPatient, NewScan, Patient, PatientFields, Prediction,
    Profile, Result, Scan, ScanWithPredictions,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::attach_predictions;

/// 调用计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub patient_queries: usize,
    pub scan_queries: usize,
    pub profile_queries: usize,
    pub writes: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    patients: Vec<Patient>,
    scans: Vec<Scan>,
    predictions: Vec<Prediction>,
    profiles: HashMap<Uuid, Profile>,
    read_failure: Option<String>,
    write_failure: Option<String>,
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    patient_queries: AtomicUsize,
    scan_queries: AtomicUsize,
    profile_queries: AtomicUsize,
    writes: AtomicUsize,
}

/// 最新的排在前面；时间相同时后插入的排在前面
fn newest_first<T, F>(rows: &[T], created_at: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> DateTime<Utc>,
{
    let mut sorted: Vec<T> = rows.iter().rev().cloned().collect();
    sorted.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    sorted
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            patient_queries: self.patient_queries.load(Ordering::SeqCst),
            scan_queries: self.scan_queries.load(Ordering::SeqCst),
            profile_queries: self.profile_queries.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
        }
    }

    /// 之后的读操作都以该消息失败，传 `None` 恢复
    pub async fn fail_reads(&self, message: Option<&str>) {
        self.state.write().await.read_failure = message.map(str::to_string);
    }

    /// 之后的写操作都以该消息失败，传 `None` 恢复
    pub async fn fail_writes(&self, message: Option<&str>) {
        self.state.write().await.write_failure = message.map(str::to_string);
    }

    /// 直接写入一条患者记录（保留给定的时间戳）
    pub async fn insert_patient(&self, patient: Patient) {
        self.state.write().await.patients.push(patient);
    }

    pub async fn insert_scan(&self, scan: Scan) {
        self.state.write().await.scans.push(scan);
    }

    /// 模拟AI推理管线写入结果
    pub async fn insert_prediction(&self, prediction: Prediction) {
        self.state.write().await.predictions.push(prediction);
    }

    pub async fn upsert_profile(&self, profile: Profile) {
        self.state.write().await.profiles.insert(profile.id, profile);
    }

    /// 模拟后端推进扫描状态
    pub async fn set_scan_status(&self, scan_id: &Uuid, status: Option<&str>) -> Result<()> {
        let mut state = self.state.write().await;
        let scan = state
            .scans
            .iter_mut()
            .find(|s| &s.id == scan_id)
            .ok_or_else(|| NeuroscanError::NotFound(format!("Scan {} not found", scan_id)))?;
        scan.status = status.map(str::to_string);
        scan.updated_at = Utc::now();
        Ok(())
    }

    fn check_read(state: &MemoryState) -> Result<()> {
        match &state.read_failure {
            Some(message) => Err(NeuroscanError::Query(message.clone())),
            None => Ok(()),
        }
    }

    fn check_write(state: &MemoryState) -> Result<()> {
        match &state.write_failure {
            Some(message) => Err(NeuroscanError::Validation(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClinicalStore for MemoryStore {
    async fn list_patients(&self, user_id: &Uuid) -> Result<Vec<Patient>> {
        self.patient_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        Self::check_read(&state)?;

        let owned: Vec<Patient> = state
            .patients
            .iter()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(&owned, |p| p.created_at))
    }

    async fn list_scans_for_patient(
        &self,
        user_id: &Uuid,
        patient_id: Option<&Uuid>,
    ) -> Result<Vec<ScanWithPredictions>> {
        let Some(patient_id) = patient_id else {
            return Ok(Vec::new());
        };
        self.scan_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        Self::check_read(&state)?;

        let owns_patient = state
            .patients
            .iter()
            .any(|p| &p.id == patient_id && &p.user_id == user_id);
        if !owns_patient {
            // 行级安全下他人的数据表现为不存在
            return Ok(Vec::new());
        }

        let scans: Vec<Scan> = state
            .scans
            .iter()
            .filter(|s| &s.patient_id == patient_id)
            .cloned()
            .collect();
        let predictions = newest_first(&state.predictions, |p| p.created_at);
        Ok(attach_predictions(newest_first(&scans, |s| s.created_at), predictions))
    }

    async fn create_patient(&self, user_id: &Uuid, fields: &PatientFields) -> Result<Patient> {
        validate_patient_fields(fields)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        Self::check_write(&state)?;

        let duplicate = state
            .patients
            .iter()
            .any(|p| &p.user_id == user_id && p.patient_id == fields.patient_id);
        if duplicate {
            return Err(NeuroscanError::Validation(
                "duplicate key value violates unique constraint \"patients_user_id_patient_id_key\""
                    .to_string(),
            ));
        }

        let new_patient = NewPatient::from_fields(*user_id, fields);
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            patient_id: new_patient.patient_id,
            medical_history: new_patient.medical_history,
            allergies: new_patient.allergies,
            current_medications: new_patient.current_medications,
            emergency_contact_name: new_patient.emergency_contact_name,
            emergency_contact_phone: new_patient.emergency_contact_phone,
            user_id: new_patient.user_id,
            created_at: now,
            updated_at: now,
        };
        state.patients.push(patient.clone());

        debug!("Created patient {} ({}) in memory", patient.id, patient.patient_id);
        Ok(patient)
    }

    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<Profile>> {
        self.profile_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        Self::check_read(&state)?;
        Ok(state.profiles.get(user_id).cloned())
    }

    async fn create_scan(&self, user_id: &Uuid, new_scan: &NewScan) -> Result<Scan> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        Self::check_write(&state)?;

        let owns_patient = state
            .patients
            .iter()
            .any(|p| p.id == new_scan.patient_id && &p.user_id == user_id);
        if !owns_patient {
            return Err(NeuroscanError::NotFound(format!(
                "Patient {} not found",
                new_scan.patient_id
            )));
        }

        let now = Utc::now();
        let scan = Scan {
            id: Uuid::new_v4(),
            patient_id: new_scan.patient_id,
            scan_type: new_scan.scan_type.clone().unwrap_or_else(|| "MRI".to_string()),
            scan_date: new_scan.scan_date.unwrap_or(now),
            image_url: new_scan.image_url.clone(),
            original_filename: new_scan.original_filename.clone(),
            file_size: new_scan.file_size,
            scan_notes: new_scan.scan_notes.clone(),
            referring_doctor: new_scan.referring_doctor.clone(),
            technician_name: new_scan.technician_name.clone(),
            status: new_scan.status.clone(),
            created_at: now,
            updated_at: now,
        };
        state.scans.push(scan.clone());
        Ok(scan)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use neuroscan_core::SCAN_STATUS_PENDING;

    fn patient(user_id: Uuid, label: &str, day: u32) -> Patient {
        let at = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        Patient {
            id: Uuid::new_v4(),
            patient_id: label.to_string(),
            medical_history: None,
            allergies: None,
            current_medications: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            user_id,
            created_at: at,
            updated_at: at,
        }
    }

    fn fields(label: &str) -> PatientFields {
        PatientFields {
            patient_id: label.to_string(),
            ..Default::default()
        }
    }

    fn upload(patient_id: Uuid) -> NewScan {
        NewScan {
            patient_id,
            scan_type: None,
            scan_date: None,
            image_url: Some("scans/brain.png".to_string()),
            original_filename: Some("brain.png".to_string()),
            file_size: Some(2048),
            scan_notes: None,
            referring_doctor: None,
            technician_name: None,
            status: Some(SCAN_STATUS_PENDING.to_string()),
        }
    }

    #[tokio::test]
    async fn test_list_patients_newest_first_and_scoped() {
        let store = MemoryStore::new();
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert_patient(patient(me, "A2", 1)).await;
        store.insert_patient(patient(me, "A1", 2)).await;
        store.insert_patient(patient(other, "B1", 3)).await;

        let labels: Vec<String> = store
            .list_patients(&me)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.patient_id)
            .collect();
        assert_eq!(labels, vec!["A1", "A2"]);

        assert!(store.list_patients(&Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_patient_rejects_duplicates_and_empty_ids() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();

        store.create_patient(&me, &fields("A1")).await.unwrap();
        let err = store.create_patient(&me, &fields("A1")).await.unwrap_err();
        assert!(err.user_message().contains("duplicate key value"));

        // 另一个用户可以使用相同编号
        assert!(store.create_patient(&Uuid::new_v4(), &fields("A1")).await.is_ok());

        let before = store.stats().writes;
        assert!(store.create_patient(&me, &fields("")).await.is_err());
        assert_eq!(store.stats().writes, before);
    }

    #[tokio::test]
    async fn test_scans_are_scoped_to_owner() {
        let store = MemoryStore::new();
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let mine = store.create_patient(&me, &fields("A1")).await.unwrap();

        store.create_scan(&me, &upload(mine.id)).await.unwrap();
        let err = store.create_scan(&other, &upload(mine.id)).await.unwrap_err();
        assert!(matches!(err, NeuroscanError::NotFound(_)));

        assert_eq!(store.list_scans_for_patient(&me, Some(&mine.id)).await.unwrap().len(), 1);
        assert!(store
            .list_scans_for_patient(&other, Some(&mine.id))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_absent_patient_issues_no_scan_query() {
        let store = MemoryStore::new();
        let scans = store.list_scans_for_patient(&Uuid::new_v4(), None).await.unwrap();
        assert!(scans.is_empty());
        assert_eq!(store.stats().scan_queries, 0);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();

        store.fail_reads(Some("JWT expired")).await;
        let err = store.list_patients(&me).await.unwrap_err();
        assert!(matches!(err, NeuroscanError::Query(ref m) if m == "JWT expired"));
        store.fail_reads(None).await;
        assert!(store.list_patients(&me).await.is_ok());

        store.fail_writes(Some("new row violates row-level security policy")).await;
        let err = store.create_patient(&me, &fields("A1")).await.unwrap_err();
        assert_eq!(err.user_message(), "new row violates row-level security policy");
    }
}
