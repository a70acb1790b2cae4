//! 基于托管后端REST接口的数据访问层

use async_trait::async_trait;
use neuroscan_core::utils::validate_patient_fields;
use neuroscan_core::{
    ClinicalStore, NewPatient, NewScan, Patient, PatientFields, Profile, Result, Scan,
    ScanWithPredictions,
};
use tracing::debug;
use uuid::Uuid;

use crate::client::BackendClient;

/// 扫描查询：嵌入推理结果，并通过内连接患者表按所属用户过滤
const SCAN_SELECT: &str = "*,predictions(*),patients!inner(user_id)";

/// 以某个用户会话访问后端的存储
#[derive(Debug, Clone)]
pub struct RestStore {
    client: BackendClient,
    access_token: String,
}

impl RestStore {
    pub fn new(client: BackendClient, access_token: &str) -> Self {
        Self {
            client,
            access_token: access_token.to_string(),
        }
    }
}

#[async_trait]
impl ClinicalStore for RestStore {
    async fn list_patients(&self, user_id: &Uuid) -> Result<Vec<Patient>> {
        self.client
            .from("patients")
            .select("*")
            .eq("user_id", user_id)
            .order("created_at", false)
            .with_token(&self.access_token)
            .fetch()
            .await
    }

    async fn list_scans_for_patient(
        &self,
        user_id: &Uuid,
        patient_id: Option<&Uuid>,
    ) -> Result<Vec<ScanWithPredictions>> {
        let Some(patient_id) = patient_id else {
            return Ok(Vec::new());
        };

        self.client
            .from("scans")
            .select(SCAN_SELECT)
            .eq("patient_id", patient_id)
            .eq("patients.user_id", user_id)
            .order("created_at", false)
            .order("predictions.created_at", false)
            .with_token(&self.access_token)
            .fetch()
            .await
    }

    async fn create_patient(&self, user_id: &Uuid, fields: &PatientFields) -> Result<Patient> {
        validate_patient_fields(fields)?;
        let row = NewPatient::from_fields(*user_id, fields);

        let patient: Patient = self
            .client
            .from("patients")
            .with_token(&self.access_token)
            .insert(&row)
            .await?;

        debug!("Created patient {} ({})", patient.id, patient.patient_id);
        Ok(patient)
    }

    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<Profile>> {
        self.client
            .from("profiles")
            .select("*")
            .eq("id", user_id)
            .with_token(&self.access_token)
            .maybe_single()
            .await
    }

    async fn create_scan(&self, _user_id: &Uuid, new_scan: &NewScan) -> Result<Scan> {
        // 所属关系由后端行级安全策略校验
        self.client
            .from("scans")
            .with_token(&self.access_token)
            .insert(new_scan)
            .await
    }

    fn backend_name(&self) -> &'static str {
        "rest"
    }
}
