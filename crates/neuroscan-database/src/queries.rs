//! 数据库查询操作

use async_trait::async_trait;
use neuroscan_core::utils::validate_patient_fields;
use neuroscan_core::{
    ClinicalStore, NeuroscanError, NewPatient, NewScan, Patient, PatientFields, Profile, Result,
    Scan, ScanWithPredictions,
};
use tracing::debug;
use uuid::Uuid;

use crate::connection::DatabasePool;
use crate::models::*;

/// 基于PostgreSQL的临床数据存储
///
/// 自托管部署下没有行级安全策略，所有语句都显式带上所属用户条件。
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DatabasePool,
}

impl PgStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建账户资料表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id UUID PRIMARY KEY,
                full_name TEXT,
                email TEXT,
                phone TEXT,
                date_of_birth DATE,
                role TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建患者表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                patient_id TEXT NOT NULL CHECK (patient_id <> ''),
                medical_history TEXT,
                allergies TEXT,
                current_medications TEXT,
                emergency_contact_name TEXT,
                emergency_contact_phone TEXT,
                user_id UUID NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                CONSTRAINT patients_user_id_patient_id_key UNIQUE (user_id, patient_id)
            )
        "#).execute(pool).await?;

        // 创建扫描表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS scans (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
                scan_type TEXT NOT NULL DEFAULT 'MRI',
                scan_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                image_url TEXT,
                original_filename TEXT,
                file_size BIGINT,
                scan_notes TEXT,
                referring_doctor TEXT,
                technician_name TEXT,
                status TEXT DEFAULT 'pending',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建推理结果表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                scan_id UUID NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
                prediction_result TEXT NOT NULL,
                confidence_score DOUBLE PRECISION,
                tumor_location TEXT,
                tumor_size_mm DOUBLE PRECISION,
                additional_findings TEXT,
                doctor_notes TEXT,
                reviewed_by_doctor BOOLEAN DEFAULT FALSE,
                model_version TEXT NOT NULL DEFAULT 'v1.0',
                processing_time_ms BIGINT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_patients_user_id_created_at ON patients(user_id, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_scans_patient_id_created_at ON scans(patient_id, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_scans_status ON scans(status)",
            "CREATE INDEX IF NOT EXISTS idx_predictions_scan_id ON predictions(scan_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    /// 读取指定扫描下的全部推理结果
    async fn predictions_for_scans(&self, scan_ids: &[Uuid]) -> Result<Vec<DbPrediction>> {
        if scan_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, DbPrediction>(
            "SELECT * FROM predictions WHERE scan_id = ANY($1) ORDER BY created_at DESC",
        )
        .bind(scan_ids)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl ClinicalStore for PgStore {
    async fn list_patients(&self, user_id: &Uuid) -> Result<Vec<Patient>> {
        debug!("Listing patients for user {}", user_id);

        let results = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| NeuroscanError::Query(e.to_string()))?;

        Ok(results.into_iter().map(Patient::from).collect())
    }

    async fn list_scans_for_patient(
        &self,
        user_id: &Uuid,
        patient_id: Option<&Uuid>,
    ) -> Result<Vec<ScanWithPredictions>> {
        let Some(patient_id) = patient_id else {
            return Ok(Vec::new());
        };
        debug!("Listing scans for patient {}", patient_id);

        let scans = sqlx::query_as::<_, DbScan>(r#"
            SELECT s.* FROM scans s
            JOIN patients p ON p.id = s.patient_id
            WHERE s.patient_id = $1 AND p.user_id = $2
            ORDER BY s.created_at DESC
        "#)
        .bind(patient_id)
        .bind(user_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| NeuroscanError::Query(e.to_string()))?;

        let scan_ids: Vec<Uuid> = scans.iter().map(|s| s.id).collect();
        let predictions = self
            .predictions_for_scans(&scan_ids)
            .await
            .map_err(|e| NeuroscanError::Query(e.user_message()))?;

        Ok(attach_predictions(
            scans.into_iter().map(Scan::from).collect(),
            predictions.into_iter().map(Into::into).collect(),
        ))
    }

    async fn create_patient(&self, user_id: &Uuid, fields: &PatientFields) -> Result<Patient> {
        validate_patient_fields(fields)?;
        let patient = NewPatient::from_fields(*user_id, fields);

        let row = sqlx::query_as::<_, DbPatient>(r#"
            INSERT INTO patients (user_id, patient_id, medical_history, allergies,
                current_medications, emergency_contact_name, emergency_contact_phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        "#)
        .bind(patient.user_id)
        .bind(&patient.patient_id)
        .bind(&patient.medical_history)
        .bind(&patient.allergies)
        .bind(&patient.current_medications)
        .bind(&patient.emergency_contact_name)
        .bind(&patient.emergency_contact_phone)
        .fetch_one(self.pool.pool())
        .await?;

        debug!("Created patient {} ({})", row.id, row.patient_id);
        Ok(row.into())
    }

    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<Profile>> {
        let result = sqlx::query_as::<_, DbProfile>("SELECT * FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| NeuroscanError::Query(e.to_string()))?;

        Ok(result.map(Profile::from))
    }

    async fn create_scan(&self, user_id: &Uuid, new_scan: &NewScan) -> Result<Scan> {
        // 只有患者属于当前用户时才插入
        let row = sqlx::query_as::<_, DbScan>(r#"
            INSERT INTO scans (patient_id, scan_type, scan_date, image_url, original_filename,
                file_size, scan_notes, referring_doctor, technician_name, status)
            SELECT $1, COALESCE($2, 'MRI'), COALESCE($3, NOW()), $4, $5, $6, $7, $8, $9, $10
            WHERE EXISTS (SELECT 1 FROM patients WHERE id = $1 AND user_id = $11)
            RETURNING *
        "#)
        .bind(new_scan.patient_id)
        .bind(&new_scan.scan_type)
        .bind(new_scan.scan_date)
        .bind(&new_scan.image_url)
        .bind(&new_scan.original_filename)
        .bind(new_scan.file_size)
        .bind(&new_scan.scan_notes)
        .bind(&new_scan.referring_doctor)
        .bind(&new_scan.technician_name)
        .bind(&new_scan.status)
        .bind(user_id)
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(Scan::from).ok_or_else(|| {
            NeuroscanError::NotFound(format!("Patient {} not found", new_scan.patient_id))
        })
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
