//! 数据访问接口
//!
//! 看板依赖的读写操作，所有操作都按当前登录用户限定范围。

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewScan, Patient, PatientFields, Profile, Scan, ScanWithPredictions};

/// 临床数据存储接口
///
/// 实现不做重试：一次失败直接返回给调用方。
#[async_trait]
pub trait ClinicalStore: Send + Sync {
    /// 获取用户的全部患者，按创建时间倒序；没有患者时返回空列表
    async fn list_patients(&self, user_id: &Uuid) -> Result<Vec<Patient>>;

    /// 获取患者的全部扫描（含推理结果），按创建时间倒序
    ///
    /// `patient_id` 为空时返回空列表，不发起查询。
    async fn list_scans_for_patient(
        &self,
        user_id: &Uuid,
        patient_id: Option<&Uuid>,
    ) -> Result<Vec<ScanWithPredictions>>;

    /// 创建患者档案；`patient_id` 必填
    async fn create_patient(&self, user_id: &Uuid, fields: &PatientFields) -> Result<Patient>;

    /// 获取账户资料
    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<Profile>>;

    /// 为用户名下的患者创建扫描记录
    async fn create_scan(&self, user_id: &Uuid, new_scan: &NewScan) -> Result<Scan>;

    /// 存储后端名称，用于日志
    fn backend_name(&self) -> &'static str;
}

/// 共享的存储句柄
pub type SharedStore = Arc<dyn ClinicalStore>;
