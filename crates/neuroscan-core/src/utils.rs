//! 通用工具函数

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{NeuroscanError, Result};
use crate::models::{PatientFields, Profile, SessionUser};

/// 问候语中的默认称呼
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// 解析后端返回的时间，接受 RFC 3339、无时区时间戳或纯日期
pub fn parse_flexible_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// serde 适配器：见 [`parse_flexible_datetime`]
pub fn deserialize_flexible_datetime<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flexible_datetime(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// 问候语使用的显示名：会话元数据 > 账户资料 > "User"
pub fn display_name(user: Option<&SessionUser>, profile: Option<&Profile>) -> String {
    user.and_then(|u| u.full_name.as_deref())
        .or_else(|| profile.and_then(|p| p.full_name.as_deref()))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_DISPLAY_NAME)
        .to_string()
}

/// 必填项校验：只检查患者编号，其余字段不做格式校验
pub fn validate_patient_fields(fields: &PatientFields) -> Result<()> {
    if fields.patient_id.trim().is_empty() {
        return Err(NeuroscanError::Validation("Patient ID is required".to_string()));
    }
    Ok(())
}
