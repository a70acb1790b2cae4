//! 扫描历史视图模型

use chrono::{DateTime, Utc};
use neuroscan_core::{Prediction, ScanWithPredictions};
use serde::Serialize;
use uuid::Uuid;

/// 最新一次推理的摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub result: String,
    /// 例如 "91.3%"
    pub confidence: Option<String>,
    pub tumor_location: Option<String>,
    pub tumor_size_mm: Option<f64>,
    pub reviewed_by_doctor: bool,
    pub model_version: String,
    pub processing_time_ms: Option<i64>,
}

impl From<&Prediction> for PredictionSummary {
    fn from(prediction: &Prediction) -> Self {
        Self {
            result: prediction.prediction_result.clone(),
            confidence: prediction.confidence_score.map(format_confidence),
            tumor_location: prediction.tumor_location.clone(),
            tumor_size_mm: prediction.tumor_size_mm,
            reviewed_by_doctor: prediction.is_reviewed(),
            model_version: prediction.model_version.clone(),
            processing_time_ms: prediction.processing_time_ms,
        }
    }
}

/// 扫描历史中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanHistoryRow {
    pub scan_id: Uuid,
    pub scan_type: String,
    pub scan_date: DateTime<Utc>,
    pub original_filename: Option<String>,
    pub status: Option<String>,
    pub prediction_count: usize,
    pub latest_prediction: Option<PredictionSummary>,
}

/// 置信度显示为百分比；[0, 1] 之间的值视为比例
pub fn format_confidence(score: f64) -> String {
    let percent = if (0.0..=1.0).contains(&score) { score * 100.0 } else { score };
    format!("{:.1}%", percent)
}

/// 按获取顺序（最新在前）生成历史行
pub fn history_rows(scans: &[ScanWithPredictions]) -> Vec<ScanHistoryRow> {
    scans
        .iter()
        .map(|entry| ScanHistoryRow {
            scan_id: entry.scan.id,
            scan_type: entry.scan.scan_type.clone(),
            scan_date: entry.scan.scan_date,
            original_filename: entry.scan.original_filename.clone(),
            status: entry.scan.status.clone(),
            prediction_count: entry.predictions.len(),
            latest_prediction: entry.latest_prediction().map(PredictionSummary::from),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.913), "91.3%");
        assert_eq!(format_confidence(1.0), "100.0%");
        assert_eq!(format_confidence(87.26), "87.3%");
        assert_eq!(format_confidence(0.0), "0.0%");
    }
}
