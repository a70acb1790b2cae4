//! 统计卡片
//!
//! 全部由已获取的数据即时推导，不做缓存。

use neuroscan_core::{Patient, ScanWithPredictions};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_patients: usize,
    pub total_scans: usize,
    /// 至少有一条推理结果的扫描数
    pub ai_analyses: usize,
    /// 状态严格为 "pending" 的扫描数
    pub pending: usize,
}

impl DashboardStats {
    /// 未加载的列表按空处理
    pub fn derive(patients: Option<&[Patient]>, scans: Option<&[ScanWithPredictions]>) -> Self {
        let scans = scans.unwrap_or(&[]);
        Self {
            total_patients: patients.map_or(0, <[Patient]>::len),
            total_scans: scans.len(),
            ai_analyses: count_ai_analyses(scans),
            pending: count_pending(scans),
        }
    }
}

pub fn count_ai_analyses(scans: &[ScanWithPredictions]) -> usize {
    scans.iter().filter(|s| s.has_analysis()).count()
}

pub fn count_pending(scans: &[ScanWithPredictions]) -> usize {
    scans.iter().filter(|s| s.scan.is_pending()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use neuroscan_core::{Prediction, Scan};
    use uuid::Uuid;

    fn scan(status: Option<&str>, predictions: usize) -> ScanWithPredictions {
        let now = Utc::now();
        let id = Uuid::new_v4();
        ScanWithPredictions {
            scan: Scan {
                id,
                patient_id: Uuid::nil(),
                scan_type: "MRI".to_string(),
                scan_date: now,
                image_url: None,
                original_filename: None,
                file_size: None,
                scan_notes: None,
                referring_doctor: None,
                technician_name: None,
                status: status.map(str::to_string),
                created_at: now,
                updated_at: now,
            },
            predictions: (0..predictions)
                .map(|_| Prediction {
                    id: Uuid::new_v4(),
                    scan_id: id,
                    prediction_result: "glioma".to_string(),
                    confidence_score: None,
                    tumor_location: None,
                    tumor_size_mm: None,
                    additional_findings: None,
                    doctor_notes: None,
                    reviewed_by_doctor: None,
                    model_version: "v1.0".to_string(),
                    processing_time_ms: None,
                    created_at: now,
                })
                .collect(),
        }
    }

    #[test]
    fn test_pending_and_analysis_scenario() {
        let scans = vec![scan(Some("pending"), 0), scan(Some("done"), 1)];
        let stats = DashboardStats::derive(Some(&[][..]), Some(scans.as_slice()));
        assert_eq!(stats.total_scans, 2);
        assert_eq!(stats.ai_analyses, 1);
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn test_multiple_predictions_count_once() {
        let scans = vec![scan(None, 3), scan(Some("completed"), 0), scan(Some("pending"), 2)];
        assert_eq!(count_ai_analyses(&scans), 2);
    }

    #[test]
    fn test_only_exact_pending_counts() {
        let scans = vec![
            scan(Some("pending"), 0),
            scan(Some("PENDING"), 0),
            scan(Some("pending "), 0),
            scan(Some(""), 0),
            scan(None, 0),
        ];
        assert_eq!(count_pending(&scans), 1);
    }

    #[test]
    fn test_unloaded_lists_count_zero() {
        assert_eq!(DashboardStats::derive(None, None), DashboardStats::default());
    }
}
