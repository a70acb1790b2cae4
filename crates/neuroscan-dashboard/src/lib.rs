//! # NeuroScan看板模块
//!
//! 临床看板的组合与客户端状态：
//! - 看板：患者列表、选中患者的扫描、统计卡片
//! - 选择锁存：首次加载自动选中最新患者，之后不再自动变更
//! - 患者表单与扫描上传控制器：提交防重、结果通知
//! - 变更事件总线：每次写入成功后触发一次权威重读

pub mod dashboard;
pub mod events;
pub mod notifications;
pub mod patient_form;
pub mod scan_history;
pub mod scan_upload;
pub mod selection;
pub mod stats;

// 重新导出主要类型
pub use dashboard::{Dashboard, DashboardView, LeftPanel, PatientListItem};
pub use events::{mutation_channel, MutationEvent, MutationReceiver, MutationSender};
pub use notifications::{Notification, NotificationVariant, Toaster};
pub use patient_form::{PatientForm, SubmitOutcome};
pub use scan_history::{PredictionSummary, ScanHistoryRow};
pub use scan_upload::{ScanUpload, ScanUploadRequest};
pub use selection::SelectionLatch;
pub use stats::DashboardStats;
