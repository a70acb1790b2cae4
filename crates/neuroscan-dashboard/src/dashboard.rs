//! 看板组合与状态
//!
//! 唯一的客户端状态是选中的患者。患者列表和扫描列表每次都整体替换，
//! 查询失败时保留上一次的数据。

use chrono::NaiveDate;
use neuroscan_core::utils::display_name;
use neuroscan_core::{
    NeuroscanError, Patient, Profile, Result, ScanWithPredictions, SessionUser, SharedStore,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{mutation_channel, MutationEvent, MutationReceiver, MutationSender};
use crate::notifications::Toaster;
use crate::patient_form::PatientForm;
use crate::scan_history::{history_rows, ScanHistoryRow};
use crate::scan_upload::ScanUpload;
use crate::selection::SelectionLatch;
use crate::stats::DashboardStats;

/// 患者列表中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientListItem {
    pub id: Uuid,
    pub patient_id: String,
    pub created_on: NaiveDate,
    pub selected: bool,
}

/// 左侧面板：没有患者时显示建档表单，否则显示患者列表
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LeftPanel {
    PatientForm,
    PatientList { patients: Vec<PatientListItem> },
}

/// 看板渲染所需的全部数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub greeting: String,
    pub stats: DashboardStats,
    pub left_panel: LeftPanel,
    pub selected_patient_id: Option<Uuid>,
    /// 选中患者后才显示上传面板
    pub show_scan_upload: bool,
    /// 选中患者后才显示扫描历史
    pub scan_history: Option<Vec<ScanHistoryRow>>,
}

/// 临床看板
pub struct Dashboard {
    store: SharedStore,
    user: Option<SessionUser>,
    profile: Option<Profile>,
    patients: Option<Vec<Patient>>,
    /// 扫描列表连同其所属患者
    scans: Option<(Uuid, Vec<ScanWithPredictions>)>,
    selection: SelectionLatch,
    events_tx: MutationSender,
    events_rx: MutationReceiver,
    loaded: bool,
}

impl Dashboard {
    pub fn new(store: SharedStore, user: Option<SessionUser>) -> Self {
        let (events_tx, events_rx) = mutation_channel();
        Self {
            store,
            user,
            profile: None,
            patients: None,
            scans: None,
            selection: SelectionLatch::new(),
            events_tx,
            events_rx,
            loaded: false,
        }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn patients(&self) -> Option<&[Patient]> {
        self.patients.as_deref()
    }

    /// 当前选中患者的扫描；列表属于其他患者时视为没有
    pub fn scans(&self) -> Option<&[ScanWithPredictions]> {
        let selected = self.selection.selected()?;
        match &self.scans {
            Some((owner, scans)) if *owner == selected => Some(scans.as_slice()),
            _ => None,
        }
    }

    pub fn selected_patient_id(&self) -> Option<Uuid> {
        self.selection.selected()
    }

    /// 子组件用来通知写入成功的发送端
    pub fn event_sender(&self) -> MutationSender {
        self.events_tx.clone()
    }

    /// 创建连接到本看板的患者表单
    pub fn patient_form(&self, toaster: Toaster) -> PatientForm {
        PatientForm::new(self.store.clone(), self.user.clone(), self.event_sender(), toaster)
    }

    /// 创建连接到本看板的扫描上传控制器
    pub fn scan_upload(&self, toaster: Toaster) -> ScanUpload {
        ScanUpload::new(self.store.clone(), self.user.clone(), self.event_sender(), toaster)
    }

    /// 首次加载：账户资料（仅用于问候语）和患者列表
    pub async fn load(&mut self) -> Result<()> {
        if let Some(user) = &self.user {
            match self.store.get_profile(&user.id).await {
                Ok(profile) => self.profile = profile,
                Err(e) => warn!("Failed to load profile for user {}: {}", user.id, e),
            }
        }

        let result = self.refresh_patients().await;
        self.loaded = true;
        result
    }

    /// 重新读取患者列表；首次出现患者时自动选中第一条并读取其扫描
    pub async fn refresh_patients(&mut self) -> Result<()> {
        let Some(user) = &self.user else {
            self.patients = Some(Vec::new());
            return Ok(());
        };

        let patients = match self.store.list_patients(&user.id).await {
            Ok(patients) => patients,
            Err(e) => {
                warn!("Failed to list patients for user {}: {}", user.id, e);
                return Err(e);
            }
        };
        debug!("Fetched {} patients for user {}", patients.len(), user.id);

        let auto_selected = self.selection.observe(&patients);
        self.patients = Some(patients);

        if auto_selected {
            info!("Auto-selected patient {:?}", self.selection.selected());
            self.refresh_scans().await?;
        }
        Ok(())
    }

    /// 重新读取选中患者的扫描；没有选中时不发起查询
    pub async fn refresh_scans(&mut self) -> Result<()> {
        let Some(patient_id) = self.selection.selected() else {
            self.scans = None;
            return Ok(());
        };
        let Some(user) = &self.user else {
            return Ok(());
        };

        match self
            .store
            .list_scans_for_patient(&user.id, Some(&patient_id))
            .await
        {
            Ok(scans) => {
                debug!("Fetched {} scans for patient {}", scans.len(), patient_id);
                self.scans = Some((patient_id, scans));
                Ok(())
            }
            Err(e) => {
                warn!("Failed to list scans for patient {}: {}", patient_id, e);
                // 同一患者保留上次结果，换了患者则不能沿用
                if self.scans.as_ref().is_some_and(|(owner, _)| *owner != patient_id) {
                    self.scans = None;
                }
                Err(e)
            }
        }
    }

    /// 用户点击患者行
    pub async fn select_patient(&mut self, patient_id: Uuid) -> Result<()> {
        let patients = self.patients.as_deref().unwrap_or(&[]);
        if self.selection.select(patient_id, patients)? {
            self.scans = None;
        }
        // 选择变化是扫描查询的唯一触发条件，重复点击同一行也重新读取
        self.refresh_scans().await
    }

    /// 处理一条写入事件，对应一次权威重读
    pub async fn handle_event(&mut self, event: MutationEvent) -> Result<()> {
        debug!("Handling mutation event {:?}", event);
        match event {
            MutationEvent::PatientCreated { .. } => self.refresh_patients().await,
            MutationEvent::ScanUploaded { .. } => self.refresh_scans().await,
        }
    }

    /// 处理所有待处理的写入事件，返回处理的数量；遇到的第一个错误在全部处理完后返回
    pub async fn process_events(&mut self) -> Result<usize> {
        let mut handled = 0;
        let mut first_error: Option<NeuroscanError> = None;

        while let Ok(event) = self.events_rx.try_recv() {
            handled += 1;
            if let Err(e) = self.handle_event(event).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(handled),
        }
    }

    /// 统计卡片；未选中患者时扫描数为零
    pub fn stats(&self) -> DashboardStats {
        DashboardStats::derive(self.patients.as_deref(), self.scans())
    }

    pub fn greeting(&self) -> String {
        format!(
            "Welcome back, {}",
            display_name(self.user.as_ref(), self.profile.as_ref())
        )
    }

    pub fn view(&self) -> DashboardView {
        let selected = self.selection.selected();

        let left_panel = match self.patients.as_deref() {
            Some(patients) if !patients.is_empty() => LeftPanel::PatientList {
                patients: patients
                    .iter()
                    .map(|p| PatientListItem {
                        id: p.id,
                        patient_id: p.patient_id.clone(),
                        created_on: p.created_at.date_naive(),
                        selected: selected == Some(p.id),
                    })
                    .collect(),
            },
            _ => LeftPanel::PatientForm,
        };

        DashboardView {
            greeting: self.greeting(),
            stats: self.stats(),
            left_panel,
            selected_patient_id: selected,
            show_scan_upload: selected.is_some(),
            scan_history: selected.map(|_| history_rows(self.scans().unwrap_or(&[]))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient_form::SubmitOutcome;
    use crate::scan_upload::ScanUploadRequest;
    use chrono::{TimeZone, Utc};
    use neuroscan_core::{PatientFields, Prediction, Scan};
    use neuroscan_database::MemoryStore;
    use std::sync::Arc;

    fn user() -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            email: Some("radiology@clinic.test".to_string()),
            full_name: Some("Dr. Amara Obi".to_string()),
        }
    }

    fn patient(id: Uuid, label: &str, owner: Uuid, day: u32) -> Patient {
        let at = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        Patient {
            id,
            patient_id: label.to_string(),
            medical_history: None,
            allergies: None,
            current_medications: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            user_id: owner,
            created_at: at,
            updated_at: at,
        }
    }

    fn scan(patient_id: Uuid, status: &str, minute: u32) -> Scan {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 9, minute, 0).unwrap();
        Scan {
            id: Uuid::new_v4(),
            patient_id,
            scan_type: "MRI".to_string(),
            scan_date: at,
            image_url: None,
            original_filename: Some(format!("scan_{}.png", minute)),
            file_size: Some(1024),
            scan_notes: None,
            referring_doctor: None,
            technician_name: None,
            status: Some(status.to_string()),
            created_at: at,
            updated_at: at,
        }
    }

    fn prediction(scan_id: Uuid) -> Prediction {
        Prediction {
            id: Uuid::new_v4(),
            scan_id,
            prediction_result: "glioma".to_string(),
            confidence_score: Some(0.913),
            tumor_location: Some("left temporal lobe".to_string()),
            tumor_size_mm: Some(18.0),
            additional_findings: None,
            doctor_notes: None,
            reviewed_by_doctor: Some(false),
            model_version: "v1.0".to_string(),
            processing_time_ms: Some(1200),
            created_at: Utc::now(),
        }
    }

    /// p1 (A1, 1月2日) 比 p2 (A2, 1月1日) 新
    async fn seeded() -> (Arc<MemoryStore>, SessionUser, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let user = user();
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert_patient(patient(p2, "A2", user.id, 1)).await;
        store.insert_patient(patient(p1, "A1", user.id, 2)).await;
        (store, user, p1, p2)
    }

    #[tokio::test]
    async fn test_first_load_selects_newest_patient() {
        let (store, user, p1, _) = seeded().await;
        let mut dashboard = Dashboard::new(store.clone(), Some(user));

        dashboard.load().await.unwrap();
        assert_eq!(dashboard.selected_patient_id(), Some(p1));
        assert_eq!(dashboard.stats().total_patients, 2);
        assert_eq!(store.stats().scan_queries, 1);

        let view = dashboard.view();
        assert_eq!(view.greeting, "Welcome back, Dr. Amara Obi");
        match view.left_panel {
            LeftPanel::PatientList { patients } => {
                assert_eq!(patients[0].patient_id, "A1");
                assert!(patients[0].selected);
                assert!(!patients[1].selected);
            }
            LeftPanel::PatientForm => panic!("expected patient list"),
        }
        assert!(view.show_scan_upload);
        assert_eq!(view.scan_history, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_empty_list_shows_form_and_skips_scan_query() {
        let store = Arc::new(MemoryStore::new());
        let mut dashboard = Dashboard::new(store.clone(), Some(user()));

        dashboard.load().await.unwrap();
        assert_eq!(dashboard.selected_patient_id(), None);
        assert_eq!(store.stats().scan_queries, 0);

        let view = dashboard.view();
        assert_eq!(view.left_panel, LeftPanel::PatientForm);
        assert!(!view.show_scan_upload);
        assert!(view.scan_history.is_none());
        assert_eq!(view.stats, DashboardStats::default());
    }

    #[tokio::test]
    async fn test_no_user_means_empty_state_without_queries() {
        let store = Arc::new(MemoryStore::new());
        let mut dashboard = Dashboard::new(store.clone(), None);

        dashboard.load().await.unwrap();
        assert_eq!(dashboard.patients(), Some(&[][..]));
        assert_eq!(store.stats().patient_queries, 0);
        assert_eq!(dashboard.greeting(), "Welcome back, User");
    }

    #[tokio::test]
    async fn test_stats_for_selected_patient_scans() {
        let (store, user, p1, _) = seeded().await;
        let pending = scan(p1, "pending", 1);
        let done = scan(p1, "done", 2);
        store.insert_scan(pending.clone()).await;
        store.insert_scan(done.clone()).await;
        store.insert_prediction(prediction(done.id)).await;

        let mut dashboard = Dashboard::new(store, Some(user));
        dashboard.load().await.unwrap();

        let stats = dashboard.stats();
        assert_eq!(stats.total_scans, 2);
        assert_eq!(stats.ai_analyses, 1);
        assert_eq!(stats.pending, 1);

        let history = dashboard.view().scan_history.unwrap();
        assert_eq!(history[0].scan_id, done.id);
        let latest = history[0].latest_prediction.as_ref().unwrap();
        assert_eq!(latest.confidence.as_deref(), Some("91.3%"));
        assert!(history[1].latest_prediction.is_none());
    }

    #[tokio::test]
    async fn test_clicking_a_row_switches_scans() {
        let (store, user, p1, p2) = seeded().await;
        store.insert_scan(scan(p2, "pending", 5)).await;

        let mut dashboard = Dashboard::new(store.clone(), Some(user));
        dashboard.load().await.unwrap();
        assert_eq!(dashboard.stats().total_scans, 0);

        dashboard.select_patient(p2).await.unwrap();
        assert_eq!(dashboard.selected_patient_id(), Some(p2));
        assert_eq!(dashboard.stats().total_scans, 1);
        assert_eq!(store.stats().scan_queries, 2);

        let err = dashboard.select_patient(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, NeuroscanError::NotFound(_)));
        assert_eq!(dashboard.selected_patient_id(), Some(p2));

        dashboard.select_patient(p1).await.unwrap();
        assert_eq!(dashboard.stats().total_scans, 0);
    }

    #[tokio::test]
    async fn test_created_patient_appears_after_refetch_and_selection_latches() {
        let (store, user, p1, _) = seeded().await;
        let mut dashboard = Dashboard::new(store.clone(), Some(user));
        dashboard.load().await.unwrap();

        let form = dashboard.patient_form(Toaster::default());
        form.set_draft(PatientFields {
            patient_id: "A3".to_string(),
            ..Default::default()
        })
        .await;
        let created = match form.submit().await {
            SubmitOutcome::Created(patient) => patient,
            other => panic!("unexpected outcome: {:?}", other),
        };

        // 重读完成前仍显示旧列表
        assert_eq!(dashboard.patients().unwrap().len(), 2);

        assert_eq!(dashboard.process_events().await.unwrap(), 1);
        let patients = dashboard.patients().unwrap();
        assert_eq!(patients.len(), 3);
        assert_eq!(patients[0].id, created.id);
        assert_eq!(dashboard.selected_patient_id(), Some(p1));

        dashboard.select_patient(created.id).await.unwrap();
        assert_eq!(dashboard.selected_patient_id(), Some(created.id));
    }

    #[tokio::test]
    async fn test_first_patient_created_from_empty_state_gets_selected() {
        let store = Arc::new(MemoryStore::new());
        let mut dashboard = Dashboard::new(store.clone(), Some(user()));
        dashboard.load().await.unwrap();

        let form = dashboard.patient_form(Toaster::default());
        form.set_draft(PatientFields {
            patient_id: "A1".to_string(),
            ..Default::default()
        })
        .await;
        assert!(matches!(form.submit().await, SubmitOutcome::Created(_)));

        dashboard.process_events().await.unwrap();
        assert!(dashboard.selected_patient_id().is_some());
        assert!(dashboard.view().show_scan_upload);
    }

    #[tokio::test]
    async fn test_upload_triggers_one_scan_refetch() {
        let (store, user, p1, _) = seeded().await;
        let mut dashboard = Dashboard::new(store.clone(), Some(user));
        dashboard.load().await.unwrap();
        let queries_before = store.stats().scan_queries;

        let upload = dashboard.scan_upload(Toaster::default());
        let outcome = upload
            .upload(
                p1,
                ScanUploadRequest {
                    image_url: Some("scans/a1_t1.png".to_string()),
                    original_filename: Some("a1_t1.png".to_string()),
                    file_size: Some(4096),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(outcome, SubmitOutcome::Created(_)));

        assert_eq!(dashboard.process_events().await.unwrap(), 1);
        assert_eq!(store.stats().scan_queries, queries_before + 1);
        assert_eq!(dashboard.stats().total_scans, 1);
        assert_eq!(dashboard.stats().pending, 1);
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_previous_lists() {
        let (store, user, p1, _) = seeded().await;
        store.insert_scan(scan(p1, "pending", 1)).await;
        let mut dashboard = Dashboard::new(store.clone(), Some(user));
        dashboard.load().await.unwrap();

        store.fail_reads(Some("network down")).await;
        assert!(dashboard.refresh_patients().await.is_err());
        assert!(dashboard.refresh_scans().await.is_err());
        assert_eq!(dashboard.patients().unwrap().len(), 2);
        assert_eq!(dashboard.stats().total_scans, 1);
        assert_eq!(dashboard.selected_patient_id(), Some(p1));

        store.fail_reads(None).await;
        assert!(dashboard.refresh_patients().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_switch_does_not_show_previous_patients_scans() {
        let (store, user, p1, p2) = seeded().await;
        store.insert_scan(scan(p1, "pending", 1)).await;
        store.insert_scan(scan(p1, "pending", 2)).await;
        let mut dashboard = Dashboard::new(store.clone(), Some(user));
        dashboard.load().await.unwrap();
        assert_eq!(dashboard.stats().total_scans, 2);

        store.fail_reads(Some("network down")).await;
        assert!(dashboard.select_patient(p2).await.is_err());
        assert_eq!(dashboard.selected_patient_id(), Some(p2));
        assert!(dashboard.scans().is_none());

        let stats = dashboard.stats();
        assert_eq!(stats.total_scans, 0);
        assert_eq!(stats.pending, 0);
        assert_eq!(dashboard.view().scan_history, Some(Vec::new()));

        // 切回原患者同样不会沿用失败前的列表
        assert!(dashboard.select_patient(p1).await.is_err());
        assert_eq!(dashboard.stats().total_scans, 0);

        store.fail_reads(None).await;
        dashboard.select_patient(p1).await.unwrap();
        assert_eq!(dashboard.stats().total_scans, 2);
    }
}
