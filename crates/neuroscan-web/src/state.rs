//! 应用状态与会话工作区
//!
//! 每个访问令牌对应一个工作区：一块看板、一个患者表单、一个上传控制器和一组通知。
//! 表单和上传控制器不在看板锁内，提交进行中时看板仍可读取。

use neuroscan_core::{AuthenticatedSession, Result, SessionProvider, SessionUser, SharedStore};
use neuroscan_dashboard::{Dashboard, DashboardView, PatientForm, ScanUpload, Toaster};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::metrics::Metrics;

/// 工作区参数
#[derive(Debug, Clone)]
pub struct WorkspaceSettings {
    /// 同时保留的通知数
    pub toast_limit: usize,
    /// 通知存活时间
    pub toast_ttl: Duration,
    /// 空闲多久后回收工作区
    pub idle_timeout: Duration,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            toast_limit: 3,
            toast_ttl: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(3600),
        }
    }
}

/// 单个会话的看板工作区
pub struct Workspace {
    user: SessionUser,
    store: SharedStore,
    dashboard: Mutex<Dashboard>,
    patient_form: PatientForm,
    scan_upload: ScanUpload,
    toaster: Toaster,
    last_seen: Mutex<Instant>,
}

impl Workspace {
    pub fn new(session: AuthenticatedSession, settings: &WorkspaceSettings) -> Self {
        let toaster = Toaster::new(settings.toast_limit);
        let dashboard = Dashboard::new(session.store.clone(), Some(session.user.clone()));
        let patient_form = dashboard.patient_form(toaster.clone());
        let scan_upload = dashboard.scan_upload(toaster.clone());

        Self {
            user: session.user,
            store: session.store,
            dashboard: Mutex::new(dashboard),
            patient_form,
            scan_upload,
            toaster,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn patient_form(&self) -> &PatientForm {
        &self.patient_form
    }

    pub fn scan_upload(&self) -> &ScanUpload {
        &self.scan_upload
    }

    pub fn toaster(&self) -> &Toaster {
        &self.toaster
    }

    pub async fn dashboard(&self) -> MutexGuard<'_, Dashboard> {
        self.dashboard.lock().await
    }

    /// 取得看板，首次访问时完成加载
    pub async fn loaded_dashboard(&self) -> Result<MutexGuard<'_, Dashboard>> {
        let mut dashboard = self.dashboard.lock().await;
        if !dashboard.is_loaded() {
            dashboard.load().await?;
        }
        Ok(dashboard)
    }

    /// 写入成功后重读并返回最新视图；重读失败保留旧数据
    pub async fn apply_mutations(&self, metrics: &Metrics) -> DashboardView {
        let mut dashboard = self.dashboard.lock().await;
        if !dashboard.is_loaded() {
            if let Err(e) = dashboard.load().await {
                warn!("Initial dashboard load failed for user {}: {}", self.user.id, e);
                metrics.record_backend_failure("load");
            }
        }
        if let Err(e) = dashboard.process_events().await {
            warn!("Refetch after mutation failed for user {}: {}", self.user.id, e);
            metrics.record_backend_failure("refetch");
        }
        dashboard.view()
    }

    async fn touch(&self) {
        *self.last_seen.lock().await = Instant::now();
    }

    async fn idle_for(&self) -> Duration {
        self.last_seen.lock().await.elapsed()
    }
}

/// 应用共享状态
#[derive(Clone)]
pub struct AppState {
    sessions: Arc<dyn SessionProvider>,
    workspaces: Arc<RwLock<HashMap<String, Arc<Workspace>>>>,
    settings: Arc<WorkspaceSettings>,
    metrics: Metrics,
}

impl AppState {
    pub fn new(sessions: Arc<dyn SessionProvider>, settings: WorkspaceSettings, metrics: Metrics) -> Self {
        Self {
            sessions,
            workspaces: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(settings),
            metrics,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionProvider> {
        &self.sessions
    }

    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// 通知存活时间，超出可表示范围时按一年计
    pub fn toast_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.settings.toast_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365))
    }

    /// 按令牌取得工作区；不存在或已空闲过期时重新解析会话
    pub async fn workspace(&self, access_token: &str) -> Result<Arc<Workspace>> {
        let existing = self.workspaces.read().await.get(access_token).cloned();
        if let Some(workspace) = existing {
            if workspace.idle_for().await < self.settings.idle_timeout {
                workspace.touch().await;
                return Ok(workspace);
            }
            debug!("Workspace for user {} expired", workspace.user.id);
            self.close_workspace(access_token).await;
        }

        let session = self.sessions.resolve(access_token).await?;
        let user_id = session.user.id;
        let created = Arc::new(Workspace::new(session, &self.settings));

        let mut workspaces = self.workspaces.write().await;
        let workspace = workspaces
            .entry(access_token.to_string())
            .or_insert(created)
            .clone();
        self.metrics.set_active_sessions(workspaces.len());
        info!("Opened dashboard workspace for user {}", user_id);

        Ok(workspace)
    }

    pub async fn close_workspace(&self, access_token: &str) -> bool {
        let mut workspaces = self.workspaces.write().await;
        let removed = workspaces.remove(access_token).is_some();
        self.metrics.set_active_sessions(workspaces.len());
        removed
    }

    /// 回收空闲工作区，返回回收数量
    pub async fn evict_idle(&self) -> usize {
        let mut workspaces = self.workspaces.write().await;
        let mut stale = Vec::new();
        for (token, workspace) in workspaces.iter() {
            if workspace.idle_for().await >= self.settings.idle_timeout {
                stale.push(token.clone());
            }
        }
        for token in &stale {
            workspaces.remove(token);
        }
        self.metrics.set_active_sessions(workspaces.len());

        if !stale.is_empty() {
            info!("Evicted {} idle dashboard workspaces", stale.len());
        }
        stale.len()
    }

    pub async fn workspace_count(&self) -> usize {
        self.workspaces.read().await.len()
    }
}
