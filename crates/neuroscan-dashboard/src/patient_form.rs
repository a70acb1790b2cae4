//! 患者档案表单
//!
//! 只校验患者编号必填；提交期间禁用自身，重复点击被忽略。成功后通知看板重读列表，
//! 失败时展示后端消息并保留已填写的内容。

use neuroscan_core::utils::validate_patient_fields;
use neuroscan_core::{PatientFields, SessionUser, SharedStore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::events::{MutationEvent, MutationSender};
use crate::notifications::Toaster;

pub const PATIENT_CREATED_MESSAGE: &str = "Patient profile created successfully!";
pub const PATIENT_CREATE_FALLBACK: &str = "Failed to create patient profile";

/// 一次提交的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SubmitOutcome<T> {
    /// 写入成功
    Created(T),
    /// 必填项缺失，没有发起写入
    Rejected(String),
    /// 后端拒绝或请求失败，消息已作为通知展示
    Failed(String),
    /// 上一次提交仍在进行中
    Busy,
    /// 没有登录用户，静默忽略
    NoSession,
}

/// 提交进行中标记，离开作用域时复位
pub(crate) struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 患者表单控制器
pub struct PatientForm {
    store: SharedStore,
    user: Option<SessionUser>,
    draft: RwLock<PatientFields>,
    submitting: AtomicBool,
    events: MutationSender,
    toaster: Toaster,
}

impl PatientForm {
    pub fn new(
        store: SharedStore,
        user: Option<SessionUser>,
        events: MutationSender,
        toaster: Toaster,
    ) -> Self {
        Self {
            store,
            user,
            draft: RwLock::new(PatientFields::default()),
            submitting: AtomicBool::new(false),
            events,
            toaster,
        }
    }

    pub async fn draft(&self) -> PatientFields {
        self.draft.read().await.clone()
    }

    pub async fn set_draft(&self, fields: PatientFields) {
        *self.draft.write().await = fields;
    }

    pub async fn update_draft<F>(&self, edit: F)
    where
        F: FnOnce(&mut PatientFields),
    {
        edit(&mut *self.draft.write().await);
    }

    /// 提交按钮是否禁用
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    pub fn submit_label(&self) -> &'static str {
        if self.is_submitting() {
            "Creating..."
        } else {
            "Create Patient Profile"
        }
    }

    /// 提交当前草稿，每次调用至多发起一次写入
    pub async fn submit(&self) -> SubmitOutcome<neuroscan_core::Patient> {
        let Some(user) = self.user.as_ref() else {
            return SubmitOutcome::NoSession;
        };

        let fields = self.draft().await;
        if let Err(e) = validate_patient_fields(&fields) {
            return SubmitOutcome::Rejected(e.user_message());
        }

        let Some(_in_flight) = InFlight::acquire(&self.submitting) else {
            return SubmitOutcome::Busy;
        };
        self.create(user, &fields).await
    }

    /// 以给定内容覆盖草稿并提交；先占用提交标记，进行中的提交读到的草稿不会被替换
    pub async fn submit_fields(
        &self,
        fields: PatientFields,
    ) -> SubmitOutcome<neuroscan_core::Patient> {
        let Some(user) = self.user.as_ref() else {
            return SubmitOutcome::NoSession;
        };

        let Some(_in_flight) = InFlight::acquire(&self.submitting) else {
            return SubmitOutcome::Busy;
        };

        self.set_draft(fields.clone()).await;
        if let Err(e) = validate_patient_fields(&fields) {
            return SubmitOutcome::Rejected(e.user_message());
        }
        self.create(user, &fields).await
    }

    /// 调用方必须持有提交标记
    async fn create(
        &self,
        user: &SessionUser,
        fields: &PatientFields,
    ) -> SubmitOutcome<neuroscan_core::Patient> {
        match self.store.create_patient(&user.id, fields).await {
            Ok(patient) => {
                info!("Patient {} created by user {}", patient.patient_id, user.id);
                self.toaster.success(PATIENT_CREATED_MESSAGE).await;
                self.events.send(MutationEvent::PatientCreated {
                    patient_id: patient.id,
                });
                SubmitOutcome::Created(patient)
            }
            Err(e) => {
                let message = e.user_message();
                let message = if message.trim().is_empty() {
                    PATIENT_CREATE_FALLBACK.to_string()
                } else {
                    message
                };
                warn!("Patient creation failed for user {}: {}", user.id, message);
                self.toaster.error(&message).await;
                SubmitOutcome::Failed(message)
            }
        }
    }
}
