//! 变更事件总线
//!
//! 子组件写入成功后发送事件，看板据此重新读取对应列表，而不是在本地拼接新行。

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// 写入成功事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationEvent {
    /// 新建患者后重读患者列表
    PatientCreated { patient_id: Uuid },
    /// 上传扫描后重读扫描列表
    ScanUploaded { patient_id: Uuid, scan_id: Uuid },
}

/// 事件发送端
#[derive(Debug, Clone)]
pub struct MutationSender {
    inner: mpsc::UnboundedSender<MutationEvent>,
}

impl MutationSender {
    pub fn send(&self, event: MutationEvent) {
        if let Err(e) = self.inner.send(event) {
            warn!("Mutation event dropped, dashboard is gone: {:?}", e.0);
        }
    }
}

/// 事件接收端
pub type MutationReceiver = mpsc::UnboundedReceiver<MutationEvent>;

/// 创建事件通道
pub fn mutation_channel() -> (MutationSender, MutationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MutationSender { inner: tx }, rx)
}
