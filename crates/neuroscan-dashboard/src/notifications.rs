//! 临时通知（toast）

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 通知样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationVariant {
    Default,
    Destructive,
}

/// 单条通知
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
    pub created_at: DateTime<Utc>,
}

/// 通知队列，超出上限时丢弃最旧的
#[derive(Debug, Clone)]
pub struct Toaster {
    queue: Arc<RwLock<VecDeque<Notification>>>,
    limit: usize,
}

impl Toaster {
    pub fn new(limit: usize) -> Self {
        Self {
            queue: Arc::new(RwLock::new(VecDeque::new())),
            limit: limit.max(1),
        }
    }

    pub async fn notify(&self, title: &str, description: &str, variant: NotificationVariant) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            variant,
            created_at: Utc::now(),
        };
        let id = notification.id;

        let mut queue = self.queue.write().await;
        queue.push_back(notification);
        while queue.len() > self.limit {
            queue.pop_front();
        }
        id
    }

    pub async fn success(&self, description: &str) -> Uuid {
        self.notify("Success", description, NotificationVariant::Default).await
    }

    pub async fn error(&self, description: &str) -> Uuid {
        self.notify("Error", description, NotificationVariant::Destructive).await
    }

    /// 用户关闭通知
    pub async fn dismiss(&self, id: &Uuid) -> bool {
        let mut queue = self.queue.write().await;
        let before = queue.len();
        queue.retain(|n| &n.id != id);
        queue.len() != before
    }

    /// 移除超过存活时间的通知
    pub async fn dismiss_expired(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let mut queue = self.queue.write().await;
        let before = queue.len();
        queue.retain(|n| n.created_at > cutoff);
        before - queue.len()
    }

    pub async fn list(&self) -> Vec<Notification> {
        self.queue.read().await.iter().cloned().collect()
    }
}

impl Default for Toaster {
    fn default() -> Self {
        Self::new(5)
    }
}
