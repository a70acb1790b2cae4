//! # NeuroScan集成模块
//!
//! 托管后端（关系存储 + 认证）的客户端：
//! - 表查询构建器，支持过滤、排序和嵌入式关联
//! - 基于REST接口的数据访问层实现 `RestStore`
//! - 认证客户端与会话提供者 `RestSessionProvider`

pub mod auth;
pub mod client;
pub mod rest_store;

pub use auth::{AuthClient, AuthUser, RestSessionProvider, SignInResponse};
pub use client::{BackendClient, BackendConfig, TableQuery};
pub use rest_store::RestStore;
