//! # NeuroScan Core
//!
//! 脑部MRI临床看板的核心模块，提供实体模型、错误定义、数据访问接口和通用工具。

pub mod error;
pub mod models;
pub mod session;
pub mod store;
pub mod utils;

pub use error::{NeuroscanError, Result};
pub use models::*;
pub use session::{AuthenticatedSession, SessionProvider};
pub use store::{ClinicalStore, SharedStore};
