//! # NeuroScan数据库模块
//!
//! 数据访问层的两种实现：
//! - `PgStore`：基于PostgreSQL连接池，适用于自托管的等价后端
//! - `MemoryStore`：进程内存储，用于测试、演示和开发环境

pub mod connection;
pub mod memory;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::{DatabasePool, PoolSettings};
pub use memory::MemoryStore;
pub use queries::PgStore;
