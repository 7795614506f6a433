// crates/fv_foundation/src/lib.rs

//! 有限体积屏蔽计算 Foundation Layer
//!
//! 基础层，提供整个项目的公共抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型
//! - [`tolerance`]: 数值容差（参数注入，无全局状态）
//! - [`kahan`]: Kahan 补偿求和
//! - [`sparse`]: 泛型 CSR 稀疏矩阵
//!
//! # 设计原则
//!
//! 1. **最少依赖**: 仅依赖 serde、thiserror 和 num-traits
//! 2. **无隐藏状态**: 所有阈值通过参数传入

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod kahan;
pub mod sparse;
pub mod tolerance;

// 重导出常用类型
pub use error::{FvError, FvResult};
pub use kahan::KahanSum;
pub use sparse::{CsrMatrix, SparseScalar};
pub use tolerance::Tolerance;
