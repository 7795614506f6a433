// crates/fv_physics/src/lib.rs

//! 超导电流与薄膜屏蔽计算
//!
//! 在 [`fv_mesh::Mesh`] 之上提供外层求解器反复调用的计算内核。
//!
//! # 模块概览
//!
//! - [`current`]: 协变梯度算子与边上超导电流
//! - [`interpolation`]: 边标量 → 节点矢量的最小二乘重构
//! - [`screening`]: 感应矢势引擎及向量化/并行/GPU 后端
//! - [`memo`]: 可注入的场求值缓存
//! - [`error`]: 物理层错误类型
//!
//! # Cargo 特性
//!
//! - `parallel`（默认）: rayon 并行后端
//! - `gpu`（默认）: wgpu 计算着色器后端
//!
//! # 使用示例
//!
//! ```
//! use fv_config::{MeshConfig, ScreeningConfig};
//! use fv_mesh::Mesh;
//! use fv_physics::screening::{ScreeningEngine, ScreeningInputs};
//! use glam::DVec2;
//!
//! let mesh = Mesh::from_triangulation(
//!     &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
//!     &[[0, 1, 2], [0, 2, 3]],
//!     &MeshConfig::default(),
//! )
//! .unwrap();
//! let current = vec![DVec2::X; mesh.n_sites()];
//! let engine = ScreeningEngine::new(ScreeningConfig::default()).unwrap();
//! let a = engine
//!     .induced_potential(&ScreeningInputs::from_mesh(&mesh, &current))
//!     .unwrap();
//! assert_eq!(a.len(), mesh.n_edges());
//! ```

#![warn(clippy::all)]

pub mod current;
pub mod error;
pub mod interpolation;
pub mod memo;
pub mod screening;

pub use current::{covariant_gradient, supercurrent};
pub use error::{GpuError, PhysicsError, PhysicsResult};
pub use interpolation::edge_to_site;
pub use screening::{
    compare_backends, NumericalDivergence, ScreeningBackend, ScreeningEngine, ScreeningInputs,
    ScreeningOutcome,
};
