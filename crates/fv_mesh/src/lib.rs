// crates/fv_mesh/src/lib.rs

//! 有限体积网格离散
//!
//! 从 Delaunay 三角剖分构建边网格、Voronoi 对偶网格与集中质量矩阵。
//!
//! # 模块概览
//!
//! - [`topology`]: 边提取、边-三角形关联、节点-三角形 CSR 连接
//! - [`geometry`]: 有向面积、形心、外心
//! - [`hull`]: 合并重合点的二维凸包
//! - [`dual`]: 对偶边长与对偶单元面积
//! - [`mass`]: 集中质量矩阵
//! - [`mesh`]: 不可变网格聚合与统计
//! - [`error`]: 网格错误类型
//!
//! # 使用示例
//!
//! ```
//! use fv_config::MeshConfig;
//! use fv_mesh::Mesh;
//!
//! let mesh = Mesh::from_triangulation(
//!     &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
//!     &[[0, 1, 2], [0, 2, 3]],
//!     &MeshConfig::default(),
//! )
//! .unwrap();
//! assert_eq!(mesh.n_edges(), 5);
//! let total: f64 = mesh.site_areas().iter().sum();
//! assert!((total - 1.0).abs() < 1e-12);
//! ```

#![warn(clippy::all)]

pub mod dual;
pub mod error;
pub mod geometry;
pub mod hull;
pub mod mass;
pub mod mesh;
pub mod topology;

pub use dual::DualMesh;
pub use error::{MeshError, MeshResult};
pub use mesh::{EdgeMesh, Mesh, MeshStatistics};
pub use topology::{get_edges, CsrConnectivity, EdgeKey, EdgeSet, EdgeTriangleMap};
