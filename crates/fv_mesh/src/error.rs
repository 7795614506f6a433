// crates/fv_mesh/src/error.rs
//! 网格处理错误类型
//!
//! 包含拓扑、退化几何、输入形状等错误定义。
//! 所有错误可转换为 `fv_foundation::FvError` 向上传播。

use fv_config::ConfigError;
use fv_foundation::FvError;
use thiserror::Error;

/// 网格模块结果类型
pub type MeshResult<T> = Result<T, MeshError>;

/// 网格错误枚举
#[derive(Error, Debug)]
pub enum MeshError {
    /// 拓扑错误
    #[error("拓扑错误: {operation} 失败, {details}")]
    InvalidTopology {
        operation: &'static str,
        details: String,
    },

    /// 非流形边（出现次数不是 1 或 2）
    #[error("非流形边: ({a}, {b}) 被 {count} 个三角形共享")]
    NonManifoldEdge { a: u32, b: u32, count: usize },

    /// 三角形引用了不存在的节点
    #[error("索引越界: 三角形 {triangle} 引用节点 {site}, 节点数 {n_sites}")]
    IndexOutOfRange {
        triangle: usize,
        site: u32,
        n_sites: usize,
    },

    /// 节点未被任何三角形引用
    #[error("拓扑错误: 节点 {site} 未被任何三角形引用")]
    UnreferencedSite { site: usize },

    /// 退化三角形（面积为零或三点共线）
    #[error("退化三角形: 三角形 {triangle}, 外心分母 {denominator:.3e}")]
    DegenerateTriangle { triangle: usize, denominator: f64 },

    /// 非有限坐标
    #[error("非有限坐标: 节点 {site}")]
    NonFiniteCoordinate { site: usize },

    /// 元素数量不匹配
    #[error("元素不匹配: {name} 需要 {required} 个, 提供 {provided}")]
    ElementCountMismatch {
        name: &'static str,
        required: usize,
        provided: usize,
    },

    /// 配置错误
    #[error("网格配置错误: {0}")]
    Config(#[from] ConfigError),
}

impl MeshError {
    pub fn invalid_topology(operation: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidTopology {
            operation,
            details: details.into(),
        }
    }

    pub fn element_count_mismatch(name: &'static str, required: usize, provided: usize) -> Self {
        Self::ElementCountMismatch {
            name,
            required,
            provided,
        }
    }

    /// 是否属于拓扑类错误
    pub fn is_topology(&self) -> bool {
        matches!(
            self,
            Self::InvalidTopology { .. }
                | Self::NonManifoldEdge { .. }
                | Self::IndexOutOfRange { .. }
                | Self::UnreferencedSite { .. }
        )
    }

    /// 是否属于退化几何错误
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateTriangle { .. })
    }
}

/// 转换到 Foundation 层错误
impl From<MeshError> for FvError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::DegenerateTriangle { .. } => FvError::degenerate_geometry(err.to_string()),
            MeshError::ElementCountMismatch {
                name,
                required,
                provided,
            } => FvError::size_mismatch(name, required, provided),
            MeshError::NonFiniteCoordinate { .. } => FvError::invalid_input(err.to_string()),
            MeshError::Config(inner) => inner.into(),
            other => FvError::invalid_mesh(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(MeshError::NonManifoldEdge { a: 0, b: 1, count: 3 }.is_topology());
        assert!(MeshError::IndexOutOfRange {
            triangle: 0,
            site: 9,
            n_sites: 3
        }
        .is_topology());
        assert!(MeshError::DegenerateTriangle {
            triangle: 2,
            denominator: 0.0
        }
        .is_degenerate());
    }

    #[test]
    fn test_error_chain_to_foundation() {
        let err: FvError = MeshError::NonManifoldEdge { a: 0, b: 1, count: 3 }.into();
        assert!(matches!(err, FvError::InvalidMesh { .. }));
        assert!(err.to_string().contains("非流形边"));

        let err: FvError = MeshError::DegenerateTriangle {
            triangle: 1,
            denominator: 0.0,
        }
        .into();
        assert!(err.is_mesh_fatal());
    }
}
