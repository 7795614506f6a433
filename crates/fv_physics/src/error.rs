// crates/fv_physics/src/error.rs

//! 物理层错误类型
//!
//! 层级: `MeshError` / `ConfigError` / `GpuError` → `PhysicsError` → `FvError`

use fv_config::{BackendKind, ConfigError};
use fv_foundation::FvError;
use fv_mesh::MeshError;
use thiserror::Error;

/// 物理层结果类型
pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// GPU 错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpuError {
    /// 设备创建失败
    #[error("GPU 设备创建失败: {0}")]
    DeviceCreation(String),

    /// 超出设备限制
    #[error("超出 GPU 限制 {limit}: 需要 {required}, 设备支持 {available}")]
    LimitExceeded {
        limit: &'static str,
        required: u64,
        available: u64,
    },

    /// 着色器或管线创建失败
    #[error("GPU 管线创建失败: {0}")]
    PipelineCreation(String),

    /// 缓冲区映射或读回失败
    #[error("GPU 缓冲区操作失败: {0}")]
    BufferOperation(String),
}

/// 物理层错误
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// 输入数组维度不匹配
    #[error("维度不匹配: {name} 期望 {expected}, 实际 {actual}")]
    DimensionMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// 边中点与节点重合（核函数奇异）
    #[error("边中点 {edge} 与节点 {site} 重合, 距离 {distance:.3e}")]
    CoincidentPoints {
        edge: usize,
        site: usize,
        distance: f64,
    },

    /// 非有限或越界数值
    #[error("无效数值: {name}[{index}]")]
    InvalidValue { name: &'static str, index: usize },

    /// 索引越界
    #[error("索引越界: {name} 索引 {index}, 长度 {len}")]
    IndexOutOfRange {
        name: &'static str,
        index: usize,
        len: usize,
    },

    /// 节点处方向向量线性相关，无法重构
    #[error("节点 {site} 关联边方向秩不足, 无法最小二乘重构")]
    RankDeficient { site: usize },

    /// 后端未编译或设备不可用
    #[error("后端 {backend} 不可用: {reason}")]
    BackendUnavailable {
        backend: BackendKind,
        reason: String,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// GPU 错误
    #[error("GPU 错误: {0}")]
    Gpu(#[from] GpuError),

    /// 网格错误
    #[error("网格错误: {0}")]
    Mesh(#[from] MeshError),

    /// 基础层错误
    #[error(transparent)]
    Foundation(#[from] FvError),
}

impl PhysicsError {
    pub fn dimension_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            name,
            expected,
            actual,
        }
    }

    pub fn backend_unavailable(backend: BackendKind, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }
}

impl From<PhysicsError> for FvError {
    fn from(err: PhysicsError) -> Self {
        match err {
            PhysicsError::DimensionMismatch {
                name,
                expected,
                actual,
            } => FvError::size_mismatch(name, expected, actual),
            PhysicsError::IndexOutOfRange { name, index, len } => {
                FvError::index_out_of_bounds(name, index, len)
            }
            PhysicsError::CoincidentPoints { .. } | PhysicsError::InvalidValue { .. } => {
                FvError::invalid_input(err.to_string())
            }
            PhysicsError::RankDeficient { .. } => FvError::numerical(err.to_string()),
            PhysicsError::BackendUnavailable { .. } | PhysicsError::Gpu(_) => {
                FvError::backend(err.to_string())
            }
            PhysicsError::Config(inner) => inner.into(),
            PhysicsError::Mesh(inner) => inner.into(),
            PhysicsError::Foundation(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_backends_wrapped() {
        let err: PhysicsError = ConfigError::ConflictingBackends {
            first: "parallel",
            second: "gpu",
        }
        .into();
        assert!(matches!(err, PhysicsError::Config(ConfigError::ConflictingBackends { .. })));
        let fv: FvError = err.into();
        assert!(matches!(fv, FvError::Config { .. }));
    }

    #[test]
    fn test_gpu_error_to_foundation() {
        let err: PhysicsError = GpuError::DeviceCreation("lost".into()).into();
        let fv: FvError = err.into();
        assert!(matches!(fv, FvError::Backend { .. }));
    }

    #[test]
    fn test_message_contains_indices() {
        let err = PhysicsError::CoincidentPoints {
            edge: 3,
            site: 7,
            distance: 0.0,
        };
        let text = err.to_string();
        assert!(text.contains('3') && text.contains('7'));
    }
}
