// crates/fv_config/src/screening_config.rs

//! 屏蔽计算配置
//!
//! 后端在配置阶段显式选择，不在调用点做运行时回退。
//! 默认（两个开关均关闭）使用矩阵向量化后端。

use fv_foundation::Tolerance;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 屏蔽计算后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 分块矩阵向量化计算
    #[default]
    Vectorized,
    /// 多核并行循环归约
    Parallel,
    /// GPU 计算着色器
    Gpu,
}

impl BackendKind {
    /// 后端名称
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Vectorized => "vectorized",
            BackendKind::Parallel => "parallel",
            BackendKind::Gpu => "gpu",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 屏蔽计算配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// 使用多核并行后端
    #[serde(default)]
    pub use_parallel: bool,

    /// 使用 GPU 后端
    #[serde(default)]
    pub use_gpu: bool,

    /// 向量化后端每块的边数（限制核矩阵内存为 block_rows × N）
    #[serde(default = "default_block_rows")]
    pub block_rows: usize,

    /// GPU 工作组大小
    #[serde(default = "default_workgroup_size")]
    pub workgroup_size: u32,

    /// 边中点与节点重合的相对阈值
    #[serde(default = "default_coincidence_tolerance")]
    pub coincidence_tolerance: f64,

    /// 交叉校验使用的参考后端
    #[serde(default)]
    pub cross_check: Option<BackendKind>,

    /// 后端结果一致性的相对容差
    #[serde(default = "default_divergence_tolerance")]
    pub divergence_tolerance: f64,
}

fn default_block_rows() -> usize { 2048 }
fn default_workgroup_size() -> u32 { 256 }
fn default_coincidence_tolerance() -> f64 { 1e-12 }
fn default_divergence_tolerance() -> f64 { 1e-6 }

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            use_parallel: false,
            use_gpu: false,
            block_rows: default_block_rows(),
            workgroup_size: default_workgroup_size(),
            coincidence_tolerance: default_coincidence_tolerance(),
            cross_check: None,
            divergence_tolerance: default_divergence_tolerance(),
        }
    }
}

impl ScreeningConfig {
    /// 选择指定后端的配置
    pub fn with_backend(kind: BackendKind) -> Self {
        Self {
            use_parallel: kind == BackendKind::Parallel,
            use_gpu: kind == BackendKind::Gpu,
            ..Self::default()
        }
    }

    /// 解析所选后端
    ///
    /// 同时启用多个后端时返回 `ConflictingBackends`。
    pub fn backend(&self) -> Result<BackendKind, ConfigError> {
        match (self.use_parallel, self.use_gpu) {
            (true, true) => Err(ConfigError::ConflictingBackends {
                first: BackendKind::Parallel.name(),
                second: BackendKind::Gpu.name(),
            }),
            (true, false) => Ok(BackendKind::Parallel),
            (false, true) => Ok(BackendKind::Gpu),
            (false, false) => Ok(BackendKind::Vectorized),
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let primary = self.backend()?;

        if self.block_rows == 0 {
            return Err(ConfigError::invalid_value(
                "screening.block_rows",
                self.block_rows,
                "必须为正",
            ));
        }

        if self.workgroup_size == 0 || self.workgroup_size > 256 {
            return Err(ConfigError::invalid_value(
                "screening.workgroup_size",
                self.workgroup_size,
                "必须在 [1, 256] 范围内",
            ));
        }

        for (key, value) in [
            ("screening.coincidence_tolerance", self.coincidence_tolerance),
            ("screening.divergence_tolerance", self.divergence_tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::invalid_value(key, value, "必须为正的有限值"));
            }
        }

        if self.cross_check == Some(primary) {
            return Err(ConfigError::invalid_value(
                "screening.cross_check",
                primary,
                "参考后端不能与主后端相同",
            ));
        }

        Ok(())
    }

    /// 转换为数值容差
    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            coincidence: self.coincidence_tolerance,
            backend_rel: self.divergence_tolerance,
            ..Tolerance::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_vectorized() {
        let config = ScreeningConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend().unwrap(), BackendKind::Vectorized);
    }

    #[test]
    fn test_conflicting_backends_rejected() {
        let config = ScreeningConfig {
            use_parallel: true,
            use_gpu: true,
            ..ScreeningConfig::default()
        };
        assert!(matches!(
            config.backend(),
            Err(ConfigError::ConflictingBackends { .. })
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_backend() {
        for kind in [BackendKind::Vectorized, BackendKind::Parallel, BackendKind::Gpu] {
            assert_eq!(ScreeningConfig::with_backend(kind).backend().unwrap(), kind);
        }
    }

    #[test]
    fn test_cross_check_must_differ() {
        let config = ScreeningConfig {
            use_parallel: true,
            cross_check: Some(BackendKind::Parallel),
            ..ScreeningConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ScreeningConfig {
            use_parallel: true,
            cross_check: Some(BackendKind::Vectorized),
            ..ScreeningConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_workgroup_limits() {
        let config = ScreeningConfig {
            workgroup_size: 1024,
            ..ScreeningConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
