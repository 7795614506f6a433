// crates/fv_config/src/mesh_config.rs

//! 网格构建配置

use fv_foundation::Tolerance;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 对偶单元面积计算方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AreaMethod {
    /// 凸包面积 + 边界凹角修正
    #[default]
    ConvexHull,
    /// 沿三角形扇有序排列外心后用鞋带公式求面积
    Ordered,
}

/// 网格构建配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// 三角形退化相对阈值
    #[serde(default = "default_degenerate_tolerance")]
    pub degenerate_tolerance: f64,

    /// 重合点相对阈值（凸包顶点计数时合并重合点）
    #[serde(default = "default_merge_tolerance")]
    pub merge_tolerance: f64,

    /// 对偶单元面积计算方法
    #[serde(default)]
    pub area_method: AreaMethod,

    /// 是否要求每个节点至少被一个三角形引用
    #[serde(default = "default_true")]
    pub require_all_sites_referenced: bool,
}

fn default_degenerate_tolerance() -> f64 { 1e-12 }
fn default_merge_tolerance() -> f64 { 1e-9 }
fn default_true() -> bool { true }

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            degenerate_tolerance: default_degenerate_tolerance(),
            merge_tolerance: default_merge_tolerance(),
            area_method: AreaMethod::default(),
            require_all_sites_referenced: default_true(),
        }
    }
}

impl MeshConfig {
    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("mesh.degenerate_tolerance", self.degenerate_tolerance),
            ("mesh.merge_tolerance", self.merge_tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::invalid_value(key, value, "必须在 (0, 1) 范围内"));
            }
        }
        Ok(())
    }

    /// 转换为数值容差
    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            degenerate: self.degenerate_tolerance,
            merge: self.merge_tolerance,
            ..Tolerance::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mesh_config() {
        let config = MeshConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.area_method, AreaMethod::ConvexHull);
        assert_eq!(config.tolerance().merge, 1e-9);
    }

    #[test]
    fn test_invalid_tolerance() {
        let config = MeshConfig {
            degenerate_tolerance: -1.0,
            ..MeshConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_area_method_serde() {
        let json = r#"{"area_method": "ordered"}"#;
        let config: MeshConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.area_method, AreaMethod::Ordered);
        assert!(config.require_all_sites_referenced);
    }
}
