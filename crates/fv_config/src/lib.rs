// crates/fv_config/src/lib.rs

//! 配置层
//!
//! 提供网格构建与屏蔽计算的配置结构，支持 JSON 加载与校验。
//!
//! # 模块概览
//!
//! - [`mesh_config`]: 网格构建容差与面积方法
//! - [`screening_config`]: 屏蔽计算后端选择与容差
//! - [`error`]: 配置错误类型

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod mesh_config;
pub mod screening_config;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use error::ConfigError;
pub use mesh_config::{AreaMethod, MeshConfig};
pub use screening_config::{BackendKind, ScreeningConfig};

/// 顶层配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FvConfig {
    /// 网格配置
    #[serde(default)]
    pub mesh: MeshConfig,

    /// 屏蔽计算配置
    #[serde(default)]
    pub screening: ScreeningConfig,
}

impl FvConfig {
    /// 从 JSON 字符串加载并校验
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: FvConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mesh.validate()?;
        self.screening.validate()
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
