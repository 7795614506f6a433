// crates/fv_config/src/error.rs

//! 配置层错误类型

use fv_foundation::FvError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 同时选择了多个屏蔽计算后端
    #[error("后端冲突: 不能同时启用 {first} 与 {second} 后端")]
    ConflictingBackends {
        /// 第一个后端
        first: &'static str,
        /// 第二个后端
        second: &'static str,
    },
}

impl ConfigError {
    /// 构造无效值错误
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// 转换到 Foundation 层错误
impl From<ConfigError> for FvError {
    fn from(err: ConfigError) -> Self {
        FvError::config(err.to_string())
    }
}
