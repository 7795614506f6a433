// crates/fv_foundation/src/tolerance.rs

//! 数值容差配置
//!
//! 不使用全局静态变量，容差通过参数注入。

use serde::{Deserialize, Serialize};

/// 数值容差
///
/// 所有阈值均为相对值，使用时乘以对应的几何尺度。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// 三角形退化阈值：|2·叉积| < degenerate · 边长平方尺度 视为退化
    pub degenerate: f64,
    /// 点合并阈值：两点距离 < merge · 点集尺度 视为重合
    pub merge: f64,
    /// 源点与场点重合阈值（屏蔽核奇异性检测）
    pub coincidence: f64,
    /// 面积守恒相对容差
    pub area_rel: f64,
    /// 后端一致性相对容差
    pub backend_rel: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            degenerate: 1e-12,
            merge: 1e-9,
            coincidence: 1e-12,
            area_rel: 1e-6,
            backend_rel: 1e-6,
        }
    }
}

impl Tolerance {
    /// 单精度 GPU 比较使用的宽松配置
    pub fn single_precision() -> Self {
        Self {
            backend_rel: 1e-4,
            ..Self::default()
        }
    }
}
