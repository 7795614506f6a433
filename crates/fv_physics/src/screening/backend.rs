// crates/fv_physics/src/screening/backend.rs

//! 屏蔽计算后端抽象
//!
//! 所有后端计算同一个核:
//!
//! ```text
//! A[i] = Σ_j w[j] / |c_i − p_j|,   w[j] = J[j] · area[j]
//! ```

use fv_config::BackendKind;
use glam::DVec2;

use super::ScreeningInputs;
use crate::error::{PhysicsError, PhysicsResult};

/// 屏蔽计算后端
///
/// 实现必须是无状态的纯计算：相同输入给出相同结果，
/// 失败时不返回部分结果。
pub trait ScreeningBackend: Send + Sync {
    /// 后端类型
    fn kind(&self) -> BackendKind;

    /// 后端名称
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// 计算边中点处的感应矢势（长度 M）
    ///
    /// 输入维度由调用方预先校验；边中点与节点重合时返回
    /// [`PhysicsError::CoincidentPoints`]。
    fn induced_potential(&self, inputs: &ScreeningInputs<'_>) -> PhysicsResult<Vec<DVec2>>;
}

/// 源权重 `J[j] · area[j]`
pub(crate) fn source_weights(inputs: &ScreeningInputs<'_>) -> Vec<DVec2> {
    inputs
        .current
        .iter()
        .zip(inputs.site_areas)
        .map(|(&j, &a)| j * a)
        .collect()
}

/// 所有节点与边中点的包围盒
pub(crate) fn bounding_box(inputs: &ScreeningInputs<'_>) -> Option<(DVec2, DVec2)> {
    inputs
        .site_positions
        .iter()
        .chain(inputs.edge_centers)
        .fold(None, |acc, &p| match acc {
            None => Some((p, p)),
            Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
        })
}

/// 重合判定半径：`tolerance × 包围盒尺度`
pub(crate) fn coincidence_radius(inputs: &ScreeningInputs<'_>, tolerance: f64) -> f64 {
    bounding_box(inputs).map_or(0.0, |(lo, hi)| tolerance * (hi - lo).max_element())
}

/// 双精度检查边中点与节点是否重合
///
/// 返回第一条（按边索引）与某节点距离不超过 `radius` 的边。
pub(crate) fn check_coincidence(inputs: &ScreeningInputs<'_>, radius: f64) -> PhysicsResult<()> {
    for (i, center) in inputs.edge_centers.iter().enumerate() {
        for (j, p) in inputs.site_positions.iter().enumerate() {
            let d = center.distance(*p);
            if d <= radius {
                return Err(coincident(i, j, d));
            }
        }
    }
    Ok(())
}

/// 重合错误
#[inline]
pub(crate) fn coincident(edge: usize, site: usize, distance: f64) -> PhysicsError {
    PhysicsError::CoincidentPoints {
        edge,
        site,
        distance,
    }
}
