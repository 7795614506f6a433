// crates/fv_physics/src/screening/mod.rs

//! 薄膜屏蔽计算
//!
//! 由节点电流密度计算边中点处的感应矢势:
//!
//! ```text
//! A[i, k] = Σ_j J[j, k] · area[j] / |edge_center[i] − site_pos[j]|
//! ```
//!
//! 全对 O(N·M) 的稠密核，三种可互换后端:
//!
//! | 后端 | 特性 | 精度 |
//! |------|------|------|
//! | [`VectorizedBackend`] | 默认 | f64 |
//! | `ParallelBackend` | `parallel` | f64 |
//! | `GpuScreeningBackend` | `gpu` | f32 |
//!
//! 后端在配置阶段选择。同时启用多个后端在计算前即被拒绝。
//! 引擎本身无状态：不因调用而改变，可跨线程共享。

pub mod backend;
#[cfg(feature = "gpu")]
pub mod gpu;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod vectorized;

#[cfg(feature = "gpu")]
use std::sync::Arc;

use fv_config::{BackendKind, ScreeningConfig};
use fv_foundation::Tolerance;
use fv_mesh::Mesh;
use glam::DVec2;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub use backend::ScreeningBackend;
#[cfg(feature = "gpu")]
pub use gpu::{GpuContext, GpuScreeningBackend};
#[cfg(feature = "parallel")]
pub use parallel::ParallelBackend;
pub use vectorized::VectorizedBackend;

use crate::error::{PhysicsError, PhysicsResult};

// ============================================================================
// 输入
// ============================================================================

/// 一次屏蔽计算的输入（借用，调用间不保留）
#[derive(Debug, Clone, Copy)]
pub struct ScreeningInputs<'a> {
    /// 节点电流密度 J（长度 N）
    pub current: &'a [DVec2],
    /// 节点对偶面积（长度 N）
    pub site_areas: &'a [f64],
    /// 节点坐标（长度 N）
    pub site_positions: &'a [DVec2],
    /// 边中点（长度 M）
    pub edge_centers: &'a [DVec2],
}

impl<'a> ScreeningInputs<'a> {
    pub fn new(
        current: &'a [DVec2],
        site_areas: &'a [f64],
        site_positions: &'a [DVec2],
        edge_centers: &'a [DVec2],
    ) -> Self {
        Self {
            current,
            site_areas,
            site_positions,
            edge_centers,
        }
    }

    /// 以网格的节点、对偶面积与边中点构造
    pub fn from_mesh(mesh: &'a Mesh, current: &'a [DVec2]) -> Self {
        Self::new(
            current,
            mesh.site_areas(),
            mesh.sites(),
            &mesh.edge_mesh().centers,
        )
    }

    #[inline]
    pub fn n_sites(&self) -> usize {
        self.site_positions.len()
    }

    #[inline]
    pub fn n_edges(&self) -> usize {
        self.edge_centers.len()
    }

    /// 校验维度与数值有限性
    pub fn validate(&self) -> PhysicsResult<()> {
        let n = self.n_sites();
        if self.current.len() != n {
            return Err(PhysicsError::dimension_mismatch("current", n, self.current.len()));
        }
        if self.site_areas.len() != n {
            return Err(PhysicsError::dimension_mismatch("site_areas", n, self.site_areas.len()));
        }

        first_invalid("current", self.current.iter().map(|v| v.is_finite()))?;
        first_invalid("site_areas", self.site_areas.iter().map(|a| a.is_finite()))?;
        first_invalid("site_positions", self.site_positions.iter().map(|p| p.is_finite()))?;
        first_invalid("edge_centers", self.edge_centers.iter().map(|c| c.is_finite()))?;
        Ok(())
    }
}

fn first_invalid<I: IntoIterator<Item = bool>>(name: &'static str, valid: I) -> PhysicsResult<()> {
    match valid.into_iter().position(|ok| !ok) {
        Some(index) => Err(PhysicsError::InvalidValue { name, index }),
        None => Ok(()),
    }
}

// ============================================================================
// 交叉校验
// ============================================================================

/// 两个后端结果偏差超出容差（警告，非错误）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericalDivergence {
    /// 参考后端
    pub reference: BackendKind,
    /// 被比较后端
    pub candidate: BackendKind,
    /// 最大相对偏差（相对于参考结果的最大分量模）
    pub max_relative_error: f64,
    /// 偏差最大的边
    pub edge: usize,
    /// 使用的容差
    pub tolerance: f64,
}

impl std::fmt::Display for NumericalDivergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "后端 {} 与 {} 结果偏差 {:.3e} (边 {}) 超出容差 {:.1e}",
            self.candidate, self.reference, self.max_relative_error, self.edge, self.tolerance
        )
    }
}

/// 带交叉校验的计算结果
#[derive(Debug, Clone)]
pub struct ScreeningOutcome {
    /// 主后端计算的感应矢势
    pub potential: Vec<DVec2>,
    /// 主后端
    pub backend: BackendKind,
    /// 与参考后端的偏差（在容差内时为 None）
    pub divergence: Option<NumericalDivergence>,
}

/// 比较两个后端的结果
///
/// 偏差以参考结果的最大分量模归一化，避免接近零的分量放大相对误差。
pub fn compare_backends(
    reference_kind: BackendKind,
    reference: &[DVec2],
    candidate_kind: BackendKind,
    candidate: &[DVec2],
    tolerance: f64,
) -> PhysicsResult<Option<NumericalDivergence>> {
    if reference.len() != candidate.len() {
        return Err(PhysicsError::dimension_mismatch(
            "candidate",
            reference.len(),
            candidate.len(),
        ));
    }

    let scale = reference
        .iter()
        .map(|v| v.abs().max_element())
        .fold(0.0_f64, f64::max);

    let (edge, max_err) = reference
        .iter()
        .zip(candidate)
        .map(|(r, c)| {
            let diff = (*r - *c).abs().max_element();
            if scale > 0.0 {
                diff / scale
            } else {
                diff
            }
        })
        .enumerate()
        .fold((0, 0.0_f64), |best, (i, e)| if e > best.1 { (i, e) } else { best });

    if max_err > tolerance {
        Ok(Some(NumericalDivergence {
            reference: reference_kind,
            candidate: candidate_kind,
            max_relative_error: max_err,
            edge,
            tolerance,
        }))
    } else {
        Ok(None)
    }
}

// ============================================================================
// 引擎
// ============================================================================

/// 构造 CPU 后端
fn cpu_backend(kind: BackendKind, config: &ScreeningConfig) -> PhysicsResult<Box<dyn ScreeningBackend>> {
    match kind {
        BackendKind::Vectorized => Ok(Box::new(VectorizedBackend::new(config))),
        #[cfg(feature = "parallel")]
        BackendKind::Parallel => Ok(Box::new(ParallelBackend::new(config))),
        #[cfg(not(feature = "parallel"))]
        BackendKind::Parallel => Err(PhysicsError::backend_unavailable(kind, "未启用 parallel 特性")),
        BackendKind::Gpu => Err(PhysicsError::backend_unavailable(kind, "GPU 后端需要设备上下文")),
    }
}

/// 按类型构造后端
///
/// GPU 后端会新建一个设备上下文；需要共享上下文时使用
/// [`ScreeningEngine::with_gpu_context`]。
pub fn make_backend(
    kind: BackendKind,
    config: &ScreeningConfig,
) -> PhysicsResult<Box<dyn ScreeningBackend>> {
    match kind {
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => {
            let context = GpuContext::new()?
                .ok_or_else(|| PhysicsError::backend_unavailable(kind, "未找到 GPU 适配器"))?;
            Ok(Box::new(GpuScreeningBackend::new(Arc::new(context), config)?))
        }
        #[cfg(not(feature = "gpu"))]
        BackendKind::Gpu => Err(PhysicsError::backend_unavailable(kind, "未启用 gpu 特性")),
        _ => cpu_backend(kind, config),
    }
}

/// 屏蔽计算引擎
pub struct ScreeningEngine {
    config: ScreeningConfig,
    primary: Box<dyn ScreeningBackend>,
    reference: Option<Box<dyn ScreeningBackend>>,
}

impl std::fmt::Debug for ScreeningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreeningEngine")
            .field("primary", &self.primary.name())
            .field("reference", &self.reference.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl ScreeningEngine {
    /// 按配置创建引擎
    ///
    /// 配置在此处完整校验，冲突的后端选择不会进入计算阶段。
    pub fn new(config: ScreeningConfig) -> PhysicsResult<Self> {
        Self::assemble(config, make_backend)
    }

    /// 使用已有 GPU 上下文创建引擎
    #[cfg(feature = "gpu")]
    pub fn with_gpu_context(config: ScreeningConfig, context: Arc<GpuContext>) -> PhysicsResult<Self> {
        Self::assemble(config, |kind, cfg| match kind {
            BackendKind::Gpu => Ok(Box::new(GpuScreeningBackend::new(Arc::clone(&context), cfg)?)
                as Box<dyn ScreeningBackend>),
            _ => cpu_backend(kind, cfg),
        })
    }

    /// 使用自定义后端创建引擎
    pub fn with_backend(config: ScreeningConfig, backend: Box<dyn ScreeningBackend>) -> PhysicsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            primary: backend,
            reference: None,
        })
    }

    fn assemble<F>(config: ScreeningConfig, make: F) -> PhysicsResult<Self>
    where
        F: Fn(BackendKind, &ScreeningConfig) -> PhysicsResult<Box<dyn ScreeningBackend>>,
    {
        config.validate()?;
        let kind = config.backend()?;
        let primary = make(kind, &config)?;
        let reference = config
            .cross_check
            .map(|ref_kind| make(ref_kind, &config))
            .transpose()?;

        debug!(
            "屏蔽引擎后端: {}{}",
            primary.name(),
            reference
                .as_ref()
                .map(|r| format!(", 参考后端 {}", r.name()))
                .unwrap_or_default()
        );

        Ok(Self {
            config,
            primary,
            reference,
        })
    }

    /// 主后端类型
    pub fn backend_kind(&self) -> BackendKind {
        self.primary.kind()
    }

    /// 配置
    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    /// 计算感应矢势
    pub fn induced_potential(&self, inputs: &ScreeningInputs<'_>) -> PhysicsResult<Vec<DVec2>> {
        inputs.validate()?;
        self.primary.induced_potential(inputs)
    }

    /// 计算感应矢势，并与参考后端交叉校验
    ///
    /// 未配置参考后端时等同于 [`Self::induced_potential`]。
    pub fn induced_potential_checked(
        &self,
        inputs: &ScreeningInputs<'_>,
    ) -> PhysicsResult<ScreeningOutcome> {
        let potential = self.induced_potential(inputs)?;
        let backend = self.primary.kind();

        let divergence = match &self.reference {
            Some(reference) => {
                let expected = reference.induced_potential(inputs)?;
                let tolerance = self.divergence_tolerance(reference.kind());
                compare_backends(reference.kind(), &expected, backend, &potential, tolerance)?
            }
            None => None,
        };

        if let Some(d) = &divergence {
            warn!("{}", d);
        }

        Ok(ScreeningOutcome {
            potential,
            backend,
            divergence,
        })
    }

    /// 交叉校验容差，涉及单精度 GPU 后端时放宽
    fn divergence_tolerance(&self, reference: BackendKind) -> f64 {
        let tol = self.config.divergence_tolerance;
        if reference == BackendKind::Gpu || self.primary.kind() == BackendKind::Gpu {
            tol.max(Tolerance::single_precision().backend_rel)
        } else {
            tol
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_config::ConfigError;

    struct ScaledBackend(f64);

    impl ScreeningBackend for ScaledBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Parallel
        }

        fn induced_potential(&self, inputs: &ScreeningInputs<'_>) -> PhysicsResult<Vec<DVec2>> {
            let exact = VectorizedBackend::new(&ScreeningConfig::default()).induced_potential(inputs)?;
            Ok(exact.into_iter().map(|v| v * self.0).collect())
        }
    }

    fn sample() -> (Vec<DVec2>, Vec<f64>, Vec<DVec2>, Vec<DVec2>) {
        (
            vec![DVec2::new(1.0, 0.5), DVec2::new(-0.5, 2.0)],
            vec![0.25, 0.75],
            vec![DVec2::ZERO, DVec2::new(1.0, 0.0)],
            vec![DVec2::new(0.5, 1.0), DVec2::new(2.0, 2.0), DVec2::new(-1.0, 0.5)],
        )
    }

    #[test]
    fn test_conflicting_backends_rejected() {
        let config = ScreeningConfig {
            use_parallel: true,
            use_gpu: true,
            ..ScreeningConfig::default()
        };
        let err = ScreeningEngine::new(config).unwrap_err();
        assert!(matches!(
            err,
            PhysicsError::Config(ConfigError::ConflictingBackends { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let engine = ScreeningEngine::new(ScreeningConfig::default()).unwrap();
        let (current, areas, positions, centers) = sample();
        let inputs = ScreeningInputs::new(&current[..1], &areas, &positions, &centers);
        assert!(matches!(
            engine.induced_potential(&inputs),
            Err(PhysicsError::DimensionMismatch { name: "current", .. })
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        let engine = ScreeningEngine::new(ScreeningConfig::default()).unwrap();
        let (current, areas, positions, mut centers) = sample();
        centers[2].x = f64::INFINITY;
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);
        assert!(matches!(
            engine.induced_potential(&inputs),
            Err(PhysicsError::InvalidValue { name: "edge_centers", index: 2 })
        ));
    }

    #[test]
    fn test_compare_backends() {
        let a = vec![DVec2::new(1.0, 0.0), DVec2::new(0.0, 2.0)];
        let b = vec![DVec2::new(1.0, 0.0), DVec2::new(0.0, 2.0 + 1e-3)];
        let div = compare_backends(BackendKind::Vectorized, &a, BackendKind::Gpu, &b, 1e-4)
            .unwrap()
            .unwrap();
        assert_eq!(div.edge, 1);
        assert!((div.max_relative_error - 5e-4).abs() < 1e-12);
        assert!(compare_backends(BackendKind::Vectorized, &a, BackendKind::Gpu, &b, 1e-3)
            .unwrap()
            .is_none());
        assert!(compare_backends(BackendKind::Vectorized, &a, BackendKind::Gpu, &b[..1], 1e-3).is_err());
    }

    #[test]
    fn test_checked_reports_divergence() {
        let config = ScreeningConfig {
            cross_check: Some(BackendKind::Vectorized),
            use_parallel: true,
            ..ScreeningConfig::default()
        };
        let engine = ScreeningEngine::assemble(config, |kind, cfg| match kind {
            BackendKind::Parallel => Ok(Box::new(ScaledBackend(1.01)) as Box<dyn ScreeningBackend>),
            _ => cpu_backend(kind, cfg),
        })
        .unwrap();

        let (current, areas, positions, centers) = sample();
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);
        let outcome = engine.induced_potential_checked(&inputs).unwrap();
        let div = outcome.divergence.unwrap();
        assert_eq!(div.reference, BackendKind::Vectorized);
        assert!(div.max_relative_error > 1e-3);
        assert_eq!(outcome.potential.len(), 3);
    }

    #[test]
    fn test_checked_without_reference() {
        let engine = ScreeningEngine::new(ScreeningConfig::default()).unwrap();
        let (current, areas, positions, centers) = sample();
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);
        let outcome = engine.induced_potential_checked(&inputs).unwrap();
        assert!(outcome.divergence.is_none());
        assert_eq!(outcome.backend, BackendKind::Vectorized);
    }
}
