// crates/fv_physics/src/screening/vectorized.rs

//! 分块矩阵向量化后端
//!
//! 每次构造 `block_rows × N` 的核矩阵 `K[i,j] = 1/|c_i − p_j|`，
//! 与 `N × 2` 权重矩阵相乘得到该块的矢势。内存上界为 `block_rows · N`。

use fv_config::{BackendKind, ScreeningConfig};
use glam::DVec2;
use nalgebra::DMatrix;

use super::backend::{coincidence_radius, coincident, source_weights, ScreeningBackend};
use super::ScreeningInputs;
use crate::error::PhysicsResult;

/// 向量化后端
#[derive(Debug, Clone)]
pub struct VectorizedBackend {
    block_rows: usize,
    coincidence_tolerance: f64,
}

impl VectorizedBackend {
    pub fn new(config: &ScreeningConfig) -> Self {
        Self {
            block_rows: config.block_rows.max(1),
            coincidence_tolerance: config.coincidence_tolerance,
        }
    }
}

impl ScreeningBackend for VectorizedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vectorized
    }

    fn induced_potential(&self, inputs: &ScreeningInputs<'_>) -> PhysicsResult<Vec<DVec2>> {
        let n = inputs.n_sites();
        let m = inputs.n_edges();
        let radius = coincidence_radius(inputs, self.coincidence_tolerance);

        let weights = source_weights(inputs);
        let w = DMatrix::from_fn(n, 2, |j, k| weights[j][k]);

        let mut potential = Vec::with_capacity(m);
        for start in (0..m).step_by(self.block_rows) {
            let end = (start + self.block_rows).min(m);
            let mut kernel = DMatrix::<f64>::zeros(end - start, n);
            for (r, center) in inputs.edge_centers[start..end].iter().enumerate() {
                for (j, p) in inputs.site_positions.iter().enumerate() {
                    let d = center.distance(*p);
                    if d <= radius {
                        return Err(coincident(start + r, j, d));
                    }
                    kernel[(r, j)] = d.recip();
                }
            }

            let block = &kernel * &w;
            potential.extend((0..end - start).map(|r| DVec2::new(block[(r, 0)], block[(r, 1)])));
        }

        Ok(potential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhysicsError;

    #[test]
    fn test_single_source() {
        let backend = VectorizedBackend::new(&ScreeningConfig::default());
        let current = [DVec2::new(2.0, 0.0)];
        let areas = [0.5];
        let positions = [DVec2::ZERO];
        let centers = [DVec2::new(2.0, 0.0), DVec2::new(0.0, 4.0)];
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);
        let a = backend.induced_potential(&inputs).unwrap();
        assert_eq!(a, vec![DVec2::new(0.5, 0.0), DVec2::new(0.25, 0.0)]);
    }

    #[test]
    fn test_block_size_does_not_change_result() {
        let current: Vec<DVec2> = (0..7).map(|i| DVec2::new(i as f64, 1.0 - i as f64)).collect();
        let areas = vec![0.3; 7];
        let positions: Vec<DVec2> = (0..7).map(|i| DVec2::new(i as f64, 0.0)).collect();
        let centers: Vec<DVec2> = (0..11).map(|i| DVec2::new(0.5 * i as f64, 1.0)).collect();
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);

        let whole = VectorizedBackend::new(&ScreeningConfig::default())
            .induced_potential(&inputs)
            .unwrap();
        let blocked = VectorizedBackend::new(&ScreeningConfig {
            block_rows: 3,
            ..ScreeningConfig::default()
        })
        .induced_potential(&inputs)
        .unwrap();
        for (a, b) in whole.iter().zip(&blocked) {
            assert!((*a - *b).length() < 1e-14);
        }
    }

    #[test]
    fn test_coincident_reports_indices() {
        let backend = VectorizedBackend::new(&ScreeningConfig {
            block_rows: 1,
            ..ScreeningConfig::default()
        });
        let current = [DVec2::X, DVec2::X];
        let areas = [1.0, 1.0];
        let positions = [DVec2::ZERO, DVec2::ONE];
        let centers = [DVec2::X, DVec2::ONE];
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);
        let err = backend.induced_potential(&inputs).unwrap_err();
        assert!(matches!(err, PhysicsError::CoincidentPoints { edge: 1, site: 1, .. }));
    }
}
