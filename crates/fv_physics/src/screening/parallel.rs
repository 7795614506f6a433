// crates/fv_physics/src/screening/parallel.rs

//! 多核并行后端
//!
//! 按边并行，每条边对所有节点做循环归约，线程间无共享写。

use fv_config::BackendKind;
use fv_config::ScreeningConfig;
use glam::DVec2;
use rayon::prelude::*;

use super::backend::{coincidence_radius, coincident, source_weights, ScreeningBackend};
use super::ScreeningInputs;
use crate::error::PhysicsResult;

/// rayon 并行后端
#[derive(Debug, Clone)]
pub struct ParallelBackend {
    coincidence_tolerance: f64,
}

impl ParallelBackend {
    pub fn new(config: &ScreeningConfig) -> Self {
        Self {
            coincidence_tolerance: config.coincidence_tolerance,
        }
    }
}

impl ScreeningBackend for ParallelBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Parallel
    }

    fn induced_potential(&self, inputs: &ScreeningInputs<'_>) -> PhysicsResult<Vec<DVec2>> {
        let radius = coincidence_radius(inputs, self.coincidence_tolerance);
        let weights = source_weights(inputs);
        let positions = inputs.site_positions;

        inputs
            .edge_centers
            .par_iter()
            .enumerate()
            .map(|(i, &center)| {
                let mut acc = DVec2::ZERO;
                for (j, (&p, &w)) in positions.iter().zip(&weights).enumerate() {
                    let d = center.distance(p);
                    if d <= radius {
                        return Err(coincident(i, j, d));
                    }
                    acc += w / d;
                }
                Ok(acc)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhysicsError;

    #[test]
    fn test_two_sources_superpose() {
        let backend = ParallelBackend::new(&ScreeningConfig::default());
        let current = [DVec2::new(1.0, 0.0), DVec2::new(0.0, 1.0)];
        let areas = [1.0, 2.0];
        let positions = [DVec2::new(-1.0, 0.0), DVec2::new(1.0, 0.0)];
        let centers = [DVec2::ZERO];
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);
        let a = backend.induced_potential(&inputs).unwrap();
        assert_eq!(a, vec![DVec2::new(1.0, 2.0)]);
    }

    #[test]
    fn test_coincident_rejected() {
        let backend = ParallelBackend::new(&ScreeningConfig::default());
        let current = [DVec2::X];
        let areas = [1.0];
        let positions = [DVec2::ONE];
        let centers = [DVec2::ZERO, DVec2::ONE];
        let inputs = ScreeningInputs::new(&current, &areas, &positions, &centers);
        assert!(matches!(
            backend.induced_potential(&inputs),
            Err(PhysicsError::CoincidentPoints { edge: 1, site: 0, .. })
        ));
    }
}
