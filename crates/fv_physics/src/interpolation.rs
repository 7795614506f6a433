// crates/fv_physics/src/interpolation.rs

//! 边 → 节点插值
//!
//! 边上标量电流是节点矢量场沿边方向的投影。对每个节点，
//! 以其关联边求解最小二乘问题:
//!
//! ```text
//! min Σ_e (J_e − d̂_e · J_site)²
//! ```
//!
//! 即 2x2 法方程 `(Σ d̂ d̂ᵀ) J_site = Σ J_e d̂_e`。

use glam::DVec2;
use nalgebra::{Matrix2, Vector2};

use crate::error::{PhysicsError, PhysicsResult};

/// 法方程奇异判据（相对于矩阵迹平方）
const DET_MIN_REL: f64 = 1e-12;

/// 从边标量重构节点矢量场
pub fn edge_to_site(
    n_sites: usize,
    edges: &[[u32; 2]],
    directions: &[DVec2],
    values: &[f64],
) -> PhysicsResult<Vec<DVec2>> {
    if directions.len() != edges.len() {
        return Err(PhysicsError::dimension_mismatch(
            "directions",
            edges.len(),
            directions.len(),
        ));
    }
    if values.len() != edges.len() {
        return Err(PhysicsError::dimension_mismatch("values", edges.len(), values.len()));
    }

    let mut normal = vec![Matrix2::<f64>::zeros(); n_sites];
    let mut rhs = vec![Vector2::<f64>::zeros(); n_sites];

    for ((edge, d), &v) in edges.iter().zip(directions).zip(values) {
        let d = Vector2::new(d.x, d.y);
        let outer = d * d.transpose();
        for &s in edge {
            let s = s as usize;
            if s >= n_sites {
                return Err(PhysicsError::IndexOutOfRange {
                    name: "edges",
                    index: s,
                    len: n_sites,
                });
            }
            normal[s] += outer;
            rhs[s] += d * v;
        }
    }

    normal
        .iter()
        .zip(&rhs)
        .enumerate()
        .map(|(site, (m, b))| {
            let trace = m.trace();
            if trace == 0.0 || m.determinant().abs() <= DET_MIN_REL * trace * trace {
                return Err(PhysicsError::RankDeficient { site });
            }
            let x = m
                .try_inverse()
                .ok_or(PhysicsError::RankDeficient { site })?
                * b;
            Ok(DVec2::new(x[0], x[1]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_field_recovered() {
        // 单个三角形，三条边方向互不平行
        let pts = [DVec2::ZERO, DVec2::X, DVec2::Y];
        let edges = [[0u32, 1], [0, 2], [1, 2]];
        let dirs: Vec<DVec2> = edges
            .iter()
            .map(|&[a, b]| (pts[b as usize] - pts[a as usize]).normalize())
            .collect();
        let field = DVec2::new(0.7, -1.3);
        let values: Vec<f64> = dirs.iter().map(|d| d.dot(field)).collect();

        let sites = edge_to_site(3, &edges, &dirs, &values).unwrap();
        for s in sites {
            assert!((s - field).length() < 1e-12);
        }
    }

    #[test]
    fn test_parallel_edges_rank_deficient() {
        let edges = [[0u32, 1], [1, 2]];
        let dirs = [DVec2::X, DVec2::X];
        let err = edge_to_site(3, &edges, &dirs, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, PhysicsError::RankDeficient { site: 0 }));
    }

    #[test]
    fn test_isolated_site_rank_deficient() {
        let edges = [[0u32, 1]];
        let err = edge_to_site(3, &edges, &[DVec2::X], &[1.0]).unwrap_err();
        assert!(matches!(err, PhysicsError::RankDeficient { .. }));
    }
}
