// crates/fv_mesh/src/mass.rs
//! 集中质量矩阵
//!
//! 每个三角形面积的 1/3 分配给其三个顶点。
//! 使用面积绝对值，顺时针三角形同样贡献正质量。

use fv_foundation::CsrMatrix;
use glam::DVec2;

use crate::error::MeshResult;
use crate::geometry::signed_area;
use crate::topology::check_triangle_indices;

/// 集中质量向量（长度 N）
pub fn mass_matrix(points: &[DVec2], triangles: &[[u32; 3]]) -> MeshResult<Vec<f64>> {
    let n_sites = points.len();
    let mut mass = vec![0.0; n_sites];
    check_triangle_indices(triangles, n_sites)?;
    for tri in triangles {
        let third = signed_area(
            points[tri[0] as usize],
            points[tri[1] as usize],
            points[tri[2] as usize],
        )
        .abs()
            / 3.0;
        for &v in tri {
            mass[v as usize] += third;
        }
    }
    Ok(mass)
}

/// 集中质量矩阵（N×N 对角稀疏矩阵）
pub fn mass_matrix_sparse(
    points: &[DVec2],
    triangles: &[[u32; 3]],
) -> MeshResult<CsrMatrix<f64>> {
    Ok(CsrMatrix::from_diagonal(&mass_matrix(points, triangles)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshError;

    #[test]
    fn test_single_triangle() {
        let pts = [DVec2::ZERO, DVec2::X, DVec2::Y];
        let m = mass_matrix(&pts, &[[0, 1, 2]]).unwrap();
        for v in &m {
            assert!((v - 1.0 / 6.0).abs() < 1e-15);
        }
    }

    #[test]
    fn test_orientation_independent() {
        let pts = [DVec2::ZERO, DVec2::X, DVec2::ONE, DVec2::Y];
        let ccw = mass_matrix(&pts, &[[0, 1, 2], [0, 2, 3]]).unwrap();
        let cw = mass_matrix(&pts, &[[0, 2, 1], [0, 3, 2]]).unwrap();
        assert_eq!(ccw, cw);
        assert!((ccw.iter().sum::<f64>() - 1.0).abs() < 1e-14);
        assert!(ccw.iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_sparse_is_diagonal() {
        let pts = [DVec2::ZERO, DVec2::X, DVec2::ONE, DVec2::Y];
        let m = mass_matrix_sparse(&pts, &[[0, 1, 2], [0, 2, 3]]).unwrap();
        assert!(m.is_diagonal());
        assert_eq!(m.n_rows(), 4);
        assert!((m.get(0, 0).unwrap() - 1.0 / 3.0).abs() < 1e-15);
        assert!((m.get(1, 1).unwrap() - 1.0 / 6.0).abs() < 1e-15);
    }

    #[test]
    fn test_index_out_of_range() {
        let pts = [DVec2::ZERO, DVec2::X];
        assert!(matches!(
            mass_matrix(&pts, &[[0, 1, 2]]),
            Err(MeshError::IndexOutOfRange { site: 2, .. })
        ));
    }
}
