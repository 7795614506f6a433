// crates/fv_mesh/src/geometry.rs
//! 三角形几何计算
//!
//! 有向面积、形心、外心（Voronoi 顶点）。
//! 批量函数在访问坐标前检查索引越界与重复顶点。

use glam::DVec2;

use crate::error::{MeshError, MeshResult};
use crate::topology::check_triangle_indices;

#[inline]
fn corners(points: &[DVec2], tri: &[u32; 3]) -> (DVec2, DVec2, DVec2) {
    (
        points[tri[0] as usize],
        points[tri[1] as usize],
        points[tri[2] as usize],
    )
}

/// 单个三角形有向面积（逆时针为正）
#[inline]
pub fn signed_area(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    0.5 * (b - a).perp_dot(c - a)
}

/// 所有三角形的有向面积
pub fn signed_triangle_areas(points: &[DVec2], triangles: &[[u32; 3]]) -> MeshResult<Vec<f64>> {
    check_triangle_indices(triangles, points.len())?;
    Ok(triangles
        .iter()
        .map(|tri| {
            let (a, b, c) = corners(points, tri);
            signed_area(a, b, c)
        })
        .collect())
}

/// 所有三角形的面积（绝对值）
pub fn triangle_areas(points: &[DVec2], triangles: &[[u32; 3]]) -> MeshResult<Vec<f64>> {
    Ok(signed_triangle_areas(points, triangles)?
        .into_iter()
        .map(f64::abs)
        .collect())
}

/// 三角形形心
pub fn centroids(points: &[DVec2], triangles: &[[u32; 3]]) -> MeshResult<Vec<DVec2>> {
    check_triangle_indices(triangles, points.len())?;
    Ok(triangles
        .iter()
        .map(|tri| {
            let (a, b, c) = corners(points, tri);
            (a + b + c) / 3.0
        })
        .collect())
}

/// 三角形外心
///
/// 以 `a` 为原点平移后求解。分母 `2·(b×c)` 相对于边长平方的
/// 比值不超过 `tolerance` 时视为退化，返回 `Err(分母)`。
pub fn circumcenter(a: DVec2, b: DVec2, c: DVec2, tolerance: f64) -> Result<DVec2, f64> {
    let bp = b - a;
    let cp = c - a;
    let b2 = bp.length_squared();
    let c2 = cp.length_squared();
    let den = 2.0 * bp.perp_dot(cp);

    let scale = b2.max(c2);
    if !den.is_finite() || scale == 0.0 || den.abs() <= tolerance * scale {
        return Err(den);
    }

    let x = (cp.y * b2 - bp.y * c2) / den;
    let y = (bp.x * c2 - cp.x * b2) / den;
    Ok(a + DVec2::new(x, y))
}

/// 计算所有三角形外心（对偶网格顶点）
///
/// 任一三角形退化时返回 [`MeshError::DegenerateTriangle`]。
pub fn voronoi_vertices(
    points: &[DVec2],
    triangles: &[[u32; 3]],
    tolerance: f64,
) -> MeshResult<Vec<DVec2>> {
    check_triangle_indices(triangles, points.len())?;
    triangles
        .iter()
        .enumerate()
        .map(|(i, tri)| {
            let (a, b, c) = corners(points, tri);
            circumcenter(a, b, c, tolerance).map_err(|denominator| {
                MeshError::DegenerateTriangle {
                    triangle: i,
                    denominator,
                }
            })
        })
        .collect()
}

/// 多边形面积（鞋带公式，有向）
pub fn shoelace_area(polygon: &[DVec2]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| polygon[i].perp_dot(polygon[(i + 1) % n]))
        .sum();
    0.5 * twice
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_area_orientation() {
        let pts = vec![DVec2::ZERO, DVec2::X, DVec2::Y];
        assert_eq!(signed_triangle_areas(&pts, &[[0, 1, 2]]).unwrap(), vec![0.5]);
        assert_eq!(signed_triangle_areas(&pts, &[[0, 2, 1]]).unwrap(), vec![-0.5]);
        assert_eq!(triangle_areas(&pts, &[[0, 2, 1]]).unwrap(), vec![0.5]);
    }

    #[test]
    fn test_circumcenter_right_triangle() {
        // 直角三角形外心位于斜边中点
        let cc = circumcenter(DVec2::ZERO, DVec2::new(2.0, 0.0), DVec2::new(0.0, 2.0), 1e-12)
            .unwrap();
        assert!((cc - DVec2::new(1.0, 1.0)).length() < 1e-14);
    }

    #[test]
    fn test_circumcenter_equidistant() {
        let a = DVec2::new(0.3, -1.2);
        let b = DVec2::new(2.1, 0.4);
        let c = DVec2::new(-0.7, 1.9);
        let cc = circumcenter(a, b, c, 1e-12).unwrap();
        let ra = (cc - a).length();
        assert!(((cc - b).length() - ra).abs() < 1e-12);
        assert!(((cc - c).length() - ra).abs() < 1e-12);
    }

    #[test]
    fn test_collinear_is_degenerate() {
        let r = circumcenter(DVec2::ZERO, DVec2::X, DVec2::new(2.0, 0.0), 1e-12);
        assert!(r.is_err());

        let pts = vec![DVec2::ZERO, DVec2::X, DVec2::new(2.0, 0.0)];
        let err = voronoi_vertices(&pts, &[[0, 1, 2]], 1e-12).unwrap_err();
        assert!(matches!(err, MeshError::DegenerateTriangle { triangle: 0, .. }));
    }

    #[test]
    fn test_batch_functions_check_indices() {
        let pts = vec![DVec2::ZERO, DVec2::X];
        assert!(matches!(
            triangle_areas(&pts, &[[0, 1, 2]]),
            Err(MeshError::IndexOutOfRange { site: 2, .. })
        ));
        assert!(matches!(
            voronoi_vertices(&pts, &[[0, 1, 5]], 1e-12),
            Err(MeshError::IndexOutOfRange { site: 5, .. })
        ));
        assert!(centroids(&pts, &[[1, 0, 1]]).unwrap_err().is_topology());
    }

    #[test]
    fn test_shoelace_unit_square() {
        let sq = [DVec2::ZERO, DVec2::X, DVec2::ONE, DVec2::Y];
        assert!((shoelace_area(&sq) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_centroid() {
        let pts = vec![DVec2::ZERO, DVec2::new(3.0, 0.0), DVec2::new(0.0, 3.0)];
        let c = centroids(&pts, &[[0, 1, 2]]).unwrap();
        assert!((c[0] - DVec2::ONE).length() < 1e-15);
    }
}
