// crates/fv_mesh/src/mesh.rs
//! 不可变网格聚合
//!
//! [`Mesh`] 在构建时一次性完成：
//! 1. 输入校验（坐标有限、索引合法、流形边）
//! 2. 边网格（唯一边、边界标记、中点、方向、边长、对偶边长）
//! 3. 对偶网格（外心、周围三角形、对偶单元面积）
//! 4. 集中质量
//!
//! 构建完成后所有数据只读。

use fv_config::{AreaMethod, MeshConfig};
use fv_foundation::{CsrMatrix, KahanSum};
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::dual::{
    compute_surrounding_area, dual_edge_lengths, ordered_surrounding_area, surrounding_polygons,
    DualMesh,
};
use crate::error::{MeshError, MeshResult};
use crate::geometry::{triangle_areas, voronoi_vertices};
use crate::mass::mass_matrix;
use crate::topology::{validate_triangles, EdgeSet, EdgeTriangleMap};

/// 边网格
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeMesh {
    /// 唯一边 (a, b)，a < b，字典序
    pub edges: Vec<[u32; 2]>,
    /// 是否为边界边
    pub is_boundary: Vec<bool>,
    /// 边界边索引（升序）
    pub boundary_edge_indices: Vec<usize>,
    /// 边中点
    pub centers: Vec<DVec2>,
    /// 单位方向 a → b
    pub directions: Vec<DVec2>,
    /// 边长
    pub lengths: Vec<f64>,
    /// 对偶边长
    pub dual_lengths: Vec<f64>,
}

impl EdgeMesh {
    fn build(
        sites: &[DVec2],
        edge_set: EdgeSet,
        dual_vertices: &[DVec2],
        edge_map: &EdgeTriangleMap,
    ) -> MeshResult<Self> {
        let n = edge_set.n_edges();
        let mut centers = Vec::with_capacity(n);
        let mut directions = Vec::with_capacity(n);
        let mut lengths = Vec::with_capacity(n);
        for &[a, b] in &edge_set.edges {
            let pa = sites[a as usize];
            let pb = sites[b as usize];
            let d = pb - pa;
            let len = d.length();
            centers.push(0.5 * (pa + pb));
            lengths.push(len);
            directions.push(d / len);
        }

        let dual_lengths = dual_edge_lengths(&edge_set.edges, &centers, dual_vertices, edge_map)?;
        let boundary_edge_indices = edge_set.boundary_edge_indices();

        Ok(Self {
            edges: edge_set.edges,
            is_boundary: edge_set.is_boundary,
            boundary_edge_indices,
            centers,
            directions,
            lengths,
            dual_lengths,
        })
    }

    /// 边数
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    fn edge_set(&self) -> EdgeSet {
        EdgeSet {
            edges: self.edges.clone(),
            is_boundary: self.is_boundary.clone(),
        }
    }
}

/// 网格统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshStatistics {
    pub n_sites: usize,
    pub n_triangles: usize,
    pub n_edges: usize,
    pub n_boundary_edges: usize,
    pub n_boundary_sites: usize,
    /// 三角形总面积
    pub total_area: f64,
    /// 对偶单元总面积
    pub dual_area: f64,
    pub min_edge_length: f64,
    pub max_edge_length: f64,
}

impl MeshStatistics {
    /// 对偶面积相对三角形面积的偏差
    pub fn area_residual(&self) -> f64 {
        if self.total_area == 0.0 {
            return 0.0;
        }
        (self.dual_area - self.total_area).abs() / self.total_area
    }
}

impl std::fmt::Display for MeshStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== 网格统计 ===")?;
        writeln!(f, "节点数: {} (边界: {})", self.n_sites, self.n_boundary_sites)?;
        writeln!(f, "三角形数: {}", self.n_triangles)?;
        writeln!(f, "边数: {} (边界: {})", self.n_edges, self.n_boundary_edges)?;
        writeln!(
            f,
            "面积: 三角形 {:.6e}, 对偶 {:.6e}",
            self.total_area, self.dual_area
        )?;
        write!(
            f,
            "边长: [{:.6e}, {:.6e}]",
            self.min_edge_length, self.max_edge_length
        )
    }
}

/// 不可变三角网格及其对偶
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    sites: Vec<DVec2>,
    triangles: Vec<[u32; 3]>,
    triangle_areas: Vec<f64>,
    boundary_sites: Vec<u32>,
    edge_mesh: EdgeMesh,
    dual: DualMesh,
    mass: Vec<f64>,
    area_method: AreaMethod,
}

impl Mesh {
    /// 从坐标数组与三角形索引构建
    pub fn from_triangulation(
        points: &[[f64; 2]],
        triangles: &[[u32; 3]],
        config: &MeshConfig,
    ) -> MeshResult<Self> {
        let sites = points.iter().map(|&[x, y]| DVec2::new(x, y)).collect();
        Self::from_sites(sites, triangles.to_vec(), config)
    }

    /// 从节点坐标构建
    pub fn from_sites(
        sites: Vec<DVec2>,
        triangles: Vec<[u32; 3]>,
        config: &MeshConfig,
    ) -> MeshResult<Self> {
        config.validate()?;

        if let Some(site) = sites.iter().position(|p| !p.is_finite()) {
            return Err(MeshError::NonFiniteCoordinate { site });
        }
        validate_triangles(&triangles, sites.len(), config.require_all_sites_referenced)?;

        let edge_map = EdgeTriangleMap::build(&triangles);
        let edge_set = EdgeSet::from_map(&edge_map)?;
        let boundary_sites = edge_set.boundary_sites();

        let dual_vertices = voronoi_vertices(&sites, &triangles, config.degenerate_tolerance)?;
        let polygons = surrounding_polygons(&triangles, sites.len());
        let edge_mesh = EdgeMesh::build(&sites, edge_set, &dual_vertices, &edge_map)?;

        let areas = match config.area_method {
            AreaMethod::ConvexHull => compute_surrounding_area(
                &sites,
                &dual_vertices,
                &polygons,
                &edge_mesh.edge_set(),
                &edge_mesh.centers,
                config.merge_tolerance,
            ),
            AreaMethod::Ordered => ordered_surrounding_area(
                &sites,
                &triangles,
                &dual_vertices,
                &polygons,
                &edge_map,
            )?,
        };

        let mass = mass_matrix(&sites, &triangles)?;
        let triangle_areas = triangle_areas(&sites, &triangles)?;

        let mesh = Self {
            sites,
            triangles,
            triangle_areas,
            boundary_sites,
            edge_mesh,
            dual: DualMesh {
                vertices: dual_vertices,
                polygons,
                areas,
            },
            mass,
            area_method: config.area_method,
        };

        let stats = mesh.statistics();
        log::info!(
            "网格构建完成: {} 节点, {} 三角形, {} 边 ({} 边界)",
            stats.n_sites,
            stats.n_triangles,
            stats.n_edges,
            stats.n_boundary_edges
        );
        if stats.area_residual() > config.tolerance().area_rel {
            log::warn!(
                "对偶面积 {:.6e} 与三角形面积 {:.6e} 偏差 {:.3e} ({:?})",
                stats.dual_area,
                stats.total_area,
                stats.area_residual(),
                mesh.area_method
            );
        }

        Ok(mesh)
    }

    #[inline]
    pub fn n_sites(&self) -> usize {
        self.sites.len()
    }

    #[inline]
    pub fn n_triangles(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn n_edges(&self) -> usize {
        self.edge_mesh.n_edges()
    }

    /// 节点坐标
    #[inline]
    pub fn sites(&self) -> &[DVec2] {
        &self.sites
    }

    /// 三角形索引
    #[inline]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// 三角形面积（绝对值）
    #[inline]
    pub fn triangle_areas(&self) -> &[f64] {
        &self.triangle_areas
    }

    /// 边界节点（升序）
    #[inline]
    pub fn boundary_sites(&self) -> &[u32] {
        &self.boundary_sites
    }

    /// 边网格
    #[inline]
    pub fn edge_mesh(&self) -> &EdgeMesh {
        &self.edge_mesh
    }

    /// 对偶网格
    #[inline]
    pub fn dual_mesh(&self) -> &DualMesh {
        &self.dual
    }

    /// 对偶单元面积
    #[inline]
    pub fn site_areas(&self) -> &[f64] {
        &self.dual.areas
    }

    /// 集中质量向量
    #[inline]
    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    /// 集中质量矩阵（对角稀疏）
    pub fn mass_sparse(&self) -> CsrMatrix<f64> {
        CsrMatrix::from_diagonal(&self.mass)
    }

    /// 构建时使用的面积算法
    #[inline]
    pub fn area_method(&self) -> AreaMethod {
        self.area_method
    }

    /// 统计信息
    pub fn statistics(&self) -> MeshStatistics {
        let (min_len, max_len) = self
            .edge_mesh
            .lengths
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &l| (lo.min(l), hi.max(l)));

        MeshStatistics {
            n_sites: self.n_sites(),
            n_triangles: self.n_triangles(),
            n_edges: self.n_edges(),
            n_boundary_edges: self.edge_mesh.boundary_edge_indices.len(),
            n_boundary_sites: self.boundary_sites.len(),
            total_area: KahanSum::sum_iter(self.triangle_areas.iter().copied()),
            dual_area: self.dual.total_area(),
            min_edge_length: min_len,
            max_edge_length: max_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square(method: AreaMethod) -> Mesh {
        let config = MeshConfig {
            area_method: method,
            ..MeshConfig::default()
        };
        Mesh::from_triangulation(
            &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            &[[0, 1, 2], [0, 2, 3]],
            &config,
        )
        .unwrap()
    }

    #[test]
    fn test_unit_square_edges() {
        let mesh = unit_square(AreaMethod::ConvexHull);
        let em = mesh.edge_mesh();
        assert_eq!(em.n_edges(), 5);
        assert_eq!(em.boundary_edge_indices.len(), 4);
        assert_eq!(em.centers[1], DVec2::splat(0.5));
        assert!((em.lengths[1] - 2.0_f64.sqrt()).abs() < 1e-15);
        assert!((em.directions[1] - DVec2::splat(0.5_f64.sqrt())).length() < 1e-15);
        assert_eq!(mesh.boundary_sites(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_unit_square_areas_both_methods() {
        for method in [AreaMethod::ConvexHull, AreaMethod::Ordered] {
            let mesh = unit_square(method);
            for &a in mesh.site_areas() {
                assert!((a - 0.25).abs() < 1e-14, "{:?}: {:?}", method, mesh.site_areas());
            }
            let stats = mesh.statistics();
            assert!(stats.area_residual() < 1e-12);
            assert_eq!(stats.n_boundary_edges, 4);
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = Mesh::from_triangulation(
            &[[0.0, 0.0], [f64::NAN, 0.0], [0.0, 1.0]],
            &[[0, 1, 2]],
            &MeshConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::NonFiniteCoordinate { site: 1 }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MeshConfig {
            merge_tolerance: 0.0,
            ..MeshConfig::default()
        };
        let err = Mesh::from_triangulation(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]], &[[0, 1, 2]], &config)
            .unwrap_err();
        assert!(matches!(err, MeshError::Config(_)));
    }

    #[test]
    fn test_statistics_display() {
        let text = unit_square(AreaMethod::ConvexHull).statistics().to_string();
        assert!(text.contains("三角形数: 2"));
    }
}
