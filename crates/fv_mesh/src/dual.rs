// crates/fv_mesh/src/dual.rs
//! Voronoi 对偶网格
//!
//! 对偶顶点为三角形外心。每个节点的对偶单元由其周围三角形的外心围成，
//! 边界节点的单元还包含节点本身及其边界边中点。
//!
//! 面积有两种算法：
//!
//! - 凸包法：单元点集的凸包面积；边界节点若不是凸包顶点（凹角），
//!   再减去 (节点, 边界边中点) 围成的凸包面积
//! - 有序法：沿三角形扇依次连接外心，用有向鞋带公式求面积。
//!   每条链按首个三角形的朝向定向，外心落在区域外时保留负贡献，
//!   因此单元面积之和严格等于三角形总面积

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};
use crate::geometry::{shoelace_area, signed_area};
use crate::hull::convex_polygon_area;
use crate::topology::{site_triangles, CsrConnectivity, EdgeKey, EdgeSet, EdgeTriangleMap};

/// 对偶网格
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualMesh {
    /// 对偶顶点（三角形外心），长度 M
    pub vertices: Vec<DVec2>,
    /// 每个节点的周围三角形索引（升序）
    pub polygons: CsrConnectivity<u32>,
    /// 对偶单元面积，长度 N
    pub areas: Vec<f64>,
}

impl DualMesh {
    /// 对偶单元总面积
    pub fn total_area(&self) -> f64 {
        fv_foundation::KahanSum::sum_iter(self.areas.iter().copied())
    }
}

/// 每个节点周围的三角形
pub fn surrounding_polygons(triangles: &[[u32; 3]], n_sites: usize) -> CsrConnectivity<u32> {
    site_triangles(triangles, n_sites)
}

/// 对偶边长
///
/// 内部边为两侧外心距离；边界边为唯一外心到边中点的距离。
pub fn dual_edge_lengths(
    edges: &[[u32; 2]],
    edge_centers: &[DVec2],
    dual_vertices: &[DVec2],
    edge_map: &EdgeTriangleMap,
) -> MeshResult<Vec<f64>> {
    if edge_centers.len() != edges.len() {
        return Err(MeshError::element_count_mismatch(
            "edge_centers",
            edges.len(),
            edge_centers.len(),
        ));
    }

    edges
        .iter()
        .zip(edge_centers)
        .map(|(e, &center)| match edge_map.incident(EdgeKey::new(e[0], e[1])) {
            [t] => Ok(dual_vertices[*t as usize].distance(center)),
            [t0, t1] => Ok(dual_vertices[*t0 as usize].distance(dual_vertices[*t1 as usize])),
            other => Err(MeshError::NonManifoldEdge {
                a: e[0],
                b: e[1],
                count: other.len(),
            }),
        })
        .collect()
}

/// 每个节点关联的边界边索引
fn boundary_edges_by_site(n_sites: usize, edge_set: &EdgeSet) -> Vec<Vec<usize>> {
    let mut by_site = vec![Vec::new(); n_sites];
    for i in edge_set.boundary_edge_indices() {
        let [a, b] = edge_set.edges[i];
        by_site[a as usize].push(i);
        by_site[b as usize].push(i);
    }
    by_site
}

/// 凸包法对偶单元面积
pub fn compute_surrounding_area(
    sites: &[DVec2],
    dual_vertices: &[DVec2],
    polygons: &CsrConnectivity<u32>,
    edge_set: &EdgeSet,
    edge_centers: &[DVec2],
    merge_tolerance: f64,
) -> Vec<f64> {
    let boundary_edges = boundary_edges_by_site(sites.len(), edge_set);

    (0..sites.len())
        .map(|s| {
            let mut points: Vec<DVec2> = polygons
                .row(s)
                .iter()
                .map(|&t| dual_vertices[t as usize])
                .collect();

            let incident = &boundary_edges[s];
            if incident.is_empty() {
                return convex_polygon_area(&points, merge_tolerance).0;
            }

            let midpoints: Vec<DVec2> = incident.iter().map(|&i| edge_centers[i]).collect();
            points.push(sites[s]);
            points.extend_from_slice(&midpoints);

            let (mut area, is_convex) = convex_polygon_area(&points, merge_tolerance);
            if !is_convex {
                let mut notch = Vec::with_capacity(midpoints.len() + 1);
                notch.push(sites[s]);
                notch.extend_from_slice(&midpoints);
                area -= convex_polygon_area(&notch, merge_tolerance).0;
            }
            area
        })
        .collect()
}

/// 三角形中除 `site` 外的两个顶点
#[inline]
fn spoke_vertices(tri: &[u32; 3], site: u32) -> [u32; 2] {
    match tri.iter().position(|&v| v == site) {
        Some(0) => [tri[1], tri[2]],
        Some(1) => [tri[2], tri[0]],
        _ => [tri[0], tri[1]],
    }
}

/// 三角形中除 `site` 与 `from` 外的顶点
#[inline]
fn other_spoke(tri: &[u32; 3], site: u32, from: u32) -> u32 {
    let [x, y] = spoke_vertices(tri, site);
    if x == from {
        y
    } else {
        x
    }
}

/// 三角形朝向（逆时针为 1.0，顺时针为 -1.0）
#[inline]
fn orientation(sites: &[DVec2], tri: &[u32; 3]) -> f64 {
    let area = signed_area(
        sites[tri[0] as usize],
        sites[tri[1] as usize],
        sites[tri[2] as usize],
    );
    if area < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// 有序法对偶单元面积
///
/// 内部节点的三角形扇构成闭环；边界节点的扇是从一条边界边
/// 到另一条边界边的链，单元为 [节点, 起始中点, 外心..., 终止中点]。
/// 节点处若有多条链（非流形顶点），面积累加。
///
/// 面积取有向值：沿扇行进方向与首个三角形朝向一致时为正。
/// 钝角边界三角形的外心落在区域外时，相邻节点可得到负面积，
/// 但全部单元之和等于三角形总面积。
pub fn ordered_surrounding_area(
    sites: &[DVec2],
    triangles: &[[u32; 3]],
    dual_vertices: &[DVec2],
    polygons: &CsrConnectivity<u32>,
    edge_map: &EdgeTriangleMap,
) -> MeshResult<Vec<f64>> {
    const OP: &str = "ordered_surrounding_area";

    let mut areas = Vec::with_capacity(sites.len());
    for (s, &site_pos) in sites.iter().enumerate() {
        let site = s as u32;
        let fan = polygons.row(s);
        if fan.is_empty() {
            areas.push(0.0);
            continue;
        }

        let mid = |x: u32| 0.5 * (site_pos + sites[x as usize]);
        let broken_fan = || {
            MeshError::invalid_topology(OP, format!("节点 {} 周围的三角形扇不连通", s))
        };

        let starts: Vec<(u32, u32)> = fan
            .iter()
            .flat_map(|&t| {
                spoke_vertices(&triangles[t as usize], site)
                    .into_iter()
                    .map(move |x| (t, x))
            })
            .filter(|&(_, x)| edge_map.is_boundary(EdgeKey::new(site, x)))
            .collect();

        let mut visited = 0usize;
        let mut area = 0.0;

        if starts.is_empty() {
            let start = fan[0];
            let sign = orientation(sites, &triangles[start as usize]);
            let mut ring = Vec::with_capacity(fan.len());
            let mut cur = start;
            let mut from = spoke_vertices(&triangles[start as usize], site)[0];
            loop {
                ring.push(dual_vertices[cur as usize]);
                visited += 1;
                if visited > fan.len() {
                    return Err(broken_fan());
                }
                let to = other_spoke(&triangles[cur as usize], site, from);
                cur = edge_map
                    .neighbor_across(EdgeKey::new(site, to), cur)
                    .ok_or_else(broken_fan)?;
                from = to;
                if cur == start {
                    break;
                }
            }
            area = sign * shoelace_area(&ring);
        } else {
            let mut closed: Vec<u32> = Vec::with_capacity(starts.len());
            for &(t0, x0) in &starts {
                if closed.contains(&x0) {
                    continue;
                }
                closed.push(x0);

                let first = &triangles[t0 as usize];
                let forward = spoke_vertices(first, site)[0] == x0;
                let sign = orientation(sites, first) * if forward { 1.0 } else { -1.0 };

                let mut chain = vec![site_pos, mid(x0)];
                let mut cur = t0;
                let mut from = x0;
                loop {
                    chain.push(dual_vertices[cur as usize]);
                    visited += 1;
                    if visited > fan.len() {
                        return Err(broken_fan());
                    }
                    let to = other_spoke(&triangles[cur as usize], site, from);
                    let key = EdgeKey::new(site, to);
                    if edge_map.is_boundary(key) {
                        chain.push(mid(to));
                        closed.push(to);
                        break;
                    }
                    cur = edge_map.neighbor_across(key, cur).ok_or_else(broken_fan)?;
                    from = to;
                }
                area += sign * shoelace_area(&chain);
            }
        }

        if visited != fan.len() {
            return Err(broken_fan());
        }
        areas.push(area);
    }
    Ok(areas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::voronoi_vertices;
    use crate::topology::get_edges;

    fn unit_square() -> (Vec<DVec2>, Vec<[u32; 3]>) {
        (
            vec![DVec2::ZERO, DVec2::X, DVec2::ONE, DVec2::Y],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    fn centers(sites: &[DVec2], set: &EdgeSet) -> Vec<DVec2> {
        set.edges
            .iter()
            .map(|e| 0.5 * (sites[e[0] as usize] + sites[e[1] as usize]))
            .collect()
    }

    #[test]
    fn test_dual_edge_lengths_unit_square() {
        let (sites, tris) = unit_square();
        let map = EdgeTriangleMap::build(&tris);
        let set = EdgeSet::from_map(&map).unwrap();
        let cc = voronoi_vertices(&sites, &tris, 1e-12).unwrap();
        let lengths = dual_edge_lengths(&set.edges, &centers(&sites, &set), &cc, &map).unwrap();
        // 边界边: 外心 (0.5,0.5) 到各边中点距离 0.5；对角线两侧外心重合
        assert_eq!(lengths, vec![0.5, 0.0, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_hull_area_unit_square() {
        let (sites, tris) = unit_square();
        let set = get_edges(&tris).unwrap();
        let cc = voronoi_vertices(&sites, &tris, 1e-12).unwrap();
        let polys = surrounding_polygons(&tris, 4);
        let areas = compute_surrounding_area(&sites, &cc, &polys, &set, &centers(&sites, &set), 1e-9);
        for a in &areas {
            assert!((a - 0.25).abs() < 1e-14, "{:?}", areas);
        }
    }

    #[test]
    fn test_ordered_area_unit_square() {
        let (sites, tris) = unit_square();
        let map = EdgeTriangleMap::build(&tris);
        let cc = voronoi_vertices(&sites, &tris, 1e-12).unwrap();
        let polys = surrounding_polygons(&tris, 4);
        let areas = ordered_surrounding_area(&sites, &tris, &cc, &polys, &map).unwrap();
        for a in &areas {
            assert!((a - 0.25).abs() < 1e-14, "{:?}", areas);
        }
    }

    #[test]
    fn test_ordered_area_clockwise_triangles() {
        let (sites, _) = unit_square();
        let tris = vec![[0, 2, 1], [0, 3, 2]];
        let map = EdgeTriangleMap::build(&tris);
        let cc = voronoi_vertices(&sites, &tris, 1e-12).unwrap();
        let polys = surrounding_polygons(&tris, 4);
        let areas = ordered_surrounding_area(&sites, &tris, &cc, &polys, &map).unwrap();
        for a in &areas {
            assert!((a - 0.25).abs() < 1e-14, "{:?}", areas);
        }
    }

    #[test]
    fn test_spoke_vertices() {
        assert_eq!(spoke_vertices(&[4, 7, 9], 7), [9, 4]);
        assert_eq!(other_spoke(&[4, 7, 9], 7, 9), 4);
    }
}
