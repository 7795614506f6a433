// crates/fv_mesh/src/topology.rs
//! 三角网格拓扑
//!
//! - 边提取：每个三角形贡献 (0,1)、(1,2)、(2,0) 三条边，
//!   规范化为 (min, max) 后去重，出现一次的为边界边
//! - 边-三角形关联表：用于外心连线（对偶边）与扇形遍历
//! - 节点-三角形 CSR 连接：每个节点周围的三角形（升序）
//!
//! # 边的顺序
//!
//! 逐三角形的边遍历按"块"进行：先所有三角形的 (0,1)，
//! 再所有 (1,2)，最后所有 (2,0)。[`edge_lengths`] 按此顺序输出。
//! 去重后的边按字典序排列。

use std::collections::HashMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// 三角形局部边（顶点槽位对）
pub const TRIANGLE_EDGES: [(usize, usize); 3] = [(0, 1), (1, 2), (2, 0)];

// ============================================================================
// CSR 连接
// ============================================================================

/// CSR 格式连接性
///
/// `offsets[i]..offsets[i+1]` 是第 i 行在 `indices` 中的范围。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrConnectivity<I: Copy> {
    offsets: Vec<u32>,
    indices: Vec<I>,
}

impl<I: Copy> Default for CsrConnectivity<I> {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            indices: Vec::new(),
        }
    }
}

impl<I: Copy> CsrConnectivity<I> {
    /// 第 row 行
    #[inline]
    pub fn row(&self, row: usize) -> &[I] {
        let start = self.offsets[row] as usize;
        let end = self.offsets[row + 1] as usize;
        &self.indices[start..end]
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// 元素总数
    #[inline]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }
}

/// 节点-三角形连接：每个节点所属三角形索引（升序）
///
/// 两趟计数排序，三角形按索引顺序写入，因此每行天然升序。
pub fn site_triangles(triangles: &[[u32; 3]], n_sites: usize) -> CsrConnectivity<u32> {
    let mut counts = vec![0u32; n_sites + 1];
    for tri in triangles {
        for &v in tri {
            counts[v as usize + 1] += 1;
        }
    }
    for i in 0..n_sites {
        counts[i + 1] += counts[i];
    }
    let offsets = counts;

    let mut cursor: Vec<u32> = offsets[..n_sites].to_vec();
    let mut indices = vec![0u32; offsets[n_sites] as usize];
    for (t, tri) in triangles.iter().enumerate() {
        for &v in tri {
            let slot = &mut cursor[v as usize];
            indices[*slot as usize] = t as u32;
            *slot += 1;
        }
    }

    CsrConnectivity { offsets, indices }
}

// ============================================================================
// 校验
// ============================================================================

/// 检查三角形内无重复顶点
pub fn check_distinct_vertices(triangles: &[[u32; 3]]) -> MeshResult<()> {
    match triangles
        .iter()
        .position(|tri| tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0])
    {
        Some(t) => Err(MeshError::invalid_topology(
            "check_distinct_vertices",
            format!("三角形 {} 含重复顶点 {:?}", t, triangles[t]),
        )),
        None => Ok(()),
    }
}

/// 检查索引越界与重复顶点
///
/// 几何与拓扑算子在访问坐标前调用，空列表视为合法。
pub fn check_triangle_indices(triangles: &[[u32; 3]], n_sites: usize) -> MeshResult<()> {
    for (t, tri) in triangles.iter().enumerate() {
        if let Some(&v) = tri.iter().find(|&&v| v as usize >= n_sites) {
            return Err(MeshError::IndexOutOfRange {
                triangle: t,
                site: v,
                n_sites,
            });
        }
    }
    check_distinct_vertices(triangles)
}

/// 校验三角形索引
///
/// 检查非空、索引越界、三角形内重复顶点，以及（可选）未被引用的节点。
pub fn validate_triangles(
    triangles: &[[u32; 3]],
    n_sites: usize,
    require_all_referenced: bool,
) -> MeshResult<()> {
    if triangles.is_empty() {
        return Err(MeshError::invalid_topology("validate_triangles", "三角形列表为空"));
    }
    check_triangle_indices(triangles, n_sites)?;

    if require_all_referenced {
        let mut referenced = vec![false; n_sites];
        for &v in triangles.iter().flatten() {
            referenced[v as usize] = true;
        }
        if let Some(site) = referenced.iter().position(|&r| !r) {
            return Err(MeshError::UnreferencedSite { site });
        }
    }
    Ok(())
}

// ============================================================================
// 边
// ============================================================================

/// 规范化无向边 (min, max)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey(pub u32, pub u32);

impl EdgeKey {
    #[inline]
    pub fn new(a: u32, b: u32) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    #[inline]
    pub fn as_array(&self) -> [u32; 2] {
        [self.0, self.1]
    }
}

/// 按块顺序遍历所有三角形边 `(三角形索引, 起点, 终点)`
pub fn edge_occurrences(triangles: &[[u32; 3]]) -> impl Iterator<Item = (usize, u32, u32)> + '_ {
    TRIANGLE_EDGES.iter().flat_map(move |&(i, j)| {
        triangles
            .iter()
            .enumerate()
            .map(move |(t, tri)| (t, tri[i], tri[j]))
    })
}

/// 逐三角形边长（长度 3M，块顺序）
pub fn edge_lengths(points: &[DVec2], triangles: &[[u32; 3]]) -> MeshResult<Vec<f64>> {
    check_triangle_indices(triangles, points.len())?;
    Ok(edge_occurrences(triangles)
        .map(|(_, a, b)| points[a as usize].distance(points[b as usize]))
        .collect())
}

/// 边 → 关联三角形列表
#[derive(Debug, Clone, Default)]
pub struct EdgeTriangleMap {
    map: HashMap<EdgeKey, Vec<u32>>,
}

impl EdgeTriangleMap {
    /// 构建关联表（三角形按索引升序插入）
    pub fn build(triangles: &[[u32; 3]]) -> Self {
        let mut map: HashMap<EdgeKey, Vec<u32>> = HashMap::with_capacity(triangles.len() * 2);
        for (t, tri) in triangles.iter().enumerate() {
            for &(i, j) in &TRIANGLE_EDGES {
                map.entry(EdgeKey::new(tri[i], tri[j]))
                    .or_default()
                    .push(t as u32);
            }
        }
        Self { map }
    }

    /// 唯一边数量
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// 边的关联三角形，不存在时为空切片
    pub fn incident(&self, key: EdgeKey) -> &[u32] {
        self.map.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 跨过边 `key` 与三角形 `t` 相邻的三角形
    pub fn neighbor_across(&self, key: EdgeKey, t: u32) -> Option<u32> {
        self.incident(key).iter().copied().find(|&other| other != t)
    }

    /// 是否为边界边
    #[inline]
    pub fn is_boundary(&self, key: EdgeKey) -> bool {
        self.incident(key).len() == 1
    }

    /// 字典序排列的唯一边
    pub fn sorted_keys(&self) -> Vec<EdgeKey> {
        let mut keys: Vec<EdgeKey> = self.map.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// 检查每条边恰好被 1 或 2 个三角形共享
    pub fn check_manifold(&self) -> MeshResult<()> {
        let mut bad: Vec<(EdgeKey, usize)> = self
            .map
            .iter()
            .filter(|(_, tris)| tris.len() > 2)
            .map(|(k, tris)| (*k, tris.len()))
            .collect();
        bad.sort_unstable();
        match bad.first() {
            Some(&(key, count)) => Err(MeshError::NonManifoldEdge {
                a: key.0,
                b: key.1,
                count,
            }),
            None => Ok(()),
        }
    }
}

/// 唯一边集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSet {
    /// 边 (a, b)，a < b，字典序
    pub edges: Vec<[u32; 2]>,
    /// 是否为边界边
    pub is_boundary: Vec<bool>,
}

impl EdgeSet {
    /// 从关联表生成（先做流形检查）
    pub fn from_map(map: &EdgeTriangleMap) -> MeshResult<Self> {
        map.check_manifold()?;
        let keys = map.sorted_keys();
        let is_boundary = keys.iter().map(|&k| map.is_boundary(k)).collect();
        let edges = keys.iter().map(EdgeKey::as_array).collect();
        Ok(Self { edges, is_boundary })
    }

    #[inline]
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// 边界边索引（升序）
    pub fn boundary_edge_indices(&self) -> Vec<usize> {
        self.is_boundary
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect()
    }

    /// 边界节点（升序去重）
    pub fn boundary_sites(&self) -> Vec<u32> {
        let mut sites: Vec<u32> = self
            .edges
            .iter()
            .zip(&self.is_boundary)
            .filter(|(_, b)| **b)
            .flat_map(|(e, _)| e.iter().copied())
            .collect();
        sites.sort_unstable();
        sites.dedup();
        sites
    }
}

/// 提取唯一边及其边界标记
///
/// 含重复顶点的三角形返回 [`MeshError::InvalidTopology`]。
pub fn get_edges(triangles: &[[u32; 3]]) -> MeshResult<EdgeSet> {
    check_distinct_vertices(triangles)?;
    EdgeSet::from_map(&EdgeTriangleMap::build(triangles))
}
