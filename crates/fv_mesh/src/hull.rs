// crates/fv_mesh/src/hull.rs
//! 二维凸包
//!
//! Andrew 单调链算法。求凸包前先合并重合点（相对点集尺度的阈值），
//! 使得共享外心（如正方形两个直角三角形的外心）只计一次。

use glam::DVec2;

use crate::geometry::shoelace_area;

/// 合并重合点
///
/// 两点距离不超过 `tolerance × 点集包围盒尺度` 时视为同一点，保留先出现者。
pub fn merge_coincident(points: &[DVec2], tolerance: f64) -> Vec<DVec2> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let (lo, hi) = points
        .iter()
        .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    let extent = (hi - lo).max_element();
    let radius = tolerance * extent;

    let mut unique: Vec<DVec2> = Vec::with_capacity(points.len());
    for &p in points {
        if !unique.iter().any(|q| q.distance(p) <= radius) {
            unique.push(p);
        }
    }
    unique
}

/// 凸包顶点索引（逆时针，不含共线点）
///
/// 点数少于 3 时原样返回全部索引；全部共线时返回两个端点。
pub fn convex_hull(points: &[DVec2]) -> Vec<usize> {
    let n = points.len();
    let mut order: Vec<usize> = (0..n).collect();
    if n < 3 {
        return order;
    }
    order.sort_by(|&i, &j| {
        points[i]
            .x
            .total_cmp(&points[j].x)
            .then(points[i].y.total_cmp(&points[j].y))
    });

    let turn = |o: usize, a: usize, b: usize| (points[a] - points[o]).perp_dot(points[b] - points[o]);

    let mut lower: Vec<usize> = Vec::with_capacity(n);
    for &i in &order {
        while lower.len() >= 2 && turn(lower[lower.len() - 2], lower[lower.len() - 1], i) <= 0.0 {
            lower.pop();
        }
        lower.push(i);
    }

    let mut upper: Vec<usize> = Vec::with_capacity(n);
    for &i in order.iter().rev() {
        while upper.len() >= 2 && turn(upper[upper.len() - 2], upper[upper.len() - 1], i) <= 0.0 {
            upper.pop();
        }
        upper.push(i);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// 凸包面积及"点集是否全部为凸包顶点"
///
/// 合并重合点后求凸包。点数不足或全部共线时返回 `(0.0, true)`。
pub fn convex_polygon_area(points: &[DVec2], merge_tolerance: f64) -> (f64, bool) {
    let unique = merge_coincident(points, merge_tolerance);
    if unique.len() < 3 {
        return (0.0, true);
    }
    let hull = convex_hull(&unique);
    if hull.len() < 3 {
        return (0.0, true);
    }
    let polygon: Vec<DVec2> = hull.iter().map(|&i| unique[i]).collect();
    (shoelace_area(&polygon).abs(), hull.len() == unique.len())
}
