//! 边界合并
//!
//! 把两个相互重叠的闭合多边形合并为一条外边界（并集轮廓）。
//!
//! 步骤：
//! 1. 清理输入（去除重复顶点），统一为逆时针方向
//! 2. 求两条边界的所有交点（含共线重叠的端点），在容差内重合的点合并为同一节点
//! 3. 把交点按参数位置插入两条边界，得到由节点组成的环
//! 4. 将两个环切成片段，按片段中点相对另一多边形的位置取舍：
//!    外部保留，内部丢弃；同向共享的边保留一份，反向共享的边两份都丢弃
//! 5. 从保留的片段出发沿边界行走，回到起点时结束
//!
//! 不相交、只在孤立点接触、或重叠区域不连通时返回 `NoMerge`。

use crate::config::EngineConfig;
use crate::distance::{classify_point, PointLocation};
use crate::error::{GeomError, NoMergeReason, Result};
use crate::geometry::{signed_area, Shape, VertexLoop};
use crate::math::{cross, Point2, EPSILON};
use std::collections::{HashMap, HashSet};

/// 合并两个形状，每个形状必须恰好是一个闭合多边形
///
/// 结果沿用 `a` 的样式，容差取自 `config.epsilon`。
pub fn merge_shapes(a: &Shape, b: &Shape, config: &EngineConfig) -> Result<Shape> {
    let pa = single_polygon(a)?;
    let pb = single_polygon(b)?;
    let merged = merge_polygons_with_epsilon(pa, pb, config.epsilon)?;
    Ok(Shape {
        loops: vec![VertexLoop::new(merged, true)],
        style: a.style.clone(),
    })
}

fn single_polygon(shape: &Shape) -> Result<&[Point2]> {
    match shape.loops.as_slice() {
        [l] if l.closed && l.len() >= 3 => Ok(&l.points),
        _ => Err(GeomError::NoMerge(NoMergeReason::NotAPolygon)),
    }
}

/// 合并两个闭合多边形，返回并集外边界的顶点序列
///
/// 输出方向与 `a` 相同，并从 `a` 中第一个留在边界上的顶点开始。
pub fn merge_polygons(a: &[Point2], b: &[Point2]) -> Result<Vec<Point2>> {
    merge_polygons_with_epsilon(a, b, EPSILON)
}

/// 同 [`merge_polygons`]，`epsilon` 为相对坐标尺度的容差
pub fn merge_polygons_with_epsilon(a: &[Point2], b: &[Point2], epsilon: f64) -> Result<Vec<Point2>> {
    let tolerance = epsilon * coordinate_scale(a.iter().chain(b.iter()));

    let a_clean = clean_polygon(a, tolerance)?;
    let b_clean = clean_polygon(b, tolerance)?;
    let a_was_ccw = signed_area(&a_clean) > 0.0;

    let pa = counter_clockwise(a_clean.clone());
    let pb = counter_clockwise(b_clean.clone());

    let mut nodes = NodeSet::new(tolerance);
    let a_ids: Vec<usize> = pa.iter().map(|p| nodes.intern_vertex(*p)).collect();
    let b_ids: Vec<usize> = pb.iter().map(|p| nodes.intern_vertex(*p)).collect();

    // 交点插入
    let mut a_splits: Vec<Vec<(f64, usize)>> = vec![Vec::new(); pa.len()];
    let mut b_splits: Vec<Vec<(f64, usize)>> = vec![Vec::new(); pb.len()];

    for i in 0..pa.len() {
        let (a0, a1) = (pa[i], pa[(i + 1) % pa.len()]);
        for j in 0..pb.len() {
            let (b0, b1) = (pb[j], pb[(j + 1) % pb.len()]);
            for (t, u, p) in edge_intersections(a0, a1, b0, b1, tolerance) {
                let node = nodes.intern(p);
                a_splits[i].push((t, node));
                b_splits[j].push((u, node));
            }
        }
    }

    let ring_a = augmented_ring(&a_ids, a_splits);
    let ring_b = augmented_ring(&b_ids, b_splits);

    let pieces_a = ring_pieces(&ring_a);
    let pieces_b = ring_pieces(&ring_b);
    let set_a: HashSet<(usize, usize)> = pieces_a.iter().copied().collect();
    let set_b: HashSet<(usize, usize)> = pieces_b.iter().copied().collect();

    let mut overlap = false;
    let mut shared = false;
    let mut kept: Vec<(usize, usize)> = Vec::new();

    for &(u, v) in &pieces_a {
        match classify_point(&nodes.midpoint(u, v), &pb, tolerance) {
            PointLocation::Outside => kept.push((u, v)),
            PointLocation::Inside => overlap = true,
            PointLocation::OnBoundary => {
                if set_b.contains(&(u, v)) {
                    shared = true;
                    kept.push((u, v));
                } else if set_b.contains(&(v, u)) {
                    shared = true;
                } else {
                    kept.push((u, v));
                }
            }
        }
    }

    for &(u, v) in &pieces_b {
        match classify_point(&nodes.midpoint(u, v), &pa, tolerance) {
            PointLocation::Outside => kept.push((u, v)),
            PointLocation::Inside => overlap = true,
            PointLocation::OnBoundary => {
                if !set_a.contains(&(u, v)) && !set_a.contains(&(v, u)) {
                    kept.push((u, v));
                }
            }
        }
    }

    if !overlap && !shared {
        let ring_a_nodes: HashSet<usize> = ring_a.iter().copied().collect();
        let touching = ring_b.iter().any(|n| ring_a_nodes.contains(n));
        let reason = if touching {
            NoMergeReason::Touching
        } else {
            NoMergeReason::Disjoint
        };
        tracing::debug!("Boundary merge rejected: {}", reason);
        return Err(GeomError::NoMerge(reason));
    }

    let boundary = walk_boundary(&kept).inspect_err(|e| {
        tracing::debug!("Boundary merge rejected: {}", e);
    })?;

    let mut merged: Vec<Point2> = drop_collinear_crossings(&boundary, &nodes, tolerance)
        .into_iter()
        .map(|id| nodes.points[id])
        .collect();

    if !a_was_ccw {
        merged.reverse();
    }

    // 从 a（原顺序）中第一个出现在结果里的顶点开始；a 被完全包含时改用 b
    let start = a_clean
        .iter()
        .chain(b_clean.iter())
        .find_map(|p| merged.iter().position(|q| q == p));
    if let Some(start) = start {
        merged.rotate_left(start);
    }

    tracing::debug!(
        "Merged polygons with {} and {} vertices into {} vertices",
        a.len(),
        b.len(),
        merged.len()
    );
    Ok(merged)
}

/// 坐标尺度，用于把相对容差换算为绝对容差
fn coordinate_scale<'a>(points: impl Iterator<Item = &'a Point2>) -> f64 {
    points.fold(1.0_f64, |acc, p| acc.max(p.x.abs()).max(p.y.abs()))
}

/// 去除相邻重复顶点（含首尾），并检查是否仍是有面积的多边形
fn clean_polygon(points: &[Point2], tolerance: f64) -> Result<Vec<Point2>> {
    let mut cleaned: Vec<Point2> = Vec::with_capacity(points.len());
    for p in points {
        if cleaned.last().map_or(true, |q| (p - q).norm() > tolerance) {
            cleaned.push(*p);
        }
    }
    while cleaned.len() > 1 && (cleaned[0] - cleaned[cleaned.len() - 1]).norm() <= tolerance {
        cleaned.pop();
    }

    if cleaned.len() < 3 || signed_area(&cleaned).abs() <= tolerance {
        return Err(GeomError::NoMerge(NoMergeReason::NotAPolygon));
    }
    Ok(cleaned)
}

fn counter_clockwise(mut points: Vec<Point2>) -> Vec<Point2> {
    if signed_area(&points) < 0.0 {
        points.reverse();
    }
    points
}

/// 合并后的节点集合：容差内重合的点共用一个编号
struct NodeSet {
    points: Vec<Point2>,
    /// 是否为某个输入多边形的原始顶点
    input_vertex: Vec<bool>,
    tolerance: f64,
}

impl NodeSet {
    fn new(tolerance: f64) -> Self {
        Self {
            points: Vec::new(),
            input_vertex: Vec::new(),
            tolerance,
        }
    }

    fn intern(&mut self, p: Point2) -> usize {
        if let Some(id) = self
            .points
            .iter()
            .position(|q| (p - q).norm() <= self.tolerance)
        {
            return id;
        }
        self.points.push(p);
        self.input_vertex.push(false);
        self.points.len() - 1
    }

    fn intern_vertex(&mut self, p: Point2) -> usize {
        let id = self.intern(p);
        self.input_vertex[id] = true;
        id
    }

    fn midpoint(&self, u: usize, v: usize) -> Point2 {
        nalgebra::center(&self.points[u], &self.points[v])
    }
}

/// 边 a0→a1 与边 b0→b1 的交点，返回 (a 上参数, b 上参数, 交点)
///
/// 共线重叠时返回重叠区间的端点。
fn edge_intersections(
    a0: Point2,
    a1: Point2,
    b0: Point2,
    b1: Point2,
    tolerance: f64,
) -> Vec<(f64, f64, Point2)> {
    let d1 = a1 - a0;
    let d2 = b1 - b0;
    let len1 = d1.norm();
    let len2 = d2.norm();
    let r = b0 - a0;
    let det = cross(&d1, &d2);

    let ta = tolerance / len1;
    let tb = tolerance / len2;
    let in_range = |s: f64, slack: f64| s >= -slack && s <= 1.0 + slack;

    if det.abs() > EPSILON * len1 * len2 {
        let t = cross(&r, &d2) / det;
        let u = cross(&r, &d1) / det;
        if in_range(t, ta) && in_range(u, tb) {
            let t = t.clamp(0.0, 1.0);
            return vec![(t, u.clamp(0.0, 1.0), a0 + d1 * t)];
        }
        return Vec::new();
    }

    // 平行：只有共线时才可能重叠
    if cross(&r, &d1).abs() / len1 > tolerance {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for (p, u) in [(b0, 0.0), (b1, 1.0)] {
        let t = (p - a0).dot(&d1) / (len1 * len1);
        if in_range(t, ta) {
            hits.push((t.clamp(0.0, 1.0), u, p));
        }
    }
    for (p, t) in [(a0, 0.0), (a1, 1.0)] {
        let u = (p - b0).dot(&d2) / (len2 * len2);
        if in_range(u, tb) {
            hits.push((t, u.clamp(0.0, 1.0), p));
        }
    }
    hits
}

/// 在顶点环中按参数顺序插入交点节点，并去掉相邻重复节点
fn augmented_ring(vertex_ids: &[usize], splits: Vec<Vec<(f64, usize)>>) -> Vec<usize> {
    let mut ring: Vec<usize> = Vec::new();

    for (i, mut edge_splits) in splits.into_iter().enumerate() {
        edge_splits.sort_by(|x, y| x.0.total_cmp(&y.0));
        let start = vertex_ids[i];
        if ring.last() != Some(&start) {
            ring.push(start);
        }
        for (_, node) in edge_splits {
            if ring.last() != Some(&node) {
                ring.push(node);
            }
        }
    }

    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// 环上相邻节点组成的有向片段
fn ring_pieces(ring: &[usize]) -> Vec<(usize, usize)> {
    let n = ring.len();
    (0..n)
        .map(|k| (ring[k], ring[(k + 1) % n]))
        .filter(|(u, v)| u != v)
        .collect()
}

/// 沿保留的片段行走，要求恰好构成一个简单环
fn walk_boundary(kept: &[(usize, usize)]) -> Result<Vec<usize>> {
    let multiple = || GeomError::NoMerge(NoMergeReason::MultipleRegions);

    let mut outgoing: HashMap<usize, usize> = HashMap::with_capacity(kept.len());
    for &(u, v) in kept {
        // 同一节点有多条出边说明边界不是单一简单环
        if outgoing.insert(u, v).is_some() {
            return Err(multiple());
        }
    }

    let &(start, _) = kept.first().ok_or_else(multiple)?;
    let mut boundary = vec![start];
    let mut current = start;

    loop {
        let next = *outgoing.get(&current).ok_or_else(multiple)?;
        if next == start {
            break;
        }
        if boundary.len() >= kept.len() {
            return Err(multiple());
        }
        boundary.push(next);
        current = next;
    }

    if boundary.len() != kept.len() {
        return Err(multiple());
    }
    Ok(boundary)
}

/// 去掉落在直线中间、且不是任何输入顶点的交点节点
fn drop_collinear_crossings(boundary: &[usize], nodes: &NodeSet, tolerance: f64) -> Vec<usize> {
    let n = boundary.len();
    boundary
        .iter()
        .enumerate()
        .filter(|&(k, &id)| {
            if nodes.input_vertex[id] {
                return true;
            }
            let prev = nodes.points[boundary[(k + n - 1) % n]];
            let next = nodes.points[boundary[(k + 1) % n]];
            let here = nodes.points[id];
            let v1 = here - prev;
            let v2 = next - here;
            cross(&v1, &v2).abs() > tolerance * (v1.norm() + v2.norm())
        })
        .map(|(_, &id)| id)
        .collect()
}
