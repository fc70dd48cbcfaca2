//! 距离原语
//!
//! - 点到线段的最近点与距离
//! - 线段到线段的最近点对
//! - 点与多边形的位置关系
//! - 在形状集合中查找最近顶点、最近边

use crate::geometry::{Segment, SegmentDistance, Shape};
use crate::math::{cross, Point2, EPSILON};

/// 点到线段的最近点及距离
///
/// 投影参数被限制在 [0, 1]；零长度线段的最近点就是其唯一端点。
pub fn point_to_segment(point: &Point2, segment: &Segment) -> (Point2, f64) {
    let v = segment.vector();
    let len_sq = v.norm_squared();

    let t = if len_sq > 0.0 {
        ((point - segment.begin).dot(&v) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let closest = segment.point_at(t);
    (closest, (point - closest).norm())
}

/// 两条线段之间的最近点对 (A 上的点, B 上的点)
///
/// 先求两条支撑直线的交点参数；若两参数都落在 [0, 1] 内则线段相交，
/// 距离为 0。否则最小距离必然出现在某个端点处，取限制参数后的候选点对
/// 与四个"端点到线段"候选中的最小者。平行（含零长度）时只比较端点候选。
pub fn segment_to_segment(a: &Segment, b: &Segment) -> (Point2, Point2) {
    let d1 = a.vector();
    let d2 = b.vector();
    let det = cross(&d1, &d2);

    let mut best: Option<(Point2, Point2, f64)> = None;
    let mut consider = |pa: Point2, pb: Point2| {
        let dist = (pa - pb).norm();
        if best.map_or(true, |(_, _, d)| dist < d) {
            best = Some((pa, pb, dist));
        }
    };

    if det.abs() > EPSILON * d1.norm() * d2.norm() {
        let r = b.begin - a.begin;
        let t = cross(&r, &d2) / det;
        let u = cross(&r, &d1) / det;

        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            let hit = a.point_at(t);
            return (hit, hit);
        }
        consider(a.point_at(t.clamp(0.0, 1.0)), b.point_at(u.clamp(0.0, 1.0)));
    }

    for endpoint in [a.begin, a.end] {
        let (on_b, _) = point_to_segment(&endpoint, b);
        consider(endpoint, on_b);
    }
    for endpoint in [b.begin, b.end] {
        let (on_a, _) = point_to_segment(&endpoint, a);
        consider(on_a, endpoint);
    }

    match best {
        Some((pa, pb, _)) => (pa, pb),
        // 不可达：端点候选总会写入
        None => (a.begin, b.begin),
    }
}

/// 两条线段之间的最小距离
pub fn segment_distance(a: &Segment, b: &Segment) -> f64 {
    let (pa, pb) = segment_to_segment(a, b);
    (pa - pb).norm()
}

/// 两条线段的最近点对，作为带距离的线段（起点在 A 上）
pub fn segment_distance_record(a: &Segment, b: &Segment) -> SegmentDistance {
    let (pa, pb) = segment_to_segment(a, b);
    SegmentDistance::between(pa, pb)
}

/// 点相对多边形的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLocation {
    Inside,
    Outside,
    OnBoundary,
}

/// 判断点在多边形（闭合顶点序列）内部、外部还是边上
pub fn classify_point(point: &Point2, polygon: &[Point2], tolerance: f64) -> PointLocation {
    let n = polygon.len();
    if n == 0 {
        return PointLocation::Outside;
    }

    for i in 0..n {
        let edge = Segment::new(polygon[i], polygon[(i + 1) % n]);
        if point_to_segment(point, &edge).1 <= tolerance {
            return PointLocation::OnBoundary;
        }
    }

    if n < 3 {
        return PointLocation::Outside;
    }

    // 射线法
    let mut inside = false;
    for i in 0..n {
        let p = &polygon[i];
        let q = &polygon[(i + 1) % n];
        if (p.y > point.y) != (q.y > point.y) {
            let x = p.x + (point.y - p.y) * (q.x - p.x) / (q.y - p.y);
            if point.x < x {
                inside = !inside;
            }
        }
    }

    if inside {
        PointLocation::Inside
    } else {
        PointLocation::Outside
    }
}

/// 点在多边形内部或边上
pub fn point_in_polygon_or_on_edges(point: &Point2, polygon: &[Point2], tolerance: f64) -> bool {
    classify_point(point, polygon, tolerance) != PointLocation::Outside
}

/// 最近顶点查询结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexHit {
    pub shape_index: usize,
    pub loop_index: usize,
    pub vertex_index: usize,
    pub point: Point2,
    pub distance: f64,
}

/// 在形状集合中查找离 `point` 最近的顶点
pub fn closest_vertex(point: &Point2, shapes: &[Shape]) -> Option<VertexHit> {
    let mut best: Option<VertexHit> = None;

    for (shape_index, shape) in shapes.iter().enumerate() {
        for (loop_index, vertex_loop) in shape.loops.iter().enumerate() {
            for (vertex_index, vertex) in vertex_loop.points.iter().enumerate() {
                let distance = (vertex - point).norm();
                if best.map_or(true, |b| distance < b.distance) {
                    best = Some(VertexHit {
                        shape_index,
                        loop_index,
                        vertex_index,
                        point: *vertex,
                        distance,
                    });
                }
            }
        }
    }

    best
}

/// 最近边查询结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeHit {
    pub shape_index: usize,
    pub loop_index: usize,
    /// 边的起点在环中的索引
    pub edge_index: usize,
    pub segment: Segment,
    /// 边上离查询点最近的点
    pub foot: Point2,
    pub distance: f64,
}

/// 在形状集合中查找离 `point` 最近的边
pub fn closest_edge(point: &Point2, shapes: &[Shape]) -> Option<EdgeHit> {
    let mut best: Option<EdgeHit> = None;

    for (shape_index, shape) in shapes.iter().enumerate() {
        for (loop_index, vertex_loop) in shape.loops.iter().enumerate() {
            for (edge_index, segment) in vertex_loop.edges().enumerate() {
                let (foot, distance) = point_to_segment(point, &segment);
                if best.map_or(true, |b| distance < b.distance) {
                    best = Some(EdgeHit {
                        shape_index,
                        loop_index,
                        edge_index,
                        segment,
                        foot,
                        distance,
                    });
                }
            }
        }
    }

    best
}
