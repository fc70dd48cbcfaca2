//! 几何图元定义
//!
//! 支持的基本图元：
//! - 线段 (Segment)
//! - 带距离的线段 (SegmentDistance)，用于显示两个形状之间的差异
//! - 顶点环 (VertexLoop)，闭合的多边形或开放的折线
//! - 形状 (Shape)，一个或多个顶点环加上显示属性

use crate::config::EngineConfig;
use crate::math::{lex_cmp, BoundingBox2, Point2, Vector2};
use crate::transform::AffineTransform;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 线段
///
/// 零长度线段是合法的，表示退化的边。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub begin: Point2,
    pub end: Point2,
}

impl Segment {
    pub fn new(begin: Point2, end: Point2) -> Self {
        Self { begin, end }
    }

    /// 退化线段（起点终点重合）
    pub fn degenerate(point: Point2) -> Self {
        Self::new(point, point)
    }

    /// 方向向量（未归一化）
    pub fn vector(&self) -> Vector2 {
        self.end - self.begin
    }

    pub fn length(&self) -> f64 {
        self.vector().norm()
    }

    pub fn length_squared(&self) -> f64 {
        self.vector().norm_squared()
    }

    pub fn is_degenerate(&self) -> bool {
        self.begin == self.end
    }

    pub fn midpoint(&self) -> Point2 {
        self.point_at(0.5)
    }

    /// 参数 t 处的点，t=0 为起点，t=1 为终点
    pub fn point_at(&self, t: f64) -> Point2 {
        self.begin + self.vector() * t
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.end, self.begin)
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::from_points([self.begin, self.end])
    }
}

/// 带距离值的线段
///
/// 通常连接两个形状上最近的一对点，`distance` 即二者的距离。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentDistance {
    pub segment: Segment,
    pub distance: f64,
}

impl SegmentDistance {
    pub fn new(segment: Segment, distance: f64) -> Self {
        Self { segment, distance }
    }

    /// 由两个端点构造，距离取两点间的欧氏距离
    pub fn between(begin: Point2, end: Point2) -> Self {
        Self::new(Segment::new(begin, end), (end - begin).norm())
    }

    /// 显示顺序：距离升序；距离相同时按起点字典序降序
    ///
    /// 起点也相同时按终点字典序升序，使全序与候选边的遍历顺序无关。
    pub fn display_cmp(&self, other: &SegmentDistance) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| lex_cmp(&other.segment.begin, &self.segment.begin))
            .then_with(|| lex_cmp(&self.segment.end, &other.segment.end))
    }
}

/// 按显示顺序原地排序
pub fn sort_for_display(records: &mut [SegmentDistance]) {
    records.sort_by(SegmentDistance::display_cmp);
}

/// 顶点环
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexLoop {
    pub points: Vec<Point2>,
    /// 是否闭合（闭合时包含最后一个顶点到第一个顶点的边）
    pub closed: bool,
}

impl VertexLoop {
    pub fn new(points: Vec<Point2>, closed: bool) -> Self {
        Self { points, closed }
    }

    pub fn closed(points: impl IntoIterator<Item = Point2>) -> Self {
        Self::new(points.into_iter().collect(), true)
    }

    pub fn open(points: impl IntoIterator<Item = Point2>) -> Self {
        Self::new(points.into_iter().collect(), false)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 边数量
    ///
    /// 单顶点的环视为一条零长度边。
    pub fn edge_count(&self) -> usize {
        match self.points.len() {
            0 => 0,
            1 => 1,
            n if self.closed => n,
            n => n - 1,
        }
    }

    /// 第 i 条边
    pub fn edge(&self, i: usize) -> Segment {
        let n = self.points.len();
        if n == 1 {
            return Segment::degenerate(self.points[0]);
        }
        Segment::new(self.points[i], self.points[(i + 1) % n])
    }

    pub fn edges(&self) -> impl Iterator<Item = Segment> + '_ {
        (0..self.edge_count()).map(move |i| self.edge(i))
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::from_points(self.points.iter().copied())
    }

    /// 有向面积，逆时针为正
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.points)
    }

    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self::new(points, self.closed)
    }
}

/// 多边形有向面积（鞋带公式），逆时针为正
pub fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let p = &points[i];
        let q = &points[(i + 1) % n];
        area += p.x * q.y - q.x * p.y;
    }
    area / 2.0
}

/// 形状的显示属性（几何算法不使用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub color: String,
    pub layer: String,
    pub line_width: f64,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            color: "yellow".to_string(),
            layer: String::new(),
            line_width: 1.0,
        }
    }
}

/// 形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub loops: Vec<VertexLoop>,
    pub style: ShapeStyle,
}

impl Shape {
    pub fn new(loops: Vec<VertexLoop>) -> Self {
        Self {
            loops,
            style: ShapeStyle::default(),
        }
    }

    /// 使用配置中的默认样式创建
    pub fn with_config(loops: Vec<VertexLoop>, config: &EngineConfig) -> Self {
        Self {
            loops,
            style: config.default_style.clone(),
        }
    }

    /// 单个闭合环构成的多边形
    pub fn polygon(points: impl IntoIterator<Item = Point2>) -> Self {
        Self::new(vec![VertexLoop::closed(points)])
    }

    /// 单个开放环构成的折线
    pub fn polyline(points: impl IntoIterator<Item = Point2>) -> Self {
        Self::new(vec![VertexLoop::open(points)])
    }

    pub fn with_style(mut self, style: ShapeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.loops.iter().map(VertexLoop::len).sum()
    }

    pub fn edge_count(&self) -> usize {
        self.loops.iter().map(VertexLoop::edge_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    pub fn vertices(&self) -> impl Iterator<Item = Point2> + '_ {
        self.loops.iter().flat_map(|l| l.points.iter().copied())
    }

    /// 所有环的所有边（闭合边仅在环闭合时包含）
    pub fn edges(&self) -> impl Iterator<Item = Segment> + '_ {
        self.loops.iter().flat_map(VertexLoop::edges)
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::from_points(self.vertices())
    }

    /// 逐顶点映射，返回新形状
    pub fn map_points(&self, f: impl Fn(&Point2) -> Point2) -> Shape {
        Shape {
            loops: self
                .loops
                .iter()
                .map(|l| VertexLoop::new(l.points.iter().map(&f).collect(), l.closed))
                .collect(),
            style: self.style.clone(),
        }
    }

    pub fn transformed(&self, transform: &AffineTransform) -> Shape {
        self.map_points(|p| transform.apply(p))
    }

    pub fn translated(&self, offset: Vector2) -> Shape {
        self.map_points(|p| p + offset)
    }

    /// 反转每个环的顶点顺序
    pub fn reversed(&self) -> Shape {
        Shape {
            loops: self.loops.iter().map(VertexLoop::reversed).collect(),
            style: self.style.clone(),
        }
    }
}

/// 形状集合的包围盒；集合为空时返回无效包围盒
pub fn bounding_box_of(shapes: &[Shape]) -> BoundingBox2 {
    shapes
        .iter()
        .fold(BoundingBox2::empty(), |acc, s| acc.union(&s.bounding_box()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::EPSILON;

    fn unit_square() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_loop_edges_respect_closed_flag() {
        let closed = VertexLoop::closed(unit_square());
        let open = VertexLoop::open(unit_square());
        assert_eq!(closed.edges().count(), 4);
        assert_eq!(open.edges().count(), 3);

        let last = closed.edge(3);
        assert_eq!(last.begin, Point2::new(0.0, 1.0));
        assert_eq!(last.end, Point2::new(0.0, 0.0));
    }

    #[test]
    fn test_single_vertex_loop_is_degenerate_edge() {
        let lone = VertexLoop::open([Point2::new(2.0, 3.0)]);
        let edges: Vec<_> = lone.edges().collect();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_degenerate());
        assert_eq!(edges[0].length(), 0.0);
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = VertexLoop::closed(unit_square());
        assert!((ccw.signed_area() - 1.0).abs() < EPSILON);
        assert!((ccw.reversed().signed_area() + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_display_order() {
        let mut records = vec![
            SegmentDistance::new(Segment::degenerate(Point2::new(0.0, 0.0)), 2.0),
            SegmentDistance::new(Segment::degenerate(Point2::new(1.0, 0.0)), 1.0),
            SegmentDistance::new(Segment::degenerate(Point2::new(3.0, 0.0)), 1.0),
            SegmentDistance::new(Segment::degenerate(Point2::new(3.0, 5.0)), 1.0),
        ];
        sort_for_display(&mut records);

        let begins: Vec<_> = records.iter().map(|r| r.segment.begin).collect();
        assert_eq!(
            begins,
            vec![
                Point2::new(3.0, 5.0),
                Point2::new(3.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(0.0, 0.0),
            ]
        );

        // 距离和起点都相同时按终点升序
        let begin = Point2::new(0.0, 0.0);
        let mut ties = vec![
            SegmentDistance::new(Segment::new(begin, Point2::new(0.0, 1.0)), 1.0),
            SegmentDistance::new(Segment::new(begin, Point2::new(-1.0, 0.0)), 1.0),
            SegmentDistance::new(Segment::new(begin, Point2::new(0.0, -1.0)), 1.0),
        ];
        sort_for_display(&mut ties);
        let ends: Vec<_> = ties.iter().map(|r| r.segment.end).collect();
        assert_eq!(
            ends,
            vec![Point2::new(-1.0, 0.0), Point2::new(0.0, -1.0), Point2::new(0.0, 1.0)]
        );
    }

    #[test]
    fn test_shape_bounding_box_and_style() {
        let config = EngineConfig {
            default_style: ShapeStyle {
                color: "red".into(),
                ..ShapeStyle::default()
            },
            ..EngineConfig::default()
        };
        let shape = Shape::with_config(vec![VertexLoop::closed(unit_square())], &config);
        assert_eq!(shape.style.color, "red");
        assert_eq!(
            shape.bounding_box(),
            BoundingBox2::from_bounds(0.0, 0.0, 1.0, 1.0)
        );

        let moved = shape.translated(Vector2::new(2.0, 0.0));
        let bbox = bounding_box_of(&[shape, moved]);
        assert_eq!(bbox, BoundingBox2::from_bounds(0.0, 0.0, 3.0, 1.0));
        assert!(!bounding_box_of(&[]).is_valid());
    }
}
