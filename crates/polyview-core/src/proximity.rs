//! 形状距离引擎
//!
//! 计算两个形状之间的差异，结果是一组按显示顺序排列的 `SegmentDistance`：
//! - 边到边：A 的每条边与 B 中候选边之间的精确距离
//! - 顶点到形状：A 的每个顶点到 B 上最近点
//! - 顶点到顶点：A 的每个顶点到 B 的最近顶点
//!
//! 索引模式在 B 的边上建立空间索引，以逐步扩大的窗口查询候选边，
//! 只对候选边计算精确距离；暴力模式对所有边对计算，用于交叉验证和小输入。

use crate::config::EngineConfig;
use crate::distance::{point_to_segment, segment_distance_record};
use crate::error::{GeomError, Result};
use crate::geometry::{sort_for_display, Segment, SegmentDistance, Shape};
use crate::math::{lex_cmp, BoundingBox2, Point2, EPSILON};
use crate::spatial::{IndexEntry, SpatialIndex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// 查询模式（由调用方选择，不自动切换）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProximityMode {
    /// 空间索引剪枝
    #[default]
    Indexed,
    /// 所有边对
    BruteForce,
}

/// 单个固定形状的边及其空间索引
///
/// 对同一个形状重复查询时可复用，避免每次重建索引。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeIndex {
    edges: Vec<Segment>,
    index: SpatialIndex,
    /// 初始搜索半径
    initial_radius: f64,
}

impl ShapeIndex {
    pub fn new(shape: &Shape) -> Result<Self> {
        if shape.is_empty() {
            return Err(GeomError::EmptyShape);
        }
        let edges: Vec<Segment> = shape.edges().collect();
        let index = SpatialIndex::from_entries(
            edges
                .iter()
                .enumerate()
                .map(|(id, e)| IndexEntry::new(id, e.bounding_box())),
        );

        let diagonal = index.bounding_box().diagonal();
        let initial_radius = (diagonal / (edges.len() as f64).sqrt()).max(EPSILON);

        tracing::debug!(
            "Built shape index: {} edges, {} nodes, initial radius {:.3e}",
            edges.len(),
            index.node_count(),
            initial_radius
        );

        Ok(Self {
            edges,
            index,
            initial_radius,
        })
    }

    pub fn edges(&self) -> &[Segment] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 以逐步扩大的窗口查找候选边
    ///
    /// `query` 是查询图元的包围盒，`exact` 计算到候选边的精确距离记录。
    /// 窗口 = `query` 四周扩展 `radius`；若窗口内没有候选则半径加倍，
    /// 若候选中的最小距离超过半径则以该距离为半径重查，
    /// 保证返回的集合包含所有距离不超过最小距离的边。
    fn search_window(
        &self,
        query: &BoundingBox2,
        start_radius: f64,
        mut exact: impl FnMut(&Segment) -> SegmentDistance,
    ) -> Vec<SegmentDistance> {
        if self.index.is_empty() || !query.is_valid() {
            return Vec::new();
        }

        let mut radius = if start_radius.is_finite() && start_radius >= 0.0 {
            start_radius
        } else {
            self.initial_radius
        };

        loop {
            let window = query.expanded(radius);
            let mut records = Vec::new();
            self.index
                .visit_intersecting(&window, |entry| records.push(exact(&self.edges[entry.id])));

            let best = records
                .iter()
                .map(|r| r.distance)
                .min_by(|a, b| a.total_cmp(b));

            match best {
                Some(d) if d <= radius => return records,
                Some(d) => radius = d,
                None => {
                    radius = if radius > 0.0 {
                        radius * 2.0
                    } else {
                        self.initial_radius
                    };
                }
            }

            if !radius.is_finite() {
                tracing::warn!("Proximity window diverged, query box {:?}", query);
                return Vec::new();
            }
            tracing::trace!("Expanding proximity window to {:.3e}", radius);
        }
    }

    /// `segment` 到本形状各候选边的距离记录（起点在 `segment` 上）
    pub fn candidates_for_segment(&self, segment: &Segment, start_radius: f64) -> Vec<SegmentDistance> {
        self.search_window(&segment.bounding_box(), start_radius, |edge| {
            segment_distance_record(segment, edge)
        })
    }

    /// 本形状上离 `point` 最近的点，返回从 `point` 指向该点的记录
    pub fn nearest_to_point(&self, point: &Point2, start_radius: f64) -> Option<SegmentDistance> {
        let bbox = BoundingBox2::new(*point, *point);
        self.search_window(&bbox, start_radius, |edge| {
            let (foot, distance) = point_to_segment(point, edge);
            SegmentDistance::new(Segment::new(*point, foot), distance)
        })
        .into_iter()
        .min_by(SegmentDistance::display_cmp)
    }

    /// `shape` 的每条边到本形状的边到边距离
    ///
    /// `hint` 为调用方给出的当前全局最小距离，用作初始窗口半径。
    pub fn edge_distances_from(&self, shape: &Shape, hint: Option<f64>) -> Result<Vec<SegmentDistance>> {
        if shape.is_empty() {
            return Err(GeomError::EmptyShape);
        }

        let mut global_best = hint.unwrap_or(self.initial_radius);
        let mut records = Vec::new();

        for edge in shape.edges() {
            let candidates = self.candidates_for_segment(&edge, global_best);
            if let Some(d) = candidates.iter().map(|r| r.distance).min_by(|a, b| a.total_cmp(b)) {
                global_best = global_best.min(d);
            }
            records.extend(candidates);
        }

        sort_for_display(&mut records);
        tracing::debug!(
            "Indexed edge proximity: {} records, min distance {:?}",
            records.len(),
            records.first().map(|r| r.distance)
        );
        Ok(records)
    }

    /// `shape` 的每个顶点到本形状上最近点
    pub fn vertex_distances_from(&self, shape: &Shape, hint: Option<f64>) -> Result<Vec<SegmentDistance>> {
        if shape.is_empty() {
            return Err(GeomError::EmptyShape);
        }

        let mut global_best = hint.unwrap_or(self.initial_radius);
        let mut records = Vec::with_capacity(shape.vertex_count());

        for vertex in shape.vertices() {
            if let Some(record) = self.nearest_to_point(&vertex, global_best) {
                global_best = global_best.min(record.distance);
                records.push(record);
            }
        }

        sort_for_display(&mut records);
        Ok(records)
    }
}

/// 距离查询参数
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProximityQuery {
    pub mode: ProximityMode,
    /// 调用方已知的全局最小距离，用于限定索引搜索的初始窗口
    pub best_distance_hint: Option<f64>,
}

impl ProximityQuery {
    pub fn new(mode: ProximityMode) -> Self {
        Self {
            mode,
            best_distance_hint: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.proximity_mode)
    }

    pub fn with_hint(mut self, best_distance: f64) -> Self {
        self.best_distance_hint = Some(best_distance);
        self
    }

    /// A 与 B 的边到边距离记录，按显示顺序排列
    pub fn edge_distances(&self, a: &Shape, b: &Shape) -> Result<Vec<SegmentDistance>> {
        if a.is_empty() || b.is_empty() {
            return Err(GeomError::EmptyShape);
        }
        match self.mode {
            ProximityMode::Indexed => ShapeIndex::new(b)?.edge_distances_from(a, self.best_distance_hint),
            ProximityMode::BruteForce => Ok(edge_distances_brute_force(a, b)),
        }
    }

    /// A 与 B 之间全局最近的一对点
    pub fn closest_pair(&self, a: &Shape, b: &Shape) -> Result<SegmentDistance> {
        self.edge_distances(a, b)?
            .into_iter()
            .next()
            .ok_or(GeomError::EmptyShape)
    }

    /// A 的每个顶点到 B 上最近点的记录，按显示顺序排列
    pub fn vertex_distances(&self, a: &Shape, b: &Shape) -> Result<Vec<SegmentDistance>> {
        if a.is_empty() || b.is_empty() {
            return Err(GeomError::EmptyShape);
        }
        match self.mode {
            ProximityMode::Indexed => ShapeIndex::new(b)?.vertex_distances_from(a, self.best_distance_hint),
            ProximityMode::BruteForce => Ok(vertex_distances_brute_force(a, b)),
        }
    }
}

/// 暴力模式：A × B 所有边对
pub fn edge_distances_brute_force(a: &Shape, b: &Shape) -> Vec<SegmentDistance> {
    let b_edges: Vec<Segment> = b.edges().collect();
    let mut records = Vec::with_capacity(a.edge_count() * b_edges.len());

    for edge_a in a.edges() {
        for edge_b in &b_edges {
            records.push(segment_distance_record(&edge_a, edge_b));
        }
    }

    sort_for_display(&mut records);
    records
}

/// 暴力模式：A 的每个顶点到 B 的所有边
pub fn vertex_distances_brute_force(a: &Shape, b: &Shape) -> Vec<SegmentDistance> {
    let b_edges: Vec<Segment> = b.edges().collect();
    let mut records: Vec<SegmentDistance> = a
        .vertices()
        .filter_map(|vertex| {
            b_edges
                .iter()
                .map(|edge| {
                    let (foot, distance) = point_to_segment(&vertex, edge);
                    SegmentDistance::new(Segment::new(vertex, foot), distance)
                })
                .min_by(SegmentDistance::display_cmp)
        })
        .collect();

    sort_for_display(&mut records);
    records
}

/// A 的每个顶点到 B 的最近顶点，按显示顺序排列
pub fn vertex_to_vertex_distances(a: &Shape, b: &Shape) -> Result<Vec<SegmentDistance>> {
    if a.is_empty() || b.is_empty() {
        return Err(GeomError::EmptyShape);
    }

    let mut records: Vec<SegmentDistance> = a
        .vertices()
        .filter_map(|va| {
            b.vertices()
                .map(|vb| SegmentDistance::between(va, vb))
                .min_by(|x, y| x.distance.total_cmp(&y.distance))
        })
        .collect();

    sort_for_display(&mut records);
    Ok(records)
}

/// 按字典序比较的点，用作有序容器的键
#[derive(Debug, Clone, Copy)]
struct LexPoint(Point2);

impl LexPoint {
    fn new(p: Point2) -> Self {
        // 统一 -0.0 与 0.0
        Self(Point2::new(p.x + 0.0, p.y + 0.0))
    }
}

impl PartialEq for LexPoint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LexPoint {}

impl PartialOrd for LexPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LexPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        lex_cmp(&self.0, &other.0)
    }
}

/// 顶点差异（多重集语义，坐标精确比较）
///
/// 返回 (P 中有而 Q 中没有的顶点, Q 中有而 P 中没有的顶点)，各自保持原顺序。
pub fn vertex_diff(p: &Shape, q: &Shape) -> (Vec<Point2>, Vec<Point2>) {
    fn only_in(from: &Shape, other: &Shape) -> Vec<Point2> {
        let mut counts: BTreeMap<LexPoint, usize> = BTreeMap::new();
        for v in other.vertices() {
            *counts.entry(LexPoint::new(v)).or_default() += 1;
        }

        let mut result = Vec::new();
        for v in from.vertices() {
            match counts.get_mut(&LexPoint::new(v)) {
                Some(count) if *count > 0 => *count -= 1,
                _ => result.push(v),
            }
        }
        result
    }

    (only_in(p, q), only_in(q, p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::VertexLoop;

    fn square(x: f64, y: f64, size: f64) -> Shape {
        Shape::polygon([
            Point2::new(x, y),
            Point2::new(x + size, y),
            Point2::new(x + size, y + size),
            Point2::new(x, y + size),
        ])
    }

    #[test]
    fn test_disjoint_unit_squares() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(2.0, 0.0, 1.0);

        for mode in [ProximityMode::Indexed, ProximityMode::BruteForce] {
            let best = ProximityQuery::new(mode).closest_pair(&a, &b).unwrap();
            assert!((best.distance - 1.0).abs() < 1e-12, "{mode:?}");
            // 第一个正方形的右边到第二个正方形的左边
            assert_eq!(best.segment.begin.x, 1.0);
            assert_eq!(best.segment.end.x, 2.0);
            assert_eq!(best.segment.begin.y, best.segment.end.y);
        }
    }

    #[test]
    fn test_modes_agree_on_first_record() {
        let a = Shape::polygon([
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 1.0),
            Point2::new(3.0, 5.0),
            Point2::new(1.5, 2.0),
            Point2::new(-1.0, 4.0),
        ]);
        let b = Shape::polygon([
            Point2::new(6.0, 3.0),
            Point2::new(9.0, 0.5),
            Point2::new(8.0, 7.0),
            Point2::new(5.0, 6.0),
        ]);

        let indexed = ProximityQuery::new(ProximityMode::Indexed)
            .edge_distances(&a, &b)
            .unwrap();
        let brute = ProximityQuery::new(ProximityMode::BruteForce)
            .edge_distances(&a, &b)
            .unwrap();

        assert!(indexed.len() <= brute.len());
        assert_eq!(brute.len(), 20);
        assert!((indexed[0].distance - brute[0].distance).abs() < 1e-12);
        assert_eq!(indexed[0].segment, brute[0].segment);
    }

    #[test]
    fn test_hint_does_not_change_result() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(10.0, 5.0, 2.0);
        let plain = ProximityQuery::new(ProximityMode::Indexed).closest_pair(&a, &b).unwrap();
        for hint in [0.0, 0.5, 100.0] {
            let hinted = ProximityQuery::new(ProximityMode::Indexed)
                .with_hint(hint)
                .closest_pair(&a, &b)
                .unwrap();
            assert!((plain.distance - hinted.distance).abs() < 1e-12);
        }
    }

    #[test]
    fn test_degenerate_single_vertex_shape() {
        let a = square(0.0, 0.0, 2.0);
        let dot = Shape::new(vec![VertexLoop::open([Point2::new(5.0, 1.0)])]);

        for mode in [ProximityMode::Indexed, ProximityMode::BruteForce] {
            let query = ProximityQuery::new(mode);
            let best = query.closest_pair(&a, &dot).unwrap();
            assert!((best.distance - 3.0).abs() < 1e-12);

            let back = query.closest_pair(&dot, &a).unwrap();
            assert!((back.distance - 3.0).abs() < 1e-12);
            assert_eq!(back.segment.begin, Point2::new(5.0, 1.0));
        }
    }

    #[test]
    fn test_empty_shape_is_error() {
        let a = square(0.0, 0.0, 1.0);
        let empty = Shape::new(vec![]);
        let query = ProximityQuery::default();
        assert!(matches!(query.edge_distances(&a, &empty), Err(GeomError::EmptyShape)));
        assert!(matches!(query.vertex_distances(&empty, &a), Err(GeomError::EmptyShape)));
        assert!(matches!(vertex_to_vertex_distances(&a, &empty), Err(GeomError::EmptyShape)));
        assert!(matches!(ShapeIndex::new(&empty), Err(GeomError::EmptyShape)));
    }

    #[test]
    fn test_vertex_distances() {
        let a = Shape::polyline([Point2::new(0.0, 2.0), Point2::new(3.0, 5.0)]);
        let b = Shape::polyline([Point2::new(-10.0, 0.0), Point2::new(10.0, 0.0)]);

        for mode in [ProximityMode::Indexed, ProximityMode::BruteForce] {
            let records = ProximityQuery::new(mode).vertex_distances(&a, &b).unwrap();
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].segment.begin, Point2::new(0.0, 2.0));
            assert_eq!(records[0].segment.end, Point2::new(0.0, 0.0));
            assert!((records[0].distance - 2.0).abs() < 1e-12);
            assert!((records[1].distance - 5.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_equidistant_edges_pick_same_foot() {
        // 中心点到正方形四条边等距，垂足只靠终点的字典序区分
        let center = Shape::new(vec![VertexLoop::open([Point2::new(0.0, 0.0)])]);
        let ring = Shape::polygon([
            Point2::new(1.0, -1.0),
            Point2::new(1.0, 1.0),
            Point2::new(-1.0, 1.0),
            Point2::new(-1.0, -1.0),
        ]);
        let index = ShapeIndex::new(&ring).unwrap();
        let nearest = index.nearest_to_point(&Point2::new(0.0, 0.0), 0.1).unwrap();
        assert_eq!(nearest.segment.end, Point2::new(-1.0, 0.0));

        let indexed = ProximityQuery::new(ProximityMode::Indexed)
            .vertex_distances(&center, &ring)
            .unwrap();
        let brute = ProximityQuery::new(ProximityMode::BruteForce)
            .vertex_distances(&center, &ring)
            .unwrap();
        assert_eq!(indexed, brute);
        assert_eq!(brute[0].segment.end, Point2::new(-1.0, 0.0));
    }

    #[test]
    fn test_shape_index_reuse() {
        let target = square(0.0, 0.0, 4.0);
        let index = ShapeIndex::new(&target).unwrap();
        assert_eq!(index.len(), 4);

        for (offset, expected) in [(5.0, 1.0), (7.0, 3.0), (4.5, 0.5)] {
            let moving = square(offset, 1.0, 1.0);
            let records = index.edge_distances_from(&moving, None).unwrap();
            assert!((records[0].distance - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_vertex_to_vertex() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(0.1, 0.0, 1.0);
        let records = vertex_to_vertex_distances(&a, &b).unwrap();
        assert_eq!(records.len(), 4);
        for r in &records {
            assert!((r.distance - 0.1).abs() < 1e-12);
        }
    }

    #[test]
    fn test_vertex_diff() {
        let p = Shape::polygon([
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 2.0),
        ]);
        let q = Shape::polygon([
            Point2::new(1.0, 0.0),
            Point2::new(-0.0, 0.0),
            Point2::new(3.0, 3.0),
        ]);

        let (only_p, only_q) = vertex_diff(&p, &q);
        assert_eq!(only_p, vec![Point2::new(1.0, 0.0), Point2::new(2.0, 2.0)]);
        assert_eq!(only_q, vec![Point2::new(3.0, 3.0)]);
    }
}
