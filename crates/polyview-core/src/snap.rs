//! 角度捕捉与网格捕捉
//!
//! 绘制正交/45° 多边形时，把折线的每条边旋转到最近的允许方向：
//! - 允许方向为 `n` 等分圆周（默认 8 个，即 45° 的倍数）
//! - 起点固定，边长保持不变，逐边传递位置变化
//! - 闭合折线的最后一个顶点取两条相邻吸附边所在直线的交点，保证闭合边也被吸附
//!
//! 单边吸附可以选择最近方向或次近方向，便于在候选角度之间切换。

use crate::config::EngineConfig;
use crate::math::{cross, Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// 选用最近还是次近的允许方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapChoice {
    #[default]
    Closest,
    SecondClosest,
}

/// 允许方向集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleSet {
    /// 单位方向向量，按角度递增
    directions: Vec<Vector2>,
}

impl AngleSet {
    /// 把圆周 `count` 等分；`count` 至少为 1
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        let directions = (0..count)
            .map(|k| {
                let (sin, cos) = (TAU * k as f64 / count as f64).sin_cos();
                // 轴向分量取精确的 0
                let clean = |c: f64| if c.abs() < EPSILON { 0.0 } else { c };
                Vector2::new(clean(cos), clean(sin))
            })
            .collect();
        Self { directions }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.snap_directions)
    }

    pub fn count(&self) -> usize {
        self.directions.len()
    }

    pub fn directions(&self) -> &[Vector2] {
        &self.directions
    }

    /// 与 `v` 夹角最小（或次小）的允许方向；零向量没有方向
    pub fn pick(&self, v: &Vector2, choice: SnapChoice) -> Option<Vector2> {
        let len = v.norm();
        if len <= EPSILON {
            return None;
        }
        let unit = v / len;

        let mut best: Option<(usize, f64)> = None;
        let mut second: Option<(usize, f64)> = None;
        for (k, d) in self.directions.iter().enumerate() {
            let score = unit.dot(d);
            if best.map_or(true, |(_, s)| score > s) {
                second = best;
                best = Some((k, score));
            } else if second.map_or(true, |(_, s)| score > s) {
                second = Some((k, score));
            }
        }

        let picked = match choice {
            SnapChoice::Closest => best,
            SnapChoice::SecondClosest => second.or(best),
        };
        picked.map(|(k, _)| self.directions[k])
    }

    /// `v` 是否已经沿某个允许方向
    pub fn is_aligned(&self, v: &Vector2) -> bool {
        match self.pick(v, SnapChoice::Closest) {
            Some(d) => cross(v, &d).abs() <= EPSILON * v.norm().max(1.0) && v.dot(&d) > 0.0,
            None => true,
        }
    }

    /// 把向量旋转到选定的允许方向，长度不变
    pub fn snap_vector(&self, v: &Vector2, choice: SnapChoice) -> Vector2 {
        if choice == SnapChoice::Closest && self.is_aligned(v) {
            return *v;
        }
        match self.pick(v, choice) {
            Some(d) => d * v.norm(),
            None => *v,
        }
    }
}

impl Default for AngleSet {
    fn default() -> Self {
        Self::new(8)
    }
}

/// 单边吸附：起点不动，返回吸附后的终点
pub fn snap_edge(begin: &Point2, end: &Point2, angles: &AngleSet, choice: SnapChoice) -> Point2 {
    let v = end - begin;
    if choice == SnapChoice::Closest && angles.is_aligned(&v) {
        return *end;
    }
    begin + angles.snap_vector(&v, choice)
}

/// 吸附整条折线
///
/// 每条边按原始方向吸附后从上一条吸附边的终点出发，已对齐且起点未移动的边原样保留。
pub fn snap_polyline(points: &[Point2], closed: bool, angles: &AngleSet) -> Vec<Point2> {
    let n = points.len();
    if n < 2 {
        return points.to_vec();
    }

    // 末顶点重复首顶点时闭合边退化，按去掉末顶点的闭合折线吸附后再补回
    if closed && n >= 3 && (points[n - 1] - points[0]).norm() <= EPSILON {
        let mut out = snap_polyline(&points[..n - 1], true, angles);
        out.push(out[0]);
        return out;
    }

    let mut out = points.to_vec();
    // 闭合折线的最后一个顶点单独处理
    let last_free = if closed && n >= 3 { n - 2 } else { n - 1 };

    for i in 0..last_free {
        out[i + 1] = propagate(&out[i], &points[i], &points[i + 1], angles);
    }

    if last_free == n - 2 {
        out[n - 1] = close_polyline(&out, points, angles);
    }
    out
}

/// 从新起点 `start` 沿吸附后的原边 `from -> to` 前进
fn propagate(start: &Point2, from: &Point2, to: &Point2, angles: &AngleSet) -> Point2 {
    let v = to - from;
    if start == from && angles.is_aligned(&v) {
        return *to;
    }
    start + angles.snap_vector(&v, SnapChoice::Closest)
}

/// 闭合折线的最后一个顶点：从倒数第二个顶点沿吸附方向 d1 出发的直线，
/// 与过第一个顶点、沿闭合边吸附方向 d2 的直线的交点
fn close_polyline(out: &[Point2], points: &[Point2], angles: &AngleSet) -> Point2 {
    let n = points.len();
    let prev = out[n - 2];
    let first = out[0];
    let last_edge = points[n - 1] - points[n - 2];
    let closing_edge = points[0] - points[n - 1];

    if prev == points[n - 2]
        && first == points[0]
        && angles.is_aligned(&last_edge)
        && angles.is_aligned(&closing_edge)
    {
        return points[n - 1];
    }

    let fallback = || propagate(&prev, &points[n - 2], &points[n - 1], angles);

    let Some(d2) = angles.pick(&closing_edge, SnapChoice::Closest) else {
        return fallback();
    };

    for choice in [SnapChoice::Closest, SnapChoice::SecondClosest] {
        let Some(d1) = angles.pick(&last_edge, choice) else {
            return fallback();
        };
        let det = cross(&d1, &d2);
        if det.abs() > EPSILON {
            // prev + t d1 = first + s d2
            let t = cross(&(first - prev), &d2) / det;
            return prev + d1 * t;
        }
    }

    tracing::debug!("Closing edge is parallel to the last edge, leaving it unsnapped");
    fallback()
}

/// 顶点坐标取整到网格；网格尺寸非正时原样返回
pub fn snap_to_grid(points: &[Point2], grid_size: f64) -> Vec<Point2> {
    if grid_size <= 0.0 {
        return points.to_vec();
    }
    points
        .iter()
        .map(|p| {
            Point2::new(
                (p.x / grid_size).round() * grid_size,
                (p.y / grid_size).round() * grid_size,
            )
        })
        .collect()
}

/// 先取整到网格，再做角度吸附，最后把每条边的向量取整到网格
///
/// 45° 倍数的边向量两个分量绝对值相同（或其一为零），取整后方向不变。
pub fn snap_polyline_to_grid_and_angles(
    points: &[Point2],
    closed: bool,
    angles: &AngleSet,
    grid_size: f64,
) -> Vec<Point2> {
    let gridded = snap_to_grid(points, grid_size);
    let snapped = snap_polyline(&gridded, closed, angles);
    if snapped.is_empty() || grid_size <= 0.0 {
        return snapped;
    }

    let mut out = Vec::with_capacity(snapped.len());
    out.push(snapped[0]);
    for pair in snapped.windows(2) {
        let v = pair[1] - pair[0];
        let rounded = Vector2::new(
            (v.x / grid_size).round() * grid_size,
            (v.y / grid_size).round() * grid_size,
        );
        let next = out[out.len() - 1] + rounded;
        out.push(next);
    }
    out
}

/// 按配置中的方向数和网格尺寸吸附折线
pub fn snap_polyline_with_config(points: &[Point2], closed: bool, config: &EngineConfig) -> Vec<Point2> {
    snap_polyline_to_grid_and_angles(points, closed, &AngleSet::from_config(config), config.grid_size)
}
