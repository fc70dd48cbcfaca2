//! 基础数学类型
//!
//! 点与向量直接使用 nalgebra 的双精度类型，这里补充：
//! - 浮点容差 `EPSILON`
//! - 点的字典序比较（先 x 后 y）
//! - 轴对齐包围盒 `BoundingBox2`

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub use nalgebra::Matrix2;

/// 二维点
pub type Point2 = nalgebra::Point2<f64>;

/// 二维向量
pub type Vector2 = nalgebra::Vector2<f64>;

/// 全局浮点比较容差
pub const EPSILON: f64 = 1e-10;

/// 二维叉积（有向面积）
#[inline]
pub fn cross(a: &Vector2, b: &Vector2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// 点的字典序：先比较 x，再比较 y
pub fn lex_cmp(a: &Point2, b: &Point2) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

/// 两点是否在容差内重合
#[inline]
pub fn points_coincide(a: &Point2, b: &Point2, tolerance: f64) -> bool {
    (a - b).norm() <= tolerance
}

/// 轴对齐包围盒
///
/// 允许处于无效状态（`min > max`），例如空集合的包围盒。
/// 使用前需要用 [`BoundingBox2::is_valid`] 检查。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2 {
    pub min: Point2,
    pub max: Point2,
}

impl BoundingBox2 {
    pub fn new(min: Point2, max: Point2) -> Self {
        Self { min, max }
    }

    /// 由 (xlow, ylow, xhigh, yhigh) 构造
    pub fn from_bounds(xlow: f64, ylow: f64, xhigh: f64, yhigh: f64) -> Self {
        Self::new(Point2::new(xlow, ylow), Point2::new(xhigh, yhigh))
    }

    /// 无效（空）包围盒，任何点加入后即变为有效
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::INFINITY, f64::INFINITY),
            max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Point2>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.expand_to_include(&p);
        }
        bbox
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        self.width() * self.height()
    }

    pub fn center(&self) -> Point2 {
        Point2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// 对角线长度
    pub fn diagonal(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        (self.max - self.min).norm()
    }

    pub fn expand_to_include(&mut self, point: &Point2) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }

    /// 合并另一个包围盒（无效的一方被忽略）
    pub fn union(&self, other: &BoundingBox2) -> BoundingBox2 {
        if !other.is_valid() {
            return *self;
        }
        if !self.is_valid() {
            return *other;
        }
        BoundingBox2::new(
            Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        )
    }

    /// 四周各扩展 `margin`
    pub fn expanded(&self, margin: f64) -> BoundingBox2 {
        BoundingBox2::new(
            Point2::new(self.min.x - margin, self.min.y - margin),
            Point2::new(self.max.x + margin, self.max.y + margin),
        )
    }

    pub fn contains(&self, point: &Point2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    pub fn contains_box(&self, other: &BoundingBox2) -> bool {
        self.min.x <= other.min.x
            && self.max.x >= other.max.x
            && self.min.y <= other.min.y
            && self.max.y >= other.max.y
    }

    /// 闭区间相交测试（边界接触也算相交）
    pub fn intersects(&self, other: &BoundingBox2) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        !(self.min.x > other.max.x
            || self.max.x < other.min.x
            || self.min.y > other.max.y
            || self.max.y < other.min.y)
    }

    /// 两个包围盒之间的最小距离，相交时为 0
    pub fn distance_to(&self, other: &BoundingBox2) -> f64 {
        let dx = (other.min.x - self.max.x).max(self.min.x - other.max.x).max(0.0);
        let dy = (other.min.y - self.max.y).max(self.min.y - other.max.y).max(0.0);
        dx.hypot(dy)
    }

    /// 线段是否与包围盒相交（Liang-Barsky 裁剪）
    pub fn intersects_segment(&self, begin: &Point2, end: &Point2) -> bool {
        if !self.is_valid() {
            return false;
        }
        let d = end - begin;
        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;

        let checks = [
            (-d.x, begin.x - self.min.x),
            (d.x, self.max.x - begin.x),
            (-d.y, begin.y - self.min.y),
            (d.y, self.max.y - begin.y),
        ];

        for (p, q) in checks {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return false;
            }
        }
        true
    }

    /// 以中心为基准对称扩展，使宽高比等于 `aspect_ratio`（宽/高）
    ///
    /// 只放大不缩小，用于让视图完整容纳内容。
    pub fn expand_to_ratio(&self, aspect_ratio: f64) -> BoundingBox2 {
        if !self.is_valid() || aspect_ratio <= 0.0 {
            return *self;
        }
        let center = self.center();
        let mut w = self.width();
        let mut h = self.height();

        if h * aspect_ratio > w {
            w = h * aspect_ratio;
        } else {
            h = w / aspect_ratio;
        }

        BoundingBox2::new(
            Point2::new(center.x - w / 2.0, center.y - h / 2.0),
            Point2::new(center.x + w / 2.0, center.y + h / 2.0),
        )
    }
}

impl Default for BoundingBox2 {
    fn default() -> Self {
        Self::empty()
    }
}
