//! PolyView 核心几何引擎
//!
//! 提供多边形/折线之间的距离查询、边界合并、仿射对齐和角度捕捉。
//!
//! # 架构设计
//!
//! - `math` / `geometry` / `transform`: 基础图元（点、线段、包围盒、形状、仿射变换）
//! - `distance`: 点-线段、线段-线段的最小距离原语
//! - `spatial`: 包围盒树（节点池实现），用于剪枝候选边对
//! - `proximity`: 两个形状之间的距离记录，支持索引模式与暴力模式
//! - `merge`: 两个重叠多边形的外边界合并
//! - `align`: 基于最近顶点对应的仿射对齐
//! - `snap`: 45° 角度捕捉与网格捕捉
//!
//! # 示例
//!
//! ```rust
//! use polyview_core::prelude::*;
//!
//! let a = Shape::polygon([
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(0.0, 1.0),
//! ]);
//! let b = a.translated(Vector2::new(2.0, 0.0));
//!
//! let closest = ProximityQuery::default().closest_pair(&a, &b).unwrap();
//! assert!((closest.distance - 1.0).abs() < 1e-12);
//! ```

pub mod align;
pub mod config;
pub mod distance;
pub mod error;
pub mod geometry;
pub mod math;
pub mod merge;
pub mod proximity;
pub mod snap;
pub mod spatial;
pub mod transform;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::align::{align_shape, estimate_alignment, AlignmentSession};
    pub use crate::config::EngineConfig;
    pub use crate::distance::{point_to_segment, segment_distance, segment_to_segment};
    pub use crate::error::{GeomError, NoMergeReason, Result};
    pub use crate::geometry::{Segment, SegmentDistance, Shape, ShapeStyle, VertexLoop};
    pub use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
    pub use crate::merge::{merge_polygons, merge_shapes};
    pub use crate::proximity::{ProximityMode, ProximityQuery, ShapeIndex};
    pub use crate::snap::{snap_edge, snap_polyline, AngleSet, SnapChoice};
    pub use crate::spatial::{IndexEntry, SpatialIndex};
    pub use crate::transform::{AffineTransform, LinearTransform};
}
