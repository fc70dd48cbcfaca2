//! 几何引擎错误定义
//!
//! 退化几何（零长度边、单顶点形状）不是错误；这里只有调用方需要处理的
//! 结构性结果：空形状、无法合并、变换无法确定、配置无效。

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeomError>;

#[derive(Error, Debug)]
pub enum GeomError {
    #[error("Shape has no vertices")]
    EmptyShape,

    #[error("No merge possible: {0}")]
    NoMerge(NoMergeReason),

    #[error("Transform undetermined: {0}")]
    TransformUndetermined(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 边界合并失败的原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMergeReason {
    #[error("polygons do not intersect")]
    Disjoint,

    #[error("polygons touch at isolated points only")]
    Touching,

    #[error("overlap splits into more than one region")]
    MultipleRegions,

    #[error("input is not a single closed polygon with positive area")]
    NotAPolygon,
}
