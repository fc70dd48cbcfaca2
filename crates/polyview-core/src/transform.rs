//! 线性变换与仿射变换
//!
//! - `LinearTransform`: 2x2 矩阵（旋转、缩放、剪切、镜像），总是以原点为中心
//! - `AffineTransform`: 线性部分加平移 (sx, sy)
//!
//! 复合 `P ∘ Q` 表示先应用 Q 再应用 P。

use crate::error::{GeomError, Result};
use crate::math::{Matrix2, Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};

/// 2x2 线性变换
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTransform {
    pub matrix: Matrix2<f64>,
}

impl LinearTransform {
    /// 按行给出矩阵元素 (a11, a12, a21, a22)
    pub fn new(a11: f64, a12: f64, a21: f64, a22: f64) -> Self {
        Self {
            matrix: Matrix2::new(a11, a12, a21, a22),
        }
    }

    pub fn identity() -> Self {
        Self {
            matrix: Matrix2::identity(),
        }
    }

    /// 逆时针旋转（角度制）
    pub fn rotation_degrees(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, -sin, sin, cos)
    }

    pub fn scale(factor: f64) -> Self {
        Self::new(factor, 0.0, 0.0, factor)
    }

    /// 关于 y 轴镜像 (x -> -x)
    pub fn flip_against_y_axis() -> Self {
        Self::new(-1.0, 0.0, 0.0, 1.0)
    }

    /// 关于 x 轴镜像 (y -> -y)
    pub fn flip_against_x_axis() -> Self {
        Self::new(1.0, 0.0, 0.0, -1.0)
    }

    pub fn determinant(&self) -> f64 {
        self.matrix.determinant()
    }

    /// 行列式相对于矩阵元素的量级可忽略时视为奇异
    ///
    /// 比较 `|det| <= EPSILON * ‖M‖²`（Frobenius 范数），
    /// 所以均匀缩放 `scale(1e-5)` 仍然可逆，零矩阵总是奇异。
    pub fn is_singular(&self) -> bool {
        self.determinant().abs() <= EPSILON * self.matrix.norm_squared()
    }

    pub fn apply(&self, v: &Vector2) -> Vector2 {
        self.matrix * v
    }
}

impl Default for LinearTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// 仿射变换：`p' = M p + s`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub linear: LinearTransform,
    pub shift: Vector2,
}

impl AffineTransform {
    pub fn new(linear: LinearTransform, shift: Vector2) -> Self {
        Self { linear, shift }
    }

    /// 由 6 个系数构造 (a11, a12, a21, a22, sx, sy)
    pub fn from_coefficients(a11: f64, a12: f64, a21: f64, a22: f64, sx: f64, sy: f64) -> Self {
        Self::new(LinearTransform::new(a11, a12, a21, a22), Vector2::new(sx, sy))
    }

    pub fn identity() -> Self {
        Self::new(LinearTransform::identity(), Vector2::zeros())
    }

    pub fn translation(offset: Vector2) -> Self {
        Self::new(LinearTransform::identity(), offset)
    }

    pub fn from_linear(linear: LinearTransform) -> Self {
        Self::new(linear, Vector2::zeros())
    }

    /// 以 `center` 为中心应用线性变换：平移到原点、变换、再平移回去
    pub fn about_point(linear: LinearTransform, center: Point2) -> Self {
        let c = center.coords;
        Self::new(linear, c - linear.apply(&c))
    }

    /// 系数 (a11, a12, a21, a22, sx, sy)
    pub fn coefficients(&self) -> [f64; 6] {
        let m = &self.linear.matrix;
        [m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)], self.shift.x, self.shift.y]
    }

    pub fn apply(&self, p: &Point2) -> Point2 {
        Point2::from(self.linear.apply(&p.coords) + self.shift)
    }

    /// 复合变换 `self ∘ other`：先应用 `other`，再应用 `self`
    pub fn compose(&self, other: &AffineTransform) -> AffineTransform {
        AffineTransform::new(
            LinearTransform {
                matrix: self.linear.matrix * other.linear.matrix,
            },
            self.linear.apply(&other.shift) + self.shift,
        )
    }

    /// 逆变换；线性部分奇异时返回错误
    pub fn inverse(&self) -> Result<AffineTransform> {
        if self.linear.is_singular() {
            return Err(GeomError::TransformUndetermined(format!(
                "singular linear part, determinant {:e}",
                self.linear.determinant()
            )));
        }
        let inv = self
            .linear
            .matrix
            .try_inverse()
            .ok_or_else(|| GeomError::TransformUndetermined("matrix not invertible".into()))?;
        Ok(AffineTransform::new(
            LinearTransform { matrix: inv },
            -(inv * self.shift),
        ))
    }

    /// 与另一个变换的系数是否在容差内相等
    pub fn approx_eq(&self, other: &AffineTransform, tolerance: f64) -> bool {
        self.coefficients()
            .iter()
            .zip(other.coefficients().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.approx_eq(&AffineTransform::identity(), tolerance)
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}
