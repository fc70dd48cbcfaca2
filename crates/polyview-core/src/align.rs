//! 对齐引擎
//!
//! 求把源形状对齐到目标形状的最佳仿射变换：
//! 1. 源形状的每个顶点与目标形状上最近的顶点配对
//! 2. 对配对点做最小二乘拟合
//!    - 源点张成二维时拟合完整仿射变换（以质心为原点的 2x2 正规方程）
//!    - 源点共线时拟合相似变换（旋转 + 均匀缩放 + 平移），两对点时精确
//!    - 其余情况无法确定变换
//!
//! `AlignmentSession` 记录交互对齐过程中累积的总变换。

use crate::error::{GeomError, Result};
use crate::geometry::{bounding_box_of, Shape};
use crate::math::{Matrix2, Point2, Vector2, EPSILON};
use crate::transform::{AffineTransform, LinearTransform};
use nalgebra::SymmetricEigen;

/// 一对对应点（源点, 目标点）
pub type Correspondence = (Point2, Point2);

/// 源形状每个顶点与目标形状最近顶点组成的对应关系
pub fn nearest_vertex_correspondences(source: &Shape, target: &Shape) -> Result<Vec<Correspondence>> {
    let targets: Vec<Point2> = target.vertices().collect();
    if source.is_empty() || targets.is_empty() {
        return Err(GeomError::EmptyShape);
    }

    Ok(source
        .vertices()
        .map(|p| {
            let mut best = targets[0];
            let mut best_dist = (p - best).norm_squared();
            for q in &targets[1..] {
                let d = (p - q).norm_squared();
                if d < best_dist {
                    best = *q;
                    best_dist = d;
                }
            }
            (p, best)
        })
        .collect())
}

/// 估计把 `source` 对齐到 `target` 的仿射变换
pub fn estimate_alignment(source: &Shape, target: &Shape) -> Result<AffineTransform> {
    let pairs = nearest_vertex_correspondences(source, target)?;
    fit_affine(&pairs)
}

/// 对齐 `source` 到 `target`，返回变换后的新形状和所用的变换
pub fn align_shape(source: &Shape, target: &Shape) -> Result<(Shape, AffineTransform)> {
    let transform = estimate_alignment(source, target)?;
    Ok((source.transformed(&transform), transform))
}

/// 最小二乘拟合对应点之间的仿射变换
pub fn fit_affine(pairs: &[Correspondence]) -> Result<AffineTransform> {
    if pairs.is_empty() {
        return Err(GeomError::TransformUndetermined(
            "no correspondences".into(),
        ));
    }

    let n = pairs.len() as f64;
    let src_center = pairs.iter().fold(Vector2::zeros(), |acc, (p, _)| acc + p.coords) / n;

    // 源点协方差，特征值判断源点是否张成二维
    let mut covariance = Matrix2::<f64>::zeros();
    for (p, _) in pairs {
        let d = p.coords - src_center;
        covariance += d * d.transpose();
    }
    let eigenvalues = SymmetricEigen::new(covariance).eigenvalues;
    let largest = eigenvalues.max();
    let smallest = eigenvalues.min();

    if largest <= EPSILON * EPSILON {
        return Err(GeomError::TransformUndetermined(format!(
            "{} correspondences share one source point",
            pairs.len()
        )));
    }

    let transform = if smallest > EPSILON * largest {
        fit_full_affine(pairs, src_center, covariance)?
    } else {
        tracing::debug!(
            "Source points are collinear ({} pairs), fitting a similarity",
            pairs.len()
        );
        fit_similarity(pairs, src_center)
    };

    if transform.linear.is_singular() {
        return Err(GeomError::TransformUndetermined(format!(
            "fitted transform is singular, determinant {:e}",
            transform.linear.determinant()
        )));
    }
    Ok(transform)
}

/// 以质心为原点拟合 `q = (I + D) p + s`
///
/// `u = p - c_src`，位移 `w = (q - c_dst) - u`，由 `D Σ u uᵀ = Σ w uᵀ` 解出 `D`。
/// 坐标远离原点时仍然良态；源与目标相同时 `w` 恰为零，结果恰为恒等变换。
fn fit_full_affine(
    pairs: &[Correspondence],
    src_center: Vector2,
    covariance: Matrix2<f64>,
) -> Result<AffineTransform> {
    let n = pairs.len() as f64;
    let dst_center = pairs.iter().fold(Vector2::zeros(), |acc, (_, q)| acc + q.coords) / n;

    let mut moment = Matrix2::<f64>::zeros();
    for (p, q) in pairs {
        let u = p.coords - src_center;
        let w = (q.coords - dst_center) - u;
        moment += w * u.transpose();
    }

    let inverse = covariance.try_inverse().ok_or_else(|| {
        GeomError::TransformUndetermined("normal equations are singular".into())
    })?;
    let delta = moment * inverse;

    let linear = LinearTransform {
        matrix: Matrix2::identity() + delta,
    };
    let shift = (dst_center - src_center) - delta * src_center;
    Ok(AffineTransform::new(linear, shift))
}

/// 相似变换 `q = [[a, -b], [b, a]] p + s` 的最小二乘解
fn fit_similarity(pairs: &[Correspondence], src_center: Vector2) -> AffineTransform {
    let n = pairs.len() as f64;
    let dst_center = pairs.iter().fold(Vector2::zeros(), |acc, (_, q)| acc + q.coords) / n;

    let (mut dot, mut crs, mut norm) = (0.0, 0.0, 0.0);
    for (p, q) in pairs {
        let u = p.coords - src_center;
        let v = q.coords - dst_center;
        dot += u.dot(&v);
        crs += u.x * v.y - u.y * v.x;
        norm += u.norm_squared();
    }

    let (a, b) = (dot / norm, crs / norm);
    let linear = LinearTransform::new(a, -b, b, a);
    AffineTransform::new(linear, dst_center - linear.apply(&src_center))
}

/// 以形状集合包围盒中心为中心应用线性变换
///
/// 返回新的形状集合以及实际应用的仿射变换；集合为空时变换为恒等变换。
pub fn transform_shapes_about_center(
    shapes: &[Shape],
    linear: &LinearTransform,
) -> (Vec<Shape>, AffineTransform) {
    let bbox = bounding_box_of(shapes);
    if !bbox.is_valid() {
        return (shapes.to_vec(), AffineTransform::identity());
    }

    let transform = AffineTransform::about_point(*linear, bbox.center());
    let result = shapes.iter().map(|s| s.transformed(&transform)).collect();
    (result, transform)
}

/// 交互对齐会话：累积每一步应用的变换
#[derive(Debug, Clone, Default)]
pub struct AlignmentSession {
    total: AffineTransform,
    steps: usize,
}

impl AlignmentSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 到目前为止应用的总变换
    pub fn total(&self) -> &AffineTransform {
        &self.total
    }

    /// 已应用的步数
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// 对形状应用一步变换，并累积到总变换（新的一步在最后应用）
    pub fn apply(&mut self, shape: &Shape, step: &AffineTransform) -> Shape {
        self.total = step.compose(&self.total);
        self.steps += 1;
        shape.transformed(step)
    }

    /// 对齐并应用一步；变换无法确定时总变换保持不变
    pub fn align_step(&mut self, source: &Shape, target: &Shape) -> Result<Shape> {
        match estimate_alignment(source, target) {
            Ok(step) => Ok(self.apply(source, &step)),
            Err(e) => {
                tracing::warn!("Alignment step skipped: {}", e);
                Err(e)
            }
        }
    }

    pub fn reset(&mut self) {
        self.total = AffineTransform::identity();
        self.steps = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn irregular() -> Shape {
        Shape::polygon([
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(12.0, 7.0),
            Point2::new(5.0, 11.0),
            Point2::new(-3.0, 6.0),
        ])
    }

    fn nudge() -> AffineTransform {
        AffineTransform::translation(Vector2::new(0.3, 0.2)).compose(
            &AffineTransform::about_point(
                LinearTransform::rotation_degrees(5.0),
                Point2::new(4.0, 4.0),
            ),
        )
    }

    #[test]
    fn test_align_to_itself_is_identity() {
        let shape = irregular();
        let t = estimate_alignment(&shape, &shape).unwrap();
        assert!(t.is_identity(1e-9), "{t:?}");
    }

    #[test]
    fn test_align_to_itself_far_from_origin() {
        for offset in [1e6, 1e7] {
            let shape = irregular().translated(Vector2::new(offset, -offset));
            let t = estimate_alignment(&shape, &shape).unwrap();
            assert!(t.is_identity(1e-9), "offset {offset}: {t:?}");
        }
    }

    #[test]
    fn test_fit_far_from_origin() {
        // 远离原点的微小平移也能恢复
        let source = irregular().translated(Vector2::new(1e6, 1e6));
        let pairs: Vec<Correspondence> = source
            .vertices()
            .map(|p| (p, p + Vector2::new(0.25, -0.5)))
            .collect();
        let t = fit_affine(&pairs).unwrap();
        assert!((t.linear.matrix - Matrix2::identity()).norm() < 1e-9);
        for (p, q) in &pairs {
            assert!((t.apply(p) - q).norm() < 1e-6);
        }
    }

    #[test]
    fn test_fit_tiny_scale() {
        // 行列式 1e-10 的均匀缩小不是奇异变换
        let pairs: Vec<Correspondence> = irregular()
            .vertices()
            .map(|p| (p, Point2::from(p.coords * 1e-5)))
            .collect();
        let t = fit_affine(&pairs).unwrap();
        assert!(t.approx_eq(&AffineTransform::from_linear(LinearTransform::scale(1e-5)), 1e-12));
    }

    #[test]
    fn test_round_trip_alignment() {
        let a = irregular();
        let b = a.transformed(&nudge());

        let ab = estimate_alignment(&a, &b).unwrap();
        let ba = estimate_alignment(&b, &a).unwrap();
        assert!(ab.approx_eq(&nudge(), 1e-9));
        assert!(ba.compose(&ab).is_identity(1e-9));
        assert!(ab.compose(&ba).is_identity(1e-9));

        let (aligned, applied) = align_shape(&a, &b).unwrap();
        assert_eq!(applied, ab);
        for (p, q) in aligned.vertices().zip(b.vertices()) {
            assert!((p - q).norm() < 1e-9);
        }
    }

    #[test]
    fn test_two_point_similarity_is_exact() {
        let source = Shape::polyline([Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]);
        let target = Shape::polyline([Point2::new(0.1, 0.2), Point2::new(1.1, 0.4)]);
        let t = estimate_alignment(&source, &target).unwrap();

        assert!((t.apply(&Point2::new(0.0, 0.0)) - Point2::new(0.1, 0.2)).norm() < 1e-12);
        assert!((t.apply(&Point2::new(1.0, 0.0)) - Point2::new(1.1, 0.4)).norm() < 1e-12);
        // 相似变换：两列正交且等长
        let [a11, a12, a21, a22, _, _] = t.coefficients();
        assert!((a11 - a22).abs() < 1e-12);
        assert!((a12 + a21).abs() < 1e-12);
    }

    #[test]
    fn test_undetermined_cases() {
        let point = Shape::polyline([Point2::new(1.0, 1.0)]);
        let target = irregular();
        assert!(matches!(
            estimate_alignment(&point, &target),
            Err(GeomError::TransformUndetermined(_))
        ));

        // 所有源点映射到同一个目标点
        let source = Shape::polyline([Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]);
        let far = Shape::polyline([Point2::new(50.0, 50.0)]);
        assert!(matches!(
            estimate_alignment(&source, &far),
            Err(GeomError::TransformUndetermined(_))
        ));

        assert!(matches!(
            estimate_alignment(&Shape::new(vec![]), &target),
            Err(GeomError::EmptyShape)
        ));
    }

    #[test]
    fn test_session_accumulates_total() {
        let a = irregular();
        let b = a.transformed(&nudge());
        let mut session = AlignmentSession::new();

        let shift = AffineTransform::translation(Vector2::new(0.5, -0.5));
        let moved = session.apply(&a, &shift);
        let aligned = session.align_step(&moved, &b).unwrap();

        assert_eq!(session.steps(), 2);
        assert!(session.total().approx_eq(&nudge(), 1e-9));
        for (p, q) in aligned.vertices().zip(b.vertices()) {
            assert!((p - q).norm() < 1e-9);
        }

        // 失败的一步不改变总变换
        let before = *session.total();
        let point = Shape::polyline([Point2::new(0.0, 0.0)]);
        assert!(session.align_step(&point, &b).is_err());
        assert_eq!(*session.total(), before);
        assert_eq!(session.steps(), 2);

        session.reset();
        assert!(session.total().is_identity(0.0));
    }

    #[test]
    fn test_transform_about_center() {
        let shapes = vec![
            Shape::polygon([Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), Point2::new(2.0, 2.0)]),
            Shape::polyline([Point2::new(4.0, 0.0), Point2::new(4.0, 2.0)]),
        ];
        let (rotated, t) =
            transform_shapes_about_center(&shapes, &LinearTransform::rotation_degrees(180.0));

        // 包围盒中心 (2, 1) 保持不动
        assert!((t.apply(&Point2::new(2.0, 1.0)) - Point2::new(2.0, 1.0)).norm() < 1e-12);
        assert!((rotated[1].loops[0].points[0] - Point2::new(0.0, 2.0)).norm() < 1e-12);
        assert_eq!(shapes[0].loops[0].points[0], Point2::new(0.0, 0.0));

        let (empty, t) = transform_shapes_about_center(&[], &LinearTransform::scale(2.0));
        assert!(empty.is_empty());
        assert!(t.is_identity(0.0));
    }
}
