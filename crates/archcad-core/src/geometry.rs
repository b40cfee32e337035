//! 几何内核
//!
//! 无状态的纯函数集合：
//! - 网格捕捉、距离、插值、截断
//! - 墙体端点计算
//! - 点到线段距离、向量夹角、共线判断
//! - 包围盒、角度归一化
//!
//! 退化输入（零长度、零模长）返回 0 或恒等结果，从不报错。

use crate::document::Building;
use crate::element::{BuildingElement, Dimensions, ElementKind};
use crate::math::{BoundingBox3, Point3, Vector3};
use std::f64::consts::TAU;

/// 共线判断的默认容差
pub const DEFAULT_COLLINEAR_TOLERANCE: f64 = 0.01;

/// 将数值捕捉到最近的网格倍数
///
/// 使用 `f64::round`，恰好位于两格中间时远离零取整：
/// `snap_to_grid(0.25, 0.5) == 0.5`，`snap_to_grid(-0.25, 0.5) == -0.5`。
/// 网格尺寸非正或非有限时原样返回。
pub fn snap_to_grid(value: f64, grid_size: f64) -> f64 {
    if !(grid_size > 0.0) || !grid_size.is_finite() {
        return value;
    }
    (value / grid_size).round() * grid_size
}

/// 三维欧氏距离
pub fn distance_3d(a: &Point3, b: &Point3) -> f64 {
    (b - a).norm()
}

/// XZ 平面上的距离
pub fn distance_2d(a: &Point3, b: &Point3) -> f64 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

/// 线性插值
pub fn lerp(start: f64, end: f64, t: f64) -> f64 {
    start + (end - start) * t
}

/// 将数值截断到 `[min, max]`
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// 墙体端点（世界坐标）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallEndpoints {
    pub start: Point3,
    pub end: Point3,
}

impl WallEndpoints {
    pub fn midpoint(&self) -> Point3 {
        nalgebra::center(&self.start, &self.end)
    }

    pub fn length(&self) -> f64 {
        distance_3d(&self.start, &self.end)
    }
}

/// 计算墙体端点
///
/// 中心线经过 `position`，方向为 `(sin(rotation_y), 0, cos(rotation_y))`。
/// 这一约定（X 用正弦、Z 用余弦）决定了墙体局部坐标系的朝向。
pub fn calculate_wall_endpoints(position: &Point3, rotation_y: f64, length: f64) -> WallEndpoints {
    let half_length = length / 2.0;
    let dx = half_length * rotation_y.sin();
    let dz = half_length * rotation_y.cos();
    let offset = Vector3::new(dx, 0.0, dz);

    WallEndpoints {
        start: position - offset,
        end: position + offset,
    }
}

/// 墙体构件的端点，非墙构件返回 `None`
pub fn element_wall_endpoints(element: &BuildingElement) -> Option<WallEndpoints> {
    let wall = element.as_wall()?;
    Some(calculate_wall_endpoints(&element.position, element.rotation.y, wall.length))
}

/// 点到线段的距离
///
/// 投影参数在 XZ 平面上计算并截断到 `[0, 1]`，
/// 最近点取线段起点的高度。
pub fn distance_to_line(point: &Point3, line_start: &Point3, line_end: &Point3) -> f64 {
    let dx = line_end.x - line_start.x;
    let dz = line_end.z - line_start.z;
    let length_squared = dx * dx + dz * dz;

    if length_squared == 0.0 {
        return distance_3d(point, line_start);
    }

    let t = ((point.x - line_start.x) * dx + (point.z - line_start.z) * dz) / length_squared;
    let t = clamp(t, 0.0, 1.0);

    let closest = Point3::new(line_start.x + t * dx, line_start.y, line_start.z + t * dz);
    distance_3d(point, &closest)
}

/// 将点投影到三维线段上（参数截断到 `[0, 1]`）
pub fn project_point_on_segment(point: &Point3, line_start: &Point3, line_end: &Point3) -> Point3 {
    let v = line_end - line_start;
    let length_squared = v.norm_squared();
    if length_squared == 0.0 {
        return *line_start;
    }

    let t = clamp((point - line_start).dot(&v) / length_squared, 0.0, 1.0);
    line_start + v * t
}

/// 两个向量的夹角（弧度），任一为零向量时返回 0
pub fn angle_between_vectors(v1: &Vector3, v2: &Vector3) -> f64 {
    let mag1 = v1.norm();
    let mag2 = v2.norm();
    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    let cos_angle = v1.dot(v2) / (mag1 * mag2);
    clamp(cos_angle, -1.0, 1.0).acos()
}

/// 判断三点是否共线（叉积模长不超过容差）
pub fn are_points_collinear(p1: &Point3, p2: &Point3, p3: &Point3, tolerance: f64) -> bool {
    let v1 = p2 - p1;
    let v2 = p3 - p1;
    v1.cross(&v2).norm() <= tolerance
}

/// 以 `position` 为中心的轴对齐包围盒
pub fn bounding_box(position: &Point3, dimensions: &Dimensions) -> BoundingBox3 {
    let half = Vector3::new(dimensions.width, dimensions.height, dimensions.depth) / 2.0;
    BoundingBox3::new(position - half, position + half)
}

/// 将角度归一化到 `[0, 2π)`
pub fn normalize_angle(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(TAU);
    // rem_euclid 对极小的负数可能得到恰好 2π
    if normalized >= TAU {
        0.0
    } else {
        normalized
    }
}

/// XZ 平面上从 `p1` 指向 `p2` 的方位角，范围 `[-π, π]`
pub fn angle_between_points(p1: &Point3, p2: &Point3) -> f64 {
    (p2.z - p1.z).atan2(p2.x - p1.x)
}

/// 单个构件的世界包围盒
///
/// 墙体按长度/高度/厚度绕Y轴旋转后求包围盒（墙底位于 `position.y`），
/// 其他构件直接使用尺寸。
pub fn element_bounding_box(element: &BuildingElement) -> Option<BoundingBox3> {
    match &element.kind {
        ElementKind::Wall(wall) => {
            let endpoints = calculate_wall_endpoints(&element.position, element.rotation.y, wall.length);
            let direction = endpoints.end - endpoints.start;
            let length = direction.norm();
            let normal = if length > 0.0 {
                Vector3::new(-direction.z, 0.0, direction.x) / length
            } else {
                Vector3::x()
            };
            let half_thickness = normal * (wall.thickness / 2.0);
            let rise = Vector3::new(0.0, wall.height, 0.0);

            BoundingBox3::from_points([
                endpoints.start + half_thickness,
                endpoints.start - half_thickness,
                endpoints.end + half_thickness,
                endpoints.end - half_thickness,
                endpoints.start + half_thickness + rise,
                endpoints.end - half_thickness + rise,
            ])
        }
        ElementKind::Floor | ElementKind::Roof(_) => Some(bounding_box(&element.position, &element.dimensions)),
        // 洞口位于墙体局部坐标中，不参与世界包围盒
        ElementKind::Opening(_) => None,
    }
}

/// 整个建筑的包围盒，空建筑返回 `None`
pub fn building_bounding_box(building: &Building) -> Option<BoundingBox3> {
    building
        .elements
        .iter()
        .filter_map(element_bounding_box)
        .reduce(|acc, bbox| acc.union(&bbox))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    const TOL: f64 = 1e-9;

    fn assert_point_eq(actual: &Point3, expected: &Point3) {
        assert!(
            (actual - expected).norm() < TOL,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_snap_to_grid() {
        assert!((snap_to_grid(1.3, 0.5) - 1.5).abs() < TOL);
        assert!((snap_to_grid(1.2, 0.5) - 1.0).abs() < TOL);
        assert!((snap_to_grid(-0.7, 0.5) - (-0.5)).abs() < TOL);
    }

    #[test]
    fn test_snap_to_grid_ties_round_away_from_zero() {
        assert_eq!(snap_to_grid(0.25, 0.5), 0.5);
        assert_eq!(snap_to_grid(-0.25, 0.5), -0.5);
        assert_eq!(snap_to_grid(0.75, 0.5), 1.0);
        assert_eq!(snap_to_grid(3.0, 0.0), 3.0);
    }

    #[test]
    fn test_distances() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 12.0, 4.0);
        assert!((distance_3d(&a, &b) - 13.0).abs() < TOL);
        assert!((distance_2d(&a, &b) - 5.0).abs() < TOL);
    }

    #[test]
    fn test_lerp_and_clamp() {
        assert!((lerp(2.0, 4.0, 0.25) - 2.5).abs() < TOL);
        assert_eq!(clamp(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.5, 0.0, 1.0), 0.5);
    }

    #[test]
    fn test_wall_endpoints_rotation_zero() {
        let endpoints = calculate_wall_endpoints(&Point3::new(0.0, 1.0, 0.0), 0.0, 10.0);
        assert_point_eq(&endpoints.start, &Point3::new(0.0, 1.0, -5.0));
        assert_point_eq(&endpoints.end, &Point3::new(0.0, 1.0, 5.0));
    }

    #[test]
    fn test_wall_endpoints_rotation_quarter_turn() {
        let endpoints = calculate_wall_endpoints(&Point3::new(0.0, 2.0, 0.0), FRAC_PI_2, 10.0);
        assert_point_eq(&endpoints.start, &Point3::new(-5.0, 2.0, 0.0));
        assert_point_eq(&endpoints.end, &Point3::new(5.0, 2.0, 0.0));
        assert_point_eq(&endpoints.midpoint(), &Point3::new(0.0, 2.0, 0.0));
        assert!((endpoints.length() - 10.0).abs() < TOL);
    }

    #[test]
    fn test_distance_to_line_clamps_to_segment() {
        let start = Point3::new(0.0, 0.0, 0.0);
        let end = Point3::new(10.0, 0.0, 0.0);

        // 线段中部
        assert!((distance_to_line(&Point3::new(5.0, 0.0, 3.0), &start, &end) - 3.0).abs() < TOL);
        // 线段外侧应取端点距离
        assert!((distance_to_line(&Point3::new(-3.0, 0.0, 4.0), &start, &end) - 5.0).abs() < TOL);
        // 退化线段
        assert!((distance_to_line(&Point3::new(3.0, 0.0, 4.0), &start, &start) - 5.0).abs() < TOL);
    }

    #[test]
    fn test_angle_between_vectors() {
        let x = Vector3::x();
        let z = Vector3::z();
        assert!((angle_between_vectors(&x, &z) - FRAC_PI_2).abs() < TOL);
        assert!((angle_between_vectors(&x, &-x) - PI).abs() < TOL);
        assert_eq!(angle_between_vectors(&x, &Vector3::zeros()), 0.0);
    }

    #[test]
    fn test_collinear() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 1.0);
        let c = Point3::new(2.0, 0.0, 2.0);
        let d = Point3::new(2.0, 0.0, 0.0);
        assert!(are_points_collinear(&a, &b, &c, DEFAULT_COLLINEAR_TOLERANCE));
        assert!(!are_points_collinear(&a, &b, &d, DEFAULT_COLLINEAR_TOLERANCE));
    }

    #[test]
    fn test_bounding_box_centered() {
        let bbox = bounding_box(&Point3::new(1.0, 1.0, 1.0), &Dimensions::new(2.0, 4.0, 6.0));
        assert_point_eq(&bbox.min, &Point3::new(0.0, -1.0, -2.0));
        assert_point_eq(&bbox.max, &Point3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(-FRAC_PI_2) - 3.0 * FRAC_PI_2).abs() < TOL);
        assert!((normalize_angle(TAU + FRAC_PI_4) - FRAC_PI_4).abs() < TOL);
        assert_eq!(normalize_angle(0.0), 0.0);
        let tiny = normalize_angle(-1e-18);
        assert!((0.0..TAU).contains(&tiny));
    }

    #[test]
    fn test_angle_between_points() {
        let a = Point3::origin();
        assert!((angle_between_points(&a, &Point3::new(0.0, 0.0, 1.0)) - FRAC_PI_2).abs() < TOL);
        assert!((angle_between_points(&a, &Point3::new(-1.0, 0.0, 0.0)) - PI).abs() < TOL);
    }

    #[test]
    fn test_building_bounding_box() {
        let mut building = Building::new("bbox");
        assert!(building_bounding_box(&building).is_none());

        building = building
            .with_element(BuildingElement::wall(Point3::origin(), 0.0, 10.0, 3.0, 0.2))
            .unwrap();
        let bbox = building_bounding_box(&building).unwrap();
        assert!((bbox.min.z + 5.0).abs() < TOL);
        assert!((bbox.max.z - 5.0).abs() < TOL);
        assert!((bbox.max.y - 3.0).abs() < TOL);
        assert!((bbox.size().x - 0.2).abs() < TOL);
    }
}
