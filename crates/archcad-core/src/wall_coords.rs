//! 墙体局部坐标系
//!
//! 世界坐标与墙体局部坐标之间的双射变换，用于门窗定位：
//! - 原点：墙体起点
//! - X 轴：沿墙方向 `normalize(end - start)`
//! - Y 轴：竖直向上 `(0, 1, 0)`
//! - Z 轴：墙体法线 `(-direction.z, 0, direction.x)`
//!
//! 法线符号约定：偏航角为 0 时墙沿 +Z 延伸，法线为 `(-1, 0, 0)`，
//! 该方向定义为"外侧"。
//!
//! 非墙构件按墙体工厂的尺寸约定处理（`depth` 为长度、`width` 为厚度）。

use crate::element::BuildingElement;
use crate::geometry::{calculate_wall_endpoints, snap_to_grid, WallEndpoints};
use crate::math::{Point3, Vector3};
use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// 洞口距墙端的最小结构余量（用于沿墙网格捕捉）
pub const WALL_END_MARGIN: f64 = 0.2;

/// 沿墙网格的默认间距
pub const DEFAULT_WALL_GRID: f64 = 0.5;

fn wall_length(element: &BuildingElement) -> f64 {
    element
        .as_wall()
        .map(|w| w.length)
        .unwrap_or(element.dimensions.depth)
}

/// 墙体局部坐标系
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallFrame {
    /// 墙体起点（世界坐标）
    pub origin: Point3,
    /// 局部 X 轴
    pub direction: Vector3,
    /// 局部 Y 轴
    pub up: Vector3,
    /// 局部 Z 轴
    pub normal: Vector3,
}

impl WallFrame {
    /// 由墙体构件建立局部坐标系
    pub fn from_element(element: &BuildingElement) -> Self {
        let endpoints = calculate_wall_endpoints(&element.position, element.rotation.y, wall_length(element));
        Self::from_endpoints(&endpoints, element.rotation.y)
    }

    /// 由端点建立局部坐标系
    ///
    /// 零长度墙体无法从端点求方向，退化为偏航角方向。
    pub fn from_endpoints(endpoints: &WallEndpoints, rotation_y: f64) -> Self {
        let delta = endpoints.end - endpoints.start;
        let direction = delta
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(|| Vector3::new(rotation_y.sin(), 0.0, rotation_y.cos()));
        let normal = Vector3::new(-direction.z, 0.0, direction.x);

        Self {
            origin: endpoints.start,
            direction,
            up: Vector3::y(),
            normal,
        }
    }

    /// 基变换矩阵（列向量依次为 X/Y/Z 轴）
    pub fn basis(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[self.direction, self.up, self.normal])
    }

    /// 局部到世界的刚体变换
    ///
    /// 基向量两两正交且为单位长度，因此旋转部分可直接由基矩阵构造。
    pub fn to_world(&self) -> Isometry3<f64> {
        let rotation = Rotation3::from_matrix_unchecked(self.basis());
        Isometry3::from_parts(
            Translation3::from(self.origin.coords),
            UnitQuaternion::from_rotation_matrix(&rotation),
        )
    }

    /// 世界坐标 → 局部坐标
    pub fn to_local_point(&self, world: &Point3) -> Point3 {
        // 正交基的逆即转置
        let relative = world - self.origin;
        Point3::from(self.basis().transpose() * relative)
    }

    /// 局部坐标 → 世界坐标
    pub fn to_world_point(&self, local: &Point3) -> Point3 {
        self.origin + self.basis() * local.coords
    }
}

/// 将世界坐标转换为墙体局部坐标
///
/// 返回值：`x` 为距墙起点的距离，`y` 为距墙底高度，`z` 为距墙面中线的距离。
pub fn global_to_local(world: &Point3, wall: &BuildingElement) -> Point3 {
    WallFrame::from_element(wall).to_local_point(world)
}

/// 将墙体局部坐标转换为世界坐标
pub fn local_to_global(local: &Point3, wall: &BuildingElement) -> Point3 {
    WallFrame::from_element(wall).to_world_point(local)
}

/// 墙体法线（单位向量，与墙方向垂直）
///
/// `outward = false` 时返回反向法线。
pub fn wall_normal(wall: &BuildingElement, outward: bool) -> Vector3 {
    let normal = WallFrame::from_element(wall).normal;
    if outward {
        normal
    } else {
        -normal
    }
}

/// 墙体局部坐标范围
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallLocalBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

/// 墙体在局部坐标中的范围，X/Y 始终从原点开始
pub fn wall_local_bounds(wall: &BuildingElement) -> WallLocalBounds {
    let (length, height, thickness) = match wall.as_wall() {
        Some(w) => (w.length, w.height, w.thickness),
        None => (wall.dimensions.depth, wall.dimensions.height, wall.dimensions.width),
    };

    WallLocalBounds {
        min_x: 0.0,
        max_x: length,
        min_y: 0.0,
        max_y: height,
        min_z: -thickness / 2.0,
        max_z: thickness / 2.0,
    }
}

/// 沿墙网格捕捉局部 X 坐标
///
/// 先按网格取整，再截断到 `[余量 + 半宽, 墙长 - 余量 - 半宽]`。
pub fn snap_to_wall_grid(local_x: f64, wall_length: f64, opening_width: f64, grid_size: f64) -> f64 {
    let half_width = opening_width / 2.0;
    let min_x = WALL_END_MARGIN + half_width;
    let max_x = wall_length - WALL_END_MARGIN - half_width;

    let snapped = snap_to_grid(local_x, grid_size);
    // 洞口比墙还宽时 min_x > max_x，取上界优先于下界
    snapped.max(min_x).min(max_x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, FRAC_PI_6, PI};

    const ROUND_TRIP_TOL: f64 = 1e-4;

    fn test_wall(rotation_y: f64) -> BuildingElement {
        BuildingElement::wall(Point3::origin(), rotation_y, 10.0, 3.0, 0.3).with_id("test-wall")
    }

    fn assert_close(actual: &Point3, expected: &Point3, tol: f64) {
        assert!(
            (actual - expected).norm() < tol,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_global_to_local_unrotated() {
        // 偏航角0：起点 (0,0,-5)，沿 +Z
        let wall = test_wall(0.0);
        let local = global_to_local(&Point3::new(0.0, 1.0, -2.0), &wall);
        assert_close(&local, &Point3::new(3.0, 1.0, 0.0), 1e-9);
    }

    #[test]
    fn test_global_to_local_with_center_offset() {
        let wall = test_wall(FRAC_PI_2).with_position(Point3::new(5.0, 0.0, 0.0));
        // 起点 (0,0,0)，沿 +X
        let local = global_to_local(&Point3::new(8.0, 1.0, 0.0), &wall);
        assert_close(&local, &Point3::new(8.0, 1.0, 0.0), 1e-9);
    }

    #[test]
    fn test_local_to_global_unrotated() {
        let wall = test_wall(0.0);
        let world = local_to_global(&Point3::new(5.0, 1.0, 0.0), &wall);
        assert_close(&world, &Point3::new(0.0, 1.0, 0.0), 1e-9);
    }

    #[test]
    fn test_round_trip_for_many_rotations() {
        let points = [
            Point3::new(4.0, 1.5, 0.0),
            Point3::new(2.0, 1.0, 2.0),
            Point3::new(-7.5, 0.3, 11.25),
            Point3::new(0.0, 0.0, 0.0),
        ];
        for rotation in [0.0, FRAC_PI_4, FRAC_PI_2, 2.0, PI, -1.3, 5.9] {
            let wall = test_wall(rotation).with_position(Point3::new(1.5, 0.2, -3.0));
            for p in &points {
                let back = local_to_global(&global_to_local(p, &wall), &wall);
                assert_close(&back, p, ROUND_TRIP_TOL);
            }
        }
    }

    #[test]
    fn test_isometry_matches_basis() {
        let wall = test_wall(0.7).with_position(Point3::new(2.0, 0.0, 1.0));
        let frame = WallFrame::from_element(&wall);
        let local = Point3::new(3.0, 1.2, 0.1);
        assert_close(&(frame.to_world() * local), &frame.to_world_point(&local), 1e-9);
    }

    #[test]
    fn test_wall_normal_perpendicular_and_unit() {
        for rotation in [0.0, FRAC_PI_6, FRAC_PI_4, FRAC_PI_2, 2.5, -0.4] {
            let wall = test_wall(rotation);
            let normal = wall_normal(&wall, true);
            let direction = Vector3::new(rotation.sin(), 0.0, rotation.cos());
            assert!(normal.dot(&direction).abs() < 1e-9);
            assert!((normal.norm() - 1.0).abs() < 1e-9);
            assert!(normal.y.abs() < 1e-12);
        }
    }

    #[test]
    fn test_wall_normal_sign_convention() {
        let wall = test_wall(0.0);
        let outward = wall_normal(&wall, true);
        let inward = wall_normal(&wall, false);
        assert!((outward - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-9);
        assert!((inward + outward).norm() < 1e-12);
    }

    #[test]
    fn test_wall_local_bounds() {
        let wall = BuildingElement::wall(Point3::new(7.0, 0.0, 3.0), 1.0, 5.0, 2.5, 0.4);
        let bounds = wall_local_bounds(&wall);
        assert_eq!(bounds.min_x, 0.0);
        assert_eq!(bounds.max_x, 5.0);
        assert_eq!(bounds.min_y, 0.0);
        assert_eq!(bounds.max_y, 2.5);
        assert_eq!(bounds.min_z, -0.2);
        assert_eq!(bounds.max_z, 0.2);
    }

    #[test]
    fn test_zero_length_wall_falls_back_to_yaw() {
        let wall = BuildingElement::wall(Point3::origin(), FRAC_PI_2, 0.0, 3.0, 0.3);
        let frame = WallFrame::from_element(&wall);
        assert!((frame.direction - Vector3::x()).norm() < 1e-9);
    }

    #[test]
    fn test_snap_to_wall_grid() {
        // 网格取整
        assert!((snap_to_wall_grid(3.2, 10.0, 1.2, DEFAULT_WALL_GRID) - 3.0).abs() < 1e-9);
        // 截断到左侧余量
        assert!((snap_to_wall_grid(0.1, 10.0, 1.2, DEFAULT_WALL_GRID) - 0.8).abs() < 1e-9);
        // 截断到右侧余量
        assert!((snap_to_wall_grid(9.9, 10.0, 1.2, DEFAULT_WALL_GRID) - 9.2).abs() < 1e-9);
    }
}
