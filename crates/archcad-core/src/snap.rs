//! 约束与捕捉引擎
//!
//! 基于当前建筑快照生成候选捕捉点，并为光标位置选择最佳捕捉目标。
//!
//! 支持的捕捉类型：
//! - 墙端点 (WallEndpoint)
//! - 墙中点 (WallMidpoint)
//! - 网格点 (Grid)，默认关闭
//! - 角度引导 (AngleGuide)，由绘制工具提供
//!
//! 引擎只持有建筑快照的引用，每次文档更新时整体替换，捕捉点不做缓存。

use crate::document::Building;
use crate::element::{BuildingElement, ElementId, ElementType, Rotation};
use crate::geometry::{calculate_wall_endpoints, distance_3d, snap_to_grid};
use crate::math::Point3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// 捕捉类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapType {
    /// 墙体端点
    WallEndpoint,
    /// 墙体中点
    WallMidpoint,
    /// 网格点
    Grid,
    /// 角度引导线
    AngleGuide,
}

impl SnapType {
    /// 获取捕捉类型的名称
    pub fn name(&self) -> &'static str {
        match self {
            SnapType::WallEndpoint => "墙端点",
            SnapType::WallMidpoint => "墙中点",
            SnapType::Grid => "网格点",
            SnapType::AngleGuide => "角度引导",
        }
    }

    /// 获取捕捉类型的快捷键
    pub fn shortcut(&self) -> &'static str {
        match self {
            SnapType::WallEndpoint => "END",
            SnapType::WallMidpoint => "MID",
            SnapType::Grid => "GRI",
            SnapType::AngleGuide => "ANG",
        }
    }

    /// 默认优先级（越小越优先）
    pub fn priority(&self) -> u8 {
        match self {
            SnapType::WallEndpoint => 1,
            SnapType::WallMidpoint => 2,
            SnapType::Grid => 3,
            SnapType::AngleGuide => 4,
        }
    }
}

/// 捕捉点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapPoint {
    /// 世界坐标
    pub position: Point3,
    pub snap_type: SnapType,
    /// 关联的构件ID（网格点没有）
    pub element_id: Option<ElementId>,
    /// 同距离时的优先级（越小越优先）
    pub priority: u8,
}

impl SnapPoint {
    pub fn new(position: Point3, snap_type: SnapType, element_id: Option<ElementId>) -> Self {
        Self {
            position,
            snap_type,
            element_id,
            priority: snap_type.priority(),
        }
    }
}

/// 捕捉掩码（位域，用于快速启用/禁用捕捉类型）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapMask {
    bits: u8,
}

impl SnapMask {
    pub const WALL_ENDPOINT: u8 = 1 << 0;
    pub const WALL_MIDPOINT: u8 = 1 << 1;
    pub const GRID: u8 = 1 << 2;
    pub const ANGLE_GUIDE: u8 = 1 << 3;

    pub const NONE: SnapMask = SnapMask { bits: 0 };
    pub const ALL: SnapMask = SnapMask { bits: 0x0F };

    pub fn new(bits: u8) -> Self {
        Self { bits }
    }

    fn bit(snap_type: SnapType) -> u8 {
        match snap_type {
            SnapType::WallEndpoint => Self::WALL_ENDPOINT,
            SnapType::WallMidpoint => Self::WALL_MIDPOINT,
            SnapType::Grid => Self::GRID,
            SnapType::AngleGuide => Self::ANGLE_GUIDE,
        }
    }

    pub fn is_enabled(&self, snap_type: SnapType) -> bool {
        self.bits & Self::bit(snap_type) != 0
    }

    pub fn set(&mut self, snap_type: SnapType, enabled: bool) {
        let bit = Self::bit(snap_type);
        if enabled {
            self.bits |= bit;
        } else {
            self.bits &= !bit;
        }
    }

    pub fn toggle(&mut self, snap_type: SnapType) {
        let enabled = self.is_enabled(snap_type);
        self.set(snap_type, !enabled);
    }
}

impl Default for SnapMask {
    fn default() -> Self {
        // 网格捕捉默认关闭
        Self {
            bits: Self::WALL_ENDPOINT | Self::WALL_MIDPOINT | Self::ANGLE_GUIDE,
        }
    }
}

/// 捕捉配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapConfig {
    /// 捕捉半径（米），严格小于该距离才会捕捉
    pub capture_radius: f64,
    /// 网格间距（米）
    pub grid_spacing: f64,
    /// 启用的捕捉类型
    pub enabled: SnapMask,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            capture_radius: 0.5,
            grid_spacing: 0.5,
            enabled: SnapMask::default(),
        }
    }
}

/// 捕捉结果
#[derive(Debug, Clone, PartialEq)]
pub struct SnapResult {
    /// 捕捉后的位置；未捕捉时为原始光标位置
    pub position: Point3,
    /// 建议的放置朝向
    pub rotation: Rotation,
    pub snapped: bool,
    /// 被选中的捕捉点（最多一个）
    pub snap_points: Vec<SnapPoint>,
}

/// 约束引擎
///
/// 负责生成捕捉点并做出捕捉决策
#[derive(Debug, Clone)]
pub struct ConstraintEngine {
    building: Arc<Building>,
    config: SnapConfig,
}

impl ConstraintEngine {
    pub fn new(building: Arc<Building>, config: SnapConfig) -> Self {
        Self { building, config }
    }

    /// 替换持有的建筑快照
    pub fn update_building(&mut self, building: Arc<Building>) {
        self.building = building;
    }

    pub fn building(&self) -> &Building {
        &self.building
    }

    /// 获取配置
    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    /// 获取配置（可变）
    pub fn config_mut(&mut self) -> &mut SnapConfig {
        &mut self.config
    }

    /// 生成所有墙体的捕捉点
    ///
    /// 按构件顺序，每面墙依次输出起点、终点、中点。
    pub fn generate_snap_points(&self) -> Vec<SnapPoint> {
        let mask = self.config.enabled;
        let mut points = Vec::with_capacity(self.building.elements.len() * 3);

        for element in &self.building.elements {
            let Some(wall) = element.as_wall() else {
                continue;
            };
            let endpoints = calculate_wall_endpoints(&element.position, element.rotation.y, wall.length);

            if mask.is_enabled(SnapType::WallEndpoint) {
                points.push(SnapPoint::new(endpoints.start, SnapType::WallEndpoint, Some(element.id.clone())));
                points.push(SnapPoint::new(endpoints.end, SnapType::WallEndpoint, Some(element.id.clone())));
            }
            if mask.is_enabled(SnapType::WallMidpoint) {
                points.push(SnapPoint::new(endpoints.midpoint(), SnapType::WallMidpoint, Some(element.id.clone())));
            }
        }

        points
    }

    /// 网格捕捉候选（XZ 平面取整，高度不变）
    fn grid_candidate(&self, cursor: &Point3) -> Option<SnapPoint> {
        if !self.config.enabled.is_enabled(SnapType::Grid) {
            return None;
        }
        let spacing = self.config.grid_spacing;
        let grid_point = Point3::new(snap_to_grid(cursor.x, spacing), cursor.y, snap_to_grid(cursor.z, spacing));
        Some(SnapPoint::new(grid_point, SnapType::Grid, None))
    }

    /// 寻找最佳捕捉点
    ///
    /// 取距离严格小于捕捉半径的最近点；距离相同时保留先生成的点。
    /// 捕捉到墙上的点且待放置的是门窗时，朝向与该墙对齐。
    pub fn find_snap(&self, cursor: &Point3, element_to_place: Option<&BuildingElement>) -> SnapResult {
        let mut candidates = self.generate_snap_points();
        candidates.extend(self.grid_candidate(cursor));

        let mut best: Option<(f64, &SnapPoint)> = None;
        for point in &candidates {
            let distance = distance_3d(cursor, &point.position);
            let limit = best.map_or(self.config.capture_radius, |(d, _)| d);
            if distance < limit {
                best = Some((distance, point));
            }
        }

        match best {
            Some((distance, point)) => {
                trace!(
                    snap_type = point.snap_type.shortcut(),
                    distance,
                    "snapped cursor"
                );
                SnapResult {
                    position: point.position,
                    rotation: self.alignment_for(point, element_to_place),
                    snapped: true,
                    snap_points: vec![point.clone()],
                }
            }
            None => SnapResult {
                position: *cursor,
                rotation: Rotation::ZERO,
                snapped: false,
                snap_points: Vec::new(),
            },
        }
    }

    fn alignment_for(&self, point: &SnapPoint, element_to_place: Option<&BuildingElement>) -> Rotation {
        let places_opening = element_to_place
            .map(|e| matches!(e.element_type(), ElementType::Door | ElementType::Window))
            .unwrap_or(false);
        if !places_opening {
            return Rotation::ZERO;
        }

        point
            .element_id
            .as_ref()
            .and_then(|id| self.building.element(id))
            .map(|wall| Rotation::yaw(wall.rotation.y))
            .unwrap_or(Rotation::ZERO)
    }

    /// 检查放置是否违反约束
    ///
    /// 目前没有约束规则，总是允许。
    pub fn validate_placement(&self, _element: &BuildingElement) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Opening;
    use crate::math::EPSILON;
    use std::f64::consts::FRAC_PI_2;

    fn building_with_walls(walls: Vec<BuildingElement>) -> Arc<Building> {
        let mut building = Building::new("snap");
        for wall in walls {
            building = building.with_element(wall).unwrap();
        }
        Arc::new(building)
    }

    fn x_wall() -> BuildingElement {
        // 起点 (-5,0,0)，终点 (5,0,0)
        BuildingElement::wall(Point3::origin(), FRAC_PI_2, 10.0, 3.0, 0.2).with_id("wall-x")
    }

    #[test]
    fn test_snap_mask() {
        let mut mask = SnapMask::default();
        assert!(mask.is_enabled(SnapType::WallEndpoint));
        assert!(mask.is_enabled(SnapType::WallMidpoint));
        assert!(!mask.is_enabled(SnapType::Grid));

        mask.set(SnapType::Grid, true);
        assert!(mask.is_enabled(SnapType::Grid));

        mask.toggle(SnapType::WallEndpoint);
        assert!(!mask.is_enabled(SnapType::WallEndpoint));
    }

    #[test]
    fn test_snap_type_labels() {
        assert_eq!(SnapType::WallEndpoint.shortcut(), "END");
        assert_eq!(SnapType::WallMidpoint.name(), "墙中点");
    }

    #[test]
    fn test_generate_snap_points_order() {
        let other = BuildingElement::wall(Point3::new(0.0, 0.0, 4.0), 0.0, 2.0, 3.0, 0.2).with_id("wall-z");
        let floor = BuildingElement::floor(Point3::origin(), Default::default());
        let mut building = Building::new("order").with_element(x_wall()).unwrap();
        building = building.with_element(floor).unwrap();
        building = building.with_element(other).unwrap();

        let engine = ConstraintEngine::new(Arc::new(building), SnapConfig::default());
        let points = engine.generate_snap_points();
        assert_eq!(points.len(), 6);

        let types: Vec<_> = points.iter().map(|p| p.snap_type).collect();
        assert_eq!(
            types,
            vec![
                SnapType::WallEndpoint,
                SnapType::WallEndpoint,
                SnapType::WallMidpoint,
                SnapType::WallEndpoint,
                SnapType::WallEndpoint,
                SnapType::WallMidpoint,
            ]
        );
        assert_eq!(points[0].priority, 1);
        assert_eq!(points[2].priority, 2);
        assert!((points[0].position - Point3::new(-5.0, 0.0, 0.0)).norm() < EPSILON);
        assert!((points[5].position - Point3::new(0.0, 0.0, 4.0)).norm() < EPSILON);
        assert_eq!(points[3].element_id.as_ref().map(|id| id.as_str()), Some("wall-z"));
    }

    #[test]
    fn test_find_snap_within_radius() {
        let engine = ConstraintEngine::new(building_with_walls(vec![x_wall()]), SnapConfig::default());

        let result = engine.find_snap(&Point3::new(4.8, 0.0, 0.1), None);
        assert!(result.snapped);
        assert!((result.position - Point3::new(5.0, 0.0, 0.0)).norm() < EPSILON);
        assert_eq!(result.snap_points.len(), 1);
        assert_eq!(result.snap_points[0].snap_type, SnapType::WallEndpoint);
    }

    #[test]
    fn test_find_snap_outside_radius() {
        let engine = ConstraintEngine::new(building_with_walls(vec![x_wall()]), SnapConfig::default());

        let cursor = Point3::new(2.5, 0.0, 0.0);
        let result = engine.find_snap(&cursor, None);
        assert!(!result.snapped);
        assert_eq!(result.position, cursor);
        assert!(result.snap_points.is_empty());

        // 恰好等于半径时不捕捉
        let on_radius = Point3::new(0.0, 0.0, 0.5);
        assert!(!engine.find_snap(&on_radius, None).snapped);
    }

    #[test]
    fn test_find_snap_tie_keeps_first_generated() {
        // 两面墙共享端点 (0,0,5)
        let a = BuildingElement::wall(Point3::origin(), 0.0, 10.0, 3.0, 0.2).with_id("wall-a");
        let b = BuildingElement::wall(Point3::new(0.0, 0.0, 7.0), 0.0, 4.0, 3.0, 0.2).with_id("wall-b");
        let engine = ConstraintEngine::new(building_with_walls(vec![a, b]), SnapConfig::default());

        let result = engine.find_snap(&Point3::new(0.1, 0.0, 5.0), None);
        assert!(result.snapped);
        assert_eq!(result.snap_points[0].element_id.as_ref().map(|id| id.as_str()), Some("wall-a"));
    }

    #[test]
    fn test_update_building_replaces_snapshot() {
        let mut engine = ConstraintEngine::new(Arc::new(Building::new("empty")), SnapConfig::default());
        assert!(engine.generate_snap_points().is_empty());

        engine.update_building(building_with_walls(vec![x_wall()]));
        assert_eq!(engine.generate_snap_points().len(), 3);
    }

    #[test]
    fn test_grid_candidate_when_enabled() {
        let mut config = SnapConfig::default();
        config.enabled.set(SnapType::Grid, true);
        let engine = ConstraintEngine::new(Arc::new(Building::new("grid")), config);

        let result = engine.find_snap(&Point3::new(1.1, 0.3, 2.9), None);
        assert!(result.snapped);
        assert_eq!(result.snap_points[0].snap_type, SnapType::Grid);
        assert!((result.position - Point3::new(1.0, 0.3, 3.0)).norm() < EPSILON);
    }

    #[test]
    fn test_opening_aligns_with_wall() {
        let engine = ConstraintEngine::new(building_with_walls(vec![x_wall()]), SnapConfig::default());
        let window = BuildingElement::opening(Opening::window(ElementId::from("wall-x"), 1.0, 1.0));

        let result = engine.find_snap(&Point3::new(0.1, 0.0, 0.0), Some(&window));
        assert!(result.snapped);
        assert!((result.rotation.y - FRAC_PI_2).abs() < EPSILON);

        let plain = engine.find_snap(&Point3::new(0.1, 0.0, 0.0), None);
        assert_eq!(plain.rotation, Rotation::ZERO);
    }

    #[test]
    fn test_validate_placement_is_permissive() {
        let engine = ConstraintEngine::new(building_with_walls(vec![]), SnapConfig::default());
        assert!(engine.validate_placement(&x_wall()));
    }
}
