//! 建筑构件定义
//!
//! 所有构件共享通用属性（位置、旋转、尺寸、楼层等），
//! 具体类型由封闭的 [`ElementKind`] 和类型标签 [`ElementType`] 区分：
//! - 墙 (Wall)：拥有其上的洞口
//! - 楼板 (Floor)
//! - 屋顶 (Roof)
//! - 门/窗 (Opening)：位置使用所属墙体的局部坐标

use crate::math::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 构件唯一标识符
///
/// 在建筑的构件集合内唯一且在其生命周期内不变。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// 生成新的随机ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 欧拉角旋转（弧度）
///
/// 墙体相关计算只使用 `y`（绕竖直轴的偏航角），`x`/`z` 仅透传。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Rotation {
    pub const ZERO: Rotation = Rotation { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 仅绕Y轴旋转
    pub fn yaw(y: f64) -> Self {
        Self { x: 0.0, y, z: 0.0 }
    }
}

/// 构件尺寸（米）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64, depth: f64) -> Self {
        Self { width, height, depth }
    }

    /// 最小边长
    pub fn min_extent(&self) -> f64 {
        self.width.min(self.height).min(self.depth)
    }

    pub fn is_finite(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.depth.is_finite()
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// 构件类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Wall,
    Floor,
    Roof,
    Door,
    Window,
}

impl ElementType {
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Wall => "wall",
            ElementType::Floor => "floor",
            ElementType::Roof => "roof",
            ElementType::Door => "door",
            ElementType::Window => "window",
        }
    }

    /// 结构构件（墙、楼板、屋顶）在物理世界中拥有碰撞体
    pub fn is_structural(&self) -> bool {
        match self {
            ElementType::Wall | ElementType::Floor | ElementType::Roof => true,
            ElementType::Door | ElementType::Window => false,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 墙体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    /// 沿局部X轴的长度
    pub length: f64,
    pub height: f64,
    /// 沿局部Z轴的厚度
    pub thickness: f64,
    /// 墙上的洞口（墙体拥有其生命周期）
    pub openings: Vec<Opening>,
}

impl Wall {
    pub fn new(length: f64, height: f64, thickness: f64) -> Self {
        Self {
            length,
            height,
            thickness,
            openings: Vec::new(),
        }
    }

    pub fn opening(&self, id: &ElementId) -> Option<&Opening> {
        self.openings.iter().find(|o| &o.id == id)
    }

    /// 墙面面积（长 × 高）
    pub fn area(&self) -> f64 {
        self.length * self.height
    }
}

/// 屋顶形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoofType {
    Flat,
    Gabled,
    Hipped,
    Shed,
}

/// 屋顶
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roof {
    pub roof_type: RoofType,
    /// 坡度（度）
    pub pitch: f64,
    /// 挑檐（米）
    pub overhang: f64,
}

/// 洞口类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpeningKind {
    Door,
    Window,
}

impl OpeningKind {
    pub fn element_type(&self) -> ElementType {
        match self {
            OpeningKind::Door => ElementType::Door,
            OpeningKind::Window => ElementType::Window,
        }
    }
}

/// 门窗洞口
///
/// `position` 为所属墙体的局部坐标：
/// `x` 为距墙起点的距离（洞口中心），`y` 为距墙底的高度（洞口底边），`z ≈ 0`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opening {
    pub id: ElementId,
    pub wall_id: ElementId,
    pub kind: OpeningKind,
    pub position: Point3,
    pub width: f64,
    pub height: f64,
    pub material_id: String,
    /// 传热系数 W/(m²K)，透传数据
    pub u_value: f64,
}

impl Opening {
    /// 创建默认尺寸的窗
    pub fn window(wall_id: ElementId, x: f64, y: f64) -> Self {
        Self {
            id: ElementId::new(),
            wall_id,
            kind: OpeningKind::Window,
            position: Point3::new(x, y, 0.0),
            width: defaults::WINDOW_WIDTH,
            height: defaults::WINDOW_HEIGHT,
            material_id: defaults::WINDOW_MATERIAL.to_string(),
            u_value: defaults::WINDOW_U_VALUE,
        }
    }

    /// 创建默认尺寸的门（门槛位于墙底）
    pub fn door(wall_id: ElementId, x: f64) -> Self {
        Self {
            id: ElementId::new(),
            wall_id,
            kind: OpeningKind::Door,
            position: Point3::new(x, 0.0, 0.0),
            width: defaults::DOOR_WIDTH,
            height: defaults::DOOR_HEIGHT,
            material_id: defaults::DOOR_MATERIAL.to_string(),
            u_value: defaults::DOOR_U_VALUE,
        }
    }

    pub fn with_id(mut self, id: impl Into<ElementId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// 返回同一洞口在新局部X位置的副本
    pub fn at_x(&self, x: f64) -> Self {
        let mut moved = self.clone();
        moved.position.x = x;
        moved
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// 构件的具体类型数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    Wall(Wall),
    Floor,
    Roof(Roof),
    Opening(Opening),
}

/// 建筑构件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingElement {
    pub id: ElementId,
    /// 世界坐标位置
    pub position: Point3,
    pub rotation: Rotation,
    pub dimensions: Dimensions,
    pub floor_level: i32,
    pub visible: bool,
    pub locked: bool,
    pub material_id: String,
    /// 相连构件
    #[serde(default)]
    pub connections: BTreeSet<ElementId>,
    pub kind: ElementKind,
}

impl BuildingElement {
    fn base(position: Point3, rotation: Rotation, dimensions: Dimensions, material_id: &str, kind: ElementKind) -> Self {
        Self {
            id: ElementId::new(),
            position,
            rotation,
            dimensions,
            floor_level: 0,
            visible: true,
            locked: false,
            material_id: material_id.to_string(),
            connections: BTreeSet::new(),
            kind,
        }
    }

    /// 创建墙体
    ///
    /// 偏航角为0时墙沿 +Z 方向延伸，因此尺寸取
    /// `width = thickness, height, depth = length`，
    /// 绕Y轴旋转后的碰撞盒与墙体中心线重合。
    pub fn wall(position: Point3, rotation_y: f64, length: f64, height: f64, thickness: f64) -> Self {
        Self::base(
            position,
            Rotation::yaw(rotation_y),
            Dimensions::new(thickness, height, length),
            defaults::WALL_MATERIAL,
            ElementKind::Wall(Wall::new(length, height, thickness)),
        )
    }

    /// 创建楼板
    pub fn floor(position: Point3, dimensions: Dimensions) -> Self {
        Self::base(
            position,
            Rotation::ZERO,
            dimensions,
            defaults::FLOOR_MATERIAL,
            ElementKind::Floor,
        )
    }

    /// 创建屋顶
    pub fn roof(position: Point3, dimensions: Dimensions, roof_type: RoofType) -> Self {
        let pitch = match roof_type {
            RoofType::Flat => 0.0,
            RoofType::Gabled | RoofType::Hipped | RoofType::Shed => defaults::ROOF_PITCH,
        };
        Self::base(
            position,
            Rotation::ZERO,
            dimensions,
            defaults::ROOF_MATERIAL,
            ElementKind::Roof(Roof {
                roof_type,
                pitch,
                overhang: defaults::ROOF_OVERHANG,
            }),
        )
    }

    /// 将洞口包装为构件，构件ID与洞口ID一致
    ///
    /// 位置为所属墙体的局部坐标，尺寸取 `width × height × 0`。
    pub fn opening(opening: Opening) -> Self {
        let material_id = opening.material_id.clone();
        let dimensions = Dimensions::new(opening.width, opening.height, 0.0);
        let mut element = Self::base(
            opening.position,
            Rotation::ZERO,
            dimensions,
            &material_id,
            ElementKind::Opening(opening),
        );
        if let ElementKind::Opening(opening) = &element.kind {
            element.id = opening.id.clone();
        }
        element
    }

    pub fn with_id(mut self, id: impl Into<ElementId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_position(mut self, position: Point3) -> Self {
        self.position = position;
        self
    }

    pub fn element_type(&self) -> ElementType {
        match &self.kind {
            ElementKind::Wall(_) => ElementType::Wall,
            ElementKind::Floor => ElementType::Floor,
            ElementKind::Roof(_) => ElementType::Roof,
            ElementKind::Opening(opening) => opening.kind.element_type(),
        }
    }

    pub fn is_structural(&self) -> bool {
        self.element_type().is_structural()
    }

    pub fn as_wall(&self) -> Option<&Wall> {
        match &self.kind {
            ElementKind::Wall(wall) => Some(wall),
            _ => None,
        }
    }

    pub fn as_wall_mut(&mut self) -> Option<&mut Wall> {
        match &mut self.kind {
            ElementKind::Wall(wall) => Some(wall),
            _ => None,
        }
    }

    pub fn as_opening(&self) -> Option<&Opening> {
        match &self.kind {
            ElementKind::Opening(opening) => Some(opening),
            _ => None,
        }
    }
}

/// 构件默认参数
pub mod defaults {
    pub const WALL_HEIGHT: f64 = 2.5;
    pub const WALL_THICKNESS: f64 = 0.24;
    pub const WALL_LENGTH: f64 = 4.0;
    pub const WALL_MATERIAL: &str = "brick";

    pub const FLOOR_MATERIAL: &str = "concrete-slab";

    pub const ROOF_PITCH: f64 = 35.0;
    pub const ROOF_OVERHANG: f64 = 0.5;
    pub const ROOF_MATERIAL: &str = "roof-tiles";

    pub const WINDOW_WIDTH: f64 = 1.2;
    pub const WINDOW_HEIGHT: f64 = 1.4;
    pub const WINDOW_U_VALUE: f64 = 1.1;
    pub const WINDOW_MATERIAL: &str = "double-glazing";

    pub const DOOR_WIDTH: f64 = 0.9;
    pub const DOOR_HEIGHT: f64 = 2.1;
    pub const DOOR_U_VALUE: f64 = 1.8;
    pub const DOOR_MATERIAL: &str = "wood-door";

    /// 捕捉网格（米）
    pub const GRID_SIZE: f64 = 0.1;

    pub const MIN_WALL_LENGTH: f64 = 0.5;
    pub const MAX_WALL_LENGTH: f64 = 50.0;
    pub const MIN_WALL_HEIGHT: f64 = 2.0;
    pub const MAX_WALL_HEIGHT: f64 = 6.0;
    pub const MIN_WALL_THICKNESS: f64 = 0.1;
    pub const MAX_WALL_THICKNESS: f64 = 1.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_tags() {
        let wall = BuildingElement::wall(Point3::origin(), 0.0, 4.0, 2.5, 0.24);
        assert_eq!(wall.element_type(), ElementType::Wall);
        assert!(wall.is_structural());
        assert_eq!(wall.dimensions, Dimensions::new(0.24, 2.5, 4.0));

        let window = Opening::window(wall.id.clone(), 2.0, 1.0).with_id("win-1");
        let element = BuildingElement::opening(window);
        assert_eq!(element.element_type(), ElementType::Window);
        assert_eq!(element.id.as_str(), "win-1");
        assert!(!element.is_structural());
    }

    #[test]
    fn test_element_ids_are_unique() {
        let a = ElementId::new();
        let b = ElementId::new();
        assert_ne!(a, b);
        assert_eq!(ElementId::from("wall-1").as_str(), "wall-1");
    }

    #[test]
    fn test_element_serde_tag() {
        let roof = BuildingElement::roof(Point3::new(0.0, 2.5, 0.0), Dimensions::new(10.0, 0.2, 10.0), RoofType::Flat)
            .with_id("roof-1");
        let json = serde_json::to_value(&roof).unwrap();
        assert_eq!(json["id"], "roof-1");
        assert_eq!(json["kind"]["type"], "roof");
        assert_eq!(json["kind"]["roof_type"], "flat");

        let back: BuildingElement = serde_json::from_value(json).unwrap();
        assert_eq!(back, roof);
    }
}
