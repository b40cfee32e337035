//! ArchCAD 核心几何引擎
//!
//! 建筑设计工具的几何与约束内核：
//! - 几何内核：网格捕捉、距离、墙体端点、包围盒
//! - 墙体坐标：世界坐标与墙体局部坐标的双向变换
//! - 洞口校验：门窗越界、重叠、间距检查与合法位置搜索
//! - 捕捉引擎：墙端点/中点捕捉
//! - 文档：不可变的建筑快照与发布快照的文档存储
//!
//! # 坐标约定
//!
//! Y 轴向上，单位为米。偏航角为 0 的墙沿 +Z 方向延伸。
//!
//! # 示例
//!
//! ```rust
//! use archcad_core::prelude::*;
//!
//! // 创建一面墙并在上面开窗
//! let wall = BuildingElement::wall(Point3::origin(), 0.0, 5.0, 2.5, 0.24);
//! let window = Opening::window(wall.id.clone(), 2.5, 1.0);
//!
//! let check = validate_opening_placement(wall.as_wall().unwrap(), &window, None);
//! assert!(check.valid);
//! ```

pub mod document;
pub mod element;
pub mod error;
pub mod geometry;
pub mod math;
pub mod opening;
pub mod placement;
pub mod snap;
pub mod wall_coords;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::document::{Building, BuildingMetadata, DocumentStore};
    pub use crate::element::{
        BuildingElement, Dimensions, ElementId, ElementKind, ElementType, Opening, OpeningKind, Roof, RoofType,
        Rotation, Wall,
    };
    pub use crate::error::DocumentError;
    pub use crate::geometry::{calculate_wall_endpoints, snap_to_grid, WallEndpoints};
    pub use crate::math::{BoundingBox3, Point3, Vector3};
    pub use crate::opening::{
        find_valid_opening_position, validate_opening_placement, validate_opening_spacing, OpeningValidation,
        PlacementIssue,
    };
    pub use crate::placement::PlacementConfig;
    pub use crate::snap::{ConstraintEngine, SnapConfig, SnapMask, SnapPoint, SnapResult, SnapType};
    pub use crate::wall_coords::{global_to_local, local_to_global, wall_normal, WallFrame};
}
