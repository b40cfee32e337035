//! 放置辅助计算
//!
//! 屋顶高度、墙面吸附、窗台高度等放置工具用到的小工具函数。
//! 非墙构件传入时一律忽略。

use crate::element::{BuildingElement, OpeningKind};
use crate::geometry::{distance_3d, distance_to_line, element_wall_endpoints, project_point_on_segment};
use crate::math::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// 放置参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// 窗台默认高度（距墙底）
    pub window_sill_height: f64,
    /// 门槛高度
    pub door_sill_height: f64,
    /// 屋顶高出最高墙体的距离
    pub roof_offset: f64,
    /// 附近没有墙体时的屋顶高度
    pub roof_default_height: f64,
    /// 判断点是否在墙上时，在半厚度之外的容差
    pub wall_snap_tolerance: f64,
    /// 计算屋顶高度时搜索墙体的半径
    pub roof_search_radius: f64,
    /// 最近墙体搜索的最大距离
    pub nearest_wall_max_distance: f64,
    /// 门窗贴墙时沿法线的偏移
    pub surface_offset: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            window_sill_height: 1.0,
            door_sill_height: 0.0,
            roof_offset: 0.1,
            roof_default_height: 3.0,
            wall_snap_tolerance: 0.1,
            roof_search_radius: 5.0,
            nearest_wall_max_distance: 1.0,
            surface_offset: 0.01,
        }
    }
}

impl PlacementConfig {
    /// 使用默认搜索半径计算屋顶高度
    pub fn roof_height<'a>(&self, position: &Point3, walls: impl IntoIterator<Item = &'a BuildingElement>) -> f64 {
        calculate_roof_height(position, walls, self.roof_search_radius, self)
    }

    /// 使用默认容差判断点是否在墙上
    pub fn is_on_wall(&self, position: &Point3, wall: &BuildingElement) -> bool {
        is_position_on_wall(position, wall, self.wall_snap_tolerance)
    }

    /// 在默认距离内查找最近墙体
    pub fn nearest_wall<'a>(
        &self,
        position: &Point3,
        walls: impl IntoIterator<Item = &'a BuildingElement>,
    ) -> Option<&'a BuildingElement> {
        find_nearest_wall(position, walls, self.nearest_wall_max_distance)
    }

    /// 墙面上按默认偏移的放置点
    pub fn surface_position(&self, point: &Point3, normal: &Vector3) -> Point3 {
        calculate_wall_surface_position(point, normal, self.surface_offset)
    }

    /// 门窗底边距墙底的高度
    pub fn sill_height(&self, kind: OpeningKind, wall_height: f64, opening_height: f64) -> f64 {
        match kind {
            OpeningKind::Door => self.door_sill_height,
            OpeningKind::Window => calculate_window_height(wall_height, opening_height, self),
        }
    }
}

/// 计算屋顶放置高度
///
/// 取搜索半径内（含边界）最高墙体的高度加上偏移；
/// 没有墙体时返回默认高度。只使用 `position` 的 XZ 分量。
pub fn calculate_roof_height<'a>(
    position: &Point3,
    walls: impl IntoIterator<Item = &'a BuildingElement>,
    search_radius: f64,
    config: &PlacementConfig,
) -> f64 {
    let ground = Point3::new(position.x, 0.0, position.z);

    let max_height = walls
        .into_iter()
        .filter_map(|element| Some((element.as_wall()?, element_wall_endpoints(element)?)))
        .filter(|(_, endpoints)| distance_to_line(&ground, &endpoints.start, &endpoints.end) <= search_radius)
        .map(|(wall, _)| wall.height)
        .fold(0.0_f64, f64::max);

    if max_height > 0.0 {
        max_height + config.roof_offset
    } else {
        config.roof_default_height
    }
}

/// 点是否位于墙体上
///
/// 到墙体中心线的距离不超过 `半厚度 + 容差`，且投影落在墙体两端之间。
pub fn is_position_on_wall(position: &Point3, wall: &BuildingElement, tolerance: f64) -> bool {
    let (Some(data), Some(endpoints)) = (wall.as_wall(), element_wall_endpoints(wall)) else {
        return false;
    };

    let wall_length = endpoints.length();
    let projection = project_point_on_segment(position, &endpoints.start, &endpoints.end);
    let distance_from_line = distance_3d(position, &projection);

    distance_from_line <= data.thickness / 2.0 + tolerance
        && distance_3d(&projection, &endpoints.start) <= wall_length
        && distance_3d(&projection, &endpoints.end) <= wall_length
}

/// 查找最近的墙体
///
/// 距离必须严格小于 `max_distance`；距离相同时保留先出现的墙体。
pub fn find_nearest_wall<'a>(
    position: &Point3,
    walls: impl IntoIterator<Item = &'a BuildingElement>,
    max_distance: f64,
) -> Option<&'a BuildingElement> {
    let mut nearest = None;
    let mut min_distance = max_distance;

    for element in walls {
        let Some(endpoints) = element_wall_endpoints(element) else {
            continue;
        };
        let distance = distance_to_line(position, &endpoints.start, &endpoints.end);
        if distance < min_distance {
            min_distance = distance;
            nearest = Some(element);
        }
    }

    nearest
}

/// 沿法线偏移得到墙面上的放置点
pub fn calculate_wall_surface_position(point: &Point3, normal: &Vector3, offset: f64) -> Point3 {
    point + normal * offset
}

/// 窗台高度
///
/// 默认窗台高度放不下时，窗户在墙高内垂直居中。
pub fn calculate_window_height(wall_height: f64, window_height: f64, config: &PlacementConfig) -> f64 {
    if config.window_sill_height + window_height > wall_height {
        (wall_height - window_height) / 2.0
    } else {
        config.window_sill_height
    }
}
