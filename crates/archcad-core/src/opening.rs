//! 门窗洞口校验与定位搜索
//!
//! 所有计算均在墙体局部二维坐标中进行：X 沿墙长度，Y 为高度。

use crate::element::{ElementId, Opening, Wall};
use crate::math::Point3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 洞口距墙体边缘的默认安全余量
pub const DEFAULT_MARGIN: f64 = 0.1;

/// 建议的边缘距离，小于该值产生警告
pub const RECOMMENDED_EDGE_MARGIN: f64 = 0.2;

/// 洞口面积占墙面面积的警告阈值
pub const LARGE_OPENING_RATIO: f64 = 0.8;

/// 定位搜索步长
pub const SEARCH_STEP: f64 = 0.1;

/// 洞口间的默认最小间距
pub const DEFAULT_MIN_SPACING: f64 = 0.3;

/// 墙体局部二维范围
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds2D {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds2D {
    /// 向四周扩展
    pub fn padded(&self, padding: f64) -> Self {
        Self {
            min_x: self.min_x - padding,
            max_x: self.max_x + padding,
            min_y: self.min_y - padding,
            max_y: self.max_y + padding,
        }
    }
}

/// 洞口的局部范围（X 以中心对称展开，Y 从底边向上）
pub fn opening_bounds(opening: &Opening) -> Bounds2D {
    let half_width = opening.width / 2.0;
    Bounds2D {
        min_x: opening.position.x - half_width,
        max_x: opening.position.x + half_width,
        min_y: opening.position.y,
        max_y: opening.position.y + opening.height,
    }
}

/// 两个洞口是否重叠
///
/// 两个轴上都使用严格不等式，边缘恰好接触不算重叠。
pub fn do_openings_overlap(a: &Opening, b: &Opening) -> bool {
    let a = opening_bounds(a);
    let b = opening_bounds(b);

    let x_overlap = a.min_x < b.max_x && a.max_x > b.min_x;
    let y_overlap = a.min_y < b.max_y && a.max_y > b.min_y;
    x_overlap && y_overlap
}

/// 候选洞口是否与墙上已有洞口重叠
///
/// `exclude_id` 用于更新场景，跳过洞口自身。
pub fn check_opening_overlap(wall: &Wall, candidate: &Opening, exclude_id: Option<&ElementId>) -> bool {
    wall.openings
        .iter()
        .filter(|existing| Some(&existing.id) != exclude_id)
        .any(|existing| do_openings_overlap(candidate, existing))
}

/// 洞口是否位于墙体范围内（含余量，边界相等视为合法）
pub fn is_opening_within_wall_bounds(opening: &Opening, wall: &Wall, margin: f64) -> bool {
    let bounds = opening_bounds(opening);

    let fits_horizontally = bounds.min_x >= margin && bounds.max_x <= wall.length - margin;
    let fits_vertically = bounds.min_y >= margin && bounds.max_y <= wall.height - margin;
    fits_horizontally && fits_vertically
}

/// 洞口放置问题
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PlacementIssue {
    #[error("Opening extends beyond wall boundaries")]
    OutOfBounds,

    #[error("Opening overlaps with existing opening")]
    Overlap,

    #[error("Opening is very large relative to wall (>80% of wall area)")]
    LargeOpening,

    #[error("Opening is very close to wall edge")]
    NearHorizontalEdge,

    #[error("Opening is very close to wall top/bottom")]
    NearVerticalEdge,
}

/// 洞口放置校验结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OpeningValidation {
    /// 当且仅当没有错误时为 true
    pub valid: bool,
    pub errors: Vec<PlacementIssue>,
    /// 警告不影响 `valid`
    pub warnings: Vec<PlacementIssue>,
}

impl OpeningValidation {
    /// 所有错误的可读信息
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

/// 校验洞口放置
pub fn validate_opening_placement(wall: &Wall, opening: &Opening, exclude_id: Option<&ElementId>) -> OpeningValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !is_opening_within_wall_bounds(opening, wall, DEFAULT_MARGIN) {
        errors.push(PlacementIssue::OutOfBounds);
    }

    if check_opening_overlap(wall, opening, exclude_id) {
        errors.push(PlacementIssue::Overlap);
    }

    // 零面积墙体的比值为 NaN/inf，NaN 不会触发警告
    let area_ratio = opening.area() / wall.area();
    if area_ratio >= LARGE_OPENING_RATIO {
        warnings.push(PlacementIssue::LargeOpening);
    }

    let bounds = opening_bounds(opening);
    if bounds.min_x < RECOMMENDED_EDGE_MARGIN || bounds.max_x > wall.length - RECOMMENDED_EDGE_MARGIN {
        warnings.push(PlacementIssue::NearHorizontalEdge);
    }
    if bounds.min_y < RECOMMENDED_EDGE_MARGIN || bounds.max_y > wall.height - RECOMMENDED_EDGE_MARGIN {
        warnings.push(PlacementIssue::NearVerticalEdge);
    }

    OpeningValidation {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// 寻找洞口的合法位置
///
/// 顺序固定：先尝试 `preferred_x`，再以 0.1m 步长向左搜索到 `半宽 + 余量`，
/// 最后向右搜索到 `墙长 - 半宽 - 余量`。候选值按 `preferred_x ± i·步长` 计算，
/// 不累积误差。洞口自身若已在墙上，不与自己比较。
/// 只改变 X，Y/Z 保持原值；找不到时返回 `None`。
pub fn find_valid_opening_position(wall: &Wall, opening: &Opening, preferred_x: f64) -> Option<Point3> {
    let half_width = opening.width / 2.0;
    let min_x = half_width + DEFAULT_MARGIN;
    let max_x = wall.length - half_width - DEFAULT_MARGIN;

    let fits = |x: f64| {
        let candidate = opening.at_x(x);
        !check_opening_overlap(wall, &candidate, Some(&opening.id))
            && is_opening_within_wall_bounds(&candidate, wall, DEFAULT_MARGIN)
    };
    let at = |x: f64| Point3::new(x, opening.position.y, opening.position.z);

    if fits(preferred_x) {
        return Some(at(preferred_x));
    }

    let left = (1..)
        .map(|i| preferred_x - f64::from(i) * SEARCH_STEP)
        .take_while(|&x| x >= min_x);
    let right = (1..)
        .map(|i| preferred_x + f64::from(i) * SEARCH_STEP)
        .take_while(|&x| x <= max_x);

    left.chain(right).find(|&x| fits(x)).map(at)
}

/// 洞口间距检查结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpacingCheck {
    pub valid: bool,
    /// 与候选洞口间距不足的已有洞口
    pub conflicting_openings: Vec<Opening>,
}

/// 检查候选洞口与墙上已有洞口的最小间距
///
/// 已有洞口的范围向四周扩展 `min_spacing` 后与候选范围做闭区间相交测试，
/// 因此恰好相距 `min_spacing` 也视为冲突。
pub fn validate_opening_spacing(wall: &Wall, candidate: &Opening, min_spacing: f64) -> SpacingCheck {
    let new_bounds = opening_bounds(candidate);

    let conflicting_openings: Vec<Opening> = wall
        .openings
        .iter()
        .filter(|existing| existing.id != candidate.id)
        .filter(|existing| {
            let padded = opening_bounds(existing).padded(min_spacing);
            let horizontal = new_bounds.min_x <= padded.max_x && new_bounds.max_x >= padded.min_x;
            let vertical = new_bounds.min_y <= padded.max_y && new_bounds.max_y >= padded.min_y;
            horizontal && vertical
        })
        .cloned()
        .collect();

    SpacingCheck {
        valid: conflicting_openings.is_empty(),
        conflicting_openings,
    }
}
