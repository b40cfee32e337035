//! 物理世界配置

use crate::error::PhysicsError;
use archcad_core::math::Vector3;
use serde::{Deserialize, Serialize};

/// 物理世界配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// 启用重力时的重力加速度
    pub gravity: Vector3,
    /// 固定步长（秒）
    pub timestep: f64,
    /// 楼板/屋顶碰撞体的最小边长（米）
    pub min_dimension: f64,
    /// 碰撞报告的穿透深度阈值（米）
    pub penetration_tolerance: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::new(0.0, -9.81, 0.0),
            timestep: 1.0 / 60.0,
            min_dimension: 0.01,
            penetration_tolerance: 1e-3,
        }
    }
}

impl PhysicsConfig {
    /// 检查配置是否可用于创建物理世界
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(PhysicsError::EngineInit("gravity must be finite".into()));
        }
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(PhysicsError::EngineInit(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        if !(self.min_dimension >= 0.0) || !(self.penetration_tolerance >= 0.0) {
            return Err(PhysicsError::EngineInit("tolerances must be non-negative".into()));
        }
        Ok(())
    }
}
