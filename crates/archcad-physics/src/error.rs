//! 物理服务错误定义

use crate::world::BodyHandle;
use archcad_core::element::{ElementId, ElementType};
use thiserror::Error;

/// 物理服务错误
///
/// 实现 `Clone`，以便共享的初始化 future 将同一个失败交给所有等待者。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("Failed to load physics engine: {0}")]
    EngineLoad(String),

    #[error("Failed to initialize physics world: {0}")]
    EngineInit(String),

    #[error("Physics service has been destroyed")]
    Destroyed,

    #[error("Invalid dimensions for element {element}: {width} x {height} x {depth}")]
    InvalidDimensions {
        element: ElementId,
        width: f64,
        height: f64,
        depth: f64,
    },

    #[error("Invalid transform for element {0}")]
    InvalidTransform(ElementId),

    #[error("Unknown element: {0}")]
    UnknownElement(ElementId),

    #[error("Unknown body handle: {0:?}")]
    UnknownBody(BodyHandle),

    #[error("Element type {0} has no collider shape")]
    UnsupportedShape(ElementType),
}
