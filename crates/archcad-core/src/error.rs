//! 文档操作错误定义

use crate::element::ElementId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Wall not found: {0}")]
    WallNotFound(ElementId),

    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    #[error("Duplicate element id: {0}")]
    DuplicateId(ElementId),

    #[error("Cannot connect element to itself: {0}")]
    SelfConnection(ElementId),
}
