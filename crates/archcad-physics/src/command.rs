//! 物理命令与碰撞结果

use archcad_core::element::{BuildingElement, ElementId, Rotation};
use archcad_core::math::Point3;
use futures::channel::oneshot;
use serde::{Deserialize, Serialize};

/// 物理世界变更命令
///
/// 命令按提交顺序逐条执行。
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsCommand {
    /// 为构件创建刚体和碰撞体（已存在时忽略）
    Add { element: BuildingElement },
    /// 删除构件的刚体和碰撞体（不存在时忽略）
    Remove { element_id: ElementId },
    /// 更新构件刚体的位姿
    UpdateTransform {
        element_id: ElementId,
        position: Point3,
        rotation: Rotation,
    },
}

impl PhysicsCommand {
    pub fn add(element: BuildingElement) -> Self {
        Self::Add { element }
    }

    pub fn remove(element_id: ElementId) -> Self {
        Self::Remove { element_id }
    }

    pub fn update_transform(element_id: ElementId, position: Point3, rotation: Rotation) -> Self {
        Self::UpdateTransform {
            element_id,
            position,
            rotation,
        }
    }

    pub fn element_id(&self) -> &ElementId {
        match self {
            Self::Add { element } => &element.id,
            Self::Remove { element_id } | Self::UpdateTransform { element_id, .. } => element_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::UpdateTransform { .. } => "update-transform",
        }
    }
}

/// 命令队列条目
pub(crate) enum QueueItem {
    Command(PhysicsCommand),
    /// 之前的命令全部执行完后通知
    Barrier(oneshot::Sender<()>),
}

/// 一对相互穿透的构件，`a < b`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollisionPair {
    pub a: ElementId,
    pub b: ElementId,
}

impl CollisionPair {
    /// 构造有序对；两个 ID 相同时返回 `None`
    pub fn new(first: ElementId, second: ElementId) -> Option<Self> {
        match first.cmp(&second) {
            std::cmp::Ordering::Less => Some(Self { a: first, b: second }),
            std::cmp::Ordering::Greater => Some(Self { a: second, b: first }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn involves(&self, id: &ElementId) -> bool {
        &self.a == id || &self.b == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_pair_is_ordered() {
        let pair = CollisionPair::new("wall-b".into(), "wall-a".into()).unwrap();
        assert_eq!(pair.a.as_str(), "wall-a");
        assert_eq!(pair, CollisionPair::new("wall-a".into(), "wall-b".into()).unwrap());
        assert!(pair.involves(&"wall-b".into()));
        assert!(CollisionPair::new("x".into(), "x".into()).is_none());
    }

    #[test]
    fn test_command_element_id() {
        let wall = BuildingElement::wall(Point3::origin(), 0.0, 4.0, 2.5, 0.24).with_id("w1");
        assert_eq!(PhysicsCommand::add(wall).element_id().as_str(), "w1");
        let update = PhysicsCommand::update_transform("w1".into(), Point3::origin(), Rotation::ZERO);
        assert_eq!(update.name(), "update-transform");
        assert_eq!(update.element_id().as_str(), "w1");
    }
}
