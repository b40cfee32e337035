//! ArchCAD 物理同步服务
//!
//! 将建筑快照中的墙、楼板、屋顶镜像为物理世界中的刚体和碰撞体，提供：
//! - 增量同步与按序执行的变更命令
//! - 构件间的穿透检测
//! - 基于碰撞体角点的捕捉点
//! - 重力、动态刚体和关节组成的沙盒
//! - 调试线框缓冲
//!
//! 物理引擎隐藏在 [`world::PhysicsWorld`] 之后，默认实现基于 Rapier。

pub mod command;
pub mod config;
pub mod error;
pub mod rapier_world;
pub mod service;
pub mod world;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::command::{CollisionPair, PhysicsCommand};
    pub use crate::config::PhysicsConfig;
    pub use crate::error::PhysicsError;
    pub use crate::rapier_world::{RapierLoader, RapierWorld};
    pub use crate::service::{PhysicsService, ServiceState};
    pub use crate::world::{BodyHandle, BodyKind, DebugRenderBuffers, JointHandle, PhysicsWorld, WorldLoader};
}
