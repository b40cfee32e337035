//! 物理世界抽象
//!
//! 服务层只通过 [`PhysicsWorld`] 与具体物理引擎交互，
//! 句柄是不透明的 `(index, generation)` 对，不暴露引擎类型。
//! 引擎通过 [`WorldLoader`] 异步加载。

use crate::config::PhysicsConfig;
use crate::error::PhysicsError;
use archcad_core::element::Rotation;
use archcad_core::math::{Point3, Vector3};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $name {
            pub fn from_raw_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            pub fn into_raw_parts(self) -> (u32, u32) {
                (self.index, self.generation)
            }
        }
    };
}

opaque_handle!(
    /// 刚体句柄
    BodyHandle
);
opaque_handle!(
    /// 碰撞体句柄
    ColliderHandle
);
opaque_handle!(
    /// 关节句柄
    JointHandle
);

/// 刚体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyKind {
    /// 固定，不受力
    Fixed,
    /// 由位置驱动的运动学刚体
    KinematicPositionBased,
    /// 受重力和碰撞影响
    Dynamic,
}

/// 刚体创建参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub translation: Point3,
    pub rotation: Rotation,
}

impl BodyDesc {
    pub fn new(kind: BodyKind, translation: Point3) -> Self {
        Self {
            kind,
            translation,
            rotation: Rotation::ZERO,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// 调试绘制缓冲
///
/// `vertices` 每条线段 6 个浮点（两个端点），`colors` 每个端点 4 个字节 RGBA。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugRenderBuffers {
    pub vertices: Vec<f32>,
    pub colors: Vec<u8>,
}

impl DebugRenderBuffers {
    pub fn line_count(&self) -> usize {
        self.vertices.len() / 6
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// 物理世界接口
pub trait PhysicsWorld: Send {
    /// 创建刚体
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle;

    /// 在刚体上挂载长方体碰撞体
    fn create_box_collider(&mut self, body: BodyHandle, half_extents: Vector3) -> Result<ColliderHandle, PhysicsError>;

    /// 删除刚体及其碰撞体和关节
    fn remove_body(&mut self, body: BodyHandle) -> bool;

    fn contains_body(&self, body: BodyHandle) -> bool;

    /// 推进一个固定步长
    fn step(&mut self);

    fn set_gravity(&mut self, gravity: Vector3);

    fn gravity(&self) -> Vector3;

    fn set_body_kind(&mut self, body: BodyHandle, kind: BodyKind) -> Result<(), PhysicsError>;

    fn body_kind(&self, body: BodyHandle) -> Option<BodyKind>;

    fn body_translation(&self, body: BodyHandle) -> Option<Point3>;

    /// 设置刚体位姿并唤醒
    fn set_body_pose(&mut self, body: BodyHandle, translation: Point3, rotation: Rotation) -> Result<(), PhysicsError>;

    /// 用球铰连接两个刚体，锚点为各自的局部坐标
    fn create_joint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Point3,
        anchor_b: Point3,
    ) -> Option<JointHandle>;

    fn remove_joint(&mut self, joint: JointHandle) -> bool;

    /// 长方体碰撞体在世界坐标下的 8 个角点
    fn collider_corners(&self, collider: ColliderHandle) -> Option<[Point3; 8]>;

    fn collider_body(&self, collider: ColliderHandle) -> Option<BodyHandle>;

    /// 穿透深度超过 `tolerance` 的碰撞体对
    fn intersecting_pairs(&self, tolerance: f64) -> Vec<(ColliderHandle, ColliderHandle)>;

    /// 碰撞体形状与关节的线框
    fn debug_render_buffers(&mut self) -> DebugRenderBuffers;

    fn body_count(&self) -> usize;

    /// 释放所有刚体、碰撞体和关节
    fn clear(&mut self);
}

/// 物理引擎加载器
pub trait WorldLoader: Send + Sync {
    fn load(&self, config: &PhysicsConfig) -> BoxFuture<'static, Result<Box<dyn PhysicsWorld>, PhysicsError>>;
}
