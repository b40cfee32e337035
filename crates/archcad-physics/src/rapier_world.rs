//! 基于 Rapier 的物理世界实现
//!
//! 领域层使用 f64，Rapier 使用 f32，转换只发生在本模块边界。
//! 碰撞体的世界位姿总是由父刚体当前位姿推出，
//! 因此更新变换后无需先步进即可查询角点和穿透。

use crate::config::PhysicsConfig;
use crate::error::PhysicsError;
use crate::world::{
    BodyDesc, BodyHandle, BodyKind, ColliderHandle, DebugRenderBuffers, JointHandle, PhysicsWorld, WorldLoader,
};
use archcad_core::element::Rotation;
use archcad_core::math::{Point3, Vector3};
use futures::future::{BoxFuture, FutureExt};
use rapier3d::na::{Translation3, UnitQuaternion};
use rapier3d::parry::bounding_volume::BoundingVolume;
use rapier3d::pipeline::{DebugRenderBackend, DebugRenderMode, DebugRenderObject, DebugRenderPipeline, DebugRenderStyle};
use rapier3d::prelude::*;
use tracing::debug;

fn to_rapier_vector(v: &Vector3) -> Vector<Real> {
    vector![v.x as Real, v.y as Real, v.z as Real]
}

fn to_rapier_point(p: &Point3) -> Point<Real> {
    point![p.x as Real, p.y as Real, p.z as Real]
}

fn from_rapier_point(p: &Point<Real>) -> Point3 {
    Point3::new(f64::from(p.x), f64::from(p.y), f64::from(p.z))
}

fn to_rapier_rotation(rotation: &Rotation) -> UnitQuaternion<Real> {
    UnitQuaternion::from_euler_angles(rotation.x as Real, rotation.y as Real, rotation.z as Real)
}

fn to_rapier_pose(translation: &Point3, rotation: &Rotation) -> Isometry<Real> {
    Isometry::from_parts(
        Translation3::from(to_rapier_vector(&translation.coords)),
        to_rapier_rotation(rotation),
    )
}

fn body_handle(handle: RigidBodyHandle) -> BodyHandle {
    let (index, generation) = handle.into_raw_parts();
    BodyHandle::from_raw_parts(index, generation)
}

fn rapier_body_handle(handle: BodyHandle) -> RigidBodyHandle {
    let (index, generation) = handle.into_raw_parts();
    RigidBodyHandle::from_raw_parts(index, generation)
}

fn collider_handle(handle: rapier3d::prelude::ColliderHandle) -> ColliderHandle {
    let (index, generation) = handle.into_raw_parts();
    ColliderHandle::from_raw_parts(index, generation)
}

fn rapier_collider_handle(handle: ColliderHandle) -> rapier3d::prelude::ColliderHandle {
    let (index, generation) = handle.into_raw_parts();
    rapier3d::prelude::ColliderHandle::from_raw_parts(index, generation)
}

fn rapier_body_type(kind: BodyKind) -> RigidBodyType {
    match kind {
        BodyKind::Fixed => RigidBodyType::Fixed,
        BodyKind::KinematicPositionBased => RigidBodyType::KinematicPositionBased,
        BodyKind::Dynamic => RigidBodyType::Dynamic,
    }
}

/// Rapier 物理世界
pub struct RapierWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    debug_pipeline: DebugRenderPipeline,
}

impl RapierWorld {
    /// 创建空世界，重力取自配置
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            gravity: to_rapier_vector(&config.gravity),
            integration_parameters: IntegrationParameters {
                dt: config.timestep as Real,
                ..IntegrationParameters::default()
            },
            physics_pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            debug_pipeline: DebugRenderPipeline::new(
                DebugRenderStyle::default(),
                DebugRenderMode::COLLIDER_SHAPES | DebugRenderMode::JOINTS,
            ),
        }
    }

    /// 碰撞体世界位姿：父刚体位姿乘以相对位姿
    fn collider_pose(&self, collider: &Collider) -> Option<Isometry<Real>> {
        let parent = self.bodies.get(collider.parent()?)?;
        let body_pose = Isometry::from_parts(Translation3::from(*parent.translation()), *parent.rotation());
        Some(match collider.position_wrt_parent() {
            Some(local) => body_pose * local,
            None => body_pose,
        })
    }
}

impl PhysicsWorld for RapierWorld {
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let body = RigidBodyBuilder::new(rapier_body_type(desc.kind))
            .pose(to_rapier_pose(&desc.translation, &desc.rotation))
            .build();
        body_handle(self.bodies.insert(body))
    }

    fn create_box_collider(&mut self, body: BodyHandle, half_extents: Vector3) -> Result<ColliderHandle, PhysicsError> {
        let parent = rapier_body_handle(body);
        if !self.bodies.contains(parent) {
            return Err(PhysicsError::UnknownBody(body));
        }
        let collider = ColliderBuilder::cuboid(
            half_extents.x as Real,
            half_extents.y as Real,
            half_extents.z as Real,
        )
        .build();
        let handle = self.colliders.insert_with_parent(collider, parent, &mut self.bodies);
        Ok(collider_handle(handle))
    }

    fn remove_body(&mut self, body: BodyHandle) -> bool {
        self.bodies
            .remove(
                rapier_body_handle(body),
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    fn contains_body(&self, body: BodyHandle) -> bool {
        self.bodies.contains(rapier_body_handle(body))
    }

    fn step(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    fn set_gravity(&mut self, gravity: Vector3) {
        self.gravity = to_rapier_vector(&gravity);
    }

    fn gravity(&self) -> Vector3 {
        Vector3::new(
            f64::from(self.gravity.x),
            f64::from(self.gravity.y),
            f64::from(self.gravity.z),
        )
    }

    fn set_body_kind(&mut self, body: BodyHandle, kind: BodyKind) -> Result<(), PhysicsError> {
        let rb = self
            .bodies
            .get_mut(rapier_body_handle(body))
            .ok_or(PhysicsError::UnknownBody(body))?;
        rb.set_body_type(rapier_body_type(kind), true);
        Ok(())
    }

    fn body_kind(&self, body: BodyHandle) -> Option<BodyKind> {
        let rb = self.bodies.get(rapier_body_handle(body))?;
        Some(match rb.body_type() {
            RigidBodyType::Fixed => BodyKind::Fixed,
            RigidBodyType::Dynamic => BodyKind::Dynamic,
            _ => BodyKind::KinematicPositionBased,
        })
    }

    fn body_translation(&self, body: BodyHandle) -> Option<Point3> {
        let rb = self.bodies.get(rapier_body_handle(body))?;
        Some(from_rapier_point(&Point::from(*rb.translation())))
    }

    fn set_body_pose(&mut self, body: BodyHandle, translation: Point3, rotation: Rotation) -> Result<(), PhysicsError> {
        let rb = self
            .bodies
            .get_mut(rapier_body_handle(body))
            .ok_or(PhysicsError::UnknownBody(body))?;
        rb.set_translation(to_rapier_vector(&translation.coords), true);
        rb.set_rotation(to_rapier_rotation(&rotation), true);
        Ok(())
    }

    fn create_joint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Point3,
        anchor_b: Point3,
    ) -> Option<JointHandle> {
        let (a, b) = (rapier_body_handle(body_a), rapier_body_handle(body_b));
        if a == b || !self.bodies.contains(a) || !self.bodies.contains(b) {
            return None;
        }
        let joint = SphericalJointBuilder::new()
            .local_anchor1(to_rapier_point(&anchor_a))
            .local_anchor2(to_rapier_point(&anchor_b))
            .build();
        let (index, generation) = self.impulse_joints.insert(a, b, joint, true).into_raw_parts();
        Some(JointHandle::from_raw_parts(index, generation))
    }

    fn remove_joint(&mut self, joint: JointHandle) -> bool {
        let (index, generation) = joint.into_raw_parts();
        self.impulse_joints
            .remove(ImpulseJointHandle::from_raw_parts(index, generation), true)
            .is_some()
    }

    fn collider_corners(&self, collider: ColliderHandle) -> Option<[Point3; 8]> {
        let co = self.colliders.get(rapier_collider_handle(collider))?;
        let half = co.shape().as_cuboid()?.half_extents;
        let pose = self.collider_pose(co)?;

        let mut corners = [Point3::origin(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let sx = if i & 1 == 0 { -half.x } else { half.x };
            let sy = if i & 2 == 0 { -half.y } else { half.y };
            let sz = if i & 4 == 0 { -half.z } else { half.z };
            *corner = from_rapier_point(&(pose * point![sx, sy, sz]));
        }
        Some(corners)
    }

    fn collider_body(&self, collider: ColliderHandle) -> Option<BodyHandle> {
        let co = self.colliders.get(rapier_collider_handle(collider))?;
        co.parent().map(body_handle)
    }

    fn intersecting_pairs(&self, tolerance: f64) -> Vec<(ColliderHandle, ColliderHandle)> {
        let placed: Vec<_> = self
            .colliders
            .iter()
            .filter_map(|(handle, co)| {
                let pose = self.collider_pose(co)?;
                Some((handle, co, pose, co.shape().compute_aabb(&pose)))
            })
            .collect();

        let mut pairs = Vec::new();
        for (i, (h1, c1, p1, aabb1)) in placed.iter().enumerate() {
            for (h2, c2, p2, aabb2) in &placed[i + 1..] {
                if c1.parent() == c2.parent() || !aabb1.intersects(aabb2) {
                    continue;
                }
                match rapier3d::parry::query::contact(p1, c1.shape(), p2, c2.shape(), 0.0) {
                    Ok(Some(contact)) if f64::from(-contact.dist) > tolerance => {
                        pairs.push((collider_handle(*h1), collider_handle(*h2)));
                    }
                    Ok(_) => {}
                    Err(_) => debug!("Unsupported shape pair in contact query"),
                }
            }
        }
        pairs
    }

    fn debug_render_buffers(&mut self) -> DebugRenderBuffers {
        let mut collector = LineCollector::default();
        self.debug_pipeline.render(
            &mut collector,
            &self.bodies,
            &self.colliders,
            &self.impulse_joints,
            &self.multibody_joints,
            &self.narrow_phase,
        );
        collector.buffers
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn clear(&mut self) {
        self.islands = IslandManager::new();
        self.broad_phase = BroadPhaseBvh::new();
        self.narrow_phase = NarrowPhase::new();
        self.bodies = RigidBodySet::new();
        self.colliders = ColliderSet::new();
        self.impulse_joints = ImpulseJointSet::new();
        self.multibody_joints = MultibodyJointSet::new();
        self.ccd_solver = CCDSolver::new();
    }
}

/// 收集调试线段
#[derive(Default)]
struct LineCollector {
    buffers: DebugRenderBuffers,
}

impl DebugRenderBackend for LineCollector {
    fn draw_line(&mut self, _object: DebugRenderObject, a: Point<Real>, b: Point<Real>, color: [f32; 4]) {
        self.buffers.vertices.extend_from_slice(&[a.x, a.y, a.z, b.x, b.y, b.z]);
        let rgba = hsla_to_rgba8(color);
        self.buffers.colors.extend_from_slice(&rgba);
        self.buffers.colors.extend_from_slice(&rgba);
    }
}

/// Rapier 的调试颜色为 HSLA（色相 0..360，其余 0..1）
fn hsla_to_rgba8([h, s, l, a]: [f32; 4]) -> [u8; 4] {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_byte = |v: f32| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_byte(r), to_byte(g), to_byte(b), (a.clamp(0.0, 1.0) * 255.0).round() as u8]
}

/// 加载 Rapier 物理世界
#[derive(Debug, Default, Clone, Copy)]
pub struct RapierLoader;

impl WorldLoader for RapierLoader {
    fn load(&self, config: &PhysicsConfig) -> BoxFuture<'static, Result<Box<dyn PhysicsWorld>, PhysicsError>> {
        let config = config.clone();
        async move {
            config.validate()?;
            tokio::task::yield_now().await;
            let world: Box<dyn PhysicsWorld> = Box::new(RapierWorld::new(&config));
            Ok(world)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> RapierWorld {
        RapierWorld::new(&PhysicsConfig::default())
    }

    #[test]
    fn test_hsla_conversion() {
        assert_eq!(hsla_to_rgba8([0.0, 1.0, 0.5, 1.0]), [255, 0, 0, 255]);
        assert_eq!(hsla_to_rgba8([120.0, 1.0, 0.5, 1.0]), [0, 255, 0, 255]);
        assert_eq!(hsla_to_rgba8([0.0, 0.0, 1.0, 0.0]), [255, 255, 255, 0]);
    }

    #[test]
    fn test_box_corners_follow_body_pose() {
        let mut world = world();
        let body = world.create_body(BodyDesc::new(BodyKind::Fixed, Point3::new(1.0, 2.0, 3.0)));
        let collider = world.create_box_collider(body, Vector3::new(0.5, 0.5, 0.5)).unwrap();

        let corners = world.collider_corners(collider).unwrap();
        assert!(corners.iter().all(|c| (c.x - 1.0).abs() <= 0.5 + 1e-5));
        assert!(corners.iter().any(|c| (c.y - 1.5).abs() < 1e-5));

        world.set_body_pose(body, Point3::new(10.0, 0.0, 0.0), Rotation::ZERO).unwrap();
        let moved = world.collider_corners(collider).unwrap();
        assert!(moved.iter().all(|c| (c.x - 10.0).abs() <= 0.5 + 1e-5));
    }

    #[test]
    fn test_new_world_uses_configured_gravity() {
        let world = world();
        assert!((world.gravity().y + 9.81).abs() < 1e-5);

        let config = PhysicsConfig {
            gravity: Vector3::new(0.0, -1.5, 0.0),
            ..Default::default()
        };
        assert_eq!(RapierWorld::new(&config).gravity(), Vector3::new(0.0, -1.5, 0.0));
    }

    #[test]
    fn test_collider_requires_body() {
        let mut world = world();
        let missing = BodyHandle::from_raw_parts(42, 0);
        assert!(matches!(
            world.create_box_collider(missing, Vector3::new(1.0, 1.0, 1.0)),
            Err(PhysicsError::UnknownBody(_))
        ));
    }

    #[test]
    fn test_overlapping_boxes_intersect() {
        let mut world = world();
        let a = world.create_body(BodyDesc::new(BodyKind::Fixed, Point3::origin()));
        let b = world.create_body(BodyDesc::new(BodyKind::Fixed, Point3::new(0.5, 0.0, 0.0)));
        let c = world.create_body(BodyDesc::new(BodyKind::Fixed, Point3::new(5.0, 0.0, 0.0)));
        for body in [a, b, c] {
            world.create_box_collider(body, Vector3::new(0.5, 0.5, 0.5)).unwrap();
        }

        assert_eq!(world.intersecting_pairs(1e-3).len(), 1);
    }

    #[test]
    fn test_remove_body_and_clear() {
        let mut world = world();
        let body = world.create_body(BodyDesc::new(BodyKind::Dynamic, Point3::origin()));
        assert!(world.contains_body(body));
        assert!(world.remove_body(body));
        assert!(!world.remove_body(body));

        world.create_body(BodyDesc::new(BodyKind::Fixed, Point3::origin()));
        world.clear();
        assert_eq!(world.body_count(), 0);
    }

    #[tokio::test]
    async fn test_loader_rejects_invalid_config() {
        let config = PhysicsConfig {
            timestep: -1.0,
            ..Default::default()
        };
        assert!(RapierLoader.load(&config).await.is_err());
        assert!(RapierLoader.load(&PhysicsConfig::default()).await.is_ok());
    }
}
