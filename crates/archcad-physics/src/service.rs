//! 物理同步服务
//!
//! 在物理世界中为建筑的结构构件（墙、楼板、屋顶）维护一份刚体/碰撞体镜像，
//! 并提供碰撞查询、捕捉点、沙盒动力学和调试绘制。
//!
//! 生命周期：`Uninitialized → Initializing → Ready → Destroyed`。
//! 变更命令进入无界队列，由单个工作任务按 FIFO 顺序执行；
//! 物理世界在互斥锁后，只在执行单条命令或查询期间加锁，从不跨越 `.await`。
//!
//! # 示例
//!
//! ```rust,no_run
//! use archcad_core::prelude::*;
//! use archcad_physics::prelude::*;
//!
//! # async fn demo() -> Result<(), PhysicsError> {
//! let physics = PhysicsService::with_rapier(PhysicsConfig::default());
//! physics.init().await?;
//!
//! let wall = BuildingElement::wall(Point3::origin(), 0.0, 4.0, 2.5, 0.24);
//! physics.sync_with_building(&[wall]);
//! physics.flush().await;
//! assert_eq!(physics.get_snap_points().len(), 8);
//! # Ok(())
//! # }
//! ```

use crate::command::{CollisionPair, PhysicsCommand, QueueItem};
use crate::config::PhysicsConfig;
use crate::error::PhysicsError;
use crate::rapier_world::RapierLoader;
use crate::world::{
    BodyDesc, BodyHandle, BodyKind, ColliderHandle, DebugRenderBuffers, JointHandle, PhysicsWorld, WorldLoader,
};
use archcad_core::element::{BuildingElement, ElementId, ElementType, Rotation};
use archcad_core::math::{Point3, Vector3};
use futures::channel::{mpsc, oneshot};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

type PendingInit = Shared<BoxFuture<'static, Result<(), PhysicsError>>>;

/// 服务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
    Destroyed,
}

/// 物理同步服务
///
/// 克隆得到的是同一个服务的共享句柄。
#[derive(Clone)]
pub struct PhysicsService {
    inner: Arc<Inner>,
}

struct Inner {
    loader: Arc<dyn WorldLoader>,
    config: PhysicsConfig,
    state: Mutex<Lifecycle>,
}

enum Lifecycle {
    Uninitialized,
    Initializing(PendingInit),
    Ready(Runtime),
    Destroyed,
}

struct ColliderEntry {
    body: BodyHandle,
    collider: ColliderHandle,
    element_type: ElementType,
}

struct Runtime {
    world: Box<dyn PhysicsWorld>,
    /// 构件 → 碰撞体，只由队列工作任务写入
    colliders: BTreeMap<ElementId, ColliderEntry>,
    /// 已执行和已排队命令共同作用后的构件集合
    projected: BTreeSet<ElementId>,
    /// 已排队尚未执行的 ADD 数量
    pending_adds: HashMap<ElementId, usize>,
    guide_bodies: HashSet<BodyHandle>,
    queue: mpsc::UnboundedSender<QueueItem>,
}

impl PhysicsService {
    pub fn new(loader: Arc<dyn WorldLoader>, config: PhysicsConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                config,
                state: Mutex::new(Lifecycle::Uninitialized),
            }),
        }
    }

    /// 使用 Rapier 引擎
    pub fn with_rapier(config: PhysicsConfig) -> Self {
        Self::new(Arc::new(RapierLoader), config)
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.inner.config
    }

    /// 加载物理引擎并创建世界
    ///
    /// 并发调用共享同一次加载。失败时回到 `Uninitialized`，可以重试。
    pub async fn init(&self) -> Result<(), PhysicsError> {
        let pending = {
            let mut state = self.inner.state.lock();
            match &*state {
                Lifecycle::Ready(_) => return Ok(()),
                Lifecycle::Destroyed => return Err(PhysicsError::Destroyed),
                Lifecycle::Initializing(pending) => pending.clone(),
                Lifecycle::Uninitialized => {
                    info!("Initializing physics service");
                    let load = self.inner.loader.load(&self.inner.config);
                    let pending = finish_init(Arc::downgrade(&self.inner), load).boxed().shared();
                    *state = Lifecycle::Initializing(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    pub fn state(&self) -> ServiceState {
        match &*self.inner.state.lock() {
            Lifecycle::Uninitialized => ServiceState::Uninitialized,
            Lifecycle::Initializing(_) => ServiceState::Initializing,
            Lifecycle::Ready(_) => ServiceState::Ready,
            Lifecycle::Destroyed => ServiceState::Destroyed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    fn with_runtime<R>(&self, f: impl FnOnce(&mut Runtime) -> R) -> Option<R> {
        match &mut *self.inner.state.lock() {
            Lifecycle::Ready(runtime) => Some(f(runtime)),
            _ => None,
        }
    }

    /// 提交命令，未就绪时丢弃
    pub fn add_command(&self, command: PhysicsCommand) {
        let name = command.name();
        let element = command.element_id().clone();
        if self.with_runtime(|runtime| runtime.enqueue(command)).is_none() {
            warn!(command = name, %element, "Physics service not ready, dropping command");
        }
    }

    /// 将物理世界与建筑快照对齐
    ///
    /// 删除快照中已不存在的构件，添加新的结构构件。两边都有的构件不做更新。
    pub fn sync_with_building(&self, elements: &[BuildingElement]) {
        let synced = self.with_runtime(|runtime| {
            let current: HashSet<&ElementId> = elements
                .iter()
                .filter(|element| element.is_structural())
                .map(|element| &element.id)
                .collect();

            let stale: Vec<ElementId> = runtime
                .projected
                .iter()
                .filter(|id| !current.contains(id))
                .cloned()
                .collect();
            let removed = stale.len();
            for id in stale {
                runtime.enqueue(PhysicsCommand::remove(id));
            }

            let mut added = 0;
            for element in elements.iter().filter(|element| element.is_structural()) {
                if !runtime.projected.contains(&element.id) {
                    runtime.enqueue(PhysicsCommand::add(element.clone()));
                    added += 1;
                }
            }
            (added, removed)
        });

        match synced {
            Some((added, removed)) => debug!(added, removed, "Queued physics sync"),
            None => warn!("Physics service not ready, skipping building sync"),
        }
    }

    /// 等待此前提交的命令全部执行完
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        let queued = self
            .with_runtime(|runtime| runtime.queue.unbounded_send(QueueItem::Barrier(done)).is_ok())
            .unwrap_or(false);
        if queued {
            // 工作任务退出时发送端被丢弃，同样视为完成
            let _ = wait.await;
        }
    }

    /// 当前相互穿透的构件对
    pub fn get_collisions(&self) -> Vec<CollisionPair> {
        let tolerance = self.inner.config.penetration_tolerance;
        self.with_runtime(|runtime| {
            let owners: HashMap<ColliderHandle, &ElementId> = runtime
                .colliders
                .iter()
                .map(|(id, entry)| (entry.collider, id))
                .collect();

            let mut pairs: Vec<CollisionPair> = runtime
                .world
                .intersecting_pairs(tolerance)
                .into_iter()
                .filter_map(|(first, second)| {
                    CollisionPair::new((*owners.get(&first)?).clone(), (*owners.get(&second)?).clone())
                })
                .collect();
            pairs.sort();
            pairs.dedup();
            pairs
        })
        .unwrap_or_default()
    }

    /// 开启或关闭重力
    pub fn set_gravity(&self, enabled: bool) {
        let gravity = if enabled {
            self.inner.config.gravity
        } else {
            Vector3::zeros()
        };
        if self.with_runtime(|runtime| runtime.world.set_gravity(gravity)).is_some() {
            info!(enabled, "Gravity updated");
        }
    }

    pub fn gravity(&self) -> Option<Vector3> {
        self.with_runtime(|runtime| runtime.world.gravity())
    }

    /// 将构件刚体切换为动态或固定
    pub fn set_body_type(&self, element_id: &ElementId, dynamic: bool) {
        let kind = if dynamic { BodyKind::Dynamic } else { BodyKind::Fixed };
        let result = self.with_runtime(|runtime| {
            let entry = runtime
                .colliders
                .get(element_id)
                .ok_or_else(|| PhysicsError::UnknownElement(element_id.clone()))?;
            runtime.world.set_body_kind(entry.body, kind)
        });
        match result {
            Some(Ok(())) => debug!(element = %element_id, ?kind, "Body type changed"),
            Some(Err(err)) => warn!("Failed to change body type: {err}"),
            None => warn!("Physics service not ready, ignoring body type change"),
        }
    }

    pub fn is_dynamic(&self, element_id: &ElementId) -> bool {
        self.with_runtime(|runtime| {
            let entry = runtime.colliders.get(element_id)?;
            runtime.world.body_kind(entry.body)
        })
        .flatten()
            == Some(BodyKind::Dynamic)
    }

    pub fn body_handle(&self, element_id: &ElementId) -> Option<BodyHandle> {
        self.with_runtime(|runtime| runtime.colliders.get(element_id).map(|entry| entry.body))
            .flatten()
    }

    pub fn body_translation(&self, element_id: &ElementId) -> Option<Point3> {
        self.with_runtime(|runtime| {
            let entry = runtime.colliders.get(element_id)?;
            runtime.world.body_translation(entry.body)
        })
        .flatten()
    }

    /// 用球铰连接两个刚体
    pub fn add_joint(
        &self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Point3,
        anchor_b: Point3,
    ) -> Option<JointHandle> {
        let joint = self
            .with_runtime(|runtime| runtime.world.create_joint(body_a, body_b, anchor_a, anchor_b))
            .flatten();
        if joint.is_none() {
            warn!(?body_a, ?body_b, "Could not create joint");
        }
        joint
    }

    pub fn remove_joint(&self, joint: JointHandle) -> bool {
        let removed = self
            .with_runtime(|runtime| runtime.world.remove_joint(joint))
            .unwrap_or(false);
        if !removed {
            debug!(?joint, "Joint not found");
        }
        removed
    }

    /// 画墙时跟随光标的运动学刚体（无碰撞体）
    pub fn create_guide_body(&self, position: Point3) -> Option<BodyHandle> {
        self.with_runtime(|runtime| {
            let body = runtime
                .world
                .create_body(BodyDesc::new(BodyKind::KinematicPositionBased, position));
            runtime.guide_bodies.insert(body);
            body
        })
    }

    pub fn move_guide_body(&self, body: BodyHandle, position: Point3) -> bool {
        self.with_runtime(|runtime| {
            runtime.guide_bodies.contains(&body)
                && runtime.world.set_body_pose(body, position, Rotation::ZERO).is_ok()
        })
        .unwrap_or(false)
    }

    pub fn remove_guide_body(&self, body: BodyHandle) -> bool {
        self.with_runtime(|runtime| runtime.guide_bodies.remove(&body) && runtime.world.remove_body(body))
            .unwrap_or(false)
    }

    /// 推进一个固定步长
    pub fn step(&self) {
        self.with_runtime(|runtime| runtime.world.step());
    }

    /// 固定刚体碰撞体的角点，每面墙 8 个
    pub fn get_snap_points(&self) -> Vec<Point3> {
        self.with_runtime(|runtime| {
            runtime
                .colliders
                .values()
                .filter(|entry| runtime.world.body_kind(entry.body) == Some(BodyKind::Fixed))
                .filter_map(|entry| runtime.world.collider_corners(entry.collider))
                .flatten()
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn get_debug_render_buffers(&self) -> Option<DebugRenderBuffers> {
        self.with_runtime(|runtime| runtime.world.debug_render_buffers())
    }

    pub fn collider_count(&self) -> usize {
        self.with_runtime(|runtime| runtime.colliders.len()).unwrap_or(0)
    }

    pub fn has_collider(&self, element_id: &ElementId) -> bool {
        self.with_runtime(|runtime| runtime.colliders.contains_key(element_id))
            .unwrap_or(false)
    }

    pub fn collider_ids(&self) -> Vec<ElementId> {
        self.with_runtime(|runtime| runtime.colliders.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// 释放物理世界，之后所有操作都不再生效
    pub fn destroy(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), Lifecycle::Destroyed);
        match previous {
            Lifecycle::Ready(mut runtime) => {
                let colliders = runtime.colliders.len();
                runtime.world.clear();
                info!(colliders, "Physics service destroyed");
            }
            Lifecycle::Initializing(_) => info!("Physics service destroyed during initialization"),
            Lifecycle::Uninitialized => info!("Physics service destroyed before initialization"),
            Lifecycle::Destroyed => debug!("Physics service already destroyed"),
        }
    }
}

async fn finish_init(
    inner: Weak<Inner>,
    load: BoxFuture<'static, Result<Box<dyn PhysicsWorld>, PhysicsError>>,
) -> Result<(), PhysicsError> {
    let loaded = load.await;
    let inner = inner.upgrade().ok_or(PhysicsError::Destroyed)?;
    let mut state = inner.state.lock();
    if !matches!(*state, Lifecycle::Initializing(_)) {
        return Err(PhysicsError::Destroyed);
    }

    match loaded {
        Ok(world) => {
            let (queue, commands) = mpsc::unbounded();
            *state = Lifecycle::Ready(Runtime {
                world,
                colliders: BTreeMap::new(),
                projected: BTreeSet::new(),
                pending_adds: HashMap::new(),
                guide_bodies: HashSet::new(),
                queue,
            });
            drop(state);
            tokio::spawn(run_worker(Arc::downgrade(&inner), commands));
            info!("Physics service ready");
            Ok(())
        }
        Err(err) => {
            error!("Failed to initialize physics service: {err}");
            *state = Lifecycle::Uninitialized;
            Err(err)
        }
    }
}

async fn run_worker(inner: Weak<Inner>, mut commands: mpsc::UnboundedReceiver<QueueItem>) {
    while let Some(item) = commands.next().await {
        match item {
            QueueItem::Barrier(done) => {
                let _ = done.send(());
            }
            QueueItem::Command(command) => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.apply(command);
            }
        }
    }
    debug!("Physics command worker stopped");
}

impl Inner {
    fn apply(&self, command: PhysicsCommand) {
        let mut state = self.state.lock();
        match &mut *state {
            Lifecycle::Ready(runtime) => runtime.apply(command, &self.config),
            _ => debug!(command = command.name(), "Discarding physics command"),
        }
    }
}

fn is_finite_point(point: &Point3) -> bool {
    point.iter().all(|v| v.is_finite())
}

fn is_finite_rotation(rotation: &Rotation) -> bool {
    rotation.x.is_finite() && rotation.y.is_finite() && rotation.z.is_finite()
}

/// 碰撞体使用的旋转：墙只取偏航角，楼板/屋顶不旋转
fn body_rotation(element_type: ElementType, rotation: &Rotation) -> Rotation {
    match element_type {
        ElementType::Wall => Rotation::yaw(rotation.y),
        _ => Rotation::ZERO,
    }
}

impl Runtime {
    fn enqueue(&mut self, command: PhysicsCommand) {
        match &command {
            PhysicsCommand::Add { element } if element.is_structural() => {
                self.projected.insert(element.id.clone());
                *self.pending_adds.entry(element.id.clone()).or_default() += 1;
            }
            PhysicsCommand::Remove { element_id } => {
                self.projected.remove(element_id);
            }
            _ => {}
        }
        if let Err(err) = self.queue.unbounded_send(QueueItem::Command(command)) {
            warn!("Physics command queue closed: {err}");
        }
    }

    fn apply(&mut self, command: PhysicsCommand, config: &PhysicsConfig) {
        match command {
            PhysicsCommand::Add { element } => {
                let later_add_queued = self.take_pending_add(&element.id);
                if self.colliders.contains_key(&element.id) {
                    debug!(element = %element.id, "Collider already exists");
                    return;
                }
                match self.insert_element(&element, config) {
                    Ok(entry) => {
                        debug!(element = %element.id, kind = %entry.element_type, "Collider added");
                        self.colliders.insert(element.id, entry);
                    }
                    Err(err) => {
                        error!("Skipping collider: {err}");
                        // 队列中还有同一构件的 ADD 时保留投影，由后者决定结果
                        if !later_add_queued {
                            self.projected.remove(&element.id);
                        }
                    }
                }
            }
            PhysicsCommand::Remove { element_id } => match self.colliders.remove(&element_id) {
                Some(entry) => {
                    self.world.remove_body(entry.body);
                    debug!(element = %element_id, "Collider removed");
                }
                None => debug!(element = %element_id, "No collider to remove"),
            },
            PhysicsCommand::UpdateTransform {
                element_id,
                position,
                rotation,
            } => {
                if let Err(err) = self.update_transform(&element_id, position, rotation) {
                    warn!("Transform update skipped: {err}");
                }
            }
        }
    }

    /// 记录一条 ADD 出队，返回之后是否还有同一构件的 ADD 在排队
    fn take_pending_add(&mut self, id: &ElementId) -> bool {
        match self.pending_adds.get_mut(id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.pending_adds.remove(id);
                false
            }
            None => false,
        }
    }

    fn insert_element(&mut self, element: &BuildingElement, config: &PhysicsConfig) -> Result<ColliderEntry, PhysicsError> {
        let element_type = element.element_type();
        let dims = element.dimensions;
        let invalid_dimensions = || PhysicsError::InvalidDimensions {
            element: element.id.clone(),
            width: dims.width,
            height: dims.height,
            depth: dims.depth,
        };

        if !dims.is_finite() {
            return Err(invalid_dimensions());
        }
        if !is_finite_point(&element.position) || !is_finite_rotation(&element.rotation) {
            return Err(PhysicsError::InvalidTransform(element.id.clone()));
        }

        let kind = match element_type {
            ElementType::Wall if dims.min_extent() > 0.0 => BodyKind::Fixed,
            ElementType::Floor | ElementType::Roof if dims.min_extent() >= config.min_dimension => {
                BodyKind::KinematicPositionBased
            }
            ElementType::Wall | ElementType::Floor | ElementType::Roof => return Err(invalid_dimensions()),
            ElementType::Door | ElementType::Window => return Err(PhysicsError::UnsupportedShape(element_type)),
        };

        let desc = BodyDesc::new(kind, element.position).with_rotation(body_rotation(element_type, &element.rotation));
        let body = self.world.create_body(desc);
        let half_extents = Vector3::new(dims.width / 2.0, dims.height / 2.0, dims.depth / 2.0);
        match self.world.create_box_collider(body, half_extents) {
            Ok(collider) => Ok(ColliderEntry {
                body,
                collider,
                element_type,
            }),
            Err(err) => {
                self.world.remove_body(body);
                Err(err)
            }
        }
    }

    fn update_transform(&mut self, element_id: &ElementId, position: Point3, rotation: Rotation) -> Result<(), PhysicsError> {
        let entry = self
            .colliders
            .get(element_id)
            .ok_or_else(|| PhysicsError::UnknownElement(element_id.clone()))?;
        if !is_finite_point(&position) || !is_finite_rotation(&rotation) {
            return Err(PhysicsError::InvalidTransform(element_id.clone()));
        }
        self.world
            .set_body_pose(entry.body, position, body_rotation(entry.element_type, &rotation))
    }
}
