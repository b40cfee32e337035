//! ArchCAD 演示程序入口
//! 组装文档存储、捕捉引擎和物理服务，走一遍典型的建模流程

use anyhow::{Context, Result};
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use archcad_core::element::defaults;
use archcad_core::prelude::*;
use archcad_physics::prelude::*;

/// 示例房间的边长（米）
const ROOM_SIZE: f64 = 6.0;

/// 将最新快照推送给物理服务和捕捉引擎
async fn sync_snapshot(
    snapshots: &mut watch::Receiver<Arc<Building>>,
    physics: &PhysicsService,
    engine: &mut ConstraintEngine,
) -> Result<()> {
    if !snapshots.has_changed()? {
        return Ok(());
    }
    let building = snapshots.borrow_and_update().clone();
    physics.sync_with_building(&building.elements);
    engine.update_building(building);
    physics.flush().await;
    Ok(())
}

/// 四面墙围成的房间，东西墙夹在南北墙之间
fn room_walls() -> Vec<BuildingElement> {
    let half = ROOM_SIZE / 2.0;
    let height = defaults::WALL_HEIGHT;
    let thickness = defaults::WALL_THICKNESS;
    let inner = ROOM_SIZE - thickness;
    vec![
        BuildingElement::wall(Point3::new(-half, 0.0, 0.0), 0.0, inner, height, thickness).with_id("wall-west"),
        BuildingElement::wall(Point3::new(half, 0.0, 0.0), 0.0, inner, height, thickness).with_id("wall-east"),
        BuildingElement::wall(Point3::new(0.0, 0.0, -half), FRAC_PI_2, ROOM_SIZE, height, thickness)
            .with_id("wall-south"),
        BuildingElement::wall(Point3::new(0.0, 0.0, half), FRAC_PI_2, ROOM_SIZE, height, thickness)
            .with_id("wall-north"),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing::subscriber::set_global_default(FmtSubscriber::builder().with_max_level(Level::INFO).finish())?;

    info!("Starting ArchCAD...");

    let store = DocumentStore::new(Building::new("Demo House"));
    let mut snapshots = store.subscribe();
    let mut engine = ConstraintEngine::new(store.current(), SnapConfig::default());

    let physics = PhysicsService::with_rapier(PhysicsConfig::default());
    physics.init().await.context("physics engine failed to start")?;

    // 墙体和楼板
    for wall in room_walls() {
        store.add_element(wall)?;
    }
    store.add_element(
        BuildingElement::floor(Point3::new(0.0, -0.1, 0.0), Dimensions::new(ROOM_SIZE, 0.2, ROOM_SIZE))
            .with_id("floor-ground"),
    )?;
    store.connect(&"wall-west".into(), &"wall-south".into())?;
    sync_snapshot(&mut snapshots, &physics, &mut engine).await?;
    info!(
        colliders = physics.collider_count(),
        snap_points = physics.get_snap_points().len(),
        "Room built"
    );

    // 在西墙上开一扇窗，先搜索合法位置
    let building = store.current();
    let west = building.wall(&"wall-west".into()).context("west wall missing")?;
    let placement = PlacementConfig::default();
    let sill = placement.sill_height(OpeningKind::Window, west.height, defaults::WINDOW_HEIGHT);
    let window = Opening::window("wall-west".into(), 0.3, sill).with_id("window-1");
    match find_valid_opening_position(west, &window, 0.3) {
        Some(position) => {
            let placed = window.at_x(position.x);
            let check = validate_opening_placement(west, &placed, None);
            for warning in check.warning_messages() {
                warn!(opening = %placed.id, "{warning}");
            }
            store.add_element(BuildingElement::opening(placed))?;
            info!(x = position.x, "Window placed");
        }
        None => warn!("No valid position for window"),
    }

    // 光标靠近西南角时捕捉到墙端点
    let snap = engine.find_snap(&Point3::new(-2.9, 0.0, -2.8), None);
    info!(
        snapped = snap.snapped,
        x = snap.position.x,
        z = snap.position.z,
        "Snap query"
    );

    // 一面穿过房间的墙会与南北墙相交
    store.add_element(
        BuildingElement::wall(Point3::origin(), 0.0, ROOM_SIZE + 1.0, defaults::WALL_HEIGHT, defaults::WALL_THICKNESS)
            .with_id("wall-partition"),
    )?;
    sync_snapshot(&mut snapshots, &physics, &mut engine).await?;
    for pair in physics.get_collisions() {
        warn!(a = %pair.a, b = %pair.b, "Elements intersect");
    }
    store.remove_element(&"wall-partition".into())?;
    sync_snapshot(&mut snapshots, &physics, &mut engine).await?;

    // 沙盒：让北墙受重力下落
    physics.set_gravity(true);
    physics.set_body_type(&"wall-north".into(), true);
    for _ in 0..60 {
        physics.step();
    }
    if let Some(translation) = physics.body_translation(&"wall-north".into()) {
        info!(y = translation.y, "North wall after one second");
    }

    if let Some(buffers) = physics.get_debug_render_buffers() {
        info!(lines = buffers.line_count(), "Debug render buffers");
    }

    let snapshot = serde_json::to_string_pretty(&*store.current())?;
    info!(bytes = snapshot.len(), "Building snapshot serialized");

    physics.destroy();
    info!("ArchCAD finished");
    Ok(())
}
