//! 建筑文档
//!
//! [`Building`] 是不可变快照：每次修改都返回新的值并刷新 `modified`。
//! [`DocumentStore`] 持有当前快照，并通过 `tokio::sync::watch` 向订阅者
//! （物理同步、捕捉引擎）发布每个新版本。
//!
//! 门窗不作为顶层构件存储，而是归入所属墙体的 `openings`。

use crate::element::{BuildingElement, ElementId, ElementKind, Opening, Wall};
use crate::error::DocumentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// 文档元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingMetadata {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl BuildingMetadata {
    fn now() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            modified: now,
        }
    }
}

/// 建筑快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    pub name: String,
    /// 顶层构件（墙、楼板、屋顶），按插入顺序
    pub elements: Vec<BuildingElement>,
    pub metadata: BuildingMetadata,
}

impl Building {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            elements: Vec::new(),
            metadata: BuildingMetadata::now(),
        }
    }

    /// 按ID查找顶层构件
    pub fn element(&self, id: &ElementId) -> Option<&BuildingElement> {
        self.elements.iter().find(|e| &e.id == id)
    }

    /// 按ID查找墙体数据
    pub fn wall(&self, id: &ElementId) -> Option<&Wall> {
        self.element(id).and_then(BuildingElement::as_wall)
    }

    /// 所有墙体构件
    pub fn walls(&self) -> impl Iterator<Item = &BuildingElement> {
        self.elements.iter().filter(|e| e.as_wall().is_some())
    }

    /// 按ID查找任意墙上的洞口
    pub fn opening(&self, id: &ElementId) -> Option<&Opening> {
        self.walls()
            .filter_map(BuildingElement::as_wall)
            .find_map(|wall| wall.opening(id))
    }

    /// ID 是否已被构件或洞口占用
    pub fn contains_id(&self, id: &ElementId) -> bool {
        self.element(id).is_some() || self.opening(id).is_some()
    }

    fn touched(mut self) -> Self {
        self.metadata.modified = Utc::now();
        self
    }

    fn wall_mut(&mut self, id: &ElementId) -> Option<&mut Wall> {
        self.elements
            .iter_mut()
            .find(|e| &e.id == id)
            .and_then(BuildingElement::as_wall_mut)
    }

    /// 添加构件
    ///
    /// 门窗按 `wall_id` 归入墙体，洞口ID取构件ID。
    pub fn with_element(&self, element: BuildingElement) -> Result<Building, DocumentError> {
        if self.contains_id(&element.id) {
            return Err(DocumentError::DuplicateId(element.id));
        }

        let mut next = self.clone();
        match element.kind {
            ElementKind::Opening(mut opening) => {
                opening.id = element.id;
                let wall_id = opening.wall_id.clone();
                let wall = next
                    .wall_mut(&wall_id)
                    .ok_or_else(|| DocumentError::WallNotFound(wall_id.clone()))?;
                debug!(opening = %opening.id, wall = %wall_id, "added opening to wall");
                wall.openings.push(opening);
            }
            ElementKind::Wall(_) | ElementKind::Floor | ElementKind::Roof(_) => {
                debug!(element = %element.id, "added element");
                next.elements.push(element);
            }
        }

        Ok(next.touched())
    }

    /// 删除构件或洞口
    ///
    /// 删除构件时同时清理其他构件对它的连接引用。
    pub fn without_element(&self, id: &ElementId) -> Result<Building, DocumentError> {
        let mut next = self.clone();

        if let Some(index) = next.elements.iter().position(|e| &e.id == id) {
            next.elements.remove(index);
            for element in &mut next.elements {
                element.connections.remove(id);
            }
            return Ok(next.touched());
        }

        for element in &mut next.elements {
            if let Some(wall) = element.as_wall_mut() {
                if let Some(index) = wall.openings.iter().position(|o| &o.id == id) {
                    wall.openings.remove(index);
                    return Ok(next.touched());
                }
            }
        }

        Err(DocumentError::ElementNotFound(id.clone()))
    }

    /// 用同ID的新值替换构件
    ///
    /// 门窗改挂到其他墙体时，从原墙移除后加入新墙。
    pub fn with_updated_element(&self, element: BuildingElement) -> Result<Building, DocumentError> {
        if let ElementKind::Opening(_) = element.kind {
            if self.opening(&element.id).is_none() {
                return Err(DocumentError::ElementNotFound(element.id));
            }
            return self.without_element(&element.id)?.with_element(element);
        }

        let mut next = self.clone();
        let slot = next
            .elements
            .iter_mut()
            .find(|e| e.id == element.id)
            .ok_or_else(|| DocumentError::ElementNotFound(element.id.clone()))?;
        *slot = element;
        Ok(next.touched())
    }

    /// 双向连接两个顶层构件
    pub fn with_connection(&self, a: &ElementId, b: &ElementId) -> Result<Building, DocumentError> {
        if a == b {
            return Err(DocumentError::SelfConnection(a.clone()));
        }
        for id in [a, b] {
            if self.element(id).is_none() {
                return Err(DocumentError::ElementNotFound(id.clone()));
            }
        }

        let mut next = self.clone();
        for element in &mut next.elements {
            if &element.id == a {
                element.connections.insert(b.clone());
            } else if &element.id == b {
                element.connections.insert(a.clone());
            }
        }
        Ok(next.touched())
    }
}

/// 文档存储
///
/// 所有修改在 watch 通道的锁内完成，保证并发修改按顺序生效；
/// 失败的修改不会发布新快照。
#[derive(Debug)]
pub struct DocumentStore {
    tx: watch::Sender<Arc<Building>>,
}

impl DocumentStore {
    pub fn new(building: Building) -> Self {
        info!(name = %building.name, "document opened");
        let (tx, _rx) = watch::channel(Arc::new(building));
        Self { tx }
    }

    /// 当前快照
    pub fn current(&self) -> Arc<Building> {
        self.tx.borrow().clone()
    }

    /// 订阅快照更新
    pub fn subscribe(&self) -> watch::Receiver<Arc<Building>> {
        self.tx.subscribe()
    }

    fn apply<F>(&self, mutation: F) -> Result<Arc<Building>, DocumentError>
    where
        F: FnOnce(&Building) -> Result<Building, DocumentError>,
    {
        let mut outcome = None;
        self.tx.send_if_modified(|current| match mutation(&**current) {
            Ok(next) => {
                *current = Arc::new(next);
                outcome = Some(Ok(current.clone()));
                true
            }
            Err(err) => {
                outcome = Some(Err(err));
                false
            }
        });
        // 闭包总会执行
        outcome.unwrap_or_else(|| Ok(self.current()))
    }

    /// 添加构件，返回其ID
    pub fn add_element(&self, element: BuildingElement) -> Result<ElementId, DocumentError> {
        let id = element.id.clone();
        self.apply(|building| building.with_element(element))?;
        Ok(id)
    }

    pub fn remove_element(&self, id: &ElementId) -> Result<(), DocumentError> {
        self.apply(|building| building.without_element(id)).map(|_| ())
    }

    pub fn update_element(&self, element: BuildingElement) -> Result<(), DocumentError> {
        self.apply(|building| building.with_updated_element(element)).map(|_| ())
    }

    pub fn connect(&self, a: &ElementId, b: &ElementId) -> Result<(), DocumentError> {
        self.apply(|building| building.with_connection(a, b)).map(|_| ())
    }

    /// 整体替换文档
    pub fn replace(&self, building: Building) {
        self.tx.send_replace(Arc::new(building));
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(Building::new("Untitled"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Dimensions, OpeningKind};
    use crate::math::Point3;

    fn wall(id: &str) -> BuildingElement {
        BuildingElement::wall(Point3::origin(), 0.0, 5.0, 2.5, 0.24).with_id(id)
    }

    #[test]
    fn test_with_element_refreshes_modified() {
        let building = Building::new("house");
        let next = building.with_element(wall("w1")).unwrap();

        assert!(building.elements.is_empty());
        assert_eq!(next.elements.len(), 1);
        assert!(next.metadata.modified >= building.metadata.modified);
        assert_eq!(next.metadata.created, building.metadata.created);
    }

    #[test]
    fn test_opening_routed_into_wall() {
        let building = Building::new("house").with_element(wall("w1")).unwrap();
        let door = Opening::door(ElementId::from("w1"), 2.0).with_id("d1");
        let next = building.with_element(BuildingElement::opening(door)).unwrap();

        assert_eq!(next.elements.len(), 1);
        let openings = &next.wall(&ElementId::from("w1")).unwrap().openings;
        assert_eq!(openings.len(), 1);
        assert_eq!(openings[0].kind, OpeningKind::Door);
        assert!(next.opening(&ElementId::from("d1")).is_some());
    }

    #[test]
    fn test_opening_with_unknown_wall() {
        let building = Building::new("house");
        let window = Opening::window(ElementId::from("missing"), 1.0, 1.0);
        let err = building.with_element(BuildingElement::opening(window)).unwrap_err();
        assert_eq!(err, DocumentError::WallNotFound(ElementId::from("missing")));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let building = Building::new("house").with_element(wall("w1")).unwrap();
        let err = building.with_element(wall("w1")).unwrap_err();
        assert_eq!(err, DocumentError::DuplicateId(ElementId::from("w1")));
    }

    #[test]
    fn test_without_element_removes_opening_and_connections() {
        let building = Building::new("house")
            .with_element(wall("w1"))
            .and_then(|b| b.with_element(wall("w2")))
            .and_then(|b| b.with_connection(&ElementId::from("w1"), &ElementId::from("w2")))
            .and_then(|b| b.with_element(BuildingElement::opening(Opening::door(ElementId::from("w1"), 2.0).with_id("d1"))))
            .unwrap();

        let no_door = building.without_element(&ElementId::from("d1")).unwrap();
        assert!(no_door.wall(&ElementId::from("w1")).unwrap().openings.is_empty());

        let no_wall = building.without_element(&ElementId::from("w2")).unwrap();
        assert!(no_wall.element(&ElementId::from("w1")).unwrap().connections.is_empty());

        assert!(building.without_element(&ElementId::from("nope")).is_err());
    }

    #[test]
    fn test_with_updated_element() {
        let building = Building::new("house")
            .with_element(BuildingElement::floor(Point3::origin(), Dimensions::new(5.0, 0.2, 5.0)).with_id("f1"))
            .unwrap();
        let moved = building.element(&ElementId::from("f1")).unwrap().clone().with_position(Point3::new(1.0, 0.0, 0.0));

        let next = building.with_updated_element(moved).unwrap();
        assert_eq!(next.element(&ElementId::from("f1")).unwrap().position.x, 1.0);

        let missing = building.with_updated_element(wall("ghost"));
        assert_eq!(missing.unwrap_err(), DocumentError::ElementNotFound(ElementId::from("ghost")));
    }

    #[test]
    fn test_connection_is_bidirectional() {
        let building = Building::new("house")
            .with_element(wall("w1"))
            .and_then(|b| b.with_element(wall("w2")))
            .unwrap();
        let a = ElementId::from("w1");
        let b = ElementId::from("w2");

        let next = building.with_connection(&a, &b).unwrap();
        assert!(next.element(&a).unwrap().connections.contains(&b));
        assert!(next.element(&b).unwrap().connections.contains(&a));
        assert_eq!(building.with_connection(&a, &a).unwrap_err(), DocumentError::SelfConnection(a));
    }

    #[test]
    fn test_store_publishes_snapshots() {
        let store = DocumentStore::new(Building::new("house"));
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        let id = store.add_element(wall("w1")).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().elements.len(), 1);

        // 失败的修改不发布
        assert!(store.add_element(wall("w1")).is_err());
        assert!(!rx.has_changed().unwrap());

        store.remove_element(&id).unwrap();
        assert!(store.current().elements.is_empty());
    }
}
