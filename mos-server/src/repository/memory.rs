//! In-memory `Repository` implementation — the crate's default store.

use super::{
    ItemRepository, ObjectRepository, Repository, RunningOrderRepository, StoryRepository,
};
use crate::error::{MosError, Result};
use crate::model::{Item, MosObject, RunningOrder, Story};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

struct Store<T> {
    rows: RwLock<HashMap<String, T>>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> Store<T> {
    fn insert_new(&self, id: String, value: T) -> Result<T> {
        let mut rows = self.rows.write().unwrap();
        if rows.contains_key(&id) {
            return Err(MosError::Conflict(format!("id {id} already exists")));
        }
        rows.insert(id, value.clone());
        Ok(value)
    }

    fn get(&self, id: &str) -> Result<T> {
        self.rows
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| MosError::NotFound(id.to_string()))
    }

    fn replace(&self, id: String, value: T) -> Result<T> {
        let mut rows = self.rows.write().unwrap();
        if !rows.contains_key(&id) {
            return Err(MosError::NotFound(id));
        }
        rows.insert(id, value.clone());
        Ok(value)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.rows
            .write()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MosError::NotFound(id.to_string()))
    }

    fn all(&self) -> Vec<T> {
        self.rows.read().unwrap().values().cloned().collect()
    }
}

#[derive(Default)]
pub struct InMemoryRunningOrders {
    store: Store<RunningOrder>,
}

#[async_trait]
impl RunningOrderRepository for InMemoryRunningOrders {
    async fn create(&self, ro: RunningOrder) -> Result<RunningOrder> {
        self.store.insert_new(ro.id.clone(), ro)
    }

    async fn get(&self, id: &str) -> Result<RunningOrder> {
        self.store.get(id)
    }

    async fn update(&self, ro: RunningOrder) -> Result<RunningOrder> {
        let current = self.store.get(&ro.id)?;
        if ro.version <= current.version {
            return Err(MosError::VersionConflict {
                id: ro.id.clone(),
                expected: current.version,
                got: ro.version,
            });
        }
        self.store.replace(ro.id.clone(), ro)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    async fn list(&self) -> Result<Vec<RunningOrder>> {
        let mut rows = self.store.all();
        rows.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        Ok(rows)
    }
}

#[derive(Default)]
pub struct InMemoryStories {
    store: Store<Story>,
}

#[async_trait]
impl StoryRepository for InMemoryStories {
    async fn create(&self, story: Story) -> Result<Story> {
        self.store.insert_new(story.id.clone(), story)
    }

    async fn get(&self, id: &str) -> Result<Story> {
        self.store.get(id)
    }

    async fn update(&self, story: Story) -> Result<Story> {
        self.store.replace(story.id.clone(), story)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    async fn list_by_running_order(&self, ro_id: &str) -> Result<Vec<Story>> {
        let mut rows: Vec<_> = self
            .store
            .all()
            .into_iter()
            .filter(|s| s.running_order_id == ro_id)
            .collect();
        rows.sort_by_key(|s| s.order);
        Ok(rows)
    }
}

#[derive(Default)]
pub struct InMemoryItems {
    store: Store<Item>,
}

#[async_trait]
impl ItemRepository for InMemoryItems {
    async fn create(&self, item: Item) -> Result<Item> {
        self.store.insert_new(item.id.clone(), item)
    }

    async fn get(&self, id: &str) -> Result<Item> {
        self.store.get(id)
    }

    async fn update(&self, item: Item) -> Result<Item> {
        self.store.replace(item.id.clone(), item)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    async fn list_by_story(&self, story_id: &str) -> Result<Vec<Item>> {
        let mut rows: Vec<_> = self
            .store
            .all()
            .into_iter()
            .filter(|i| i.story_id == story_id)
            .collect();
        rows.sort_by_key(|i| i.order);
        Ok(rows)
    }
}

#[derive(Default)]
pub struct InMemoryObjects {
    store: Store<MosObject>,
}

#[async_trait]
impl ObjectRepository for InMemoryObjects {
    async fn create(&self, obj: MosObject) -> Result<MosObject> {
        self.store.insert_new(obj.id.clone(), obj)
    }

    async fn get(&self, id: &str) -> Result<MosObject> {
        self.store.get(id)
    }

    async fn update(&self, obj: MosObject) -> Result<MosObject> {
        self.store.replace(obj.id.clone(), obj)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    async fn list(&self) -> Result<Vec<MosObject>> {
        Ok(self.store.all())
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    running_orders: InMemoryRunningOrders,
    stories: InMemoryStories,
    items: InMemoryItems,
    objects: InMemoryObjects,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for InMemoryRepository {
    fn running_orders(&self) -> &dyn RunningOrderRepository {
        &self.running_orders
    }

    fn stories(&self) -> &dyn StoryRepository {
        &self.stories
    }

    fn items(&self) -> &dyn ItemRepository {
        &self.items
    }

    fn objects(&self) -> &dyn ObjectRepository {
        &self.objects
    }
}
