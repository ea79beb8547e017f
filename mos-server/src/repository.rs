//! Abstract CRUD for RunningOrder/Story/Item/MOSObject (spec §4.5), plus the
//! single in-memory implementation that lets this crate run standalone. A
//! document-store-backed implementation is out of scope (spec §1) and would
//! implement the same traits.

pub mod memory;

use crate::error::Result;
use crate::model::{Item, MosObject, RunningOrder, Story};
use async_trait::async_trait;

#[async_trait]
pub trait RunningOrderRepository: Send + Sync {
    async fn create(&self, ro: RunningOrder) -> Result<RunningOrder>;
    async fn get(&self, id: &str) -> Result<RunningOrder>;
    /// Full replace by id with an optimistic version check: succeeds only
    /// if `ro.version` strictly exceeds the stored version.
    async fn update(&self, ro: RunningOrder) -> Result<RunningOrder>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<RunningOrder>>;
}

#[async_trait]
pub trait StoryRepository: Send + Sync {
    async fn create(&self, story: Story) -> Result<Story>;
    async fn get(&self, id: &str) -> Result<Story>;
    async fn update(&self, story: Story) -> Result<Story>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list_by_running_order(&self, ro_id: &str) -> Result<Vec<Story>>;
}

#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn create(&self, item: Item) -> Result<Item>;
    async fn get(&self, id: &str) -> Result<Item>;
    async fn update(&self, item: Item) -> Result<Item>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list_by_story(&self, story_id: &str) -> Result<Vec<Item>>;
}

#[async_trait]
pub trait ObjectRepository: Send + Sync {
    async fn create(&self, obj: MosObject) -> Result<MosObject>;
    async fn get(&self, id: &str) -> Result<MosObject>;
    async fn update(&self, obj: MosObject) -> Result<MosObject>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<MosObject>>;
}

/// Bundles the four collections behind one handle, the way the Go original's
/// `repository.Repository` interface groups them for dependency injection.
pub trait Repository: Send + Sync {
    fn running_orders(&self) -> &dyn RunningOrderRepository;
    fn stories(&self) -> &dyn StoryRepository;
    fn items(&self) -> &dyn ItemRepository;
    fn objects(&self) -> &dyn ObjectRepository;
}
