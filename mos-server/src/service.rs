//! Domain service (spec §4.4): idempotent create-or-update of running
//! orders/stories/items, publishing change events on every successful
//! mutation. Grounded on the Go original's `service.MOSService`.

use crate::error::{MosError, Result};
use crate::events::{Event, EventBus, Topic};
use crate::model::{Item, MosObject, RunningOrder, Status, Story};
use crate::repository::Repository;
use chrono::Utc;
use mos_protocol::messages::{NcsReqStoryAction, RunningOrderInfo, StoryInfo};
use std::sync::Arc;

pub struct MosService {
    repo: Arc<dyn Repository>,
    events: EventBus,
    source: String,
}

impl MosService {
    pub fn new(repo: Arc<dyn Repository>, events: EventBus, source: String) -> Self {
        Self {
            repo,
            events,
            source,
        }
    }

    pub async fn list_running_orders(&self) -> Result<Vec<RunningOrder>> {
        self.repo.running_orders().list().await
    }

    pub async fn get_running_order_with_stories(
        &self,
        id: &str,
    ) -> Result<(RunningOrder, Vec<Story>)> {
        let ro = self.repo.running_orders().get(id).await?;
        let stories = self.repo.stories().list_by_running_order(id).await?;
        Ok((ro, stories))
    }

    pub async fn get_items_for_story(&self, story_id: &str) -> Result<Vec<Item>> {
        self.repo.items().list_by_story(story_id).await
    }

    pub async fn create_mos_object(&self, obj: MosObject) -> Result<MosObject> {
        self.repo.objects().create(obj).await
    }

    pub async fn get_mos_object(&self, id: &str) -> Result<MosObject> {
        self.repo.objects().get(id).await
    }

    pub async fn update_running_order_status(&self, id: &str, status: Status) -> Result<()> {
        let mut ro = self.repo.running_orders().get(id).await?;
        ro.status = status;
        ro.updated_at = Utc::now();
        ro.version += 1;
        self.repo.running_orders().update(ro).await?;
        self.publish_ro_updated(id).await;
        Ok(())
    }

    /// Upsert a running order with its children. Unreferenced children that
    /// exist in storage but are absent from the message are NOT deleted —
    /// see design notes; this matches the Go original and is a deliberate,
    /// documented simplification, not a gap.
    pub async fn process_running_order_info(&self, msg: RunningOrderInfo) -> Result<()> {
        if msg.id.is_empty() {
            return Err(MosError::InvalidRequest("roCreate missing roID".into()));
        }

        let duration = msg.duration.parse().unwrap_or(0);
        let now = Utc::now();

        match self.repo.running_orders().get(&msg.id).await {
            Ok(mut existing) => {
                existing.slug = msg.slug.clone();
                existing.channel = msg.channel.clone();
                existing.duration = duration;
                existing.updated_at = now;
                existing.version += 1;
                self.repo.running_orders().update(existing).await?;
            }
            Err(MosError::NotFound(_)) => {
                let ro = RunningOrder {
                    id: msg.id.clone(),
                    mos_id: self.source.clone(),
                    slug: msg.slug.clone(),
                    status: Status::Pending,
                    duration,
                    channel: msg.channel.clone(),
                    air_time: None,
                    version: 1,
                    created_at: now,
                    updated_at: now,
                };
                self.repo.running_orders().create(ro).await?;
            }
            Err(other) => return Err(other),
        }

        for (i, story_info) in msg.stories.iter().enumerate() {
            self.upsert_story_from_info(&msg.id, story_info, i as u32 + 1)
                .await?;
        }

        self.publish_ro_updated(&msg.id).await;
        Ok(())
    }

    async fn upsert_story_from_info(
        &self,
        ro_id: &str,
        story_info: &StoryInfo,
        order: u32,
    ) -> Result<()> {
        let now = Utc::now();
        let story_duration = story_info.duration.parse().unwrap_or(0);

        match self.repo.stories().get(&story_info.id).await {
            Ok(mut existing) => {
                existing.slug = story_info.slug.clone();
                existing.number = Some(story_info.number.clone()).filter(|s| !s.is_empty());
                existing.duration = story_duration;
                existing.order = order;
                existing.updated_at = now;
                self.repo.stories().update(existing).await?;
            }
            Err(MosError::NotFound(_)) => {
                let story = Story {
                    id: story_info.id.clone(),
                    running_order_id: ro_id.to_string(),
                    slug: story_info.slug.clone(),
                    number: Some(story_info.number.clone()).filter(|s| !s.is_empty()),
                    duration: story_duration,
                    status: Status::Pending,
                    order,
                    presenter: None,
                    created_at: now,
                    updated_at: now,
                };
                self.repo.stories().create(story).await?;
            }
            Err(other) => return Err(other),
        }

        for (j, item_info) in story_info.items.iter().enumerate() {
            self.upsert_item_from_info(&story_info.id, item_info, j as u32 + 1)
                .await?;
        }

        Ok(())
    }

    async fn upsert_item_from_info(
        &self,
        story_id: &str,
        item_info: &mos_protocol::messages::ItemInfo,
        order: u32,
    ) -> Result<()> {
        let now = Utc::now();
        let duration = item_info.duration.parse().unwrap_or(0);
        let object_id = Some(item_info.object_id.clone()).filter(|s| !s.is_empty());

        match self.repo.items().get(&item_info.id).await {
            Ok(mut existing) => {
                existing.slug = item_info.slug.clone();
                existing.duration = duration;
                existing.object_id = object_id;
                existing.order = order;
                existing.updated_at = now;
                self.repo.items().update(existing).await?;
            }
            Err(MosError::NotFound(_)) => {
                let item = Item {
                    id: item_info.id.clone(),
                    story_id: story_id.to_string(),
                    object_id,
                    slug: item_info.slug.clone(),
                    duration,
                    status: Status::Pending,
                    order,
                    created_at: now,
                    updated_at: now,
                };
                self.repo.items().create(item).await?;
            }
            Err(other) => return Err(other),
        }
        Ok(())
    }

    /// Dispatches `NEW`/`UPDATE`/`REPLACE` story actions (case-insensitive on
    /// `operation` after upper-casing, per spec).
    pub async fn process_story_action(&self, action: NcsReqStoryAction) -> Result<()> {
        match action.operation.to_uppercase().as_str() {
            "NEW" => self.create_new_story(&action.ro_story_send).await,
            "UPDATE" => self.update_story(&action.ro_story_send).await,
            "REPLACE" => self.replace_story(&action.ro_story_send).await,
            other => Err(MosError::InvalidRequest(format!(
                "unsupported story operation: {other}"
            ))),
        }
    }

    async fn create_new_story(&self, send: &mos_protocol::messages::RoStorySend) -> Result<()> {
        if send.ro_id.is_empty() {
            return Err(MosError::InvalidRequest(
                "no running order ID specified".into(),
            ));
        }

        let now = Utc::now();
        let ro_id = send.ro_id.clone();
        if self.repo.running_orders().get(&ro_id).await.is_err() {
            let ro = RunningOrder {
                id: ro_id.clone(),
                mos_id: self.source.clone(),
                slug: "Auto-created RO".into(),
                status: Status::Pending,
                duration: 0,
                channel: String::new(),
                air_time: None,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            self.repo.running_orders().create(ro).await?;
        }

        let existing_stories = self.repo.stories().list_by_running_order(&ro_id).await?;
        let order = existing_stories.len() as u32 + 1;

        let story = Story {
            id: send.story_id.clone(),
            running_order_id: ro_id,
            slug: send.story_slug.clone(),
            number: Some(send.story_num.clone()).filter(|s| !s.is_empty()),
            duration: 0,
            status: Status::Pending,
            order,
            presenter: None,
            created_at: now,
            updated_at: now,
        };
        self.repo.stories().create(story).await?;
        self.synthesize_items(&send.story_id, &send.story_body)
            .await?;

        self.publish_story_modified(&send.story_id).await;
        Ok(())
    }

    async fn update_story(&self, send: &mos_protocol::messages::RoStorySend) -> Result<()> {
        let mut story = self.repo.stories().get(&send.story_id).await?;
        story.slug = send.story_slug.clone();
        story.number = Some(send.story_num.clone()).filter(|s| !s.is_empty());
        story.updated_at = Utc::now();
        self.repo.stories().update(story).await?;
        self.synthesize_items(&send.story_id, &send.story_body)
            .await?;

        self.publish_story_modified(&send.story_id).await;
        Ok(())
    }

    /// Delete-then-create-with-same-id. Non-transactional: a failed create
    /// after a successful delete leaves the story absent, same as the Go
    /// original — see DESIGN.md.
    async fn replace_story(&self, send: &mos_protocol::messages::RoStorySend) -> Result<()> {
        self.repo.stories().delete(&send.story_id).await?;
        self.create_new_story(send).await
    }

    /// Synthesizes Item records from `storyBody.p[*].storyItem[*]` with ids
    /// `<storyID>_I<paragraphIndex>_<itemIndex>` (spec §4.4). `order` is a
    /// single counter running across all paragraphs, not reset per `<p>`,
    /// so the dense-within-Story invariant (spec §3/§8) holds for
    /// multi-paragraph bodies.
    async fn synthesize_items(
        &self,
        story_id: &str,
        body: &mos_protocol::messages::StoryBody,
    ) -> Result<()> {
        let now = Utc::now();
        let mut order = 0u32;
        for (p_idx, paragraph) in body.paragraphs.iter().enumerate() {
            for (i_idx, story_item) in paragraph.items.iter().enumerate() {
                let id = format!("{story_id}_I{p_idx}_{i_idx}");
                let object_id = Some(story_item.obj_id.clone()).filter(|s| !s.is_empty());
                let duration = story_item.item_ed_dur.unwrap_or(0);
                order += 1;

                if let Ok(mut existing) = self.repo.items().get(&id).await {
                    existing.slug = story_item.item_slug.clone();
                    existing.object_id = object_id;
                    existing.duration = duration;
                    existing.order = order;
                    existing.updated_at = now;
                    self.repo.items().update(existing).await?;
                } else {
                    let item = Item {
                        id,
                        story_id: story_id.to_string(),
                        object_id,
                        slug: story_item.item_slug.clone(),
                        duration,
                        status: Status::Pending,
                        order,
                        created_at: now,
                        updated_at: now,
                    };
                    self.repo.items().create(item).await?;
                }
            }
        }
        Ok(())
    }

    async fn publish_ro_updated(&self, ro_id: &str) {
        self.events
            .publish(Event {
                topic: Topic::RoUpdated,
                payload: ro_id.to_string(),
                source: self.source.clone(),
            })
            .await;
    }

    async fn publish_story_modified(&self, story_id: &str) {
        self.events
            .publish(Event {
                topic: Topic::StoryModified,
                payload: story_id.to_string(),
                source: self.source.clone(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryRepository;
    use mos_protocol::messages::{ItemInfo, StoryInfo};

    fn service() -> MosService {
        MosService::new(
            Arc::new(InMemoryRepository::new()),
            EventBus::new(),
            "mos1".into(),
        )
    }

    fn ro_create(id: &str, duration: &str) -> RunningOrderInfo {
        RunningOrderInfo {
            id: id.into(),
            slug: "Evening".into(),
            duration: duration.into(),
            stories: vec![StoryInfo {
                id: format!("{id}_S1"),
                slug: "Intro".into(),
                duration: "30".into(),
                items: vec![ItemInfo {
                    id: format!("{id}_I1"),
                    slug: "Clip".into(),
                    duration: "10".into(),
                    object_id: "OBJ1".into(),
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upsert_assigns_dense_story_and_item_order() {
        let svc = service();
        svc.process_running_order_info(ro_create("RO1", "1800"))
            .await
            .unwrap();
        let (_ro, stories) = svc.get_running_order_with_stories("RO1").await.unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].order, 1);
        let items = svc.get_items_for_story(&stories[0].id).await.unwrap();
        assert_eq!(items[0].order, 1);
    }

    #[tokio::test]
    async fn repeated_create_bumps_version_and_stays_idempotent() {
        let svc = service();
        svc.process_running_order_info(ro_create("RO2", "1800"))
            .await
            .unwrap();
        svc.process_running_order_info(ro_create("RO2", "1800"))
            .await
            .unwrap();
        let ros = svc.list_running_orders().await.unwrap();
        assert_eq!(ros.len(), 1);
        assert_eq!(ros[0].version, 2);
    }

    #[tokio::test]
    async fn story_new_then_replace_keeps_same_story_id() {
        let svc = service();
        let send = mos_protocol::messages::RoStorySend {
            ro_id: "RO3".into(),
            story_id: "S1".into(),
            story_slug: "First".into(),
            ..Default::default()
        };
        svc.create_new_story(&send).await.unwrap();
        svc.replace_story(&send).await.unwrap();
        let story = svc.repo.stories().get("S1").await.unwrap();
        assert_eq!(story.slug, "First");
    }

    #[tokio::test]
    async fn synthesized_items_stay_densely_ordered_across_paragraphs() {
        let svc = service();
        let send = mos_protocol::messages::RoStorySend {
            ro_id: "RO4".into(),
            story_id: "S1".into(),
            story_slug: "Multi-paragraph".into(),
            story_body: mos_protocol::messages::StoryBody {
                paragraphs: vec![
                    mos_protocol::messages::StoryParagraph {
                        items: vec![
                            mos_protocol::messages::StoryItem {
                                item_id: "A".into(),
                                ..Default::default()
                            },
                            mos_protocol::messages::StoryItem {
                                item_id: "B".into(),
                                ..Default::default()
                            },
                        ],
                    },
                    mos_protocol::messages::StoryParagraph {
                        items: vec![
                            mos_protocol::messages::StoryItem {
                                item_id: "C".into(),
                                ..Default::default()
                            },
                        ],
                    },
                ],
            },
            ..Default::default()
        };
        svc.create_new_story(&send).await.unwrap();
        let mut items = svc.get_items_for_story("S1").await.unwrap();
        items.sort_by_key(|i| i.order);
        let orders: Vec<u32> = items.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![1, 2, 3], "no duplicate order across paragraphs");
    }
}
