//! The domain entities (spec §3): RunningOrder, Story, Item, MOSObject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Pending,
    Ready,
    Active,
    Completed,
    Skipped,
    Error,
}

impl Status {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Ready => "READY",
            Status::Active => "ACTIVE",
            Status::Completed => "COMPLETED",
            Status::Skipped => "SKIPPED",
            Status::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningOrder {
    pub id: String,
    pub mos_id: String,
    pub slug: String,
    pub status: Status,
    pub duration: i64,
    pub channel: String,
    pub air_time: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub running_order_id: String,
    pub slug: String,
    pub number: Option<String>,
    pub duration: i64,
    pub status: Status,
    pub order: u32,
    pub presenter: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub story_id: String,
    pub object_id: Option<String>,
    pub slug: String,
    pub duration: i64,
    pub status: Status,
    pub order: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MosObject {
    pub id: String,
    pub object_type: String,
    pub slug: String,
    pub duration: i64,
    pub status: Status,
    pub metadata: HashMap<String, String>,
}
