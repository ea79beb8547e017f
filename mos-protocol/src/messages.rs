//! Typed representations of the MOS v4.0 message set (spec §6).

use serde::{Deserialize, Serialize};

/// Root element names, used for dispatch and for the `messageType()` contract
/// from the design notes (§9: "the interface is minimal").
pub trait MosMessage {
    fn message_type(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "heartbeat")]
pub struct Heartbeat {
    #[serde(rename = "@requestID", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "@source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl MosMessage for Heartbeat {
    fn message_type(&self) -> &'static str {
        "heartbeat"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "roReq")]
pub struct ReqRunningOrderList {
    #[serde(rename = "@requestID", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "@source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl MosMessage for ReqRunningOrderList {
    fn message_type(&self) -> &'static str {
        "roReq"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "roReqAll")]
pub struct ReqRunningOrder {
    #[serde(rename = "@requestID", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "@source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "roID")]
    pub ro_id: String,
}

impl MosMessage for ReqRunningOrder {
    fn message_type(&self) -> &'static str {
        "roReqAll"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "ro")]
pub struct RoListItem {
    #[serde(rename = "roID")]
    pub id: String,
    #[serde(rename = "roSlug")]
    pub slug: String,
    #[serde(
        rename = "roChannel",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub channel: String,
    #[serde(rename = "roStatus", skip_serializing_if = "String::is_empty", default)]
    pub status: String,
    #[serde(rename = "roDur", skip_serializing_if = "String::is_empty", default)]
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "roList")]
pub struct RunningOrderList {
    #[serde(rename = "@requestID", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "@source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "ro", default)]
    pub running_orders: Vec<RoListItem>,
}

impl MosMessage for RunningOrderList {
    fn message_type(&self) -> &'static str {
        "roList"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "item")]
pub struct ItemInfo {
    #[serde(rename = "itemID")]
    pub id: String,
    #[serde(rename = "itemSlug", skip_serializing_if = "String::is_empty", default)]
    pub slug: String,
    #[serde(rename = "itemDur", skip_serializing_if = "String::is_empty", default)]
    pub duration: String,
    #[serde(rename = "objID", skip_serializing_if = "String::is_empty", default)]
    pub object_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "story")]
pub struct StoryInfo {
    #[serde(rename = "storyID")]
    pub id: String,
    #[serde(
        rename = "storySlug",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub slug: String,
    #[serde(rename = "storyNum", skip_serializing_if = "String::is_empty", default)]
    pub number: String,
    #[serde(rename = "storyDur", skip_serializing_if = "String::is_empty", default)]
    pub duration: String,
    #[serde(rename = "item", default)]
    pub items: Vec<ItemInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "roCreate")]
pub struct RunningOrderInfo {
    #[serde(rename = "@requestID", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "@source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "roID")]
    pub id: String,
    #[serde(rename = "roSlug", skip_serializing_if = "String::is_empty", default)]
    pub slug: String,
    #[serde(
        rename = "roChannel",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub channel: String,
    #[serde(
        rename = "roEdStart",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub ed_start: String,
    #[serde(
        rename = "roTrigger",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub trigger: String,
    #[serde(rename = "roDur", skip_serializing_if = "String::is_empty", default)]
    pub duration: String,
    #[serde(rename = "story", default)]
    pub stories: Vec<StoryInfo>,
}

impl MosMessage for RunningOrderInfo {
    fn message_type(&self) -> &'static str {
        "roCreate"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "mosAck")]
pub struct MosAck {
    #[serde(rename = "@requestID", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "@source", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub status: String,
    #[serde(rename = "statusDescription", skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
}

impl MosMessage for MosAck {
    fn message_type(&self) -> &'static str {
        "mosAck"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "storyItem")]
pub struct StoryItem {
    #[serde(rename = "itemID")]
    pub item_id: String,
    #[serde(rename = "itemSlug", skip_serializing_if = "String::is_empty", default)]
    pub item_slug: String,
    #[serde(rename = "objID", skip_serializing_if = "String::is_empty", default)]
    pub obj_id: String,
    #[serde(rename = "mosID", skip_serializing_if = "String::is_empty", default)]
    pub mos_id: String,
    #[serde(rename = "itemEdStart", skip_serializing_if = "Option::is_none")]
    pub item_ed_start: Option<i64>,
    #[serde(rename = "itemEdDur", skip_serializing_if = "Option::is_none")]
    pub item_ed_dur: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "p")]
pub struct StoryParagraph {
    #[serde(rename = "storyItem", default)]
    pub items: Vec<StoryItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "storyBody")]
pub struct StoryBody {
    #[serde(rename = "p", default)]
    pub paragraphs: Vec<StoryParagraph>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "roStorySend")]
pub struct RoStorySend {
    #[serde(rename = "roID")]
    pub ro_id: String,
    #[serde(rename = "storyID")]
    pub story_id: String,
    #[serde(
        rename = "storySlug",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub story_slug: String,
    #[serde(rename = "storyNum", skip_serializing_if = "String::is_empty", default)]
    pub story_num: String,
    #[serde(rename = "storyBody", default)]
    pub story_body: StoryBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "ncsReqStoryAction")]
pub struct NcsReqStoryAction {
    #[serde(rename = "@operation")]
    pub operation: String,
    #[serde(rename = "@leaseLock", skip_serializing_if = "Option::is_none")]
    pub lease_lock: Option<String>,
    #[serde(rename = "@username", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(rename = "roStorySend")]
    pub ro_story_send: RoStorySend,
}

impl MosMessage for NcsReqStoryAction {
    fn message_type(&self) -> &'static str {
        "ncsReqStoryAction"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "ncsAck")]
pub struct NcsAck {
    #[serde(rename = "@ncsID", skip_serializing_if = "Option::is_none")]
    pub ncs_id: Option<String>,
    #[serde(rename = "@messageID", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub status: String,
    #[serde(rename = "statusDescription", skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
}

impl MosMessage for NcsAck {
    fn message_type(&self) -> &'static str {
        "ncsAck"
    }
}

/// The tagged sum over all message variants (design notes §9).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Heartbeat(Heartbeat),
    ReqRunningOrderList(ReqRunningOrderList),
    ReqRunningOrder(ReqRunningOrder),
    RunningOrderList(RunningOrderList),
    RunningOrderInfo(RunningOrderInfo),
    MosAck(MosAck),
    NcsReqStoryAction(NcsReqStoryAction),
    NcsAck(NcsAck),
}

impl Message {
    pub fn message_type(&self) -> &'static str {
        match self {
            Message::Heartbeat(m) => m.message_type(),
            Message::ReqRunningOrderList(m) => m.message_type(),
            Message::ReqRunningOrder(m) => m.message_type(),
            Message::RunningOrderList(m) => m.message_type(),
            Message::RunningOrderInfo(m) => m.message_type(),
            Message::MosAck(m) => m.message_type(),
            Message::NcsReqStoryAction(m) => m.message_type(),
            Message::NcsAck(m) => m.message_type(),
        }
    }
}
