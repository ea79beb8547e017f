//! Per-connection session (spec §4.6): read loop, framer feed, dispatch,
//! write serialization, and idempotent close. Grounded on the Go original's
//! `server.ClientConnection`.

use crate::config::Config;
use crate::error::MosError;
use crate::events::{EventBus, Topic};
use crate::service::MosService;
use chrono::Utc;
use mos_protocol::messages::{
    Heartbeat, ItemInfo, Message, MosAck, NcsAck, RoListItem, RunningOrderInfo, StoryInfo,
};
use mos_protocol::{CodecError, Framer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A registry-held handle used for broadcast and shutdown, per spec §4.7 ---
/// the registry owns only back-references, never the session's own state.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    write_timeout: Duration,
    close: Arc<Notify>,
}

impl SessionHandle {
    pub async fn write(&self, data: &str) -> std::io::Result<()> {
        let mut w = self.writer.lock().await;
        tokio::time::timeout(self.write_timeout, w.write_all(data.as_bytes()))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "write timeout"))??;
        Ok(())
    }

    pub fn close(&self) {
        self.close.notify_waiters();
    }
}

pub struct Session {
    id: String,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    write_timeout: Duration,
    close: Arc<Notify>,
    closed_once: std::sync::Once,
    ncs_message_id: AtomicU64,
}

impl Session {
    /// Runs one client connection to completion. Returns once the session
    /// has fully closed (read loop exited and registry deregistration done).
    pub async fn run(
        stream: TcpStream,
        id: String,
        config: Arc<Config>,
        service: Arc<MosService>,
        events: EventBus,
        registry: crate::server::Registry,
        shutdown: CancellationToken,
    ) {
        let (mut read_half, write_half) = stream.into_split();
        let session = Arc::new(Session {
            id: id.clone(),
            writer: Arc::new(Mutex::new(write_half)),
            write_timeout: config.server.write_timeout,
            close: Arc::new(Notify::new()),
            closed_once: std::sync::Once::new(),
            ncs_message_id: AtomicU64::new(1),
        });

        let handle = SessionHandle {
            id: id.clone(),
            writer: session.writer.clone(),
            write_timeout: session.write_timeout,
            close: session.close.clone(),
        };
        registry.register(handle).await;

        let heartbeat = Arc::new(crate::heartbeat::HeartbeatMonitor::new(
            config.mos.client_timeout,
            config.mos.heartbeat_interval / 2,
        ));

        let hb_stop = Arc::new(Notify::new());
        let hb_monitor = heartbeat.clone();
        let hb_stop_clone = hb_stop.clone();
        let close_for_timeout = session.close.clone();
        let hb_task = tokio::spawn(async move {
            hb_monitor
                .run(hb_stop_clone, move || {
                    close_for_timeout.notify_waiters();
                })
                .await;
        });

        let sub_stop = Arc::new(Notify::new());
        let sub_task = {
            let service = service.clone();
            let mos_id = config.mos.id.clone();
            let session_id = id.clone();
            let writer = session.writer.clone();
            let write_timeout = session.write_timeout;
            let sub_close = session.close.clone();
            let mut rx = events.subscribe(Topic::RoUpdated, 10).await;
            let sub_stop_clone = sub_stop.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = sub_stop_clone.notified() => return,
                        _ = sub_close.notified() => return,
                        event = rx.recv() => {
                            match event {
                                None => return,
                                Some(event) => {
                                    if let Err(e) = push_running_order_update(
                                        &service, &mos_id, &writer, write_timeout, &event.payload,
                                    ).await {
                                        warn!(session = %session_id, error = %e, "failed to push ro update");
                                    }
                                }
                            }
                        }
                    }
                }
            })
        };

        let mut framer = Framer::new();
        let mut buf = [0u8; 4096];

        'read_loop: loop {
            if shutdown.is_cancelled() {
                break;
            }
            let read = tokio::select! {
                _ = session.close.notified() => break 'read_loop,
                r = tokio::time::timeout(Duration::from_millis(500), read_half.read(&mut buf)) => r,
            };

            let n = match read {
                Err(_elapsed) => continue, // read deadline, not an error; poll cancellation
                Ok(Ok(0)) => {
                    info!(session = %id, "client closed connection");
                    break;
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    error!(session = %id, error = %e, "read error");
                    break;
                }
            };

            framer.append(&buf[..n]);
            while framer.has_complete_message() {
                match framer.parse() {
                    Ok(message) => {
                        if let Err(e) = session
                            .handle_message(message, &config, &service, &heartbeat)
                            .await
                        {
                            warn!(session = %id, error = %e, "message handling failed");
                        }
                    }
                    Err(CodecError::IncompleteXml) => break,
                    Err(CodecError::Malformed(e)) => {
                        error!(session = %id, error = %e, "malformed XML frame dropped");
                    }
                    Err(CodecError::UnknownMessage(name)) => {
                        warn!(session = %id, message_type = %name, "unknown message type dropped");
                    }
                }
            }
        }

        hb_stop.notify_waiters();
        sub_stop.notify_waiters();
        let _ = hb_task.await;
        let _ = sub_task.await;
        session.close();
        registry.unregister(&session.id).await;
    }

    fn close(&self) {
        self.closed_once.call_once(|| {
            self.close.notify_waiters();
            info!(session = %self.id, "session closed");
        });
    }

    async fn write(&self, data: &str) {
        let mut w = self.writer.lock().await;
        if tokio::time::timeout(self.write_timeout, w.write_all(data.as_bytes()))
            .await
            .is_err()
        {
            warn!(session = %self.id, "write timed out");
        }
    }

    async fn handle_message(
        &self,
        message: Message,
        config: &Config,
        service: &MosService,
        heartbeat: &crate::heartbeat::HeartbeatMonitor,
    ) -> Result<(), MosError> {
        match message {
            Message::Heartbeat(hb) => {
                heartbeat.record_heartbeat().await;
                let response = Heartbeat {
                    request_id: hb.request_id,
                    timestamp: Some(Utc::now().to_rfc3339()),
                    source: Some(config.mos.id.clone()),
                };
                if let Ok(encoded) = mos_protocol::encode(&response) {
                    self.write(&encoded).await;
                }
                Ok(())
            }
            Message::ReqRunningOrderList(req) => {
                let items = match service.list_running_orders().await {
                    Ok(ros) => ros
                        .into_iter()
                        .map(|ro| RoListItem {
                            id: ro.id,
                            slug: ro.slug,
                            channel: ro.channel,
                            status: ro.status.as_wire_str().to_string(),
                            duration: ro.duration.to_string(),
                        })
                        .collect(),
                    Err(e) => {
                        self.send_mos_ack(config, req.request_id, "ERROR", &e.to_string())
                            .await;
                        return Err(e);
                    }
                };
                let response = mos_protocol::messages::RunningOrderList {
                    request_id: req.request_id,
                    timestamp: Some(Utc::now().to_rfc3339()),
                    source: Some(config.mos.id.clone()),
                    running_orders: items,
                };
                if let Ok(encoded) = mos_protocol::encode(&response) {
                    self.write(&encoded).await;
                }
                Ok(())
            }
            Message::ReqRunningOrder(req) => {
                match service.get_running_order_with_stories(&req.ro_id).await {
                    Ok((ro, stories)) => {
                        let story_infos = self.build_story_infos(service, &stories).await;
                        let response = RunningOrderInfo {
                            request_id: req.request_id,
                            timestamp: Some(Utc::now().to_rfc3339()),
                            source: Some(config.mos.id.clone()),
                            id: ro.id,
                            slug: ro.slug,
                            channel: ro.channel,
                            ed_start: String::new(),
                            trigger: String::new(),
                            duration: ro.duration.to_string(),
                            stories: story_infos,
                        };
                        if let Ok(encoded) = mos_protocol::encode(&response) {
                            self.write(&encoded).await;
                        }
                        Ok(())
                    }
                    Err(e) => {
                        self.send_mos_ack(config, req.request_id, "ERROR", &e.to_string())
                            .await;
                        Err(e)
                    }
                }
            }
            Message::RunningOrderInfo(info) => {
                let request_id = info.request_id.clone();
                match service.process_running_order_info(info).await {
                    Ok(()) => {
                        self.send_mos_ack(config, request_id, "ACK", "running order processed")
                            .await;
                        Ok(())
                    }
                    Err(e) => {
                        self.send_mos_ack(config, request_id, "ERROR", &e.to_string())
                            .await;
                        Err(e)
                    }
                }
            }
            Message::NcsReqStoryAction(action) => {
                let ncs_id = if action.username.as_deref().unwrap_or("").is_empty() {
                    "unknown-ncs".to_string()
                } else {
                    action.username.clone().unwrap()
                };
                let message_id = self.ncs_message_id.fetch_add(1, Ordering::SeqCst);
                match service.process_story_action(action).await {
                    Ok(()) => {
                        self.send_ncs_ack(&ncs_id, message_id, "ACK", None).await;
                        Ok(())
                    }
                    Err(e) => {
                        self.send_ncs_ack(&ncs_id, message_id, "ERROR", Some(&e.to_string()))
                            .await;
                        Err(e)
                    }
                }
            }
            Message::MosAck(ack) => {
                info!(session = %self.id, status = %ack.status, "received mosAck");
                Ok(())
            }
            Message::NcsAck(_) | Message::RunningOrderList(_) => {
                warn!(session = %self.id, "received an outbound-only message type");
                Ok(())
            }
        }
    }

    async fn build_story_infos(
        &self,
        service: &MosService,
        stories: &[crate::model::Story],
    ) -> Vec<StoryInfo> {
        let mut out = Vec::with_capacity(stories.len());
        for story in stories {
            let items = service
                .get_items_for_story(&story.id)
                .await
                .unwrap_or_default();
            out.push(StoryInfo {
                id: story.id.clone(),
                slug: story.slug.clone(),
                number: story.number.clone().unwrap_or_default(),
                duration: story.duration.to_string(),
                items: items
                    .into_iter()
                    .map(|item| ItemInfo {
                        id: item.id,
                        slug: item.slug,
                        duration: item.duration.to_string(),
                        object_id: item.object_id.unwrap_or_default(),
                    })
                    .collect(),
            });
        }
        out
    }

    async fn send_mos_ack(
        &self,
        config: &Config,
        request_id: Option<String>,
        status: &str,
        description: &str,
    ) {
        let ack = MosAck {
            request_id,
            timestamp: Some(Utc::now().to_rfc3339()),
            source: Some(config.mos.id.clone()),
            status: status.to_string(),
            status_description: Some(description.to_string()),
        };
        if let Ok(encoded) = mos_protocol::encode(&ack) {
            self.write(&encoded).await;
        }
    }

    /// Echoes the NCS id from the originating request and allocates a
    /// monotonically increasing per-session message id, resolving the open
    /// question the Go original left as hardcoded placeholders (§9).
    async fn send_ncs_ack(
        &self,
        ncs_id: &str,
        message_id: u64,
        status: &str,
        description: Option<&str>,
    ) {
        let ack = NcsAck {
            ncs_id: Some(ncs_id.to_string()),
            message_id: Some(message_id.to_string()),
            status: status.to_string(),
            status_description: description.map(str::to_string),
        };
        if let Ok(encoded) = mos_protocol::encode(&ack) {
            self.write(&encoded).await;
        }
    }
}

async fn push_running_order_update(
    service: &MosService,
    mos_id: &str,
    writer: &Arc<Mutex<OwnedWriteHalf>>,
    write_timeout: Duration,
    ro_id: &str,
) -> Result<(), MosError> {
    let (ro, stories) = service.get_running_order_with_stories(ro_id).await?;
    let mut story_infos = Vec::with_capacity(stories.len());
    for story in &stories {
        let items = service
            .get_items_for_story(&story.id)
            .await
            .unwrap_or_default();
        story_infos.push(StoryInfo {
            id: story.id.clone(),
            slug: story.slug.clone(),
            number: story.number.clone().unwrap_or_default(),
            duration: story.duration.to_string(),
            items: items
                .into_iter()
                .map(|item| ItemInfo {
                    id: item.id,
                    slug: item.slug,
                    duration: item.duration.to_string(),
                    object_id: item.object_id.unwrap_or_default(),
                })
                .collect(),
        });
    }

    let response = RunningOrderInfo {
        request_id: None,
        timestamp: Some(Utc::now().to_rfc3339()),
        source: Some(mos_id.to_string()),
        id: ro.id,
        slug: ro.slug,
        channel: ro.channel,
        ed_start: String::new(),
        trigger: String::new(),
        duration: ro.duration.to_string(),
        stories: story_infos,
    };

    let encoded =
        mos_protocol::encode(&response).map_err(|e| MosError::StorageFailure(e.to_string()))?;
    let mut w = writer.lock().await;
    tokio::time::timeout(write_timeout, w.write_all(encoded.as_bytes()))
        .await
        .map_err(|_| MosError::StorageFailure("write timeout".into()))?
        .map_err(|e| MosError::StorageFailure(e.to_string()))?;
    Ok(())
}
