use actix_web::{web, Error, HttpRequest, Responder};
use actix_ws::{self, Message};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;

use crate::engine::reconciler::{EditRequest, Reconciler};
use crate::engine::region::RegionToken;
use crate::feed::manager::{FeedEvent, FeedManager};
use crate::models::connection::Connection;

// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Region event payload from the map surface
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionEvent {
    pub name: String,
    pub region: RegionToken,
}

/// Edit payload; `old_region` is absent when the map surface lost the
/// shape's prior token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEdit {
    pub name: String,

    #[serde(default)]
    pub old_region: Option<RegionToken>,

    pub region: RegionToken,
}

/// Messages the map surface sends us. Anything that does not parse into
/// this closed set is rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MapInMessage {
    MapReady,
    RegionCreated { data: RegionEvent },
    RegionEdited { data: RegionEdit },
    RegionDeleted { data: RegionEvent },

    #[serde(rename = "unlocatedIPs")]
    UnlocatedIps { data: Vec<String> },
}

/// Messages pushed to the map surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MapOutMessage {
    AddRegion { name: String, data: RegionToken },
    UpdateConnections { data: Vec<Connection> },

    #[serde(rename = "updateAllowedIPs")]
    UpdateAllowedIps { data: Vec<String> },

    ClearMap,
    Ping { timestamp: u64 },
}

/// Handle map sync WebSocket connections
pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    reconciler: web::Data<Arc<Reconciler>>,
    feed: web::Data<Arc<FeedManager>>,
) -> Result<impl Responder, Error> {
    let addr = req
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("Map sync connection from: {}", addr);

    let (response, session, mut msg_stream) = actix_ws::handle(&req, body)?;

    let reconciler = reconciler.into_inner();
    let feed = feed.into_inner();

    let session_for_messages = session.clone();
    let session_for_updates = session.clone();
    let session_for_heartbeat = session.clone();

    actix_web::rt::spawn(async move {
        let mut feed_rx = feed.subscribe();

        // Inbound messages from the map surface
        let map_msg_task = {
            let mut session = session_for_messages;
            let reconciler = reconciler.clone();
            let feed = feed.clone();

            async move {
                while let Some(Ok(msg)) = msg_stream.next().await {
                    match msg {
                        Message::Text(text) => {
                            let parsed: MapInMessage = match serde_json::from_str(&text) {
                                Ok(parsed) => parsed,
                                Err(e) => {
                                    // fail fast on malformed frames instead of
                                    // silently ignoring them
                                    error!("Rejecting malformed map message: {}", e);
                                    break;
                                }
                            };
                            if let Err(e) =
                                handle_map_message(parsed, &mut session, &reconciler, &feed).await
                            {
                                error!("Map message handling failed: {}", e);
                            }
                        }
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => {
                            info!("Map surface requested close");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        };

        // Live feed updates pushed to the map surface
        let feed_updates_task = {
            let mut session = session_for_updates;

            async move {
                loop {
                    match feed_rx.recv().await {
                        Ok(event) => {
                            let msg = match event {
                                FeedEvent::Connections(data) => {
                                    MapOutMessage::UpdateConnections { data }
                                }
                                FeedEvent::AllowedIps(data) => {
                                    MapOutMessage::UpdateAllowedIps { data }
                                }
                            };
                            if send_message(&mut session, &msg).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            // only intermediate snapshots were lost; the next
                            // event carries the full current state
                            warn!("Map session lagged behind {} feed updates", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        };

        // Heartbeat pings
        let heartbeat_task = {
            let mut session = session_for_heartbeat;

            async move {
                let mut heartbeat = interval(HEARTBEAT_INTERVAL);
                loop {
                    heartbeat.tick().await;
                    let ping = MapOutMessage::Ping {
                        timestamp: chrono::Utc::now().timestamp() as u64,
                    };
                    if send_message(&mut session, &ping).await.is_err() {
                        break;
                    }
                }
            }
        };

        tokio::select! {
            _ = map_msg_task => {},
            _ = feed_updates_task => {},
            _ = heartbeat_task => {},
        }

        info!("Map sync connection closed");
    });

    Ok(response)
}

/// Dispatch one inbound map message
async fn handle_map_message(
    msg: MapInMessage,
    session: &mut actix_ws::Session,
    reconciler: &Arc<Reconciler>,
    feed: &Arc<FeedManager>,
) -> crate::utils::error::AppResult<()> {
    match msg {
        MapInMessage::MapReady => {
            debug!("Map is ready, replaying geo-filters");
            send_replay(session, reconciler, feed).await?;
        }
        MapInMessage::RegionCreated { data } => {
            reconciler.add_region(&data.name, data.region, true).await?;
        }
        MapInMessage::RegionEdited { data } => {
            let request = match data.old_region {
                Some(old) => EditRequest::ByExactToken {
                    old,
                    new: data.region,
                },
                None => EditRequest::ByPrefix { new: data.region },
            };
            reconciler.edit_region(&data.name, request).await?;
        }
        MapInMessage::RegionDeleted { data } => {
            reconciler.delete_region(&data.name, &data.region).await?;
            // the map redraws from the authoritative store state
            send_replay(session, reconciler, feed).await?;
        }
        MapInMessage::UnlocatedIps { data } => {
            debug!("Map surface reported {} unlocated IPs", data.len());
            feed.set_unlocated_ips(data);
        }
    }
    Ok(())
}

/// Replay the authoritative state: every enabled region, then the current
/// live feed. Safe to run repeatedly — duplicate `mapReady` events replay
/// the same sequence.
async fn send_replay(
    session: &mut actix_ws::Session,
    reconciler: &Arc<Reconciler>,
    feed: &Arc<FeedManager>,
) -> crate::utils::error::AppResult<()> {
    let notices = reconciler.load_all().await?;
    for notice in notices {
        let msg = MapOutMessage::AddRegion {
            name: notice.name,
            data: notice.region,
        };
        if send_message(session, &msg).await.is_err() {
            return Ok(());
        }
    }

    let connections = MapOutMessage::UpdateConnections {
        data: feed.connections(),
    };
    if send_message(session, &connections).await.is_err() {
        return Ok(());
    }
    let allowed = MapOutMessage::UpdateAllowedIps {
        data: feed.allowed_ips(),
    };
    let _ = send_message(session, &allowed).await;
    Ok(())
}

async fn send_message(
    session: &mut actix_ws::Session,
    msg: &MapOutMessage,
) -> Result<(), actix_ws::Closed> {
    match serde_json::to_string(msg) {
        Ok(json) => session.text(json).await,
        Err(e) => {
            error!("Failed to serialize map message: {}", e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn inbound_tags_parse_into_the_closed_set() {
        let created: MapInMessage = serde_json::from_str(
            r#"{"type":"regionCreated","data":{"name":"EU","region":"r1:poly1"}}"#,
        )
        .expect("parse");
        assert_eq!(
            created,
            MapInMessage::RegionCreated {
                data: RegionEvent {
                    name: "EU".into(),
                    region: "r1:poly1".into()
                }
            }
        );

        let ready: MapInMessage = serde_json::from_str(r#"{"type":"mapReady"}"#).expect("parse");
        assert_eq!(ready, MapInMessage::MapReady);

        let unlocated: MapInMessage =
            serde_json::from_str(r#"{"type":"unlocatedIPs","data":["198.51.100.7"]}"#)
                .expect("parse");
        assert_eq!(
            unlocated,
            MapInMessage::UnlocatedIps {
                data: vec!["198.51.100.7".into()]
            }
        );
    }

    #[test]
    fn edit_tolerates_a_missing_old_region() {
        let edited: MapInMessage = serde_json::from_str(
            r#"{"type":"regionEdited","data":{"name":"EU","region":"r1:poly2"}}"#,
        )
        .expect("parse");
        match edited {
            MapInMessage::RegionEdited { data } => {
                assert_eq!(data.old_region, None);
                assert_eq!(data.region, "r1:poly2".into());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_str::<MapInMessage>(r#"{"type":"formatDisk"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn outbound_tags_match_the_map_protocol() {
        let add = MapOutMessage::AddRegion {
            name: "EU".into(),
            data: "r1:poly1".into(),
        };
        assert_eq!(
            serde_json::to_string(&add).expect("serialize"),
            r#"{"type":"addRegion","name":"EU","data":"r1:poly1"}"#
        );

        let clear = MapOutMessage::ClearMap;
        assert_eq!(
            serde_json::to_string(&clear).expect("serialize"),
            r#"{"type":"clearMap"}"#
        );

        let ips = MapOutMessage::UpdateAllowedIps { data: vec![] };
        assert_eq!(
            serde_json::to_string(&ips).expect("serialize"),
            r#"{"type":"updateAllowedIPs","data":[]}"#
        );
    }
}
