use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::feed::manager::FeedManager;
use crate::models::status::ServiceStatus;
use crate::rpc::client::BackendClient;

/// Spawn the fast poll loop for connections and allowed IPs.
///
/// Failures are caught per tick: the cache keeps its last good value and the
/// next tick runs on schedule, with no backoff. Ticks may overlap a slow
/// backend; the manager's ticket guard drops whichever response is stale.
pub fn spawn_feed_loop(
    manager: Arc<FeedManager>,
    client: Arc<BackendClient>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            let ticket = manager.begin_feed_tick();

            let (connections, allowed_ips) =
                tokio::join!(client.connections(), client.allowed_ips());
            match (connections, allowed_ips) {
                (Ok(connections), Ok(allowed_ips)) => {
                    if !manager.apply_feed(ticket, connections, allowed_ips) {
                        debug!("Discarding stale feed response (tick {})", ticket);
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Feed poll failed, keeping last good data: {}", e);
                }
            }
        }
    })
}

/// Spawn the slow poll loop for the geolocation/service status. A backend
/// that does not answer its status RPC is reported as not running.
pub fn spawn_status_loop(
    manager: Arc<FeedManager>,
    client: Arc<BackendClient>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            let ticket = manager.begin_status_tick();

            match client.geolocation_status().await {
                Ok(status) => {
                    if !manager.apply_status(ticket, Some(status), ServiceStatus::Running) {
                        debug!("Discarding stale status response (tick {})", ticket);
                    }
                }
                Err(e) => {
                    warn!("Status poll failed: {}", e);
                    manager.apply_status(ticket, None, ServiceStatus::NotRunning);
                }
            }
        }
    })
}
