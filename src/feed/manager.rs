use log::debug;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::models::connection::Connection;
use crate::models::status::{GeolocationStatus, ServiceStatus};

/// Capacity of the update broadcast; a slow subscriber only loses
/// intermediate snapshots, never the latest state it can re-request
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Update pushed to sync-channel subscribers after a cache replacement
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Connections(Vec<Connection>),
    AllowedIps(Vec<String>),
}

/// Cache of the most recently polled live feed.
///
/// Connection and allowed-IP lists are replaced wholesale on every applied
/// tick; there is no incremental merge. Poll loops may overlap in flight, so
/// every tick draws a monotonic ticket before sending and a response is
/// discarded when a later-sent one has already been applied.
pub struct FeedManager {
    connections: RwLock<Vec<Connection>>,
    allowed_ips: RwLock<Vec<String>>,

    /// IPs the map surface reported as not yet placeable
    unlocated_ips: RwLock<Vec<String>>,

    geolocation: RwLock<Option<GeolocationStatus>>,
    service: RwLock<ServiceStatus>,

    feed_ticket: AtomicU64,
    feed_applied: AtomicU64,
    status_ticket: AtomicU64,
    status_applied: AtomicU64,

    events: broadcast::Sender<FeedEvent>,
}

impl FeedManager {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            connections: RwLock::new(Vec::new()),
            allowed_ips: RwLock::new(Vec::new()),
            unlocated_ips: RwLock::new(Vec::new()),
            geolocation: RwLock::new(None),
            service: RwLock::new(ServiceStatus::NotRunning),
            feed_ticket: AtomicU64::new(0),
            feed_applied: AtomicU64::new(0),
            status_ticket: AtomicU64::new(0),
            status_applied: AtomicU64::new(0),
            events,
        }
    }

    /// Subscribe to cache replacements (one receiver per map session)
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    /// Draw the ticket for a connection/allowed-IP poll, before sending it
    pub fn begin_feed_tick(&self) -> u64 {
        self.feed_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply a feed response. Returns false when a later-sent response has
    /// already been applied; the caches are left untouched in that case.
    pub fn apply_feed(&self, ticket: u64, connections: Vec<Connection>, allowed_ips: Vec<String>) -> bool {
        if self.feed_applied.fetch_max(ticket, Ordering::SeqCst) >= ticket {
            return false;
        }

        *self.connections.write() = connections.clone();
        *self.allowed_ips.write() = allowed_ips.clone();
        debug!(
            "Applied feed tick {}: {} connections, {} allowed IPs",
            ticket,
            connections.len(),
            allowed_ips.len()
        );

        // send errors just mean nobody is subscribed right now
        let _ = self.events.send(FeedEvent::Connections(connections));
        let _ = self.events.send(FeedEvent::AllowedIps(allowed_ips));
        true
    }

    /// Draw the ticket for a service status poll
    pub fn begin_status_tick(&self) -> u64 {
        self.status_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply a status response. `geolocation` of `None` keeps the last good
    /// report (the transport failed, not the cache).
    pub fn apply_status(&self, ticket: u64, geolocation: Option<GeolocationStatus>, service: ServiceStatus) -> bool {
        if self.status_applied.fetch_max(ticket, Ordering::SeqCst) >= ticket {
            return false;
        }

        if let Some(status) = geolocation {
            *self.geolocation.write() = Some(status);
        }
        *self.service.write() = service;
        true
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.connections.read().clone()
    }

    pub fn allowed_ips(&self) -> Vec<String> {
        self.allowed_ips.read().clone()
    }

    pub fn set_unlocated_ips(&self, ips: Vec<String>) {
        *self.unlocated_ips.write() = ips;
    }

    pub fn unlocated_ips(&self) -> Vec<String> {
        self.unlocated_ips.read().clone()
    }

    pub fn geolocation(&self) -> Option<GeolocationStatus> {
        self.geolocation.read().clone()
    }

    pub fn service(&self) -> ServiceStatus {
        *self.service.read()
    }
}

impl Default for FeedManager {
    fn default() -> Self {
        Self::new()
    }
}
