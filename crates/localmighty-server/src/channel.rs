//! Event channel: connections, rooms and fan-out within one namespace.
//!
//! A [`Namespace`] is an isolation domain. The main sync protocol and the
//! hub each own one, and a connection registered on one is invisible to the
//! other. Every emit reports how many connections it reached, so a send to
//! an empty room is a visible [`Delivery::NoRecipients`] rather than an
//! error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use localmighty_shared::protocol::Frame;

use crate::auth::Identity;

pub type ConnectionId = Uuid;

/// Result of an emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued on this many connection outboxes.
    Delivered(usize),
    /// Nobody matched the target; the frame was dropped.
    NoRecipients,
}

impl Delivery {
    fn from_count(count: usize) -> Self {
        if count == 0 {
            Delivery::NoRecipients
        } else {
            Delivery::Delivered(count)
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered(_))
    }

    pub fn count(&self) -> usize {
        match self {
            Delivery::Delivered(n) => *n,
            Delivery::NoRecipients => 0,
        }
    }
}

/// What the server knows about a connected peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: ConnectionId,
    /// Remote address, honouring `X-Forwarded-For`.
    pub ip: String,
    pub identity: Identity,
}

impl Peer {
    pub fn new(ip: impl Into<String>, identity: Identity) -> Self {
        Self {
            id: Uuid::new_v4(),
            ip: ip.into(),
            identity,
        }
    }
}

struct Slot {
    peer: Peer,
    outbox: mpsc::UnboundedSender<Frame>,
}

#[derive(Default)]
struct Registry {
    slots: HashMap<ConnectionId, Slot>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl Registry {
    fn send(&self, id: &ConnectionId, frame: &Frame) -> bool {
        match self.slots.get(id) {
            Some(slot) => slot.outbox.send(frame.clone()).is_ok(),
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct Namespace {
    name: &'static str,
    registry: Arc<RwLock<Registry>>,
}

impl Namespace {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            registry: Arc::new(RwLock::new(Registry::default())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a connection. Frames emitted to it arrive on the returned
    /// receiver until [`disconnect`](Self::disconnect) is called.
    pub async fn connect(&self, peer: Peer) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.registry.write().await;

        info!(
            namespace = self.name,
            conn = %peer.id,
            ip = %peer.ip,
            connections = registry.slots.len() + 1,
            "Client connected"
        );

        registry.slots.insert(peer.id, Slot { peer, outbox: tx });
        rx
    }

    /// Drop a connection and its room memberships. Empty rooms are removed.
    pub async fn disconnect(&self, id: ConnectionId) -> Option<Peer> {
        let mut registry = self.registry.write().await;
        let slot = registry.slots.remove(&id)?;

        registry.rooms.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });

        info!(
            namespace = self.name,
            conn = %id,
            connections = registry.slots.len(),
            "Client disconnected"
        );
        Some(slot.peer)
    }

    /// Add a connection to a room. Returns `false` for unknown connections.
    pub async fn join(&self, id: ConnectionId, room: &str) -> bool {
        let mut registry = self.registry.write().await;
        if !registry.slots.contains_key(&id) {
            return false;
        }
        registry.rooms.entry(room.to_string()).or_default().insert(id);
        debug!(namespace = self.name, conn = %id, room, "Joined room");
        true
    }

    pub async fn leave(&self, id: ConnectionId, room: &str) -> bool {
        let mut registry = self.registry.write().await;
        let Some(members) = registry.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(&id);
        if members.is_empty() {
            registry.rooms.remove(room);
        }
        if removed {
            debug!(namespace = self.name, conn = %id, room, "Left room");
        }
        removed
    }

    #[cfg(test)]
    pub async fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.registry
            .read()
            .await
            .rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub async fn is_member(&self, id: ConnectionId, room: &str) -> bool {
        self.registry
            .read()
            .await
            .rooms
            .get(room)
            .is_some_and(|m| m.contains(&id))
    }

    /// Send to a single connection.
    pub async fn emit_to(&self, id: ConnectionId, frame: &Frame) -> Delivery {
        let registry = self.registry.read().await;
        Delivery::from_count(usize::from(registry.send(&id, frame)))
    }

    /// Send to every member of `room`. An empty or unknown room is a no-op.
    pub async fn emit_to_room(&self, room: &str, frame: &Frame) -> Delivery {
        let registry = self.registry.read().await;
        let sent = registry
            .rooms
            .get(room)
            .map(|members| members.iter().filter(|id| registry.send(id, frame)).count())
            .unwrap_or(0);
        Delivery::from_count(sent)
    }

    /// Send to every connection in the namespace.
    pub async fn broadcast(&self, frame: &Frame) -> Delivery {
        let registry = self.registry.read().await;
        let sent = registry
            .slots
            .values()
            .filter(|slot| slot.outbox.send(frame.clone()).is_ok())
            .count();
        Delivery::from_count(sent)
    }

    /// Send to every connection in the namespace except `sender`.
    pub async fn broadcast_except(&self, sender: ConnectionId, frame: &Frame) -> Delivery {
        let registry = self.registry.read().await;
        let sent = registry
            .slots
            .iter()
            .filter(|(id, _)| **id != sender)
            .filter(|(_, slot)| slot.outbox.send(frame.clone()).is_ok())
            .count();
        Delivery::from_count(sent)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{connect, drain};
    use super::*;

    #[tokio::test]
    async fn test_emit_to_empty_room_is_noop() {
        let ns = Namespace::new("main");
        let delivery = ns.emit_to_room("nobody-here", &Frame::empty("ping")).await;
        assert_eq!(delivery, Delivery::NoRecipients);
        assert!(!delivery.is_delivered());
    }

    #[tokio::test]
    async fn test_room_membership_and_fanout() {
        let ns = Namespace::new("main");
        let (a, mut rx_a) = connect(&ns, Identity::Anonymous).await;
        let (b, mut rx_b) = connect(&ns, Identity::Anonymous).await;
        let (_c, mut rx_c) = connect(&ns, Identity::Anonymous).await;

        assert!(ns.join(a.id, "web-clients").await);
        assert!(ns.join(b.id, "web-clients").await);
        assert!(ns.join(a.id, "other").await);

        let delivery = ns.emit_to_room("web-clients", &Frame::empty("x")).await;
        assert_eq!(delivery, Delivery::Delivered(2));
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
        assert!(drain(&mut rx_c).is_empty());

        assert!(ns.leave(b.id, "web-clients").await);
        assert_eq!(ns.members("web-clients").await, vec![a.id]);
    }

    #[tokio::test]
    async fn test_broadcast_except_skips_sender() {
        let ns = Namespace::new("share");
        let (a, mut rx_a) = connect(&ns, Identity::Anonymous).await;
        let (_b, mut rx_b) = connect(&ns, Identity::Anonymous).await;

        let delivery = ns.broadcast_except(a.id, &Frame::empty("y")).await;
        assert_eq!(delivery, Delivery::Delivered(1));
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b)[0].event, "y");

        assert_eq!(ns.broadcast(&Frame::empty("z")).await, Delivery::Delivered(2));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let main = Namespace::new("main");
        let hub = Namespace::new("share");
        let (m, mut rx_main) = connect(&main, Identity::Anonymous).await;
        let (_h, mut rx_hub) = connect(&hub, Identity::Anonymous).await;

        assert!(!hub.join(m.id, "web-clients").await);
        hub.broadcast(&Frame::empty("hub:text:sync")).await;
        assert!(drain(&mut rx_main).is_empty());
        assert_eq!(drain(&mut rx_hub).len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_clears_rooms() {
        let ns = Namespace::new("main");
        let (a, rx_a) = connect(&ns, Identity::Anonymous).await;
        ns.join(a.id, "phone").await;

        assert_eq!(ns.disconnect(a.id).await, Some(a.clone()));
        assert!(ns.members("phone").await.is_empty());
        assert!(ns.disconnect(a.id).await.is_none());
        drop(rx_a);
        assert_eq!(ns.emit_to(a.id, &Frame::empty("x")).await, Delivery::NoRecipients);
    }

    #[tokio::test]
    async fn test_closed_outbox_is_not_counted() {
        let ns = Namespace::new("main");
        let (a, rx_a) = connect(&ns, Identity::Anonymous).await;
        ns.join(a.id, "web-clients").await;
        drop(rx_a);

        let delivery = ns.emit_to_room("web-clients", &Frame::empty("x")).await;
        assert_eq!(delivery, Delivery::NoRecipients);
    }
}
