//! Phone role registry.
//!
//! At most one connection holds the phone role. Every transition (claim,
//! takeover, release) runs under one lock together with the room change and
//! the `phone_status` broadcast, so web clients never observe two phones and
//! receive exactly one status event per transition.

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use localmighty_shared::constants::{EVT_PHONE_STATUS, ROOM_PHONE, ROOM_WEB_CLIENTS};
use localmighty_shared::protocol::Frame;
use localmighty_shared::types::{now_millis, PhoneInfo, PhoneStatus};

use crate::channel::{ConnectionId, Delivery, Namespace, Peer};
use crate::error::ServerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneRole {
    NoPhone,
    Connected {
        connection: ConnectionId,
        device_name: String,
        last_seen: i64,
    },
}

impl PhoneRole {
    pub fn status(&self) -> PhoneStatus {
        match self {
            PhoneRole::NoPhone => PhoneStatus {
                connected: false,
                device_name: None,
            },
            PhoneRole::Connected { device_name, .. } => PhoneStatus {
                connected: true,
                device_name: Some(device_name.clone()),
            },
        }
    }

    fn holder(&self) -> Option<ConnectionId> {
        match self {
            PhoneRole::NoPhone => None,
            PhoneRole::Connected { connection, .. } => Some(*connection),
        }
    }
}

/// Outcome of a `phone_connected` announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    /// The caller now holds the role. `displaced` is the previous holder,
    /// if another connection had it.
    Claimed {
        displaced: Option<ConnectionId>,
        notified: Delivery,
    },
    /// The caller already held the role under the same name.
    Unchanged,
    /// The connection is not allowed to act as the phone.
    Refused,
}

pub struct SessionRegistry {
    main: Namespace,
    require_phone_token: bool,
    role: Mutex<PhoneRole>,
}

impl SessionRegistry {
    pub fn new(main: Namespace, require_phone_token: bool) -> Self {
        Self {
            main,
            require_phone_token,
            role: Mutex::new(PhoneRole::NoPhone),
        }
    }

    /// Whether `peer` may claim the role and push phone-origin data.
    pub fn may_act_as_phone(&self, peer: &Peer) -> bool {
        !self.require_phone_token || peer.identity.is_paired()
    }

    /// Handle `phone_connected`. Last connect wins; the displaced
    /// connection is silently removed from the phone room.
    pub async fn claim_phone(&self, peer: &Peer, info: &PhoneInfo) -> Result<RoleChange, ServerError> {
        if !self.may_act_as_phone(peer) {
            warn!(conn = %peer.id, ip = %peer.ip, "phone_connected from unpaired connection ignored");
            return Ok(RoleChange::Refused);
        }

        let mut role = self.role.lock().await;
        let now = now_millis();

        if let PhoneRole::Connected {
            connection,
            device_name,
            last_seen,
        } = &mut *role
        {
            if *connection == peer.id && *device_name == info.device_name {
                *last_seen = now;
                return Ok(RoleChange::Unchanged);
            }
        }

        let next = PhoneRole::Connected {
            connection: peer.id,
            device_name: info.device_name.clone(),
            last_seen: now,
        };
        let frame = Frame::new(EVT_PHONE_STATUS, &next.status())?;

        let displaced = role.holder().filter(|holder| *holder != peer.id);
        if let Some(old) = displaced {
            self.main.leave(old, ROOM_PHONE).await;
            info!(old = %old, new = %peer.id, "Phone role taken over by new connection");
        }
        self.main.join(peer.id, ROOM_PHONE).await;
        *role = next;

        let notified = self.main.emit_to_room(ROOM_WEB_CLIENTS, &frame).await;
        info!(
            conn = %peer.id,
            device = %info.device_name,
            model = %info.model,
            android = %info.android_version,
            "Phone connected"
        );

        Ok(RoleChange::Claimed {
            displaced,
            notified,
        })
    }

    /// Handle `join`. Joining `web-clients` sends the current phone status
    /// to the joiner right away. The phone room can only be entered through
    /// [`claim_phone`](Self::claim_phone).
    pub async fn join(&self, peer: &Peer, room: &str) -> Result<bool, ServerError> {
        if room == ROOM_PHONE {
            warn!(conn = %peer.id, "Attempt to join the phone room directly ignored");
            return Ok(false);
        }

        if room != ROOM_WEB_CLIENTS {
            return Ok(self.main.join(peer.id, room).await);
        }

        // Held across join and snapshot so a concurrent transition is seen
        // either in the snapshot or as a later broadcast, never both.
        let role = self.role.lock().await;
        let frame = Frame::new(EVT_PHONE_STATUS, &role.status())?;
        if !self.main.join(peer.id, room).await {
            return Ok(false);
        }
        self.main.emit_to(peer.id, &frame).await;
        debug!(conn = %peer.id, "Web client joined");
        Ok(true)
    }

    /// Handle a closed connection. Returns `true` if it held the phone role.
    pub async fn release(&self, id: ConnectionId) -> Result<bool, ServerError> {
        let mut role = self.role.lock().await;
        self.main.disconnect(id).await;

        if role.holder() != Some(id) {
            return Ok(false);
        }

        *role = PhoneRole::NoPhone;
        let frame = Frame::new(EVT_PHONE_STATUS, &role.status())?;
        self.main.emit_to_room(ROOM_WEB_CLIENTS, &frame).await;
        info!(conn = %id, "Phone disconnected");
        Ok(true)
    }

    /// Refresh `last_seen` when the role holder sends anything.
    pub async fn touch(&self, id: ConnectionId) {
        if let PhoneRole::Connected {
            connection,
            last_seen,
            ..
        } = &mut *self.role.lock().await
        {
            if *connection == id {
                *last_seen = now_millis();
            }
        }
    }

    #[cfg(test)]
    pub async fn role(&self) -> PhoneRole {
        self.role.lock().await.clone()
    }

    pub async fn status(&self) -> PhoneStatus {
        self.role.lock().await.status()
    }
}
