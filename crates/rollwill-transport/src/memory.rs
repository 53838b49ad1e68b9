//! In-process [`Signaling`] backend with fault injection.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::channel::{ChannelEvent, DataChannel};
use crate::endpoint::{Endpoint, EndpointCommand, EndpointEvent, Signaling};
use crate::{ChannelId, IceState};

/// An in-process rendezvous broker.
///
/// Endpoints registered on the same `MemoryNetwork` (or a clone of it) can
/// open channels to each other. Delivery is reliable and ordered per
/// channel. The fault-injection methods let tests drive the same events a
/// real network produces: stalled registration, ICE state changes,
/// signaling drops, forced closes and errors.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// While `true`, new registrations never report
    /// [`EndpointEvent::Open`] and are not reachable.
    pub fn stall_open(&self, stall: bool) {
        self.hub.lock().stall_open = stall;
    }

    /// Returns `true` if `name` is registered and online.
    pub fn is_registered(&self, name: &str) -> bool {
        self.hub
            .lock()
            .endpoints
            .get(name)
            .is_some_and(|entry| entry.online)
    }

    /// Returns the number of open channels owned by `name`.
    pub fn channel_count(&self, name: &str) -> usize {
        self.hub
            .lock()
            .links
            .values()
            .filter(|link| link.owner == name)
            .count()
    }

    /// Reports an ICE state change on `owner`'s channel to `remote`.
    ///
    /// Only `owner`'s side sees the event. Returns `false` if no such
    /// channel exists.
    pub fn set_ice_state(&self, owner: &str, remote: &str, state: IceState) -> bool {
        let hub = self.hub.lock();
        match hub.find_link(owner, remote) {
            Some(id) => {
                let _ = hub.links[&id]
                    .events
                    .send(ChannelEvent::IceStateChanged(state));
                true
            }
            None => false,
        }
    }

    /// Reports a channel error on `owner`'s channel to `remote`.
    pub fn fail_link(&self, owner: &str, remote: &str, message: &str) -> bool {
        let hub = self.hub.lock();
        match hub.find_link(owner, remote) {
            Some(id) => {
                let _ = hub.links[&id]
                    .events
                    .send(ChannelEvent::Error(message.to_owned()));
                true
            }
            None => false,
        }
    }

    /// Closes the channel between `owner` and `remote`; both sides see
    /// [`ChannelEvent::Close`].
    pub fn close_link(&self, owner: &str, remote: &str) -> bool {
        let mut hub = self.hub.lock();
        match hub.find_link(owner, remote) {
            Some(id) => {
                hub.close_channel(id);
                true
            }
            None => false,
        }
    }

    /// Drops `name`'s signaling link. The endpoint sees
    /// [`EndpointEvent::Disconnected`] and becomes unreachable for new
    /// channels; existing channels keep working.
    pub fn drop_signaling(&self, name: &str) -> bool {
        let mut hub = self.hub.lock();
        match hub.endpoints.get_mut(name) {
            Some(entry) => {
                entry.online = false;
                let _ = entry.events.send(EndpointEvent::Disconnected);
                tracing::debug!(endpoint = name, "signaling dropped");
                true
            }
            None => false,
        }
    }

    /// Reports an endpoint-level error to `name`.
    pub fn fail_endpoint(&self, name: &str, message: &str) -> bool {
        let hub = self.hub.lock();
        match hub.endpoints.get(name) {
            Some(entry) => {
                let _ = entry.events.send(EndpointEvent::Error(message.to_owned()));
                true
            }
            None => false,
        }
    }
}

impl Signaling for MemoryNetwork {
    fn register(&self, name: &str) -> Endpoint {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let registration = {
            let mut hub = self.hub.lock();
            hub.next_instance += 1;
            let registration = Registration {
                name: name.to_owned(),
                instance: hub.next_instance,
                commands: commands_tx.clone(),
                events: events_tx,
            };
            hub.register(&registration);
            registration
        };

        tokio::spawn(drive(Arc::clone(&self.hub), registration, commands_rx));
        Endpoint::new(name, commands_tx, events_rx)
    }
}

/// Identity of one registration attempt.
struct Registration {
    name: String,
    instance: u64,
    commands: mpsc::UnboundedSender<EndpointCommand>,
    events: mpsc::UnboundedSender<EndpointEvent>,
}

struct Entry {
    instance: u64,
    commands: mpsc::UnboundedSender<EndpointCommand>,
    events: mpsc::UnboundedSender<EndpointEvent>,
    online: bool,
}

/// One side of an established channel.
struct Link {
    owner: String,
    owner_instance: u64,
    remote: String,
    peer: ChannelId,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

/// A connect to a name nobody holds.
struct Pending {
    owner: String,
    owner_instance: u64,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

#[derive(Default)]
struct Hub {
    endpoints: HashMap<String, Entry>,
    links: HashMap<ChannelId, Link>,
    pending: HashMap<ChannelId, Pending>,
    next_instance: u64,
    stall_open: bool,
}

impl Hub {
    fn register(&mut self, reg: &Registration) {
        let online = !self.stall_open;
        match self.endpoints.get_mut(&reg.name) {
            Some(entry) if entry.instance == reg.instance => {
                entry.online = online;
            }
            Some(_) => {
                tracing::debug!(endpoint = %reg.name, "name already taken");
                let _ = reg.events.send(EndpointEvent::Error(format!(
                    "name {} is already taken",
                    reg.name
                )));
                return;
            }
            None => {
                self.endpoints.insert(
                    reg.name.clone(),
                    Entry {
                        instance: reg.instance,
                        commands: reg.commands.clone(),
                        events: reg.events.clone(),
                        online,
                    },
                );
            }
        }
        if online {
            tracing::debug!(endpoint = %reg.name, "endpoint registered");
            let _ = reg.events.send(EndpointEvent::Open);
        }
    }

    fn owns(&self, name: &str, instance: u64) -> bool {
        self.endpoints
            .get(name)
            .is_some_and(|entry| entry.instance == instance && entry.online)
    }

    fn connect(
        &mut self,
        reg: &Registration,
        target: String,
        id: ChannelId,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) {
        if !self.owns(&reg.name, reg.instance) {
            let _ = events.send(ChannelEvent::Error(format!(
                "endpoint {} is not registered",
                reg.name
            )));
            let _ = events.send(ChannelEvent::Close);
            return;
        }

        let (target_instance, target_commands, target_events) = match self.endpoints.get(&target) {
            Some(entry) if entry.online => (
                entry.instance,
                entry.commands.clone(),
                entry.events.clone(),
            ),
            _ => {
                tracing::debug!(endpoint = %reg.name, %target, channel = %id, "target unknown, connect pending");
                self.pending.insert(
                    id,
                    Pending {
                        owner: reg.name.clone(),
                        owner_instance: reg.instance,
                        events,
                    },
                );
                return;
            }
        };

        let remote_id = ChannelId::next();
        let (remote_channel, remote_events) =
            DataChannel::new(remote_id, reg.name.clone(), target_commands);

        self.links.insert(
            id,
            Link {
                owner: reg.name.clone(),
                owner_instance: reg.instance,
                remote: target.clone(),
                peer: remote_id,
                events: events.clone(),
            },
        );
        self.links.insert(
            remote_id,
            Link {
                owner: target.clone(),
                owner_instance: target_instance,
                remote: reg.name.clone(),
                peer: id,
                events: remote_events.clone(),
            },
        );

        let _ = remote_events.send(ChannelEvent::Open);
        let _ = target_events.send(EndpointEvent::Connection(remote_channel));
        let _ = events.send(ChannelEvent::Open);
        tracing::debug!(endpoint = %reg.name, %target, channel = %id, "channel established");
    }

    fn send(&self, id: ChannelId, data: Vec<u8>) {
        let Some(link) = self.links.get(&id) else {
            return;
        };
        if let Some(peer) = self.links.get(&link.peer) {
            let _ = peer.events.send(ChannelEvent::Data(data));
        }
    }

    fn close_channel(&mut self, id: ChannelId) {
        if let Some(link) = self.links.remove(&id) {
            let _ = link.events.send(ChannelEvent::Close);
            if let Some(peer) = self.links.remove(&link.peer) {
                let _ = peer.events.send(ChannelEvent::Close);
            }
        } else if let Some(pending) = self.pending.remove(&id) {
            let _ = pending.events.send(ChannelEvent::Close);
        }
    }

    fn find_link(&self, owner: &str, remote: &str) -> Option<ChannelId> {
        self.links
            .iter()
            .find(|(_, link)| link.owner == owner && link.remote == remote)
            .map(|(id, _)| *id)
    }

    fn reconnect(&mut self, reg: &Registration) {
        if self.owns(&reg.name, reg.instance) {
            return;
        }
        self.register(reg);
    }

    fn destroy(&mut self, reg: &Registration) {
        let owned = self
            .endpoints
            .get(&reg.name)
            .is_some_and(|entry| entry.instance == reg.instance);
        if owned {
            self.endpoints.remove(&reg.name);
        }

        let links: Vec<ChannelId> = self
            .links
            .iter()
            .filter(|(_, link)| link.owner == reg.name && link.owner_instance == reg.instance)
            .map(|(id, _)| *id)
            .collect();
        for id in links {
            self.close_channel(id);
        }

        let pending: Vec<ChannelId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.owner == reg.name && p.owner_instance == reg.instance)
            .map(|(id, _)| *id)
            .collect();
        for id in pending {
            self.close_channel(id);
        }
    }
}

async fn drive(
    hub: Arc<Mutex<Hub>>,
    reg: Registration,
    mut commands: mpsc::UnboundedReceiver<EndpointCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            EndpointCommand::Connect {
                target,
                channel,
                events,
            } => hub.lock().connect(&reg, target, channel, events),
            EndpointCommand::Send { channel, data } => hub.lock().send(channel, data),
            EndpointCommand::CloseChannel { channel } => hub.lock().close_channel(channel),
            EndpointCommand::Reconnect => hub.lock().reconnect(&reg),
            EndpointCommand::Destroy => break,
        }
    }

    drop(commands);
    hub.lock().destroy(&reg);
    let _ = reg.events.send(EndpointEvent::Closed);
    tracing::debug!(endpoint = %reg.name, "endpoint destroyed");
}
