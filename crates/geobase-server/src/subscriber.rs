//! Store subscriber backed by a connection's outbound queue.

use crate::outbox::Outbox;
use geobase_protocol::{command, stringify};
use geobase_store::{GeoObject, Subscriber, SubscriberId, Update};
use serde::Serialize;

/// Turns store notifications into `CREATE`/`UPDATE`/`DELETE` frames.
///
/// Frames are queued on the connection's [`Outbox`], so a notification never
/// waits on the network. A refused frame means the connection is being
/// closed for falling behind.
#[derive(Debug, Clone)]
pub struct ConnectionSubscriber {
    id: SubscriberId,
    index: usize,
    outbox: Outbox,
}

impl ConnectionSubscriber {
    pub fn new(id: SubscriberId, index: usize, outbox: Outbox) -> Self {
        Self { id, index, outbox }
    }

    fn push<T: Serialize + ?Sized>(&self, cmd: &str, body: &T) {
        let frame = match stringify(cmd, Some(body)) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(
                    connection = self.index,
                    command = cmd,
                    "failed to encode notification: {}",
                    e
                );
                return;
            }
        };
        if !self.outbox.push(frame) {
            tracing::debug!(
                connection = self.index,
                subscriber = %self.id,
                command = cmd,
                "connection no longer accepting notifications"
            );
        }
    }
}

impl Subscriber for ConnectionSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn notify_created(&self, object: &GeoObject) {
        self.push(command::CREATE, object);
    }

    fn notify_updated(&self, update: &Update) {
        self.push(command::UPDATE, update);
    }

    fn notify_deleted(&self, object: &GeoObject) {
        self.push(command::DELETE, object);
    }
}
