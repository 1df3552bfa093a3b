//! The channel name grammar of §3/§6 and the minimal `Channel` abstraction
//! bindings are built on top of.

use std::fmt;

use crate::error::BusError;
use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    PointToPoint,
    PubSub,
    Job,
    Dynamic,
}

const QUEUE_PREFIX: &str = "queue:";
const TOPIC_PREFIX: &str = "topic:";
const JOB_PREFIX: &str = "job:";

/// Classifies a channel name per §6's grammar: `queue:<name>`,
/// `topic:<name>`, `job:<name>`, or a bare identifier for a dynamic
/// pipeline edge.
pub fn classify_channel_name(name: &str) -> ChannelMode {
    if name.starts_with(QUEUE_PREFIX) {
        ChannelMode::PointToPoint
    } else if name.starts_with(TOPIC_PREFIX) {
        ChannelMode::PubSub
    } else if name.starts_with(JOB_PREFIX) {
        ChannelMode::Job
    } else {
        ChannelMode::Dynamic
    }
}

/// A first-class message conduit. Concrete transports provide their own
/// implementations; `FlumeChannel` below is the in-process default used by
/// `SharedChannelRegistry` for dynamic pipeline edges.
pub trait Channel: Send + Sync + fmt::Debug {
    fn mode(&self) -> ChannelMode;
    fn send(&self, message: Message) -> Result<(), BusError>;
}

/// A bounded in-process channel backed by `flume`, the teacher's own
/// in-process channel crate.
pub struct FlumeChannel {
    mode: ChannelMode,
    sender: flume::Sender<Message>,
    receiver: flume::Receiver<Message>,
}

impl FlumeChannel {
    pub fn unbounded(mode: ChannelMode) -> Self {
        let (sender, receiver) = flume::unbounded();
        FlumeChannel { mode, sender, receiver }
    }

    pub fn receiver(&self) -> flume::Receiver<Message> {
        self.receiver.clone()
    }
}

impl fmt::Debug for FlumeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlumeChannel").field("mode", &self.mode).finish()
    }
}

impl Channel for FlumeChannel {
    fn mode(&self) -> ChannelMode {
        self.mode
    }

    fn send(&self, message: Message) -> Result<(), BusError> {
        self.sender
            .send(message)
            .map_err(|e| BusError::binding("dynamic-channel", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_prefix() {
        assert_eq!(classify_channel_name("queue:orders"), ChannelMode::PointToPoint);
        assert_eq!(classify_channel_name("topic:orders"), ChannelMode::PubSub);
        assert_eq!(classify_channel_name("job:export"), ChannelMode::Job);
        assert_eq!(classify_channel_name("orders"), ChannelMode::Dynamic);
    }

    #[test]
    fn flume_channel_delivers_sent_messages() {
        let channel = FlumeChannel::unbounded(ChannelMode::Dynamic);
        let receiver = channel.receiver();
        channel.send(Message::default()).unwrap();
        assert!(receiver.try_recv().is_ok());
    }
}
