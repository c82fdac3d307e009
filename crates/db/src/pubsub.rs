use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Messages buffered per channel before slow subscribers start missing them.
const CHANNEL_CAPACITY: usize = 64;

type Registry = DashMap<Box<str>, broadcast::Sender<Box<str>>>;

/// Fans published messages out to every live subscription of a channel. Channels are created lazily on first
/// subscription and torn down when their last subscription is dropped.
#[derive(Default)]
pub struct Broker {
    channels: Arc<Registry>,
}

impl Broker {
    /// Returns the number of subscriptions that will observe the message.
    pub fn publish(&self, channel: &str, message: &str) -> usize {
        let Some(sender) = self.channels.get(channel) else {
            return 0;
        };
        sender.send(message.into()).unwrap_or(0)
    }

    pub fn subscribe(&self, channel: &str) -> Subscription {
        let receiver = self
            .channels
            .entry(channel.into())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        log::debug!("subscribed to {channel}");
        Subscription { channel: channel.into(), receiver, channels: Arc::clone(&self.channels) }
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |sender| sender.receiver_count())
    }
}

pub enum Signal {
    /// A message published on the channel.
    Message(Box<str>),
    /// The subscriber fell behind and this many messages were discarded.
    Missed(u64),
}

/// A live subscription to one channel. Dropping it unsubscribes, whatever the reason for the drop.
pub struct Subscription {
    channel: Box<str>,
    receiver: broadcast::Receiver<Box<str>>,
    channels: Arc<Registry>,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next signal. Messages published since the last call are queued, so none are lost between
    /// calls. Returns `None` once the broker is gone.
    pub async fn recv(&mut self) -> Option<Signal> {
        match self.receiver.recv().await {
            Ok(message) => Some(Signal::Message(message)),
            Err(RecvError::Lagged(count)) => {
                log::warn!("subscriber on {} lagged by {count} messages", self.channel);
                Some(Signal::Missed(count))
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Discards every signal that is already queued without waiting. Returns how many were discarded.
    pub fn drain(&mut self) -> usize {
        use tokio::sync::broadcast::error::TryRecvError;
        let mut count = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => count += 1,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return count,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Our own receiver is still counted at this point.
        self.channels.remove_if(&self.channel, |_, sender| sender.receiver_count() <= 1);
        log::debug!("unsubscribed from {}", self.channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn queued_messages_are_not_lost() {
        let broker = Broker::default();
        let mut sub = broker.subscribe("quiz:a");
        assert_eq!(broker.publish("quiz:a", "one"), 1);
        assert_eq!(broker.publish("quiz:a", "two"), 1);
        assert_eq!(broker.publish("quiz:b", "elsewhere"), 0);

        let Some(Signal::Message(first)) = sub.recv().await else { panic!("expected a message") };
        let Some(Signal::Message(second)) = sub.recv().await else { panic!("expected a message") };
        assert_eq!((first.as_ref(), second.as_ref()), ("one", "two"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn overflow_is_reported_as_missed() {
        let broker = Broker::default();
        let mut sub = broker.subscribe("quiz:a");
        for _ in 0..CHANNEL_CAPACITY + 10 {
            broker.publish("quiz:a", "updated");
        }
        assert!(matches!(sub.recv().await, Some(Signal::Missed(10))));
        assert!(matches!(sub.recv().await, Some(Signal::Message(_))));
    }

    #[test]
    fn drain_discards_queued_signals() {
        let broker = Broker::default();
        let mut sub = broker.subscribe("quiz:a");
        broker.publish("quiz:a", "one");
        broker.publish("quiz:a", "two");
        assert_eq!(sub.drain(), 2);
        assert_eq!(sub.drain(), 0);
    }

    #[test]
    fn dropping_the_last_subscription_removes_the_channel() {
        let broker = Broker::default();
        let first = broker.subscribe("quiz:a");
        let second = broker.subscribe("quiz:a");
        assert_eq!(broker.subscriber_count("quiz:a"), 2);

        drop(first);
        assert_eq!(broker.subscriber_count("quiz:a"), 1);
        assert!(broker.channels.contains_key("quiz:a"));

        drop(second);
        assert_eq!(broker.subscriber_count("quiz:a"), 0);
        assert!(!broker.channels.contains_key("quiz:a"));
    }
}
