//! Insertion-ordered channel set.

use tidings_core::types::Channel;

/// Channels the client wants, in the order they were first added.
///
/// Re-adding an existing channel keeps its original position, so
/// resubscription order is stable across reconnects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSet {
    channels: Vec<Channel>,
}

impl ChannelSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a channel; returns false if it was already present.
    pub fn insert(&mut self, channel: Channel) -> bool {
        if self.contains(&channel) {
            return false;
        }
        self.channels.push(channel);
        true
    }

    /// Removes a channel; returns false if it was absent.
    pub fn remove(&mut self, channel: &Channel) -> bool {
        let before = self.channels.len();
        self.channels.retain(|existing| existing != channel);
        self.channels.len() != before
    }

    /// Returns true if the channel is present.
    #[must_use]
    pub fn contains(&self, channel: &Channel) -> bool {
        self.channels.iter().any(|existing| existing == channel)
    }

    /// Owned copy in insertion order, handed to transports.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Channel> {
        self.channels.clone()
    }

    /// Channels in `self` missing from `other`, in insertion order.
    #[must_use]
    pub fn missing_from(&self, other: &[Channel]) -> Vec<Channel> {
        self.channels
            .iter()
            .filter(|channel| !other.contains(channel))
            .cloned()
            .collect()
    }

    /// Removes every channel.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if there are no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }
}
