//! Message storage for the viewer

use eventscope_common::Message;
use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Sequence id assigned to a message on arrival
pub type MessageId = u64;

/// Ordered, append-only store of received messages keyed by arrival sequence
///
/// Ids start at 0 and grow by one per append for the lifetime of the store;
/// they are never reused. Without a capacity the store grows with every
/// message received. With a capacity only the newest messages are retained
/// and lookups of evicted ids report absent.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: VecDeque<Message>,
    /// Id of the oldest retained message
    first_id: MessageId,
    next_id: MessageId,
    capacity: Option<NonZeroUsize>,
}

impl MessageStore {
    /// Store that keeps every message for the whole session
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Store that retains at most `capacity` messages
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity.get().min(1024)),
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Build a store from an optional retention cap
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        match capacity {
            Some(capacity) => Self::with_capacity(capacity),
            None => Self::unbounded(),
        }
    }

    /// Store a message and return its sequence id
    pub fn append(&mut self, message: Message) -> MessageId {
        if let Some(capacity) = self.capacity {
            if self.messages.len() >= capacity.get() {
                self.messages.pop_front();
                self.first_id += 1;
            }
        }

        let id = self.next_id;
        self.messages.push_back(message);
        self.next_id += 1;
        id
    }

    /// Get a message by id, if it was appended and is still retained
    pub fn lookup(&self, id: MessageId) -> Option<&Message> {
        let index = id.checked_sub(self.first_id)?;
        self.messages.get(usize::try_from(index).ok()?)
    }

    /// Iterate retained messages in id order
    pub fn iter(&self) -> impl Iterator<Item = (MessageId, &Message)> {
        (self.first_id..).zip(self.messages.iter())
    }

    /// Number of retained messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Id the next appended message will receive
    pub fn next_id(&self) -> MessageId {
        self.next_id
    }

    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }
}
