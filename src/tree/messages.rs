use crate::tree::NodeId;
use std::{sync::Arc, time::SystemTime};

/// The channel a bubbling message travels on.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum MessageChannel {
    /// Status text meant for the user, typically displayed next to the root progress bar.
    Status,
    /// Diagnostic text meant for developers only.
    Developer,
}

/// A message as it was bubbled up to the root.
///
/// It is recorded whenever a non-empty message is set with [`Node::set_bubbling_message(…)`](crate::Node::set_bubbling_message())
/// or [`Node::set_developer_bubbling_message(…)`](crate::Node::set_developer_bubbling_message()).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Message {
    /// The time at which the message was set.
    pub time: SystemTime,
    /// The channel the message was set on.
    pub channel: MessageChannel,
    /// The node the message was set on.
    pub origin: NodeId,
    /// The message itself, shared with every node it was bubbled to.
    pub message: Arc<str>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct MessageRingBuffer {
    pub(crate) buf: Vec<Message>,
    capacity: usize,
    cursor: usize,
    total: usize,
}

impl MessageRingBuffer {
    pub fn with_capacity(capacity: usize) -> MessageRingBuffer {
        MessageRingBuffer {
            buf: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn has_capacity(&self) -> bool {
        self.buf.len() < self.capacity
    }

    pub fn push_overwrite(&mut self, channel: MessageChannel, origin: NodeId, message: Arc<str>) {
        if self.capacity == 0 {
            return;
        }
        let msg = Message {
            time: SystemTime::now(),
            channel,
            origin,
            message,
        };
        if self.has_capacity() {
            self.buf.push(msg)
        } else {
            self.buf[self.cursor] = msg;
            self.cursor = (self.cursor + 1) % self.buf.len();
        }
        self.total = self.total.wrapping_add(1);
    }

    pub fn copy_all(&self, out: &mut Vec<Message>) {
        out.clear();
        if self.buf.is_empty() {
            return;
        }
        out.extend_from_slice(&self.buf[self.cursor % self.buf.len()..]);
        if self.cursor != self.buf.len() {
            out.extend_from_slice(&self.buf[..self.cursor]);
        }
    }

    pub fn copy_new(&self, out: &mut Vec<Message>, prev: Option<MessageCopyState>) -> MessageCopyState {
        match prev {
            Some(MessageCopyState { total }) => {
                out.clear();
                let new_messages = self.total.wrapping_sub(total);
                if new_messages >= self.buf.len() {
                    self.copy_all(out);
                } else if new_messages > 0 {
                    // logical index `i` (oldest first) lives at `(cursor + i) % len`
                    let len = self.buf.len();
                    let start = (self.cursor + len - new_messages) % len;
                    let end = start + new_messages;
                    if end <= len {
                        out.extend_from_slice(&self.buf[start..end]);
                    } else {
                        out.extend_from_slice(&self.buf[start..]);
                        out.extend_from_slice(&self.buf[..end - len]);
                    }
                }
            }
            None => self.copy_all(out),
        };
        MessageCopyState { total: self.total }
    }
}

/// State used to keep track of what's new since the last time messages were copied.
///
/// Note that due to the nature of a ring buffer, there is no guarantee that you see all messages.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MessageCopyState {
    total: usize,
}
