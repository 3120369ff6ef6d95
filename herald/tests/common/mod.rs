#![allow(dead_code)]

use herald::{CancelFlag, Cancellable, Event, EventService, EventType, Key, Priority};

// ============================================================================
// Test Event Types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Ping {
    pub seq: u32,
}

impl Event for Ping {}

/// Root of a three-level hierarchy: `Message <- Chat <- Whisper`.
///
/// Only the root declares its cancellation; subtypes inherit it.
#[derive(Debug, Default)]
pub struct Message {
    pub cancelled: CancelFlag,
    pub body: String,
}

impl Event for Message {
    fn cancellation(&self) -> Option<&dyn Cancellable> {
        Some(&self.cancelled)
    }
}

#[derive(Debug, Default)]
pub struct Chat {
    pub message: Message,
    pub room: String,
}

impl Event for Chat {
    fn parent(&self) -> Option<&dyn Event> {
        Some(&self.message)
    }

    fn parent_type() -> Option<EventType> {
        Some(EventType::of::<Message>())
    }
}

#[derive(Debug, Default)]
pub struct Whisper {
    pub chat: Chat,
    pub to: String,
}

impl Event for Whisper {
    fn parent(&self) -> Option<&dyn Event> {
        Some(&self.chat)
    }

    fn parent_type() -> Option<EventType> {
        Some(EventType::of::<Chat>())
    }
}

impl Whisper {
    pub fn new(body: &str, room: &str, to: &str) -> Self {
        Whisper {
            chat: Chat {
                message: Message {
                    cancelled: CancelFlag::default(),
                    body: body.into(),
                },
                room: room.into(),
            },
            to: to.into(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn service() -> EventService {
    EventService::builder()
        .priority_order()
        .build()
        .expect("priority order is configured")
}

pub fn key(name: &str) -> Key {
    Key::new(name).expect("non-empty key")
}

pub const HIGH: Option<Priority> = Some(Priority::HIGH);
pub const LOW: Option<Priority> = Some(Priority::LOW);
