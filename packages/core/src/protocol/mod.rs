// Протокол: типы на проводе, валидация и внешние коллабораторы

pub mod messages;
pub mod transport;
pub mod validation;

pub use messages::{
    AcceptancePayload, ChannelFrame, InitiationPayload, MessageFrame, PendingConversation,
};
pub use transport::{KeyDirectory, MemoryChannel, MemoryDirectory, MessageChannel};
