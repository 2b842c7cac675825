// Состояние бесед: сессии в памяти и менеджер, который ими владеет

pub mod manager;
pub mod session;

pub use manager::{MemberInvitation, ReceivedMessage, SessionManager};
pub use session::{ConversationSession, SessionState};
