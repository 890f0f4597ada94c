pub mod client;
pub mod session;
pub mod topics;

pub use client::MqttClient;
pub use session::{Commands, Listeners, Session, SessionState, Transport};
pub use topics::Topics;
