//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol of the live activity feed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::web::feed::ActivityResponse;

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keep-alive; answered with `Pong`.
    Ping,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once, when the subscription is live.
    Subscribed { user_id: Uuid },

    /// A new activity of the user or one of their friends.
    Activity { activity: ActivityResponse },

    Pong,

    /// Reports a problem with a client message. The connection stays open.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_tagged_by_type() {
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping));

        let pong = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(pong, serde_json::json!({ "type": "pong" }));
    }
}
