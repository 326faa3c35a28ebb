//! WebSocket message dispatch
//!
//! Each intent is applied to the session core and answered, if at all, with
//! a message for its originator. Room-wide events are pushed through the
//! broadcaster by the core itself.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

/// Handle a client message and return the optional reply for its sender
pub async fn handle_message(
    msg: ClientMessage,
    connection_id: &str,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateSession { name, session_id } => {
            tracing::info!("Create session request from {}", connection_id);
            match state.create_session(connection_id, &name, session_id).await {
                Ok(session_id) => Some(ServerMessage::SessionCreated {
                    session_id,
                    gm: connection_id.to_string(),
                }),
                Err(e) => Some(e.into()),
            }
        }

        ClientMessage::JoinSession { session_id, name } => {
            tracing::info!("Join request for {} from {}", session_id, connection_id);
            state
                .join_session(connection_id, &session_id, &name)
                .await
                .err()
                .map(Into::into)
        }

        ClientMessage::LeaveSession => state
            .leave_session(connection_id)
            .await
            .map(|session_id| ServerMessage::LeftSession { session_id }),

        ClientMessage::SetQuestion { question, answer } => state
            .set_question(connection_id, &question, &answer)
            .await
            .err()
            .map(Into::into),

        ClientMessage::StartGame => state.start_game(connection_id).await.err().map(Into::into),

        ClientMessage::Guess { guess_text } => state
            .submit_guess(connection_id, &guess_text)
            .await
            .err()
            .map(Into::into),

        ClientMessage::GetSessionState => state.republish(connection_id).await.err().map(Into::into),
    }
}
