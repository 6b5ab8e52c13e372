//! Dispatch for frames received from a registered session.

use tokio::sync::mpsc;

use parley_proto::{Envelope, Payload};

use crate::db::{credentials, history};
use crate::state::AppState;

/// What the reader loop should do after a frame has been handled.
pub enum SessionEvent {
    Continue,
    Disconnect,
}

/// Handle one frame from the session registered as `nickname`.
pub async fn dispatch(
    envelope: Envelope,
    nickname: &mut String,
    tx: &mpsc::UnboundedSender<Envelope>,
    state: &AppState,
) -> SessionEvent {
    match envelope.payload {
        Some(Payload::ChatText(msg)) => {
            let line = format!("{}: {}\n", nickname, msg.text);
            state.registry.broadcast(Envelope::chat_text(line.clone()));
            history::append_entry(&state.db, line).await;
        }
        Some(Payload::PrivateText(msg)) => {
            let delivered = state.registry.send_to(
                &msg.peer,
                Envelope::private_text(msg.text.clone(), nickname.clone()),
            );
            if !delivered {
                tracing::debug!(
                    sender = %nickname,
                    target = %msg.peer,
                    "private message target offline, dropped"
                );
            }
            history::append_entry(
                &state.db,
                format!("*{} {} - ({})", msg.text, msg.peer, nickname),
            )
            .await;
        }
        Some(Payload::NicknameChanged(msg)) => {
            let requested = msg.text;
            if state.registry.rename(nickname, &requested) {
                let line = format!("{} changed nickname to {}", nickname, requested);
                // Keep the account table in step; the login layer already
                // validated the new name, so a miss here is only logged.
                if !credentials::rename(&state.db, nickname, &requested).await {
                    tracing::debug!(
                        old = %nickname,
                        new = %requested,
                        "credential rename not applied"
                    );
                }
                history::append_entry(&state.db, line).await;
                *nickname = requested;
            } else {
                let _ = tx.send(Envelope::nickname_used());
            }
        }
        Some(Payload::DisableUser(_)) => {
            state.registry.leave(nickname);
            history::append_entry(&state.db, format!("{}: disconnected", nickname)).await;
            return SessionEvent::Disconnect;
        }
        other => {
            tracing::debug!(nickname = %nickname, payload = ?other, "unexpected frame in session loop");
        }
    }
    SessionEvent::Continue
}
