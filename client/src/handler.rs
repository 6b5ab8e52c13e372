//! Connection driver: the nickname handshake, the background receive loop,
//! and the outbound operations exposed to the UI layer.
//!
//! The socket splits into a writer task fed by an mpsc channel and a reader
//! task that dispatches inbound frames to the [`ChatView`] collaborator, so
//! UI-triggered sends never contend with the blocked receive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;

use parley_proto::{Connection, Envelope, FrameSink, FrameStream, Payload, TransportError};

use crate::roster::Roster;
use crate::view::ChatView;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the candidate nickname.
    #[error("nickname `{0}` is already in use")]
    NicknameRejected(String),
    /// The connection failed during the handshake or a send.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The session has already been disconnected.
    #[error("not connected")]
    Disconnected,
    /// Private messages cannot be addressed to the local nickname.
    #[error("cannot send a private message to yourself")]
    SelfAddressed,
}

struct Shared {
    /// Outbound queue; taken (dropped) on disconnect so the writer task
    /// flushes and closes the stream.
    tx: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    nickname: Mutex<String>,
    roster: Mutex<Roster>,
    connected: AtomicBool,
    view: Arc<dyn ChatView>,
}

/// Handle to a connected session. Cheap to clone; every method is callable
/// from the UI side while the receive loop runs in the background.
#[derive(Clone)]
pub struct ClientHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle").finish_non_exhaustive()
    }
}

/// Connect to a server, run the nickname handshake with `nickname` (as
/// supplied by the authentication layer, not direct user input), and spawn
/// the receive loop.
pub async fn connect(
    addr: impl ToSocketAddrs,
    nickname: &str,
    view: Arc<dyn ChatView>,
) -> Result<ClientHandle, ClientError> {
    let stream = TcpStream::connect(addr).await.map_err(TransportError::from)?;
    let mut conn = Connection::new(stream);

    // Handshake: answer prompts until the server accepts or rejects us.
    let snapshot = loop {
        let envelope = match conn.recv().await {
            Ok(envelope) => envelope,
            Err(e) => {
                view.on_error("an error occurred while registering the name");
                return Err(e.into());
            }
        };
        match envelope.payload {
            Some(Payload::RequestNickname(_)) => {
                if let Err(e) = conn.send(&Envelope::nickname(nickname)).await {
                    view.on_error("an error occurred while registering the name");
                    return Err(e.into());
                }
            }
            Some(Payload::NicknameUsed(_)) => {
                view.on_error("a user with this name is already in the chat");
                let _ = conn.close().await;
                return Err(ClientError::NicknameRejected(nickname.to_string()));
            }
            Some(Payload::NicknameAccepted(accepted)) => {
                break accepted.users;
            }
            _ => {
                // Nothing else belongs to the handshake; skip it.
            }
        }
    };

    let (sink, frames) = conn.into_split();
    let (tx, rx) = mpsc::unbounded_channel::<Envelope>();
    tokio::spawn(writer_task(sink, rx));

    let mut roster = Roster::new();
    roster.seed(snapshot);
    view.on_roster_changed(&roster.names());

    let shared = Arc::new(Shared {
        tx: Mutex::new(Some(tx)),
        nickname: Mutex::new(nickname.to_string()),
        roster: Mutex::new(roster),
        connected: AtomicBool::new(true),
        view,
    });

    tokio::spawn(receive_loop(frames, shared.clone()));

    Ok(ClientHandle { shared })
}

/// Writer task: receives envelopes from the mpsc channel and forwards them
/// to the socket's sink; flushes and shuts down once every sender is gone.
async fn writer_task(mut sink: FrameSink, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        if sink.send(&envelope).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Reader task: dispatch inbound frames until the stream ends.
async fn receive_loop(mut frames: FrameStream, shared: Arc<Shared>) {
    loop {
        let envelope = match frames.recv().await {
            Ok(envelope) => envelope,
            Err(e) => {
                // Surface the failure only when the disconnect was not asked
                // for locally. The roster is left as-is for the caller.
                if shared.connected.swap(false, Ordering::SeqCst) {
                    tracing::warn!(error = %e, "connection to server lost");
                    shared.view.on_error("connection to the server was lost");
                }
                break;
            }
        };
        dispatch(envelope, &shared);
    }
}

fn dispatch(envelope: Envelope, shared: &Shared) {
    match envelope.payload {
        Some(Payload::ChatText(msg)) => {
            shared.view.on_broadcast_text(&msg.text);
        }
        Some(Payload::PrivateText(msg)) => {
            shared.view.on_private_text(&msg.peer, &msg.text);
        }
        Some(Payload::NicknameChanged(msg)) => {
            // The server sends a display line; show it verbatim and mirror
            // the rename into the roster.
            shared.view.on_broadcast_text(&format!("{}\n", msg.text));
            let names = {
                let mut roster = shared.roster.lock().expect("roster lock poisoned");
                roster.apply_rename_notice(&msg.text);
                roster.names()
            };
            shared.view.on_roster_changed(&names);
        }
        Some(Payload::UserAdded(msg)) => {
            let names = {
                let mut roster = shared.roster.lock().expect("roster lock poisoned");
                roster.add(&msg.name);
                roster.names()
            };
            shared.view.on_joined(&msg.name);
            shared.view.on_roster_changed(&names);
        }
        Some(Payload::RemovedUser(msg)) => {
            let names = {
                let mut roster = shared.roster.lock().expect("roster lock poisoned");
                roster.remove(&msg.name);
                roster.names()
            };
            shared.view.on_left(&msg.name);
            shared.view.on_roster_changed(&names);
        }
        other => {
            tracing::debug!(payload = ?other, "unexpected frame from server");
        }
    }
}

impl ClientHandle {
    /// Current local nickname.
    pub fn nickname(&self) -> String {
        self.shared.nickname.lock().expect("nickname lock poisoned").clone()
    }

    /// Sorted snapshot of the mirrored roster.
    pub fn roster(&self) -> Vec<String> {
        self.shared.roster.lock().expect("roster lock poisoned").names()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Queue a broadcast message to everyone in the chat.
    pub fn send_broadcast(&self, text: &str) -> Result<(), ClientError> {
        self.send(Envelope::chat_text(text))
    }

    /// Queue a private message for one online user.
    pub fn send_private(&self, target: &str, text: &str) -> Result<(), ClientError> {
        if self.shared.nickname.lock().expect("nickname lock poisoned").as_str() == target {
            return Err(ClientError::SelfAddressed);
        }
        self.send(Envelope::private_text(text, target))
    }

    /// Announce a nickname change. The caller is expected to have validated
    /// the new name against the credential store already; the roster updates
    /// when the server's notice comes back.
    pub fn request_rename(&self, new_nickname: &str) -> Result<(), ClientError> {
        self.send(Envelope::nickname_changed(new_nickname))?;
        *self.shared.nickname.lock().expect("nickname lock poisoned") = new_nickname.to_string();
        Ok(())
    }

    /// Graceful disconnect: tell the server, then close the outbound queue.
    /// Further sends fail with [`ClientError::Disconnected`].
    pub fn request_disconnect(&self) -> Result<(), ClientError> {
        if !self.shared.connected.swap(false, Ordering::SeqCst) {
            return Err(ClientError::Disconnected);
        }
        let tx = self.shared.tx.lock().expect("sender lock poisoned").take();
        match tx {
            Some(tx) => {
                let _ = tx.send(Envelope::disable_user());
                Ok(())
            }
            None => Err(ClientError::Disconnected),
        }
    }

    fn send(&self, envelope: Envelope) -> Result<(), ClientError> {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Err(ClientError::Disconnected);
        }
        let guard = self.shared.tx.lock().expect("sender lock poisoned");
        let tx = guard.as_ref().ok_or(ClientError::Disconnected)?;
        tx.send(envelope).map_err(|_| ClientError::Disconnected)
    }
}
