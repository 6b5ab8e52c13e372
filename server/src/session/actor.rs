//! Actor-per-connection for accepted sockets.
//!
//! Each connection splits into a reader half driven here and a writer task
//! that owns the sink and drains an mpsc channel. Cloning the channel sender
//! is how the rest of the server pushes frames to this client.

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use parley_proto::{Connection, Envelope, FrameSink, FrameStream, Payload};

use crate::session::protocol::{self, SessionEvent};
use crate::state::AppState;

/// Drive one accepted connection from handshake to disconnect.
pub async fn run_connection(stream: TcpStream, state: AppState, addr: SocketAddr) {
    let (sink, mut frames) = Connection::new(stream).into_split();
    let (tx, rx) = mpsc::unbounded_channel::<Envelope>();

    // Writer task: owns the sink, forwards queued frames until every sender
    // is gone, then flushes and shuts the stream down.
    let writer = tokio::spawn(writer_task(sink, rx));

    let Some(mut nickname) = negotiate_nickname(&mut frames, &tx, &state).await else {
        // Transport died before any name was accepted; nothing was
        // registered, so there is nothing to clean up.
        drop(tx);
        let _ = writer.await;
        return;
    };

    tracing::info!(%addr, nickname = %nickname, "session registered");

    loop {
        match frames.recv().await {
            Ok(envelope) => {
                match protocol::dispatch(envelope, &mut nickname, &tx, &state).await {
                    SessionEvent::Continue => {}
                    SessionEvent::Disconnect => {
                        tracing::info!(%addr, nickname = %nickname, "session disconnected");
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%addr, nickname = %nickname, error = %e, "session transport failed");
                break;
            }
        }
    }

    // Runs on both exit paths. After a graceful DisableUser the entry is
    // already gone and this is a no-op; an ungraceful drop still notifies
    // the remaining sessions.
    state.registry.leave(&nickname);

    drop(tx);
    let _ = writer.await;
}

/// Writer task: receives envelopes from the mpsc channel and forwards them
/// to the socket's sink.
async fn writer_task(mut sink: FrameSink, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        if sink.send(&envelope).await.is_err() {
            // Socket is broken; the reader loop notices on its own.
            break;
        }
    }
    let _ = sink.close().await;
}

/// AWAIT_NAME: prompt for a nickname, read one candidate, admit or reject,
/// and repeat until a name is accepted. Returns None when the transport
/// fails first.
async fn negotiate_nickname(
    frames: &mut FrameStream,
    tx: &mpsc::UnboundedSender<Envelope>,
    state: &AppState,
) -> Option<String> {
    loop {
        if tx.send(Envelope::request_nickname()).is_err() {
            return None;
        }
        let envelope = match frames.recv().await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "handshake aborted");
                return None;
            }
        };
        // Anything other than a Nickname frame counts as an empty candidate
        // and is rejected the same way.
        let candidate = match envelope.payload {
            Some(Payload::Nickname(nickname)) => nickname.name,
            _ => String::new(),
        };
        if state.registry.join(&candidate, tx.clone()) {
            return Some(candidate);
        }
        let _ = tx.send(Envelope::nickname_used());
    }
}
