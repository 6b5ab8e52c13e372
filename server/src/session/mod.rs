pub mod actor;
pub mod protocol;
pub mod registry;

use parley_proto::Envelope;
use tokio::sync::mpsc;

/// Type alias for the sender half of a session's outbound frame queue.
/// Other parts of the system can clone this to push frames to a specific
/// client; the session's writer task drains the queue into the socket.
pub type SessionSender = mpsc::UnboundedSender<Envelope>;
