//! Client-side session handling for the parley chat protocol.
//!
//! [`connect`] runs the nickname handshake and spawns a background receive
//! loop that mirrors the server's roster and feeds a [`ChatView`]
//! collaborator; the returned [`ClientHandle`] carries the outbound
//! operations a UI layer drives.

mod handler;
mod roster;
mod view;

pub use handler::{connect, ClientError, ClientHandle};
pub use roster::Roster;
pub use view::ChatView;
