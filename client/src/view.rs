/// Display collaborator: everything the receive loop surfaces to the
/// embedding UI. Implementations are called from the background receive
/// task, so they must be thread-safe and should return quickly.
pub trait ChatView: Send + Sync {
    /// A broadcast line, exactly as the server formatted it.
    fn on_broadcast_text(&self, text: &str);

    /// A private message addressed to this client.
    fn on_private_text(&self, sender: &str, body: &str);

    /// The full roster after any membership change, sorted.
    fn on_roster_changed(&self, roster: &[String]);

    /// Someone joined the chat.
    fn on_joined(&self, nickname: &str);

    /// Someone left the chat.
    fn on_left(&self, nickname: &str);

    /// A user-facing failure: handshake rejection or a lost connection.
    fn on_error(&self, message: &str);
}
