//! Protobuf message model for the chat protocol.
//!
//! Everything on the wire is an [`Envelope`] holding exactly one payload
//! variant, so a consumer can never see a frame that mixes the text and
//! roster shapes. The types are hand-derived prost messages; the encoding is
//! byte-compatible with what prost-build would generate from an equivalent
//! .proto file, without needing protoc at build time.

/// Server prompt that opens (and re-opens) the nickname handshake.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RequestNickname {}

/// Client's candidate display name.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Nickname {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// Acceptance reply, carrying the full online roster at acceptance time.
/// The joiner's own name is part of the snapshot.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NicknameAccepted {
    #[prost(string, repeated, tag = "1")]
    pub users: Vec<String>,
}

/// The candidate name was empty or already taken.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct NicknameUsed {}

/// Broadcast chat text. Client to server it is the raw input; server to
/// client it is the display line `"<nickname>: <text>\n"`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChatText {
    #[prost(string, tag = "1")]
    pub text: String,
}

/// Private chat text. `peer` names the target when sent by a client and the
/// sender when delivered by the server.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PrivateText {
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(string, tag = "2")]
    pub peer: String,
}

/// Nickname change. Client to server `text` is the new name; server to
/// client it is the display line `"<old> changed nickname to <new>"`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NicknameChanged {
    #[prost(string, tag = "1")]
    pub text: String,
}

/// Join notice broadcast to every session.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserAdded {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// Leave notice broadcast to every session.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemovedUser {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// Client request for a graceful disconnect.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DisableUser {}

#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum Payload {
    #[prost(message, tag = "1")]
    RequestNickname(RequestNickname),
    #[prost(message, tag = "2")]
    Nickname(Nickname),
    #[prost(message, tag = "3")]
    NicknameAccepted(NicknameAccepted),
    #[prost(message, tag = "4")]
    NicknameUsed(NicknameUsed),
    #[prost(message, tag = "5")]
    ChatText(ChatText),
    #[prost(message, tag = "6")]
    PrivateText(PrivateText),
    #[prost(message, tag = "7")]
    NicknameChanged(NicknameChanged),
    #[prost(message, tag = "8")]
    UserAdded(UserAdded),
    #[prost(message, tag = "9")]
    RemovedUser(RemovedUser),
    #[prost(message, tag = "10")]
    DisableUser(DisableUser),
}

/// One frame on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(oneof = "Payload", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10")]
    pub payload: Option<Payload>,
}

impl Envelope {
    pub fn request_nickname() -> Self {
        Self {
            payload: Some(Payload::RequestNickname(RequestNickname {})),
        }
    }

    pub fn nickname(name: impl Into<String>) -> Self {
        Self {
            payload: Some(Payload::Nickname(Nickname { name: name.into() })),
        }
    }

    pub fn nickname_accepted(users: Vec<String>) -> Self {
        Self {
            payload: Some(Payload::NicknameAccepted(NicknameAccepted { users })),
        }
    }

    pub fn nickname_used() -> Self {
        Self {
            payload: Some(Payload::NicknameUsed(NicknameUsed {})),
        }
    }

    pub fn chat_text(text: impl Into<String>) -> Self {
        Self {
            payload: Some(Payload::ChatText(ChatText { text: text.into() })),
        }
    }

    pub fn private_text(text: impl Into<String>, peer: impl Into<String>) -> Self {
        Self {
            payload: Some(Payload::PrivateText(PrivateText {
                text: text.into(),
                peer: peer.into(),
            })),
        }
    }

    pub fn nickname_changed(text: impl Into<String>) -> Self {
        Self {
            payload: Some(Payload::NicknameChanged(NicknameChanged { text: text.into() })),
        }
    }

    pub fn user_added(name: impl Into<String>) -> Self {
        Self {
            payload: Some(Payload::UserAdded(UserAdded { name: name.into() })),
        }
    }

    pub fn removed_user(name: impl Into<String>) -> Self {
        Self {
            payload: Some(Payload::RemovedUser(RemovedUser { name: name.into() })),
        }
    }

    pub fn disable_user() -> Self {
        Self {
            payload: Some(Payload::DisableUser(DisableUser {})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    fn round_trip(envelope: Envelope) {
        let bytes = envelope.encode_to_vec();
        let decoded = Envelope::decode(&bytes[..]).expect("decode failed");
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn every_payload_kind_round_trips() {
        for envelope in [
            Envelope::request_nickname(),
            Envelope::nickname("ada"),
            Envelope::nickname_accepted(vec!["ada".into(), "grace".into()]),
            Envelope::nickname_used(),
            Envelope::chat_text("ada: hello\n"),
            Envelope::private_text("meet me at noon", "grace"),
            Envelope::nickname_changed("ada changed nickname to countess"),
            Envelope::user_added("grace"),
            Envelope::removed_user("grace"),
            Envelope::disable_user(),
        ] {
            round_trip(envelope);
        }
    }

    #[test]
    fn empty_envelope_survives_the_wire() {
        round_trip(Envelope { payload: None });
    }

    #[test]
    fn payload_shapes_are_exclusive() {
        // A text-bearing frame decodes with no roster and vice versa.
        let text = Envelope::chat_text("hi");
        match text.payload {
            Some(Payload::ChatText(ref msg)) => assert_eq!(msg.text, "hi"),
            ref other => panic!("expected chat text, got {other:?}"),
        }
        let roster = Envelope::nickname_accepted(vec!["ada".into()]);
        match roster.payload {
            Some(Payload::NicknameAccepted(ref msg)) => assert_eq!(msg.users, vec!["ada"]),
            ref other => panic!("expected roster, got {other:?}"),
        }
    }
}
