//! Integration tests for the nickname handshake, message routing, renames,
//! and both disconnect paths, driven over real TCP connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use parley_proto::{Connection, Envelope, Payload};
use parley_server::session::registry::Registry;
use parley_server::state::AppState;

/// Start the server on a random port with a scratch database.
/// Returns the address plus the state so tests can assert on the registry.
async fn start_test_server() -> (SocketAddr, AppState) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();
    let db = parley_server::db::init_db(&data_dir).expect("Failed to init DB");

    let state = AppState {
        db,
        registry: Arc::new(Registry::new()),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serve_state = state.clone();
    tokio::spawn(async move {
        let _keep = tmp_dir;
        let _ = parley_server::serve(listener, serve_state).await;
    });

    (addr, state)
}

async fn recv(conn: &mut Connection) -> Envelope {
    timeout(Duration::from_secs(2), conn.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("transport failed")
}

/// Assert that no frame arrives for a little while.
async fn expect_silence(conn: &mut Connection) {
    let result = timeout(Duration::from_millis(200), conn.recv()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

/// Connect and complete the handshake as `nickname`, consuming the
/// acceptance and the echoed join announcement.
async fn join(addr: SocketAddr, nickname: &str) -> Connection {
    let mut conn = Connection::new(TcpStream::connect(addr).await.unwrap());

    let prompt = recv(&mut conn).await;
    assert!(
        matches!(prompt.payload, Some(Payload::RequestNickname(_))),
        "expected nickname prompt, got {prompt:?}"
    );

    conn.send(&Envelope::nickname(nickname)).await.unwrap();

    let reply = recv(&mut conn).await;
    match reply.payload {
        Some(Payload::NicknameAccepted(accepted)) => {
            assert!(
                accepted.users.contains(&nickname.to_string()),
                "roster snapshot should include the joiner"
            );
        }
        other => panic!("expected acceptance for {nickname}, got {other:?}"),
    }

    // The join announcement fans out to the joiner as well.
    let added = recv(&mut conn).await;
    match added.payload {
        Some(Payload::UserAdded(user)) => assert_eq!(user.name, nickname),
        other => panic!("expected join announcement, got {other:?}"),
    }

    conn
}

#[tokio::test]
async fn handshake_accepts_a_unique_nickname() {
    let (addr, state) = start_test_server().await;

    let _ada = join(addr, "ada").await;
    assert_eq!(state.registry.roster(), vec!["ada"]);
}

#[tokio::test]
async fn duplicate_nickname_is_rejected_until_changed() {
    let (addr, state) = start_test_server().await;
    let _ada = join(addr, "ada").await;

    let mut conn = Connection::new(TcpStream::connect(addr).await.unwrap());
    let prompt = recv(&mut conn).await;
    assert!(matches!(prompt.payload, Some(Payload::RequestNickname(_))));

    conn.send(&Envelope::nickname("ada")).await.unwrap();
    let rejection = recv(&mut conn).await;
    assert!(
        matches!(rejection.payload, Some(Payload::NicknameUsed(_))),
        "expected rejection, got {rejection:?}"
    );

    // The server re-issues the prompt and accepts a fresh name.
    let prompt = recv(&mut conn).await;
    assert!(matches!(prompt.payload, Some(Payload::RequestNickname(_))));

    conn.send(&Envelope::nickname("grace")).await.unwrap();
    let reply = recv(&mut conn).await;
    match reply.payload {
        Some(Payload::NicknameAccepted(accepted)) => {
            assert_eq!(accepted.users, vec!["ada", "grace"]);
        }
        other => panic!("expected acceptance, got {other:?}"),
    }

    assert_eq!(state.registry.roster(), vec!["ada", "grace"]);
}

#[tokio::test]
async fn empty_nickname_is_rejected() {
    let (addr, state) = start_test_server().await;

    let mut conn = Connection::new(TcpStream::connect(addr).await.unwrap());
    let _prompt = recv(&mut conn).await;
    conn.send(&Envelope::nickname("")).await.unwrap();

    let rejection = recv(&mut conn).await;
    assert!(matches!(rejection.payload, Some(Payload::NicknameUsed(_))));
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn broadcast_reaches_every_session_exactly_once() {
    let (addr, _state) = start_test_server().await;
    let mut ada = join(addr, "ada").await;
    let mut grace = join(addr, "grace").await;
    let mut ida = join(addr, "ida").await;

    // Drain the join announcements the earlier sessions observed.
    for _ in 0..2 {
        recv(&mut ada).await;
    }
    recv(&mut grace).await;

    ada.send(&Envelope::chat_text("hello everyone")).await.unwrap();

    let expected = Envelope::chat_text("ada: hello everyone\n");
    assert_eq!(recv(&mut ada).await, expected);
    assert_eq!(recv(&mut grace).await, expected);
    assert_eq!(recv(&mut ida).await, expected);

    // Exactly once: nothing further is queued anywhere.
    expect_silence(&mut ada).await;
    expect_silence(&mut grace).await;
    expect_silence(&mut ida).await;
}

#[tokio::test]
async fn private_message_goes_only_to_its_target() {
    let (addr, _state) = start_test_server().await;
    let mut ada = join(addr, "ada").await;
    let mut grace = join(addr, "grace").await;
    let mut ida = join(addr, "ida").await;

    for _ in 0..2 {
        recv(&mut ada).await;
    }
    recv(&mut grace).await;

    ada.send(&Envelope::private_text("hello there", "grace"))
        .await
        .unwrap();

    // Delivered to the target with the sender attributed.
    assert_eq!(
        recv(&mut grace).await,
        Envelope::private_text("hello there", "ada")
    );

    // Neither the sender nor a bystander sees it.
    expect_silence(&mut ada).await;
    expect_silence(&mut ida).await;
}

#[tokio::test]
async fn private_message_to_an_offline_target_is_dropped_silently() {
    let (addr, _state) = start_test_server().await;
    let mut ada = join(addr, "ada").await;
    let mut grace = join(addr, "grace").await;
    recv(&mut ada).await; // grace's join announcement

    ada.send(&Envelope::private_text("anyone home", "nobody"))
        .await
        .unwrap();

    expect_silence(&mut ada).await;
    expect_silence(&mut grace).await;
}

#[tokio::test]
async fn rename_moves_the_registry_entry_and_notifies_everyone() {
    let (addr, state) = start_test_server().await;
    let mut ada = join(addr, "ada").await;
    let mut grace = join(addr, "grace").await;
    recv(&mut ada).await;

    ada.send(&Envelope::nickname_changed("countess")).await.unwrap();

    let notice = Envelope::nickname_changed("ada changed nickname to countess");
    assert_eq!(recv(&mut ada).await, notice);
    assert_eq!(recv(&mut grace).await, notice);
    assert_eq!(state.registry.roster(), vec!["countess", "grace"]);

    // Later broadcasts carry the new name.
    ada.send(&Envelope::chat_text("still me")).await.unwrap();
    assert_eq!(
        recv(&mut grace).await,
        Envelope::chat_text("countess: still me\n")
    );
}

#[tokio::test]
async fn rename_to_a_taken_name_is_refused() {
    let (addr, state) = start_test_server().await;
    let mut ada = join(addr, "ada").await;
    let mut grace = join(addr, "grace").await;
    recv(&mut ada).await;

    grace.send(&Envelope::nickname_changed("ada")).await.unwrap();

    let reply = recv(&mut grace).await;
    assert!(
        matches!(reply.payload, Some(Payload::NicknameUsed(_))),
        "expected refusal, got {reply:?}"
    );
    assert_eq!(state.registry.roster(), vec!["ada", "grace"]);
    expect_silence(&mut ada).await;
}

#[tokio::test]
async fn graceful_disconnect_notifies_peers_and_clears_the_entry() {
    let (addr, state) = start_test_server().await;
    let mut ada = join(addr, "ada").await;
    let mut grace = join(addr, "grace").await;
    recv(&mut ada).await;

    ada.send(&Envelope::disable_user()).await.unwrap();

    assert_eq!(recv(&mut grace).await, Envelope::removed_user("ada"));

    // The leaver was still registered when the notice fanned out, then the
    // server closed the connection.
    assert_eq!(recv(&mut ada).await, Envelope::removed_user("ada"));
    let eof = timeout(Duration::from_secs(2), ada.recv()).await.unwrap();
    assert!(eof.is_err(), "expected the server to close the stream");

    assert_eq!(state.registry.roster(), vec!["grace"]);
}

#[tokio::test]
async fn ungraceful_disconnect_still_notifies_peers() {
    let (addr, state) = start_test_server().await;
    let ada = join(addr, "ada").await;
    let mut grace = join(addr, "grace").await;

    // Drop the socket without a DisableUser — peer crash.
    drop(ada);

    assert_eq!(recv(&mut grace).await, Envelope::removed_user("ada"));
    assert_eq!(state.registry.roster(), vec!["grace"]);
}

#[tokio::test]
async fn chat_and_disconnects_are_persisted_to_the_log() {
    let (addr, state) = start_test_server().await;
    let mut ada = join(addr, "ada").await;
    let mut grace = join(addr, "grace").await;
    recv(&mut ada).await;

    ada.send(&Envelope::chat_text("hello")).await.unwrap();
    ada.send(&Envelope::private_text("meet me at noon", "grace"))
        .await
        .unwrap();
    ada.send(&Envelope::disable_user()).await.unwrap();

    // Wait for grace to observe the departure, then the log is settled
    // (appends happen before further frames are processed).
    recv(&mut grace).await; // ada: hello
    recv(&mut grace).await; // private
    assert_eq!(recv(&mut grace).await, Envelope::removed_user("ada"));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let entries = parley_server::db::history::recent_entries(&state.db, 10).await;
    assert!(entries.contains(&"ada: hello\n".to_string()));
    assert!(entries.contains(&"*meet me at noon grace - (ada)".to_string()));
    assert!(entries.contains(&"ada: disconnected".to_string()));
}

#[tokio::test]
async fn concurrent_distinct_handshakes_all_succeed() {
    let (addr, state) = start_test_server().await;

    let names = ["ada", "grace", "ida", "mary", "edith", "jean"];
    let mut handles = Vec::new();
    for name in names {
        handles.push(tokio::spawn(async move { join(addr, name).await }));
    }

    // Keep the connections alive until the registry has been inspected.
    let mut conns = Vec::new();
    for handle in handles {
        conns.push(handle.await.unwrap());
    }

    let mut expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(state.registry.roster(), expected);
}

#[tokio::test]
async fn concurrent_same_name_handshakes_admit_exactly_one() {
    let (addr, state) = start_test_server().await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        handles.push(tokio::spawn(async move {
            let mut conn = Connection::new(TcpStream::connect(addr).await.unwrap());
            let prompt = recv(&mut conn).await;
            assert!(matches!(prompt.payload, Some(Payload::RequestNickname(_))));
            conn.send(&Envelope::nickname("ada")).await.unwrap();
            let reply = recv(&mut conn).await;
            let accepted = matches!(reply.payload, Some(Payload::NicknameAccepted(_)));
            (conn, accepted)
        }));
    }

    let mut conns = Vec::new();
    let mut accepted_count = 0;
    for handle in handles {
        let (conn, accepted) = handle.await.unwrap();
        conns.push(conn);
        if accepted {
            accepted_count += 1;
        }
    }

    assert_eq!(accepted_count, 1, "exactly one session may win the name");
    assert_eq!(state.registry.roster(), vec!["ada"]);
}
