//! End-to-end proxy tests with a mock SSH agent

use authsock_pin::agent::{ProxyServer, Upstream};
use authsock_pin::protocol::{AgentCodec, AgentMessage, Identity, MessageType};
use bytes::Bytes;
use ssh_key::PublicKey;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::net::{UnixListener, UnixStream};

// Pre-generated test keys (same as integration_test.rs)
const ED25519_KEY_WORK: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl user@work.example.com";
const ED25519_KEY_PERSONAL: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHUu2eEV0kRvK3dMRlSFwHxVoNxCfwjKmAZBlhkNjC4i user@personal.example.com";

fn make_identity(key_str: &str) -> Identity {
    let public_key: PublicKey = key_str.parse().unwrap();
    let key_blob = Bytes::from(public_key.to_bytes().unwrap());
    let comment = key_str.split_whitespace().nth(2).unwrap_or("");
    Identity::new(key_blob, Bytes::copy_from_slice(comment.as_bytes()))
}

/// Start a mock SSH agent that reports the given identities and answers
/// sign requests by echoing the request payload back.
async fn start_mock_agent(socket_path: &Path, identities: Vec<Identity>) {
    let listener = UnixListener::bind(socket_path).unwrap();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };

            let identities = identities.clone();
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                loop {
                    let msg = match AgentCodec::read(&mut reader).await {
                        Ok(Some(msg)) => msg,
                        _ => break,
                    };

                    let response = match msg.msg_type {
                        MessageType::RequestIdentities => {
                            AgentMessage::build_identities_answer(&identities)
                        }
                        MessageType::SignRequest => {
                            AgentMessage::new(MessageType::SignResponse, msg.payload.clone())
                        }
                        _ => AgentMessage::new(MessageType::Failure, Bytes::new()),
                    };

                    if AgentCodec::write(&mut writer, &response).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    // Wait for the socket to be ready
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
}

/// Fetch identities from the upstream, bind per-identity sockets, and
/// start serving in the background. Returns the socket directory paths.
async fn start_proxy(upstream_path: &Path, socket_dir: &Path) -> Vec<PathBuf> {
    let upstream = Upstream::new(upstream_path);
    let identities = upstream.fetch_identities().await.unwrap();

    let server = ProxyServer::bind(upstream, socket_dir, identities, None).unwrap();
    let paths = server.socket_paths();
    tokio::spawn(server.serve());

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    paths
}

/// Connect to an agent socket and request identities
async fn request_identities(socket_path: &Path) -> Vec<Identity> {
    let mut stream = UnixStream::connect(socket_path).await.unwrap();
    let (mut reader, mut writer) = stream.split();

    AgentCodec::write(&mut writer, &AgentMessage::request_identities())
        .await
        .unwrap();

    let response = AgentCodec::read(&mut reader).await.unwrap().unwrap();
    response.parse_identities().unwrap()
}

#[tokio::test]
async fn test_each_socket_pins_its_own_key() {
    let temp_dir = TempDir::new().unwrap();
    let upstream_path = temp_dir.path().join("upstream.sock");
    let socket_dir = temp_dir.path().join("pinned");

    let work = make_identity(ED25519_KEY_WORK);
    let personal = make_identity(ED25519_KEY_PERSONAL);

    start_mock_agent(&upstream_path, vec![work.clone(), personal.clone()]).await;
    start_proxy(&upstream_path, &socket_dir).await;

    // One socket per identity, named by fingerprint
    let work_sock = socket_dir.join(work.fingerprint());
    let personal_sock = socket_dir.join(personal.fingerprint());
    assert!(work_sock.exists());
    assert!(personal_sock.exists());

    // The socket for the personal key must report [personal, work]
    let via_personal = request_identities(&personal_sock).await;
    assert_eq!(via_personal, vec![personal.clone(), work.clone()]);

    // The socket for the work key keeps the upstream order [work, personal]
    let via_work = request_identities(&work_sock).await;
    assert_eq!(via_work, vec![work, personal]);
}

#[tokio::test]
async fn test_sign_request_round_trips_unmodified() {
    let temp_dir = TempDir::new().unwrap();
    let upstream_path = temp_dir.path().join("upstream.sock");
    let socket_dir = temp_dir.path().join("pinned");

    let work = make_identity(ED25519_KEY_WORK);
    start_mock_agent(&upstream_path, vec![work.clone()]).await;
    let sockets = start_proxy(&upstream_path, &socket_dir).await;
    assert_eq!(sockets.len(), 1);

    let body: Vec<u8> = (0..50u8).collect();
    let request = AgentMessage::new(MessageType::SignRequest, Bytes::from(body.clone()));

    let mut stream = UnixStream::connect(&sockets[0]).await.unwrap();
    let (mut reader, mut writer) = stream.split();
    AgentCodec::write(&mut writer, &request).await.unwrap();

    // The mock agent echoes the sign request payload, so a byte-identical
    // echo proves the request crossed the proxy unmodified.
    let response = AgentCodec::read(&mut reader).await.unwrap().unwrap();
    assert_eq!(response.msg_type, MessageType::SignResponse);
    assert_eq!(response.payload, Bytes::from(body));
}

#[tokio::test]
async fn test_multiple_requests_on_one_connection() {
    let temp_dir = TempDir::new().unwrap();
    let upstream_path = temp_dir.path().join("upstream.sock");
    let socket_dir = temp_dir.path().join("pinned");

    let work = make_identity(ED25519_KEY_WORK);
    let personal = make_identity(ED25519_KEY_PERSONAL);
    start_mock_agent(&upstream_path, vec![work.clone(), personal.clone()]).await;
    start_proxy(&upstream_path, &socket_dir).await;

    let personal_sock = socket_dir.join(personal.fingerprint());
    let mut stream = UnixStream::connect(&personal_sock).await.unwrap();
    let (mut reader, mut writer) = stream.split();

    for _ in 0..3 {
        AgentCodec::write(&mut writer, &AgentMessage::request_identities())
            .await
            .unwrap();
        let response = AgentCodec::read(&mut reader).await.unwrap().unwrap();
        let ids = response.parse_identities().unwrap();
        assert_eq!(ids, vec![personal.clone(), work.clone()]);
    }
}

#[tokio::test]
async fn test_connection_isolation() {
    let temp_dir = TempDir::new().unwrap();
    let upstream_path = temp_dir.path().join("upstream.sock");
    let socket_dir = temp_dir.path().join("pinned");

    let work = make_identity(ED25519_KEY_WORK);
    start_mock_agent(&upstream_path, vec![work.clone()]).await;
    let sockets = start_proxy(&upstream_path, &socket_dir).await;

    // Connection #2 opens first and stays up while #1 is torn down
    let mut conn2 = UnixStream::connect(&sockets[0]).await.unwrap();

    let conn1 = UnixStream::connect(&sockets[0]).await.unwrap();
    drop(conn1);
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    // Connection #2 must be unaffected
    let (mut reader, mut writer) = conn2.split();
    AgentCodec::write(&mut writer, &AgentMessage::request_identities())
        .await
        .unwrap();
    let response = AgentCodec::read(&mut reader).await.unwrap().unwrap();
    assert_eq!(response.parse_identities().unwrap(), vec![work]);
}

#[tokio::test]
async fn test_unknown_message_passes_through() {
    let temp_dir = TempDir::new().unwrap();
    let upstream_path = temp_dir.path().join("upstream.sock");
    let socket_dir = temp_dir.path().join("pinned");

    let work = make_identity(ED25519_KEY_WORK);
    start_mock_agent(&upstream_path, vec![work]).await;
    let sockets = start_proxy(&upstream_path, &socket_dir).await;

    // A tag the proxy does not know; the mock agent answers Failure
    let request = AgentMessage::new(MessageType::Unknown(17), Bytes::from_static(b"add-key"));

    let mut stream = UnixStream::connect(&sockets[0]).await.unwrap();
    let (mut reader, mut writer) = stream.split();
    AgentCodec::write(&mut writer, &request).await.unwrap();

    let response = AgentCodec::read(&mut reader).await.unwrap().unwrap();
    assert_eq!(response.msg_type, MessageType::Failure);
}

#[tokio::test]
async fn test_fetch_identities_rejects_non_answer() {
    let temp_dir = TempDir::new().unwrap();
    let upstream_path = temp_dir.path().join("upstream.sock");

    // An upstream that answers everything with FAILURE
    let listener = UnixListener::bind(&upstream_path).unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                while let Ok(Some(_)) = AgentCodec::read(&mut reader).await {
                    let failure = AgentMessage::new(MessageType::Failure, Bytes::new());
                    if AgentCodec::write(&mut writer, &failure).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    let upstream = Upstream::new(&upstream_path);
    let result = upstream.fetch_identities().await;
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("Unexpected response")
    );
}
