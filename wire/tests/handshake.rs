//! End-to-end handshake and secure channel tests

use std::time::Duration;

use pqwire::{ChannelConfig, Error, HandshakeError, Initiator, PacketType, Responder};
use rand::RngCore;
use tokio::net::{TcpListener, TcpStream};

const DUPLEX_CAPACITY: usize = 64 * 1024;

fn pinned_pair(
    initiator_seed: &[u8],
    responder_seed: &[u8],
) -> (ChannelConfig, ChannelConfig) {
    let responder_config = ChannelConfig::production(responder_seed);
    let responder_key = {
        use pqwire::LocalIdentity;
        let identity = LocalIdentity::generate(responder_seed);
        crypto::traits::VerifyKey::to_bytes(&identity.verify_key)
    };
    let initiator_config =
        ChannelConfig::production(initiator_seed).with_expected_peer(responder_key);
    (initiator_config, responder_config)
}

#[tokio::test]
async fn handshake_succeeds_over_duplex() {
    let (initiator_config, responder_config) = pinned_pair(b"duplex-initiator", b"duplex-responder");
    let expected_initiator_id = initiator_config.local_peer_id();
    let expected_responder_id = responder_config.local_peer_id();

    let (a, b) = tokio::io::duplex(DUPLEX_CAPACITY);
    let mut initiator = Initiator::new(initiator_config, a);
    let mut responder = Responder::new(responder_config, b);

    let (initiator_result, responder_result) =
        tokio::join!(initiator.perform_handshake(), responder.perform_handshake());

    let initiator_peer = initiator_result.expect("initiator handshake should succeed");
    let responder_peer = responder_result.expect("responder handshake should succeed");

    assert_eq!(initiator_peer, expected_responder_id);
    assert_eq!(responder_peer, expected_initiator_id);
    assert!(initiator.is_complete());
    assert!(responder.is_complete());

    // Both sides froze the same transcript hash (channel binding).
    assert_eq!(
        initiator.session_transcript_hash().unwrap(),
        responder.session_transcript_hash().unwrap()
    );

    // 1024 random bytes, echoed back with the same context.
    let mut payload = vec![0u8; 1024];
    rand::thread_rng().fill_bytes(&mut payload);

    let (send, recv) = tokio::join!(initiator.write(&payload, 1), responder.read());
    send.unwrap();
    let packet = recv.unwrap();
    assert_eq!(packet.fragment, payload);
    assert_eq!(packet.context, 1);
    assert_eq!(packet.packet_type, PacketType::ApplicationData);
    assert_eq!(packet.sequence_number, 1);

    let (send, recv) = tokio::join!(responder.write(&packet.fragment, 1), initiator.read());
    send.unwrap();
    let echoed = recv.unwrap();
    assert_eq!(echoed.fragment, payload);
    assert_eq!(echoed.context, 1);
}

#[tokio::test]
async fn handshake_succeeds_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (initiator_config, responder_config) = pinned_pair(b"tcp-initiator", b"tcp-responder");

    let responder_handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut responder = Responder::new(responder_config, socket);
        let peer = responder.perform_handshake().await;
        peer.map(|peer| (peer, responder))
    });

    let socket = TcpStream::connect(addr).await.unwrap();
    let mut initiator = Initiator::new(initiator_config, socket);
    initiator
        .perform_handshake()
        .await
        .expect("initiator handshake should succeed");

    let (_, mut responder) = responder_handle
        .await
        .unwrap()
        .expect("responder handshake should succeed");

    // Bidirectional exchange
    initiator.write(b"ping", 1).await.unwrap();
    let packet = responder.read().await.unwrap();
    assert_eq!(packet.fragment, b"ping");

    responder.write(b"pong", 2).await.unwrap();
    let packet = initiator.read().await.unwrap();
    assert_eq!(packet.fragment, b"pong");
    assert_eq!(packet.context, 2);

    assert!(initiator.bytes_sent() > 0);
    assert!(initiator.bytes_received() > 0);
    assert!(responder.bytes_sent() > 0);
    assert!(responder.bytes_received() > 0);
}

#[tokio::test]
async fn sequence_numbers_advance_per_direction() {
    let (initiator_config, responder_config) = pinned_pair(b"seq-initiator", b"seq-responder");

    let (a, b) = tokio::io::duplex(DUPLEX_CAPACITY);
    let mut initiator = Initiator::new(initiator_config, a);
    let mut responder = Responder::new(responder_config, b);
    let (r1, r2) = tokio::join!(initiator.perform_handshake(), responder.perform_handshake());
    r1.unwrap();
    r2.unwrap();

    for expected_seq in 1..=5u64 {
        let (send, recv) = tokio::join!(initiator.write(b"tick", expected_seq), responder.read());
        send.unwrap();
        let packet = recv.unwrap();
        assert_eq!(packet.sequence_number, expected_seq);
        assert_eq!(packet.context, expected_seq);
    }

    // The reverse direction has its own counter, still starting at 1.
    let (send, recv) = tokio::join!(responder.write(b"tock", 9), initiator.read());
    send.unwrap();
    let packet = recv.unwrap();
    assert_eq!(packet.sequence_number, 1);
}

#[tokio::test]
async fn wrong_pinned_key_fails_before_application_secrets() {
    let responder_config = ChannelConfig::production(b"pin-responder");

    // Pin a key that is NOT the responder's actual signing key.
    let wrong_key = {
        let identity = pqwire::LocalIdentity::generate(b"some-other-peer");
        crypto::traits::VerifyKey::to_bytes(&identity.verify_key)
    };
    let initiator_config =
        ChannelConfig::production(b"pin-initiator").with_expected_peer(wrong_key);

    let (a, b) = tokio::io::duplex(DUPLEX_CAPACITY);
    let mut initiator = Initiator::new(initiator_config, a);

    let responder_handle = tokio::spawn(async move {
        let mut responder = Responder::new(responder_config, b);
        responder.perform_handshake().await
    });

    let err = initiator.perform_handshake().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Handshake(HandshakeError::PublicKeyMismatch)
    ));
    assert!(!initiator.is_complete());
    // No application secrets were derived on the failed session.
    assert!(initiator.session_transcript_hash().is_none());
    assert!(initiator.remote_peer().is_none());

    // The responder never receives ClientVerify and fails once the
    // initiator's end goes away.
    drop(initiator);
    let responder_result = responder_handle.await.unwrap();
    assert!(responder_result.is_err());
}

#[tokio::test]
async fn handshake_is_single_shot() {
    let (initiator_config, responder_config) =
        pinned_pair(b"once-initiator", b"once-responder");

    let (a, b) = tokio::io::duplex(DUPLEX_CAPACITY);
    let mut initiator = Initiator::new(initiator_config, a);
    let mut responder = Responder::new(responder_config, b);
    let (r1, r2) = tokio::join!(initiator.perform_handshake(), responder.perform_handshake());
    r1.unwrap();
    r2.unwrap();

    let err = initiator.perform_handshake().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Handshake(HandshakeError::AlreadyHandshaking)
    ));
    let err = responder.perform_handshake().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Handshake(HandshakeError::AlreadyHandshaking)
    ));
}

#[tokio::test]
async fn failed_session_cannot_retry() {
    let responder_config = ChannelConfig::production(b"retry-responder");
    let wrong_key = {
        let identity = pqwire::LocalIdentity::generate(b"not-the-responder");
        crypto::traits::VerifyKey::to_bytes(&identity.verify_key)
    };
    let initiator_config =
        ChannelConfig::production(b"retry-initiator").with_expected_peer(wrong_key);

    let (a, b) = tokio::io::duplex(DUPLEX_CAPACITY);
    let mut initiator = Initiator::new(initiator_config, a);
    let responder_handle = tokio::spawn(async move {
        let mut responder = Responder::new(responder_config, b);
        responder.perform_handshake().await
    });

    assert!(initiator.perform_handshake().await.is_err());

    // A failed session is terminal: no retry on the same object.
    let err = initiator.perform_handshake().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Handshake(HandshakeError::AlreadyHandshaking)
    ));

    drop(initiator);
    let _ = responder_handle.await.unwrap();
}

#[tokio::test]
async fn read_write_require_completed_handshake() {
    let config = ChannelConfig::production(b"not-complete");
    let (a, _b) = tokio::io::duplex(DUPLEX_CAPACITY);
    let mut initiator = Initiator::new(config.clone(), a);

    let err = initiator.write(b"data", 0).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Handshake(HandshakeError::HandshakeNotComplete)
    ));
    let err = initiator.read().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Handshake(HandshakeError::HandshakeNotComplete)
    ));

    let (c, _d) = tokio::io::duplex(DUPLEX_CAPACITY);
    let mut responder = Responder::new(config, c);
    let err = responder.write(b"data", 0).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Handshake(HandshakeError::HandshakeNotComplete)
    ));
}

#[tokio::test]
async fn handshake_times_out_on_hanging_stream() {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncWrite};

    // A stream that accepts writes but never completes reads.
    struct HangingStream;

    impl AsyncRead for HangingStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for HangingStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    let config = ChannelConfig::production(b"timeout-test")
        .with_timeout(Duration::from_millis(50));
    let mut initiator = Initiator::new(config, HangingStream);

    let err = initiator.perform_handshake().await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert!(!initiator.is_complete());
}

#[tokio::test]
async fn responder_accepts_unpinned_peer() {
    // Open-peer model: the responder has no pinned expectation and learns
    // the initiator's key from its ClientVerify signature.
    let initiator_config = {
        let responder_identity = pqwire::LocalIdentity::generate(b"open-responder");
        ChannelConfig::production(b"open-initiator")
            .with_expected_peer(crypto::traits::VerifyKey::to_bytes(&responder_identity.verify_key))
    };
    let responder_config = ChannelConfig::production(b"open-responder");
    let expected_initiator_id = initiator_config.local_peer_id();

    let (a, b) = tokio::io::duplex(DUPLEX_CAPACITY);
    let mut initiator = Initiator::new(initiator_config, a);
    let mut responder = Responder::new(responder_config, b);

    let (r1, r2) = tokio::join!(initiator.perform_handshake(), responder.perform_handshake());
    r1.unwrap();
    let initiator_peer_id = r2.unwrap();

    assert_eq!(initiator_peer_id, expected_initiator_id);
    let remote = responder.remote_peer().unwrap();
    assert_eq!(remote.peer_id, expected_initiator_id);
}
