//! Handshake initiator (the connecting side)

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use zeroize::Zeroizing;

use crypto::ml_dsa;
use crypto::ml_kem::{MlKemCiphertext, MlKemKeyPair, ML_KEM_SEED_LEN};
use crypto::traits::{KemKeyPair, KemPublicKey, VerifyKey};

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec;
use crate::config::ChannelConfig;
use crate::error::{Error, HandshakeError, Result};
use crate::record::{read_record, DataPacket, PacketType, RecordCipher, HEADER_LEN};
use crate::secrets::SessionSecret;
use crate::transcript::Transcript;
use crate::types::{
    ClientHello, HandshakeState, PeerId, RemotePeer, ServerHello, VerifyMessage, HELLO_NONCE_LEN,
    PROTOCOL_VERSION,
};

/// Initiator-side handshake session.
///
/// Drives the 4-message handshake (ClientHello, ServerHello, ServerVerify,
/// ClientVerify) as the connecting party, then exposes `read`/`write`
/// over the application-phase record layer. One handshake per session:
/// a second `perform_handshake` call fails with `AlreadyHandshaking`, and
/// any failure leaves the session terminally `Failed`.
pub struct Initiator<S> {
    config: ChannelConfig,
    stream: S,
    state: HandshakeState,
    transcript: Transcript,
    secrets: Option<SessionSecret>,
    app_send: Option<RecordCipher>,
    app_recv: Option<RecordCipher>,
    remote_peer: Option<RemotePeer>,
    read_buf: ReadBuffer,
    write_buf: WriteBuffer,
    bytes_sent: u64,
    bytes_received: u64,
}

impl<S> Initiator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new initiator session over a connected stream
    pub fn new(config: ChannelConfig, stream: S) -> Self {
        Self {
            config,
            stream,
            state: HandshakeState::Idle,
            transcript: Transcript::new(),
            secrets: None,
            app_send: None,
            app_recv: None,
            remote_peer: None,
            read_buf: ReadBuffer::new(),
            write_buf: WriteBuffer::new(),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Run the handshake to completion.
    ///
    /// Returns the responder's peer ID on success. Fails fast with
    /// `AlreadyHandshaking` if this session has already started; any
    /// other failure is terminal for the session.
    pub async fn perform_handshake(&mut self) -> Result<PeerId> {
        if self.state != HandshakeState::Idle {
            return Err(HandshakeError::AlreadyHandshaking.into());
        }

        let deadline = self.config.handshake_timeout;
        let result = match timeout(deadline, self.run_handshake()).await {
            Ok(inner) => inner,
            Err(_) => Err(Error::Timeout),
        };
        match result {
            Ok(peer_id) => Ok(peer_id),
            Err(e) => {
                self.state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    async fn run_handshake(&mut self) -> Result<PeerId> {
        // ClientHello: fresh ephemeral KEM keypair plus a random nonce.
        let mut kem_seed = Zeroizing::new([0u8; ML_KEM_SEED_LEN]);
        rand::thread_rng().fill_bytes(&mut *kem_seed);
        let ephemeral = MlKemKeyPair::generate_deterministic(&*kem_seed);

        let mut nonce = [0u8; HELLO_NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let client_hello = ClientHello {
            kem_public_key: ephemeral.public_key().to_bytes(),
            nonce,
            version: PROTOCOL_VERSION,
        };
        let frame = codec::serialize(&client_hello)?;
        self.send_bytes(&frame).await?;
        self.transcript
            .update(&codec::serialize_deterministic(&client_hello, 0)?);
        self.state = HandshakeState::HelloSent;

        if self.config.verbose_logging {
            tracing::debug!("sent ClientHello");
        }

        // ServerHello: decapsulate to obtain the shared secret.
        let server_hello: ServerHello = codec::read_message(
            &mut self.stream,
            &mut self.read_buf,
            self.config.max_handshake_message_len,
        )
        .await?;
        let ciphertext = MlKemCiphertext::from_bytes(&server_hello.kem_ciphertext)
            .map_err(|_| HandshakeError::DecapsulationFailed)?;
        let shared = ephemeral
            .decapsulate(&ciphertext)
            .map_err(|_| HandshakeError::DecapsulationFailed)?;
        // The ephemeral key has no further use; its seed zeroizes on drop.
        drop(ephemeral);
        drop(kem_seed);

        self.transcript
            .update(&codec::serialize_deterministic(&server_hello, 0)?);
        self.state = HandshakeState::HelloReceived;

        if self.config.verbose_logging {
            tracing::debug!(version = server_hello.version, "received ServerHello");
        }

        // Handshake secrets from the Hello transcript.
        let th_hellos = self.transcript.hash();
        let mut secrets = SessionSecret::derive_handshake(&th_hellos, shared.as_bytes())?;
        let mut hs_send = RecordCipher::new(&secrets.client_handshake)?;
        let mut hs_recv = RecordCipher::new(&secrets.server_handshake)?;
        self.state = HandshakeState::SecretsDerived;

        // ServerVerify: recover the signer key from its transcript
        // signature and compare against the pinned key.
        let (header, record_ct) = read_record(
            &mut self.stream,
            &mut self.read_buf,
            self.config.max_record_len,
        )
        .await?;
        let packet = hs_recv.open(&header, &record_ct)?;
        if packet.packet_type != PacketType::Handshake {
            return Err(HandshakeError::UnexpectedMessage {
                expected: "Handshake",
                got: packet.packet_type.name(),
            }
            .into());
        }
        let server_verify: VerifyMessage = codec::decode_framed(&packet.fragment)?;
        let sealed = server_verify
            .signature_bytes()
            .ok_or(HandshakeError::SignatureVerificationFailed)?;
        let recovered = ml_dsa::recover_verify_key(&th_hellos, sealed)
            .map_err(|_| HandshakeError::SignatureVerificationFailed)?;

        // The recovery operation does not itself prove this is the peer we
        // meant to reach; the pinned comparison is the explicit decision.
        if let Some(pinned) = &self.config.expected_peer {
            if pinned.as_slice() != recovered.to_bytes().as_slice() {
                return Err(HandshakeError::PublicKeyMismatch.into());
            }
        }

        self.transcript
            .update(&codec::serialize_deterministic(&server_verify, 0)?);

        if self.config.verbose_logging {
            tracing::debug!("verified ServerVerify");
        }

        // ClientVerify: sign the extended transcript and authenticate
        // ourselves through the handshake record layer.
        let th_server_verify = self.transcript.hash();
        let sealed = self
            .config
            .identity
            .signing_key
            .sign_recoverable(&th_server_verify);
        let client_verify = VerifyMessage::new(sealed);
        let plaintext = codec::serialize(&client_verify)?;
        let record = hs_send.seal(PacketType::Handshake, 0, &plaintext)?;
        self.send_bytes(&record).await?;
        self.transcript
            .update(&codec::serialize_deterministic(&client_verify, 0)?);
        self.state = HandshakeState::VerifyExchanged;

        if self.config.verbose_logging {
            tracing::debug!("sent ClientVerify");
        }

        // Application secrets from the full transcript.
        let th_final = self.transcript.hash();
        secrets.derive_application(&th_final)?;
        self.app_send = Some(RecordCipher::new(
            secrets
                .client_application
                .as_ref()
                .ok_or(HandshakeError::KeyDerivation)?,
        )?);
        self.app_recv = Some(RecordCipher::new(
            secrets
                .server_application
                .as_ref()
                .ok_or(HandshakeError::KeyDerivation)?,
        )?);

        let remote = RemotePeer::from_verify_key(recovered);
        let peer_id = remote.peer_id;
        self.remote_peer = Some(remote);
        self.secrets = Some(secrets);
        self.state = HandshakeState::Complete;

        if self.config.verbose_logging {
            tracing::info!(peer_id = %hex::encode(peer_id), "handshake complete");
        }

        Ok(peer_id)
    }

    async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_buf.put(bytes);
        self.write_buf.flush_to(&mut self.stream).await
    }

    /// Send an application-data record
    pub async fn write(&mut self, fragment: &[u8], context: u64) -> Result<()> {
        if self.state != HandshakeState::Complete {
            return Err(HandshakeError::HandshakeNotComplete.into());
        }
        let cipher = self
            .app_send
            .as_mut()
            .ok_or(HandshakeError::InvalidState)?;
        let record = cipher.seal(PacketType::ApplicationData, context, fragment)?;
        self.bytes_sent += record.len() as u64;
        self.write_buf.put(&record);
        self.write_buf.flush_to(&mut self.stream).await
    }

    /// Receive and decrypt one application-data record
    pub async fn read(&mut self) -> Result<DataPacket> {
        if self.state != HandshakeState::Complete {
            return Err(HandshakeError::HandshakeNotComplete.into());
        }
        let (header, ciphertext) = read_record(
            &mut self.stream,
            &mut self.read_buf,
            self.config.max_record_len,
        )
        .await?;
        self.bytes_received += (HEADER_LEN + ciphertext.len()) as u64;
        let cipher = self
            .app_recv
            .as_mut()
            .ok_or(HandshakeError::InvalidState)?;
        Ok(cipher.open(&header, &ciphertext)?)
    }

    /// The local peer ID
    pub fn local_peer_id(&self) -> PeerId {
        self.config.local_peer_id()
    }

    /// The responder's identity, once the handshake has completed
    pub fn remote_peer(&self) -> Option<&RemotePeer> {
        self.remote_peer.as_ref()
    }

    /// The responder's peer ID, once the handshake has completed
    pub fn remote_peer_id(&self) -> Option<PeerId> {
        self.remote_peer.as_ref().map(|p| p.peer_id)
    }

    /// Whether the handshake has completed successfully
    pub fn is_complete(&self) -> bool {
        self.state == HandshakeState::Complete
    }

    /// Channel-binding value: the transcript hash frozen at
    /// application-secret derivation
    pub fn session_transcript_hash(&self) -> Option<[u8; 32]> {
        self.secrets.as_ref().and_then(|s| s.transcript_hash())
    }

    /// Application bytes sent so far (records, including headers)
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Application bytes received so far (records, including headers)
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}
