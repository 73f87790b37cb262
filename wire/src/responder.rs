//! Handshake responder (the accepting side)

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use zeroize::Zeroizing;

use crypto::ml_dsa;
use crypto::ml_kem::MlKemPublicKey;
use crypto::traits::KemPublicKey;

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

/// Responder-side handshake session, the mirror image of
/// [`crate::Initiator`].
///
/// The responder accepts any validly self-certified initiator key (the
/// open-peer model) unless a peer key is pinned in the configuration; the
/// recovered key is kept for the caller to inspect after the handshake.
pub struct Responder<S> {
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

impl<S> Responder<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new responder session over an accepted stream
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
    /// Returns the initiator's peer ID (derived from the key recovered
    /// out of its ClientVerify signature) on success.
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
        // ClientHello: encapsulate against the initiator's ephemeral key.
        let client_hello: ClientHello = codec::read_message(
            &mut self.stream,
            &mut self.read_buf,
            self.config.max_handshake_message_len,
        )
        .await?;
        self.transcript
            .update(&codec::serialize_deterministic(&client_hello, 0)?);
        self.state = HandshakeState::HelloReceived;

        if self.config.verbose_logging {
            tracing::debug!(version = client_hello.version, "received ClientHello");
        }

        let client_kem_key = MlKemPublicKey::from_bytes(&client_hello.kem_public_key)?;
        let mut encap_seed = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut *encap_seed);
        let (ciphertext, shared) = client_kem_key.encapsulate(&*encap_seed)?;

        let mut nonce = [0u8; HELLO_NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let server_hello = ServerHello {
            kem_ciphertext: ciphertext.to_bytes().to_vec(),
            nonce,
            version: PROTOCOL_VERSION,
        };
        let frame = codec::serialize(&server_hello)?;
        self.send_bytes(&frame).await?;
        self.transcript
            .update(&codec::serialize_deterministic(&server_hello, 0)?);
        self.state = HandshakeState::HelloSent;

        if self.config.verbose_logging {
            tracing::debug!("sent ServerHello");
        }

        // Handshake secrets from the Hello transcript.
        let th_hellos = self.transcript.hash();
        let mut secrets = SessionSecret::derive_handshake(&th_hellos, shared.as_bytes())?;
        let mut hs_send = RecordCipher::new(&secrets.server_handshake)?;
        let mut hs_recv = RecordCipher::new(&secrets.client_handshake)?;
        self.state = HandshakeState::SecretsDerived;

        // ServerVerify: sign the Hello transcript and send it through the
        // handshake record layer.
        let sealed = self.config.identity.signing_key.sign_recoverable(&th_hellos);
        let server_verify = VerifyMessage::new(sealed);
        let plaintext = codec::serialize(&server_verify)?;
        let record = hs_send.seal(PacketType::Handshake, 0, &plaintext)?;
        self.send_bytes(&record).await?;
        self.transcript
            .update(&codec::serialize_deterministic(&server_verify, 0)?);

        if self.config.verbose_logging {
            tracing::debug!("sent ServerVerify");
        }

        // ClientVerify: recover the initiator's self-certified key over
        // the extended transcript. No pinned expectation by default —
        // any validly self-signed peer is accepted.
        let th_server_verify = self.transcript.hash();
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
        let client_verify: VerifyMessage = codec::decode_framed(&packet.fragment)?;
        let sealed = client_verify
            .signature_bytes()
            .ok_or(HandshakeError::SignatureVerificationFailed)?;
        let recovered = ml_dsa::recover_verify_key(&th_server_verify, sealed)
            .map_err(|_| HandshakeError::SignatureVerificationFailed)?;

        if let Some(pinned) = &self.config.expected_peer {
            use crypto::traits::VerifyKey;
            if pinned.as_slice() != recovered.to_bytes().as_slice() {
                return Err(HandshakeError::PublicKeyMismatch.into());
            }
        }

        self.transcript
            .update(&codec::serialize_deterministic(&client_verify, 0)?);
        self.state = HandshakeState::VerifyExchanged;

        if self.config.verbose_logging {
            tracing::debug!("verified ClientVerify");
        }

        // Application secrets from the full transcript.
        let th_final = self.transcript.hash();
        secrets.derive_application(&th_final)?;
        self.app_send = Some(RecordCipher::new(
            secrets
                .server_application
                .as_ref()
                .ok_or(HandshakeError::KeyDerivation)?,
        )?);
        self.app_recv = Some(RecordCipher::new(
            secrets
                .client_application
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

    /// The initiator's identity, recovered during the handshake
    pub fn remote_peer(&self) -> Option<&RemotePeer> {
        self.remote_peer.as_ref()
    }

    /// The initiator's peer ID, once the handshake has completed
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
