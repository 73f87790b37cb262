//! Configuration for transport sessions

use std::time::Duration;

use crate::types::LocalIdentity;

/// Configuration shared by initiator and responder sessions
#[derive(Clone)]
pub struct ChannelConfig {
    /// Local identity for transcript signing
    pub identity: LocalIdentity,

    /// Pinned peer verification key (encoded ML-DSA-65 key bytes).
    ///
    /// When set, the recovered peer key must match it exactly or the
    /// handshake fails with `PublicKeyMismatch`. Initiators normally pin
    /// the responder they dialed; responders leave this unset and accept
    /// any validly self-certified peer.
    pub expected_peer: Option<Vec<u8>>,

    /// Handshake deadline
    pub handshake_timeout: Duration,

    /// Maximum size of a plaintext handshake message
    pub max_handshake_message_len: usize,

    /// Maximum size of a sealed record payload
    pub max_record_len: usize,

    /// Whether to log detailed handshake information
    pub verbose_logging: bool,
}

impl ChannelConfig {
    /// Create a new configuration with defaults
    pub fn new(identity: LocalIdentity) -> Self {
        Self {
            identity,
            expected_peer: None,
            handshake_timeout: Duration::from_secs(30),
            max_handshake_message_len: 16 * 1024,
            max_record_len: 16 * 1024 * 1024,
            verbose_logging: false,
        }
    }

    /// Create a development configuration (verbose, seed-derived identity)
    pub fn development(seed: &[u8]) -> Self {
        let mut config = Self::new(LocalIdentity::generate(seed));
        config.verbose_logging = true;
        config
    }

    /// Create a production configuration from seed material
    pub fn production(seed: &[u8]) -> Self {
        Self::new(LocalIdentity::generate(seed))
    }

    /// Pin the expected peer verification key
    pub fn with_expected_peer(mut self, verify_key: Vec<u8>) -> Self {
        self.expected_peer = Some(verify_key);
        self
    }

    /// Set the handshake timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enable verbose logging
    pub fn with_verbose_logging(mut self) -> Self {
        self.verbose_logging = true;
        self
    }

    /// Get the local peer ID
    pub fn local_peer_id(&self) -> crate::types::PeerId {
        self.identity.peer_id()
    }
}

/// Builder for [`ChannelConfig`]
pub struct ChannelConfigBuilder {
    identity: Option<LocalIdentity>,
    expected_peer: Option<Vec<u8>>,
    handshake_timeout: Duration,
    max_handshake_message_len: usize,
    max_record_len: usize,
    verbose_logging: bool,
}

impl Default for ChannelConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            identity: None,
            expected_peer: None,
            handshake_timeout: Duration::from_secs(30),
            max_handshake_message_len: 16 * 1024,
            max_record_len: 16 * 1024 * 1024,
            verbose_logging: false,
        }
    }

    /// Set the local identity
    pub fn identity(mut self, identity: LocalIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Pin the expected peer verification key
    pub fn expected_peer(mut self, verify_key: Vec<u8>) -> Self {
        self.expected_peer = Some(verify_key);
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set maximum handshake message size
    pub fn max_message_len(mut self, len: usize) -> Self {
        self.max_handshake_message_len = len;
        self
    }

    /// Set maximum record payload size
    pub fn max_record_len(mut self, len: usize) -> Self {
        self.max_record_len = len;
        self
    }

    /// Enable verbose logging
    pub fn verbose(mut self) -> Self {
        self.verbose_logging = true;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ChannelConfig, &'static str> {
        let identity = self.identity.ok_or("identity is required")?;

        Ok(ChannelConfig {
            identity,
            expected_peer: self.expected_peer,
            handshake_timeout: self.handshake_timeout,
            max_handshake_message_len: self.max_handshake_message_len,
            max_record_len: self.max_record_len,
            verbose_logging: self.verbose_logging,
        })
    }
}
