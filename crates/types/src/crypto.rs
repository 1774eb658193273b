//! Keypairs, signatures, and node addresses.
//!
//! Thin wrappers around Ed25519 so the rest of the node never touches
//! `ed25519-dalek` types directly. Addresses are the hex-encoded public key.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node or account address: the hex-encoded Ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap an already-encoded address string.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&VerifyingKey> for Address {
    fn from(key: &VerifyingKey) -> Self {
        Self(hex::encode(key.as_bytes()))
    }
}

/// Errors from signature verification.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    Invalid,
    #[error("malformed signature encoding")]
    Malformed,
    #[error("malformed public key")]
    BadKey,
}

/// An Ed25519 signature, hex-encoded when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// The empty (unsigned) signature.
    pub fn zero() -> Self {
        Self(String::new())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    fn to_dalek(&self) -> Result<ed25519_dalek::Signature, SignatureError> {
        let bytes = hex::decode(&self.0).map_err(|_| SignatureError::Malformed)?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| SignatureError::Malformed)?;
        Ok(ed25519_dalek::Signature::from_bytes(&bytes))
    }
}

/// An Ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Decode from a hex-encoded address.
    pub fn from_address(addr: &Address) -> Result<Self, SignatureError> {
        let bytes = hex::decode(addr.as_str()).map_err(|_| SignatureError::BadKey)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| SignatureError::BadKey)?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| SignatureError::BadKey)
    }

    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        let sig = signature.to_dalek()?;
        self.0
            .verify(message, &sig)
            .map_err(|_| SignatureError::Invalid)
    }
}

/// An Ed25519 signing keypair.
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing: SigningKey::generate(&mut rng),
        }
    }

    /// Derive a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key())
    }

    /// The address derived from the public key.
    pub fn address(&self) -> Address {
        Address::from(&self.signing.verifying_key())
    }

    /// Sign `message`.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(hex::encode(self.signing.sign(message).to_bytes()))
    }
}

// Manual Debug - never print key material.
impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
