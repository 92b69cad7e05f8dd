//! Signature verification for submitted actions.
//!
//! Every [`SignedAction`] carries an Ed25519 signature over its canonical
//! encoding. The canonical message is the compact JSON object
//!
//! ```text
//! {"worldId":..,"action":..,"params":[..],"nonce":..,"timestamp":..}
//! ```
//!
//! with keys in exactly that order. The order is part of the signed
//! contract: reordering the fields invalidates every existing signature.
//!
//! The signed bytes are the SHA-256 digest of the message behind a
//! personal-message prefix ([`SIGNED_ACTION_PREFIX`] followed by the decimal
//! byte length of the message), so an action signature can never be
//! presented as a signature over any other kind of payload.
//!
//! The agent address is the signer's verifying key. Verification therefore
//! succeeds exactly when the signature checks out under the key the action
//! claims as its author.

use core::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tickworld_types::{AgentAddress, ParamValue, SignedAction, WorldId};

/// Prefix mixed into every signed action digest.
pub const SIGNED_ACTION_PREFIX: &str = "\x19Tickworld Signed Action:\n";

/// Length in bytes of an encoded signature.
const SIGNATURE_LEN: usize = 64;

/// Errors raised while producing signatures.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// A secret key was not 32 bytes of valid hex.
    #[error("invalid secret key: {0}")]
    InvalidSecret(String),

    /// The canonical message could not be encoded.
    #[error("failed to encode canonical message: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalAction<'a> {
    world_id: &'a WorldId,
    action: &'a str,
    params: &'a [ParamValue],
    nonce: u64,
    timestamp: i64,
}

/// Encode the signed fields of an action as its canonical message.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if the parameters cannot be encoded.
pub fn canonical_message(
    world_id: &WorldId,
    action_name: &str,
    params: &[ParamValue],
    nonce: u64,
    timestamp: i64,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&CanonicalAction {
        world_id,
        action: action_name,
        params,
        nonce,
        timestamp,
    })
}

/// Digest of a canonical message behind the personal-message prefix.
pub fn signing_digest(message: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(SIGNED_ACTION_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

fn action_digest(action: &SignedAction) -> Result<[u8; 32], serde_json::Error> {
    let message = canonical_message(
        &action.world_id,
        &action.action_name,
        &action.params,
        action.nonce,
        action.timestamp,
    )?;
    Ok(signing_digest(&message))
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Stateless check that an action was authored by the address it claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Return `true` iff `action.signature` is a valid signature by
    /// `action.agent_address` over the action's canonical message.
    ///
    /// Malformed signatures, undecodable keys, and encoding failures all
    /// yield `false`.
    pub fn verify(action: &SignedAction) -> bool {
        let Some(signature) = decode_signature(&action.signature) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(action.agent_address.as_bytes()) else {
            return false;
        };
        let Ok(digest) = action_digest(action) else {
            return false;
        };
        key.verify_strict(&digest, &signature).is_ok()
    }
}

fn decode_signature(text: &str) -> Option<Signature> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let bytes: [u8; SIGNATURE_LEN] = hex::decode(digits).ok()?.try_into().ok()?;
    Some(Signature::from_bytes(&bytes))
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Holds an agent's secret key and signs actions on its behalf.
#[derive(Clone)]
pub struct ActionSigner {
    signing_key: SigningKey,
    address: AgentAddress,
}

impl ActionSigner {
    /// Build a signer from 32 secret key bytes.
    pub fn from_secret(secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let address = AgentAddress::from_bytes(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Build a signer from a hex-encoded secret key, with or without `0x`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidSecret`] if the text is not exactly
    /// 32 bytes of hex.
    pub fn from_hex(secret_hex: &str) -> Result<Self, SignatureError> {
        let digits = secret_hex.strip_prefix("0x").unwrap_or(secret_hex);
        let bytes = hex::decode(digits).map_err(|e| SignatureError::InvalidSecret(e.to_string()))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|rejected: Vec<u8>| {
            SignatureError::InvalidSecret(format!("expected 32 bytes, got {}", rejected.len()))
        })?;
        Ok(Self::from_secret(secret))
    }

    /// The address this signer signs as.
    pub const fn address(&self) -> AgentAddress {
        self.address
    }

    /// Hex encoding of the secret key, for persisting a generated identity.
    pub fn secret_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.to_bytes()))
    }

    /// Produce a signed action with the given fields.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Encoding`] if the canonical message cannot
    /// be encoded.
    pub fn sign(
        &self,
        world_id: WorldId,
        action_name: impl Into<String>,
        params: Vec<ParamValue>,
        nonce: u64,
        timestamp: i64,
    ) -> Result<SignedAction, SignatureError> {
        let mut action = SignedAction {
            world_id,
            agent_address: self.address,
            action_name: action_name.into(),
            params,
            nonce,
            timestamp,
            signature: String::new(),
        };
        let digest = action_digest(&action)?;
        let signature = self.signing_key.sign(&digest);
        action.signature = format!("0x{}", hex::encode(signature.to_bytes()));
        Ok(action)
    }
}

impl fmt::Debug for ActionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
