use std::fmt;

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};

use crate::error::{LedgerError, Result};

/// A secp256k1 key pair. The address is the hex of the compressed public key.
///
/// The secret never leaves the holder: the ledger only borrows a `KeyPair`
/// for the duration of a signing call and never persists it.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut OsRng);
        Self { secret, public }
    }

    /// Rebuild a key pair from a hex-encoded 32-byte secret.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|_| LedgerError::InvalidKey("private key is not valid hex".into()))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|_| LedgerError::InvalidKey("private key is not a valid scalar".into()))?;
        let public = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret);
        Ok(Self { secret, public })
    }

    pub fn address(&self) -> String {
        hex::encode(self.public.serialize())
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.secret_bytes())
    }

    /// Sign a hex-encoded 32-byte digest; returns the hex DER signature.
    pub fn sign_digest_hex(&self, digest_hex: &str) -> Result<String> {
        let msg = digest_message(digest_hex).ok_or_else(|| {
            LedgerError::InvalidTransactionShape(format!("{digest_hex:?} is not a 32-byte hex digest"))
        })?;
        let sig = Secp256k1::signing_only().sign_ecdsa(&msg, &self.secret);
        Ok(hex::encode(sig.serialize_der().to_vec()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Normalize an address (hex public key, compressed or not) to the compressed form.
pub fn normalize_address(address_hex: &str) -> Result<String> {
    let bytes = hex::decode(address_hex.trim())
        .map_err(|_| LedgerError::InvalidKey("address is not valid hex".into()))?;
    let pk = PublicKey::from_slice(&bytes)
        .map_err(|_| LedgerError::InvalidKey("address is not a curve point".into()))?;
    Ok(hex::encode(pk.serialize()))
}

/// Verify a hex DER signature over a hex digest against the public key
/// encoded in `address_hex`. Any malformed piece yields `false`.
pub fn verify_signature(address_hex: &str, digest_hex: &str, sig_hex: &str) -> bool {
    let Some(msg) = digest_message(digest_hex) else {
        return false;
    };
    let Ok(pk_bytes) = hex::decode(address_hex) else {
        return false;
    };
    let Ok(pk) = PublicKey::from_slice(&pk_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(sig) = Signature::from_der(&sig_bytes) else {
        return false;
    };
    Secp256k1::verification_only()
        .verify_ecdsa(&msg, &sig, &pk)
        .is_ok()
}

fn digest_message(digest_hex: &str) -> Option<Message> {
    let bytes = hex::decode(digest_hex).ok()?;
    Message::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256_hex;

    #[test]
    fn sign_then_verify() {
        let kp = KeyPair::generate();
        let digest = sha256_hex(b"payload");
        let sig = kp.sign_digest_hex(&digest).unwrap();
        assert!(verify_signature(&kp.address(), &digest, &sig));
    }

    #[test]
    fn other_key_rejected() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let digest = sha256_hex(b"payload");
        let sig = kp.sign_digest_hex(&digest).unwrap();
        assert!(!verify_signature(&other.address(), &digest, &sig));
    }

    #[test]
    fn altered_digest_rejected() {
        let kp = KeyPair::generate();
        let digest = sha256_hex(b"payload");
        let sig = kp.sign_digest_hex(&digest).unwrap();
        assert!(!verify_signature(&kp.address(), &sha256_hex(b"payload2"), &sig));
    }

    #[test]
    fn malformed_inputs_are_false_not_errors() {
        let kp = KeyPair::generate();
        let digest = sha256_hex(b"payload");
        let sig = kp.sign_digest_hex(&digest).unwrap();
        assert!(!verify_signature("zz", &digest, &sig));
        assert!(!verify_signature(&format!("05{}", "11".repeat(32)), &digest, &sig));
        assert!(!verify_signature(&kp.address(), "abcd", &sig));
        assert!(!verify_signature(&kp.address(), &digest, "not-hex"));
        assert!(!verify_signature(&kp.address(), &digest, ""));
    }

    #[test]
    fn secret_hex_round_trips_to_same_address() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_secret_hex(&kp.secret_hex()).unwrap();
        assert_eq!(kp.address(), restored.address());
        assert!(KeyPair::from_secret_hex("00").is_err());
        assert!(KeyPair::from_secret_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn normalize_accepts_compressed_address() {
        let kp = KeyPair::generate();
        assert_eq!(normalize_address(&kp.address()).unwrap(), kp.address());
        assert!(normalize_address("1234").is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let kp = KeyPair::generate();
        let dbg = format!("{kp:?}");
        assert!(!dbg.contains(&kp.secret_hex()));
    }
}
