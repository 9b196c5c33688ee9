pub mod hash;
pub mod keys;

pub use hash::{sha256_digest, sha256_hex};
pub use keys::{KeyPair, normalize_address, verify_signature};
