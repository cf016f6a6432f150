use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

pub type CourierPublicKey = [u8; PUBLIC_KEY_SIZE];
pub type CourierPrivateKey = [u8; 32];
pub type CourierSignature = [u8; SIGNATURE_SIZE];
pub type CourierHash = [u8; 32];

/// Generate a fresh Ed25519 keypair. The private half is the raw 32-byte
/// seed; everything that signs reconstructs the `SigningKey` from it.
pub fn generate_keys() -> (CourierPublicKey, CourierPrivateKey) {
    let mut secret: CourierPrivateKey = [0; 32];
    OsRng.fill_bytes(&mut secret);
    let signing_key = SigningKey::from_bytes(&secret);
    (signing_key.verifying_key().to_bytes(), secret)
}

pub fn sign_blob(data: &[u8], privatekey: &CourierPrivateKey) -> CourierSignature {
    SigningKey::from_bytes(privatekey).sign(data).to_bytes()
}

/// Verify `signature` over `data` against `publickey`. A byte string that is
/// not a valid curve point simply fails verification.
pub fn verify(data: &[u8], signature: &CourierSignature, publickey: &CourierPublicKey) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(publickey) {
        Ok(key) => key,
        Err(_) => return false,
    };
    verifying_key
        .verify(data, &Signature::from_bytes(signature))
        .is_ok()
}

pub fn hash(data: &[u8]) -> CourierHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let (publickey, privatekey) = generate_keys();
        let signature = sign_blob(b"some data", &privatekey);
        assert!(verify(b"some data", &signature, &publickey));
        assert!(!verify(b"other data", &signature, &publickey));
    }

    #[test]
    fn test_verify_rejects_garbage_key() {
        let (_, privatekey) = generate_keys();
        let signature = sign_blob(b"some data", &privatekey);
        // not every 32-byte string decodes to a curve point
        let bogus: CourierPublicKey = [0xFF; 32];
        assert!(!verify(b"some data", &signature, &bogus));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash(b"abc"), hash(b"abc"));
        assert_ne!(hash(b"abc"), hash(b"abd"));
    }
}
