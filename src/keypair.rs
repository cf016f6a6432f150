use crate::crypto::{generate_keys, CourierPrivateKey, CourierPublicKey};

/// The `Keypair` holds the node's (or a client's) Ed25519 identity. It is
/// generated fresh at startup and never persisted; the hex form of the
/// public key is the canonical identifier used in logs and peer lists.
#[derive(Clone)]
pub struct Keypair {
    publickey: CourierPublicKey,
    privatekey: CourierPrivateKey,
}

impl Keypair {
    pub fn new() -> Self {
        let (publickey, privatekey) = generate_keys();
        Keypair {
            publickey,
            privatekey,
        }
    }

    pub fn get_publickey(&self) -> CourierPublicKey {
        self.publickey
    }

    pub fn get_privatekey(&self) -> CourierPrivateKey {
        self.privatekey
    }

    pub fn get_publickey_hex(&self) -> String {
        hex::encode(self.publickey)
    }
}

impl Default for Keypair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{sign_blob, verify};

    #[test]
    fn test_keypair_identity() {
        let keypair = Keypair::new();
        assert_eq!(keypair.get_publickey_hex().len(), 64);

        let signature = sign_blob(b"challenge", &keypair.get_privatekey());
        assert!(verify(b"challenge", &signature, &keypair.get_publickey()));
    }
}
