use anyhow::{Context, Result};
use k256::SecretKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};

/// Derive the compressed secp256k1 public key for a forging passphrase.
///
/// The private key is the SHA-256 of the passphrase.
pub fn public_key_from_secret(secret: &str) -> Result<String> {
    let digest = Sha256::digest(secret.as_bytes());
    let key = SecretKey::from_slice(&digest).context("Passphrase does not map to a valid key")?;
    Ok(hex::encode(key.public_key().to_encoded_point(true).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_passphrase() {
        assert_eq!(
            public_key_from_secret("this is a top secret passphrase").unwrap(),
            "034151a3ec46b5670a682b0a63394f863587d1bc97483b1b6c70eb58e7f0aed192"
        );
    }

    #[test]
    fn test_public_key_is_compressed() {
        let key = public_key_from_secret("another passphrase").unwrap();
        assert_eq!(key.len(), 66);
        assert!(key.starts_with("02") || key.starts_with("03"));
    }

    #[test]
    fn test_distinct_secrets_give_distinct_keys() {
        assert_ne!(
            public_key_from_secret("alpha").unwrap(),
            public_key_from_secret("beta").unwrap()
        );
    }
}
