use sha2::{Digest, Sha256};

/// Length of the display prefix kept alongside the hash.
const PREFIX_LEN: usize = 12;

/// Generate a new ingestion key.
///
/// Returns (raw_key, hash, prefix).
/// Raw key format: `tok_` + 32 random lowercase hex chars.
pub fn generate_api_key() -> (String, String, String) {
    use rand::RngCore;
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    let raw_key = format!("tok_{}", hex::encode(buf));
    let hash = hash_api_key(&raw_key);
    let prefix = raw_key.chars().take(PREFIX_LEN).collect();
    (raw_key, hash, prefix)
}

/// SHA-256 of the raw key, lowercase hex. The only form ever stored.
pub fn hash_api_key(raw_key: &str) -> String {
    hex::encode(Sha256::digest(raw_key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_shape() {
        let (raw, hash, prefix) = generate_api_key();
        assert_eq!(raw.len(), 36);
        assert!(raw.starts_with("tok_"));
        assert!(raw[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash, hash_api_key(&raw));
        assert_eq!(hash.len(), 64);
        assert!(raw.starts_with(&prefix));
        assert_eq!(prefix.len(), 12);
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
