//! FIPS 180-4 SHA-256 vectors and the backup key derivation built on it.

use sitelog_crypto_core::kdf::{derive_backup_key, sha256_hex};

#[test]
fn fips_two_block_message() {
    assert_eq!(
        sha256_hex(b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq"),
        "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1"
    );
}

#[test]
fn backup_key_matches_truncated_digest() {
    let app_id = "com.example.constructionlog";
    let expected = sha256_hex(format!("{app_id}:construction-log-backup").as_bytes());

    let key = derive_backup_key(app_id);
    let key_hex: String = key.expose().iter().map(|b| format!("{b:02x}")).collect();

    assert_eq!(key_hex, expected[..32]);
}
