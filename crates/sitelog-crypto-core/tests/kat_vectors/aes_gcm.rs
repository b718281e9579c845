//! NIST SP 800-38D: AES-128-GCM Known-Answer Test vectors.
//!
//! Verifies that `decrypt()` accepts ciphertexts produced by an independent
//! AES-GCM implementation, i.e. that the `ciphertext || tag` layout we put
//! into backup files is the standard one.

use sitelog_crypto_core::symmetric::{decrypt, SealedData, KEY_LEN_128, NONCE_LEN};

/// NIST Test Case 1: empty plaintext, only a tag.
///
/// Key:     0000...0000 (16 bytes)
/// IV:      0000...0000 (12 bytes)
/// Tag:     58e2fccefa7e3061367f1d57a4e7455a
#[test]
fn nist_test_case_1_aes128_gcm_empty() {
    let tag: [u8; 16] = [
        0x58, 0xe2, 0xfc, 0xce, 0xfa, 0x7e, 0x30, 0x61, 0x36, 0x7f, 0x1d, 0x57, 0xa4, 0xe7, 0x45,
        0x5a,
    ];
    let sealed = SealedData::from_parts(&[0u8; NONCE_LEN], &tag).expect("parts");

    let plain = decrypt(&sealed, &[0u8; KEY_LEN_128], &[]).expect("KAT should decrypt");
    assert!(plain.is_empty());
}

/// NIST Test Case 2: one zero block.
///
/// CT:      0388dace60b6a392f328c2b971b2fe78
/// Tag:     ab6e47d42cec13bdf53a67b21257bddf
#[test]
fn nist_test_case_2_aes128_gcm_one_block() {
    let ct_tag: [u8; 32] = [
        0x03, 0x88, 0xda, 0xce, 0x60, 0xb6, 0xa3, 0x92, 0xf3, 0x28, 0xc2, 0xb9, 0x71, 0xb2, 0xfe,
        0x78, 0xab, 0x6e, 0x47, 0xd4, 0x2c, 0xec, 0x13, 0xbd, 0xf5, 0x3a, 0x67, 0xb2, 0x12, 0x57,
        0xbd, 0xdf,
    ];
    let sealed = SealedData::from_parts(&[0u8; NONCE_LEN], &ct_tag).expect("parts");

    let plain = decrypt(&sealed, &[0u8; KEY_LEN_128], &[]).expect("KAT should decrypt");
    assert_eq!(plain.as_slice(), &[0u8; 16]);
}

#[test]
fn nist_test_case_2_rejects_flipped_tag_bit() {
    let mut ct_tag: [u8; 32] = [
        0x03, 0x88, 0xda, 0xce, 0x60, 0xb6, 0xa3, 0x92, 0xf3, 0x28, 0xc2, 0xb9, 0x71, 0xb2, 0xfe,
        0x78, 0xab, 0x6e, 0x47, 0xd4, 0x2c, 0xec, 0x13, 0xbd, 0xf5, 0x3a, 0x67, 0xb2, 0x12, 0x57,
        0xbd, 0xdf,
    ];
    ct_tag[31] ^= 0x01;
    let sealed = SealedData::from_parts(&[0u8; NONCE_LEN], &ct_tag).expect("parts");

    assert!(decrypt(&sealed, &[0u8; KEY_LEN_128], &[]).is_err());
}
