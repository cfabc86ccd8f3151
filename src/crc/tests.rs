//! Tests for CRC module

use super::*;

#[test]
fn test_crc16_check_value() {
    assert_eq!(CRC16.checksum(b"123456789"), 0x31c3);
}

#[test]
fn test_crc16_empty_data() {
    assert_eq!(CRC16.checksum(b""), 0);
}

#[test]
fn test_crc16_address_payload() {
    let mut data = vec![0x11u8, 0x00];
    data.extend_from_slice(&[0u8; 32]);
    // EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c ends with cf 5c
    assert_eq!(CRC16.checksum(&data).to_be_bytes(), [0xcf, 0x5c]);
}

#[test]
fn test_crc16_digest_update() {
    let mut digest = CRC16.digest();
    digest.update(b"hello");
    digest.update(b" world");
    assert_eq!(digest.finalize(), CRC16.checksum(b"hello world"));
}

#[test]
fn test_crc16_order_matters() {
    assert_ne!(CRC16.checksum(b"abc"), CRC16.checksum(b"bca"));
}

#[test]
fn test_crc32c_check_value() {
    assert_eq!(CRC32C.checksum(b"123456789"), 0xe3069283);
}

#[test]
fn test_crc32c_empty_data() {
    assert_eq!(CRC32C.checksum(b""), 0);
}

#[test]
fn test_crc32c_boc_payload() {
    let boc = hex::decode("b5ee9c72410102010009000100010007000003 22".replace(' ', "")).unwrap();
    assert_eq!(CRC32C.checksum(&boc).to_le_bytes(), [0xf6, 0x86, 0x53, 0xe2]);
}

#[test]
fn test_crc32c_digest_update() {
    let mut digest = CRC32C.digest();
    digest.update(b"hello");
    digest.update(b" world");
    assert_eq!(digest.finalize(), CRC32C.checksum(b"hello world"));
}

#[test]
fn test_crc32c_pattern_data() {
    let short = [0xAAu8, 0x55, 0xAA, 0x55];
    let long = [0xAAu8, 0x55, 0xAA, 0x55, 0xAA, 0x55];
    assert_ne!(CRC32C.checksum(&short), CRC32C.checksum(&long));
}
