//! TON Address implementation
//!
//! Standard internal addresses (workchain + 256-bit hash) in raw
//! `workchain:hex` form and in the 48-character user-friendly form
//! (tag, workchain, hash and CRC16-XMODEM, base64 or base64url).

use crate::crc::CRC16;
use crate::tvm::error::{Result, TvmError};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use std::fmt;
use std::hash::{Hash, Hasher};

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

/// Represents a TON blockchain address
///
/// Equality and hashing only consider the workchain and hash part; the
/// flags describe how the address was or should be printed.
#[derive(Debug, Clone)]
pub struct Address {
    /// Workchain ID (-1 for masterchain, 0 for basechain)
    pub workchain: i8,
    /// 32-byte hash part of the address
    pub hash_part: [u8; 32],
    /// Whether the address is bounceable
    pub is_bounceable: bool,
    /// Whether this is a test-only address
    pub is_test_only: bool,
}

impl Address {
    /// Creates a bounceable mainnet address
    pub fn new(workchain: i8, hash_part: [u8; 32]) -> Self {
        Self {
            workchain,
            hash_part,
            is_bounceable: true,
            is_test_only: false,
        }
    }

    /// Parses address from raw format: "workchain:hash"
    ///
    /// Raw addresses carry no flags, so the result is non-bounceable.
    pub fn from_raw(address: &str) -> Result<Self> {
        let (workchain, hash_hex) = address
            .split_once(':')
            .ok_or_else(|| TvmError::InvalidAddress(format!("{address:?} is not a raw address")))?;

        let workchain = workchain
            .parse::<i8>()
            .map_err(|e| TvmError::InvalidAddress(format!("bad workchain {workchain:?}: {e}")))?;

        if hash_hex.len() != 64 {
            return Err(TvmError::InvalidAddress(
                "hash part must be 64 hex characters".to_string(),
            ));
        }
        let mut hash_part = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash_part)?;

        Ok(Self {
            workchain,
            hash_part,
            is_bounceable: false,
            is_test_only: false,
        })
    }

    /// Parses address from base64 or base64url user-friendly format
    pub fn from_base64(address: &str) -> Result<Self> {
        let normalized = address.replace('-', "+").replace('_', "/");
        let decoded = STANDARD
            .decode(normalized)
            .map_err(|e| TvmError::InvalidAddress(format!("bad base64: {e}")))?;

        if decoded.len() != 36 {
            return Err(TvmError::InvalidAddress(format!(
                "user-friendly address must be 36 bytes, got {}",
                decoded.len()
            )));
        }

        let expected_crc = u16::from_be_bytes([decoded[34], decoded[35]]);
        let actual_crc = CRC16.checksum(&decoded[..34]);
        if expected_crc != actual_crc {
            return Err(TvmError::InvalidAddress(format!(
                "checksum mismatch: expected {expected_crc:04x}, got {actual_crc:04x}"
            )));
        }

        let tag = decoded[0];
        let is_test_only = tag & TAG_TEST_ONLY != 0;
        let is_bounceable = match tag & !TAG_TEST_ONLY {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            other => {
                return Err(TvmError::InvalidAddress(format!(
                    "unknown address tag {other:#04x}"
                )));
            }
        };

        let mut hash_part = [0u8; 32];
        hash_part.copy_from_slice(&decoded[2..34]);

        Ok(Self {
            workchain: decoded[1] as i8,
            hash_part,
            is_bounceable,
            is_test_only,
        })
    }

    /// Converts to raw format (workchain:hash)
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash_part))
    }

    /// Formats the user-friendly form with explicit flags
    pub fn to_friendly(&self, url_safe: bool, bounceable: bool, test_only: bool) -> String {
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if test_only {
            tag |= TAG_TEST_ONLY;
        }

        let mut data = Vec::with_capacity(36);
        data.push(tag);
        data.push(self.workchain as u8);
        data.extend_from_slice(&self.hash_part);
        let crc = CRC16.checksum(&data);
        data.extend_from_slice(&crc.to_be_bytes());

        if url_safe {
            URL_SAFE.encode(&data)
        } else {
            STANDARD.encode(&data)
        }
    }

    /// Converts to base64url using the address's own flags
    pub fn to_base64(&self) -> String {
        self.to_friendly(true, self.is_bounceable, self.is_test_only)
    }

    /// Sets the bounceable flag
    pub fn set_bounceable(&mut self, bounceable: bool) {
        self.is_bounceable = bounceable;
    }

    /// Sets the test-only flag
    pub fn set_test_only(&mut self, test_only: bool) {
        self.is_test_only = test_only;
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.workchain == other.workchain && self.hash_part == other.hash_part
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.workchain.hash(state);
        self.hash_part.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl std::str::FromStr for Address {
    type Err = TvmError;

    /// Accepts both the raw and the user-friendly forms
    fn from_str(s: &str) -> Result<Self> {
        if s.contains(':') {
            Self::from_raw(s)
        } else {
            Self::from_base64(s)
        }
    }
}
