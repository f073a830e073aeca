//! Fixed-width identifiers
//!
//! Addresses are 20 bytes, program and business identifiers are 32 bytes.
//! All of them render as lowercase hex, which is also the encoding used in
//! event attributes and storage keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Byte width of this identifier
            pub const LEN: usize = $len;

            /// The all-zero value, used as "unset"
            pub const fn zero() -> Self {
                $name([0u8; $len])
            }

            /// Whether every byte is zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Build from a byte slice of exactly the right length
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                if bytes.len() != $len {
                    return None;
                }
                let mut arr = [0u8; $len];
                arr.copy_from_slice(bytes);
                Some($name(arr))
            }

            /// Parse from a hex string (optional `0x` prefix)
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let trimmed = s.trim().trim_start_matches("0x");
                let bytes = hex::decode(trimmed)?;
                Self::from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
            }

            /// Convert to hex string
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Get as bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::zero()
            }
        }

        // Hex in human-readable formats (JSON config), raw bytes in bincode.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    Self::from_hex(&s).map_err(serde::de::Error::custom)
                } else {
                    let bytes = <[u8; $len]>::deserialize(deserializer)?;
                    Ok($name(bytes))
                }
            }
        }
    };
}

fixed_bytes!(
    /// 20-byte account address
    Address,
    20
);

fixed_bytes!(
    /// Loyalty program identifier
    ProgramId,
    32
);

fixed_bytes!(
    /// Business identifier; the low 8 bytes carry the registration counter
    BusinessId,
    32
);

impl ProgramId {
    /// Derive a program id from its owner and a free-form label using BLAKE3
    pub fn derive(owner: &Address, label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"loyalty/program-id");
        hasher.update(&owner.0);
        hasher.update(label.as_bytes());
        ProgramId(*hasher.finalize().as_bytes())
    }
}

impl BusinessId {
    /// Encode a registration counter big-endian into the low bytes
    pub fn from_counter(counter: u64) -> Self {
        let mut id = [0u8; 32];
        id[24..].copy_from_slice(&counter.to_be_bytes());
        BusinessId(id)
    }

    /// Recover the registration counter
    pub fn counter(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.0[24..]);
        u64::from_be_bytes(bytes)
    }
}
