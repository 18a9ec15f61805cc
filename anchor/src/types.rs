//! Identifier and record types shared between the registry and its callers.

use crate::constants::ID_LEN;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// Defines a distinct 32-byte identifier type.
///
/// Identifiers render as `0x`-prefixed lowercase hex (the `bytes32` convention) and
/// accept hex with or without the prefix.
macro_rules! fixed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; ID_LEN]);

        impl $name {
            /// The all-zero identifier.
            pub const ZERO: Self = Self([0u8; ID_LEN]);

            pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; ID_LEN]
            }

            /// Keccak-256 of `data`.
            ///
            /// For a UTF-8 label this equals `ethers.id(label)`.
            pub fn digest(data: impl AsRef<[u8]>) -> Self {
                let hash = Keccak256::digest(data.as_ref());
                let mut bytes = [0u8; ID_LEN];
                bytes.copy_from_slice(&hash);
                Self(bytes)
            }

            pub fn from_hex(s: &str) -> Result<Self, IdParseError> {
                let trimmed = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                let raw = hex::decode(trimmed).map_err(|e| IdParseError::InvalidHex(e.to_string()))?;
                let bytes: [u8; ID_LEN] = raw
                    .as_slice()
                    .try_into()
                    .map_err(|_| IdParseError::InvalidLength { expected: ID_LEN, got: raw.len() })?;
                Ok(Self(bytes))
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; ID_LEN]> for $name {
            fn from(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_id!(
    /// Digest naming one attestation snapshot. Must be non-zero to be anchored.
    SnapshotId
);

fixed_id!(
    /// Identifier of the submitting user.
    UserId
);

fixed_id!(
    /// Identifier of the portfolio a snapshot describes.
    PortfolioId
);

/// What the registry knows about one snapshot.
///
/// An absent snapshot is represented by `exists == false` with zero user and portfolio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub exists: bool,
    pub user: UserId,
    pub portfolio: PortfolioId,
}

impl AnchorRecord {
    pub fn anchored(user: UserId, portfolio: PortfolioId) -> Self {
        Self {
            exists: true,
            user,
            portfolio,
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }
}
