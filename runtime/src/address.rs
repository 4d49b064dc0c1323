use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Length in bytes of every address in this system (spec §3: "A 20-byte identifier").
pub const ADDRESS_LENGTH: usize = 20;

/// A 20-byte account or contract identifier.
///
/// Mirrors the teacher's `fvm_shared::address::Address` in spirit (a fixed
/// byte identifier with hex `Display`/`FromStr`), simplified to the single
/// protocol this system uses: `low-20(BLAKE2b-256(pubkey))` or
/// `low-20(BLAKE2b-512(deployer || seed))` for contracts (spec §3, §6).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const NIL: Address = Address([0u8; ADDRESS_LENGTH]);

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut a = [0u8; ADDRESS_LENGTH];
        if bytes.len() >= ADDRESS_LENGTH {
            a.copy_from_slice(&bytes[bytes.len() - ADDRESS_LENGTH..]);
        } else {
            a[ADDRESS_LENGTH - bytes.len()..].copy_from_slice(bytes);
        }
        Address(a)
    }

    pub fn is_nil(&self) -> bool {
        *self == Address::NIL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::NIL
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseAddressError;

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid address string")
    }
}

impl std::error::Error for ParseAddressError {}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != ADDRESS_LENGTH * 2 {
            return Err(ParseAddressError);
        }
        let mut out = [0u8; ADDRESS_LENGTH];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| ParseAddressError)?;
        }
        Ok(Address(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_all_zero() {
        assert!(Address::NIL.is_nil());
        assert_eq!(Address::NIL.as_bytes(), &[0u8; ADDRESS_LENGTH]);
    }

    #[test]
    fn round_trips_through_display_and_from_str() {
        let a = Address::from_bytes(&[1u8; 20]);
        let s = a.to_string();
        let b: Address = s.parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn from_bytes_truncates_long_input_to_low_20() {
        let long = [0xffu8; 64];
        let a = Address::from_bytes(&long);
        assert_eq!(a.as_bytes(), &[0xffu8; 20]);
    }
}
