//! Address derivation and recoverable-ECDSA signing.
//!
//! Grounded on `ChainSafe-forest/crypto/src/signature.rs`'s secp256k1 path
//! (`ecrecover`, blake2b-256 message hashing, 65-byte `r||s||v` signatures)
//! and on `original_source/utils/key.go`, which defines the exact byte
//! layout this engine's addresses and signatures use.

use blake2b_simd::Params;
use libsecp256k1::{Message, PublicKey, RecoveryId, SecretKey, Signature as EcdsaSignature};
use thiserror::Error;

use memoriae_runtime::Address;

/// Length in bytes of a recoverable secp256k1 signature (`r || s || v`).
pub const SIGNATURE_LENGTH: usize = 65;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid signature length: got {0}, want {SIGNATURE_LENGTH}")]
    BadLength(usize),
    #[error("invalid recovery id byte: {0}")]
    BadRecoveryId(u8),
    #[error("malformed signature bytes")]
    MalformedSignature,
    #[error("malformed public key recovered from signature")]
    MalformedPublicKey,
}

fn blake2b256(data: &[u8]) -> [u8; 32] {
    let hash = Params::new().hash_length(32).to_state().update(data).finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

fn blake2b512(data: &[u8]) -> [u8; 64] {
    let hash = Params::new().hash_length(64).to_state().update(data).finalize();
    let mut out = [0u8; 64];
    out.copy_from_slice(hash.as_bytes());
    out
}

/// Derives an account address from an uncompressed secp256k1 public key
/// (65 bytes, leading `0x04` tag included or already stripped).
///
/// `low-20(BLAKE2b-256(pub_key_xy))` where `pub_key_xy` is the 64-byte
/// coordinate pair (spec §6).
pub fn address_from_pubkey(pubkey: &[u8]) -> Address {
    let xy = if pubkey.len() == 65 { &pubkey[1..] } else { pubkey };
    Address::from_bytes(&blake2b256(xy))
}

/// Derives a contract address from a deployer address and an ASCII seed.
///
/// `address-derive(BLAKE2b-512(deployer || seed))` (spec §6): the 64-byte
/// digest is itself hashed with BLAKE2b-256 before truncating to the low 20
/// bytes, the same `address-derive` step an account address goes through.
pub fn contract_address(deployer: &Address, seed: &[u8]) -> Address {
    let mut buf = Vec::with_capacity(20 + seed.len());
    buf.extend_from_slice(deployer.as_bytes());
    buf.extend_from_slice(seed);
    Address::from_bytes(&blake2b256(&blake2b512(&buf)))
}

/// Hashes a per-caller nonce the same way the dispatcher's signed messages
/// do: `BLAKE2b-256(uint64_le(nonce))` (spec §4.5).
pub fn nonce_message(nonce: u64) -> [u8; 32] {
    blake2b256(&nonce.to_le_bytes())
}

/// Signs a 32-byte message digest, returning a 65-byte `r || s || v` signature.
pub fn sign(secret_key: &SecretKey, digest: &[u8; 32]) -> [u8; SIGNATURE_LENGTH] {
    let message = Message::parse(digest);
    let (sig, recovery_id) = libsecp256k1::sign(&message, secret_key);
    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..64].copy_from_slice(&sig.serialize());
    out[64] = recovery_id.serialize();
    out
}

/// Recovers the address that produced `signature` over `digest`.
pub fn recover_address(
    digest: &[u8; 32],
    signature: &[u8; SIGNATURE_LENGTH],
) -> Result<Address, CryptoError> {
    let recovery_id = RecoveryId::parse(signature[64]).map_err(|_| CryptoError::BadRecoveryId(signature[64]))?;
    let message = Message::parse(digest);

    let mut rs = [0u8; 64];
    rs.copy_from_slice(&signature[..64]);
    let sig = EcdsaSignature::parse_standard(&rs).map_err(|_| CryptoError::MalformedSignature)?;

    let pubkey: PublicKey =
        libsecp256k1::recover(&message, &sig, &recovery_id).map_err(|_| CryptoError::MalformedPublicKey)?;

    Ok(address_from_pubkey(&pubkey.serialize()))
}

/// Verifies that `signature` over `digest` recovers to `expected`.
pub fn verify(
    digest: &[u8; 32],
    signature: &[u8],
    expected: &Address,
) -> Result<bool, CryptoError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::BadLength(signature.len()));
    }
    let mut buf = [0u8; SIGNATURE_LENGTH];
    buf.copy_from_slice(signature);
    let recovered = recover_address(digest, &buf)?;
    Ok(recovered == *expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn keypair(seed: u64) -> (SecretKey, PublicKey) {
        let mut rng = StdRng::seed_from_u64(seed);
        let sk = SecretKey::random(&mut rng);
        let pk = PublicKey::from_secret_key(&sk);
        (sk, pk)
    }

    #[test]
    fn sign_and_recover_round_trips() {
        let (sk, pk) = keypair(1);
        let addr = address_from_pubkey(&pk.serialize());

        let digest = nonce_message(42);
        let sig = sign(&sk, &digest);

        assert_eq!(recover_address(&digest, &sig).unwrap(), addr);
        assert!(verify(&digest, &sig, &addr).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_address() {
        let (sk, _) = keypair(2);
        let (_, other_pk) = keypair(3);
        let other_addr = address_from_pubkey(&other_pk.serialize());

        let digest = nonce_message(7);
        let sig = sign(&sk, &digest);

        assert!(!verify(&digest, &sig, &other_addr).unwrap());
    }

    #[test]
    fn verify_rejects_bad_length() {
        let digest = nonce_message(1);
        let err = verify(&digest, &[0u8; 10], &Address::NIL).unwrap_err();
        assert_eq!(err, CryptoError::BadLength(10));
    }

    #[test]
    fn contract_address_is_deterministic_and_distinct_per_seed() {
        let deployer = Address::from_bytes(&[9u8; 20]);
        let a = contract_address(&deployer, b"PledgePool");
        let b = contract_address(&deployer, b"RoleMgr");
        assert_ne!(a, b);
        assert_eq!(a, contract_address(&deployer, b"PledgePool"));
    }

    #[test]
    fn address_from_pubkey_handles_tagged_and_untagged_keys() {
        let (_, pk) = keypair(5);
        let tagged = pk.serialize();
        let untagged = &tagged[1..];
        assert_eq!(address_from_pubkey(&tagged), address_from_pubkey(untagged));
    }
}
