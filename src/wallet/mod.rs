//! Key material and payload signatures for clients that sign what they submit.
//!
//! The ledger itself never checks these; they travel inside the opaque payload.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use sha2::{Digest, Sha256};

/// Generate a new secp256k1 keypair and return (priv_hex, pub_hex_compressed, address_hex).
/// Address is simply the hex of the compressed public key.
pub fn generate_keypair_hex() -> (String, String, String) {
    let secp = Secp256k1::new();
    let (sk, pk) = secp.generate_keypair(&mut OsRng);
    let sk_hex = hex::encode(sk.secret_bytes());
    let pk_hex = hex::encode(pk.serialize()); // compressed (33 bytes)
    let address = pk_hex.clone();
    (sk_hex, pk_hex, address)
}

/// Double SHA-256, the digest that payload signatures commit to.
pub fn payload_digest(data: &[u8]) -> [u8; 32] {
    let once = Sha256::digest(data);
    Sha256::digest(once).into()
}

/// Sign `data` with a hex private key; returns a hex DER signature.
pub fn sign_payload(private_key_hex: &str, data: &[u8]) -> Result<String, &'static str> {
    let secp = Secp256k1::signing_only();

    let sk_bytes = hex::decode(private_key_hex).map_err(|_| "invalid private key hex")?;
    let sk = SecretKey::from_slice(&sk_bytes).map_err(|_| "invalid private key bytes")?;

    let msg = Message::from_digest_slice(&payload_digest(data)).map_err(|_| "invalid message length")?;
    let sig = secp.sign_ecdsa(&msg, &sk);
    Ok(hex::encode(sig.serialize_der().to_vec()))
}

/// Verify a hex DER signature over `data` against a hex public key.
pub fn verify_payload(public_key_hex: &str, sig_hex: &str, data: &[u8]) -> Result<bool, &'static str> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| "invalid signature hex")?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| "invalid DER signature")?;

    let pk_bytes = hex::decode(public_key_hex).map_err(|_| "invalid pubkey hex")?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| "invalid pubkey bytes")?;

    let msg = Message::from_digest_slice(&payload_digest(data)).map_err(|_| "invalid message length")?;
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify() {
        let (sk, pk, addr) = generate_keypair_hex();
        assert_eq!(pk, addr);
        assert_eq!(pk.len(), 66);

        let data = "飞鸽传输".as_bytes();
        let sig = sign_payload(&sk, data).unwrap();
        assert_eq!(verify_payload(&pk, &sig, data), Ok(true));
        assert_eq!(verify_payload(&pk, &sig, b"other"), Ok(false));
    }

    #[test]
    fn foreign_key_does_not_verify() {
        let (sk, _, _) = generate_keypair_hex();
        let (_, other_pk, _) = generate_keypair_hex();
        let sig = sign_payload(&sk, b"data").unwrap();
        assert_eq!(verify_payload(&other_pk, &sig, b"data"), Ok(false));
    }

    #[test]
    fn malformed_inputs() {
        assert!(sign_payload("zz", b"x").is_err());
        assert!(sign_payload(&"00".repeat(32), b"x").is_err());
        let (_, pk, _) = generate_keypair_hex();
        assert!(verify_payload(&pk, "abcd", b"x").is_err());
        assert!(verify_payload("02", "30", b"x").is_err());
    }
}
