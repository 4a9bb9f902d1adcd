//! Minimal DER helpers for P-256 keys and ECDSA signatures.

/// DER header of a P-256 SubjectPublicKeyInfo up to (and including) the
/// BIT STRING's unused-bits byte.
pub const P256_SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];
pub const P256_SPKI_LEN: usize = 91;

/// Build a P-256 SubjectPublicKeyInfo from affine coordinates.
pub fn p256_spki(x: &[u8; 32], y: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(P256_SPKI_LEN);
    out.extend_from_slice(&P256_SPKI_PREFIX);
    out.push(0x04);
    out.extend_from_slice(x);
    out.extend_from_slice(y);
    out
}

/// Extract (x, y) from a P-256 SubjectPublicKeyInfo.
/// Anything other than the exact 91-byte uncompressed form is rejected.
pub fn p256_spki_coords(der: &[u8]) -> Option<([u8; 32], [u8; 32])> {
    if der.len() != P256_SPKI_LEN || der[..26] != P256_SPKI_PREFIX || der[26] != 0x04 {
        return None;
    }
    let x: [u8; 32] = der[27..59].try_into().ok()?;
    let y: [u8; 32] = der[59..91].try_into().ok()?;
    Some((x, y))
}

/// DER-encode a raw 64-byte P-256 ECDSA signature (r || s).
pub fn encode_der_ecdsa(raw: &[u8; 64]) -> Vec<u8> {
    let r_der = der_integer(&raw[0..32]);
    let s_der = der_integer(&raw[32..64]);
    let inner_len = (r_der.len() + s_der.len()) as u8;
    let mut out = vec![0x30u8, inner_len];
    out.extend_from_slice(&r_der);
    out.extend_from_slice(&s_der);
    out
}

fn der_integer(n: &[u8]) -> Vec<u8> {
    let n: Vec<u8> = n.iter().skip_while(|&&b| b == 0).copied().collect();
    let n = if n.is_empty() { vec![0u8] } else { n };
    let pad = n[0] & 0x80 != 0;
    let mut out = vec![0x02u8, n.len() as u8 + pad as u8];
    if pad {
        out.push(0);
    }
    out.extend_from_slice(&n);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spki_coords_roundtrip_layout() {
        let x = [0x11u8; 32];
        let y = [0x22u8; 32];
        let der = p256_spki(&x, &y);
        assert_eq!(der.len(), P256_SPKI_LEN);
        assert_eq!(&der[27..59], &x);
        assert_eq!(&der[59..91], &y);
        assert_eq!(p256_spki_coords(&der), Some((x, y)));
    }

    #[test]
    fn test_spki_coords_rejects_wrong_length() {
        let der = p256_spki(&[1u8; 32], &[2u8; 32]);
        assert!(p256_spki_coords(&der[..90]).is_none());
        let mut longer = der.clone();
        longer.push(0);
        assert!(p256_spki_coords(&longer).is_none());
    }

    #[test]
    fn test_spki_coords_rejects_compressed_point_and_bad_prefix() {
        let mut der = p256_spki(&[1u8; 32], &[2u8; 32]);
        der[26] = 0x02;
        assert!(p256_spki_coords(&der).is_none(), "compressed marker must be rejected");

        let mut der = p256_spki(&[1u8; 32], &[2u8; 32]);
        der[5] ^= 0xff;
        assert!(p256_spki_coords(&der).is_none(), "foreign OID must be rejected");
    }

    #[test]
    fn test_spki_prefix_matches_p256_library_export() {
        use p256::ecdsa::SigningKey;
        use p256::pkcs8::EncodePublicKey;

        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let der = key.verifying_key().to_public_key_der().unwrap();
        assert!(p256_spki_coords(der.as_bytes()).is_some());
    }

    #[test]
    fn test_der_ecdsa_structure() {
        let mut raw = [0u8; 64];
        raw[0] = 0x01;
        raw[32] = 0x01;
        let der = encode_der_ecdsa(&raw);
        assert_eq!(der[0], 0x30, "must start with SEQUENCE tag 0x30");
        let inner_len = der[1] as usize;
        assert_eq!(der.len(), 2 + inner_len, "DER length field must be accurate");
        assert_eq!(der[2], 0x02, "r must start with INTEGER tag 0x02");
    }

    #[test]
    fn test_der_ecdsa_high_bit_padding() {
        let mut raw = [0u8; 64];
        raw[31] = 0x80;
        raw[63] = 0x01;
        let der = encode_der_ecdsa(&raw);
        assert_eq!(der[3], 2, "padded integer must be 2 bytes (0x00, 0x80)");
        assert_eq!(der[4], 0x00);
        assert_eq!(der[5], 0x80);
    }

    #[test]
    fn test_der_ecdsa_all_zeros_encodes_as_single_zero() {
        let der = encode_der_ecdsa(&[0u8; 64]);
        assert_eq!(der[2], 0x02);
        assert_eq!(der[3], 1, "zero integer must have length 1");
        assert_eq!(der[4], 0x00);
    }

    #[test]
    fn test_der_ecdsa_parses_with_p256() {
        let mut raw = [0u8; 64];
        raw[..32].copy_from_slice(&[0x9au8; 32]);
        raw[32..].copy_from_slice(&[0x3bu8; 32]);
        let der = encode_der_ecdsa(&raw);
        let sig = p256::ecdsa::Signature::from_der(&der).expect("valid DER signature");
        assert_eq!(sig.to_bytes().as_slice(), &raw);
    }
}
