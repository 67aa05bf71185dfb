//! DER codecs: ECDSA signatures and SEC1 private keys with explicit curve
//! parameters.
//!
//! Signature parsing is strict: lengths must be minimal, integers may not
//! carry excess padding, and no trailing bytes are allowed anywhere. An
//! integer that is negative or does not fit below n parses as zero, so the
//! signature is well formed but never verifies.

#![forbid(unsafe_code)]

use k1sig_crypto::secp256k1::Scalar;

/// Encoded length of a private key with a compressed public key.
pub const PRIVKEY_DER_COMPRESSED_LEN: usize = 214;

/// Encoded length of a private key with an uncompressed public key.
pub const PRIVKEY_DER_UNCOMPRESSED_LEN: usize = 279;

/// Longest DER signature: two 33-byte integers plus headers.
pub const MAX_SIGNATURE_DER_LEN: usize = 72;

const PRIVKEY_COMPRESSED_BEGIN: [u8; 8] = [0x30, 0x81, 0xD3, 0x02, 0x01, 0x01, 0x04, 0x20];

/// [0] ECParameters (explicit prime field, a, b, compressed G, n, cofactor)
/// followed by the [1] public key header.
const PRIVKEY_COMPRESSED_MIDDLE: [u8; 141] = [
    0xA0, 0x81, 0x85, 0x30, 0x81, 0x82, 0x02, 0x01, 0x01, 0x30, 0x2C, 0x06, 0x07, 0x2A, 0x86, 0x48,
    0xCE, 0x3D, 0x01, 0x01, 0x02, 0x21, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFE, 0xFF, 0xFF, 0xFC, 0x2F, 0x30, 0x06, 0x04, 0x01, 0x00, 0x04, 0x01, 0x07, 0x04,
    0x21, 0x02, 0x79, 0xBE, 0x66, 0x7E, 0xF9, 0xDC, 0xBB, 0xAC, 0x55, 0xA0, 0x62, 0x95, 0xCE, 0x87,
    0x0B, 0x07, 0x02, 0x9B, 0xFC, 0xDB, 0x2D, 0xCE, 0x28, 0xD9, 0x59, 0xF2, 0x81, 0x5B, 0x16, 0xF8,
    0x17, 0x98, 0x02, 0x21, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E,
    0x8C, 0xD0, 0x36, 0x41, 0x41, 0x02, 0x01, 0x01, 0xA1, 0x24, 0x03, 0x22, 0x00,
];

const PRIVKEY_UNCOMPRESSED_BEGIN: [u8; 9] = [0x30, 0x82, 0x01, 0x13, 0x02, 0x01, 0x01, 0x04, 0x20];

const PRIVKEY_UNCOMPRESSED_MIDDLE: [u8; 173] = [
    0xA0, 0x81, 0xA5, 0x30, 0x81, 0xA2, 0x02, 0x01, 0x01, 0x30, 0x2C, 0x06, 0x07, 0x2A, 0x86, 0x48,
    0xCE, 0x3D, 0x01, 0x01, 0x02, 0x21, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFE, 0xFF, 0xFF, 0xFC, 0x2F, 0x30, 0x06, 0x04, 0x01, 0x00, 0x04, 0x01, 0x07, 0x04,
    0x41, 0x04, 0x79, 0xBE, 0x66, 0x7E, 0xF9, 0xDC, 0xBB, 0xAC, 0x55, 0xA0, 0x62, 0x95, 0xCE, 0x87,
    0x0B, 0x07, 0x02, 0x9B, 0xFC, 0xDB, 0x2D, 0xCE, 0x28, 0xD9, 0x59, 0xF2, 0x81, 0x5B, 0x16, 0xF8,
    0x17, 0x98, 0x48, 0x3A, 0xDA, 0x77, 0x26, 0xA3, 0xC4, 0x65, 0x5D, 0xA4, 0xFB, 0xFC, 0x0E, 0x11,
    0x08, 0xA8, 0xFD, 0x17, 0xB4, 0x48, 0xA6, 0x85, 0x54, 0x19, 0x9C, 0x47, 0xD0, 0x8F, 0xFB, 0x10,
    0xD4, 0xB8, 0x02, 0x21, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E,
    0x8C, 0xD0, 0x36, 0x41, 0x41, 0x02, 0x01, 0x01, 0xA1, 0x44, 0x03, 0x42, 0x00,
];

/// Read a DER length at `data[*pos..]`. Rejects indefinite and non-minimal forms.
fn read_len(data: &[u8], pos: &mut usize) -> Option<usize> {
    let b1 = *data.get(*pos)?;
    *pos += 1;
    if b1 == 0xFF {
        return None;
    }
    if b1 & 0x80 == 0 {
        return Some(b1 as usize);
    }
    if b1 == 0x80 {
        return None;
    }

    let mut lenleft = (b1 & 0x7F) as usize;
    if lenleft > data.len() - *pos {
        return None;
    }
    if data[*pos] == 0 {
        // Leading zero byte in the length.
        return None;
    }
    if lenleft > std::mem::size_of::<usize>() {
        return None;
    }
    let mut ret = 0usize;
    while lenleft > 0 {
        ret = (ret << 8) | data[*pos] as usize;
        if ret + lenleft > data.len() - *pos {
            return None;
        }
        *pos += 1;
        lenleft -= 1;
    }
    if ret < 128 {
        // Should have used the short form.
        return None;
    }
    Some(ret)
}

/// Parse one INTEGER. `None` for malformed encodings; out-of-range values give zero.
fn parse_integer(data: &[u8], pos: &mut usize) -> Option<Scalar> {
    if *data.get(*pos)? != 0x02 {
        return None;
    }
    *pos += 1;
    let mut rlen = read_len(data, pos)?;
    if rlen == 0 || *pos + rlen > data.len() {
        return None;
    }

    let body = &data[*pos..*pos + rlen];
    if rlen > 1 && body[0] == 0x00 && body[1] & 0x80 == 0 {
        return None;
    }
    if rlen > 1 && body[0] == 0xFF && body[1] & 0x80 == 0x80 {
        return None;
    }

    let mut overflow = body[0] & 0x80 == 0x80;
    let mut start = *pos;
    while rlen > 0 && data[start] == 0 {
        start += 1;
        rlen -= 1;
    }
    if rlen > 32 {
        overflow = true;
    }

    let mut r = Scalar::ZERO;
    if !overflow {
        let mut ra = [0u8; 32];
        ra[32 - rlen..].copy_from_slice(&data[start..start + rlen]);
        let (s, of) = Scalar::set_b32(&ra);
        overflow = of;
        r = s;
    }
    if overflow {
        r = Scalar::ZERO;
    }
    *pos = start + rlen;
    Some(r)
}

/// Strict DER parse of `SEQUENCE { r INTEGER, s INTEGER }`.
pub fn parse_signature(sig: &[u8]) -> Option<(Scalar, Scalar)> {
    let mut pos = 0;
    if *sig.first()? != 0x30 {
        return None;
    }
    pos += 1;
    let len = read_len(sig, &mut pos)?;
    if pos + len != sig.len() {
        return None;
    }

    let r = parse_integer(sig, &mut pos)?;
    let s = parse_integer(sig, &mut pos)?;
    if pos != sig.len() {
        return None;
    }
    Some((r, s))
}

/// Minimal big-endian INTEGER body of a scalar, with a 0x00 prefix if the top bit is set.
fn integer_body(a: &Scalar) -> Vec<u8> {
    let mut body = Vec::with_capacity(33);
    body.push(0);
    body.extend_from_slice(&a.to_bytes());
    let mut start = 0;
    while start < 32 && body[start] == 0 && body[start + 1] < 0x80 {
        start += 1;
    }
    body.split_off(start)
}

/// DER encoding of (r, s). At most [`MAX_SIGNATURE_DER_LEN`] bytes.
pub fn serialize_signature(r: &Scalar, s: &Scalar) -> Vec<u8> {
    let rb = integer_body(r);
    let sb = integer_body(s);
    let mut out = Vec::with_capacity(6 + rb.len() + sb.len());
    out.push(0x30);
    out.push((4 + rb.len() + sb.len()) as u8);
    out.push(0x02);
    out.push(rb.len() as u8);
    out.extend_from_slice(&rb);
    out.push(0x02);
    out.push(sb.len() as u8);
    out.extend_from_slice(&sb);
    out
}

/// Extract the secret from a SEC1 `ECPrivateKey`. Only the version and the
/// key octet string are examined; the rest of the structure is ignored.
///
/// Returns `None` for malformed input, a zero key, or a key >= n.
pub fn parse_private_key(der: &[u8]) -> Option<Scalar> {
    let mut pos = 0;
    if *der.first()? != 0x30 {
        return None;
    }
    pos += 1;

    // Sequence length, long form with one or two bytes.
    let lb = *der.get(pos)?;
    if lb & 0x80 == 0 {
        return None;
    }
    let lenb = (lb & 0x7F) as usize;
    pos += 1;
    if !(1..=2).contains(&lenb) || der.len() - pos < lenb {
        return None;
    }
    let len = if lenb > 1 {
        ((der[pos] as usize) << 8) | der[pos + 1] as usize
    } else {
        der[pos] as usize
    };
    pos += lenb;
    if der.len() - pos < len {
        return None;
    }

    // version INTEGER 1
    if der.len() - pos < 3 || der[pos..pos + 3] != [0x02, 0x01, 0x01] {
        return None;
    }
    pos += 3;

    // privateKey OCTET STRING, up to 32 bytes
    if der.len() - pos < 2 || der[pos] != 0x04 || der[pos + 1] > 0x20 {
        return None;
    }
    let klen = der[pos + 1] as usize;
    if der.len() - pos < 2 + klen {
        return None;
    }
    let mut out32 = [0u8; 32];
    out32[32 - klen..].copy_from_slice(&der[pos + 2..pos + 2 + klen]);

    let (s, overflow) = Scalar::set_b32(&out32);
    if overflow || s.is_zero() {
        return None;
    }
    Some(s)
}

/// SEC1 `ECPrivateKey` with explicit curve parameters wrapping `sec` and the
/// already-serialized public key (33 or 65 bytes, matching `compressed`).
pub fn serialize_private_key(sec: &[u8; 32], pubkey: &[u8], compressed: bool) -> Vec<u8> {
    let (begin, middle, total): (&[u8], &[u8], usize) = if compressed {
        debug_assert_eq!(pubkey.len(), 33);
        (
            &PRIVKEY_COMPRESSED_BEGIN,
            &PRIVKEY_COMPRESSED_MIDDLE,
            PRIVKEY_DER_COMPRESSED_LEN,
        )
    } else {
        debug_assert_eq!(pubkey.len(), 65);
        (
            &PRIVKEY_UNCOMPRESSED_BEGIN,
            &PRIVKEY_UNCOMPRESSED_MIDDLE,
            PRIVKEY_DER_UNCOMPRESSED_LEN,
        )
    };

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(begin);
    out.extend_from_slice(sec);
    out.extend_from_slice(middle);
    out.extend_from_slice(pubkey);
    debug_assert_eq!(out.len(), total);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(hex_str: &str) -> Scalar {
        let b: [u8; 32] = hex::decode(hex_str).unwrap().try_into().unwrap();
        Scalar::from_bytes(&b).unwrap()
    }

    #[test]
    fn test_serialize_minimal_integers() {
        let der = serialize_signature(&Scalar::from_u32(1), &Scalar::from_u32(0x80));
        assert_eq!(hex::encode(&der), "3007020101020200 80".replace(' ', ""));

        let r = scalar("934b1ea10a4b3c1757e2b0c017d0b6143ce3c9a7e6a4a49860d7a6ab210ee3d8");
        let s = scalar("2442ce9d2b916064108014783e923ec36b49743e2ffa1c4496f01a512aafd9e5");
        let der = serialize_signature(&r, &s);
        assert_eq!(
            hex::encode(&der),
            "3045022100934b1ea10a4b3c1757e2b0c017d0b6143ce3c9a7e6a4a49860d7a6ab210ee3d8\
             02202442ce9d2b916064108014783e923ec36b49743e2ffa1c4496f01a512aafd9e5"
        );
        assert_eq!(parse_signature(&der), Some((r, s)));
    }

    #[test]
    fn test_zero_integer_encodes_one_byte() {
        let der = serialize_signature(&Scalar::ZERO, &Scalar::ZERO);
        assert_eq!(hex::encode(&der), "3006020100020100");
        assert_eq!(parse_signature(&der), Some((Scalar::ZERO, Scalar::ZERO)));
    }

    #[test]
    fn test_max_length() {
        let high = Scalar::ONE.negate();
        let der = serialize_signature(&high, &high);
        assert_eq!(der.len(), MAX_SIGNATURE_DER_LEN);
    }

    #[test]
    fn test_rejects_malformed() {
        let cases = [
            "",
            "31060201010201 01",
            "3006020101020101 00",     // trailing byte outside
            "3007020101020101 00",     // trailing byte inside
            "30050201010201",          // truncated
            "3080020101020101",        // indefinite length
            "308106020101020101",      // long form for a short length
            "3007020200010201 01",     // padded integer
            "30070202ff800201 01",     // padded negative integer
            "3006020001020101",        // empty integer
            "3006030101020101",        // wrong tag
        ];
        for case in cases {
            let bytes = hex::decode(case.replace(' ', "")).unwrap();
            assert!(parse_signature(&bytes).is_none(), "accepted {case}");
        }
    }

    #[test]
    fn test_out_of_range_parses_as_zero() {
        // r negative, s = n
        let neg = hex::decode("300602018102010 1".replace(' ', "")).unwrap();
        assert_eq!(parse_signature(&neg), Some((Scalar::ZERO, Scalar::ONE)));

        let mut der = vec![0x30, 0x26, 0x02, 0x21, 0x00];
        der.extend_from_slice(
            &hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141")
                .unwrap(),
        );
        der.extend_from_slice(&[0x02, 0x01, 0x01]);
        assert_eq!(parse_signature(&der), Some((Scalar::ZERO, Scalar::ONE)));
    }

    #[test]
    fn test_long_form_sequence_length() {
        // 0x81 form is only legal for lengths >= 128, which no signature reaches.
        let der = hex::decode("30810602010102010 1".replace(' ', "")).unwrap();
        assert!(parse_signature(&der).is_none());
    }

    #[test]
    fn test_privkey_roundtrip() {
        let sec = [0x11u8; 32];
        let pubkey = [0x02u8; 33];
        let der = serialize_private_key(&sec, &pubkey, true);
        assert_eq!(der.len(), PRIVKEY_DER_COMPRESSED_LEN);
        assert_eq!(parse_private_key(&der).unwrap().to_bytes(), sec);

        let pubkey = [0x04u8; 65];
        let der = serialize_private_key(&sec, &pubkey, false);
        assert_eq!(der.len(), PRIVKEY_DER_UNCOMPRESSED_LEN);
        assert_eq!(parse_private_key(&der).unwrap().to_bytes(), sec);
    }

    #[test]
    fn test_privkey_short_octet_string() {
        // 30 81 xx | 02 01 01 | 04 01 05
        let der = [0x30, 0x81, 0x06, 0x02, 0x01, 0x01, 0x04, 0x01, 0x05];
        assert_eq!(parse_private_key(&der), Some(Scalar::from_u32(5)));
    }

    #[test]
    fn test_privkey_rejects() {
        assert!(parse_private_key(&[]).is_none());
        // short-form sequence length
        assert!(parse_private_key(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x04, 0x01, 0x05]).is_none());
        // zero key
        assert!(
            parse_private_key(&[0x30, 0x81, 0x06, 0x02, 0x01, 0x01, 0x04, 0x01, 0x00]).is_none()
        );
        // wrong version
        assert!(
            parse_private_key(&[0x30, 0x81, 0x06, 0x02, 0x01, 0x02, 0x04, 0x01, 0x05]).is_none()
        );
        // key >= n
        let mut der = serialize_private_key(&[0xff; 32], &[0x02; 33], true);
        assert!(parse_private_key(&der).is_none());
        // truncated octet string
        der.truncate(20);
        assert!(parse_private_key(&der).is_none());
    }
}
