//! Envelope — the self-describing, HMAC-signed binary frame every saved
//! value is wrapped in.
//!
//! Layout (little-endian, 51-byte header):
//!
//! ```text
//! offset  size  field
//! 0       4     magic       b"%HLX"
//! 4       2     version     u16
//! 6       1     flags       u8   (bit 0: payload is LZ4-compressed)
//! 7       32    type_digest SHA-256 of the bound type's canonical name
//! 39      8     timestamp   i64, nanoseconds since the Unix epoch
//! 47      4     payload_len i32, strictly positive
//! 51      *     payload     payload_len bytes
//! 51+n    32    tag         HMAC-SHA256 over version..payload
//! ```
//!
//! The MAC deliberately excludes `magic` and `payload_len`: `magic` is a
//! format sentinel, not signed content, and `payload_len` is re-derived from
//! the MAC-covered `payload` itself at verification time, so an attacker who
//! edits `payload_len` alone produces a framing mismatch before the MAC is
//! ever computed.
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const MAGIC: [u8; 4] = *b"%HLX";
pub const VERSION: u16 = 1;
pub const HEADER_SIZE: usize = 51;
pub const TAG_SIZE: usize = 32;
pub const MIN_ENVELOPE_SIZE: usize = HEADER_SIZE + 32;

pub const FLAG_COMPRESSED: u8 = 0x01;
const FLAG_KNOWN_BITS: u8 = FLAG_COMPRESSED;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("envelope is shorter than the minimum {MIN_ENVELOPE_SIZE} bytes")]
    TooShort,
    #[error("magic bytes do not match")]
    BadMagic,
    #[error("unsupported envelope version {0}")]
    BadVersion(u16),
    #[error("reserved flag bits set: {0:#04x}")]
    BadFlags(u8),
    #[error("type digest does not match the bound type")]
    TypeMismatch,
    #[error("payload length inconsistent with envelope length")]
    FramingMismatch,
    #[error("HMAC tag verification failed")]
    MacFailed,
}

/// A successfully verified and parsed envelope.
#[derive(Debug)]
pub struct DecodedEnvelope {
    pub payload: Vec<u8>,
    pub flags: u8,
    pub timestamp: i64,
}

impl DecodedEnvelope {
    pub fn compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

fn compute_tag(key: &[u8; 32], version: u16, flags: u8, type_digest: &[u8; 32], timestamp: i64, payload: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(&version.to_le_bytes());
    mac.update(&[flags]);
    mac.update(type_digest);
    mac.update(&timestamp.to_le_bytes());
    mac.update(payload);
    mac.finalize().into_bytes().into()
}

/// Encode `payload` into a fresh, signed envelope stamped with the current
/// time.
pub fn encode(type_digest: [u8; 32], payload: &[u8], flags: u8, key: &[u8; 32]) -> Vec<u8> {
    let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);
    encode_at(type_digest, payload, flags, key, timestamp)
}

/// Encode with an explicit timestamp. Exposed for deterministic testing.
pub fn encode_at(type_digest: [u8; 32], payload: &[u8], flags: u8, key: &[u8; 32], timestamp: i64) -> Vec<u8> {
    debug_assert!(payload.len() <= i32::MAX as usize, "payload exceeds the 2 GiB envelope cap");
    let tag = compute_tag(key, VERSION, flags, &type_digest, timestamp, payload);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len() + TAG_SIZE);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.push(flags);
    out.extend_from_slice(&type_digest);
    out.extend_from_slice(&timestamp.to_le_bytes());
    out.extend_from_slice(&(payload.len() as i32).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&tag);
    out
}

/// Validate and parse a complete envelope, in the order spelled out above:
/// length, magic, version, flags, type digest, framing, then the MAC last.
pub fn decode(bytes: &[u8], expected_type_digest: &[u8; 32], key: &[u8; 32]) -> Result<DecodedEnvelope, DecodeError> {
    let header = parse_unverified(bytes, expected_type_digest)?;
    let payload = header.payload(bytes);
    let tag = &bytes[header.payload_end..];

    let expected_tag = compute_tag(key, VERSION, header.flags, expected_type_digest, header.timestamp, payload);
    if expected_tag[..].ct_eq(tag).unwrap_u8() == 0 {
        return Err(DecodeError::MacFailed);
    }

    Ok(DecodedEnvelope {
        payload: payload.to_vec(),
        flags: header.flags,
        timestamp: header.timestamp,
    })
}

/// Structural fields of an envelope, parsed and type-checked but with the
/// MAC left unverified. Used by the fast, no-key payload-extraction path.
pub struct UnverifiedHeader {
    flags: u8,
    timestamp: i64,
    payload_start: usize,
    payload_end: usize,
}

impl UnverifiedHeader {
    pub fn payload<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.payload_start..self.payload_end]
    }

    pub fn compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

pub fn parse_unverified(bytes: &[u8], expected_type_digest: &[u8; 32]) -> Result<UnverifiedHeader, DecodeError> {
    if bytes.len() < MIN_ENVELOPE_SIZE {
        return Err(DecodeError::TooShort);
    }
    if bytes[0..4] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
    if version != VERSION {
        return Err(DecodeError::BadVersion(version));
    }
    let flags = bytes[6];
    if flags & !FLAG_KNOWN_BITS != 0 {
        return Err(DecodeError::BadFlags(flags));
    }
    let type_digest: [u8; 32] = bytes[7..39].try_into().unwrap();
    if type_digest[..].ct_eq(&expected_type_digest[..]).unwrap_u8() == 0 {
        return Err(DecodeError::TypeMismatch);
    }
    let timestamp = i64::from_le_bytes(bytes[39..47].try_into().unwrap());
    let payload_len = i32::from_le_bytes(bytes[47..51].try_into().unwrap());
    if payload_len <= 0 {
        return Err(DecodeError::FramingMismatch);
    }
    let payload_len = payload_len as usize;
    if bytes.len() != HEADER_SIZE + payload_len + TAG_SIZE {
        return Err(DecodeError::FramingMismatch);
    }

    Ok(UnverifiedHeader {
        flags,
        timestamp,
        payload_start: HEADER_SIZE,
        payload_end: HEADER_SIZE + payload_len,
    })
}

/// Inspection view used by the repair CLI's `inspect` subcommand: every
/// structural field, no MAC check, no key required.
pub struct HeaderSummary {
    pub version: u16,
    pub flags: u8,
    pub type_digest: [u8; 32],
    pub timestamp: i64,
    pub payload_len: usize,
}

pub fn summarize(bytes: &[u8]) -> Result<HeaderSummary, DecodeError> {
    if bytes.len() < MIN_ENVELOPE_SIZE {
        return Err(DecodeError::TooShort);
    }
    if bytes[0..4] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
    let flags = bytes[6];
    let type_digest: [u8; 32] = bytes[7..39].try_into().unwrap();
    let timestamp = i64::from_le_bytes(bytes[39..47].try_into().unwrap());
    let payload_len = i32::from_le_bytes(bytes[47..51].try_into().unwrap()).max(0) as usize;
    Ok(HeaderSummary { version, flags, type_digest, timestamp, payload_len })
}
