//! Identity fingerprinting for monitors
//!
//! Identities are the hex-encoded EDID payloads advertised by connected
//! monitors. Comparison has to survive three real-world quirks: stored
//! setups from old versions keep an md5 digest instead of the raw payload,
//! users may put a single `*` wildcard into a stored identity, and the same
//! panel can report its payload differently across connectors. Where the
//! payload is well-formed we therefore prefer a serial derived from its
//! descriptor blocks over the raw hex blob.

use md5::{Digest, Md5};
use thiserror::Error;
use tracing::trace;

use crate::model::Output;

/// Identity placeholder for connected outputs that advertise no payload
pub const EDID_UNAVAILABLE: &str = "--CONNECTED-BUT-EDID-UNAVAILABLE-";

/// Base descriptor block size in bytes
const BLOCK_LEN: usize = 128;

/// Offsets of the four 18-byte descriptor sub-blocks in the base block
const DESCRIPTOR_OFFSETS: [usize; 4] = [54, 72, 90, 108];

/// Descriptor tag marking a textual serial string
const TAG_SERIAL_TEXT: u8 = 0xff;

#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("identity pattern `{0}` contains more than one wildcard")]
    MultipleWildcards(String),
}

/// Ranking score for a wildcard identity match, in (0,1].
///
/// Deliberately a separate type from the boolean equality predicate:
/// "matches" and "best match" are different questions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Closeness(f64);

impl Closeness {
    pub const EXACT: Closeness = Closeness(1.0);

    /// Lower bound keeping scores inside (0,1] even for an all-wildcard pattern
    const FLOOR: f64 = 1e-6;

    pub fn score(self) -> f64 {
        self.0
    }
}

/// Derive a stable serial from a hex identity payload.
///
/// Prefers the textual serial embedded in one of the four descriptor
/// sub-blocks, falls back to the packed numeric serial field. A zero
/// numeric serial is vendor filler and yields no serial at all. Payloads
/// that fail structural validation (length, checksum) yield None.
pub fn derive_serial(edid_hex: &str) -> Option<String> {
    if edid_hex.starts_with(EDID_UNAVAILABLE) || edid_hex.contains('*') {
        return None;
    }
    let bytes = hex::decode(edid_hex).ok()?;
    if bytes.len() < BLOCK_LEN || bytes.len() % BLOCK_LEN != 0 {
        return None;
    }
    let checksum = bytes[..BLOCK_LEN]
        .iter()
        .fold(0u8, |sum, b| sum.wrapping_add(*b));
    if checksum != 0 {
        trace!(len = bytes.len(), "identity payload failed checksum");
        return None;
    }

    for offset in DESCRIPTOR_OFFSETS {
        let block = &bytes[offset..offset + 18];
        if block[0..3] == [0, 0, 0] && block[3] == TAG_SERIAL_TEXT {
            // Text runs to a 0x0a terminator and is space-padded
            let text: String = block[5..18]
                .iter()
                .take_while(|b| **b != 0x0a)
                .map(|b| *b as char)
                .collect();
            let text = text.trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    let numeric = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
    if numeric == 0 {
        return None;
    }
    Some(format!("0x{numeric:x}"))
}

/// Equality of two outputs' hardware identities.
///
/// Serial comparison wins when both sides have one; otherwise the raw
/// payloads are compared with the digest and wildcard accommodations.
pub fn fingerprint_equals(a: &Output, b: &Output) -> bool {
    if let (Some(sa), Some(sb)) = (&a.serial, &b.serial) {
        return sa == sb;
    }
    match (&a.edid, &b.edid) {
        (Some(ea), Some(eb)) => edid_equals(ea, eb),
        (None, None) => true,
        _ => false,
    }
}

fn edid_equals(a: &str, b: &str) -> bool {
    // A 32-hex identity is a digest written by a legacy version; compare it
    // against the hash of the longer payload.
    if a.len() == 32 && b.len() != 32 && !b.starts_with(EDID_UNAVAILABLE) {
        return digest_hex(b).as_deref() == Some(a);
    }
    if b.len() == 32 && a.len() != 32 && !a.starts_with(EDID_UNAVAILABLE) {
        return digest_hex(a).as_deref() == Some(b);
    }
    if a.contains('*') {
        return matches!(wildcard_closeness(a, b), Ok(Some(_)));
    }
    if b.contains('*') {
        return matches!(wildcard_closeness(b, a), Ok(Some(_)));
    }
    a == b
}

fn digest_hex(edid_hex: &str) -> Option<String> {
    let bytes = hex::decode(edid_hex).ok()?;
    Some(hex::encode(Md5::digest(&bytes)))
}

/// Closeness of a candidate identity to a pattern with one `*` wildcard.
///
/// None means the required prefix or suffix failed. Patterns with more than
/// one wildcard are a configuration error.
pub fn wildcard_closeness(
    pattern: &str,
    candidate: &str,
) -> Result<Option<Closeness>, IdentityError> {
    let Some((prefix, suffix)) = pattern.split_once('*') else {
        // No wildcard at all: degenerate exact comparison
        return Ok((pattern == candidate).then_some(Closeness::EXACT));
    };
    if suffix.contains('*') {
        return Err(IdentityError::MultipleWildcards(pattern.to_string()));
    }
    let required = prefix.len() + suffix.len();
    if candidate.len() < required
        || !candidate.starts_with(prefix)
        || !candidate.ends_with(suffix)
    {
        return Ok(None);
    }
    let score = if candidate.is_empty() {
        Closeness::FLOOR
    } else {
        (required as f64 / candidate.len() as f64).max(Closeness::FLOOR)
    };
    Ok(Some(Closeness(score)))
}

/// Ranking score of a stored output's identity against a live output.
///
/// `Some(EXACT)` for serial/digest/exact matches, a proportional score for
/// wildcard matches, None when they do not match at all.
pub fn match_score(
    stored: &Output,
    current: &Output,
) -> Result<Option<Closeness>, IdentityError> {
    if let (Some(stored_edid), Some(current_edid)) = (&stored.edid, &current.edid)
        && stored_edid.contains('*')
    {
        return wildcard_closeness(stored_edid, current_edid);
    }
    Ok(fingerprint_equals(stored, current).then_some(Closeness::EXACT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OptionSet;

    /// Build a structurally valid 128-byte base block with the given
    /// numeric serial, fixing up the checksum byte.
    fn base_block(numeric_serial: u32) -> [u8; 128] {
        let mut block = [0u8; 128];
        block[0] = 0x00;
        block[1..7].fill(0xff);
        block[7] = 0x00;
        block[12..16].copy_from_slice(&numeric_serial.to_le_bytes());
        fix_checksum(&mut block);
        block
    }

    fn fix_checksum(block: &mut [u8; 128]) {
        block[127] = 0;
        let sum: u8 = block[..127].iter().fold(0u8, |s, b| s.wrapping_add(*b));
        block[127] = 0u8.wrapping_sub(sum);
    }

    fn with_serial_text(mut block: [u8; 128], text: &str) -> [u8; 128] {
        let offset = 54;
        block[offset..offset + 3].fill(0);
        block[offset + 3] = TAG_SERIAL_TEXT;
        block[offset + 4] = 0;
        let mut payload = [0x20u8; 13];
        for (slot, byte) in payload.iter_mut().zip(text.bytes()) {
            *slot = byte;
        }
        if text.len() < 13 {
            payload[text.len()] = 0x0a;
        }
        block[offset + 5..offset + 18].copy_from_slice(&payload);
        fix_checksum(&mut block);
        block
    }

    fn output_with_edid(name: &str, edid: &str) -> Output {
        Output::new(name.to_string(), Some(edid.to_string()), OptionSet::new())
    }

    #[test]
    fn textual_serial_preferred_over_numeric() {
        let block = with_serial_text(base_block(0x1234), "AB7F0042");
        assert_eq!(
            derive_serial(&hex::encode(block)).as_deref(),
            Some("AB7F0042")
        );
    }

    #[test]
    fn numeric_serial_renders_as_lowercase_hex() {
        let block = base_block(0xCAFE42);
        assert_eq!(derive_serial(&hex::encode(block)).as_deref(), Some("0xcafe42"));
    }

    #[test]
    fn zero_numeric_serial_yields_none() {
        let block = base_block(0);
        assert_eq!(derive_serial(&hex::encode(block)), None);
    }

    #[test]
    fn broken_checksum_yields_none() {
        let mut block = base_block(0x1234);
        block[127] = block[127].wrapping_add(1);
        assert_eq!(derive_serial(&hex::encode(block)), None);
    }

    #[test]
    fn unavailable_sentinel_yields_none() {
        assert_eq!(derive_serial("--CONNECTED-BUT-EDID-UNAVAILABLE-DP-1"), None);
    }

    #[test]
    fn serial_comparison_wins_over_payload_differences() {
        // Same serial text, different filler bytes elsewhere
        let mut a = with_serial_text(base_block(1), "SN123");
        let mut b = with_serial_text(base_block(2), "SN123");
        fix_checksum(&mut a);
        fix_checksum(&mut b);
        let oa = output_with_edid("DP-1", &hex::encode(a));
        let ob = output_with_edid("HDMI-1", &hex::encode(b));
        assert!(oa.serial.is_some());
        assert!(fingerprint_equals(&oa, &ob));
        assert!(fingerprint_equals(&ob, &oa));
    }

    #[test]
    fn legacy_digest_matches_full_payload() {
        // Invalid checksum on purpose so no serial is derived and the raw
        // payload comparison path is exercised.
        let payload = "00ffffffffffff00aabbccdd0011223344556677";
        let digest = digest_hex(payload).unwrap();
        assert_eq!(digest.len(), 32);

        let short = output_with_edid("DP-1", &digest);
        let long = output_with_edid("DP-1", payload);
        assert!(fingerprint_equals(&short, &long));
        assert!(fingerprint_equals(&long, &short));
    }

    #[test]
    fn exact_comparison_is_symmetric() {
        let a = output_with_edid("DP-1", "00aabb");
        let b = output_with_edid("DP-1", "00aabb");
        let c = output_with_edid("DP-1", "00aacc");
        assert!(fingerprint_equals(&a, &b));
        assert!(fingerprint_equals(&b, &a));
        assert!(!fingerprint_equals(&a, &c));
        assert!(!fingerprint_equals(&c, &a));
    }

    #[test]
    fn disconnected_outputs_compare_equal_to_each_other_only() {
        let gone = Output::new("DP-1".into(), None, OptionSet::new());
        let also_gone = Output::new("DP-2".into(), None, OptionSet::new());
        let here = output_with_edid("DP-3", "00aabb");
        assert!(fingerprint_equals(&gone, &also_gone));
        assert!(!fingerprint_equals(&gone, &here));
    }

    #[test]
    fn wildcard_scores_by_matched_share() {
        let score = wildcard_closeness("00aa*ff", "00aabbccff").unwrap().unwrap();
        assert!((score.score() - 0.6).abs() < 1e-9);
        assert!(score < Closeness::EXACT);

        assert_eq!(wildcard_closeness("00aa*", "ffaabb").unwrap(), None);
        assert_eq!(wildcard_closeness("*ff", "00aabb").unwrap(), None);
    }

    #[test]
    fn all_wildcard_still_scores_positive() {
        let score = wildcard_closeness("*", "00aabb").unwrap().unwrap();
        assert!(score.score() > 0.0);
        assert!(score.score() <= 1.0);
    }

    #[test]
    fn multiple_wildcards_are_a_configuration_error() {
        assert_eq!(
            wildcard_closeness("00*aa*ff", "00aabbff"),
            Err(IdentityError::MultipleWildcards("00*aa*ff".into()))
        );
    }

    #[test]
    fn match_score_ranks_wildcards_below_exact() {
        let concrete = output_with_edid("DP-1", "00aabbccff");
        let pattern = output_with_edid("DP-1", "00aa*ff");
        let exact = output_with_edid("DP-1", "00aabbccff");

        let wildcard_score = match_score(&pattern, &concrete).unwrap().unwrap();
        let exact_score = match_score(&exact, &concrete).unwrap().unwrap();
        assert!(wildcard_score < exact_score);
        assert_eq!(exact_score, Closeness::EXACT);
    }
}
