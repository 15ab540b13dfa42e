//! Candidate encodings for the opaque session credential.
//!
//! Session strings are base64-shaped and arrive through copy-paste channels
//! that mangle them in predictable ways. Rather than guessing which mangling
//! happened, every plausible repair is derived up front and tried in order
//! until one authenticates.

use base64::Engine;

use crate::error::{Error, Result};

/// Alignment block of the credential encoding. Session strings authenticate
/// only when their length is a multiple of this.
pub const CREDENTIAL_BLOCK: usize = 4;

/// Derive the ordered list of credential candidates to attempt.
///
/// In order: the trimmed credential as-is; the trimmed credential minus its
/// final character (off-by-one paste artifacts); the trimmed credential
/// padded with `=` to the next block boundary. The last two are produced
/// only when the trimmed form is not already block-aligned.
pub fn candidates(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyCredential);
    }

    let mut out = vec![trimmed.to_string()];
    if trimmed.chars().count() % CREDENTIAL_BLOCK != 0 {
        let mut clipped = trimmed.to_string();
        clipped.pop();
        if !clipped.is_empty() && !out.contains(&clipped) {
            out.push(clipped);
        }

        let missing = CREDENTIAL_BLOCK - trimmed.chars().count() % CREDENTIAL_BLOCK;
        let padded = format!("{trimmed}{}", "=".repeat(missing));
        if !out.contains(&padded) {
            out.push(padded);
        }
    }
    Ok(out)
}

/// Whether a candidate decodes cleanly as standard base64. Purely a
/// diagnostic: implausible candidates are still attempted, since the
/// transport is the only authority on what authenticates.
#[must_use]
pub fn decodes_as_base64(candidate: &str) -> bool {
    base64::engine::general_purpose::STANDARD
        .decode(candidate)
        .is_ok()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn empty_credential_is_an_error() {
        assert!(matches!(candidates(""), Err(Error::EmptyCredential)));
        assert!(matches!(candidates("   "), Err(Error::EmptyCredential)));
    }

    #[test]
    fn aligned_credential_yields_single_candidate() {
        let list = candidates("AQABAQAB").unwrap();
        assert_eq!(list, vec!["AQABAQAB".to_string()]);
    }

    #[test]
    fn unaligned_credential_yields_all_variants_in_order() {
        let list = candidates(" AQABA ").unwrap();
        assert_eq!(
            list,
            vec![
                "AQABA".to_string(),
                "AQAB".to_string(),
                "AQABA===".to_string(),
            ]
        );
    }

    #[rstest]
    #[case("A")]
    #[case("AB")]
    #[case("ABCDE")]
    #[case("ABCDEFG")]
    fn padded_variant_is_block_aligned(#[case] raw: &str) {
        let list = candidates(raw).unwrap();
        let padded = list.last().unwrap();
        assert!(padded.ends_with('='));
        assert_eq!(padded.chars().count() % CREDENTIAL_BLOCK, 0);
    }

    #[test]
    fn single_character_credential_skips_empty_clip() {
        let list = candidates("A").unwrap();
        assert_eq!(list, vec!["A".to_string(), "A===".to_string()]);
    }

    #[test]
    fn base64_diagnostic() {
        assert!(decodes_as_base64("AQAB"));
        assert!(!decodes_as_base64("not base64!"));
    }
}
