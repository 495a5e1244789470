//! Company name variations used to widen provider recall.
//!
//! Provider search indexes are brittle against punctuation and legal
//! suffixes, so each lookup walks from the exact name to coarser spellings.

pub const VARIATION_COUNT: usize = 3;

/// Ordered query spellings for `raw`, most specific first:
/// the name as given, the name with whitespace removed, and its first word.
pub fn variations(raw: &str) -> [String; VARIATION_COUNT] {
    let name = raw.trim();
    let squashed: String = name.split_whitespace().collect();
    let first_word = name.split_whitespace().next().unwrap_or_default();

    [name.to_string(), squashed, first_word.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variations_multi_word() {
        assert_eq!(
            variations("Acme Corp"),
            ["Acme Corp".to_string(), "AcmeCorp".to_string(), "Acme".to_string()]
        );
    }

    #[test]
    fn test_variations_collapse_inner_whitespace() {
        let v = variations("  Grow   Therapy\tInc ");
        assert_eq!(v[0], "Grow   Therapy\tInc");
        assert_eq!(v[1], "GrowTherapyInc");
        assert_eq!(v[2], "Grow");
    }

    #[test]
    fn test_variations_single_word_keeps_three_entries() {
        let v = variations("Globex");
        assert_eq!(v.len(), VARIATION_COUNT);
        assert!(v.iter().all(|s| s == "Globex"));
    }

    #[test]
    fn test_variations_are_deterministic() {
        assert_eq!(variations("Sully.ai Health"), variations("Sully.ai Health"));
    }

    #[test]
    fn test_variations_empty_input() {
        let v = variations("   ");
        assert!(v.iter().all(String::is_empty));
    }
}
