//! Name similarity scoring and normalization
//!
//! Similarity is Levenshtein edit distance normalized by the longer
//! input: `1 - distance / max(len)`. Symmetric, deterministic, no side
//! effects. Both-empty is identical by convention (the formula would
//! divide by zero).

/// Normalized similarity between two names, in [0, 1]
pub fn similarity(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let max_len = len_a.max(len_b);

    if max_len == 0 {
        return 1.0;
    }

    let distance = strsim::levenshtein(a, b);
    1.0 - (distance as f64 / max_len as f64)
}

/// Similarity on the 0-100 confidence scale used by candidate matching
pub fn confidence(a: &str, b: &str) -> u8 {
    (similarity(a, b) * 100.0).round() as u8
}

/// Fold a name to its normalized form for alias comparison
///
/// Lowercases, strips diacritics from common Latin letters, drops
/// punctuation, and collapses whitespace. "ACME  Pty. Ltd" and
/// "acmé pty ltd" normalize identically.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_space = true;

    let mut push = |fc: char, out: &mut String, last_was_space: &mut bool| {
        if fc.is_alphanumeric() {
            // Unicode-aware lowercasing; one uppercase char may map to several
            out.extend(fc.to_lowercase());
            *last_was_space = false;
        } else if fc.is_whitespace() || is_word_separator(fc) {
            if !*last_was_space {
                out.push(' ');
                *last_was_space = true;
            }
        }
        // Other punctuation is dropped without inserting a separator
    };

    for c in name.chars() {
        match fold_diacritic(c) {
            Some(folded) => {
                for fc in folded.chars() {
                    push(fc, &mut out, &mut last_was_space);
                }
            }
            None => push(c, &mut out, &mut last_was_space),
        }
    }

    while out.ends_with(' ') {
        out.pop();
    }

    out
}

/// Separators that delimit words rather than joining them
fn is_word_separator(c: char) -> bool {
    matches!(c, '-' | '/' | '&' | '+')
}

/// Map common accented Latin characters to their base letters
fn fold_diacritic(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ñ' | 'Ñ' => "n",
        'ç' | 'Ç' => "c",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        'ø' | 'Ø' => "o",
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_names_score_one() {
        assert_eq!(similarity("ABC Pty Ltd", "ABC Pty Ltd"), 1.0);
        assert_eq!(similarity("a", "a"), 1.0);
    }

    #[test]
    fn test_both_empty_identical_by_convention() {
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ("ABC Pty Ltd", "ABC Pty Ltd."),
            ("Acme", "Acme Constructions"),
            ("", "x"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn test_single_edit_ratio() {
        // One trailing dot: distance 1 over max length 12
        let s = similarity("ABC Pty Ltd", "ABC Pty Ltd.");
        assert!((s - (1.0 - 1.0 / 12.0)).abs() < 1e-9);
        assert!(s < 1.0);
    }

    #[test]
    fn test_empty_vs_nonempty() {
        assert_eq!(similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_confidence_scale() {
        assert_eq!(confidence("ABC Pty Ltd", "ABC Pty Ltd"), 100);
        // 1 - 1/12 = 0.9167 → 92
        assert_eq!(confidence("ABC Pty Ltd", "ABC Pty Ltd."), 92);
    }

    #[test]
    fn test_normalize_case_and_punctuation() {
        assert_eq!(normalize_name("ACME  Pty. Ltd"), "acme pty ltd");
        assert_eq!(normalize_name("A.B.C. Constructions"), "abc constructions");
        assert_eq!(normalize_name("Smith & Sons"), "smith sons");
    }

    #[test]
    fn test_normalize_diacritics() {
        assert_eq!(normalize_name("Acmé Pty Ltd"), "acme pty ltd");
        assert_eq!(normalize_name("Müller Façades"), "muller facades");
    }

    #[test]
    fn test_normalize_non_ascii_uppercase() {
        // Uppercase letters outside the diacritic fold table still lowercase
        assert_eq!(normalize_name("ŠKODA Cranes"), "škoda cranes");
        assert_eq!(normalize_name("ŠKODA Cranes"), normalize_name("škoda cranes"));
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_name("North-West Cranes"), "north west cranes");
        assert_eq!(normalize_name("  Edge  Case  "), "edge case");
    }
}
