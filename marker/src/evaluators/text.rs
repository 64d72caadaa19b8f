//! Text helpers shared by the string-based evaluators.

/// Apply the usual answer normalisation: optional trimming, then optional
/// lower-casing.
pub fn normalize(text: &str, case_sensitive: bool, trim_whitespace: bool) -> String {
    let text = if trim_whitespace { text.trim() } else { text };
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

/// Split a multiple-choice answer on `,` or `;`, dropping blanks.
pub fn split_choices(text: &str) -> Vec<&str> {
    text.split([',', ';'])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Format a point value without a trailing `.0` for whole numbers.
pub fn format_points(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize("  Paris ", false, true), "paris");
        assert_eq!(normalize("  Paris ", true, true), "Paris");
        assert_eq!(normalize("  Paris ", true, false), "  Paris ");
    }

    #[test]
    fn splits_on_commas_and_semicolons() {
        assert_eq!(split_choices("A, b;C ,, ;"), vec!["A", "b", "C"]);
        assert!(split_choices("   ").is_empty());
    }

    #[test]
    fn counts_words_and_chars() {
        assert_eq!(word_count("  one two\tthree\n"), 3);
        assert_eq!(char_count("héllo"), 5);
    }

    #[test]
    fn formats_points() {
        assert_eq!(format_points(10.0), "10");
        assert_eq!(format_points(2.5), "2.50");
    }
}
