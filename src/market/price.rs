//! Localized price-text normalization for soles amounts.

/// Normalizes raw price text into a whole soles amount.
///
/// The separator rules are a fixed heuristic for the Peruvian market and must
/// not be "fixed" to a generic locale parser:
///
/// - both `.` and `,` present: `.` is a thousands separator, `,` decimal;
/// - only commas, more than one: thousands separators, stripped;
/// - only one comma: decimal separator;
/// - only dots, more than one: thousands separators, stripped;
/// - only one dot: left as-is (the dot decimal is not used in this market).
///
/// Returns `None` when no number can be recovered or the amount is ≤ 0.
pub fn normalize(text: &str) -> Option<u64> {
    // Keep digits, separators, and the soles markers S and /. Other
    // characters split digit runs, which is what bounds the extraction below.
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | 'S' | '/'))
        .collect();

    let start = cleaned.find(|c: char| c.is_ascii_digit())?;
    let run: String = cleaned[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ','))
        .collect();

    let has_dot = run.contains('.');
    let has_comma = run.contains(',');

    let numeral = if has_dot && has_comma {
        run.replace('.', "").replace(',', ".")
    } else if has_comma {
        if run.matches(',').count() > 1 {
            run.replace(',', "")
        } else {
            run.replace(',', ".")
        }
    } else if has_dot && run.matches('.').count() > 1 {
        run.replace('.', "")
    } else {
        run
    };

    let value: f64 = numeral.parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    Some(value.round() as u64)
}
