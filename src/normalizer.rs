use std::collections::BTreeMap;

/// Symbols that carry no identity signal and are dropped wherever they
/// appear: currency marks and footnote daggers.
const NOISE_CHARS: &[char] = &['$', '€', '£', '¥', '*', '†', '‡'];

/// Parenthetical contents matching these are qualifiers, not identity:
/// they mark restatements or audit status and are stripped entirely.
/// Restatement itself is signal for the temporal resolver, which works
/// from filing dates, never from label text.
const QUALIFIER_MARKERS: &[&str] = &["restated", "unaudited", "audited", "revised"];

/// Canonicalize a raw line-item label into a comparable key.
///
/// Steps: lowercase; strip qualifier parentheticals and footnote markers;
/// expand known abbreviations token-by-token; fold remaining punctuation
/// ('&' becomes "and", everything else becomes a word break); collapse
/// whitespace. Deterministic and idempotent.
pub fn normalize(label: &str, abbreviations: &BTreeMap<String, String>) -> String {
    if label.trim().is_empty() {
        return String::new();
    }

    let lowered = label.trim().to_lowercase();
    let without_qualifiers = strip_qualifier_parens(&lowered);

    let mut words: Vec<String> = Vec::new();
    for raw_token in without_qualifiers.split_whitespace() {
        let cleaned: String = raw_token
            .chars()
            .filter(|c| !NOISE_CHARS.contains(c))
            .collect();

        // Keep '&' and '/' intact for dictionary lookup ("sg&a", "a/r"),
        // but trim surrounding punctuation so "cogs:" still resolves.
        let token = cleaned
            .trim_matches(|c: char| !(c.is_alphanumeric() || c == '&' || c == '/'))
            .to_string();
        if token.is_empty() {
            continue;
        }

        if let Some(expansion) = abbreviations.get(&token) {
            words.extend(expansion.split_whitespace().map(str::to_string));
            continue;
        }

        let folded = token.replace('&', " and ");
        for part in folded.split(|c: char| !c.is_alphanumeric()) {
            if !part.is_empty() {
                words.push(part.to_string());
            }
        }
    }

    words.join(" ")
}

/// Remove parenthetical groups whose content is a qualifier (restatement or
/// audit markers, note references, bare footnote numbers). Groups carrying
/// real words ("net income (loss)") keep their content; only the
/// parentheses themselves are dropped later by punctuation folding.
fn strip_qualifier_parens(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(open) = rest.find('(') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let (content, remainder) = match after.find(')') {
            Some(close) => (&after[..close], &after[close + 1..]),
            None => (after, ""),
        };

        if !is_qualifier(content) {
            out.push(' ');
            out.push_str(content);
            out.push(' ');
        }
        rest = remainder;
    }

    out.push_str(rest);
    out
}

fn is_qualifier(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return true;
    }

    // Footnote markers: "(1)", "(12)", "(*)"
    if trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || c == '*' || c.is_whitespace())
    {
        return true;
    }

    // Note references: "(note 3)", "(notes 4 and 5)"
    if trimmed.starts_with("note") {
        return true;
    }

    QUALIFIER_MARKERS
        .iter()
        .any(|marker| trimmed.contains(marker))
}
