use crate::registry::IdentityRegistry;
use crate::schema::{CompilerConfig, LineItemIdentity};

/// Outcome of matching a canonical key against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The key belongs to an existing identity.
    Existing(u32),
    /// No identity scored at or above the threshold; mint a new one.
    New,
}

/// Similarity between two canonical keys on a 0-1 scale.
///
/// Sørensen–Dice over the token-sorted keys: insensitive to word order
/// ("expenses, operating" vs "operating expenses") while still punishing
/// extra tokens hard enough that "revenue" vs "revenue growth" stays well
/// below the default threshold. Jaro-Winkler's prefix bonus scores that
/// pair ~0.90, which would silently merge two distinct time series.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&token_sort(a), &token_sort(b))
}

fn token_sort(key: &str) -> String {
    let mut tokens: Vec<&str> = key.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Find the best existing identity for `canonical_key`, or signal a new one.
///
/// Tiers:
/// 1. Exact canonical equality (score 1.0 by definition).
/// 2. Fuzzy: best similarity >= `config.similarity_threshold`, only for keys
///    of at least `config.min_fuzzy_len` chars. Ties prefer the identity
///    with more aliases (more evidence), then the lexicographically smaller
///    canonical label.
pub fn find_match(
    canonical_key: &str,
    registry: &IdentityRegistry,
    config: &CompilerConfig,
) -> MatchOutcome {
    if let Some(id) = registry.lookup_exact(canonical_key) {
        return MatchOutcome::Existing(id);
    }

    if canonical_key.chars().count() < config.min_fuzzy_len {
        return MatchOutcome::New;
    }

    let mut best: Option<(f64, &LineItemIdentity)> = None;
    for identity in registry.identities() {
        let score = similarity(canonical_key, &identity.canonical_label);
        if score < config.similarity_threshold {
            continue;
        }

        best = match best {
            None => Some((score, identity)),
            Some((best_score, best_identity)) => {
                if score > best_score || (score == best_score && prefer(identity, best_identity)) {
                    Some((score, identity))
                } else {
                    Some((best_score, best_identity))
                }
            }
        };
    }

    match best {
        Some((_, identity)) => MatchOutcome::Existing(identity.identity_id),
        None => MatchOutcome::New,
    }
}

fn prefer(challenger: &LineItemIdentity, incumbent: &LineItemIdentity) -> bool {
    challenger.aliases.len() > incumbent.aliases.len()
        || (challenger.aliases.len() == incumbent.aliases.len()
            && challenger.canonical_label < incumbent.canonical_label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::IdentityRegistry;
    use crate::schema::{CompilerConfig, StatementType};

    fn registry_with(keys: &[&str]) -> IdentityRegistry {
        let config = CompilerConfig::default();
        let mut registry =
            IdentityRegistry::new("acme", StatementType::IncomeStatement, config);
        for key in keys {
            registry.register(key, key, None, None);
        }
        registry
    }

    #[test]
    fn test_exact_match() {
        let registry = registry_with(&["total revenue", "cost of goods sold"]);
        let config = CompilerConfig::default();

        assert_eq!(
            find_match("cost of goods sold", &registry, &config),
            MatchOutcome::Existing(1)
        );
    }

    #[test]
    fn test_fuzzy_match_minor_variant() {
        let registry = registry_with(&["total operating expenses"]);
        let config = CompilerConfig::default();

        assert_eq!(
            find_match("total operating expense", &registry, &config),
            MatchOutcome::Existing(0)
        );
    }

    #[test]
    fn test_word_order_insensitive() {
        let registry = registry_with(&["expenses operating total"]);
        let config = CompilerConfig::default();

        assert_eq!(
            find_match("total operating expenses", &registry, &config),
            MatchOutcome::Existing(0)
        );
    }

    #[test]
    fn test_no_cross_merge_subset_label() {
        let registry = registry_with(&["revenue"]);
        let config = CompilerConfig::default();

        assert!(similarity("revenue", "revenue growth") < config.similarity_threshold);
        assert_eq!(
            find_match("revenue growth", &registry, &config),
            MatchOutcome::New
        );
    }

    #[test]
    fn test_short_key_skips_fuzzy() {
        let registry = registry_with(&["taxes"]);
        let config = CompilerConfig::default();

        // 4 chars: below the fuzzy floor, so near-misses stay distinct.
        assert_eq!(find_match("taxs", &registry, &config), MatchOutcome::New);
    }

    #[test]
    fn test_below_threshold_is_new() {
        let registry = registry_with(&["interest income"]);
        let config = CompilerConfig::default();

        assert_eq!(
            find_match("deferred tax liabilities", &registry, &config),
            MatchOutcome::New
        );
    }

    #[test]
    fn test_tie_prefers_more_aliases() {
        let config = CompilerConfig::default();
        let mut registry =
            IdentityRegistry::new("acme", StatementType::IncomeStatement, config.clone());
        // Two identities equidistant from the probe; the second carries an
        // extra alias. Inserted directly so they stay distinct.
        let a_id = registry.insert_identity("net incomes a");
        registry.add_observation(a_id, "net incomes a", None, None);
        let id = registry.insert_identity("net incomes b");
        registry.add_observation(id, "net incomes b", None, None);
        registry.add_observation(id, "Net Incomes B", None, None);

        let a = similarity("net incomes x", "net incomes a");
        let b = similarity("net incomes x", "net incomes b");
        assert_eq!(a, b);
        assert!(a >= config.similarity_threshold);

        assert_eq!(
            find_match("net incomes x", &registry, &config),
            MatchOutcome::Existing(id)
        );
    }
}
