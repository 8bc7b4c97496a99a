use crate::matcher::{self, MatchOutcome};
use crate::schema::{CompilerConfig, LineItemIdentity, StatementType};
use log::warn;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct AliasStats {
    count: u64,
    last_seen: u64,
}

/// The per-(company, statement type) mapping from line-item identity to the
/// raw labels observed for it. Scoped narrowly on purpose: "Revenue" on an
/// income statement and a similarly-named concept elsewhere must never share
/// an identity. Rebuilt from scratch on every compilation run, so identity
/// ids are registration order and deterministic for a given input set.
#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    company_id: String,
    statement_type: StatementType,
    config: CompilerConfig,
    identities: Vec<LineItemIdentity>,
    by_canonical: BTreeMap<String, u32>,
    alias_stats: Vec<BTreeMap<String, AliasStats>>,
    warnings: Vec<String>,
    observation_counter: u64,
}

impl IdentityRegistry {
    pub fn new(
        company_id: impl Into<String>,
        statement_type: StatementType,
        config: CompilerConfig,
    ) -> Self {
        Self {
            company_id: company_id.into(),
            statement_type,
            config,
            identities: Vec::new(),
            by_canonical: BTreeMap::new(),
            alias_stats: Vec::new(),
            warnings: Vec::new(),
            observation_counter: 0,
        }
    }

    /// Match `canonical_key` against the known identities (exact, then
    /// fuzzy) and record the observation on the winner, minting a fresh
    /// identity when nothing scores above the threshold. Returns the
    /// identity id the observation was attached to.
    pub fn register(
        &mut self,
        canonical_key: &str,
        raw_label: &str,
        level_hint: Option<u32>,
        total_hint: Option<bool>,
    ) -> u32 {
        let id = match matcher::find_match(canonical_key, self, &self.config) {
            MatchOutcome::Existing(id) => id,
            MatchOutcome::New => self.insert_identity(canonical_key),
        };
        self.add_observation(id, raw_label, level_hint, total_hint);
        id
    }

    /// Mint an identity for a canonical key, or return the existing one.
    /// Canonical labels are unique within the registry by construction.
    pub(crate) fn insert_identity(&mut self, canonical_key: &str) -> u32 {
        if let Some(&id) = self.by_canonical.get(canonical_key) {
            return id;
        }

        let id = self.identities.len() as u32;
        self.identities.push(LineItemIdentity {
            identity_id: id,
            canonical_label: canonical_key.to_string(),
            display_label: String::new(),
            aliases: Default::default(),
            level: None,
            is_total: None,
        });
        self.alias_stats.push(BTreeMap::new());
        self.by_canonical.insert(canonical_key.to_string(), id);
        id
    }

    /// Record one observation of `raw_label` against an identity: track the
    /// alias, re-elect the display label, and apply structural hints with
    /// first-observation-wins semantics.
    pub(crate) fn add_observation(
        &mut self,
        id: u32,
        raw_label: &str,
        level_hint: Option<u32>,
        total_hint: Option<bool>,
    ) {
        self.observation_counter += 1;
        let seen_at = self.observation_counter;

        let stats = &mut self.alias_stats[id as usize];
        let entry = stats.entry(raw_label.to_string()).or_default();
        entry.count += 1;
        entry.last_seen = seen_at;

        let identity = &mut self.identities[id as usize];
        identity.aliases.insert(raw_label.to_string());

        // Most frequent alias wins display; recency breaks ties.
        if let Some((label, _)) = stats
            .iter()
            .max_by_key(|(_, s)| (s.count, s.last_seen))
        {
            identity.display_label = label.clone();
        }

        // Structural metadata is first-observation-wins: later documents may
        // format the same statement differently, so the earliest layout
        // signal is the one we trust.
        match (identity.level, level_hint) {
            (None, Some(hint)) => identity.level = Some(hint),
            (Some(existing), Some(hint)) if existing != hint => {
                let msg = format!(
                    "Registry inconsistency for '{}' ({:?}, company {}): level hint {} contradicts established level {}; keeping {}",
                    identity.canonical_label,
                    self.statement_type,
                    self.company_id,
                    hint,
                    existing,
                    existing
                );
                warn!("{}", msg);
                self.warnings.push(msg);
            }
            _ => {}
        }

        match (identity.is_total, total_hint) {
            (None, Some(hint)) => identity.is_total = Some(hint),
            (Some(existing), Some(hint)) if existing != hint => {
                let msg = format!(
                    "Registry inconsistency for '{}' ({:?}, company {}): is_total hint {} contradicts established value {}; keeping {}",
                    identity.canonical_label,
                    self.statement_type,
                    self.company_id,
                    hint,
                    existing,
                    existing
                );
                warn!("{}", msg);
                self.warnings.push(msg);
            }
            _ => {}
        }
    }

    pub fn lookup_exact(&self, canonical_key: &str) -> Option<u32> {
        self.by_canonical.get(canonical_key).copied()
    }

    pub fn identities(&self) -> &[LineItemIdentity] {
        &self.identities
    }

    pub fn get(&self, id: u32) -> Option<&LineItemIdentity> {
        self.identities.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StatementType;

    fn registry() -> IdentityRegistry {
        IdentityRegistry::new(
            "acme",
            StatementType::IncomeStatement,
            CompilerConfig::default(),
        )
    }

    #[test]
    fn test_canonical_uniqueness() {
        let mut reg = registry();
        let a = reg.register("total revenue", "Total Revenue", None, None);
        let b = reg.register("total revenue", "TOTAL REVENUE", None, None);

        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(a).unwrap().aliases.len(), 2);
    }

    #[test]
    fn test_display_label_most_frequent() {
        let mut reg = registry();
        let id = reg.register("cost of goods sold", "COGS", None, None);
        reg.register("cost of goods sold", "Cost of Goods Sold", None, None);
        reg.register("cost of goods sold", "Cost of Goods Sold", None, None);

        assert_eq!(reg.get(id).unwrap().display_label, "Cost of Goods Sold");
    }

    #[test]
    fn test_display_label_tie_breaks_by_recency() {
        let mut reg = registry();
        let id = reg.register("total revenue", "Total Revenue", None, None);
        reg.register("total revenue", "Total revenue", None, None);

        // Both aliases seen once; the later observation wins.
        assert_eq!(reg.get(id).unwrap().display_label, "Total revenue");
    }

    #[test]
    fn test_metadata_first_observation_wins() {
        let mut reg = registry();
        let id = reg.register("gross profit", "Gross Profit", Some(1), Some(true));
        reg.register("gross profit", "Gross profit", Some(2), Some(false));

        let identity = reg.get(id).unwrap();
        assert_eq!(identity.level, Some(1));
        assert_eq!(identity.is_total, Some(true));
        assert_eq!(reg.warnings().len(), 2);
    }

    #[test]
    fn test_late_hint_fills_unset_metadata() {
        let mut reg = registry();
        let id = reg.register("gross profit", "Gross Profit", None, None);
        reg.register("gross profit", "Gross profit", Some(1), None);

        let identity = reg.get(id).unwrap();
        assert_eq!(identity.level, Some(1));
        assert!(reg.warnings().is_empty());
    }

    #[test]
    fn test_fuzzy_register_attaches_alias() {
        let mut reg = registry();
        let a = reg.register("total operating expenses", "Total Operating Expenses", None, None);
        let b = reg.register("total operating expense", "Total operating expense", None, None);

        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
        // The identity keeps its original canonical label.
        assert_eq!(
            reg.get(a).unwrap().canonical_label,
            "total operating expenses"
        );
    }
}
