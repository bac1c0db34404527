//! Immutable rule storage shared by every live script instance.

use std::sync::Arc;

use hashbrown::HashMap;
use smartscript_types::{EntityLink, SourceType};

use super::rule::{RuleId, TriggerRule};

/// Every rule attached to one entity link, in evaluation order.
///
/// Owner scripts keep declaration (row) order; timed action lists are
/// ordered by rule id.
#[derive(Debug, Clone)]
pub struct RuleSet {
    link: EntityLink,
    rules: Vec<TriggerRule>,
    by_id: HashMap<RuleId, usize>,
}

impl RuleSet {
    pub fn new(link: EntityLink, mut rules: Vec<TriggerRule>) -> Self {
        if link.source_type == SourceType::TimedActionList {
            rules.sort_by_key(|r| r.id);
        }
        let by_id = rules.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        Self { link, rules, by_id }
    }

    /// A set with no rules (entities without scripts)
    pub fn empty(link: EntityLink) -> Self {
        Self::new(link, Vec::new())
    }

    pub fn link(&self) -> EntityLink {
        self.link
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    pub fn get(&self, id: RuleId) -> Option<&TriggerRule> {
        self.by_id.get(&id).map(|&i| &self.rules[i])
    }

    pub fn index_of(&self, id: RuleId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// All loaded rule sets, keyed by entity link.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    sets: HashMap<EntityLink, Arc<RuleSet>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, set: RuleSet) {
        self.sets.insert(set.link(), Arc::new(set));
    }

    pub fn for_link(&self, link: &EntityLink) -> Option<Arc<RuleSet>> {
        self.sets.get(link).cloned()
    }

    /// Rules for a spawned entity. A set written for the spawn's guid
    /// (negative entry) takes precedence over the template's set.
    pub fn for_spawn(&self, source_type: SourceType, entry: u32, guid: u64) -> Option<Arc<RuleSet>> {
        let guid_link = EntityLink::new(-(guid as i64), source_type);
        if guid != 0
            && let Some(set) = self.sets.get(&guid_link)
        {
            return Some(Arc::clone(set));
        }
        self.for_link(&EntityLink::new(entry as i64, source_type))
    }

    pub fn timed_list(&self, list_id: u32) -> Option<Arc<RuleSet>> {
        self.for_link(&EntityLink::timed_list(list_id))
    }

    /// Links in deterministic order
    pub fn links(&self) -> Vec<EntityLink> {
        let mut links: Vec<EntityLink> = self.sets.keys().copied().collect();
        links.sort();
        links
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Total rule count across all sets
    pub fn rule_count(&self) -> usize {
        self.sets.values().map(|s| s.len()).sum()
    }
}
