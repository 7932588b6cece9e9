//! Spell resolution: tradition descriptors and spell lists become a
//! spellcasting entry plus copies of the canonical spell records.

use crate::error::{Diagnostics, ImportError, Result};
use crate::ids::IdGenerator;
use crate::models::{
    PreparedSpell, RawSpellGroup, SlotTable, SpellDc, SpellRecord, SpellSlot, SpellcastingEntry,
    SpellcastingSystem, Valued,
};
use crate::text::{capitalize_words, strip_tags};
use crate::vocabulary::{TRADITIONS, Vocabulary};
use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

lazy_static! {
    static ref REPETITION_COUNT: Regex = Regex::new(r"\([^\d)]*(\d+)[^\d)]*\)").unwrap();
    static ref TRAILING_PARENTHETICAL: Regex = Regex::new(r"\s*\([^)]*\)\s*$").unwrap();
}

const DEFAULT_TRADITION: &str = "arcane";
const DEFAULT_PREPARATION: &str = "innate";
const PREPARED: &str = "prepared";
/// Upper bound on how many times one list entry is prepared.
const MAX_REPETITIONS: u32 = 20;

/// Name → canonical spell record lookup supplied by the host.
pub trait SpellIndex {
    /// Whether the index can be queried at all. An unavailable index makes
    /// every tradition resolve without spells.
    fn is_available(&self) -> bool {
        true
    }

    /// Case-insensitive exact-name lookup.
    fn lookup_by_name(&self, name: &str) -> impl Future<Output = Result<Option<Value>>>;
}

/// Spell index held in memory, keyed by lowercase spell name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpellIndex {
    by_name: HashMap<String, Value>,
}

impl InMemorySpellIndex {
    /// Build from canonical records; records without a `name` are skipped.
    pub fn from_records(records: impl IntoIterator<Item = Value>) -> Self {
        let mut by_name = HashMap::new();
        for record in records {
            match record.get("name").and_then(Value::as_str) {
                Some(name) => {
                    by_name.insert(name.to_lowercase(), record);
                }
                None => tracing::debug!("Skipping spell record without a name"),
            }
        }
        Self { by_name }
    }

    /// Load a JSON file holding either an array of spell records or an
    /// object whose values are spell records.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ImportError::NotFound(format!("spell index {}", path.display())));
        }
        let content = crate::file_utils::read_text_file(path)?;
        let records = match serde_json::from_str::<Value>(&content)? {
            Value::Array(records) => records,
            Value::Object(map) => map.into_iter().map(|(_, record)| record).collect(),
            _ => {
                return Err(ImportError::Parse(format!(
                    "{}: expected an array or object of spell records",
                    path.display()
                )));
            }
        };
        let index = Self::from_records(records);
        tracing::info!("Loaded {} spells from {}", index.len(), path.display());
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl SpellIndex for InMemorySpellIndex {
    async fn lookup_by_name(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.by_name.get(&name.to_lowercase()).cloned())
    }
}

/// Stand-in used when no spell index could be reached.
#[derive(Debug, Clone)]
pub struct UnavailableSpellIndex {
    reason: String,
}

impl UnavailableSpellIndex {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl SpellIndex for UnavailableSpellIndex {
    fn is_available(&self) -> bool {
        false
    }

    async fn lookup_by_name(&self, _name: &str) -> Result<Option<Value>> {
        Err(ImportError::SpellIndexUnavailable(self.reason.clone()))
    }
}

/// Tradition and preparation type read from a descriptor like `"Divine Innate"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraditionDescriptor {
    pub tradition: String,
    pub preparation: String,
}

impl TraditionDescriptor {
    pub fn parse(descriptor: &str, vocabulary: &Vocabulary, diagnostics: &mut Diagnostics) -> Self {
        let mut tokens = descriptor.split_whitespace().map(str::to_lowercase);

        let tradition = match tokens.next() {
            Some(token) if TRADITIONS.contains(&token.as_str()) => token,
            Some(token) => {
                diagnostics.unknown("tradition", &token);
                DEFAULT_TRADITION.to_string()
            }
            None => DEFAULT_TRADITION.to_string(),
        };

        let preparation = match tokens.next() {
            Some(token) if vocabulary.preparation_types.contains(&token) => token,
            Some(token) => {
                diagnostics.unknown("preparation", &token);
                DEFAULT_PREPARATION.to_string()
            }
            None => DEFAULT_PREPARATION.to_string(),
        };

        Self {
            tradition,
            preparation,
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.preparation == PREPARED
    }

    pub fn entry_name(&self) -> String {
        capitalize_words(&format!("{} {} Spells", self.tradition, self.preparation))
    }
}

/// One name from a level's spell list with how many times it is prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellListEntry {
    pub name: String,
    pub count: u32,
}

/// Split one level's comma-separated list. `Fireball (2)` is prepared twice,
/// up to `MAX_REPETITIONS`; any other trailing parenthetical is dropped from
/// the lookup name.
pub fn parse_spell_list(raw: &str) -> Vec<SpellListEntry> {
    raw.split(',')
        .filter_map(|item| {
            let item = strip_tags(item);
            let item = item.trim();
            if item.is_empty() {
                return None;
            }
            let count = REPETITION_COUNT
                .captures(item)
                .map(|caps| {
                    caps[1]
                        .parse::<u32>()
                        .map_or(MAX_REPETITIONS, |n| n.min(MAX_REPETITIONS))
                })
                .unwrap_or(1);
            let name = TRAILING_PARENTHETICAL.replace(item, "").trim().to_string();
            if name.is_empty() {
                return None;
            }
            Some(SpellListEntry { name, count })
        })
        .collect()
}

/// A spellcasting entry and the spell copies it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTradition {
    pub entry: SpellcastingEntry,
    pub spells: Vec<SpellRecord>,
}

/// Resolves tradition groups against a spell index.
#[derive(Debug, Clone)]
pub struct SpellResolver<'a> {
    vocabulary: &'a Vocabulary,
    max_spell_level: usize,
}

impl<'a> SpellResolver<'a> {
    pub fn new(vocabulary: &'a Vocabulary, max_spell_level: u8) -> Self {
        Self {
            vocabulary,
            max_spell_level: max_spell_level as usize,
        }
    }

    /// Resolve one tradition group. When the index is unavailable the entry
    /// is still built, with empty slots and no spells, and the failure is
    /// reported as a notification.
    pub async fn resolve<I: SpellIndex>(
        &self,
        group: &RawSpellGroup,
        index: &I,
        ids: &mut IdGenerator,
        diagnostics: &mut Diagnostics,
    ) -> ResolvedTradition {
        let descriptor = TraditionDescriptor::parse(&group.name.text(), self.vocabulary, diagnostics);
        let entry_id = ids.next_id();

        if !index.is_available() {
            diagnostics.notify(format!(
                "Spell index unavailable; {} imported without spells",
                descriptor.entry_name()
            ));
            let slots = vec![SpellSlot::default(); self.max_spell_level + 1];
            return ResolvedTradition {
                entry: self.entry(entry_id, &descriptor, group, slots, diagnostics),
                spells: Vec::new(),
            };
        }

        // Source lists run from the highest level down to cantrips.
        let levels: Vec<(usize, Vec<SpellListEntry>)> = group
            .spells
            .iter()
            .rev()
            .enumerate()
            .map(|(level, list)| (level, parse_spell_list(&list.text())))
            .collect();

        let lookups: Vec<(usize, &SpellListEntry)> = levels
            .iter()
            .flat_map(|(level, entries)| entries.iter().map(move |entry| (*level, entry)))
            .collect();
        let found = join_all(lookups.iter().map(|(_, entry)| async move {
            match index.lookup_by_name(&entry.name).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!("Lookup of '{}' failed: {}", entry.name, e);
                    None
                }
            }
        }))
        .await;

        let slot_count = self.max_spell_level.max(levels.len().saturating_sub(1)) + 1;
        let mut slots: Vec<SpellSlot> = vec![SpellSlot::default(); slot_count];
        let mut spells = Vec::new();

        for ((level, entry), record) in lookups.into_iter().zip(found) {
            let Some(record) = record else {
                tracing::debug!("Spell '{}' not in index, omitted", entry.name);
                continue;
            };

            let heightened = (level > 0 && !descriptor.is_prepared()).then_some(level);
            let spell = copy_spell(record, ids.next_id(), &entry_id, heightened);

            if descriptor.is_prepared() {
                let slot = &mut slots[level];
                for _ in 0..entry.count {
                    slot.prepared.push(PreparedSpell { id: spell.id.clone() });
                }
                slot.value = slot.value.saturating_add(entry.count);
                slot.max = slot.max.saturating_add(entry.count);
            }
            spells.push(spell);
        }

        tracing::debug!(
            "Resolved {} spells for {}",
            spells.len(),
            descriptor.entry_name()
        );

        ResolvedTradition {
            entry: self.entry(entry_id, &descriptor, group, slots, diagnostics),
            spells,
        }
    }

    fn entry(
        &self,
        id: String,
        descriptor: &TraditionDescriptor,
        group: &RawSpellGroup,
        slots: Vec<SpellSlot>,
        diagnostics: &mut Diagnostics,
    ) -> SpellcastingEntry {
        SpellcastingEntry {
            id,
            name: descriptor.entry_name(),
            system: SpellcastingSystem {
                ability: Valued::new("cha".to_string()),
                spelldc: SpellDc {
                    value: group.spellattack.int_or_zero("spellattack", diagnostics),
                    dc: group.spelldc.int_or_zero("spelldc", diagnostics),
                },
                tradition: Valued::new(descriptor.tradition.clone()),
                prepared: Valued::new(descriptor.preparation.clone()),
                proficiency: Valued::new(1),
                slots: SlotTable(slots),
            },
        }
    }
}

/// Copy a canonical record under a new id, pointing it at its casting entry.
fn copy_spell(record: Value, id: String, entry_id: &str, heightened: Option<usize>) -> SpellRecord {
    let mut extra = match record {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let name = match extra.remove("name") {
        Some(Value::String(name)) => name,
        _ => String::new(),
    };
    let mut system = match extra.remove("system") {
        Some(Value::Object(system)) => system,
        _ => Map::new(),
    };
    extra.remove("_id");
    extra.remove("type");

    let mut location = Map::new();
    location.insert("value".to_string(), json!(entry_id));
    if let Some(level) = heightened {
        location.insert("heightenedLevel".to_string(), json!(level));
    }
    system.insert("location".to_string(), Value::Object(location));

    SpellRecord {
        id,
        name,
        system: Value::Object(system),
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Loose;
    use futures::executor::block_on;

    fn index() -> InMemorySpellIndex {
        InMemorySpellIndex::from_records(vec![
            json!({"_id": "canon1", "name": "Fireball", "type": "spell", "system": {"level": {"value": 3}}, "img": "fire.webp"}),
            json!({"_id": "canon2", "name": "Magic Missile", "type": "spell", "system": {"level": {"value": 1}}}),
            json!({"_id": "canon3", "name": "Detect Magic", "type": "spell", "system": {"level": {"value": 1}}}),
            json!({"_id": "canon4", "name": "Shield", "type": "spell", "system": {"level": {"value": 1}}}),
        ])
    }

    fn group(name: &str, spells: &[&str]) -> RawSpellGroup {
        RawSpellGroup {
            name: Loose::from(name),
            spells: spells.iter().map(|s| Loose::from(*s)).collect(),
            spelldc: Loose::from("25"),
            spellattack: Loose::from("+17"),
        }
    }

    fn resolve(group: &RawSpellGroup, index: &impl SpellIndex) -> (ResolvedTradition, Diagnostics) {
        resolve_up_to(group, index, 10)
    }

    fn resolve_up_to(
        group: &RawSpellGroup,
        index: &impl SpellIndex,
        max_spell_level: u8,
    ) -> (ResolvedTradition, Diagnostics) {
        let vocabulary = Vocabulary::default();
        let resolver = SpellResolver::new(&vocabulary, max_spell_level);
        let mut ids = IdGenerator::seeded(1);
        let mut diagnostics = Diagnostics::new();
        let resolved = block_on(resolver.resolve(group, index, &mut ids, &mut diagnostics));
        (resolved, diagnostics)
    }

    #[test]
    fn test_descriptor_defaults() {
        let vocabulary = Vocabulary::default();
        let mut diagnostics = Diagnostics::new();

        let parsed = TraditionDescriptor::parse("", &vocabulary, &mut diagnostics);
        assert_eq!(parsed.tradition, "arcane");
        assert_eq!(parsed.preparation, "innate");
        assert!(diagnostics.is_empty());

        let parsed = TraditionDescriptor::parse("Eldritch Whatever", &vocabulary, &mut diagnostics);
        assert_eq!(parsed.tradition, "arcane");
        assert_eq!(parsed.preparation, "innate");
        assert_eq!(diagnostics.issues.len(), 2);

        let parsed = TraditionDescriptor::parse("Divine Prepared", &vocabulary, &mut diagnostics);
        assert_eq!(parsed.tradition, "divine");
        assert!(parsed.is_prepared());
        assert_eq!(parsed.entry_name(), "Divine Prepared Spells");
    }

    #[test]
    fn test_parse_spell_list() {
        let entries = parse_spell_list("<em>Fireball</em> (2), Detect Magic (at will), , Shield");
        assert_eq!(
            entries,
            vec![
                SpellListEntry { name: "Fireball".to_string(), count: 2 },
                SpellListEntry { name: "Detect Magic".to_string(), count: 1 },
                SpellListEntry { name: "Shield".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_prepared_slot_totals() {
        let group = group("Arcane Prepared", &["Fireball (2)", "", "Magic Missile, Shield (3)", "Detect Magic"]);
        let (resolved, diagnostics) = resolve(&group, &index());
        let slots = &resolved.entry.system.slots;

        assert!(diagnostics.notifications.is_empty());
        assert_eq!(slots.len(), 11);
        for level in 0..slots.len() {
            let slot = slots.level(level).unwrap();
            assert_eq!(slot.value, slot.max);
            assert_eq!(slot.value as usize, slot.prepared.len());
        }
        assert_eq!(slots.level(0).unwrap().value, 1);
        assert_eq!(slots.level(1).unwrap().value, 4);
        assert_eq!(slots.level(2).unwrap().value, 0);
        assert_eq!(slots.level(3).unwrap().value, 2);
        assert_eq!(slots.level(10).unwrap().value, 0);

        // Prepared spells keep their base level.
        assert!(resolved.spells.iter().all(|s| s.heightened_level().is_none()));
    }

    #[test]
    fn test_innate_spells_are_heightened_to_their_list_level() {
        let group = group("Primal Innate", &["Fireball", "Magic Missile", "Detect Magic"]);
        let (resolved, _) = resolve(&group, &index());

        let names: Vec<&str> = resolved.spells.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Detect Magic", "Magic Missile", "Fireball"]);
        assert_eq!(resolved.spells[0].heightened_level(), None);
        assert_eq!(resolved.spells[1].heightened_level(), Some(1));
        assert_eq!(resolved.spells[2].heightened_level(), Some(2));
        assert!(resolved.entry.system.slots.level(1).unwrap().prepared.is_empty());
        assert_eq!(resolved.entry.system.slots.len(), 11);
    }

    #[test]
    fn test_spell_copies_are_reidentified() {
        let group = group("Arcane Spontaneous", &["Fireball"]);
        let (resolved, _) = resolve(&group, &index());
        let spell = &resolved.spells[0];

        assert_ne!(spell.id, "canon1");
        assert_eq!(spell.location(), Some(resolved.entry.id.as_str()));
        assert_eq!(spell.system["level"]["value"], 3);
        assert_eq!(spell.extra.get("img"), Some(&json!("fire.webp")));
        assert!(!spell.extra.contains_key("_id"));
        assert_eq!(resolved.entry.system.spelldc, SpellDc { value: 17, dc: 25 });
        assert_eq!(resolved.entry.system.ability.value, "cha");
    }

    #[test]
    fn test_misses_are_omitted_silently() {
        let group = group("Occult Innate", &["Wish, Fireball"]);
        let (resolved, diagnostics) = resolve(&group, &index());
        assert_eq!(resolved.spells.len(), 1);
        assert!(diagnostics.notifications.is_empty());
    }

    #[test]
    fn test_unavailable_index_keeps_entry_without_spells() {
        let group = group("Arcane Prepared", &["Fireball (2)", "Shield"]);
        let (resolved, diagnostics) = resolve(&group, &UnavailableSpellIndex::new("offline"));
        let system = &resolved.entry.system;

        assert_eq!(resolved.entry.name, "Arcane Prepared Spells");
        assert_eq!(system.spelldc, SpellDc { value: 17, dc: 25 });
        assert_eq!(system.prepared.value, "prepared");
        assert_eq!(system.slots.len(), 11);
        assert!(system.slots.0.iter().all(|slot| *slot == SpellSlot::default()));
        assert!(resolved.spells.is_empty());
        assert_eq!(diagnostics.notifications.len(), 1);
    }

    #[test]
    fn test_slot_table_covers_configured_maximum() {
        let group = group("Arcane Prepared", &["Fireball", "Shield"]);
        let (resolved, _) = resolve_up_to(&group, &index(), 11);
        let slots = &resolved.entry.system.slots;

        assert_eq!(slots.len(), 12);
        assert_eq!(slots.level(0).unwrap().value, 1);
        assert_eq!(slots.level(1).unwrap().value, 1);
        assert_eq!(slots.level(11).unwrap().value, 0);
    }

    #[test]
    fn test_slot_table_grows_past_maximum_for_long_lists() {
        let mut lists = vec!["Fireball"];
        lists.extend(std::iter::repeat_n("", 11));
        lists.push("Detect Magic");
        let group = group("Arcane Prepared", &lists);
        let (resolved, _) = resolve(&group, &index());
        let slots = &resolved.entry.system.slots;

        assert_eq!(slots.len(), 13);
        assert_eq!(slots.level(0).unwrap().value, 1);
        assert_eq!(slots.level(12).unwrap().value, 1);
        assert_eq!(resolved.spells.len(), 2);
    }

    #[test]
    fn test_repetition_count_is_capped() {
        for raw in ["Fireball (4294967295)", "Fireball (99999999999)", "Fireball (x21)"] {
            let entries = parse_spell_list(raw);
            assert_eq!(entries.len(), 1, "{raw}");
            assert_eq!(entries[0].name, "Fireball");
            assert_eq!(entries[0].count, MAX_REPETITIONS, "{raw}");
        }

        let group = group("Arcane Prepared", &["Fireball (4294967295)"]);
        let (resolved, _) = resolve(&group, &index());
        let slot = resolved.entry.system.slots.level(0).unwrap();
        assert_eq!(slot.value, MAX_REPETITIONS);
        assert_eq!(slot.prepared.len(), MAX_REPETITIONS as usize);
    }

    #[test]
    fn test_index_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("spells.json");
        std::fs::write(&path, r#"{"a": {"name": "Fireball"}, "b": {"name": "Shield"}}"#).unwrap();

        let index = InMemorySpellIndex::from_file(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert!(block_on(index.lookup_by_name("FIREBALL")).unwrap().is_some());

        let missing = InMemorySpellIndex::from_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ImportError::NotFound(_))));
    }
}
