//! Data models for creature-builder stat blocks and the records derived from them.

use crate::error::Diagnostics;
use crate::vocabulary::Size;
use serde::ser::SerializeMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::ops::Deref;

/// A loosely-typed scalar from the builder export.
///
/// The builder writes most attributes either bare (`"speed": "30 feet"`) or
/// wrapped with bookkeeping (`"speed": {"value": "30 feet", "benchmark": ...}`).
/// Both shapes read the same.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Loose(Value);

impl Loose {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    fn inner(&self) -> &Value {
        match &self.0 {
            Value::Object(map) => map.get("value").unwrap_or(&Value::Null),
            other => other,
        }
    }

    /// The value as text; numbers are formatted, anything else is empty.
    pub fn text(&self) -> String {
        match self.inner() {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// The value as an integer, if it reads as one. A leading `+` is allowed
    /// and fractional values are truncated.
    pub fn as_int(&self) -> Option<i64> {
        match self.inner() {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => {
                let trimmed = s.trim();
                let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
                unsigned
                    .parse::<i64>()
                    .ok()
                    .or_else(|| unsigned.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        }
    }

    /// Integer coercion that degrades to 0. Blank values are 0 silently;
    /// anything else that is not a number is recorded as a field issue.
    pub fn int_or_zero(&self, field: &'static str, diagnostics: &mut Diagnostics) -> i64 {
        if self.is_blank() {
            return 0;
        }
        match self.as_int() {
            Some(n) => n,
            None => {
                diagnostics.unparseable(field, &self.text());
                0
            }
        }
    }

    /// Whether the builder considers this value set: non-empty text or a
    /// non-zero number.
    pub fn is_truthy(&self) -> bool {
        match self.inner() {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

impl From<&str> for Loose {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

/// A list field that never fails to decode.
///
/// A non-array value reads as an empty list and elements that do not decode
/// as `T` are skipped. Whatever was set aside is kept in `rejected` so the
/// parser can report it.
#[derive(Debug, Clone, PartialEq)]
pub struct LooseList<T> {
    items: Vec<T>,
    rejected: Vec<String>,
}

impl<T: DeserializeOwned> LooseList<T> {
    pub fn from_value(value: Value) -> Self {
        let mut list = Self::default();
        match value {
            Value::Null => {}
            Value::Array(elements) => {
                for element in elements {
                    let raw = element.to_string();
                    match serde_json::from_value::<T>(element) {
                        Ok(item) => list.items.push(item),
                        Err(_) => list.rejected.push(raw),
                    }
                }
            }
            other => list.rejected.push(other.to_string()),
        }
        list
    }
}

impl<T> LooseList<T> {
    /// Raw JSON of every value that was not read as an element.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Record every rejected value as a field issue.
    pub fn report(&self, field: &'static str, diagnostics: &mut Diagnostics) {
        for raw in &self.rejected {
            diagnostics.malformed(field, raw);
        }
    }
}

impl<T> Default for LooseList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Deref for LooseList<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> FromIterator<T> for LooseList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            rejected: Vec::new(),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for LooseList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

/// One creature as exported by the creature builder. Read-only input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStatBlock {
    pub name: Loose,
    pub level: Loose,
    pub alignment: Loose,
    pub size: Loose,
    #[serde(rename = "type")]
    pub creature_type: Loose,
    pub traits: Loose,
    pub description: Loose,
    pub languages: Loose,
    pub savenote: Loose,

    pub strength: Loose,
    pub dexterity: Loose,
    pub constitution: Loose,
    pub intelligence: Loose,
    pub wisdom: Loose,
    pub charisma: Loose,

    pub ac: Loose,
    pub perception: Loose,
    pub hp: Loose,
    pub fortitude: Loose,
    pub reflex: Loose,
    pub will: Loose,

    pub speed: Loose,
    pub resistance: Loose,
    pub weakness: Loose,
    pub immunity: Loose,

    pub strikes: LooseList<RawStrike>,
    pub specials: LooseList<RawSpecial>,

    pub spelltype: Loose,
    pub spells: LooseList<Loose>,
    pub spelldc: Loose,
    pub spellattack: Loose,
    pub morespells: LooseList<RawSpellGroup>,

    /// Everything else, including the per-skill fields.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl RawStatBlock {
    /// Record every list entry that was skipped while decoding.
    pub fn report_malformed(&self, diagnostics: &mut Diagnostics) {
        self.strikes.report("strikes", diagnostics);
        self.specials.report("specials", diagnostics);
        self.spells.report("spells", diagnostics);
        self.morespells.report("morespells", diagnostics);
        for group in self.morespells.iter() {
            group.spells.report("morespells.spells", diagnostics);
        }
    }

    /// The primary casting tradition, if the block declares one.
    pub fn primary_spells(&self) -> Option<RawSpellGroup> {
        if !self.spelltype.is_truthy() {
            return None;
        }
        Some(RawSpellGroup {
            name: self.spelltype.clone(),
            spells: self.spells.clone(),
            spelldc: self.spelldc.clone(),
            spellattack: self.spellattack.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStrike {
    pub name: Loose,
    #[serde(rename = "type")]
    pub strike_type: Loose,
    pub attack: Loose,
    pub damage: Loose,
    pub traits: Loose,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSpecial {
    pub id: Loose,
    pub name: Loose,
    pub traits: Loose,
    pub actions: Loose,
    /// `offense`, `defense` or `general`.
    #[serde(rename = "type")]
    pub special_type: Loose,
    pub description: Loose,
}

/// A tradition descriptor plus its spell lists, highest level first.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSpellGroup {
    pub name: Loose,
    pub spells: LooseList<Loose>,
    pub spelldc: Loose,
    pub spellattack: Loose,
}

/// `{ "value": T }`, the host's wrapper for most scalar fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Valued<T> {
    pub value: T,
}

impl<T> Valued<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbilityModifier {
    #[serde(rename = "mod")]
    pub modifier: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Abilities {
    pub str: AbilityModifier,
    pub dex: AbilityModifier,
    pub con: AbilityModifier,
    pub int: AbilityModifier,
    pub wis: AbilityModifier,
    pub cha: AbilityModifier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitPoints {
    pub value: i64,
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherSpeed {
    #[serde(rename = "type")]
    pub speed_type: String,
    pub value: String,
}

/// Base land speed plus named auxiliary speeds in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub value: String,
    pub details: String,
    pub other_speeds: Vec<OtherSpeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    pub ac: Valued<i64>,
    pub perception: Valued<i64>,
    pub hp: HitPoints,
    pub all_saves: Valued<String>,
    pub speed: Movement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    pub level: Valued<i64>,
    pub alignment: Valued<String>,
    pub public_notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Saves {
    pub fortitude: Valued<i64>,
    pub reflex: Valued<i64>,
    pub will: Valued<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resistance {
    #[serde(rename = "type")]
    pub resistance_type: String,
    pub value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exceptions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weakness {
    #[serde(rename = "type")]
    pub weakness_type: String,
    pub value: i64,
}

/// Size, rarity, languages, creature traits and the three IWR lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitsBlock {
    pub size: Valued<Size>,
    pub rarity: String,
    pub languages: Valued<Vec<String>>,
    pub value: Vec<String>,
    /// Weaknesses.
    pub dv: Vec<Weakness>,
    /// Resistances.
    pub dr: Vec<Resistance>,
    /// Immunities.
    pub di: Valued<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatureSystem {
    pub abilities: Abilities,
    pub attributes: Attributes,
    pub details: Details,
    pub traits: TraitsBlock,
    pub saves: Saves,
}

/// Attribute updates for the creature document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatureUpdates {
    pub name: String,
    pub system: CreatureSystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Action,
    Free,
    Reaction,
    Passive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSystem {
    pub action_type: Valued<ActionType>,
    /// Number of actions, only set for `ActionType::Action`.
    pub actions: Valued<Option<u8>>,
    pub action_category: Valued<String>,
    pub description: Valued<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    pub name: String,
    pub system: ActionSystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponType {
    Melee,
    Ranged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageRoll {
    pub damage: String,
    pub damage_type: String,
}

/// Damage rolls keyed by generated id, serialized as a map in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DamageRolls(pub Vec<(String, DamageRoll)>);

impl DamageRolls {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn rolls(&self) -> impl Iterator<Item = &DamageRoll> {
        self.0.iter().map(|(_, roll)| roll)
    }
}

impl Serialize for DamageRolls {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, roll) in &self.0 {
            map.serialize_entry(id, roll)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrikeSystem {
    pub bonus: Valued<i64>,
    pub weapon_type: Valued<WeaponType>,
    pub damage_rolls: DamageRolls,
    pub attack_effects: Valued<Vec<String>>,
    pub traits: Valued<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrikeRecord {
    pub name: String,
    pub system: StrikeSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillSystem {
    #[serde(rename = "mod")]
    pub modifier: Valued<i64>,
    pub proficient: Valued<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub system: SkillSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedSpell {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpellSlot {
    pub prepared: Vec<PreparedSpell>,
    pub value: u32,
    pub max: u32,
}

/// Slots for every level from 0 up, serialized as `slot0`, `slot1`, ...
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotTable(pub Vec<SpellSlot>);

impl SlotTable {
    pub fn level(&self, level: usize) -> Option<&SpellSlot> {
        self.0.get(level)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SlotTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (level, slot) in self.0.iter().enumerate() {
            map.serialize_entry(&format!("slot{}", level), slot)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpellDc {
    /// Spell attack modifier.
    pub value: i64,
    pub dc: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpellcastingSystem {
    pub ability: Valued<String>,
    pub spelldc: SpellDc,
    pub tradition: Valued<String>,
    pub prepared: Valued<String>,
    pub proficiency: Valued<i64>,
    pub slots: SlotTable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpellcastingEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub system: SpellcastingSystem,
}

/// A copy of a canonical spell, re-identified and attached to a casting entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpellRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub system: Value,
    /// Remaining fields of the canonical record, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SpellRecord {
    /// Id of the owning spellcasting entry.
    pub fn location(&self) -> Option<&str> {
        self.system.pointer("/location/value").and_then(Value::as_str)
    }

    pub fn heightened_level(&self) -> Option<u64> {
        self.system
            .pointer("/location/heightenedLevel")
            .and_then(Value::as_u64)
    }
}

/// Any record created for the host's item collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ItemRecord {
    Melee(StrikeRecord),
    Action(ActionRecord),
    Lore(SkillRecord),
    SpellcastingEntry(SpellcastingEntry),
    Spell(SpellRecord),
}

impl ItemRecord {
    pub fn name(&self) -> &str {
        match self {
            ItemRecord::Melee(r) => &r.name,
            ItemRecord::Action(r) => &r.name,
            ItemRecord::Lore(r) => &r.name,
            ItemRecord::SpellcastingEntry(r) => &r.name,
            ItemRecord::Spell(r) => &r.name,
        }
    }

    /// Generated id, for the record kinds that carry one.
    pub fn id(&self) -> Option<&str> {
        match self {
            ItemRecord::Lore(r) => Some(&r.id),
            ItemRecord::SpellcastingEntry(r) => Some(&r.id),
            ItemRecord::Spell(r) => Some(&r.id),
            ItemRecord::Melee(_) | ItemRecord::Action(_) => None,
        }
    }
}

/// Everything one parse produces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResults {
    pub updates: CreatureUpdates,
    pub items: Vec<ItemRecord>,
    pub spell_items: Vec<ItemRecord>,
    pub diagnostics: Diagnostics,
}
