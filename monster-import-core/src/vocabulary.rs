//! Lookup tables the importer validates tokens against, and the TOML
//! configuration that can override them.
//!
//! Every table has a built-in default matching the PF2e system, so an empty
//! configuration file is valid:
//! ```toml
//! [parser]
//! max_spell_level = 11
//!
//! [vocabulary]
//! attack_effects = ["grab", "improved-grab", "constrict"]
//! ```

use crate::error::{ImportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Creature size category, serialized with the host's short keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Size {
    #[serde(rename = "tiny")]
    Tiny,
    #[serde(rename = "sm")]
    Small,
    #[default]
    #[serde(rename = "med")]
    Medium,
    #[serde(rename = "lg")]
    Large,
    #[serde(rename = "huge")]
    Huge,
    #[serde(rename = "grg")]
    Gargantuan,
}

/// The four magic traditions. Not configurable.
pub const TRADITIONS: [&str; 4] = ["arcane", "divine", "occult", "primal"];

pub const ALIGNMENTS: [&str; 9] = ["LG", "NG", "CG", "LN", "N", "CN", "LE", "NE", "CE"];

/// Saving throws recognized by the inline-check pass.
pub const SAVES: [&str; 3] = ["Fortitude", "Reflex", "Will"];

/// Parser behaviour that depends on the host engine version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Highest spell slot level; 10 for older engines, 11 for later ones.
    pub max_spell_level: u8,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self { max_spell_level: 10 }
    }
}

/// Read-only vocabularies supplied by the host system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub rarities: BTreeSet<String>,
    pub languages: BTreeSet<String>,
    pub creature_traits: BTreeSet<String>,
    pub resistance_types: BTreeSet<String>,
    pub weakness_types: BTreeSet<String>,
    pub immunity_types: BTreeSet<String>,
    /// Movement types, including the base `land` type.
    pub speed_types: BTreeSet<String>,
    /// Skill display names, capitalized.
    pub skills: Vec<String>,
    pub attack_effects: BTreeSet<String>,
    pub attack_traits: BTreeSet<String>,
    pub preparation_types: BTreeSet<String>,
    /// Raw size token → size category.
    pub sizes: BTreeMap<String, Size>,
    /// Damage type key → display name.
    pub damage_types: BTreeMap<String, String>,
    /// Condition slug → display name.
    pub conditions: BTreeMap<String, String>,
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn labelled(values: &[&str]) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|label| (crate::text::sluggify(label), label.to_string()))
        .collect()
}

const DAMAGE_TYPES: &[&str] = &[
    "Acid", "Bleed", "Bludgeoning", "Chaotic", "Cold", "Electricity", "Evil", "Fire", "Force",
    "Good", "Lawful", "Mental", "Negative", "Piercing", "Poison", "Positive", "Slashing", "Sonic",
    "Spirit", "Untyped", "Vitality", "Void",
];

const ENERGY_AND_MATERIALS: &[&str] = &[
    "acid", "adamantine", "area-damage", "bleed", "bludgeoning", "chaotic", "cold", "cold-iron",
    "critical-hits", "darkwood", "electricity", "evil", "fire", "force", "good", "lawful",
    "magical", "mental", "mythril", "negative", "non-magical", "orichalcum", "physical",
    "piercing", "poison", "positive", "precision", "silver", "slashing", "sonic", "spells",
    "spirit", "splash-damage", "vitality", "void",
];

const CONDITIONS: &[&str] = &[
    "Blinded", "Broken", "Clumsy", "Concealed", "Confused", "Controlled", "Dazzled", "Deafened",
    "Doomed", "Drained", "Dying", "Encumbered", "Enfeebled", "Fascinated", "Fatigued",
    "Flat-Footed", "Fleeing", "Frightened", "Grabbed", "Hidden", "Immobilized", "Invisible",
    "Off-Guard", "Paralyzed", "Persistent Damage", "Petrified", "Prone", "Quickened",
    "Restrained", "Sickened", "Slowed", "Stunned", "Stupefied", "Unconscious", "Undetected",
    "Unnoticed", "Wounded",
];

impl Default for Vocabulary {
    fn default() -> Self {
        let sizes = [
            ("tiny", Size::Tiny),
            ("small", Size::Small),
            ("medium", Size::Medium),
            ("large", Size::Large),
            ("huge", Size::Huge),
            ("gargantuan", Size::Gargantuan),
            // Spelling used by the creature builder's export.
            ("gargantuam", Size::Gargantuan),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut resistance_types = set(ENERGY_AND_MATERIALS);
        resistance_types.insert("all".to_string());

        let mut weakness_types = set(ENERGY_AND_MATERIALS);
        weakness_types.extend(set(&["holy", "unholy", "salt-water", "water", "light"]));

        Self {
            sizes,
            rarities: set(&["common", "uncommon", "rare", "unique"]),
            languages: set(&[
                "common", "abyssal", "aklo", "alghollthu", "amurrun", "aquan", "arboreal",
                "auran", "azlanti", "boggard", "caligni", "celestial", "cyclops", "daemonic",
                "draconic", "druidic", "dwarven", "elven", "gnoll", "gnomish", "goblin",
                "grippli", "halfling", "hallit", "ignan", "infernal", "jotun", "kelish",
                "mwangi", "necril", "orcish", "osiriani", "protean", "requian", "shadowtongue",
                "shoanti", "skald", "sphinx", "strix", "sylvan", "taldane", "tengu", "terran",
                "thassilonian", "tien", "undercommon", "utopian", "varisian", "vudrani",
            ]),
            creature_traits: set(&[
                "aberration", "acid", "aeon", "air", "amphibious", "angel", "animal", "aquatic",
                "archon", "astral", "azata", "beast", "catfolk", "celestial", "chaotic", "cold",
                "construct", "daemon", "demon", "devil", "dinosaur", "dragon", "dream", "dwarf",
                "earth", "electricity", "elemental", "elf", "ethereal", "evil", "fey", "fiend",
                "fire", "fungus", "genie", "ghost", "ghoul", "giant", "gnoll", "gnome", "goblin",
                "golem", "good", "gremlin", "grippli", "hag", "halfling", "human", "humanoid",
                "incorporeal", "inevitable", "kobold", "lawful", "leshy", "lizardfolk",
                "mental", "merfolk", "mindless", "minion", "monitor", "mummy", "mutant",
                "negative", "nymph", "ooze", "orc", "plant", "positive", "protean",
                "psychopomp", "rakshasa", "ratfolk", "sea-devil", "shadow", "skeleton", "spirit",
                "sprite", "swarm", "tengu", "troll", "undead", "vampire", "water", "werecreature",
                "wight", "wraith", "zombie",
            ]),
            damage_types: labelled(DAMAGE_TYPES),
            resistance_types,
            weakness_types,
            immunity_types: set(&[
                "acid", "auditory", "bleed", "blinded", "clumsy", "cold", "confused", "controlled",
                "critical-hits", "curse", "dazzled", "deafened", "death-effects", "disease",
                "doomed", "drained", "electricity", "emotion", "enfeebled", "fatigued",
                "fear-effects", "fire", "force", "frightened", "grabbed", "healing", "illusion",
                "immobilized", "inhaled", "light", "magic", "mental", "nonlethal-attacks",
                "object-immunities", "olfactory", "paralyzed", "persistent-damage", "petrified",
                "poison", "polymorph", "possession", "precision", "prone", "restrained",
                "scrying", "sickened", "sleep", "slowed", "sonic", "spell-deflection",
                "stunned", "stupefied", "swarm-attacks", "unconscious", "visual",
            ]),
            speed_types: set(&["land", "burrow", "climb", "fly", "swim"]),
            skills: [
                "Acrobatics", "Arcana", "Athletics", "Crafting", "Deception", "Diplomacy",
                "Intimidation", "Medicine", "Nature", "Occultism", "Performance", "Religion",
                "Society", "Stealth", "Survival", "Thievery",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            conditions: labelled(CONDITIONS),
            attack_effects: set(&[
                "grab", "improved-grab", "knockdown", "improved-knockdown", "push",
                "improved-push",
            ]),
            attack_traits: set(&[
                "acid", "agile", "attached", "backstab", "backswing", "brutal", "chaotic", "cold",
                "concussive", "deadly-d6", "deadly-d8", "deadly-d10", "deadly-d12", "disarm",
                "electricity", "evil", "fatal-d8", "fatal-d10", "fatal-d12", "finesse", "fire",
                "forceful", "good", "lawful", "magical", "mental", "negative", "nonlethal",
                "parry", "poison", "positive", "propulsive", "range-increment-10",
                "range-increment-20", "range-increment-30", "range-increment-60",
                "range-increment-100", "reach-10", "reach-15", "reach-20", "reach-30",
                "shove", "sonic", "sweep", "thrown-10", "thrown-20", "trip", "twin", "unarmed",
                "versatile-b", "versatile-p", "versatile-s", "volley-30",
            ]),
            preparation_types: set(&["prepared", "spontaneous", "innate", "focus", "items", "ritual"]),
        }
    }
}

impl Vocabulary {
    /// Auxiliary movement types: every speed type except the base `land` type.
    pub fn is_auxiliary_speed(&self, word: &str) -> bool {
        word != "land" && self.speed_types.contains(word)
    }

    /// Skill display name for a raw field key such as `stealth`.
    pub fn skill_for_key(&self, key: &str) -> Option<&str> {
        let name = crate::text::capitalize_first(key);
        self.skills.iter().find(|s| **s == name).map(String::as_str)
    }
}

/// Lowercase damage-type display name → damage type key.
///
/// Built once per parser from the damage-type table and shared by every
/// strike parsed afterwards.
#[derive(Debug, Clone, Default)]
pub struct DamageTypeLookup {
    by_label: HashMap<String, String>,
}

impl DamageTypeLookup {
    pub fn new(vocabulary: &Vocabulary) -> Self {
        let by_label = vocabulary
            .damage_types
            .iter()
            .map(|(key, label)| (label.to_lowercase(), key.clone()))
            .collect();
        Self { by_label }
    }

    pub fn key_for(&self, label: &str) -> Option<&str> {
        self.by_label.get(&label.to_lowercase()).map(String::as_str)
    }
}

/// Complete importer configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub parser: ParserSettings,
    pub vocabulary: Vocabulary,
}

impl ImportConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ImportError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config from {:?}: {}", path, e),
            ))
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ImportError::Config(format!("Failed to parse config TOML: {}", e)))
    }

    /// Render this configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ImportError::Config(format!("Failed to render config TOML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ImportConfig::from_str("").unwrap();
        assert_eq!(config.parser.max_spell_level, 10);
        assert!(config.vocabulary.rarities.contains("uncommon"));
        assert_eq!(config.vocabulary.sizes.get("large"), Some(&Size::Large));
    }

    #[test]
    fn test_partial_override() {
        let toml = r#"
[parser]
max_spell_level = 11

[vocabulary]
attack_effects = ["grab", "constrict"]
"#;

        let config = ImportConfig::from_str(toml).unwrap();
        assert_eq!(config.parser.max_spell_level, 11);
        assert!(config.vocabulary.attack_effects.contains("constrict"));
        assert!(!config.vocabulary.attack_effects.contains("knockdown"));
        // Untouched tables keep their defaults.
        assert!(config.vocabulary.languages.contains("draconic"));
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err = ImportConfig::from_str("[parser]\nmax_spell_level = \"ten\"").unwrap_err();
        assert!(matches!(err, ImportError::Config(_)));
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = ImportConfig::default().to_toml().unwrap();
        let reparsed = ImportConfig::from_str(&rendered).unwrap();
        assert_eq!(reparsed.vocabulary.skills.len(), 16);
        assert_eq!(reparsed.vocabulary.sizes.get("gargantuam"), Some(&Size::Gargantuan));
    }

    #[test]
    fn test_auxiliary_speed_excludes_land() {
        let vocab = Vocabulary::default();
        assert!(vocab.is_auxiliary_speed("climb"));
        assert!(!vocab.is_auxiliary_speed("land"));
        assert!(!vocab.is_auxiliary_speed("walk"));
    }

    #[test]
    fn test_skill_for_key() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.skill_for_key("stealth"), Some("Stealth"));
        assert_eq!(vocab.skill_for_key("Thievery"), Some("Thievery"));
        assert_eq!(vocab.skill_for_key("hp"), None);
    }

    #[test]
    fn test_damage_lookup_is_case_insensitive() {
        let lookup = DamageTypeLookup::new(&Vocabulary::default());
        assert_eq!(lookup.key_for("Fire"), Some("fire"));
        assert_eq!(lookup.key_for("PIERCING"), Some("piercing"));
        assert_eq!(lookup.key_for("banana"), None);
    }

    #[test]
    fn test_condition_slugs() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.conditions.get("off-guard").map(String::as_str), Some("Off-Guard"));
        assert_eq!(
            vocab.conditions.get("persistent-damage").map(String::as_str),
            Some("Persistent Damage")
        );
    }
}
