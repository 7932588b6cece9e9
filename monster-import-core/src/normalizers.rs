//! Normalizers for the builder's free-text attribute fields.
//!
//! Each function turns one raw attribute into structured data. None of them
//! fail: unreadable numbers become 0 and unknown tokens are dropped, with
//! the fallback recorded in [`Diagnostics`].

use crate::error::Diagnostics;
use crate::ids::IdGenerator;
use crate::models::{DamageRoll, DamageRolls, Movement, OtherSpeed, Resistance, Weakness};
use crate::text::{first_number, first_word, sluggify, split_outside_parens, words};
use crate::vocabulary::{DamageTypeLookup, Size, Vocabulary};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WORD_OR: Regex = Regex::new(r"\bor\b").unwrap();
    static ref PARENTHESIZED: Regex = Regex::new(r"\((.*)\)").unwrap();
    static ref DICE_EXPRESSION: Regex =
        Regex::new(r"(\d+d\d+(?:\s*[+-]\s*\d+d\d+)*(?:\s*[+-]\s*\d+)?)(.*)").unwrap();
}

fn number_or_zero(
    text: &str,
    field: &'static str,
    diagnostics: &mut Diagnostics,
) -> i64 {
    match first_number(text).and_then(|n| n.parse::<i64>().ok()) {
        Some(n) => n,
        None => {
            diagnostics.unparseable(field, text.trim());
            0
        }
    }
}

/// Parse a speed list such as `"30 feet, climb 20 feet, fly 40 feet; clumsy"`.
///
/// Segments whose first word is an auxiliary movement type become
/// `other_speeds`; any other segment sets the base speed, so when several
/// segments qualify the last one wins.
pub fn parse_speed(raw: &str, vocabulary: &Vocabulary, diagnostics: &mut Diagnostics) -> Movement {
    let mut movement = Movement::default();

    for segment in raw.split(',') {
        let segment = segment.replace("feet", "");
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let (clause, detail) = match segment.split_once(';') {
            Some((clause, detail)) => (clause, Some(detail.trim())),
            None => (segment, None),
        };

        let value = match first_number(clause) {
            Some(n) => n.to_string(),
            None => {
                diagnostics.unparseable("speed", clause.trim());
                "0".to_string()
            }
        };

        match first_word(clause) {
            Some(word) if vocabulary.is_auxiliary_speed(&word.to_lowercase()) => {
                movement.other_speeds.push(OtherSpeed {
                    speed_type: word.to_lowercase(),
                    value,
                });
            }
            _ => {
                movement.value = value;
                movement.details = detail
                    .filter(|d| !d.is_empty())
                    .unwrap_or("walking")
                    .to_string();
            }
        }
    }

    movement
}

/// Parse resistances such as `"fire 5, physical 5 (except silver, cold iron)"`.
pub fn parse_resistances(
    raw: &str,
    vocabulary: &Vocabulary,
    diagnostics: &mut Diagnostics,
) -> Vec<Resistance> {
    let mut resistances = Vec::new();

    for segment in split_outside_parens(raw) {
        let item = WORD_OR.replace(&segment, "");
        let item = item.trim();

        let head = item.split('(').next().unwrap_or_default();
        let slug = sluggify(first_word(head).unwrap_or_default());
        let resistance_type = if slug == "all-damage" { "all".to_string() } else { slug };

        if !vocabulary.resistance_types.contains(&resistance_type) {
            diagnostics.unknown("resistance", item);
            continue;
        }

        let exceptions = PARENTHESIZED
            .captures(item)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|e| !e.is_empty());

        resistances.push(Resistance {
            resistance_type,
            value: number_or_zero(item, "resistance", diagnostics),
            exceptions,
        });
    }

    resistances
}

/// Parse weaknesses such as `"good 5, cold iron 10"`.
///
/// Only the first word names the type, so compound types like "cold iron"
/// read as their first word.
pub fn parse_weaknesses(
    raw: &str,
    vocabulary: &Vocabulary,
    diagnostics: &mut Diagnostics,
) -> Vec<Weakness> {
    let mut weaknesses = Vec::new();

    for segment in split_outside_parens(raw) {
        let weakness_type = sluggify(first_word(&segment).unwrap_or_default());
        if !vocabulary.weakness_types.contains(&weakness_type) {
            diagnostics.unknown("weakness", segment.trim());
            continue;
        }

        weaknesses.push(Weakness {
            weakness_type,
            value: number_or_zero(&segment, "weakness", diagnostics),
        });
    }

    weaknesses
}

/// Parse immunities such as `"poison, disease, death effects"`.
pub fn parse_immunities(
    raw: &str,
    vocabulary: &Vocabulary,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let mut immunities = Vec::new();

    for segment in split_outside_parens(raw) {
        let immunity = words(&segment).join("-").to_lowercase();
        if vocabulary.immunity_types.contains(&immunity) {
            immunities.push(immunity);
        } else {
            diagnostics.unknown("immunity", segment.trim());
        }
    }

    immunities
}

/// Damage rolls and non-damage effects read from a strike's damage text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDamage {
    pub rolls: DamageRolls,
    pub attack_effects: Vec<String>,
}

/// Parse strike damage such as `"2d8+6 piercing plus 1d6 fire plus Grab"`.
///
/// Clauses joined by `" plus "` are read as dice expressions with an
/// optional damage type word; a clause with no dice is kept only if it
/// names an attack effect.
pub fn parse_damage(
    raw: &str,
    damage_types: &DamageTypeLookup,
    vocabulary: &Vocabulary,
    ids: &mut IdGenerator,
) -> ParsedDamage {
    let mut parsed = ParsedDamage::default();

    for clause in raw.split(" plus ") {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }

        if let Some(caps) = DICE_EXPRESSION.captures(clause) {
            let damage: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
            let damage_type = caps
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split_whitespace()
                .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
                .find_map(|word| damage_types.key_for(word))
                .unwrap_or("untyped")
                .to_string();

            parsed
                .rolls
                .0
                .push((ids.next_id(), DamageRoll { damage, damage_type }));
        } else {
            let slug = sluggify(&clause.to_lowercase());
            if vocabulary.attack_effects.contains(&slug) {
                parsed.attack_effects.push(slug);
            } else {
                tracing::debug!("Dropping damage clause '{}'", clause);
            }
        }
    }

    parsed
}

/// Attack traits such as `"agile, reach 10 feet, magical"`.
pub fn parse_attack_traits(raw: &str, vocabulary: &Vocabulary) -> Vec<String> {
    raw.split(',')
        .map(|token| sluggify(&token.replace("feet", "")))
        .filter(|slug| vocabulary.attack_traits.contains(slug))
        .collect()
}

/// Languages from a comma-separated list, keeping the known ones.
pub fn parse_languages(raw: &str, vocabulary: &Vocabulary, diagnostics: &mut Diagnostics) -> Vec<String> {
    raw.split(',')
        .map(|language| language.trim().to_lowercase())
        .filter(|language| !language.is_empty())
        .filter(|language| {
            let known = vocabulary.languages.contains(language);
            if !known {
                diagnostics.unknown("language", language);
            }
            known
        })
        .collect()
}

/// Size category for a raw size token; medium when unknown.
pub fn parse_size(raw: &str, vocabulary: &Vocabulary) -> Size {
    vocabulary
        .sizes
        .get(&raw.trim().to_lowercase())
        .copied()
        .unwrap_or_default()
}

/// First trait that is a rarity, or `common`.
pub fn parse_rarity(traits: &[String], vocabulary: &Vocabulary) -> String {
    traits
        .iter()
        .find(|trait_| vocabulary.rarities.contains(*trait_))
        .cloned()
        .unwrap_or_else(|| "common".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::default()
    }

    #[test]
    fn test_speed_with_auxiliary() {
        let mut diagnostics = Diagnostics::new();
        let movement = parse_speed("30 feet, climb 20 feet", &vocab(), &mut diagnostics);

        assert_eq!(movement.value, "30");
        assert_eq!(movement.details, "walking");
        assert_eq!(
            movement.other_speeds,
            vec![OtherSpeed { speed_type: "climb".to_string(), value: "20".to_string() }]
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_speed_detail_clause() {
        let mut diagnostics = Diagnostics::new();
        let movement = parse_speed(
            "25 feet; ignores difficult terrain, fly 40 feet",
            &vocab(),
            &mut diagnostics,
        );
        assert_eq!(movement.value, "25");
        assert_eq!(movement.details, "ignores difficult terrain");
        assert_eq!(movement.other_speeds[0].speed_type, "fly");
        assert_eq!(movement.other_speeds[0].value, "40");
    }

    #[test]
    fn test_speed_last_primary_wins() {
        let mut diagnostics = Diagnostics::new();
        let movement = parse_speed("30 feet, 40 feet", &vocab(), &mut diagnostics);
        assert_eq!(movement.value, "40");
        assert!(movement.other_speeds.is_empty());
    }

    #[test]
    fn test_speed_without_number_is_reported() {
        let mut diagnostics = Diagnostics::new();
        let movement = parse_speed("swim", &vocab(), &mut diagnostics);
        assert_eq!(movement.other_speeds[0].value, "0");
        assert_eq!(diagnostics.issues.len(), 1);
    }

    #[test]
    fn test_resistance_keeps_exception_text() {
        let mut diagnostics = Diagnostics::new();
        let resistances = parse_resistances(
            "fire 5, physical 5 (except silver, cold iron)",
            &vocab(),
            &mut diagnostics,
        );

        assert_eq!(resistances.len(), 2);
        assert_eq!(resistances[0].resistance_type, "fire");
        assert_eq!(resistances[0].value, 5);
        assert_eq!(resistances[0].exceptions, None);
        assert_eq!(resistances[1].resistance_type, "physical");
        assert_eq!(resistances[1].value, 5);
        assert_eq!(resistances[1].exceptions.as_deref(), Some("except silver, cold iron"));
    }

    #[test]
    fn test_resistance_drops_unknown_types() {
        let mut diagnostics = Diagnostics::new();
        let resistances = parse_resistances("banana 5, cold 10", &vocab(), &mut diagnostics);
        assert_eq!(resistances.len(), 1);
        assert_eq!(resistances[0].resistance_type, "cold");
        assert_eq!(diagnostics.issues.len(), 1);
    }

    #[test]
    fn test_resistance_strips_or_and_maps_all_damage() {
        let mut diagnostics = Diagnostics::new();
        let resistances = parse_resistances(
            "all damage 5 (except force or ghost touch)",
            &vocab(),
            &mut diagnostics,
        );
        assert_eq!(resistances.len(), 1);
        assert_eq!(resistances[0].resistance_type, "all");
        assert_eq!(resistances[0].value, 5);
        // Only the first "or" is removed.
        assert_eq!(resistances[0].exceptions.as_deref(), Some("except force  ghost touch"));
    }

    #[test]
    fn test_weaknesses() {
        let mut diagnostics = Diagnostics::new();
        let weaknesses = parse_weaknesses("good 5, cold 10", &vocab(), &mut diagnostics);
        assert_eq!(weaknesses.len(), 2);
        assert_eq!(weaknesses[0].weakness_type, "good");
        assert_eq!(weaknesses[0].value, 5);
        assert_eq!(weaknesses[1].weakness_type, "cold");
        assert_eq!(weaknesses[1].value, 10);
    }

    #[test]
    fn test_immunities_join_words() {
        let mut diagnostics = Diagnostics::new();
        let immunities =
            parse_immunities("poison, death effects, tentacles", &vocab(), &mut diagnostics);
        assert_eq!(immunities, vec!["poison", "death-effects"]);
        assert_eq!(diagnostics.issues.len(), 1);
    }

    #[test]
    fn test_damage_rolls_and_effects() {
        let vocabulary = vocab();
        let lookup = DamageTypeLookup::new(&vocabulary);
        let mut ids = IdGenerator::seeded(1);
        let parsed = parse_damage(
            "2d8+6 piercing plus 1d6 Fire plus Improved Grab",
            &lookup,
            &vocabulary,
            &mut ids,
        );

        let rolls: Vec<&DamageRoll> = parsed.rolls.rolls().collect();
        assert_eq!(rolls.len(), 2);
        assert_eq!(rolls[0].damage, "2d8+6");
        assert_eq!(rolls[0].damage_type, "piercing");
        assert_eq!(rolls[1].damage, "1d6");
        assert_eq!(rolls[1].damage_type, "fire");
        assert_eq!(parsed.attack_effects, vec!["improved-grab"]);
    }

    #[test]
    fn test_damage_drops_garbage_clauses() {
        let vocabulary = vocab();
        let lookup = DamageTypeLookup::new(&vocabulary);
        let mut ids = IdGenerator::seeded(1);
        let parsed = parse_damage("2d6 plus garbage text", &lookup, &vocabulary, &mut ids);

        assert_eq!(parsed.rolls.len(), 1);
        assert!(parsed.attack_effects.is_empty());
        assert_eq!(parsed.rolls.rolls().next().unwrap().damage_type, "untyped");
    }

    #[test]
    fn test_damage_roll_ids_are_distinct() {
        let vocabulary = vocab();
        let lookup = DamageTypeLookup::new(&vocabulary);
        let mut ids = IdGenerator::seeded(3);
        let parsed = parse_damage("1d4 plus 1d4 plus 1d4", &lookup, &vocabulary, &mut ids);
        let keys: std::collections::HashSet<&String> = parsed.rolls.0.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_attack_traits() {
        let traits = parse_attack_traits("agile, reach 10 feet, Magical, shiny", &vocab());
        assert_eq!(traits, vec!["agile", "reach-10", "magical"]);
    }

    #[test]
    fn test_languages_size_rarity() {
        let vocabulary = vocab();
        let mut diagnostics = Diagnostics::new();
        assert_eq!(
            parse_languages("Common, Draconic, Gibberish", &vocabulary, &mut diagnostics),
            vec!["common", "draconic"]
        );
        assert_eq!(parse_size("large", &vocabulary), Size::Large);
        assert_eq!(parse_size("colossal", &vocabulary), Size::Medium);
        assert_eq!(
            parse_rarity(&["dragon".to_string(), "rare".to_string()], &vocabulary),
            "rare"
        );
        assert_eq!(parse_rarity(&[], &vocabulary), "common");
    }
}
