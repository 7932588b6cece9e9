//! Stat block import: decodes one builder export and assembles the creature
//! updates, item records and spell records.

use crate::error::{Diagnostics, Result};
use crate::ids::IdGenerator;
use crate::markup::DescriptionMarkup;
use crate::models::{
    Abilities, AbilityModifier, ActionRecord, ActionSystem, ActionType, Attributes,
    CreatureSystem, CreatureUpdates, Details, HitPoints, ItemRecord, Loose, ParseResults,
    RawSpecial, RawStatBlock, RawStrike, Saves, SkillRecord, SkillSystem, StrikeRecord,
    StrikeSystem, TraitsBlock, Valued, WeaponType,
};
use crate::normalizers::{
    parse_attack_traits, parse_damage, parse_immunities, parse_languages, parse_rarity,
    parse_resistances, parse_size, parse_speed, parse_weaknesses,
};
use crate::spells::{SpellIndex, SpellResolver};
use crate::text::sluggify;
use crate::vocabulary::{ALIGNMENTS, DamageTypeLookup, ImportConfig};

const DEFAULT_ALIGNMENT: &str = "N";

/// Action cost word → action type and number of actions.
fn action_cost(raw: &str) -> (ActionType, Option<u8>) {
    match raw.trim().to_lowercase().as_str() {
        "one" | "1" => (ActionType::Action, Some(1)),
        "two" | "2" => (ActionType::Action, Some(2)),
        "three" | "3" => (ActionType::Action, Some(3)),
        "free" => (ActionType::Free, None),
        "reaction" => (ActionType::Reaction, None),
        _ => (ActionType::Passive, None),
    }
}

fn action_category(raw: &str) -> &'static str {
    match raw.trim().to_lowercase().as_str() {
        "offense" => "offensive",
        "defense" => "defensive",
        _ => "interaction",
    }
}

/// Converts builder exports into host records.
///
/// Lookup tables derived from the configuration are built once here and
/// shared by every parse; each parse is otherwise independent.
#[derive(Debug, Clone)]
pub struct MonsterParser {
    config: ImportConfig,
    damage_types: DamageTypeLookup,
    markup: DescriptionMarkup,
}

impl MonsterParser {
    pub fn new(config: ImportConfig) -> Self {
        let damage_types = DamageTypeLookup::new(&config.vocabulary);
        let markup = DescriptionMarkup::new(&config.vocabulary);
        Self {
            config,
            damage_types,
            markup,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn markup(&self) -> &DescriptionMarkup {
        &self.markup
    }

    /// Parse one stat block. Fails only when `input` is not a JSON object.
    pub async fn parse<I: SpellIndex>(&self, input: &str, index: &I) -> Result<ParseResults> {
        self.parse_with_ids(input, index, IdGenerator::new()).await
    }

    /// [`parse`](Self::parse) with a caller-supplied id generator.
    pub async fn parse_with_ids<I: SpellIndex>(
        &self,
        input: &str,
        index: &I,
        mut ids: IdGenerator,
    ) -> Result<ParseResults> {
        let raw: RawStatBlock = serde_json::from_str(input)?;
        let mut diagnostics = Diagnostics::new();
        raw.report_malformed(&mut diagnostics);

        let updates = self.creature_updates(&raw, &mut diagnostics);

        let mut items: Vec<ItemRecord> = Vec::new();
        items.extend(
            raw.strikes
                .iter()
                .map(|strike| ItemRecord::Melee(self.strike_record(strike, &mut ids, &mut diagnostics))),
        );
        items.extend(
            raw.specials
                .iter()
                .map(|special| ItemRecord::Action(self.action_record(special))),
        );
        items.extend(
            self.skill_records(&raw, &mut ids, &mut diagnostics)
                .into_iter()
                .map(ItemRecord::Lore),
        );

        let resolver = SpellResolver::new(&self.config.vocabulary, self.config.parser.max_spell_level);
        let groups = raw.primary_spells().into_iter().chain(raw.morespells.iter().cloned());
        let mut spell_items = Vec::new();
        for group in groups {
            let resolved = resolver.resolve(&group, index, &mut ids, &mut diagnostics).await;
            items.push(ItemRecord::SpellcastingEntry(resolved.entry));
            spell_items.extend(resolved.spells.into_iter().map(ItemRecord::Spell));
        }

        tracing::info!(
            "Parsed '{}': {} items, {} spells, {} field issues",
            updates.name,
            items.len(),
            spell_items.len(),
            diagnostics.issues.len()
        );

        Ok(ParseResults {
            updates,
            items,
            spell_items,
            diagnostics,
        })
    }

    fn creature_updates(&self, raw: &RawStatBlock, diagnostics: &mut Diagnostics) -> CreatureUpdates {
        let vocabulary = &self.config.vocabulary;
        let modifier = |value: &Loose, field: &'static str, diagnostics: &mut Diagnostics| AbilityModifier {
            modifier: value.int_or_zero(field, diagnostics),
        };

        let abilities = Abilities {
            str: modifier(&raw.strength, "strength", diagnostics),
            dex: modifier(&raw.dexterity, "dexterity", diagnostics),
            con: modifier(&raw.constitution, "constitution", diagnostics),
            int: modifier(&raw.intelligence, "intelligence", diagnostics),
            wis: modifier(&raw.wisdom, "wisdom", diagnostics),
            cha: modifier(&raw.charisma, "charisma", diagnostics),
        };

        let hp = raw.hp.int_or_zero("hp", diagnostics);
        let attributes = Attributes {
            ac: Valued::new(raw.ac.int_or_zero("ac", diagnostics)),
            perception: Valued::new(raw.perception.int_or_zero("perception", diagnostics)),
            hp: HitPoints { value: hp, max: hp },
            all_saves: Valued::new(raw.savenote.text()),
            speed: parse_speed(&raw.speed.text(), vocabulary, diagnostics),
        };

        let alignment = raw.alignment.text().trim().to_uppercase();
        let alignment = if ALIGNMENTS.contains(&alignment.as_str()) {
            alignment
        } else {
            if !alignment.is_empty() {
                diagnostics.unknown("alignment", &alignment);
            }
            DEFAULT_ALIGNMENT.to_string()
        };

        let details = Details {
            level: Valued::new(raw.level.int_or_zero("level", diagnostics)),
            alignment: Valued::new(alignment),
            public_notes: raw.description.text(),
        };

        let traits = self.traits_block(raw, diagnostics);

        let saves = Saves {
            fortitude: Valued::new(raw.fortitude.int_or_zero("fortitude", diagnostics)),
            reflex: Valued::new(raw.reflex.int_or_zero("reflex", diagnostics)),
            will: Valued::new(raw.will.int_or_zero("will", diagnostics)),
        };

        CreatureUpdates {
            name: raw.name.text(),
            system: CreatureSystem {
                abilities,
                attributes,
                details,
                traits,
                saves,
            },
        }
    }

    fn traits_block(&self, raw: &RawStatBlock, diagnostics: &mut Diagnostics) -> TraitsBlock {
        let vocabulary = &self.config.vocabulary;

        let trait_text = raw.traits.text();
        let creature_type = raw.creature_type.text();
        let all_traits: Vec<String> = std::iter::once(creature_type.as_str())
            .chain(trait_text.split(','))
            .map(|t| sluggify(t.trim()))
            .filter(|t| !t.is_empty())
            .collect();

        let creature_traits: Vec<String> = all_traits
            .iter()
            .filter(|t| vocabulary.creature_traits.contains(*t))
            .cloned()
            .collect();

        TraitsBlock {
            size: Valued::new(parse_size(&raw.size.text(), vocabulary)),
            rarity: parse_rarity(&all_traits, vocabulary),
            languages: Valued::new(parse_languages(&raw.languages.text(), vocabulary, diagnostics)),
            value: creature_traits,
            dv: parse_weaknesses(&raw.weakness.text(), vocabulary, diagnostics),
            dr: parse_resistances(&raw.resistance.text(), vocabulary, diagnostics),
            di: Valued::new(parse_immunities(&raw.immunity.text(), vocabulary, diagnostics)),
        }
    }

    fn strike_record(&self, strike: &RawStrike, ids: &mut IdGenerator, diagnostics: &mut Diagnostics) -> StrikeRecord {
        let vocabulary = &self.config.vocabulary;
        let strike_type = strike.strike_type.text().trim().to_lowercase();
        let weapon_type = if strike_type.is_empty() || strike_type == "melee" {
            WeaponType::Melee
        } else {
            WeaponType::Ranged
        };
        let damage = parse_damage(&strike.damage.text(), &self.damage_types, vocabulary, ids);

        StrikeRecord {
            name: strike.name.text(),
            system: StrikeSystem {
                bonus: Valued::new(strike.attack.int_or_zero("attack", diagnostics)),
                weapon_type: Valued::new(weapon_type),
                damage_rolls: damage.rolls,
                attack_effects: Valued::new(damage.attack_effects),
                traits: Valued::new(parse_attack_traits(&strike.traits.text(), vocabulary)),
            },
        }
    }

    fn action_record(&self, special: &RawSpecial) -> ActionRecord {
        let (action_type, actions) = action_cost(&special.actions.text());

        ActionRecord {
            name: special.name.text(),
            system: ActionSystem {
                action_type: Valued::new(action_type),
                actions: Valued::new(actions),
                action_category: Valued::new(action_category(&special.special_type.text()).to_string()),
                description: Valued::new(self.markup.transform(&special.description.text())),
            },
        }
    }

    fn skill_records(&self, raw: &RawStatBlock, ids: &mut IdGenerator, diagnostics: &mut Diagnostics) -> Vec<SkillRecord> {
        let vocabulary = &self.config.vocabulary;
        let mut skills = Vec::new();

        for (key, value) in &raw.other {
            let Some(name) = vocabulary.skill_for_key(key) else {
                continue;
            };
            let value = Loose::new(value.clone());
            if !value.is_truthy() {
                continue;
            }
            skills.push(SkillRecord {
                id: ids.next_id(),
                name: name.to_string(),
                system: SkillSystem {
                    modifier: Valued::new(value.int_or_zero("skill", diagnostics)),
                    proficient: Valued::new(0),
                },
            });
        }

        skills
    }
}
