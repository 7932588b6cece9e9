use futures::executor::block_on;
use monster_import_core::file_utils::read_text_file;
use monster_import_core::ids::IdGenerator;
use monster_import_core::{ImportConfig, InMemorySpellIndex, ItemRecord, MonsterParser};
use serde_json::{Value, json};

const STAT_BLOCK: &str = r#"{
    "name": {"value": "Ember Drake"},
    "level": {"value": "5"},
    "alignment": {"value": "CE"},
    "size": {"value": "large"},
    "type": {"value": "Dragon"},
    "traits": {"value": "Rare, Fire"},
    "languages": {"value": "Draconic"},
    "strength": {"value": "+5"}, "dexterity": {"value": "+2"}, "constitution": {"value": "+4"},
    "intelligence": {"value": "-1"}, "wisdom": {"value": "+1"}, "charisma": {"value": "+0"},
    "ac": {"value": "22"}, "perception": {"value": "+12"}, "hp": {"value": "85"},
    "fortitude": {"value": "+14"}, "reflex": {"value": "+11"}, "will": {"value": "+9"},
    "speed": {"value": "25 feet, fly 60 feet"},
    "resistance": {"value": "physical 5 (except cold iron, silver)"},
    "weakness": {"value": "cold 5"},
    "immunity": {"value": "fire, paralyzed, sleep"},
    "athletics": {"value": "+14"},
    "intimidation": {"value": ""},
    "strikes": [
        {"name": "Jaws", "type": "melee", "attack": "+15", "damage": "2d10+7 piercing plus 1d6 fire", "traits": "reach 10 feet, fire"}
    ],
    "specials": [
        {
            "name": "Ember Breath",
            "actions": "two",
            "type": "offense",
            "description": "The drake breathes a 30-foot cone of embers that deals 6d6 fire damage (DC 22 basic Reflex save).\nCritical Failure The creature also takes 1d6 persistent fire damage and is frightened 1."
        }
    ],
    "spelltype": {"value": "Primal Innate"},
    "spells": ["Fireball", "", "Produce Flame (at will)"],
    "spelldc": {"value": "21"},
    "spellattack": {"value": "+13"},
    "morespells": null
}"#;

fn spell_index() -> InMemorySpellIndex {
    InMemorySpellIndex::from_records(vec![
        json!({"_id": "pf-fireball", "name": "Fireball", "type": "spell", "system": {"level": {"value": 3}}}),
        json!({"_id": "pf-produce-flame", "name": "Produce Flame", "type": "spell", "system": {"level": {"value": 1}}}),
    ])
}

#[test]
fn test_full_stat_block_import() {
    let parser = MonsterParser::new(ImportConfig::default());
    let results = block_on(parser.parse_with_ids(STAT_BLOCK, &spell_index(), IdGenerator::seeded(11))).unwrap();
    let output = serde_json::to_value(&results).unwrap();
    let system = &output["updates"]["system"];

    assert_eq!(output["updates"]["name"], "Ember Drake");
    assert_eq!(system["details"]["level"]["value"], 5);
    assert_eq!(system["traits"]["size"]["value"], "lg");
    assert_eq!(system["traits"]["rarity"], "rare");
    assert_eq!(system["traits"]["value"], json!(["dragon", "fire"]));
    assert_eq!(system["attributes"]["speed"]["value"], "25");
    assert_eq!(system["attributes"]["speed"]["otherSpeeds"], json!([{"type": "fly", "value": "60"}]));
    assert_eq!(
        system["traits"]["dr"],
        json!([{"type": "physical", "value": 5, "exceptions": "except cold iron, silver"}])
    );
    assert_eq!(system["traits"]["di"]["value"], json!(["fire", "paralyzed", "sleep"]));
    assert_eq!(system["abilities"]["str"]["mod"], 5);

    let item_types: Vec<&str> = output["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["type"].as_str().unwrap())
        .collect();
    assert_eq!(item_types, vec!["melee", "action", "lore", "spellcastingEntry"]);

    let jaws = &output["items"][0]["system"];
    let rolls: Vec<&Value> = jaws["damageRolls"].as_object().unwrap().values().collect();
    assert_eq!(rolls.len(), 2);
    assert_eq!(jaws["traits"]["value"], json!(["reach-10", "fire"]));

    let breath = output["items"][1]["system"]["description"]["value"].as_str().unwrap();
    assert!(breath.contains("@Template[type:cone|distance:30]{30-foot cone}"));
    assert!(breath.contains("[[/r (6d6)[fire]]]{6d6 fire damage}"));
    assert!(breath.contains("@Check[type:reflex|dc:22|basic:true]"));
    assert!(breath.contains("</p><p><strong>Critical Failure</strong> The creature also takes"));
    assert!(breath.contains("[[/r (1d6)[persistent,fire]]]"));
    assert!(breath.contains("@Compendium[pf2e.conditionitems.Frightened]{Frightened 1}"));

    let entry = &output["items"][3];
    assert_eq!(entry["name"], "Primal Innate Spells");
    assert_eq!(entry["system"]["spelldc"], json!({"value": 13, "dc": 21}));

    let spells = output["spellItems"].as_array().unwrap();
    assert_eq!(spells.len(), 2);
    assert_eq!(spells[0]["name"], "Produce Flame");
    assert!(spells[0]["system"]["location"].get("heightenedLevel").is_none());
    assert_eq!(spells[1]["name"], "Fireball");
    assert_eq!(spells[1]["system"]["location"]["heightenedLevel"], 2);
    assert_eq!(spells[1]["system"]["location"]["value"], entry["_id"]);
}

#[test]
fn test_import_from_legacy_encoded_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("drake.json");
    // Windows-1252 curly apostrophe (0x92) in the description.
    std::fs::write(&path, b"{\"name\": \"Drake\", \"description\": \"The drake\x92s lair\"}").unwrap();

    let content = read_text_file(&path).unwrap();
    let parser = MonsterParser::new(ImportConfig::default());
    let results = block_on(parser.parse(&content, &spell_index())).unwrap();

    assert_eq!(results.updates.system.details.public_notes, "The drake\u{2019}s lair");
    assert!(results.items.iter().all(|item| !matches!(item, ItemRecord::SpellcastingEntry(_))));
}
