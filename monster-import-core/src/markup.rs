//! Rewrites narrative ability text into the host's rich-text markup.
//!
//! The rewrite is a fixed pipeline of passes (see [`PASSES`]). Each pass is
//! a total `&str -> String` function. Passes from inline checks onward only
//! touch text outside markup produced earlier (`@Tag[...]{...}`,
//! `[[/r ...]]{...}`, HTML tags), so no pass re-reads another's output.

use crate::vocabulary::{SAVES, Vocabulary};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};

/// Paragraph boundary marker used while splitting sections. Never survives
/// the first pass.
const SECTION_BREAK: char = '\u{1e}';

const PERSISTENT_DAMAGE_REF: &str =
    "@Compendium[pf2e.conditionitems.Persistent Damage]{Persistent Damage}";

const CONDITION_COMPENDIUM: &str = "pf2e.conditionitems";

lazy_static! {
    static ref MARKUP: Regex = Regex::new(
        r"@\w+\[[^\]]*\](?:\{[^}]*\})?|\[\[[^\]]*(?:\[[^\]]*\][^\]]*)*\]\](?:\{[^}]*\})?|<[^>]+>"
    )
    .unwrap();

    static ref CRAFT_REQUIREMENTS: Regex = Regex::new(r"\bCraft\s+Requirements?\b").unwrap();
    static ref LINE_HEADER: Regex = Regex::new(
        r"(?m)^[ \t]*(Critical Success|Critical Failure|Requirements?|Trigger|Frequency|Effect|Cost|Maximum Duration|Onset|Saving Throw|Stage \d+|Success|Failure|Special)\b"
    )
    .unwrap();
    static ref INLINE_HEADER: Regex = Regex::new(
        r"([.;])[ \t]+(Requirements?|Trigger|Frequency|Effect|Cost|Maximum Duration|Onset|Saving Throw|Stage \d+)\b"
    )
    .unwrap();
    static ref HEADER_AT_START: Regex = Regex::new(
        r"(?s)^(Craft Requirements|Critical Success|Critical Failure|Requirements?|Trigger|Frequency|Effect|Cost|Maximum Duration|Onset|Saving Throw|Stage \d+|Success|Failure|Special)\b(.*)$"
    )
    .unwrap();

    static ref SPACE_RUN: Regex = Regex::new(r"[ \t]{2,}").unwrap();
    static ref EMPTY_PARAGRAPH: Regex = Regex::new(r"<p>\s*</p>").unwrap();
    static ref SPACE_BEFORE_CLOSE: Regex = Regex::new(r"\s+</p>").unwrap();
    static ref SPACE_AFTER_OPEN: Regex = Regex::new(r"<p>\s+").unwrap();

    static ref CHECK_PATTERNS: Vec<CheckPattern> = vec![
        CheckPattern::new(r"DC (\d+) basic (\w+) save", 2, 1, CheckKind::Basic),
        CheckPattern::new(r"basic (\w+) save DC (\d+)", 1, 2, CheckKind::Basic),
        CheckPattern::new(r"(Fortitude|Reflex|Will) save \(DC (\d+)\)", 1, 2, CheckKind::Named),
        CheckPattern::new(r"(Fortitude|Reflex|Will) \(DC (\d+)\)", 1, 2, CheckKind::Named),
        CheckPattern::new(r"DC (\d+) (Fortitude|Reflex|Will)(?: save)?\b", 2, 1, CheckKind::Named),
        CheckPattern::new(r"(Fortitude|Reflex|Will)(?: save)? DC (\d+)", 1, 2, CheckKind::Named),
        CheckPattern::new(r"(\w+) Lore DC (\d+)", 1, 2, CheckKind::Lore),
        CheckPattern::new(r"DC (\d+) flat check", 0, 1, CheckKind::Flat),
        CheckPattern::new(r"DC (\d+) (\w+) save", 2, 1, CheckKind::Named),
        CheckPattern::new(r"(\w+) DC (\d+)", 1, 2, CheckKind::Known),
        CheckPattern::new(r"DC (\d+) (\w+)", 2, 1, CheckKind::Known),
    ];

    static ref DURATION_DICE: Regex =
        Regex::new(r"\b(\d+)d(\d+) (rounds|minutes|hours|days)\b").unwrap();
    static ref DICE_PLUS_FLAT_DAMAGE: Regex =
        Regex::new(r"\b(\d+)d(\d+)\+(\d+) (\w+) damage\b").unwrap();
    static ref PERSISTENT_DAMAGE: Regex =
        Regex::new(r"\b(\d+)d(\d+) persistent (\w+) damage\b").unwrap();
    static ref DICE_DAMAGE: Regex = Regex::new(r"\b(\d+)d(\d+) (\w+) damage\b").unwrap();
    static ref UNTYPED_DICE_DAMAGE: Regex = Regex::new(r"\b(\d+)d(\d+) damage\b").unwrap();
    static ref FLAT_DAMAGE: Regex = Regex::new(r"\b(\d+) (\w+) damage\b").unwrap();
    static ref TRAILING_DICE_WORD: Regex = Regex::new(r"\b(\d+)d(\d+) (\w+)([,.])").unwrap();
    static ref TRAILING_DICE: Regex = Regex::new(r"\b(\d+)d(\d+)([,.])").unwrap();

    static ref HEIGHTENED: Regex =
        Regex::new(r"\s*(<strong>)?Heightened \((\+\d+|\d+\w*)\)(</strong>)?").unwrap();
    static ref PARAGRAPH: Regex = Regex::new(r"(?s)<p>(.*?)</p>").unwrap();
    static ref AREA_TEMPLATE: Regex =
        Regex::new(r"\b(\d+)-foot (emanation|burst|cone|line)\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckKind {
    /// Basic save; the type word is taken as written.
    Basic,
    /// A save named explicitly by the pattern or followed by "save".
    Named,
    /// `<word> Lore DC <n>`.
    Lore,
    /// `DC <n> flat check`.
    Flat,
    /// Generic forms; only rewritten when the word is a known save or skill.
    Known,
}

struct CheckPattern {
    regex: Regex,
    type_group: usize,
    dc_group: usize,
    kind: CheckKind,
}

impl CheckPattern {
    fn new(pattern: &str, type_group: usize, dc_group: usize, kind: CheckKind) -> Self {
        Self {
            regex: Regex::new(pattern).unwrap(),
            type_group,
            dc_group,
            kind,
        }
    }
}

fn check_tag(check_type: &str, dc: &str, basic: bool) -> String {
    if basic {
        format!("@Check[type:{}|dc:{}|basic:true]", check_type, dc)
    } else {
        format!("@Check[type:{}|dc:{}]", check_type, dc)
    }
}

/// Apply `rewrite` to every stretch of `text` that is not already markup.
fn outside_markup(text: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in MARKUP.find_iter(text) {
        out.push_str(&rewrite(&text[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&rewrite(&text[last..]));
    out
}

fn replace_outside_markup(text: &str, regex: &Regex, replacement: &str) -> String {
    outside_markup(text, |plain| regex.replace_all(plain, replacement).into_owned())
}

type Pass = fn(&DescriptionMarkup, &str) -> String;

/// The rewrite passes in the order they must run.
///
/// Section headers must exist before whitespace cleanup; checks run before
/// damage so "DC 20 ... 2d6" is tagged as a check first; conditions run
/// after damage so macro labels are already protected; bullets and
/// templates come last because they only add markup.
pub const PASSES: [(&str, Pass); 8] = [
    ("literal normalization", DescriptionMarkup::normalize_literals),
    ("whitespace cleanup", DescriptionMarkup::clean_whitespace),
    ("inline checks", DescriptionMarkup::inline_checks),
    ("damage rolls", DescriptionMarkup::damage_rolls),
    ("conditions", DescriptionMarkup::conditions),
    ("heightened sections", DescriptionMarkup::heightened_sections),
    ("bullet lists", DescriptionMarkup::bullet_lists),
    ("area templates", DescriptionMarkup::area_templates),
];

/// Description markup transformer. Built once per parser.
#[derive(Debug, Clone)]
pub struct DescriptionMarkup {
    /// Lowercase saves and skills accepted by the generic check patterns.
    check_words: HashSet<String>,
    condition_pattern: Option<Regex>,
    /// Lowercase condition display name → display name.
    condition_names: HashMap<String, String>,
}

impl DescriptionMarkup {
    pub fn new(vocabulary: &Vocabulary) -> Self {
        let mut check_words: HashSet<String> = SAVES.iter().map(|s| s.to_lowercase()).collect();
        check_words.extend(vocabulary.skills.iter().map(|s| s.to_lowercase()));
        check_words.insert("perception".to_string());

        let condition_names: HashMap<String, String> = vocabulary
            .conditions
            .values()
            .map(|name| (name.to_lowercase(), name.clone()))
            .collect();

        let mut names: Vec<&String> = vocabulary.conditions.values().collect();
        // Longest first so "Persistent Damage" wins over a shorter prefix.
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let condition_pattern = if names.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
            Regex::new(&format!(r"(?i)\b({})\b(?: (\d+)\b)?", alternatives.join("|"))).ok()
        };

        Self {
            check_words,
            condition_pattern,
            condition_names,
        }
    }

    /// Run every pass in order.
    pub fn transform(&self, text: &str) -> String {
        PASSES.iter().fold(text.to_string(), |current, (name, pass)| {
            let next = pass(self, &current);
            if next != current {
                tracing::trace!("Markup pass '{}' rewrote description", name);
            }
            next
        })
    }

    /// Pass 1: ASCII punctuation and section paragraphs.
    ///
    /// Section keywords at the start of a line, or after `.`/`;` for the
    /// inline ones, start a new paragraph with a bold header. Remaining
    /// newlines become spaces.
    pub fn normalize_literals(&self, text: &str) -> String {
        let text = text
            .replace(SECTION_BREAK, "")
            .replace(['’', '‘'], "'")
            .replace(['“', '”'], "\"")
            .replace(['—', '–'], "-")
            .replace("\r\n", "\n")
            .replace("\\n", "\n");

        let marked = CRAFT_REQUIREMENTS.replace_all(&text, "\u{1e}Craft Requirements");
        let marked = LINE_HEADER.replace_all(&marked, "\u{1e}${1}");
        let marked = INLINE_HEADER.replace_all(&marked, "${1}\u{1e}${2}");
        let flattened = marked.replace('\n', " ");

        let mut html = String::with_capacity(flattened.len() + 32);
        for (index, chunk) in flattened.split(SECTION_BREAK).enumerate() {
            let caps = if index == 0 { None } else { HEADER_AT_START.captures(chunk) };
            let Some(caps) = caps else {
                let body = chunk.trim();
                if !body.is_empty() {
                    html.push_str(&format!("<p>{}</p>", body));
                }
                continue;
            };

            let header = match &caps[1] {
                "Requirement" => "Requirements",
                other => other,
            };
            let body = caps[2]
                .trim()
                .trim_start_matches(':')
                .trim_end_matches(';')
                .trim();

            if matches!(header, "Critical Success" | "Craft Requirements") {
                html.push_str("<hr />");
            }
            if body.is_empty() {
                html.push_str(&format!("<p><strong>{}</strong></p>", header));
            } else {
                html.push_str(&format!("<p><strong>{}</strong> {}</p>", header, body));
            }
        }

        html
    }

    /// Pass 2: drop empty paragraphs and stray spaces at paragraph edges.
    pub fn clean_whitespace(&self, text: &str) -> String {
        let text = SPACE_RUN.replace_all(text, " ");
        let text = SPACE_BEFORE_CLOSE.replace_all(&text, "</p>");
        let text = SPACE_AFTER_OPEN.replace_all(&text, "<p>");
        EMPTY_PARAGRAPH.replace_all(&text, "").into_owned()
    }

    /// Pass 3: save, skill, lore and flat checks become `@Check[...]` tags.
    ///
    /// Patterns run from most to least specific, so a generic form never
    /// claims text a specific form would have tagged.
    pub fn inline_checks(&self, text: &str) -> String {
        CHECK_PATTERNS.iter().fold(text.to_string(), |current, pattern| {
            outside_markup(&current, |plain| {
                pattern
                    .regex
                    .replace_all(plain, |caps: &Captures| self.check_replacement(pattern, caps))
                    .into_owned()
            })
        })
    }

    fn check_replacement(&self, pattern: &CheckPattern, caps: &Captures) -> String {
        let dc = &caps[pattern.dc_group];
        match pattern.kind {
            CheckKind::Flat => check_tag("flat", dc, false),
            CheckKind::Lore => {
                let lore = format!("{}-lore", crate::text::sluggify(&caps[pattern.type_group]));
                check_tag(&lore, dc, false)
            }
            CheckKind::Basic => check_tag(&caps[pattern.type_group].to_lowercase(), dc, true),
            CheckKind::Named => check_tag(&caps[pattern.type_group].to_lowercase(), dc, false),
            CheckKind::Known => {
                let word = caps[pattern.type_group].to_lowercase();
                if self.check_words.contains(&word) {
                    check_tag(&word, dc, false)
                } else {
                    caps[0].to_string()
                }
            }
        }
    }

    /// Pass 4: dice and damage phrases become `[[/r ...]]` inline rolls.
    pub fn damage_rolls(&self, text: &str) -> String {
        let text = replace_outside_markup(
            text,
            &DURATION_DICE,
            "[[/r ${1}d${2} #${3}]]{${1}d${2} ${3}}",
        );
        let text = replace_outside_markup(
            &text,
            &DICE_PLUS_FLAT_DAMAGE,
            "[[/r (${1}d${2}+${3})[${4}]]]{${1}d${2}+${3} ${4} damage}",
        );
        let text = replace_outside_markup(
            &text,
            &PERSISTENT_DAMAGE,
            &format!(
                "[[/r (${{1}}d${{2}})[persistent,${{3}}]]]{{${{1}}d${{2}} persistent ${{3}} damage}} {}",
                PERSISTENT_DAMAGE_REF
            ),
        );
        let text = replace_outside_markup(
            &text,
            &DICE_DAMAGE,
            "[[/r (${1}d${2})[${3}]]]{${1}d${2} ${3} damage}",
        );
        let text = replace_outside_markup(
            &text,
            &UNTYPED_DICE_DAMAGE,
            "[[/r ${1}d${2}]]{${1}d${2} damage}",
        );
        let text = replace_outside_markup(
            &text,
            &FLAT_DAMAGE,
            "[[/r (${1})[${2}]]]{${1} ${2} damage}",
        );
        let text = replace_outside_markup(
            &text,
            &TRAILING_DICE_WORD,
            "[[/r ${1}d${2} #${3}]]{${1}d${2} ${3}}${4}",
        );
        replace_outside_markup(&text, &TRAILING_DICE, "[[/r ${1}d${2}]]{${1}d${2}}${3}")
    }

    /// Pass 5: condition names (with an optional value) become compendium links.
    pub fn conditions(&self, text: &str) -> String {
        let Some(pattern) = &self.condition_pattern else {
            return text.to_string();
        };

        outside_markup(text, |plain| {
            pattern
                .replace_all(plain, |caps: &Captures| {
                    let name = self
                        .condition_names
                        .get(&caps[1].to_lowercase())
                        .cloned()
                        .unwrap_or_else(|| caps[1].to_string());
                    match caps.get(2) {
                        Some(value) => format!(
                            "@Compendium[{}.{}]{{{} {}}}",
                            CONDITION_COMPENDIUM,
                            name,
                            name,
                            value.as_str()
                        ),
                        None => format!("@Compendium[{}.{}]{{{}}}", CONDITION_COMPENDIUM, name, name),
                    }
                })
                .into_owned()
        })
    }

    /// Pass 6: each `Heightened (...)` starts its own bold paragraph after a rule.
    ///
    /// A heading that is already bold is left alone.
    pub fn heightened_sections(&self, text: &str) -> String {
        let rewritten = HEIGHTENED.replace_all(text, |caps: &Captures| {
            if caps.get(1).is_some() {
                return caps[0].to_string();
            }
            format!("</p><hr /><p><strong>Heightened ({})</strong>", &caps[2])
        });
        EMPTY_PARAGRAPH.replace_all(&rewritten, "").into_owned()
    }

    /// Pass 7: `•` bullets become a list following the paragraph that holds them.
    pub fn bullet_lists(&self, text: &str) -> String {
        PARAGRAPH
            .replace_all(text, |caps: &Captures| {
                let inner = &caps[1];
                if !inner.contains('•') {
                    return caps[0].to_string();
                }

                let mut parts = inner.split('•');
                let intro = parts.next().unwrap_or_default().trim();
                let items: String = parts
                    .map(|item| format!("<li>{}</li>", item.trim()))
                    .collect();

                if intro.is_empty() {
                    format!("<ul>{}</ul>", items)
                } else {
                    format!("<p>{}</p><ul>{}</ul>", intro, items)
                }
            })
            .into_owned()
    }

    /// Pass 8: `<n>-foot <shape>` becomes an `@Template[...]` reference.
    pub fn area_templates(&self, text: &str) -> String {
        replace_outside_markup(
            text,
            &AREA_TEMPLATE,
            "@Template[type:${2}|distance:${1}]{${1}-foot ${2}}",
        )
    }
}
