//! Core library for importing creature-builder stat blocks as PF2e actor data.

pub mod error;
pub mod file_utils;
pub mod ids;
pub mod markup;
pub mod models;
pub mod normalizers;
pub mod parser;
pub mod spells;
pub mod text;
pub mod vocabulary;

pub use error::{Diagnostics, FieldIssue, ImportError, Result};
pub use markup::DescriptionMarkup;
pub use models::{ItemRecord, ParseResults, RawStatBlock};
pub use parser::MonsterParser;
pub use spells::{InMemorySpellIndex, SpellIndex, SpellResolver, UnavailableSpellIndex};
pub use vocabulary::{ImportConfig, ParserSettings, Vocabulary};
