use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs::read_to_string;
use std::path::Path;

use anyhow::{Context, Result};

const EN: &str = include_str!("../../lang/en.toml");
const RU: &str = include_str!("../../lang/ru.toml");

/// The two locales the prompts are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Language {
    English,
    Russian,
}

impl Language {
    /// `"1"` picks Russian, anything else English.
    pub(crate) fn from_choice(choice: &str) -> Self {
        match choice.trim() {
            "1" => Language::Russian,
            _ => Language::English,
        }
    }

    pub(crate) fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Russian => "ru",
        }
    }

    fn builtin(self) -> &'static str {
        match self {
            Language::English => EN,
            Language::Russian => RU,
        }
    }
}

/// Key/value prompt table for one language.
#[derive(Debug)]
pub(crate) struct Messages {
    language: Language,
    table: HashMap<String, String>,
    reported_missing: RefCell<HashSet<String>>,
}

impl Messages {
    /// Loads the built-in table for `language`, then lets `lang_<code>.toml` in `dir` override keys.
    pub(crate) fn load(language: Language, dir: &Path) -> Result<Self> {
        let mut table: HashMap<String, String> =
            toml::from_str(language.builtin()).context("Built-in locale table is malformed")?;

        let override_path = dir.join(format!("lang_{}.toml", language.code()));
        if override_path.exists() {
            let text = read_to_string(&override_path)
                .with_context(|| format!("Failed to read {}", override_path.display()))?;
            let overrides: HashMap<String, String> = toml::from_str(&text)
                .with_context(|| format!("Failed to parse {}", override_path.display()))?;
            trace!("Loaded {} locale overrides from {}", overrides.len(), override_path.display());
            table.extend(overrides);
        }

        Ok(Self {
            language,
            table,
            reported_missing: RefCell::new(HashSet::new()),
        })
    }

    pub(crate) fn language(&self) -> Language {
        self.language
    }

    /// Looks up `key`, falling back to the key itself.
    pub(crate) fn get<'a>(&'a self, key: &'a str) -> &'a str {
        match self.table.get(key) {
            Some(text) => text.as_str(),
            None => {
                if self.reported_missing.borrow_mut().insert(key.to_string()) {
                    warn!("Missing {} locale key \"{}\"", self.language.code(), key);
                }
                key
            }
        }
    }
}
