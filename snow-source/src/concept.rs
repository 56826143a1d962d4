//! Mapping of abstract variable concepts onto each source's native names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A physical quantity requested independently of how a source names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    SnowWaterEquivalent,
    SnowDepth,
    Snowfall,
    Precipitation,
    MinTemperature,
    SnowCover,
    /// Anything else, matched by its own text.
    Named(String),
}

impl Concept {
    /// Substrings that identify this concept, most specific first.
    pub fn keywords(&self) -> Vec<&str> {
        match self {
            Concept::SnowWaterEquivalent => {
                vec!["snow water", "water_equivalent", "swe", "wteq"]
            }
            Concept::SnowDepth => vec!["snow_depth", "snow depth", "snwd"],
            Concept::Snowfall => vec!["snowfall"],
            Concept::Precipitation => vec!["prcp", "precipitation", "prec", "pr"],
            Concept::MinTemperature => vec!["tmin", "tmmn", "temperature_2m_min", "minimum temp"],
            Concept::SnowCover => vec!["ndsi_snow_cover", "snow_cover", "snow cover"],
            Concept::Named(name) => vec![name.as_str()],
        }
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concept::SnowWaterEquivalent => write!(f, "snow water equivalent"),
            Concept::SnowDepth => write!(f, "snow depth"),
            Concept::Snowfall => write!(f, "snowfall"),
            Concept::Precipitation => write!(f, "precipitation"),
            Concept::MinTemperature => write!(f, "minimum temperature"),
            Concept::SnowCover => write!(f, "snow cover"),
            Concept::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Resolves a concept to one entry of a source's variable catalogue.
pub trait ConceptResolver: Send + Sync {
    fn resolve(&self, concept: &Concept, catalogue: &[String]) -> Option<String>;
}

/// Case-insensitive substring matching over the catalogue.
///
/// Keywords are tried in order. For the first keyword that matches anything,
/// an exact (case-insensitive) name wins, otherwise the shortest matching
/// name, ties going to catalogue order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringResolver;

impl ConceptResolver for SubstringResolver {
    fn resolve(&self, concept: &Concept, catalogue: &[String]) -> Option<String> {
        for keyword in concept.keywords() {
            let needle = keyword.to_lowercase();
            let mut matches = catalogue
                .iter()
                .filter(|name| name.to_lowercase().contains(&needle))
                .peekable();
            if matches.peek().is_none() {
                continue;
            }
            let matches: Vec<&String> = matches.collect();
            if let Some(exact) = matches.iter().find(|name| name.to_lowercase() == needle) {
                return Some((*exact).clone());
            }
            return matches
                .into_iter()
                .min_by_key(|name| name.len())
                .cloned();
        }
        None
    }
}

/// Exact concept → native name table supplied by a source that knows its
/// own naming. Names absent from the catalogue do not resolve.
#[derive(Debug, Default, Clone)]
pub struct ExactResolver {
    mapping: HashMap<Concept, String>,
}

impl ExactResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, concept: Concept, native_name: &str) -> Self {
        self.mapping.insert(concept, native_name.to_string());
        self
    }
}

impl ConceptResolver for ExactResolver {
    fn resolve(&self, concept: &Concept, catalogue: &[String]) -> Option<String> {
        let native = self.mapping.get(concept)?;
        catalogue.iter().find(|name| *name == native).cloned()
    }
}
