//! Rhythm templates: a slot-count pattern plus the reference performance
//! recorded in that feel.

use std::collections::BTreeMap;
use std::path::PathBuf;

use montuno::RhythmPattern;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Reference MIDI file, relative to `defaults.reference_dir` unless absolute.
    pub reference: PathBuf,

    #[serde(default)]
    pub lead_in: Vec<u32>,

    pub steady: Vec<u32>,
}

impl TemplateConfig {
    pub fn pattern(&self) -> montuno::Result<RhythmPattern> {
        RhythmPattern::new(self.lead_in.clone(), self.steady.clone())
    }
}

impl From<(&str, RhythmPattern)> for TemplateConfig {
    fn from((reference, pattern): (&str, RhythmPattern)) -> Self {
        Self {
            reference: PathBuf::from(reference),
            lead_in: pattern.lead_in().to_vec(),
            steady: pattern.steady().to_vec(),
        }
    }
}

/// Name of the template used when nothing else is configured.
pub const DEFAULT_TEMPLATE: &str = "2-3";

/// The two son clave directions.
pub fn builtin_templates() -> BTreeMap<String, TemplateConfig> {
    let mut templates = BTreeMap::new();
    templates.insert(
        "2-3".to_string(),
        TemplateConfig::from(("tradicional_2-3.mid", RhythmPattern::clave_2_3())),
    );
    templates.insert(
        "3-2".to_string(),
        TemplateConfig::from(("tradicional_3-2.mid", RhythmPattern::clave_3_2())),
    );
    templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtins_match_clave_patterns() {
        let templates = builtin_templates();
        assert_eq!(templates["2-3"].pattern().unwrap(), RhythmPattern::clave_2_3());
        assert_eq!(templates["3-2"].pattern().unwrap(), RhythmPattern::clave_3_2());
        assert_eq!(templates["3-2"].reference, PathBuf::from("tradicional_3-2.mid"));
        assert!(templates.contains_key(DEFAULT_TEMPLATE));
    }

    #[test]
    fn empty_steady_is_rejected() {
        let template = TemplateConfig {
            reference: PathBuf::from("x.mid"),
            lead_in: vec![3],
            steady: vec![],
        };
        assert!(template.pattern().is_err());
    }
}
