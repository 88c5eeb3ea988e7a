//! Canonical style definition.
//!
//! The fixed vocabulary consumed by every engine component: style-class names for
//! the paragraph/list/list-item tags, the ordered section icons, and the
//! category → allowed-format rule table. Components never keep a private copy of
//! this data; they hold the same `Arc<StyleGuide>` handed to [`crate::Engine::new`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StyleGuideError;

/// Content category declared on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "STRENGTH")]
    Strength,
    #[serde(rename = "CARDIO")]
    Cardio,
    #[serde(rename = "METABOLIC")]
    Metabolic,
    #[serde(rename = "CALORIE BURNING")]
    CalorieBurning,
    #[serde(rename = "MOBILITY & STABILITY")]
    MobilityStability,
    #[serde(rename = "CHALLENGE")]
    Challenge,
    #[serde(rename = "PILATES")]
    Pilates,
    #[serde(rename = "RECOVERY")]
    Recovery,
    #[serde(rename = "MICRO-WORKOUTS")]
    MicroWorkouts,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Strength,
        Category::Cardio,
        Category::Metabolic,
        Category::CalorieBurning,
        Category::MobilityStability,
        Category::Challenge,
        Category::Pilates,
        Category::Recovery,
        Category::MicroWorkouts,
    ];

    /// The label used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Strength => "STRENGTH",
            Category::Cardio => "CARDIO",
            Category::Metabolic => "METABOLIC",
            Category::CalorieBurning => "CALORIE BURNING",
            Category::MobilityStability => "MOBILITY & STABILITY",
            Category::Challenge => "CHALLENGE",
            Category::Pilates => "PILATES",
            Category::Recovery => "RECOVERY",
            Category::MicroWorkouts => "MICRO-WORKOUTS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['_', '-'], " ").to_uppercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().replace('-', " ") == wanted)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Workout format declared on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "REPS & SETS")]
    RepsAndSets,
    #[serde(rename = "CIRCUIT")]
    Circuit,
    #[serde(rename = "AMRAP")]
    Amrap,
    #[serde(rename = "EMOM")]
    Emom,
    #[serde(rename = "TABATA")]
    Tabata,
    #[serde(rename = "FOR TIME")]
    ForTime,
    #[serde(rename = "MIX")]
    Mix,
}

impl Format {
    pub const ALL: [Format; 7] = [
        Format::RepsAndSets,
        Format::Circuit,
        Format::Amrap,
        Format::Emom,
        Format::Tabata,
        Format::ForTime,
        Format::Mix,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Format::RepsAndSets => "REPS & SETS",
            Format::Circuit => "CIRCUIT",
            Format::Amrap => "AMRAP",
            Format::Emom => "EMOM",
            Format::Tabata => "TABATA",
            Format::ForTime => "FOR TIME",
            Format::Mix => "MIX",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', " ").to_uppercase().replace(" AND ", " & ");
        Format::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| format!("unknown format '{s}'"))
    }
}

/// Required `class` values for the block tags of the dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleClasses {
    pub paragraph: String,
    pub bullet_list: String,
    pub list_item: String,
}

/// One section header of a workout, listed in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Header label without its icon (e.g. `Activation`).
    pub name: String,
    /// The icon that must prefix the header text.
    pub icon: String,
    /// Whether a workout is non-compliant without this section.
    #[serde(default)]
    pub required: bool,
}

/// The canonical style definition.
///
/// Categories listed in `fixed_formats` are fixed-rule categories; every other
/// category is flexible and accepts any of `flexible_formats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleGuide {
    pub classes: StyleClasses,
    pub sections: Vec<SectionSpec>,
    pub fixed_formats: BTreeMap<Category, Vec<Format>>,
    pub flexible_formats: Vec<Format>,
    /// Lower-case keywords whose presence in a body is evidence for a format.
    #[serde(default)]
    pub format_keywords: BTreeMap<Format, Vec<String>>,
}

fn section(name: &str, icon: &str, required: bool) -> SectionSpec {
    SectionSpec {
        name: name.to_owned(),
        icon: icon.to_owned(),
        required,
    }
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_owned()).collect()
}

impl StyleGuide {
    /// The built-in rule table used in production.
    #[must_use]
    pub fn standard() -> Self {
        let fixed_formats = BTreeMap::from([
            (Category::Strength, vec![Format::RepsAndSets]),
            (Category::MobilityStability, vec![Format::RepsAndSets]),
            (Category::Pilates, vec![Format::RepsAndSets]),
            (Category::Recovery, vec![Format::Mix]),
            (
                Category::MicroWorkouts,
                vec![Format::Circuit, Format::Amrap, Format::Emom, Format::Tabata],
            ),
        ]);

        let format_keywords = BTreeMap::from([
            (
                Format::Tabata,
                keywords(&["tabata", "20 seconds on", "20s on", "10 seconds rest"]),
            ),
            (
                Format::Amrap,
                keywords(&["amrap", "as many rounds as possible", "as many reps as possible"]),
            ),
            (
                Format::Emom,
                keywords(&["emom", "every minute on the minute", "on the minute"]),
            ),
            (
                Format::ForTime,
                keywords(&["for time", "as fast as possible", "time cap"]),
            ),
            (Format::Circuit, keywords(&["circuit", "station", "rounds of"])),
            (
                Format::RepsAndSets,
                keywords(&["sets of", "sets x", "rest between sets"]),
            ),
        ]);

        Self {
            classes: StyleClasses {
                paragraph: "tiptap-paragraph".to_owned(),
                bullet_list: "tiptap-bullet-list".to_owned(),
                list_item: "tiptap-list-item".to_owned(),
            },
            sections: vec![
                section("Soft Tissue Preparation", "\u{1F9FD}", false),
                section("Activation", "\u{1F525}", true),
                section("Main Workout", "\u{1F4AA}", true),
                section("Finisher", "\u{26A1}", false),
                section("Cool Down", "\u{1F9D8}", true),
            ],
            fixed_formats,
            flexible_formats: Format::ALL.to_vec(),
            format_keywords,
        }
    }

    /// Load a guide from JSON and check it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a guide or the guide is inconsistent.
    pub fn from_json_str(content: &str) -> Result<Self, StyleGuideError> {
        let guide: Self =
            serde_json::from_str(content).map_err(|e| StyleGuideError::Parse(e.to_string()))?;
        guide.check()?;
        Ok(guide)
    }

    /// Load a guide from YAML and check it.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML does not describe a guide or the guide is inconsistent.
    pub fn from_yaml_str(content: &str) -> Result<Self, StyleGuideError> {
        let guide: Self =
            serde_saphyr::from_str(content).map_err(|e| StyleGuideError::Parse(e.to_string()))?;
        guide.check()?;
        Ok(guide)
    }

    /// Reject guides that would make the normalizer or rule engine ambiguous.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn check(&self) -> Result<(), StyleGuideError> {
        for (tag, class) in [
            ("p", &self.classes.paragraph),
            ("ul", &self.classes.bullet_list),
            ("li", &self.classes.list_item),
        ] {
            if class.trim().is_empty() || class.contains(['"', '\'', '<', '>']) {
                return Err(StyleGuideError::InvalidClass {
                    tag: tag.to_owned(),
                    class: class.clone(),
                });
            }
        }

        for (i, s) in self.sections.iter().enumerate() {
            if s.icon.trim().is_empty() {
                return Err(StyleGuideError::EmptyIcon(s.name.clone()));
            }
            if self.sections[..i].iter().any(|prev| prev.icon == s.icon) {
                return Err(StyleGuideError::DuplicateIcon(s.icon.clone()));
            }
        }

        if let Some((category, _)) = self.fixed_formats.iter().find(|(_, f)| f.is_empty()) {
            return Err(StyleGuideError::EmptyRule(*category));
        }
        if self.flexible_formats.is_empty() {
            return Err(StyleGuideError::NoFlexibleFormats);
        }
        Ok(())
    }

    /// Canonical empty paragraph, the only accepted spelling of a blank line.
    #[must_use]
    pub fn empty_paragraph(&self) -> String {
        format!("{}</p>", self.paragraph_open())
    }

    #[must_use]
    pub fn paragraph_open(&self) -> String {
        format!("<p class=\"{}\">", self.classes.paragraph)
    }

    #[must_use]
    pub fn list_open(&self) -> String {
        format!("<ul class=\"{}\">", self.classes.bullet_list)
    }

    #[must_use]
    pub fn list_item_open(&self) -> String {
        format!("<li class=\"{}\">", self.classes.list_item)
    }

    /// Class required on `tag` (`p`, `ul`, `li`), if the tag is part of the vocabulary.
    #[must_use]
    pub fn class_for_tag(&self, tag: &str) -> Option<&str> {
        match tag {
            "p" => Some(&self.classes.paragraph),
            "ul" => Some(&self.classes.bullet_list),
            "li" => Some(&self.classes.list_item),
            _ => None,
        }
    }

    pub fn icons(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.icon.as_str())
    }

    /// Section whose icon starts `text`.
    #[must_use]
    pub fn section_for_icon_prefix(&self, text: &str) -> Option<&SectionSpec> {
        let text = text.trim_start();
        self.sections.iter().find(|s| text.starts_with(&s.icon))
    }

    /// Section whose name matches `label` ignoring case, icons and trailing colon.
    #[must_use]
    pub fn section_named(&self, label: &str) -> Option<&SectionSpec> {
        let mut label = label.trim();
        if let Some(s) = self.section_for_icon_prefix(label) {
            label = label.trim_start()[s.icon.len()..].trim();
        }
        let label = label.trim_end_matches(':').trim();
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(label))
    }

    /// Allowed formats of a fixed-rule category; `None` for flexible categories.
    #[must_use]
    pub fn fixed_formats(&self, category: Category) -> Option<&[Format]> {
        self.fixed_formats.get(&category).map(Vec::as_slice)
    }

    /// Every format a record of `category` may declare.
    #[must_use]
    pub fn permitted_formats(&self, category: Category) -> &[Format] {
        self.fixed_formats(category)
            .unwrap_or(self.flexible_formats.as_slice())
    }
}

impl Default for StyleGuide {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_guide_is_consistent() {
        assert!(StyleGuide::standard().check().is_ok());
    }

    #[test]
    fn test_strength_is_fixed_to_reps_and_sets() {
        let guide = StyleGuide::standard();
        assert_eq!(
            guide.fixed_formats(Category::Strength),
            Some(&[Format::RepsAndSets][..])
        );
        assert!(guide.fixed_formats(Category::Cardio).is_none());
        assert_eq!(guide.permitted_formats(Category::Cardio).len(), Format::ALL.len());
    }

    #[test]
    fn test_wire_labels() {
        assert_eq!(
            serde_json::to_string(&Format::RepsAndSets).unwrap(),
            "\"REPS & SETS\""
        );
        assert_eq!(
            serde_json::from_str::<Category>("\"MOBILITY & STABILITY\"").unwrap(),
            Category::MobilityStability
        );
    }

    #[test]
    fn test_parse_labels_from_cli_spelling() {
        assert_eq!("reps_and_sets".parse::<Format>().unwrap(), Format::RepsAndSets);
        assert_eq!("for-time".parse::<Format>().unwrap_err(), "unknown format 'for-time'");
        assert_eq!("micro_workouts".parse::<Category>().unwrap(), Category::MicroWorkouts);
        assert_eq!("Strength".parse::<Category>().unwrap(), Category::Strength);
    }

    #[test]
    fn test_section_lookup() {
        let guide = StyleGuide::standard();
        assert_eq!(
            guide.section_named("\u{1F525} activation:").map(|s| s.name.as_str()),
            Some("Activation")
        );
        assert_eq!(
            guide.section_for_icon_prefix("\u{1F4AA} Main Workout").map(|s| s.required),
            Some(true)
        );
        assert!(guide.section_named("Warm-up").is_none());
    }

    #[test]
    fn test_guide_roundtrips_through_json() {
        let guide = StyleGuide::standard();
        let json = serde_json::to_string(&guide).unwrap();
        assert_eq!(StyleGuide::from_json_str(&json).unwrap(), guide);
    }

    #[test]
    fn test_guide_from_yaml() {
        let yaml = r#"
classes:
  paragraph: "para"
  bullet_list: "list"
  list_item: "item"
sections:
  - name: "Warm Up"
    icon: "*"
    required: true
fixed_formats:
  "STRENGTH": ["CIRCUIT"]
flexible_formats: ["CIRCUIT", "AMRAP"]
"#;
        let guide = StyleGuide::from_yaml_str(yaml).unwrap();
        assert_eq!(guide.empty_paragraph(), "<p class=\"para\"></p>");
        assert_eq!(guide.fixed_formats(Category::Strength), Some(&[Format::Circuit][..]));
        assert!(guide.format_keywords.is_empty());
    }

    #[test]
    fn test_check_rejects_duplicate_icons() {
        let mut guide = StyleGuide::standard();
        guide.sections[1].icon = guide.sections[0].icon.clone();
        assert!(matches!(guide.check(), Err(StyleGuideError::DuplicateIcon(_))));
    }

    #[test]
    fn test_check_rejects_quoted_class() {
        let mut guide = StyleGuide::standard();
        guide.classes.list_item = "a\"b".to_owned();
        assert!(matches!(
            guide.check(),
            Err(StyleGuideError::InvalidClass { .. })
        ));
    }
}
