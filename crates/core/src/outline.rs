//! Presentation outline: the declarative input the compiler walks.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::LayoutRole;
use crate::error::{Error, Result};

/// Root of a presentation outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    /// Heading of the title slide.
    pub title: String,

    /// Subtitle of the title slide.
    pub subtitle: String,

    /// Subtitle of the closing slide.
    #[serde(default, alias = "closing_subtitle")]
    pub thank_you_subtitle: String,

    /// Sections in presentation order.
    pub sections: Vec<Section>,
}

/// How a section announces itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStyle {
    /// Header slide on the dark section layout.
    #[default]
    Blue,
    /// Header slide on the pale section layout.
    Pale,
    /// No header slide; content slides still render.
    None,
}

impl SectionStyle {
    /// Whether this section gets a header slide and an agenda line.
    pub fn shows_header(&self) -> bool {
        !matches!(self, SectionStyle::None)
    }
}

/// A named group of slides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,

    /// Only required when the header slide is rendered.
    #[serde(default)]
    pub subtitle: Option<String>,

    #[serde(default, rename = "section_type")]
    pub style: SectionStyle,

    #[serde(default)]
    pub slides: Vec<SlideContent>,
}

impl Section {
    /// Subtitle for the header slide, or a structural error naming the section.
    pub fn header_subtitle(&self) -> Result<&str> {
        self.subtitle.as_deref().ok_or_else(|| Error::MissingField {
            node: format!("section '{}'", self.name),
            field: "subtitle",
        })
    }
}

/// One slide's worth of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlideContent {
    Content(ContentSlide),
    Quote(QuoteSlide),
}

/// Title, subtitle, intro paragraph and bullets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSlide {
    pub title: String,
    pub subtitle: String,
    pub intro: String,
    pub bullets: Vec<String>,

    /// Explicit layout; when absent the compiler alternates white and pale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutRole>,
}

/// A quotation with optional attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSlide {
    pub quote: String,

    #[serde(default)]
    pub attribution: String,
}

impl Outline {
    /// Parse an outline from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::OutlineParse(e.to_string()))
    }

    /// Load an outline from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Names of sections that appear on the agenda, in order.
    pub fn agenda_items(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.style.shows_header())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Number of sections that render a header slide.
    pub fn header_count(&self) -> usize {
        self.sections.iter().filter(|s| s.style.shows_header()).count()
    }

    /// Number of content and quote slides across all sections.
    pub fn body_slide_count(&self) -> usize {
        self.sections.iter().map(|s| s.slides.len()).sum()
    }

    /// Slides the compiled deck will contain: title, agenda and about,
    /// one header per shown section, every body slide, then CTA and closing.
    pub fn expected_slide_count(&self) -> usize {
        3 + self.header_count() + self.body_slide_count() + 2
    }

    /// Built-in example used when no outline is supplied.
    pub fn example() -> Self {
        fn content(title: &str, subtitle: &str, intro: &str, bullets: &[&str]) -> SlideContent {
            SlideContent::Content(ContentSlide {
                title: title.to_string(),
                subtitle: subtitle.to_string(),
                intro: intro.to_string(),
                bullets: bullets.iter().map(|b| b.to_string()).collect(),
                layout: None,
            })
        }

        fn section(name: &str, subtitle: &str, style: SectionStyle, slides: Vec<SlideContent>) -> Section {
            Section {
                name: name.to_string(),
                subtitle: Some(subtitle.to_string()),
                style,
                slides,
            }
        }

        Self {
            title: "PRESENTATION TITLE".to_string(),
            subtitle: "Your Subtitle Here".to_string(),
            thank_you_subtitle: "Contact information or next steps".to_string(),
            sections: vec![
                section(
                    "SECTION ONE",
                    "Section description",
                    SectionStyle::Blue,
                    vec![content(
                        "SLIDE TITLE",
                        "Short Subtitle (5-10 words)",
                        "This is the intro paragraph explaining the context. Keep it to 1-2 sentences that frame the bullet points.",
                        &["First key point", "Second key point", "Third key point", "Fourth key point (maximum)"],
                    )],
                ),
                section(
                    "SECTION TWO",
                    "Another section",
                    SectionStyle::Blue,
                    vec![
                        content(
                            "ANOTHER SLIDE",
                            "More Content Here",
                            "Another intro paragraph providing context for the following points.",
                            &["Point A", "Point B", "Point C"],
                        ),
                        content(
                            "THIRD SLIDE",
                            "Even More Content",
                            "Sections can have multiple content slides. The compiler handles this automatically.",
                            &["First item", "Second item"],
                        ),
                    ],
                ),
                section(
                    "LIMITATIONS",
                    "What to watch out for",
                    SectionStyle::Pale,
                    vec![content(
                        "CURRENT CONSTRAINTS",
                        "Room for Improvement",
                        "Every solution has limitations. Be transparent about them.",
                        &["Limitation one", "Limitation two", "Limitation three"],
                    )],
                ),
                section("Q&A", "Questions?", SectionStyle::Blue, Vec::new()),
            ],
        }
    }
}
