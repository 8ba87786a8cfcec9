//! Brand and deck configuration.
//!
//! A [`DeckConfig`] is built once (defaults, then an optional JSON file, then
//! command-line overrides) and passed by reference into every component, so
//! two compilations with different brands never share state.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Accepts `RRGGBB` with an optional leading `#`.
static HEX_COLOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?([0-9A-Fa-f]{2})([0-9A-Fa-f]{2})([0-9A-Fa-f]{2})$").unwrap());

/// Symbolic slide layout roles the compiler knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutRole {
    Title,
    Menu,
    Section,
    SectionPale,
    About,
    ContentWhite,
    ContentPale,
    Quote,
    Cta,
    ThankYou,
}

impl LayoutRole {
    /// Number of layout roles.
    pub const COUNT: usize = 10;

    /// All roles, in the template's conventional layout order.
    pub const ALL: [LayoutRole; Self::COUNT] = [
        LayoutRole::Title,
        LayoutRole::Menu,
        LayoutRole::Section,
        LayoutRole::SectionPale,
        LayoutRole::About,
        LayoutRole::ContentWhite,
        LayoutRole::ContentPale,
        LayoutRole::Quote,
        LayoutRole::Cta,
        LayoutRole::ThankYou,
    ];

    /// The snake_case name used in configuration and outline files.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutRole::Title => "title",
            LayoutRole::Menu => "menu",
            LayoutRole::Section => "section",
            LayoutRole::SectionPale => "section_pale",
            LayoutRole::About => "about",
            LayoutRole::ContentWhite => "content_white",
            LayoutRole::ContentPale => "content_pale",
            LayoutRole::Quote => "quote",
            LayoutRole::Cta => "cta",
            LayoutRole::ThankYou => "thank_you",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LayoutRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved mapping from layout role to the template's layout index.
///
/// The indices are an external contract with the template and are not
/// checked against it here; a wrong index yields the wrong look, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRegistry {
    indices: [usize; LayoutRole::COUNT],
}

impl LayoutRegistry {
    /// Resolve a registry from a role map, failing on the first unmapped role.
    pub fn from_map(map: &BTreeMap<LayoutRole, usize>) -> Result<Self> {
        let mut indices = [0; LayoutRole::COUNT];
        for role in LayoutRole::ALL {
            indices[role.slot()] = *map
                .get(&role)
                .ok_or(Error::IncompleteLayoutRegistry(role))?;
        }
        Ok(Self { indices })
    }

    /// Layout index for a role.
    pub fn index(&self, role: LayoutRole) -> usize {
        self.indices[role.slot()]
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        let mut indices = [0; LayoutRole::COUNT];
        for (i, slot) in indices.iter_mut().enumerate() {
            *slot = i;
        }
        Self { indices }
    }
}

/// A 24-bit sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const WHITE: RgbColor = RgbColor::new(0xFF, 0xFF, 0xFF);
    pub const BLACK: RgbColor = RgbColor::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB` or `#RRGGBB`.
    pub fn from_hex(text: &str) -> Result<Self> {
        let caps = HEX_COLOR_REGEX
            .captures(text.trim())
            .ok_or_else(|| Error::InvalidColor(text.to_string()))?;
        let channel = |i: usize| {
            u8::from_str_radix(&caps[i], 16).map_err(|_| Error::InvalidColor(text.to_string()))
        };
        Ok(Self::new(channel(1)?, channel(2)?, channel(3)?))
    }

    /// Upper-case hex without the leading `#`, as DrawingML `srgbClr` wants it.
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Largest font size DrawingML accepts, in points.
pub const MAX_FONT_SIZE_PT: u32 = 4000;

/// On-disk configuration. Every key is optional and falls back to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    template_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    accent: Option<String>,
    font_family: Option<String>,
    layouts: Option<BTreeMap<LayoutRole, usize>>,
    body_placeholder_idx: Option<u32>,
    body_font_size_pt: Option<u32>,
    agenda_heading: Option<String>,
    closing_heading: Option<String>,
}

/// Immutable configuration for one compilation.
#[derive(Debug, Clone)]
pub struct DeckConfig {
    /// Template package (.potx or .pptx) to build from.
    pub template_path: PathBuf,
    /// Where the finished deck is written.
    pub output_path: PathBuf,
    /// Brand accent colour used for text on light backgrounds.
    pub accent: RgbColor,
    /// Brand font family applied to every run the compiler writes.
    pub font_family: String,
    /// Layout role to template layout index.
    pub layouts: LayoutRegistry,
    /// Placeholder index of the body region on content layouts.
    pub body_placeholder_idx: u32,
    /// Font size of body intro and bullet text, in points.
    pub body_font_size_pt: u32,
    /// Heading of the agenda slide.
    pub agenda_heading: String,
    /// Heading of the closing slide.
    pub closing_heading: String,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("template.potx"),
            output_path: PathBuf::from("output.pptx"),
            accent: RgbColor::BLACK,
            font_family: "Arial".to_string(),
            layouts: LayoutRegistry::default(),
            body_placeholder_idx: 13,
            body_font_size_pt: 22,
            agenda_heading: "AGENDA".to_string(),
            closing_heading: "THANK YOU".to_string(),
        }
    }
}

impl DeckConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration, filling absent keys from the defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(json).map_err(|e| Error::ConfigParse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(path) = file.template_path {
            config.template_path = path;
        }
        if let Some(path) = file.output_path {
            config.output_path = path;
        }
        if let Some(accent) = file.accent {
            config.accent = RgbColor::from_hex(&accent)?;
        }
        if let Some(font) = file.font_family {
            config.font_family = font;
        }
        if let Some(map) = file.layouts {
            config.layouts = LayoutRegistry::from_map(&map)?;
        }
        if let Some(idx) = file.body_placeholder_idx {
            config.body_placeholder_idx = idx;
        }
        if let Some(size) = file.body_font_size_pt {
            if !(1..=MAX_FONT_SIZE_PT).contains(&size) {
                return Err(Error::ConfigParse(format!(
                    "body_font_size_pt must be between 1 and {}, got {}",
                    MAX_FONT_SIZE_PT, size
                )));
            }
            config.body_font_size_pt = size;
        }
        if let Some(heading) = file.agenda_heading {
            config.agenda_heading = heading;
        }
        if let Some(heading) = file.closing_heading {
            config.closing_heading = heading;
        }

        log::debug!("Loaded deck configuration: {:?}", config);
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = path.into();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_accent(mut self, accent: RgbColor) -> Self {
        self.accent = accent;
        self
    }

    pub fn with_font_family(mut self, font: impl Into<String>) -> Self {
        self.font_family = font.into();
        self
    }

    pub fn with_layouts(mut self, layouts: LayoutRegistry) -> Self {
        self.layouts = layouts;
        self
    }

    /// Text colour for a background: the accent on light, white on dark.
    pub fn text_color(&self, light_background: bool) -> RgbColor {
        if light_background {
            self.accent
        } else {
            RgbColor::WHITE
        }
    }
}
