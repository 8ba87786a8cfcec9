//! Compile report: what was produced, slide by slide.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::config::LayoutRole;

/// What a slide is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlideKind {
    Title,
    Agenda,
    About,
    SectionHeader,
    Content,
    Quote,
    CallToAction,
    ThankYou,
}

impl SlideKind {
    /// Slides whose content and animation come entirely from the template.
    pub fn is_fixed(self) -> bool {
        matches!(self, SlideKind::About | SlideKind::CallToAction)
    }
}

/// Why a text operation left a placeholder alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The slide has no placeholder with this index.
    SlotMissing { idx: u32 },
    /// The placeholder exists but is not a shape that can hold text.
    NotTextShape { idx: u32, element: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SlotMissing { idx } => write!(f, "placeholder {} not found", idx),
            SkipReason::NotTextShape { idx, element } => {
                write!(f, "placeholder {} is a <{}> and cannot hold text", idx, element)
            }
        }
    }
}

/// A recoverable problem recorded against a slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Notice {
    TextSkipped(SkipReason),
    AnimationFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::TextSkipped(reason) => write!(f, "text skipped: {}", reason),
            Notice::AnimationFailed(reason) => write!(f, "animation error: {}", reason),
        }
    }
}

/// What happened to a slide's animation timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimelineStatus {
    /// A new timeline replaced whatever the slide had.
    Attached {
        entries: usize,
        paragraph_builds: usize,
        whole_builds: usize,
    },
    /// Nothing to animate; any existing timeline was kept.
    NoEligibleShapes,
    /// Fixed layout; the template's own animation is kept.
    Untouched,
    /// Synthesis failed; see the slide's notices.
    Failed,
}

/// One produced slide.
#[derive(Debug, Clone, Serialize)]
pub struct SlideRecord {
    /// 1-based position in the deck.
    pub ordinal: usize,
    pub kind: SlideKind,
    pub layout: LayoutRole,
    /// Human-readable progress label.
    pub label: String,
    pub timeline: TimelineStatus,
    pub notices: Vec<Notice>,
}

/// Result of a successful compilation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompileReport {
    pub output_path: PathBuf,
    pub slides: Vec<SlideRecord>,
}

impl CompileReport {
    pub fn total_slides(&self) -> usize {
        self.slides.len()
    }

    /// Slides of one kind, in deck order.
    pub fn slides_of(&self, kind: SlideKind) -> impl Iterator<Item = &SlideRecord> {
        self.slides.iter().filter(move |s| s.kind == kind)
    }

    /// All notices, paired with the slide they belong to.
    pub fn notices(&self) -> impl Iterator<Item = (&SlideRecord, &Notice)> {
        self.slides
            .iter()
            .flat_map(|s| s.notices.iter().map(move |n| (s, n)))
    }
}
