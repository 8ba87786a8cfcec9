//! Core domain types, brand configuration and compile reports for
//! outline-driven slide decks.

pub mod config;
pub mod error;
pub mod outline;
pub mod report;

pub use config::{DeckConfig, LayoutRegistry, LayoutRole, RgbColor, MAX_FONT_SIZE_PT};
pub use error::{Error, Result};
pub use outline::{ContentSlide, Outline, QuoteSlide, Section, SectionStyle, SlideContent};
pub use report::{CompileReport, Notice, SkipReason, SlideKind, SlideRecord, TimelineStatus};
