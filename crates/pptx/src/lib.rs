//! PPTX (Office Open XML) backend for building decks from outlines.
//!
//! A deck is built by converting a `.potx` template into an editable package,
//! clearing its slides, adding slides from the template's layouts, filling
//! their placeholders and attaching click-to-reveal animation timelines.

pub mod compiler;
pub mod document;
pub mod opc;
pub mod package;
pub mod text;
pub mod timing;
pub mod xml;

#[cfg(test)]
mod test_support;

pub use compiler::DeckCompiler;
pub use document::{Presentation, ShapeInfo, Slide};
pub use package::{convert_template, ConversionSummary};
pub use text::{set_body_with_bullets, set_text, TextOutcome};
pub use timing::{synthesize, IdSequence, Timeline, TimelineOutcome};
