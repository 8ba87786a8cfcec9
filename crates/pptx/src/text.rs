//! Text placement on slide placeholders.
//!
//! Two writers share the same run styling: [`set_text`] for single-style
//! blocks (titles, subtitles, agenda lines) and [`set_body_with_bullets`] for
//! the intro-plus-bullets body region of content slides.

use std::borrow::Cow;

use deck_core::{DeckConfig, RgbColor, SkipReason, MAX_FONT_SIZE_PT};

use crate::document::{empty_text_body, Slide};
use crate::xml::XmlElement;

/// Line spacing for every paragraph written here (1.2 lines).
const LINE_SPACING_PCT: u32 = 120_000;

/// Hanging indent for bullet paragraphs, in EMU (0.375 in).
const BULLET_INDENT_EMU: i64 = 342_900;

/// Symbol font the bullet glyph is drawn from.
const BULLET_FONT: &str = "Wingdings";

/// Right arrow in Wingdings.
const BULLET_CHAR: char = '\u{D8}';

/// Vertical tab, a line break that stays inside the paragraph.
const LINE_BREAK: char = '\u{B}';

/// Result of a text operation on one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    Applied,
    Skipped(SkipReason),
}

impl TextOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TextOutcome::Applied)
    }
}

/// Replace a placeholder's text with one paragraph per line.
///
/// Runs get the brand font, 1.2 line spacing and the optional size. On light
/// backgrounds the accent colour is applied; on dark ones the layout's own
/// colour is kept. Empty lines become paragraphs without runs. A vertical
/// tab breaks the line inside its paragraph.
pub fn set_text(
    slide: &mut Slide,
    idx: u32,
    text: &str,
    light_background: bool,
    font_size_pt: Option<u32>,
    config: &DeckConfig,
) -> TextOutcome {
    let body = match text_body_mut(slide, idx) {
        Ok(body) => body,
        Err(reason) => return TextOutcome::Skipped(reason),
    };

    body.remove_children("a:p");
    for line in text.split('\n') {
        let mut paragraph = XmlElement::new("a:p").with_child(paragraph_properties());
        if !line.is_empty() {
            let mut props = XmlElement::new("a:rPr");
            if let Some(size) = font_size_pt {
                props.set_attr("sz", font_size(size).to_string());
            }
            if light_background {
                props.push(solid_fill(config.accent));
            }
            props.push(latin(&config.font_family));
            push_runs(&mut paragraph, &props, line);
        }
        body.push(paragraph);
    }
    TextOutcome::Applied
}

/// Rebuild a body placeholder as intro, spacer, then one arrow bullet per item.
///
/// Paragraphs inherited from the layout are discarded. Every run uses the
/// configured body size and brand font, coloured with the accent on light
/// backgrounds and white on dark ones.
pub fn set_body_with_bullets(
    slide: &mut Slide,
    idx: u32,
    intro: &str,
    bullets: &[String],
    light_background: bool,
    config: &DeckConfig,
) -> TextOutcome {
    let body = match text_body_mut(slide, idx) {
        Ok(body) => body,
        Err(reason) => return TextOutcome::Skipped(reason),
    };

    let color = config.text_color(light_background);
    let props = XmlElement::new("a:rPr")
        .with_attr("sz", font_size(config.body_font_size_pt).to_string())
        .with_attr("dirty", "0")
        .with_child(solid_fill(color))
        .with_child(latin(&config.font_family));

    body.remove_children("a:p");

    let mut intro_paragraph = XmlElement::new("a:p").with_child(paragraph_properties());
    push_runs(&mut intro_paragraph, &props, intro);
    body.push(intro_paragraph);

    body.push(
        XmlElement::new("a:p")
            .with_child(paragraph_properties())
            .with_child(XmlElement::new("a:endParaRPr").with_attr("dirty", "0")),
    );

    for bullet in bullets {
        let bullet_props = paragraph_properties()
            .with_attr("marL", BULLET_INDENT_EMU.to_string())
            .with_attr("indent", (-BULLET_INDENT_EMU).to_string())
            .with_child(
                XmlElement::new("a:buFont")
                    .with_attr("typeface", BULLET_FONT)
                    .with_attr("pitchFamily", "2")
                    .with_attr("charset", "2"),
            )
            .with_child(XmlElement::new("a:buChar").with_attr("char", BULLET_CHAR.to_string()));
        let mut paragraph = XmlElement::new("a:p").with_child(bullet_props);
        push_runs(&mut paragraph, &props, bullet);
        body.push(paragraph);
    }

    TextOutcome::Applied
}

/// The placeholder's `p:txBody`, created when the shape has none.
fn text_body_mut(slide: &mut Slide, idx: u32) -> Result<&mut XmlElement, SkipReason> {
    let shape = slide
        .placeholder_mut(idx)
        .ok_or(SkipReason::SlotMissing { idx })?;
    if shape.name != "p:sp" {
        return Err(SkipReason::NotTextShape {
            idx,
            element: shape.name.clone(),
        });
    }

    if shape.position("p:txBody").is_none() {
        log::debug!("Placeholder {} has no text body; adding one", idx);
        let mut body = empty_text_body();
        body.remove_children("a:p");
        match shape.position("p:extLst") {
            Some(at) => shape.insert(at, body),
            None => shape.push(body),
        }
    }
    Ok(shape.get_or_add_child("p:txBody"))
}

/// `a:pPr` with 1.2 line spacing.
fn paragraph_properties() -> XmlElement {
    XmlElement::new("a:pPr").with_child(
        XmlElement::new("a:lnSpc").with_child(
            XmlElement::new("a:spcPct").with_attr("val", LINE_SPACING_PCT.to_string()),
        ),
    )
}

fn solid_fill(color: RgbColor) -> XmlElement {
    XmlElement::new("a:solidFill")
        .with_child(XmlElement::new("a:srgbClr").with_attr("val", color.to_hex()))
}

fn latin(typeface: &str) -> XmlElement {
    XmlElement::new("a:latin").with_attr("typeface", typeface)
}

/// Font size in hundredths of a point, capped at the DrawingML maximum.
fn font_size(points: u32) -> u32 {
    points.min(MAX_FONT_SIZE_PT) * 100
}

/// Append the runs for one paragraph's text. Line breaks become `a:br`
/// elements carrying the same run properties.
fn push_runs(paragraph: &mut XmlElement, props: &XmlElement, text: &str) {
    for (i, segment) in text.split(|c: char| c == LINE_BREAK || c == '\n').enumerate() {
        if i > 0 {
            paragraph.push(XmlElement::new("a:br").with_child(props.clone()));
        }
        if !segment.is_empty() {
            paragraph.push(
                XmlElement::new("a:r")
                    .with_child(props.clone())
                    .with_child(XmlElement::new("a:t").with_text(escape_control_chars(segment))),
            );
        }
    }
}

/// Control characters XML 1.0 cannot carry, written as `_xHHHH_` instead.
fn escape_control_chars(text: &str) -> Cow<'_, str> {
    let needs_escape = |c: char| c < ' ' && c != '\t';
    if !text.chars().any(needs_escape) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if needs_escape(c) {
            escaped.push_str(&format!("_x{:04X}_", c as u32));
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}
