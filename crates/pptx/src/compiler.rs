//! Outline to deck compilation.
//!
//! The deck always opens with title, agenda and about slides, then renders
//! each section (optional header followed by its content and quote slides),
//! and closes with the call-to-action and thank-you slides.

use deck_core::{
    CompileReport, ContentSlide, DeckConfig, Error, LayoutRole, Notice, Outline, QuoteSlide,
    Result, Section, SectionStyle, SlideContent, SlideKind, SlideRecord, TimelineStatus,
};

use std::path::PathBuf;

use crate::document::{Presentation, Slide};
use crate::package::convert_template;
use crate::text::{set_body_with_bullets, set_text, TextOutcome};
use crate::timing::{synthesize, TimelineOutcome};

/// Heading and subtitle slots shared by every layout.
const HEADING_IDX: u32 = 0;
const SUBTITLE_IDX: u32 = 1;

/// Compiles outlines against one configuration.
pub struct DeckCompiler<'a> {
    config: &'a DeckConfig,
    scratch_dir: Option<PathBuf>,
}

impl<'a> DeckCompiler<'a> {
    pub fn new(config: &'a DeckConfig) -> Self {
        Self {
            config,
            scratch_dir: None,
        }
    }

    /// Keep the scratch copy of the template in `dir` instead of the system
    /// temporary directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Build the deck for `outline` and write it to the configured output path.
    ///
    /// The template is converted into a scratch copy which is removed on
    /// every exit path. Nothing is written to the output path unless the
    /// whole deck was built.
    pub fn compile(&self, outline: &Outline) -> Result<CompileReport> {
        let template = &self.config.template_path;
        if !template.exists() {
            return Err(Error::TemplateNotFound(template.clone()));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("deck-").suffix(".pptx");
        let scratch = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        }
        .into_temp_path();
        convert_template(template, &scratch)?;

        let mut prs = Presentation::open(&scratch)?;
        prs.remove_all_slides()?;
        let slides = self.build(outline, &mut prs)?;
        prs.save(&self.config.output_path)?;

        log::debug!("Removing scratch copy {}", scratch.display());
        let scratch_path = scratch.to_path_buf();
        if let Err(e) = scratch.close() {
            // The deck is already saved.
            log::warn!("Failed to remove scratch copy {}: {}", scratch_path.display(), e);
        }

        Ok(CompileReport {
            output_path: self.config.output_path.clone(),
            slides,
        })
    }

    /// Append the outline's slides to `prs`, returning one record per slide.
    pub fn build(&self, outline: &Outline, prs: &mut Presentation) -> Result<Vec<SlideRecord>> {
        let mut deck = DeckBuilder::new(self.config, prs);

        deck.add(SlideKind::Title, LayoutRole::Title, "Title slide", |w| {
            w.text(HEADING_IDX, &outline.title, false);
            w.text(SUBTITLE_IDX, &outline.subtitle, false);
        })?;

        let agenda = outline.agenda_items().join("\n");
        deck.add(SlideKind::Agenda, LayoutRole::Menu, "Agenda slide", |w| {
            w.text(HEADING_IDX, &self.config.agenda_heading, true);
            w.text(SUBTITLE_IDX, &agenda, true);
        })?;

        deck.add(SlideKind::About, LayoutRole::About, "About slide (fixed)", |_| {})?;

        for section in &outline.sections {
            deck.section(section)?;
        }

        deck.add(SlideKind::CallToAction, LayoutRole::Cta, "CTA (fixed)", |_| {})?;

        deck.add(SlideKind::ThankYou, LayoutRole::ThankYou, "Thank You", |w| {
            w.text(HEADING_IDX, &self.config.closing_heading, false);
            w.text(SUBTITLE_IDX, &outline.thank_you_subtitle, false);
        })?;

        Ok(deck.records)
    }
}

/// State of one compilation pass.
struct DeckBuilder<'c, 'p> {
    config: &'c DeckConfig,
    prs: &'p mut Presentation,
    records: Vec<SlideRecord>,
    /// Content slides rendered so far, across all sections.
    content_count: usize,
}

impl<'c, 'p> DeckBuilder<'c, 'p> {
    fn new(config: &'c DeckConfig, prs: &'p mut Presentation) -> Self {
        Self {
            config,
            prs,
            records: Vec::new(),
            content_count: 0,
        }
    }

    fn section(&mut self, section: &Section) -> Result<()> {
        let header = match section.style {
            SectionStyle::Blue => Some((LayoutRole::Section, false)),
            SectionStyle::Pale => Some((LayoutRole::SectionPale, true)),
            SectionStyle::None => None,
        };
        if let Some((role, light)) = header {
            let subtitle = section.header_subtitle()?;
            let label = format!("Section: {}", section.name);
            self.add(SlideKind::SectionHeader, role, &label, |w| {
                w.text(HEADING_IDX, &section.name, light);
                w.text(SUBTITLE_IDX, subtitle, light);
            })?;
        }

        for content in &section.slides {
            match content {
                SlideContent::Content(slide) => self.content(slide)?,
                SlideContent::Quote(slide) => self.quote(slide)?,
            }
        }
        Ok(())
    }

    fn content(&mut self, slide: &ContentSlide) -> Result<()> {
        let role = slide.layout.unwrap_or(if self.content_count % 2 == 0 {
            LayoutRole::ContentWhite
        } else {
            LayoutRole::ContentPale
        });
        self.content_count += 1;

        let body_idx = self.config.body_placeholder_idx;
        self.add(SlideKind::Content, role, &slide.title, |w| {
            w.text(HEADING_IDX, &slide.title, true);
            w.text(SUBTITLE_IDX, &slide.subtitle, true);
            w.body(body_idx, &slide.intro, &slide.bullets);
        })
    }

    fn quote(&mut self, slide: &QuoteSlide) -> Result<()> {
        self.add(SlideKind::Quote, LayoutRole::Quote, "Quote", |w| {
            w.text(HEADING_IDX, &slide.quote, true);
            w.text(SUBTITLE_IDX, &slide.attribution, true);
        })
    }

    /// Append one slide. Fixed slides are left exactly as the template has them,
    /// whatever layout they use.
    fn add<F>(&mut self, kind: SlideKind, role: LayoutRole, label: &str, fill: F) -> Result<()>
    where
        F: FnOnce(&mut SlideWriter<'_>),
    {
        let ordinal = self.records.len() + 1;
        let slide = self.prs.add_slide(self.config.layouts.index(role))?;

        let (timeline, notices) = if kind.is_fixed() {
            (TimelineStatus::Untouched, Vec::new())
        } else {
            let mut writer = SlideWriter::new(slide, self.config);
            fill(&mut writer);
            let timeline = writer.animate();
            (timeline, writer.notices)
        };

        log::info!("{}. {}", ordinal, label);
        self.records.push(SlideRecord {
            ordinal,
            kind,
            layout: role,
            label: label.to_string(),
            timeline,
            notices,
        });
        Ok(())
    }
}

/// Writes text into one slide, collecting what could not be applied.
struct SlideWriter<'s> {
    slide: &'s mut Slide,
    config: &'s DeckConfig,
    notices: Vec<Notice>,
}

impl<'s> SlideWriter<'s> {
    fn new(slide: &'s mut Slide, config: &'s DeckConfig) -> Self {
        Self {
            slide,
            config,
            notices: Vec::new(),
        }
    }

    fn text(&mut self, idx: u32, text: &str, light_background: bool) {
        let outcome = set_text(self.slide, idx, text, light_background, None, self.config);
        self.record(outcome);
    }

    fn body(&mut self, idx: u32, intro: &str, bullets: &[String]) {
        let outcome = set_body_with_bullets(self.slide, idx, intro, bullets, true, self.config);
        self.record(outcome);
    }

    fn record(&mut self, outcome: TextOutcome) {
        if let TextOutcome::Skipped(reason) = outcome {
            log::warn!("{}: text skipped, {}", self.slide.part_name(), reason);
            self.notices.push(Notice::TextSkipped(reason));
        }
    }

    /// Synthesize the timeline; failures leave the slide as it was.
    fn animate(&mut self) -> TimelineStatus {
        match synthesize(self.slide) {
            Ok(TimelineOutcome::Attached {
                entries,
                paragraph_builds,
                whole_builds,
            }) => TimelineStatus::Attached {
                entries,
                paragraph_builds,
                whole_builds,
            },
            Ok(TimelineOutcome::NoEligibleShapes) => TimelineStatus::NoEligibleShapes,
            Err(e) => {
                log::warn!("{}: {}", self.slide.part_name(), e);
                self.notices.push(Notice::AnimationFailed(e.to_string()));
                TimelineStatus::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{template_package, write_template, TemplateSpec};

    fn presentation() -> Presentation {
        Presentation::from_package(template_package(&TemplateSpec::default())).unwrap()
    }

    fn content(title: &str, bullets: &[&str], layout: Option<LayoutRole>) -> SlideContent {
        SlideContent::Content(ContentSlide {
            title: title.to_string(),
            subtitle: format!("{} subtitle", title),
            intro: format!("{} intro", title),
            bullets: bullets.iter().map(|b| b.to_string()).collect(),
            layout,
        })
    }

    fn section(name: &str, style: SectionStyle, slides: Vec<SlideContent>) -> Section {
        Section {
            name: name.to_string(),
            subtitle: Some(format!("{} subtitle", name)),
            style,
            slides,
        }
    }

    fn outline(sections: Vec<Section>) -> Outline {
        Outline {
            title: "DECK".to_string(),
            subtitle: "Deck subtitle".to_string(),
            thank_you_subtitle: "hello@example.com".to_string(),
            sections,
        }
    }

    fn build(outline: &Outline) -> (Presentation, Vec<SlideRecord>) {
        let config = DeckConfig::new();
        let mut prs = presentation();
        let records = DeckCompiler::new(&config).build(outline, &mut prs).unwrap();
        (prs, records)
    }

    #[test]
    fn test_example_outline_slide_order() {
        let outline = Outline::example();
        let (prs, records) = build(&outline);

        assert_eq!(prs.slide_count(), outline.expected_slide_count());
        assert_eq!(records.len(), prs.slide_count());

        let kinds: Vec<_> = records.iter().map(|r| r.kind).collect();
        use SlideKind::*;
        assert_eq!(
            kinds,
            vec![
                Title, Agenda, About, SectionHeader, Content, SectionHeader, Content, Content,
                SectionHeader, Content, SectionHeader, CallToAction, ThankYou,
            ]
        );
        let ordinals: Vec<_> = records.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, (1..=13).collect::<Vec<_>>());
        assert_eq!(records[9].label, "CURRENT CONSTRAINTS");
        assert_eq!(records[8].layout, LayoutRole::SectionPale);
        assert!(records.iter().all(|r| r.notices.is_empty()));
    }

    #[test]
    fn test_slides_use_registry_layouts() {
        let (prs, records) = build(&Outline::example());
        let config = DeckConfig::new();

        for (slide, record) in prs.slides().iter().zip(&records) {
            let expected = prs.layout_part(config.layouts.index(record.layout)).map(str::to_string);
            assert_eq!(slide.layout_part(), expected);
        }
    }

    #[test]
    fn test_content_layouts_alternate_across_sections() {
        let outline = outline(vec![
            section("A", SectionStyle::Blue, vec![content("one", &["x"], None), content("two", &[], None)]),
            section(
                "B",
                SectionStyle::None,
                vec![
                    content("three", &[], Some(LayoutRole::Quote)),
                    SlideContent::Quote(QuoteSlide {
                        quote: "q".to_string(),
                        attribution: String::new(),
                    }),
                    content("four", &[], None),
                    content("five", &[], None),
                ],
            ),
        ]);
        let (_, records) = build(&outline);

        let layouts: Vec<_> = records
            .iter()
            .filter(|r| r.kind == SlideKind::Content)
            .map(|r| r.layout)
            .collect();
        // The override consumes a position in the alternation; quotes do not.
        assert_eq!(
            layouts,
            vec![
                LayoutRole::ContentWhite,
                LayoutRole::ContentPale,
                LayoutRole::Quote,
                LayoutRole::ContentPale,
                LayoutRole::ContentWhite,
            ]
        );
    }

    #[test]
    fn test_two_section_round_trip() {
        let outline = outline(vec![
            section("GROWTH", SectionStyle::Blue, vec![content("PLAN", &["a", "b", "c"], None)]),
            Section {
                name: "APPENDIX".to_string(),
                subtitle: None,
                style: SectionStyle::None,
                slides: Vec::new(),
            },
        ]);
        let (prs, records) = build(&outline);

        assert_eq!(prs.slide_count(), 3 + 1 + 1 + 2);
        let report = CompileReport {
            output_path: Default::default(),
            slides: records,
        };
        assert_eq!(report.slides_of(SlideKind::SectionHeader).count(), 1);
        let contents: Vec<_> = report.slides_of(SlideKind::Content).collect();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].ordinal, 5);
        assert_eq!(contents[0].layout, LayoutRole::ContentWhite);

        let agenda = prs.slide(1).unwrap();
        assert_eq!(agenda.placeholder_text(0).as_deref(), Some("AGENDA"));
        assert_eq!(agenda.placeholder_text(1).as_deref(), Some("GROWTH"));

        let body = prs.slide(4).unwrap().placeholder_text(13).unwrap();
        assert_eq!(body, "PLAN intro\n\na\nb\nc");
        assert_eq!(
            contents[0].timeline,
            TimelineStatus::Attached {
                entries: 2 + 5,
                paragraph_builds: 1,
                whole_builds: 2,
            }
        );
    }

    #[test]
    fn test_fixed_slides_are_untouched() {
        let (prs, records) = build(&Outline::example());

        for kind in [SlideKind::About, SlideKind::CallToAction] {
            let record = records.iter().find(|r| r.kind == kind).unwrap();
            assert_eq!(record.timeline, TimelineStatus::Untouched);

            let slide = prs.slide(record.ordinal - 1).unwrap();
            assert!(slide.timing().is_none());
            for idx in slide.placeholder_indices() {
                assert_eq!(slide.placeholder_text(idx).as_deref(), Some(""));
            }
        }
    }

    #[test]
    fn test_content_override_to_fixed_layout_is_filled() {
        let outline = outline(vec![section(
            "S",
            SectionStyle::None,
            vec![
                content("ON ABOUT", &["a", "b"], Some(LayoutRole::About)),
                content("ON CTA", &[], Some(LayoutRole::Cta)),
            ],
        )]);
        let (prs, records) = build(&outline);

        for (record, title) in records[3..5].iter().zip(["ON ABOUT", "ON CTA"]) {
            assert_eq!(record.kind, SlideKind::Content);
            assert!(matches!(record.timeline, TimelineStatus::Attached { .. }));

            let slide = prs.slide(record.ordinal - 1).unwrap();
            assert_eq!(slide.placeholder_text(0).as_deref(), Some(title));
            assert!(slide.placeholder_text(13).unwrap().starts_with(&format!("{} intro", title)));
            assert!(slide.timing().is_some());
        }
        assert_eq!(records[2].timeline, TimelineStatus::Untouched);
        assert_eq!(records[5].timeline, TimelineStatus::Untouched);
    }

    #[test]
    fn test_closing_and_quote_text() {
        let outline = outline(vec![section(
            "ONLY",
            SectionStyle::Pale,
            vec![SlideContent::Quote(QuoteSlide {
                quote: "Simplicity is prerequisite for reliability.".to_string(),
                attribution: String::new(),
            })],
        )]);
        let (prs, records) = build(&outline);

        let quote = prs.slide(4).unwrap();
        assert_eq!(records[4].kind, SlideKind::Quote);
        assert_eq!(
            quote.placeholder_text(0).as_deref(),
            Some("Simplicity is prerequisite for reliability.")
        );
        assert_eq!(quote.placeholder_text(1).as_deref(), Some(""));

        let closing = prs.slide(prs.slide_count() - 1).unwrap();
        assert_eq!(closing.placeholder_text(0).as_deref(), Some("THANK YOU"));
        assert_eq!(closing.placeholder_text(1).as_deref(), Some("hello@example.com"));
    }

    #[test]
    fn test_missing_section_subtitle_is_fatal() {
        let mut broken = section("BROKEN", SectionStyle::Blue, Vec::new());
        broken.subtitle = None;
        let config = DeckConfig::new();
        let mut prs = presentation();

        let err = DeckCompiler::new(&config)
            .build(&outline(vec![broken]), &mut prs)
            .unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "subtitle", .. }));
    }

    #[test]
    fn test_missing_body_slot_is_reported() {
        let config = DeckConfig {
            body_placeholder_idx: 77,
            ..DeckConfig::new()
        };
        let mut prs = presentation();
        let records = DeckCompiler::new(&config)
            .build(&outline(vec![section("S", SectionStyle::Blue, vec![content("C", &["x"], None)])]), &mut prs)
            .unwrap();

        let content = records.iter().find(|r| r.kind == SlideKind::Content).unwrap();
        assert_eq!(
            content.notices,
            vec![Notice::TextSkipped(deck_core::SkipReason::SlotMissing { idx: 77 })]
        );
        assert!(matches!(content.timeline, TimelineStatus::Attached { .. }));
    }

    #[test]
    fn test_animation_failure_becomes_notice() {
        let config = DeckConfig::new();
        let mut prs = presentation();
        let slide = prs.add_slide(0).unwrap();
        slide
            .placeholder_mut(0)
            .and_then(|sp| sp.find_mut(&["p:nvSpPr", "p:cNvPr"]))
            .unwrap()
            .set_attr("id", "title");

        let mut writer = SlideWriter::new(slide, &config);
        assert_eq!(writer.animate(), TimelineStatus::Failed);
        assert!(matches!(writer.notices[0], Notice::AnimationFailed(_)));
        assert!(slide_has_no_timing(&prs));
    }

    fn slide_has_no_timing(prs: &Presentation) -> bool {
        prs.slides().iter().all(|s| s.timing().is_none())
    }

    #[test]
    fn test_compile_writes_deck_from_template() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(
            dir.path(),
            &TemplateSpec {
                template_typed: true,
                existing_slides: 2,
            },
        );
        let output = dir.path().join("deck.pptx");
        let config = DeckConfig::new()
            .with_template_path(&template)
            .with_output_path(&output);

        let outline = Outline::example();
        let report = DeckCompiler::new(&config).compile(&outline).unwrap();

        assert_eq!(report.output_path, output);
        assert_eq!(report.total_slides(), outline.expected_slide_count());
        let reopened = Presentation::open(&output).unwrap();
        assert_eq!(reopened.slide_count(), report.total_slides());
        assert_eq!(reopened.slide(0).unwrap().placeholder_text(0).as_deref(), Some("PRESENTATION TITLE"));
        // Template left as it was.
        assert!(matches!(Presentation::open(&template), Err(Error::PackageError(_))));
    }

    #[test]
    fn test_compile_without_template() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("deck.pptx");
        let config = DeckConfig::new()
            .with_template_path(dir.path().join("missing.potx"))
            .with_output_path(&output);

        let err = DeckCompiler::new(&config).compile(&Outline::example()).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_scratch_copy_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), &TemplateSpec::default());
        let config = DeckConfig::new()
            .with_template_path(&template)
            .with_output_path(dir.path().join("deck.pptx"));
        let compiler = DeckCompiler::new(&config).with_scratch_dir(scratch.path());

        compiler.compile(&Outline::example()).unwrap();
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);

        let mut broken = section("BROKEN", SectionStyle::Blue, Vec::new());
        broken.subtitle = None;
        let err = compiler.compile(&outline(vec![broken])).unwrap_err();
        assert!(matches!(err, Error::MissingField { .. }));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_compile_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path(), &TemplateSpec::default());
        let output = dir.path().join("deck.pptx");
        let config = DeckConfig::new()
            .with_template_path(&template)
            .with_output_path(&output);

        let mut broken = section("BROKEN", SectionStyle::Pale, Vec::new());
        broken.subtitle = None;
        assert!(DeckCompiler::new(&config).compile(&outline(vec![broken])).is_err());
        assert!(!output.exists());
    }
}
