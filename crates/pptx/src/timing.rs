//! Click-to-reveal animation timelines.
//!
//! Every text-bearing shape on a slide gets a dissolve entrance that waits for
//! its own click. Body and subtitle placeholders holding several paragraphs
//! are revealed one paragraph per click instead of as a whole.
//!
//! The tree is assembled from typed nodes and turned into `p:timing` by a
//! single encoder, so the nesting PowerPoint needs for click sequencing is
//! decided in one place:
//!
//! ```text
//! tmRoot
//! └── mainSeq
//!     └── par (wait for click)          one per entry
//!         └── par (start now)
//!             └── par (entrance effect)
//!                 ├── set style.visibility = visible
//!                 └── animEffect dissolve, 500 ms
//! ```

use deck_core::{Error, Result};
use std::collections::HashSet;

use crate::document::{ShapeInfo, Slide};
use crate::xml::XmlElement;

/// First node id handed out for a slide's timeline.
pub const FIRST_NODE_ID: u32 = 1;

/// Fade-in duration of every entrance.
pub const FADE_DURATION_MS: u32 = 500;

/// PowerPoint's preset number for the dissolve entrance.
const DISSOLVE_PRESET_ID: u32 = 9;

/// Monotonic node id allocator scoped to one timeline.
#[derive(Debug, Clone)]
pub struct IdSequence {
    next: u32,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::starting_at(FIRST_NODE_ID)
    }

    pub fn starting_at(seed: u32) -> Self {
        Self { next: seed }
    }

    /// Hand out the next id.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Ids handed out so far, counting from `FIRST_NODE_ID`.
    pub fn issued(&self) -> u32 {
        self.next.saturating_sub(FIRST_NODE_ID)
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// What an animation acts on: a whole shape or one of its paragraphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeTarget {
    pub shape_id: u32,
    pub paragraph: Option<usize>,
}

impl ShapeTarget {
    pub fn shape(shape_id: u32) -> Self {
        Self {
            shape_id,
            paragraph: None,
        }
    }

    pub fn paragraph(shape_id: u32, index: usize) -> Self {
        Self {
            shape_id,
            paragraph: Some(index),
        }
    }
}

/// When a container starts relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartCondition {
    /// Waits for the next click.
    OnAdvance,
    /// Starts with its parent.
    Immediately,
}

/// A node in the timing tree below the main sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeNode {
    /// Parallel container held open until its children finish.
    Wait {
        id: u32,
        start: StartCondition,
        children: Vec<TimeNode>,
    },
    /// Entrance effect triggered by a click.
    Entrance {
        id: u32,
        preset_id: u32,
        children: Vec<TimeNode>,
    },
    /// Switches the target to visible.
    ShowTarget { id: u32, target: ShapeTarget },
    /// Dissolves the target in.
    Fade {
        id: u32,
        target: ShapeTarget,
        duration_ms: u32,
    },
}

impl TimeNode {
    pub fn id(&self) -> u32 {
        match self {
            TimeNode::Wait { id, .. }
            | TimeNode::Entrance { id, .. }
            | TimeNode::ShowTarget { id, .. }
            | TimeNode::Fade { id, .. } => *id,
        }
    }

    fn children(&self) -> &[TimeNode] {
        match self {
            TimeNode::Wait { children, .. } | TimeNode::Entrance { children, .. } => children,
            TimeNode::ShowTarget { .. } | TimeNode::Fade { .. } => &[],
        }
    }

    /// A click-triggered dissolve of `target`, taking five ids in tree order.
    pub fn click_entrance(ids: &mut IdSequence, target: ShapeTarget) -> Self {
        let outer = ids.next_id();
        let inner = ids.next_id();
        let effect = ids.next_id();
        let show = ids.next_id();
        let fade = ids.next_id();

        TimeNode::Wait {
            id: outer,
            start: StartCondition::OnAdvance,
            children: vec![TimeNode::Wait {
                id: inner,
                start: StartCondition::Immediately,
                children: vec![TimeNode::Entrance {
                    id: effect,
                    preset_id: DISSOLVE_PRESET_ID,
                    children: vec![
                        TimeNode::ShowTarget { id: show, target },
                        TimeNode::Fade {
                            id: fade,
                            target,
                            duration_ms: FADE_DURATION_MS,
                        },
                    ],
                }],
            }],
        }
    }
}

/// Build list entry: how a shape is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Build {
    pub shape_id: u32,
    pub by_paragraph: bool,
}

/// A slide's complete timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub root_id: u32,
    pub sequence_id: u32,
    pub entries: Vec<TimeNode>,
    pub builds: Vec<Build>,
}

impl Timeline {
    /// Plan the timeline for a slide's shapes, or `None` when there is nothing to animate.
    pub fn plan(shapes: &[ShapeInfo]) -> Result<Option<Self>> {
        if shapes.is_empty() {
            return Ok(None);
        }

        let mut ids = IdSequence::new();
        let root_id = ids.next_id();
        let sequence_id = ids.next_id();
        let mut entries = Vec::new();
        let mut builds = Vec::new();

        for shape in shapes {
            let shape_id = shape.id.ok_or_else(|| {
                Error::Animation(format!("shape '{}' has no numeric id", shape.name))
            })?;

            let by_paragraph = reveals_by_paragraph(shape);
            if by_paragraph {
                for index in 0..shape.paragraph_count {
                    entries.push(TimeNode::click_entrance(
                        &mut ids,
                        ShapeTarget::paragraph(shape_id, index),
                    ));
                }
            } else {
                entries.push(TimeNode::click_entrance(&mut ids, ShapeTarget::shape(shape_id)));
            }
            builds.push(Build {
                shape_id,
                by_paragraph,
            });
        }

        let timeline = Self {
            root_id,
            sequence_id,
            entries,
            builds,
        };
        timeline.check_unique_ids()?;
        Ok(Some(timeline))
    }

    /// Every node id in the tree, root first, in document order.
    pub fn node_ids(&self) -> Vec<u32> {
        let mut ids = vec![self.root_id, self.sequence_id];
        for entry in &self.entries {
            collect_ids(entry, &mut ids);
        }
        ids
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for id in self.node_ids() {
            if !seen.insert(id) {
                return Err(Error::Animation(format!("node id {} is used twice", id)));
            }
        }
        Ok(())
    }

    pub fn paragraph_builds(&self) -> usize {
        self.builds.iter().filter(|b| b.by_paragraph).count()
    }

    pub fn whole_builds(&self) -> usize {
        self.builds.iter().filter(|b| !b.by_paragraph).count()
    }

    /// Encode as a `p:timing` element.
    pub fn to_element(&self) -> XmlElement {
        let mut sequence_children = XmlElement::new("p:childTnLst");
        for entry in &self.entries {
            sequence_children.push(encode_node(entry));
        }

        let sequence = XmlElement::new("p:seq")
            .with_attr("concurrent", "1")
            .with_attr("nextAc", "seek")
            .with_child(
                XmlElement::new("p:cTn")
                    .with_attr("id", self.sequence_id.to_string())
                    .with_attr("dur", "indefinite")
                    .with_attr("nodeType", "mainSeq")
                    .with_child(sequence_children),
            )
            .with_child(XmlElement::new("p:prevCondLst").with_child(slide_event("onPrev")))
            .with_child(XmlElement::new("p:nextCondLst").with_child(slide_event("onNext")));

        let root = XmlElement::new("p:par").with_child(
            XmlElement::new("p:cTn")
                .with_attr("id", self.root_id.to_string())
                .with_attr("dur", "indefinite")
                .with_attr("restart", "never")
                .with_attr("nodeType", "tmRoot")
                .with_child(XmlElement::new("p:childTnLst").with_child(sequence)),
        );

        let mut build_list = XmlElement::new("p:bldLst");
        for build in &self.builds {
            let mut entry = XmlElement::new("p:bldP")
                .with_attr("spid", build.shape_id.to_string())
                .with_attr("grpId", "0");
            if build.by_paragraph {
                entry.set_attr("build", "p");
            }
            build_list.push(entry);
        }

        XmlElement::new("p:timing")
            .with_child(XmlElement::new("p:tnLst").with_child(root))
            .with_child(build_list)
    }
}

/// What [`synthesize`] did to a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineOutcome {
    Attached {
        entries: usize,
        paragraph_builds: usize,
        whole_builds: usize,
    },
    /// No text-bearing shapes; the slide was left as it was.
    NoEligibleShapes,
}

/// Replace a slide's timeline with click-to-reveal entrances for its shapes.
///
/// On error the slide is unchanged.
pub fn synthesize(slide: &mut Slide) -> Result<TimelineOutcome> {
    let Some(timeline) = Timeline::plan(&slide.shapes())? else {
        return Ok(TimelineOutcome::NoEligibleShapes);
    };

    let outcome = TimelineOutcome::Attached {
        entries: timeline.entries.len(),
        paragraph_builds: timeline.paragraph_builds(),
        whole_builds: timeline.whole_builds(),
    };
    slide.set_timing(timeline.to_element());

    log::debug!(
        "Attached timeline to {} ({} entries)",
        slide.part_name(),
        timeline.entries.len()
    );
    Ok(outcome)
}

/// Subtitle (idx 1) and body placeholders (idx >= 10) with more than one
/// paragraph reveal a paragraph at a time.
fn reveals_by_paragraph(shape: &ShapeInfo) -> bool {
    let body_slot = matches!(shape.placeholder_idx, Some(idx) if idx == 1 || idx >= 10);
    body_slot && shape.paragraph_count > 1
}

fn collect_ids(node: &TimeNode, out: &mut Vec<u32>) {
    out.push(node.id());
    for child in node.children() {
        collect_ids(child, out);
    }
}

fn encode_node(node: &TimeNode) -> XmlElement {
    match node {
        TimeNode::Wait { id, start, children } => {
            let delay = match start {
                StartCondition::OnAdvance => "indefinite",
                StartCondition::Immediately => "0",
            };
            let c_tn = XmlElement::new("p:cTn")
                .with_attr("id", id.to_string())
                .with_attr("fill", "hold")
                .with_child(start_conditions(delay))
                .with_child(child_list(children));
            XmlElement::new("p:par").with_child(c_tn)
        }
        TimeNode::Entrance {
            id,
            preset_id,
            children,
        } => {
            let c_tn = XmlElement::new("p:cTn")
                .with_attr("id", id.to_string())
                .with_attr("presetID", preset_id.to_string())
                .with_attr("presetClass", "entr")
                .with_attr("presetSubtype", "0")
                .with_attr("fill", "hold")
                .with_attr("grpId", "0")
                .with_attr("nodeType", "clickEffect")
                .with_child(start_conditions("0"))
                .with_child(child_list(children));
            XmlElement::new("p:par").with_child(c_tn)
        }
        TimeNode::ShowTarget { id, target } => {
            let behavior = XmlElement::new("p:cBhvr")
                .with_child(
                    XmlElement::new("p:cTn")
                        .with_attr("id", id.to_string())
                        .with_attr("dur", "1")
                        .with_attr("fill", "hold")
                        .with_child(start_conditions("0")),
                )
                .with_child(target_element(target))
                .with_child(
                    XmlElement::new("p:attrNameLst")
                        .with_child(XmlElement::new("p:attrName").with_text("style.visibility")),
                );
            XmlElement::new("p:set").with_child(behavior).with_child(
                XmlElement::new("p:to")
                    .with_child(XmlElement::new("p:strVal").with_attr("val", "visible")),
            )
        }
        TimeNode::Fade {
            id,
            target,
            duration_ms,
        } => {
            let behavior = XmlElement::new("p:cBhvr")
                .with_child(
                    XmlElement::new("p:cTn")
                        .with_attr("id", id.to_string())
                        .with_attr("dur", duration_ms.to_string()),
                )
                .with_child(target_element(target));
            XmlElement::new("p:animEffect")
                .with_attr("transition", "in")
                .with_attr("filter", "dissolve")
                .with_child(behavior)
        }
    }
}

fn start_conditions(delay: &str) -> XmlElement {
    XmlElement::new("p:stCondLst").with_child(XmlElement::new("p:cond").with_attr("delay", delay))
}

fn child_list(children: &[TimeNode]) -> XmlElement {
    let mut list = XmlElement::new("p:childTnLst");
    for child in children {
        list.push(encode_node(child));
    }
    list
}

fn target_element(target: &ShapeTarget) -> XmlElement {
    let mut shape = XmlElement::new("p:spTgt").with_attr("spid", target.shape_id.to_string());
    if let Some(index) = target.paragraph {
        shape.push(
            XmlElement::new("p:txEl").with_child(
                XmlElement::new("p:pRg")
                    .with_attr("st", index.to_string())
                    .with_attr("end", index.to_string()),
            ),
        );
    }
    XmlElement::new("p:tgtEl").with_child(shape)
}

fn slide_event(event: &str) -> XmlElement {
    XmlElement::new("p:cond")
        .with_attr("evt", event)
        .with_attr("delay", "0")
        .with_child(XmlElement::new("p:tgtEl").with_child(XmlElement::new("p:sldTgt")))
}
