//! Editable presentation document.
//!
//! Opens a `.pptx` package, resolves its slide layouts and slides, lets the
//! compiler strip existing slides and append new ones from a layout, and
//! writes the package back.

use deck_core::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::opc::{
    content_type, rel_type, rels_part_name, resolve_target, ContentTypes, OpcPackage,
    Relationships, CONTENT_TYPES_PART,
};
use crate::xml::XmlElement;

/// Numbered slide part names.
static SLIDE_PART_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|/)slides/slide(\d+)\.xml$").unwrap());

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

/// Slide ids below this are reserved.
const MIN_SLIDE_ID: u32 = 256;

/// Layout placeholders that are not carried onto new slides.
const NON_CLONED_PLACEHOLDERS: &[&str] = &["dt", "ftr", "sldNum"];

/// Placeholder types that get a text body on a new slide.
const TEXT_PLACEHOLDERS: &[&str] = &["title", "ctrTitle", "subTitle", "body", "obj"];

/// A presentation opened for editing.
#[derive(Debug, Clone)]
pub struct Presentation {
    package: OpcPackage,
    content_types: ContentTypes,
    main_part: String,
    main: XmlElement,
    main_rels: Relationships,
    layouts: Vec<String>,
    slides: Vec<Slide>,
}

impl Presentation {
    /// Open a presentation package from disk.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_package(OpcPackage::open(path)?)
    }

    /// Build a presentation over an already loaded package.
    pub fn from_package(package: OpcPackage) -> Result<Self> {
        let content_types = ContentTypes::from_element(package.xml_part(CONTENT_TYPES_PART)?);

        let root_rels = package.rels("")?;
        let main_rel = root_rels
            .of_type(rel_type::OFFICE_DOCUMENT)
            .next()
            .ok_or_else(|| Error::PackageError("No main document relationship".to_string()))?;
        let main_part = resolve_target("", &main_rel.target);

        if content_types.get(&main_part) == Some(content_type::TEMPLATE_MAIN) {
            return Err(Error::PackageError(format!(
                "'{}' is declared as a template; convert the package first",
                main_part
            )));
        }

        let main = package.xml_part(&main_part)?;
        let main_rels = package.rels(&main_part)?;
        let layouts = resolve_layouts(&package, &main, &main_rels)?;

        let mut slides = Vec::new();
        if let Some(list) = main.child("p:sldIdLst") {
            for entry in list.children_named("p:sldId") {
                let id = parse_slide_id(entry)?;
                let rel_id = entry
                    .attr("r:id")
                    .ok_or_else(|| Error::PackageError(format!("Slide {} has no r:id", id)))?;
                let part = main_rels.target_part(rel_id)?;
                slides.push(Slide::load(&package, &part, id, rel_id)?);
            }
        }

        log::debug!(
            "Opened {} with {} layouts and {} slides",
            main_part,
            layouts.len(),
            slides.len()
        );

        Ok(Self {
            package,
            content_types,
            main_part,
            main,
            main_rels,
            layouts,
            slides,
        })
    }

    /// Number of layouts under the first slide master.
    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    /// Part name of a layout by index.
    pub fn layout_part(&self, index: usize) -> Option<&str> {
        self.layouts.get(index).map(String::as_str)
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn slide_mut(&mut self, index: usize) -> Option<&mut Slide> {
        self.slides.get_mut(index)
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Slide identifiers in presentation order.
    pub fn slide_ids(&self) -> Vec<u32> {
        self.slides.iter().map(|s| s.id).collect()
    }

    /// Remove a slide by identifier, along with its part and relationships.
    pub fn remove_slide(&mut self, id: u32) -> Result<()> {
        let index = self
            .slides
            .iter()
            .position(|s| s.id == id)
            .ok_or(Error::SlideNotFound(id))?;
        let slide = self.slides.remove(index);

        let id_text = id.to_string();
        if let Some(list) = self.main.child_mut("p:sldIdLst") {
            list.retain_elements(|e| e.attr("id") != Some(id_text.as_str()));
        }
        remove_section_refs(&mut self.main, &id_text);

        self.main_rels.remove(&slide.rel_id);
        self.package.remove_part(&slide.part_name);
        self.package.remove_part(&rels_part_name(&slide.part_name));
        self.content_types.remove_override(&slide.part_name);

        log::debug!("Removed slide {} ({})", id, slide.part_name);
        Ok(())
    }

    /// Remove every slide, leaving layouts and masters intact.
    pub fn remove_all_slides(&mut self) -> Result<()> {
        for id in self.slide_ids() {
            self.remove_slide(id)?;
        }
        Ok(())
    }

    /// Append a slide built from the layout at `layout_index`.
    pub fn add_slide(&mut self, layout_index: usize) -> Result<&mut Slide> {
        let layout_part = self
            .layouts
            .get(layout_index)
            .cloned()
            .ok_or(Error::LayoutNotFound {
                index: layout_index,
                available: self.layouts.len(),
            })?;
        let layout = self.package.xml_part(&layout_part)?;

        let part_name = self.next_slide_part_name();
        let mut rels = Relationships::new(&part_name);
        rels.add(rel_type::SLIDE_LAYOUT, &layout_part);

        let rel_id = self.main_rels.add(rel_type::SLIDE, &part_name);
        let id = self.next_slide_id();
        self.slide_id_list_mut().push(
            XmlElement::new("p:sldId")
                .with_attr("id", id.to_string())
                .with_attr("r:id", rel_id.as_str()),
        );
        self.content_types.add_override(&part_name, content_type::SLIDE);

        log::debug!("Added {} from {}", part_name, layout_part);

        let index = self.slides.len();
        self.slides.push(Slide {
            id,
            rel_id,
            part_name,
            xml: new_slide_from_layout(&layout),
            rels,
        });
        Ok(&mut self.slides[index])
    }

    /// Package with every edit applied and unreachable parts dropped.
    pub fn to_package(&self) -> Result<OpcPackage> {
        let mut package = self.package.clone();

        for slide in &self.slides {
            package.set_part(&slide.part_name, slide.xml.to_xml_bytes()?);
            package.set_rels(&slide.rels)?;
        }
        package.set_part(&self.main_part, self.main.to_xml_bytes()?);
        package.set_rels(&self.main_rels)?;

        package.prune_unreachable()?;

        let mut content_types = self.content_types.clone();
        content_types.retain_overrides(|part| package.contains(part));
        package.set_part(CONTENT_TYPES_PART, content_types.to_element().to_xml_bytes()?);

        Ok(package)
    }

    /// Serialize the presentation to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_package()?.save(path)
    }

    fn next_slide_part_name(&self) -> String {
        let max = self
            .package
            .part_names()
            .chain(self.slides.iter().map(|s| s.part_name.as_str()))
            .filter_map(|name| SLIDE_PART_REGEX.captures(name))
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        let dir = self.main_part.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        if dir.is_empty() {
            format!("slides/slide{}.xml", max + 1)
        } else {
            format!("{}/slides/slide{}.xml", dir, max + 1)
        }
    }

    fn next_slide_id(&self) -> u32 {
        let max = self
            .main
            .child("p:sldIdLst")
            .into_iter()
            .flat_map(|list| list.children_named("p:sldId"))
            .filter_map(|e| e.attr("id").and_then(|v| v.parse::<u32>().ok()))
            .max()
            .unwrap_or(0);
        max.max(MIN_SLIDE_ID - 1) + 1
    }

    /// `p:sldIdLst`, created after the master id lists if missing.
    fn slide_id_list_mut(&mut self) -> &mut XmlElement {
        if self.main.position("p:sldIdLst").is_none() {
            let at = ["p:handoutMasterIdLst", "p:notesMasterIdLst", "p:sldMasterIdLst"]
                .iter()
                .find_map(|name| self.main.position(name))
                .map(|i| i + 1)
                .unwrap_or(0);
            self.main.insert(at, XmlElement::new("p:sldIdLst"));
        }
        self.main.get_or_add_child("p:sldIdLst")
    }
}

/// Summary of a top-level shape that can carry text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeInfo {
    /// `cNvPr/@id`; `None` when absent or not a number.
    pub id: Option<u32>,
    pub name: String,
    /// Placeholder index, when the shape is a placeholder.
    pub placeholder_idx: Option<u32>,
    /// Paragraphs in the text body; a shape without one reads as one empty paragraph.
    pub paragraph_count: usize,
}

/// One slide part.
#[derive(Debug, Clone)]
pub struct Slide {
    id: u32,
    rel_id: String,
    part_name: String,
    xml: XmlElement,
    rels: Relationships,
}

impl Slide {
    fn load(package: &OpcPackage, part_name: &str, id: u32, rel_id: &str) -> Result<Self> {
        Ok(Self {
            id,
            rel_id: rel_id.to_string(),
            part_name: part_name.to_string(),
            xml: package.xml_part(part_name)?,
            rels: package.rels(part_name)?,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// Part name of the layout this slide is based on.
    pub fn layout_part(&self) -> Option<String> {
        let rel = self.rels.of_type(rel_type::SLIDE_LAYOUT).next()?;
        Some(resolve_target(&self.part_name, &rel.target))
    }

    /// Root `p:sld` element.
    pub fn xml(&self) -> &XmlElement {
        &self.xml
    }

    fn sp_tree(&self) -> Option<&XmlElement> {
        self.xml.find(&["p:cSld", "p:spTree"])
    }

    fn sp_tree_mut(&mut self) -> Option<&mut XmlElement> {
        self.xml.find_mut(&["p:cSld", "p:spTree"])
    }

    /// Placeholder shape with the given index.
    pub fn placeholder(&self, idx: u32) -> Option<&XmlElement> {
        self.sp_tree()?
            .elements()
            .find(|e| placeholder_idx(e) == Some(idx))
    }

    pub fn placeholder_mut(&mut self, idx: u32) -> Option<&mut XmlElement> {
        self.sp_tree_mut()?
            .elements_mut()
            .find(|e| placeholder_idx(e) == Some(idx))
    }

    /// Placeholder indices present on the slide, in shape order.
    pub fn placeholder_indices(&self) -> Vec<u32> {
        self.sp_tree()
            .map(|tree| tree.elements().filter_map(placeholder_idx).collect())
            .unwrap_or_default()
    }

    /// Text of a placeholder, one line per paragraph.
    pub fn placeholder_text(&self, idx: u32) -> Option<String> {
        let body = self.placeholder(idx)?.child("p:txBody")?;
        Some(
            body.children_named("a:p")
                .map(|p| p.text())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Top-level `p:sp` shapes, in z-order.
    pub fn shapes(&self) -> Vec<ShapeInfo> {
        let Some(tree) = self.sp_tree() else {
            return Vec::new();
        };
        tree.children_named("p:sp")
            .map(|sp| {
                let c_nv_pr = sp.find(&["p:nvSpPr", "p:cNvPr"]);
                ShapeInfo {
                    id: c_nv_pr
                        .and_then(|e| e.attr("id"))
                        .and_then(|v| v.parse().ok()),
                    name: c_nv_pr
                        .and_then(|e| e.attr("name"))
                        .unwrap_or_default()
                        .to_string(),
                    placeholder_idx: placeholder_idx(sp),
                    paragraph_count: sp
                        .child("p:txBody")
                        .map(|body| body.children_named("a:p").count())
                        .unwrap_or(1),
                }
            })
            .collect()
    }

    pub fn timing(&self) -> Option<&XmlElement> {
        self.xml.child("p:timing")
    }

    /// Replace the slide's timing, keeping it ahead of `p:extLst`.
    pub fn set_timing(&mut self, timing: XmlElement) {
        self.xml.remove_children("p:timing");
        match self.xml.position("p:extLst") {
            Some(at) => self.xml.insert(at, timing),
            None => self.xml.push(timing),
        }
    }
}

/// Placeholder index of a shape (`p:ph` without `idx` is index 0).
pub fn placeholder_idx(shape: &XmlElement) -> Option<u32> {
    let ph = placeholder_ph(shape)?;
    Some(ph.attr("idx").and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn placeholder_ph(shape: &XmlElement) -> Option<&XmlElement> {
    shape
        .elements()
        .find(|e| e.name.starts_with("p:nv"))?
        .find(&["p:nvPr", "p:ph"])
}

fn parse_slide_id(entry: &XmlElement) -> Result<u32> {
    entry
        .attr("id")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::PackageError("Slide entry without a numeric id".to_string()))
}

/// Layout part names of the first slide master, in `sldLayoutIdLst` order.
fn resolve_layouts(
    package: &OpcPackage,
    main: &XmlElement,
    main_rels: &Relationships,
) -> Result<Vec<String>> {
    let master_rel = main
        .find(&["p:sldMasterIdLst", "p:sldMasterId"])
        .and_then(|e| e.attr("r:id"))
        .ok_or_else(|| Error::PackageError("Presentation has no slide master".to_string()))?;
    let master_part = main_rels.target_part(master_rel)?;
    let master = package.xml_part(&master_part)?;
    let master_rels = package.rels(&master_part)?;

    let Some(list) = master.child("p:sldLayoutIdLst") else {
        return Ok(Vec::new());
    };
    list.children_named("p:sldLayoutId")
        .map(|e| {
            let rel_id = e.attr("r:id").ok_or_else(|| {
                Error::PackageError(format!("Layout entry in '{}' has no r:id", master_part))
            })?;
            master_rels.target_part(rel_id)
        })
        .collect()
}

fn remove_section_refs(element: &mut XmlElement, id: &str) {
    for child in element.elements_mut() {
        if child.local_name() == "section" {
            for list in child.elements_mut().filter(|e| e.local_name() == "sldIdLst") {
                list.retain_elements(|e| e.attr("id") != Some(id));
            }
        } else {
            remove_section_refs(child, id);
        }
    }
}

/// A new `p:sld` carrying empty copies of the layout's placeholders.
fn new_slide_from_layout(layout: &XmlElement) -> XmlElement {
    let mut tree = XmlElement::new("p:spTree")
        .with_child(
            XmlElement::new("p:nvGrpSpPr")
                .with_child(XmlElement::new("p:cNvPr").with_attr("id", "1").with_attr("name", ""))
                .with_child(XmlElement::new("p:cNvGrpSpPr"))
                .with_child(XmlElement::new("p:nvPr")),
        )
        .with_child(XmlElement::new("p:grpSpPr"));

    let mut next_id = 2;
    if let Some(layout_tree) = layout.find(&["p:cSld", "p:spTree"]) {
        for ph in layout_tree.elements().filter_map(placeholder_ph) {
            let ph_type = ph.attr("type").unwrap_or("obj");
            if NON_CLONED_PLACEHOLDERS.contains(&ph_type) {
                continue;
            }
            tree.push(placeholder_shape(next_id, ph, ph_type));
            next_id += 1;
        }
    }

    XmlElement::new("p:sld")
        .with_attr("xmlns:a", NS_A)
        .with_attr("xmlns:r", NS_R)
        .with_attr("xmlns:p", NS_P)
        .with_child(XmlElement::new("p:cSld").with_child(tree))
        .with_child(XmlElement::new("p:clrMapOvr").with_child(XmlElement::new("a:masterClrMapping")))
}

fn placeholder_shape(id: u32, layout_ph: &XmlElement, ph_type: &str) -> XmlElement {
    let base = match ph_type {
        "title" | "ctrTitle" => "Title",
        "subTitle" => "Subtitle",
        "body" => "Text Placeholder",
        "obj" => "Content Placeholder",
        "pic" => "Picture Placeholder",
        "chart" => "Chart Placeholder",
        "tbl" => "Table Placeholder",
        _ => "Placeholder",
    };

    let mut ph = XmlElement::new("p:ph");
    for key in ["type", "orient", "sz", "idx"] {
        if let Some(value) = layout_ph.attr(key) {
            ph.set_attr(key, value);
        }
    }

    let mut sp = XmlElement::new("p:sp")
        .with_child(
            XmlElement::new("p:nvSpPr")
                .with_child(
                    XmlElement::new("p:cNvPr")
                        .with_attr("id", id.to_string())
                        .with_attr("name", format!("{} {}", base, id - 1)),
                )
                .with_child(
                    XmlElement::new("p:cNvSpPr")
                        .with_child(XmlElement::new("a:spLocks").with_attr("noGrp", "1")),
                )
                .with_child(XmlElement::new("p:nvPr").with_child(ph)),
        )
        .with_child(XmlElement::new("p:spPr"));

    if TEXT_PLACEHOLDERS.contains(&ph_type) {
        sp.push(empty_text_body());
    }
    sp
}

/// `p:txBody` with a single empty paragraph.
pub fn empty_text_body() -> XmlElement {
    XmlElement::new("p:txBody")
        .with_child(XmlElement::new("a:bodyPr"))
        .with_child(XmlElement::new("a:lstStyle"))
        .with_child(XmlElement::new("a:p"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{template_package, TemplateSpec};

    fn open(spec: TemplateSpec) -> Presentation {
        Presentation::from_package(template_package(&spec)).unwrap()
    }

    #[test]
    fn test_layouts_follow_master_order() {
        let prs = open(TemplateSpec::default());
        assert_eq!(prs.layout_count(), 10);
        assert_eq!(prs.layout_part(0), Some("ppt/slideLayouts/slideLayout1.xml"));
        assert_eq!(prs.layout_part(9), Some("ppt/slideLayouts/slideLayout10.xml"));
        assert_eq!(prs.layout_part(10), None);
    }

    #[test]
    fn test_template_typed_package_is_refused() {
        let spec = TemplateSpec {
            template_typed: true,
            ..TemplateSpec::default()
        };
        let err = Presentation::from_package(template_package(&spec)).unwrap_err();
        assert!(matches!(err, Error::PackageError(ref m) if m.contains("template")));
    }

    #[test]
    fn test_existing_slides_are_enumerated_and_removed() {
        let mut prs = open(TemplateSpec {
            existing_slides: 2,
            ..TemplateSpec::default()
        });
        assert_eq!(prs.slide_ids(), vec![256, 257]);

        prs.remove_slide(256).unwrap();
        assert_eq!(prs.slide_ids(), vec![257]);
        assert!(matches!(prs.remove_slide(256), Err(Error::SlideNotFound(256))));

        prs.remove_all_slides().unwrap();
        assert_eq!(prs.slide_count(), 0);

        let package = prs.to_package().unwrap();
        let names: Vec<_> = package.part_names().collect();
        assert!(!names.iter().any(|n| n.contains("slides/slide")));
        assert!(!names.iter().any(|n| n.contains("notesSlide")));
        assert!(package.contains("ppt/media/image1.png"));

        let main = package.xml_part("ppt/presentation.xml").unwrap();
        assert_eq!(main.child("p:sldIdLst").map(|l| l.elements().count()), Some(0));
        let section_ids = main
            .descendants()
            .into_iter()
            .filter(|e| e.local_name() == "sldId")
            .count();
        assert_eq!(section_ids, 0);

        let types = package.xml_part(CONTENT_TYPES_PART).unwrap();
        assert!(!types
            .children_named("Override")
            .any(|e| e.attr("PartName").is_some_and(|p| p.contains("/slides/"))));
    }

    #[test]
    fn test_add_slide_clones_layout_placeholders() {
        let mut prs = open(TemplateSpec::default());
        let slide = prs.add_slide(5).unwrap();

        assert_eq!(slide.part_name(), "ppt/slides/slide1.xml");
        assert_eq!(slide.id(), 256);
        assert_eq!(slide.layout_part().as_deref(), Some("ppt/slideLayouts/slideLayout6.xml"));
        // Date placeholder is not carried over.
        assert_eq!(slide.placeholder_indices(), vec![0, 1, 13]);

        let shapes = slide.shapes();
        let ids: Vec<_> = shapes.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![Some(2), Some(3), Some(4)]);
        assert!(shapes.iter().all(|s| s.paragraph_count == 1));
        assert_eq!(shapes[0].name, "Title 1");
        assert_eq!(slide.placeholder_text(13).as_deref(), Some(""));
    }

    #[test]
    fn test_added_slides_are_numbered_after_removal() {
        let mut prs = open(TemplateSpec {
            existing_slides: 3,
            ..TemplateSpec::default()
        });
        prs.remove_all_slides().unwrap();

        let first = prs.add_slide(0).unwrap().part_name().to_string();
        let second = prs.add_slide(1).unwrap();
        assert_eq!(first, "ppt/slides/slide1.xml");
        assert_eq!(second.part_name(), "ppt/slides/slide2.xml");
        assert_eq!(second.id(), 257);
    }

    #[test]
    fn test_layout_out_of_range() {
        let mut prs = open(TemplateSpec::default());
        let err = prs.add_slide(42).unwrap_err();
        assert!(matches!(err, Error::LayoutNotFound { index: 42, available: 10 }));
    }

    #[test]
    fn test_saved_package_reopens_with_slides() {
        let mut prs = open(TemplateSpec::default());
        prs.add_slide(0).unwrap();
        prs.add_slide(9).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pptx");
        prs.save(&path).unwrap();

        let reopened = Presentation::open(&path).unwrap();
        assert_eq!(reopened.slide_count(), 2);
        assert_eq!(
            reopened.slide(1).unwrap().layout_part().as_deref(),
            Some("ppt/slideLayouts/slideLayout10.xml")
        );
        let package = OpcPackage::open(&path).unwrap();
        let types = ContentTypes::from_element(package.xml_part(CONTENT_TYPES_PART).unwrap());
        assert_eq!(types.get("ppt/slides/slide2.xml"), Some(content_type::SLIDE));
    }

    #[test]
    fn test_set_timing_replaces_and_precedes_ext_list() {
        let mut prs = open(TemplateSpec::default());
        let slide = prs.add_slide(0).unwrap();
        slide.xml.push(XmlElement::new("p:extLst"));

        slide.set_timing(XmlElement::new("p:timing").with_attr("v", "1"));
        slide.set_timing(XmlElement::new("p:timing").with_attr("v", "2"));

        let names: Vec<_> = slide.xml().elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["p:cSld", "p:clrMapOvr", "p:timing", "p:extLst"]);
        assert_eq!(slide.timing().and_then(|t| t.attr("v")), Some("2"));
    }
}
