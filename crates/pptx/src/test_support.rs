//! Minimal template packages for tests.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::opc::{content_type, OpcPackage};

const NS_DECLS: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const LAYOUT_COUNT: usize = 10;

/// Shape of the generated template.
#[derive(Debug, Clone, Default)]
pub(crate) struct TemplateSpec {
    /// Declare the main part as a template (`.potx`) instead of a presentation.
    pub template_typed: bool,
    /// Slides already present in the template.
    pub existing_slides: usize,
}

pub(crate) fn template_package(spec: &TemplateSpec) -> OpcPackage {
    OpcPackage::from_reader(Cursor::new(template_bytes(spec))).unwrap()
}

pub(crate) fn write_template(dir: &Path, spec: &TemplateSpec) -> PathBuf {
    let path = dir.join(if spec.template_typed { "brand.potx" } else { "brand.pptx" });
    std::fs::write(&path, template_bytes(spec)).unwrap();
    path
}

pub(crate) fn template_bytes(spec: &TemplateSpec) -> Vec<u8> {
    let mut parts: Vec<(String, Vec<u8>)> = Vec::new();
    let mut add = |name: &str, body: String| parts.push((name.to_string(), body.into_bytes()));

    let main_type = if spec.template_typed {
        content_type::TEMPLATE_MAIN
    } else {
        content_type::PRESENTATION_MAIN
    };
    let mut overrides = format!(
        r#"<Override PartName="/ppt/presentation.xml" ContentType="{}"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/>"#,
        main_type
    );
    for n in 1..=LAYOUT_COUNT {
        overrides.push_str(&format!(
            r#"<Override PartName="/ppt/slideLayouts/slideLayout{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>"#,
            n
        ));
    }
    for n in 1..=spec.existing_slides {
        overrides.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="{}"/>"#,
            n,
            content_type::SLIDE
        ));
    }
    if spec.existing_slides > 0 {
        overrides.push_str(r#"<Override PartName="/ppt/notesSlides/notesSlide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml"/>"#);
    }
    add(
        "[Content_Types].xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/>{}</Types>"#,
            overrides
        ),
    );

    add(
        "_rels/.rels",
        rels(&[("rId1", "officeDocument", "ppt/presentation.xml")]),
    );

    let mut slide_ids = String::new();
    let mut section_ids = String::new();
    let mut pres_rels = vec![("rId1".to_string(), "slideMaster", "slideMasters/slideMaster1.xml".to_string())];
    for n in 1..=spec.existing_slides {
        let id = 255 + n;
        slide_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, id, n + 1));
        section_ids.push_str(&format!(r#"<p14:sldId id="{}"/>"#, id));
        pres_rels.push((format!("rId{}", n + 1), "slide", format!("slides/slide{}.xml", n)));
    }
    let slide_list = if spec.existing_slides > 0 {
        format!("<p:sldIdLst>{}</p:sldIdLst>", slide_ids)
    } else {
        String::new()
    };
    let ext_list = if spec.existing_slides > 0 {
        format!(
            r#"<p:extLst><p:ext uri="{{521415D9-36F7-43E2-AB2F-B90AF26B5E84}}"><p14:sectionLst xmlns:p14="http://schemas.microsoft.com/office/powerpoint/2010/main"><p14:section name="Default Section" id="{{6F3B1C43-0000-0000-0000-000000000001}}"><p14:sldIdLst>{}</p14:sldIdLst></p14:section></p14:sectionLst></p:ext></p:extLst>"#,
            section_ids
        )
    } else {
        String::new()
    };
    add(
        "ppt/presentation.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{}<p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/>{}</p:presentation>"#,
            NS_DECLS, slide_list, ext_list
        ),
    );
    let pres_rels: Vec<(&str, &str, &str)> = pres_rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();
    add("ppt/_rels/presentation.xml.rels", rels(&pres_rels));

    let layout_ids: String = (1..=LAYOUT_COUNT)
        .map(|n| format!(r#"<p:sldLayoutId id="{}" r:id="rId{}"/>"#, 2147483648u64 + n as u64, n))
        .collect();
    add(
        "ppt/slideMasters/slideMaster1.xml",
        format!(
            r#"<p:sldMaster {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:pic><p:nvPicPr><p:cNvPr id="2" name="Logo"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId99"/></p:blipFill><p:spPr/></p:pic></p:spTree></p:cSld><p:sldLayoutIdLst>{}</p:sldLayoutIdLst></p:sldMaster>"#,
            NS_DECLS, layout_ids
        ),
    );
    let layout_targets: Vec<(String, String)> = (1..=LAYOUT_COUNT)
        .map(|n| (format!("rId{}", n), format!("../slideLayouts/slideLayout{}.xml", n)))
        .collect();
    let mut master_rels: Vec<(&str, &str, &str)> = layout_targets
        .iter()
        .map(|(id, target)| (id.as_str(), "slideLayout", target.as_str()))
        .collect();
    master_rels.push(("rId99", "image", "../media/image1.png"));
    add("ppt/slideMasters/_rels/slideMaster1.xml.rels", rels(&master_rels));

    for n in 1..=LAYOUT_COUNT {
        add(&format!("ppt/slideLayouts/slideLayout{}.xml", n), layout_xml(n));
        add(
            &format!("ppt/slideLayouts/_rels/slideLayout{}.xml.rels", n),
            rels(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
        );
    }

    for n in 1..=spec.existing_slides {
        add(
            &format!("ppt/slides/slide{}.xml", n),
            format!(
                r#"<p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="ctrTitle"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>Old slide {}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
                NS_DECLS, n
            ),
        );
        let mut slide_rels = vec![("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")];
        if n == 1 {
            slide_rels.push(("rId2", "notesSlide", "../notesSlides/notesSlide1.xml"));
        }
        add(&format!("ppt/slides/_rels/slide{}.xml.rels", n), rels(&slide_rels));
    }
    if spec.existing_slides > 0 {
        add(
            "ppt/notesSlides/notesSlide1.xml",
            format!(r#"<p:notes {}><p:cSld><p:spTree/></p:cSld></p:notes>"#, NS_DECLS),
        );
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in &parts {
        zip.start_file(name.as_str(), FileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.start_file("ppt/media/image1.png", FileOptions::default()).unwrap();
    zip.write_all(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 1, 2, 3])
        .unwrap();
    zip.finish().unwrap().into_inner()
}

/// Layout `n` (1-based): title, subtitle at 1, body at 13 and a date placeholder.
fn layout_xml(n: usize) -> String {
    let (title_type, subtitle) = if n == 1 {
        ("ctrTitle", r#"<p:ph type="subTitle" idx="1"/>"#)
    } else {
        ("title", r#"<p:ph type="body" idx="1"/>"#)
    };
    let placeholder = |id: u32, name: &str, ph: &str, text: &str| {
        format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr/><p:nvPr>{}</p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>"#,
            id, name, ph, text
        )
    };
    format!(
        r#"<p:sldLayout {}><p:cSld name="Layout {}"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}{}{}{}<p:sp><p:nvSpPr><p:cNvPr id="9" name="Decoration"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/></p:sp></p:spTree></p:cSld></p:sldLayout>"#,
        NS_DECLS,
        n,
        placeholder(2, "Title 1", &format!(r#"<p:ph type="{}"/>"#, title_type), "Click to edit title"),
        placeholder(3, "Subtitle 2", subtitle, "Click to edit subtitle"),
        placeholder(4, "Body 3", r#"<p:ph type="body" sz="quarter" idx="13"/>"#, "Body text"),
        placeholder(5, "Date 4", r#"<p:ph type="dt" sz="half" idx="10"/>"#, "date"),
    )
}

fn rels(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(id, kind, target)| {
            format!(
                r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
                id, REL_BASE, kind, target
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        body
    )
}
