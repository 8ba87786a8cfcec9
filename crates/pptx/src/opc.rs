//! Open Packaging Conventions plumbing: parts, relationships, content types.

use deck_core::{Error, Result};
use std::collections::{HashSet, VecDeque};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::xml::XmlElement;

/// Name of the package content-type manifest.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Relationship type URIs.
pub mod rel_type {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
    pub const SLIDE_LAYOUT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
    pub const SLIDE_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
}

/// Content type strings.
pub mod content_type {
    pub const PRESENTATION_MAIN: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
    pub const TEMPLATE_MAIN: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.template.main+xml";
    pub const SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
}

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// One stored part.
#[derive(Debug, Clone)]
pub struct PackagePart {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
}

/// An OPC package held in memory, parts in archive order.
#[derive(Debug, Clone, Default)]
pub struct OpcPackage {
    parts: Vec<PackagePart>,
}

impl OpcPackage {
    /// Read a package from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read every part of a ZIP archive.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", i, e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let compression = file.compression();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;
            parts.push(PackagePart {
                name,
                data,
                compression,
            });
        }

        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Parse a required XML part.
    pub fn xml_part(&self, name: &str) -> Result<XmlElement> {
        let data = self
            .part(name)
            .ok_or_else(|| Error::PackageError(format!("Missing part '{}'", name)))?;
        XmlElement::parse_bytes(data)
            .map_err(|e| Error::XmlError(format!("In part '{}': {}", name, e)))
    }

    /// Replace a part's bytes, or append a new deflated part.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(PackagePart {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
            }),
        }
    }

    pub fn remove_part(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|p| p.name != name);
        before != self.parts.len()
    }

    /// Relationships of a source part; empty when it has no `.rels` part.
    /// The package itself is the source `""`.
    pub fn rels(&self, source: &str) -> Result<Relationships> {
        let rels_name = rels_part_name(source);
        if !self.contains(&rels_name) {
            return Ok(Relationships::new(source));
        }
        Ok(Relationships::from_element(source, &self.xml_part(&rels_name)?))
    }

    pub fn set_rels(&mut self, rels: &Relationships) -> Result<()> {
        let bytes = rels.to_element().to_xml_bytes()?;
        self.set_part(&rels_part_name(rels.source()), bytes);
        Ok(())
    }

    /// Parts reachable from the package relationships.
    pub fn reachable_parts(&self) -> Result<HashSet<String>> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([String::new()]);

        while let Some(source) = queue.pop_front() {
            for rel in self.rels(&source)?.iter().filter(|r| !r.external) {
                let target = resolve_target(&source, &rel.target);
                if self.contains(&target) && seen.insert(target.clone()) {
                    queue.push_back(target);
                }
            }
        }

        Ok(seen)
    }

    /// Drop parts no relationship chain leads to, returning their names.
    pub fn prune_unreachable(&mut self) -> Result<Vec<String>> {
        let reachable = self.reachable_parts()?;
        let keep = |name: &str| {
            name == CONTENT_TYPES_PART
                || reachable.contains(name)
                || rels_source(name).is_some_and(|src| src.is_empty() || reachable.contains(&src))
        };

        let removed: Vec<String> = self
            .parts
            .iter()
            .filter(|p| !keep(&p.name))
            .map(|p| p.name.clone())
            .collect();
        self.parts.retain(|p| keep(&p.name));

        for name in &removed {
            log::debug!("Dropped unreachable part {}", name);
        }
        Ok(removed)
    }

    /// Write all parts as a ZIP archive, keeping each part's compression.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        for part in &self.parts {
            let options = FileOptions::default().compression_method(part.compression);
            zip.start_file(part.name.as_str(), options)
                .map_err(|e| Error::ZipError(format!("Failed to start '{}': {}", part.name, e)))?;
            zip.write_all(&part.data)
                .map_err(|e| Error::ZipError(format!("Failed to write '{}': {}", part.name, e)))?;
        }
        zip.finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = self.write_to(BufWriter::new(file))?;
        writer.flush()?;
        Ok(())
    }
}

/// A relationship from a source part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// The relationships of one source part.
#[derive(Debug, Clone)]
pub struct Relationships {
    source: String,
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            items: Vec::new(),
        }
    }

    pub fn from_element(source: &str, root: &XmlElement) -> Self {
        let items = root
            .children_named("Relationship")
            .map(|e| Relationship {
                id: e.attr("Id").unwrap_or_default().to_string(),
                rel_type: e.attr("Type").unwrap_or_default().to_string(),
                target: e.attr("Target").unwrap_or_default().to_string(),
                external: e.attr("TargetMode") == Some("External"),
            })
            .collect();
        Self {
            source: source.to_string(),
            items,
        }
    }

    pub fn to_element(&self) -> XmlElement {
        let mut root = XmlElement::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS);
        for rel in &self.items {
            let mut e = XmlElement::new("Relationship")
                .with_attr("Id", rel.id.as_str())
                .with_attr("Type", rel.rel_type.as_str())
                .with_attr("Target", rel.target.as_str());
            if rel.external {
                e.set_attr("TargetMode", "External");
            }
            root.push(e);
        }
        root
    }

    /// Part name these relationships belong to.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn of_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.items.iter().filter(move |r| r.rel_type == rel_type)
    }

    /// Resolved part name of an internal relationship.
    pub fn target_part(&self, id: &str) -> Result<String> {
        let rel = self.get(id).ok_or_else(|| {
            Error::PackageError(format!("No relationship '{}' from '{}'", id, self.source))
        })?;
        if rel.external {
            return Err(Error::PackageError(format!(
                "Relationship '{}' from '{}' is external",
                id, self.source
            )));
        }
        Ok(resolve_target(&self.source, &rel.target))
    }

    /// Add an internal relationship to a part, returning its new id.
    pub fn add(&mut self, rel_type: &str, target_part: &str) -> String {
        let id = self.next_id();
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: relative_target(&self.source, target_part),
            external: false,
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.items.iter().position(|r| r.id == id)?;
        Some(self.items.remove(pos))
    }

    fn next_id(&self) -> String {
        let max = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }
}

/// The `[Content_Types].xml` manifest.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    root: XmlElement,
}

impl ContentTypes {
    pub fn from_element(root: XmlElement) -> Self {
        Self { root }
    }

    pub fn to_element(&self) -> &XmlElement {
        &self.root
    }

    /// Content type of a part: its override, else the default for its extension.
    pub fn get(&self, part: &str) -> Option<&str> {
        let part_name = format!("/{}", part);
        if let Some(ct) = self
            .root
            .children_named("Override")
            .find(|e| e.attr("PartName").is_some_and(|p| p.eq_ignore_ascii_case(&part_name)))
            .and_then(|e| e.attr("ContentType"))
        {
            return Some(ct);
        }
        let ext = part.rsplit_once('.').map(|(_, ext)| ext)?;
        self.root
            .children_named("Default")
            .find(|e| e.attr("Extension").is_some_and(|x| x.eq_ignore_ascii_case(ext)))
            .and_then(|e| e.attr("ContentType"))
    }

    pub fn add_override(&mut self, part: &str, content_type: &str) {
        self.remove_override(part);
        self.root.push(
            XmlElement::new("Override")
                .with_attr("PartName", format!("/{}", part))
                .with_attr("ContentType", content_type),
        );
    }

    pub fn remove_override(&mut self, part: &str) {
        let part_name = format!("/{}", part);
        self.root
            .retain_elements(|e| !(e.name == "Override" && e.attr("PartName") == Some(part_name.as_str())));
    }

    /// Drop overrides for parts the predicate says are gone.
    pub fn retain_overrides<F: Fn(&str) -> bool>(&mut self, exists: F) {
        self.root.retain_elements(|e| {
            e.name != "Override"
                || e
                    .attr("PartName")
                    .map(|p| exists(p.trim_start_matches('/')))
                    .unwrap_or(false)
        });
    }
}

/// `.rels` part holding the relationships of `part` (`""` is the package).
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Source part of a `.rels` part, or `None` if the name is not one.
pub fn rels_source(rels_part: &str) -> Option<String> {
    let file = rels_part.rsplit('/').next()?.strip_suffix(".rels")?;
    let dir = rels_part.strip_suffix(&format!("{}.rels", file))?;
    let parent = dir.strip_suffix("_rels/")?;
    Some(format!("{}{}", parent, file))
}

/// Resolve a relationship target against its source part.
pub fn resolve_target(source: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let base = source.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relative reference from a source part to a target part.
pub fn relative_target(source: &str, target: &str) -> String {
    let from_dir: Vec<&str> = source
        .rsplit_once('/')
        .map(|(dir, _)| dir.split('/').collect())
        .unwrap_or_default();
    let to: Vec<&str> = target.split('/').collect();
    let (to_dir, to_file) = to.split_at(to.len() - 1);

    let common = from_dir
        .iter()
        .zip(to_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
    parts.extend_from_slice(&to_dir[common..]);
    parts.extend_from_slice(to_file);
    parts.join("/")
}
