//! DOCX Documents - package I/O around the template tree
//!
//! Only `word/document.xml` is parsed. Every other package entry is copied
//! through untouched when the document is saved.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::{Captures, Regex};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::tree::Node;

/// Package entry holding the document body
pub const BODY_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid package: {0}")]
    Zip(#[from] ZipError),

    #[error("Invalid XML: {0}")]
    Xml(String),

    #[error("Package has no '{0}' part")]
    MissingPart(String),
}

fn xml_error(error: impl Display) -> DocumentError {
    DocumentError::Xml(error.to_string())
}

/// A document whose body is a template tree
pub trait TemplateDocument: Sized {
    fn tree(&self) -> &Node;
    fn set_tree(&mut self, tree: Node);

    /// Copy of this document with its body replaced
    fn with_tree(&self, tree: Node) -> Self;

    fn save(&self, path: &Path) -> Result<(), DocumentError>;
    fn to_bytes(&self) -> Result<Vec<u8>, DocumentError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl XmlDeclaration {
    fn from_event(decl: &BytesDecl<'_>) -> Result<Self, DocumentError> {
        let version = decl.version().map_err(xml_error)?;
        let encoding = decl.encoding().transpose().map_err(xml_error)?;
        let standalone = decl.standalone().transpose().map_err(xml_error)?;
        Ok(Self {
            version: String::from_utf8_lossy(&version).into_owned(),
            encoding: encoding.map(|e| String::from_utf8_lossy(&e).into_owned()),
            standalone: standalone.map(|s| String::from_utf8_lossy(&s).into_owned()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DocxDocument {
    package: Vec<u8>,
    declaration: Option<XmlDeclaration>,
    tree: Node,
}

impl DocxDocument {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let package = fs::read(path).map_err(|source| DocumentError::Io {
            operation: format!("read {}", path.display()),
            source,
        })?;
        Self::from_bytes(package)
    }

    pub fn from_bytes(package: Vec<u8>) -> Result<Self, DocumentError> {
        let xml = {
            let mut archive = ZipArchive::new(Cursor::new(package.as_slice()))?;
            let mut part = archive.by_name(BODY_PART).map_err(|e| match e {
                ZipError::FileNotFound => DocumentError::MissingPart(BODY_PART.to_string()),
                other => DocumentError::Zip(other),
            })?;
            let mut xml = String::new();
            part.read_to_string(&mut xml).map_err(|source| DocumentError::Io {
                operation: format!("read {}", BODY_PART),
                source,
            })?;
            xml
        };

        let (declaration, tree) = parse_xml(&merge_split_tags(&xml))?;
        Ok(Self {
            package,
            declaration,
            tree,
        })
    }

    /// Serialized body as it would be written to the package
    pub fn body_xml(&self) -> Result<String, DocumentError> {
        let bytes = write_xml(self.declaration.as_ref(), &self.tree)?;
        String::from_utf8(bytes).map_err(xml_error)
    }

    fn write_package<W: Write + Seek>(&self, writer: W) -> Result<W, DocumentError> {
        let mut source = ZipArchive::new(Cursor::new(self.package.as_slice()))?;
        let mut zip = ZipWriter::new(writer);

        for index in 0..source.len() {
            let entry = source.by_index(index)?;
            if entry.name() == BODY_PART {
                continue;
            }
            zip.raw_copy_file(entry)?;
        }

        let body = write_xml(self.declaration.as_ref(), &self.tree)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(BODY_PART, options)?;
        zip.write_all(&body).map_err(|source| DocumentError::Io {
            operation: format!("write {}", BODY_PART),
            source,
        })?;

        Ok(zip.finish()?)
    }
}

impl TemplateDocument for DocxDocument {
    fn tree(&self) -> &Node {
        &self.tree
    }

    fn set_tree(&mut self, tree: Node) {
        self.tree = tree;
    }

    fn with_tree(&self, tree: Node) -> Self {
        Self {
            package: self.package.clone(),
            declaration: self.declaration.clone(),
            tree,
        }
    }

    fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let file = File::create(path).map_err(|source| DocumentError::Io {
            operation: format!("create {}", path.display()),
            source,
        })?;
        self.write_package(file)?;
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(self.write_package(Cursor::new(Vec::new()))?.into_inner())
    }
}

fn split_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{[^{}]*\}").expect("valid split tag pattern"))
}

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup pattern"))
}

/// Removes markup that a word processor inserted inside template tags, so a
/// tag typed as one word but stored across several runs becomes one text.
pub fn merge_split_tags(xml: &str) -> String {
    split_tag_pattern()
        .replace_all(xml, |captures: &Captures<'_>| {
            markup_pattern().replace_all(&captures[0], "").into_owned()
        })
        .into_owned()
}

/// Parses XML into a tree. Comments, processing instructions and text
/// outside the root element are dropped.
pub fn parse_xml(xml: &str) -> Result<(Option<XmlDeclaration>, Node), DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut declaration = None;
    let mut stack: Vec<Node> = vec![];
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Decl(decl) => declaration = Some(XmlDeclaration::from_event(&decl)?),
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let node = element_from(&start)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| DocumentError::Xml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                if let Some(children) = stack.last_mut().and_then(Node::children_mut) {
                    let value = text.unescape().map_err(xml_error)?;
                    children.push(Node::Text(value.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(children) = stack.last_mut().and_then(Node::children_mut) {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    children.push(Node::Text(value));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DocumentError::Xml("unclosed element".to_string()));
    }
    let root = root.ok_or_else(|| DocumentError::Xml("no root element".to_string()))?;
    Ok((declaration, root))
}

fn element_from(start: &BytesStart<'_>) -> Result<Node, DocumentError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = vec![];
    for attribute in start.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
        attributes.push((key, value));
    }
    Ok(Node::element_with_attributes(name, attributes, vec![]))
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), DocumentError> {
    match stack.last_mut().and_then(Node::children_mut) {
        Some(children) => children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(DocumentError::Xml("multiple root elements".to_string())),
    }
    Ok(())
}

/// Serializes a tree, with the declaration when given
pub fn write_xml(declaration: Option<&XmlDeclaration>, root: &Node) -> Result<Vec<u8>, DocumentError> {
    let mut writer = Writer::new(Vec::new());
    if let Some(decl) = declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))
            .map_err(xml_error)?;
        writer.get_mut().extend_from_slice(b"\r\n");
    }
    write_node(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), DocumentError> {
    match node {
        Node::Text(value) => writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(xml_error),
        Node::Element {
            name,
            attributes,
            children,
        } => {
            let mut start = BytesStart::new(name.as_str());
            for (key, value) in attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if children.is_empty() {
                return writer.write_event(Event::Empty(start)).map_err(xml_error);
            }
            writer.write_event(Event::Start(start)).map_err(xml_error)?;
            for child in children {
                write_node(writer, child)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(name.as_str())))
                .map_err(xml_error)
        }
    }
}
