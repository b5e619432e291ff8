//! Package Tests
//!
//! DOCX load/save and batch archives, on packages built in temp dirs.

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::Path;

use docxgen_core::{
    Batch, BatchError, Context, ConvertError, Converter, DocxDocument, FailurePolicy, Generator,
    TemplateDocument,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#;
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?><w:styles xmlns:w="urn:w"><w:style w:styleId="Normal"/></w:styles>"#;

fn document_xml(paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|runs| format!("<w:p>{}</w:p>", runs))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
         <w:document xmlns:w=\"urn:w\"><w:body>{}</w:body></w:document>",
        body
    )
}

fn run(text: &str) -> String {
    format!("<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r>", text)
}

fn package(document: &str) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("word/document.xml", document),
        ("word/styles.xml", STYLES),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn entry(archive: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut bytes = vec![];
    file.read_to_end(&mut bytes).unwrap();
    bytes
}

fn entry_names(archive: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

fn contexts(data: Value) -> Vec<Context> {
    serde_json::from_value(data).unwrap()
}

fn invoice_template() -> DocxDocument {
    let xml = document_xml(&[
        &run("Invoice for {customer}"),
        &run("{foreach lines as line}"),
        &format!("{}{}", run("{$line.name}: "), run("{$line.price|number *eu* *2*}")),
        &run("{/foreach}"),
    ]);
    DocxDocument::from_bytes(package(&xml)).unwrap()
}

#[test]
fn test_save_expanded_document() {
    let dir = TempDir::new().unwrap();
    let template = invoice_template();
    let ctx: Context = serde_json::from_value(json!({
        "customer": "ACME",
        "lines": [{"name": "Bolt", "price": 1250.5}, {"name": "Nut", "price": 0.25}]
    }))
    .unwrap();

    let tree = Generator::new().expand(template.tree(), &ctx).unwrap();
    let output = dir.path().join("invoice.docx");
    template.with_tree(tree).save(&output).unwrap();

    let reopened = DocxDocument::open(&output).unwrap();
    assert_eq!(
        reopened.tree().text_content(),
        "Invoice for ACMEBolt: 1 250,50Nut: 0,25"
    );
    assert_eq!(entry(&output, "word/styles.xml"), STYLES.as_bytes());
    assert_eq!(entry(&output, "[Content_Types].xml"), CONTENT_TYPES.as_bytes());

    let body = String::from_utf8(entry(&output, "word/document.xml")).unwrap();
    assert!(body.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n<w:document"));
    assert!(!body.contains("foreach"));
}

#[test]
fn test_template_is_reusable_after_save() {
    let template = invoice_template();
    let before = template.tree().clone();

    let ctx: Context = serde_json::from_value(json!({"customer": "X", "lines": []})).unwrap();
    let tree = Generator::new().expand(template.tree(), &ctx).unwrap();
    let bytes = template.with_tree(tree).to_bytes().unwrap();

    assert_eq!(template.tree(), &before);
    let rendered = DocxDocument::from_bytes(bytes).unwrap();
    assert_eq!(rendered.tree().text_content(), "Invoice for X");
}

#[test]
fn test_split_runs_are_merged_on_load() {
    let xml = document_xml(&[&format!(
        "{}<w:r><w:rPr><w:b/></w:rPr><w:t>tomer|upper}}</w:t></w:r>",
        run("Dear {$cus")
    )]);
    let template = DocxDocument::from_bytes(package(&xml)).unwrap();
    let ctx: Context = serde_json::from_value(json!({"customer": "Ada"})).unwrap();

    let tree = Generator::new().expand(template.tree(), &ctx).unwrap();
    assert_eq!(tree.text_content(), "Dear ADA");
}

#[test]
fn test_escaped_text_survives_expansion() {
    let xml = document_xml(&[&run("R&amp;D: {team}")]);
    let template = DocxDocument::from_bytes(package(&xml)).unwrap();
    let ctx: Context = serde_json::from_value(json!({"team": "<core>"})).unwrap();

    let tree = Generator::new().expand(template.tree(), &ctx).unwrap();
    let document = template.with_tree(tree);
    assert!(document.body_xml().unwrap().contains("R&amp;D: &lt;core&gt;"));
}

#[test]
fn test_set_tree_replaces_the_body_in_place() {
    let mut document = DocxDocument::from_bytes(package(&document_xml(&[&run("{greeting}")]))).unwrap();
    let ctx: Context = serde_json::from_value(json!({"greeting": "Hi & bye"})).unwrap();

    let tree = Generator::new().expand(document.tree(), &ctx).unwrap();
    document.set_tree(tree);

    assert_eq!(document.tree().text_content(), "Hi & bye");
    let body = document.body_xml().unwrap();
    assert!(body.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n"));
    assert!(body.contains("<w:t xml:space=\"preserve\">Hi &amp; bye</w:t>"));

    let reopened = DocxDocument::from_bytes(document.to_bytes().unwrap()).unwrap();
    assert_eq!(reopened.tree(), document.tree());
}

#[test]
fn test_package_without_body_is_rejected() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/styles.xml", SimpleFileOptions::default()).unwrap();
    zip.write_all(STYLES.as_bytes()).unwrap();
    let bytes = zip.finish().unwrap().into_inner();

    let err = DocxDocument::from_bytes(bytes).unwrap_err();
    assert_eq!(err.to_string(), "Package has no 'word/document.xml' part");
    assert!(DocxDocument::from_bytes(b"not a zip".to_vec()).is_err());
}

#[test]
fn test_batch_writes_one_entry_per_context() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out").join("invoices.zip");
    let template = invoice_template();
    let generator = Generator::new();

    let report = Batch::new(&generator, &template)
        .write(
            &contexts(json!([
                {"customer": "A", "lines": [{"name": "x", "price": 1}]},
                {"customer": "B", "lines": []}
            ])),
            &output,
        )
        .unwrap();

    assert_eq!(report.entries, vec!["document0.docx", "document1.docx"]);
    assert!(report.skipped.is_empty());
    assert_eq!(entry_names(&output), vec!["document0.docx", "document1.docx"]);

    let second = DocxDocument::from_bytes(entry(&output, "document1.docx")).unwrap();
    assert_eq!(second.tree().text_content(), "Invoice for B");
    let first = DocxDocument::from_bytes(entry(&output, "document0.docx")).unwrap();
    assert_eq!(first.tree().text_content(), "Invoice for Ax: 1,00");
}

#[test]
fn test_batch_abort_leaves_nothing_behind() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("invoices.zip");
    let template = invoice_template();
    let generator = Generator::new();

    let err = Batch::new(&generator, &template)
        .with_policy(FailurePolicy::Abort)
        .write(
            &contexts(json!([
                {"customer": "A", "lines": []},
                {"customer": "B", "lines": [{"name": "x", "price": "twelve"}]}
            ])),
            &output,
        )
        .unwrap_err();

    assert!(matches!(err, BatchError::Item { index: 1, .. }));
    assert!(!output.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_batch_skip_reports_failed_items() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("invoices.zip");
    let template = invoice_template();
    let generator = Generator::new();

    let report = Batch::new(&generator, &template)
        .with_policy(FailurePolicy::Skip)
        .write(
            &contexts(json!([
                {"customer": "A", "lines": []},
                {"customer": "B", "lines": [{"name": "x", "price": "twelve"}]},
                {"customer": "C", "lines": []}
            ])),
            &output,
        )
        .unwrap();

    assert_eq!(report.entries, vec!["document0.docx", "document2.docx"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 1);
    assert!(report.skipped[0].reason.contains("'twelve' is not a number"));
    assert_eq!(entry_names(&output), vec!["document0.docx", "document2.docx"]);
}

#[test]
fn test_empty_batch_writes_empty_archive() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("empty.zip");
    let template = invoice_template();
    let generator = Generator::new();

    let report = Batch::new(&generator, &template).write(&[], &output).unwrap();
    assert!(report.entries.is_empty());
    assert!(entry_names(&output).is_empty());
}

/// Writes the document's body text as a plain text file
struct TextConverter;

impl Converter for TextConverter {
    fn extension(&self) -> &str {
        "txt"
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        let document = DocxDocument::open(source).map_err(|e| ConvertError::Failed {
            code: None,
            stderr: e.to_string(),
        })?;
        fs::write(target, document.tree().text_content()).map_err(|source| ConvertError::Io {
            operation: "write text".to_string(),
            source,
        })
    }
}

#[test]
fn test_batch_with_converter() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("texts.zip");
    let template = invoice_template();
    let generator = Generator::new();

    let report = Batch::new(&generator, &template)
        .with_converter(&TextConverter)
        .write(&contexts(json!([{"customer": "A"}, {"customer": "B"}])), &output)
        .unwrap();

    assert_eq!(report.entries, vec!["document0.txt", "document1.txt"]);
    assert_eq!(entry(&output, "document1.txt"), b"Invoice for B");

    let single = dir.path().join("single.docx");
    fs::write(&single, package(&document_xml(&[&run("plain")]))).unwrap();
    assert_eq!(TextConverter.convert_to_bytes(&single).unwrap(), b"plain");
}
