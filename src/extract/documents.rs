//! Structured document parsing: PDF, DOCX, PPTX, EPUB, ENEX, text files, URLs.
//!
//! Every parser returns passages (pages, paragraphs, slides, chapters, notes)
//! that the registry joins with a single space.
//!
//! Office formats and EPUB are zip archives of XML; they are read with
//! `zip` + `quick-xml`. HTML bodies (URLs, EPUB chapters, Evernote notes) go
//! through `scraper`. PDF text comes from pdfium, which is blocking and runs
//! under `spawn_blocking`.

use super::SourceKind;
use crate::error::ExtractionError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{Html, Selector};
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::debug;

/// Turns a document reference into text passages.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(&self, kind: SourceKind, reference: &str)
        -> Result<Vec<String>, ExtractionError>;
}

/// Default parser set.
#[derive(Clone)]
pub struct StandardDocumentParser {
    http: reqwest::Client,
}

impl StandardDocumentParser {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch_page(&self, url: &str) -> Result<Vec<String>, ExtractionError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ExtractionError::network(url, e))?;
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::network(url, e))?;
        Ok(vec![html_to_text(&body)])
    }
}

async fn read_bytes(reference: &str) -> Result<Vec<u8>, ExtractionError> {
    tokio::fs::read(reference)
        .await
        .map_err(|_| ExtractionError::NotFound {
            reference: reference.to_string(),
        })
}

#[async_trait]
impl DocumentParser for StandardDocumentParser {
    async fn parse(
        &self,
        kind: SourceKind,
        reference: &str,
    ) -> Result<Vec<String>, ExtractionError> {
        let passages = match kind {
            SourceKind::Url => return self.fetch_page(reference).await,
            SourceKind::Pdf => {
                let path = Path::new(reference).to_path_buf();
                if !path.exists() {
                    return Err(ExtractionError::NotFound {
                        reference: reference.to_string(),
                    });
                }
                tokio::task::spawn_blocking(move || pdf_pages(&path))
                    .await
                    .map_err(|e| ExtractionError::parse(reference, format!("PDF task panicked: {e}")))??
            }
            SourceKind::Txt => {
                let bytes = read_bytes(reference).await?;
                vec![String::from_utf8_lossy(&bytes).into_owned()]
            }
            SourceKind::Docx => docx_paragraphs(&read_bytes(reference).await?)
                .map_err(|e| ExtractionError::parse(reference, e))?,
            SourceKind::Pptx => pptx_slides(&read_bytes(reference).await?)
                .map_err(|e| ExtractionError::parse(reference, e))?,
            SourceKind::Epub => epub_chapters(&read_bytes(reference).await?)
                .map_err(|e| ExtractionError::parse(reference, e))?,
            SourceKind::Enex => {
                let bytes = read_bytes(reference).await?;
                enex_notes(&String::from_utf8_lossy(&bytes))
                    .map_err(|e| ExtractionError::parse(reference, e))?
            }
            other => {
                return Err(ExtractionError::Unsupported {
                    kind: other.to_string(),
                })
            }
        };
        debug!("{}: {} passage(s) from {}", kind, passages.len(), reference);
        Ok(passages)
    }
}

// ── PDF ──────────────────────────────────────────────────────────────────

fn pdf_pages(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let reference = path.display().to_string();
    let pdfium = pdfium_auto::bind_pdfium_silent()
        .map_err(|e| ExtractionError::parse(&reference, format!("pdfium unavailable: {e}")))?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ExtractionError::parse(&reference, format!("{e:?}")))?;

    let mut pages = Vec::new();
    for page in document.pages().iter() {
        let text = page
            .text()
            .map_err(|e| ExtractionError::parse(&reference, format!("{e:?}")))?
            .all();
        if !text.trim().is_empty() {
            pages.push(text);
        }
    }
    Ok(pages)
}

// ── Zip + XML formats ────────────────────────────────────────────────────

fn open_archive(data: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, String> {
    zip::ZipArchive::new(Cursor::new(data)).map_err(|e| e.to_string())
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, String> {
    let mut file = archive.by_name(name).map_err(|e| format!("{name}: {e}"))?;
    let mut out = String::new();
    file.read_to_string(&mut out)
        .map_err(|e| format!("{name}: {e}"))?;
    Ok(out)
}

/// Text of every `<…:t>` run, one string per `<…:p>` paragraph.
///
/// Covers both WordprocessingML (`w:t`/`w:p`) and DrawingML (`a:t`/`a:p`).
fn xml_paragraphs(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(e)) if in_text => {
                if let Ok(text) = e.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let para = current.trim();
                    if !para.is_empty() {
                        paragraphs.push(para.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => current.push(' '),
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        paragraphs.push(tail.to_string());
    }
    paragraphs
}

fn docx_paragraphs(data: &[u8]) -> Result<Vec<String>, String> {
    let mut archive = open_archive(data)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    Ok(xml_paragraphs(&xml))
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse::<u32>()
        .unwrap_or(0)
}

fn pptx_slides(data: &[u8]) -> Result<Vec<String>, String> {
    let mut archive = open_archive(data)?;
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|n| n.to_string())
        .collect();
    names.sort_by_key(|n| slide_number(n));

    let mut slides = Vec::with_capacity(names.len());
    for name in names {
        let xml = read_entry(&mut archive, &name)?;
        let text = xml_paragraphs(&xml).join("\n");
        if !text.is_empty() {
            slides.push(text);
        }
    }
    Ok(slides)
}

/// Value of attribute `key` on a start/empty tag.
fn attr(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn epub_rootfile(container_xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(container_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                return attr(&e, b"full-path");
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Chapter hrefs from an OPF package, in spine order.
fn epub_spine(opf_xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(opf_xml);
    let mut manifest = std::collections::HashMap::new();
    let mut spine = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => {
                    if let (Some(id), Some(href)) = (attr(&e, b"id"), attr(&e, b"href")) {
                        manifest.insert(id, href);
                    }
                }
                b"itemref" => {
                    if let Some(idref) = attr(&e, b"idref") {
                        spine.push(idref);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    spine
        .into_iter()
        .filter_map(|id| manifest.get(&id).cloned())
        .collect()
}

/// Archive entry name for a spine href relative to the OPF directory.
///
/// Hrefs are URL-encoded and may climb out of the OPF directory with `../`.
fn epub_entry_name(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let href = urlencoding::decode(href)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| href.to_string());
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn epub_chapters(data: &[u8]) -> Result<Vec<String>, String> {
    let mut archive = open_archive(data)?;
    let container = read_entry(&mut archive, "META-INF/container.xml")?;
    let opf_path = epub_rootfile(&container).ok_or("container.xml has no rootfile")?;
    let opf = read_entry(&mut archive, &opf_path)?;
    let base = match opf_path.rfind('/') {
        Some(i) => &opf_path[..=i],
        None => "",
    };

    let mut chapters = Vec::new();
    for href in epub_spine(&opf) {
        let name = epub_entry_name(base, &href);
        match read_entry(&mut archive, &name) {
            Ok(xhtml) => {
                let text = html_to_text(&xhtml);
                if !text.is_empty() {
                    chapters.push(text);
                }
            }
            Err(e) => debug!("Skipping EPUB entry {}", e),
        }
    }
    Ok(chapters)
}

/// Title and body of each `<note>` in an Evernote export.
fn enex_notes(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut notes = Vec::new();
    let mut field: Option<&'static str> = None;
    let mut title = String::new();
    let mut content = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"title" => field = Some("title"),
                b"content" => field = Some("content"),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                match field {
                    Some("title") => title.push_str(&text),
                    Some("content") => content.push_str(&text),
                    _ => {}
                }
            }
            Ok(Event::CData(e)) => {
                if field == Some("content") {
                    content.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"title" | b"content" => field = None,
                b"note" => {
                    let body = html_to_text(&content);
                    let note = [title.trim(), body.as_str()]
                        .iter()
                        .filter(|s| !s.is_empty())
                        .copied()
                        .collect::<Vec<_>>()
                        .join("\n");
                    if !note.is_empty() {
                        notes.push(note);
                    }
                    title.clear();
                    content.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("invalid ENEX at {}: {e}", reader.buffer_position())),
            _ => {}
        }
    }
    Ok(notes)
}

// ── HTML ─────────────────────────────────────────────────────────────────

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static EN_NOTE: Lazy<Selector> = Lazy::new(|| Selector::parse("en-note").unwrap());

/// Visible text of an HTML (or ENML) document, whitespace-collapsed.
///
/// Text inside `script`, `style` and `noscript` is skipped.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document
        .select(&BODY)
        .next()
        .or_else(|| document.select(&EN_NOTE).next());
    let Some(root) = root else {
        return String::new();
    };

    let mut words = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style" | "noscript"))
                .unwrap_or(false)
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = zip::ZipWriter::new(&mut buf);
            for (name, body) in entries {
                w.start_file(*name, SimpleFileOptions::default()).unwrap();
                w.write_all(body.as_bytes()).unwrap();
            }
            w.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn docx_paragraphs_are_split() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>The capital</w:t></w:r><w:r><w:t xml:space="preserve"> of France</w:t></w:r></w:p>
            <w:p><w:r><w:t>is Paris &amp; more.</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let data = zip_of(&[("word/document.xml", xml)]);
        assert_eq!(
            docx_paragraphs(&data).unwrap(),
            vec!["The capital of France", "is Paris & more."]
        );
    }

    #[test]
    fn pptx_slides_follow_numeric_order() {
        let slide = |t: &str| format!(r#"<p:sld xmlns:a="a" xmlns:p="p"><a:p><a:r><a:t>{t}</a:t></a:r></a:p></p:sld>"#);
        let (s1, s2, s10) = (slide("one"), slide("two"), slide("ten"));
        let data = zip_of(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
        ]);
        assert_eq!(pptx_slides(&data).unwrap(), vec!["one", "two", "ten"]);
    }

    #[test]
    fn epub_chapters_follow_spine() {
        let container = r#"<container><rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles></container>"#;
        let opf = r#"<package><manifest>
            <item id="c2" href="ch2.xhtml"/><item id="c1" href="ch1.xhtml"/>
        </manifest><spine><itemref idref="c1"/><itemref idref="c2"/></spine></package>"#;
        let data = zip_of(&[
            ("META-INF/container.xml", container),
            ("OEBPS/content.opf", opf),
            ("OEBPS/ch1.xhtml", "<html><body><p>First chapter.</p></body></html>"),
            ("OEBPS/ch2.xhtml", "<html><body><p>Second chapter.</p></body></html>"),
        ]);
        assert_eq!(
            epub_chapters(&data).unwrap(),
            vec!["First chapter.", "Second chapter."]
        );
    }

    #[test]
    fn epub_hrefs_are_decoded_and_normalised() {
        assert_eq!(epub_entry_name("OEBPS/", "Text/Chapter%201.xhtml"), "OEBPS/Text/Chapter 1.xhtml");
        assert_eq!(epub_entry_name("OEBPS/Content/", "../Text/c1.xhtml#p3"), "OEBPS/Text/c1.xhtml");
        assert_eq!(epub_entry_name("", "./c1.xhtml"), "c1.xhtml");
    }

    #[test]
    fn epub_spine_entries_outside_opf_dir_are_read() {
        let container = r#"<container><rootfiles><rootfile full-path="OEBPS/Content/content.opf"/></rootfiles></container>"#;
        let opf = r#"<package><manifest>
            <item id="c1" href="../Text/Chapter%201.xhtml"/>
        </manifest><spine><itemref idref="c1"/></spine></package>"#;
        let data = zip_of(&[
            ("META-INF/container.xml", container),
            ("OEBPS/Content/content.opf", opf),
            ("OEBPS/Text/Chapter 1.xhtml", "<html><body><p>Only chapter.</p></body></html>"),
        ]);
        assert_eq!(epub_chapters(&data).unwrap(), vec!["Only chapter."]);
    }

    #[test]
    fn enex_notes_keep_title_and_body() {
        let enex = r#"<?xml version="1.0"?><en-export>
            <note><title>Geography</title><content><![CDATA[<?xml version="1.0"?><en-note><div>Paris is the capital.</div></en-note>]]></content></note>
        </en-export>"#;
        assert_eq!(
            enex_notes(enex).unwrap(),
            vec!["Geography\nParis is the capital."]
        );
    }

    #[test]
    fn html_text_skips_scripts() {
        let html = "<html><head><title>t</title></head><body><h1>Hello</h1><script>var x=1;</script><p>world  \n again</p></body></html>";
        assert_eq!(html_to_text(html), "Hello world again");
    }

    #[tokio::test]
    async fn text_file_is_read() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "plain words").unwrap();
        let parser = StandardDocumentParser::new(reqwest::Client::new());
        let out = parser
            .parse(SourceKind::Txt, f.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(out, vec!["plain words"]);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let parser = StandardDocumentParser::new(reqwest::Client::new());
        let err = parser
            .parse(SourceKind::Docx, "/no/such/file.docx")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NotFound { .. }));
    }
}
