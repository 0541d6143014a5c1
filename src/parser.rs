use crate::models::PageRecord;
use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use chrono::DateTime;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// Revision format accepted by the extraction pipeline.
pub const WIKI_TEXT_FORMAT: &str = "text/x-wiki";

/// Opens a dump file as a decompressed byte stream. `.bz2` inputs are decoded
/// transparently, anything else is read as-is.
pub fn open_stream(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open dump at: {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "bz2") {
        Ok(Box::new(BufReader::new(BzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Timestamp,
    Format,
    Source,
}

/// Streaming page reader over a MediaWiki XML dump.
///
/// Yields one [`PageRecord`] per `<page>` whose latest revision has format
/// `text/x-wiki` and non-empty text. The stream is processed event by event;
/// per-page state is dropped as soon as the page is consumed, so memory stays
/// bounded regardless of dump size.
///
/// Structurally broken pages (e.g. a missing `<title>`) are skipped with a
/// warning. A lexically broken stream ends the sequence with a warning, since
/// there is no reliable way to resynchronize raw XML.
pub struct DumpReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
    in_page: bool,
    in_revision: bool,
    capture: Option<Field>,
    title: Option<String>,
    timestamp: Option<String>,
    format: Option<String>,
    source: Option<String>,
}

impl DumpReader<Box<dyn BufRead + Send>> {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_stream(open_stream(path)?)
    }
}

impl<R: BufRead> DumpReader<R> {
    /// Wraps an already-open byte stream. Fails fast if the root element is
    /// not `<mediawiki>`, before any page is yielded.
    pub fn from_stream(stream: R) -> Result<Self> {
        let mut reader = Reader::from_reader(stream);
        let mut buf = Vec::new();
        let mut done = false;
        loop {
            match reader
                .read_event_into(&mut buf)
                .context("failed to read dump prologue")?
            {
                Event::Start(e) => {
                    if e.local_name().as_ref() != b"mediawiki" {
                        bail!(
                            "root element should be <mediawiki>, found <{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        );
                    }
                    break;
                }
                Event::Empty(e) => {
                    if e.local_name().as_ref() != b"mediawiki" {
                        bail!(
                            "root element should be <mediawiki>, found <{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        );
                    }
                    done = true;
                    break;
                }
                Event::Eof => bail!("unexpected end of dump: no root element"),
                // XML declaration, comments, doctype, whitespace
                _ => {}
            }
            buf.clear();
        }
        Ok(Self {
            reader,
            buf,
            done,
            in_page: false,
            in_revision: false,
            capture: None,
            title: None,
            timestamp: None,
            format: None,
            source: None,
        })
    }

    fn reset_page(&mut self) {
        self.in_revision = false;
        self.capture = None;
        self.title = None;
        self.timestamp = None;
        self.format = None;
        self.source = None;
    }

    fn push_text(&mut self, text: &str) {
        let slot = match self.capture {
            Some(Field::Title) => &mut self.title,
            Some(Field::Timestamp) => &mut self.timestamp,
            Some(Field::Format) => &mut self.format,
            Some(Field::Source) => &mut self.source,
            None => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    /// Finishes the current page, returning a record only if it passes the
    /// format and non-empty-text filters.
    fn take_page(&mut self) -> Option<PageRecord> {
        let title = match self.title.take() {
            Some(t) => t,
            None => {
                warn!("page without <title>, skipped");
                self.reset_page();
                return None;
            }
        };
        let format = self.format.take();
        let source = self.source.take().unwrap_or_default();
        let timestamp = self.timestamp.take().and_then(|raw| {
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(dt) => Some(dt.timestamp_micros() as f64 / 1e6),
                Err(e) => {
                    warn!(title = %title, error = %e, "unparseable revision timestamp");
                    None
                }
            }
        });
        self.reset_page();

        if format.as_deref() != Some(WIKI_TEXT_FORMAT) || source.is_empty() {
            return None;
        }
        Some(PageRecord {
            title,
            timestamp,
            source,
        })
    }
}

impl<R: BufRead> Iterator for DumpReader<R> {
    type Item = PageRecord;

    fn next(&mut self) -> Option<PageRecord> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "malformed XML, ending page stream");
                    self.done = true;
                    return None;
                }
            };
            match event {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"page" => {
                        self.reset_page();
                        self.in_page = true;
                    }
                    b"revision" if self.in_page => self.in_revision = true,
                    b"title" if self.in_page && !self.in_revision => {
                        self.title = None;
                        self.capture = Some(Field::Title);
                    }
                    b"timestamp" if self.in_revision => {
                        self.timestamp = None;
                        self.capture = Some(Field::Timestamp);
                    }
                    b"format" if self.in_revision => {
                        self.format = None;
                        self.capture = Some(Field::Format);
                    }
                    b"text" if self.in_revision => {
                        self.source = None;
                        self.capture = Some(Field::Source);
                    }
                    _ => {}
                },
                Event::Text(t) => {
                    if self.capture.is_some() {
                        match t.unescape() {
                            Ok(s) => {
                                let s = s.into_owned();
                                self.push_text(&s);
                            }
                            Err(e) => warn!(error = %e, "bad text node, dropped"),
                        }
                    }
                }
                Event::CData(t) => {
                    if self.capture.is_some() {
                        let raw = t.into_inner().into_owned();
                        if let Ok(s) = std::str::from_utf8(&raw) {
                            let s = s.to_owned();
                            self.push_text(&s);
                        }
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"page" => {
                        self.in_page = false;
                        if let Some(record) = self.take_page() {
                            return Some(record);
                        }
                    }
                    b"revision" => {
                        self.in_revision = false;
                        self.capture = None;
                    }
                    _ => self.capture = None,
                },
                Event::Eof => {
                    self.done = true;
                    return None;
                }
                _ => {}
            }
        }
    }
}
