//! Minimal Atom/RSS reader
//!
//! Only the handful of fields the fetchers need are extracted: the entry
//! link, its timestamps, and the Sparkle version attributes of appcasts.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::version::error::FetchError;

/// One `<entry>` (Atom) or `<item>` (RSS) of a feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    /// Atom `link@href` or RSS `<link>` text, whichever comes first
    pub link: Option<String>,
    /// Atom `<updated>`
    pub updated: Option<String>,
    /// RSS `<pubDate>`
    pub pub_date: Option<String>,
    /// Sparkle `enclosure@sparkle:version` or `<sparkle:version>`
    pub sparkle_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Link,
    Updated,
    PubDate,
    SparkleVersion,
}

fn field_for(name: &[u8]) -> Option<Field> {
    match name {
        b"link" => Some(Field::Link),
        b"updated" => Some(Field::Updated),
        b"pubDate" => Some(Field::PubDate),
        b"sparkle:version" => Some(Field::SparkleVersion),
        _ => None,
    }
}

fn is_entry(name: &[u8]) -> bool {
    name == b"entry" || name == b"item"
}

fn invalid(e: impl std::fmt::Display) -> FetchError {
    FetchError::InvalidResponse(e.to_string())
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, FetchError> {
    for attr in element.attributes() {
        let attr = attr.map_err(invalid)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value().map_err(invalid)?.into_owned()));
        }
    }
    Ok(None)
}

fn absorb_attributes(entry: &mut FeedEntry, element: &BytesStart<'_>) -> Result<(), FetchError> {
    match element.name().as_ref() {
        b"link" if entry.link.is_none() => {
            entry.link = attribute(element, b"href")?;
        }
        b"enclosure" if entry.sparkle_version.is_none() => {
            entry.sparkle_version = attribute(element, b"sparkle:version")?;
        }
        _ => {}
    }
    Ok(())
}

fn store(entry: &mut FeedEntry, field: Field, text: String) {
    let slot = match field {
        Field::Link => &mut entry.link,
        Field::Updated => &mut entry.updated,
        Field::PubDate => &mut entry.pub_date,
        Field::SparkleVersion => &mut entry.sparkle_version,
    };
    if slot.is_none() && !text.is_empty() {
        *slot = Some(text);
    }
}

/// Parse every entry of an Atom or RSS document, in document order.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedEntry>, FetchError> {
    let xml = std::str::from_utf8(xml).map_err(invalid)?;
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(e) => {
                let name = e.name();
                if is_entry(name.as_ref()) {
                    current = Some(FeedEntry::default());
                } else if let Some(entry) = current.as_mut() {
                    absorb_attributes(entry, &e)?;
                    field = field_for(name.as_ref());
                }
            }
            Event::Empty(e) => {
                if let Some(entry) = current.as_mut() {
                    absorb_attributes(entry, &e)?;
                }
            }
            Event::Text(t) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    store(entry, f, t.unescape().map_err(invalid)?.into_owned());
                }
            }
            Event::CData(c) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    store(entry, f, String::from_utf8_lossy(&c.into_inner()).into_owned());
                }
            }
            Event::End(e) => {
                field = None;
                if is_entry(e.name().as_ref()) {
                    entries.extend(current.take());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}
