//! Pull-parser plumbing shared by the RSS and Atom parsers.

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesCData, BytesStart, BytesText};

use super::date;
use super::error::FeedError;
use super::model::{FeedEntry, Link};

/// Collects the text content of one element, nested markup included.
///
/// `depth` is the element-stack length at the moment the captured element
/// opened; the capture ends on the `End` event that returns to it.
pub(crate) struct Capture<F> {
    pub field: F,
    depth: usize,
    text: String,
}

impl<F: Copy> Capture<F> {
    pub fn new(field: F, depth: usize) -> Self {
        Self {
            field,
            depth,
            text: String::new(),
        }
    }

    pub fn closes_at(&self, depth: usize) -> bool {
        self.depth == depth
    }

    pub fn push_text(&mut self, text: &BytesText<'_>) {
        match text.unescape() {
            Ok(unescaped) => self.text.push_str(&unescaped),
            // Undeclared HTML entities (&nbsp; and friends) are common; keep the raw text
            Err(_) => self.text.push_str(&String::from_utf8_lossy(text)),
        }
    }

    pub fn push_cdata(&mut self, cdata: &BytesCData<'_>) {
        self.text.push_str(&String::from_utf8_lossy(cdata));
    }

    pub fn finish(self) -> (F, String) {
        (self.field, self.text.trim().to_owned())
    }
}

/// Reads `href`, `rel` and `type` from a `<link>` start tag.
pub(crate) fn read_link(e: &BytesStart<'_>, decoder: Decoder) -> Result<Link, FeedError> {
    let mut link = Link::default();
    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                tracing::debug!(error = %err, "Skipping malformed link attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(FeedError::malformed)?
            .trim()
            .to_owned();
        match attr.key.as_ref() {
            b"href" => link.href = value,
            b"rel" => link.rel = Some(value),
            b"type" => link.media_type = Some(value),
            _ => {}
        }
    }
    Ok(link)
}

/// Raw per-entry fields gathered while streaming, before date normalization.
#[derive(Debug, Default)]
pub(crate) struct EntryDraft {
    pub title: String,
    pub content: String,
    pub author: String,
    pub link: String,
    pub published: String,
}

impl EntryDraft {
    /// Projects the draft into a [`FeedEntry`].
    ///
    /// Fails only when the date cannot be normalized.
    pub fn into_entry(self) -> Result<FeedEntry, FeedError> {
        let published_at = date::normalize(&self.published)?;
        Ok(FeedEntry {
            title: self.title,
            content: self.content,
            author: Some(self.author).filter(|a| !a.is_empty()),
            external_url: self.link,
            published_at,
        })
    }
}

/// Finishes a draft, counting it in `skipped` when its date is unusable.
pub(crate) fn push_entry(entries: &mut Vec<FeedEntry>, skipped: &mut usize, draft: EntryDraft) {
    let title = draft.title.clone();
    match draft.into_entry() {
        Ok(entry) => entries.push(entry),
        Err(e) => {
            tracing::debug!(title = %title, error = %e, "Dropping entry without a usable date");
            *skipped += 1;
        }
    }
}
