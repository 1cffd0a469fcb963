//! Atom 1.0 parser.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::error::FeedError;
use super::model::{FeedType, Link, ParsedFeed};
use super::xml::{push_entry, read_link, Capture, EntryDraft};

#[derive(Debug, Clone, Copy)]
enum Field {
    FeedTitle,
    EntryTitle,
    EntrySubtitle,
    EntrySummary,
    EntryContent,
    EntryPublished,
    EntryUpdated,
    AuthorName,
}

/// Entry fields that need a choice made once the whole entry has been seen.
#[derive(Debug, Default)]
struct AtomEntry {
    draft: EntryDraft,
    subtitle: String,
    summary: String,
    content: String,
    published: String,
    updated: String,
    links: Vec<Link>,
}

impl AtomEntry {
    fn into_draft(self) -> EntryDraft {
        let mut draft = self.draft;
        draft.content = [self.subtitle, self.summary, self.content]
            .into_iter()
            .find(|text| !text.is_empty())
            .unwrap_or_default();
        draft.published = if self.published.is_empty() {
            self.updated
        } else {
            self.published
        };
        draft.link = self
            .links
            .iter()
            .find(|l| l.is_alternate())
            .or_else(|| self.links.first())
            .map(|l| l.href.clone())
            .unwrap_or_default();
        draft
    }
}

/// Parses an Atom document.
///
/// `<link rel="self">` gives the feed URL (falling back to `source_url`);
/// every other feed-level `<link>` overwrites the site URL, so the last one
/// wins. Entry content is the first non-empty of `subtitle`, `summary` and
/// `content`; the entry date is `published`, or `updated` when absent.
pub fn parse(bytes: &[u8], source_url: &str) -> Result<ParsedFeed, FeedError> {
    let mut reader = Reader::from_reader(bytes);
    let decoder = reader.decoder();
    let mut buf = Vec::new();

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut capture: Option<Capture<Field>> = None;
    let mut title = String::new();
    let mut feed_url = String::new();
    let mut site_url = String::new();
    let mut entry: Option<AtomEntry> = None;
    let mut entries = Vec::new();
    let mut skipped = 0;
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(FeedError::malformed)? {
            Event::Start(e) => {
                if !seen_root {
                    check_root(&e)?;
                    seen_root = true;
                }
                if capture.is_none() {
                    let field = match (parent(&stack), e.local_name().as_ref()) {
                        (Some(b"feed"), b"entry") => {
                            entry = Some(AtomEntry::default());
                            None
                        }
                        (Some(b"feed"), b"title") => Some(Field::FeedTitle),
                        (Some(b"feed"), b"link") => {
                            let link = read_link(&e, decoder)?;
                            apply_feed_link(link, &mut feed_url, &mut site_url);
                            None
                        }
                        (Some(b"entry"), b"title") => Some(Field::EntryTitle),
                        (Some(b"entry"), b"subtitle") => Some(Field::EntrySubtitle),
                        (Some(b"entry"), b"summary") => Some(Field::EntrySummary),
                        (Some(b"entry"), b"content") => Some(Field::EntryContent),
                        (Some(b"entry"), b"published") => Some(Field::EntryPublished),
                        (Some(b"entry"), b"updated") => Some(Field::EntryUpdated),
                        (Some(b"entry"), b"link") => {
                            push_entry_link(&e, decoder, entry.as_mut())?;
                            None
                        }
                        (Some(b"author"), b"name")
                            if grandparent(&stack) == Some(b"entry".as_slice()) =>
                        {
                            Some(Field::AuthorName)
                        }
                        _ => None,
                    };
                    capture = field.map(|f| Capture::new(f, stack.len()));
                }
                stack.push(e.local_name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                if !seen_root {
                    check_root(&e)?;
                    seen_root = true;
                }
                if capture.is_none() && e.local_name().as_ref() == b"link" {
                    match parent(&stack) {
                        Some(b"feed") => {
                            let link = read_link(&e, decoder)?;
                            apply_feed_link(link, &mut feed_url, &mut site_url);
                        }
                        Some(b"entry") => push_entry_link(&e, decoder, entry.as_mut())?,
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if let Some(c) = capture.as_mut() {
                    c.push_text(&t);
                }
            }
            Event::CData(t) => {
                if let Some(c) = capture.as_mut() {
                    c.push_cdata(&t);
                }
            }
            Event::End(e) => {
                stack.pop();
                if capture.as_ref().is_some_and(|c| c.closes_at(stack.len())) {
                    if let Some(done) = capture.take() {
                        let (field, text) = done.finish();
                        match field {
                            Field::FeedTitle => title = text,
                            _ => apply_entry_field(field, text, entry.as_mut()),
                        }
                    }
                } else if capture.is_none()
                    && e.local_name().as_ref() == b"entry"
                    && parent(&stack) == Some(b"feed".as_slice())
                {
                    if let Some(done) = entry.take() {
                        push_entry(&mut entries, &mut skipped, done.into_draft());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(FeedError::MalformedDocument("document has no root element".to_owned()));
    }
    if !stack.is_empty() {
        return Err(FeedError::MalformedDocument("unexpected end of document".to_owned()));
    }

    if feed_url.is_empty() {
        feed_url = source_url.to_owned();
    }

    Ok(ParsedFeed {
        feed_type: FeedType::Atom,
        title,
        feed_url,
        site_url,
        entries,
        skipped,
    })
}

fn parent(stack: &[Vec<u8>]) -> Option<&[u8]> {
    stack.last().map(Vec::as_slice)
}

fn grandparent(stack: &[Vec<u8>]) -> Option<&[u8]> {
    stack.len().checked_sub(2).map(|i| stack[i].as_slice())
}

fn check_root(e: &BytesStart<'_>) -> Result<(), FeedError> {
    match e.local_name().as_ref() {
        b"feed" => Ok(()),
        other => Err(FeedError::UnsupportedFeedType(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

fn apply_feed_link(link: Link, feed_url: &mut String, site_url: &mut String) {
    if link.href.is_empty() {
        return;
    }
    if link.is_self() {
        *feed_url = link.href;
    } else {
        *site_url = link.href;
    }
}

fn push_entry_link(
    e: &BytesStart<'_>,
    decoder: quick_xml::encoding::Decoder,
    entry: Option<&mut AtomEntry>,
) -> Result<(), FeedError> {
    if let Some(entry) = entry {
        let link = read_link(e, decoder)?;
        if !link.href.is_empty() {
            entry.links.push(link);
        }
    }
    Ok(())
}

fn apply_entry_field(field: Field, text: String, entry: Option<&mut AtomEntry>) {
    let Some(entry) = entry else { return };
    match field {
        Field::EntryTitle => entry.draft.title = text,
        Field::EntrySubtitle => entry.subtitle = text,
        Field::EntrySummary => entry.summary = text,
        Field::EntryContent => entry.content = text,
        Field::EntryPublished => entry.published = text,
        Field::EntryUpdated => entry.updated = text,
        Field::AuthorName => entry.draft.author = text,
        Field::FeedTitle => {}
    }
}
