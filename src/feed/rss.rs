//! RSS 2.0 parser.
//!
//! Streams the document once with quick-xml and projects `<channel>` and its
//! `<item>`s into the unified model. Namespaces are not resolved: any
//! prefixed `<link rel="self">` directly inside the channel is taken as the
//! Atom self link, which is how RSS feeds conventionally advertise their URL.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::error::FeedError;
use super::model::{FeedType, ParsedFeed};
use super::xml::{push_entry, read_link, Capture, EntryDraft};

#[derive(Debug, Clone, Copy)]
enum Field {
    ChannelTitle,
    ChannelLink,
    ItemTitle,
    ItemDescription,
    ItemPubDate,
    ItemLink,
    ItemAuthor,
}

#[derive(Debug, Default)]
struct ChannelDraft {
    title: String,
    site_url: String,
    self_url: String,
}

/// Parses an RSS document.
///
/// `source_url` becomes the feed URL when the channel carries no self link.
/// Items whose `pubDate` cannot be normalized are left out and counted in
/// [`ParsedFeed::skipped`]; the order of the rest is preserved.
pub fn parse(bytes: &[u8], source_url: &str) -> Result<ParsedFeed, FeedError> {
    let mut reader = Reader::from_reader(bytes);
    let decoder = reader.decoder();
    let mut buf = Vec::new();

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut capture: Option<Capture<Field>> = None;
    let mut channel = ChannelDraft::default();
    let mut item: Option<EntryDraft> = None;
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
                    let parent = stack.last().map(Vec::as_slice);
                    let field = match (parent, e.name().as_ref()) {
                        (Some(b"channel"), b"item") => {
                            item = Some(EntryDraft::default());
                            None
                        }
                        (Some(b"channel"), b"title") => Some(Field::ChannelTitle),
                        (Some(b"channel"), b"link") => Some(Field::ChannelLink),
                        (Some(b"item"), b"title") => Some(Field::ItemTitle),
                        (Some(b"item"), b"description") => Some(Field::ItemDescription),
                        (Some(b"item"), b"pubDate") => Some(Field::ItemPubDate),
                        (Some(b"item"), b"link") => Some(Field::ItemLink),
                        (Some(b"item"), b"author") | (Some(b"item"), b"dc:creator") => {
                            Some(Field::ItemAuthor)
                        }
                        (Some(b"channel"), _) if is_prefixed_link(&e) => {
                            take_self_link(&e, decoder, &mut channel)?;
                            None
                        }
                        _ => None,
                    };
                    capture = field.map(|f| Capture::new(f, stack.len()));
                }
                stack.push(e.name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                if !seen_root {
                    check_root(&e)?;
                    seen_root = true;
                }
                if capture.is_none()
                    && stack.last().map(Vec::as_slice) == Some(b"channel".as_slice())
                    && is_prefixed_link(&e)
                {
                    take_self_link(&e, decoder, &mut channel)?;
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
                        apply(field, text, &mut channel, item.as_mut());
                    }
                } else if capture.is_none()
                    && e.name().as_ref() == b"item"
                    && stack.last().map(Vec::as_slice) == Some(b"channel".as_slice())
                {
                    if let Some(draft) = item.take() {
                        push_entry(&mut entries, &mut skipped, draft);
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

    let feed_url = if channel.self_url.is_empty() {
        source_url.to_owned()
    } else {
        channel.self_url
    };

    Ok(ParsedFeed {
        feed_type: FeedType::Rss,
        title: channel.title,
        feed_url,
        site_url: channel.site_url,
        entries,
        skipped,
    })
}

fn check_root(e: &BytesStart<'_>) -> Result<(), FeedError> {
    match e.local_name().as_ref() {
        b"rss" => Ok(()),
        other => Err(FeedError::UnsupportedFeedType(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

fn is_prefixed_link(e: &BytesStart<'_>) -> bool {
    let name = e.name();
    name.prefix().is_some() && name.local_name().as_ref() == b"link"
}

fn take_self_link(
    e: &BytesStart<'_>,
    decoder: quick_xml::encoding::Decoder,
    channel: &mut ChannelDraft,
) -> Result<(), FeedError> {
    let link = read_link(e, decoder)?;
    if link.is_self() && !link.href.is_empty() {
        channel.self_url = link.href;
    }
    Ok(())
}

fn apply(field: Field, text: String, channel: &mut ChannelDraft, item: Option<&mut EntryDraft>) {
    match (field, item) {
        (Field::ChannelTitle, _) => channel.title = text,
        // First channel link wins
        (Field::ChannelLink, _) => {
            if channel.site_url.is_empty() {
                channel.site_url = text;
            }
        }
        (Field::ItemTitle, Some(item)) => item.title = text,
        (Field::ItemDescription, Some(item)) => item.content = text,
        (Field::ItemPubDate, Some(item)) => item.published = text,
        (Field::ItemLink, Some(item)) => item.link = text,
        (Field::ItemAuthor, Some(item)) => {
            if item.author.is_empty() {
                item.author = text;
            }
        }
        (_, None) => {}
    }
}
