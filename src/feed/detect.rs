use quick_xml::events::Event;
use quick_xml::Reader;

use super::error::FeedError;

/// Returns the local name of the first start element in `bytes`.
///
/// Only tokenizes up to that element, so detection stays cheap on large
/// documents and tolerant of damage further down the stream.
///
/// # Errors
///
/// [`FeedError::MalformedDocument`] if the stream ends or fails to tokenize
/// before any start element appears.
pub fn detect_root(bytes: &[u8]) -> Result<String, FeedError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => {
                return Err(FeedError::MalformedDocument(
                    "no start element before end of stream".to_owned(),
                ));
            }
            Err(e) => return Err(FeedError::malformed(e)),
            Ok(_) => {}
        }
        buf.clear();
    }
}
