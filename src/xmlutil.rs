//! Small XML helpers shared by the stream encoders and decoders.

use crate::error::{OpcError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Escape XML special characters.
#[inline]
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Collect the text content of the element whose start tag was just read,
/// consuming events up to and including the matching end tag.
pub(crate) fn read_element_text(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
) -> Result<String> {
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        buf.clear();
        match reader.read_event_into(buf) {
            Ok(Event::Text(e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| OpcError::Xml(format!("text decode error: {e}")))?;
                text.push_str(&unescaped);
            }
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpcError::Xml(format!("XML parse error: {e}"))),
            _ => {}
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"<foo & "bar">"#),
            "&lt;foo &amp; &quot;bar&quot;&gt;"
        );
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_read_element_text() {
        let xml: &[u8] = b"<root><a>hello &amp; bye</a></root>";
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(ref e) if e.local_name().as_ref() == b"a" => {
                    let mut inner = Vec::new();
                    let text = read_element_text(&mut reader, &mut inner).unwrap();
                    assert_eq!(text, "hello & bye");
                    return;
                }
                Event::Eof => panic!("element not found"),
                _ => {}
            }
            buf.clear();
        }
    }
}
