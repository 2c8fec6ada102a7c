//! Owned markup events and attribute lists.
//!
//! quick-xml events borrow the read buffer; the builder needs attributes
//! that outlive one event (templates for `<use>` replay them later), so
//! everything is copied into these owned forms first.

use quick_xml::events::BytesStart;

use crate::SvgLength;

/// Attributes of one element, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the attributes of a start tag. Unescapable values fall back
    /// to their raw text; malformed attributes are dropped.
    pub fn from_event(e: &BytesStart<'_>) -> Self {
        let entries = e
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                let value = match attr.unescape_value() {
                    Ok(v) => v.to_string(),
                    Err(_) => String::from_utf8_lossy(&attr.value).to_string(),
                };
                (key, value)
            })
            .collect();
        Self { entries }
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            entries: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `href`, falling back to the legacy `xlink:href`.
    pub fn href(&self) -> Option<&str> {
        self.get("href").or_else(|| self.get("xlink:href"))
    }

    /// Target id of a local `#id` reference in `href`.
    pub fn href_id(&self) -> Option<&str> {
        self.href().and_then(|h| h.trim().strip_prefix('#'))
    }

    /// Length attribute in user units. Percentages resolve against
    /// `reference`.
    pub fn length(&self, name: &str, reference: f32) -> Option<f32> {
        self.get(name)
            .and_then(SvgLength::parse)
            .map(|l| l.to_px(reference, 16.0))
            .filter(|v| v.is_finite())
    }

    /// Length attribute, `0` when absent or invalid.
    pub fn length_or_zero(&self, name: &str) -> f32 {
        self.length(name, 0.0).unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One recorded markup event.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupEvent {
    Start { name: String, attributes: Attributes },
    End { name: String },
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;
    use quick_xml::Reader;

    #[test]
    fn test_from_event_unescapes() {
        let mut reader = Reader::from_str(r##"<rect id="a&amp;b" width="10px" xlink:href="#t"/>"##);
        let mut buf = Vec::new();
        let attrs = match reader.read_event_into(&mut buf).unwrap() {
            Event::Empty(e) => Attributes::from_event(&e),
            other => panic!("unexpected event {other:?}"),
        };

        assert_eq!(attrs.get("id"), Some("a&b"));
        assert_eq!(attrs.length("width", 0.0), Some(10.0));
        assert_eq!(attrs.href_id(), Some("t"));
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn test_lengths() {
        let attrs = Attributes::from_pairs([("x", "50%"), ("y", "nope")]);
        assert_eq!(attrs.length("x", 200.0), Some(100.0));
        assert_eq!(attrs.length("y", 200.0), None);
        assert_eq!(attrs.length_or_zero("missing"), 0.0);
    }
}
