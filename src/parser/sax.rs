//! Namespace-aware event source
//!
//! [`SaxReader`] reads an XML document with quick-xml and reports it to a
//! [`ContentHandler`] as a stream of start/characters/end events with
//! namespace URIs already resolved. Namespace declarations are reported
//! as prefix mappings just before the element that declares them and
//! ended just after it closes.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName as XmlName, ResolveResult};
use quick_xml::NsReader;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::QName;

/// An attribute as delivered with a start-element event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaxAttribute {
    /// Resolved name
    pub name: QName,
    /// Name as written, with its prefix
    pub qualified_name: String,
    /// Unescaped value
    pub value: String,
}

/// Receiver of document events
pub trait ContentHandler {
    /// Called once before any other event
    fn start_document(&mut self) -> Result<()> {
        Ok(())
    }

    /// A prefix (empty for the default namespace) comes into scope
    fn start_prefix_mapping(&mut self, _prefix: &str, _uri: &str) -> Result<()> {
        Ok(())
    }

    /// A prefix goes out of scope
    fn end_prefix_mapping(&mut self, _prefix: &str) -> Result<()> {
        Ok(())
    }

    /// An element opens
    fn start_element(&mut self, name: &QName, attributes: &[SaxAttribute]) -> Result<()>;

    /// Character data inside the current element
    fn characters(&mut self, text: &str) -> Result<()>;

    /// An element closes
    fn end_element(&mut self, name: &QName) -> Result<()>;

    /// Called once after the root element closed
    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Streams XML documents into a [`ContentHandler`]
#[derive(Debug, Clone, Default)]
pub struct SaxReader {
    limits: Limits,
}

impl SaxReader {
    /// Create a reader with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the processing limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Read a document from a string
    pub fn parse_str<H: ContentHandler + ?Sized>(&self, xml: &str, handler: &mut H) -> Result<()> {
        self.limits.check_xml_size(xml.len())?;
        self.parse_reader(xml.as_bytes(), handler)
    }

    /// Read a document from a buffered reader
    pub fn parse_reader<R: BufRead, H: ContentHandler + ?Sized>(&self, source: R, handler: &mut H) -> Result<()> {
        let mut reader = NsReader::from_reader(source);
        reader.trim_text(false);

        let mut buf = Vec::new();
        let mut declared: Vec<Vec<String>> = Vec::new();
        let mut started = false;

        handler.start_document()?;
        loop {
            let event = reader.read_event_into(&mut buf);
            match event.map_err(|e| Error::Xml(format!("error at position {}: {}", reader.buffer_position(), e)))? {
                Event::Start(ref e) => {
                    started = true;
                    let prefixes = start(&reader, e, handler)?;
                    declared.push(prefixes);
                }
                Event::Empty(ref e) => {
                    started = true;
                    let prefixes = start(&reader, e, handler)?;
                    let name = resolve_element(&reader, e.name())?;
                    handler.end_element(&name)?;
                    end_mappings(&prefixes, handler)?;
                }
                Event::End(ref e) => {
                    let name = resolve_element(&reader, e.name())?;
                    handler.end_element(&name)?;
                    if let Some(prefixes) = declared.pop() {
                        end_mappings(&prefixes, handler)?;
                    }
                }
                Event::Text(ref e) => {
                    if !declared.is_empty() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("failed to unescape text: {}", e)))?;
                        handler.characters(&text)?;
                    }
                }
                Event::CData(e) => {
                    if !declared.is_empty() {
                        let text = String::from_utf8(e.into_inner().into_owned())
                            .map_err(|e| Error::Xml(format!("invalid CDATA section: {}", e)))?;
                        handler.characters(&text)?;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            self.limits.check_xml_size(reader.buffer_position())?;
            buf.clear();
        }

        if !started {
            return Err(Error::Xml("document has no root element".to_string()));
        }
        if !declared.is_empty() {
            return Err(Error::Xml("document ended inside an element".to_string()));
        }
        handler.end_document()
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::Xml(format!("invalid UTF-8 in name: {}", e)))
}

fn namespace_of(result: ResolveResult<'_>) -> Result<Option<String>> {
    match result {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())?.to_string())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(Error::Namespace(format!(
            "undeclared namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn resolve_element<R>(reader: &NsReader<R>, name: XmlName<'_>) -> Result<QName> {
    let (ns, local) = reader.resolve_element(name);
    Ok(QName::new(namespace_of(ns)?, utf8(local.as_ref())?))
}

/// Report the prefix mappings and start tag of `e`; returns declared prefixes
fn start<R, H: ContentHandler + ?Sized>(reader: &NsReader<R>, e: &BytesStart<'_>, handler: &mut H) -> Result<Vec<String>> {
    let mut prefixes = Vec::new();
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::Xml(format!("failed to parse attribute: {}", e)))?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("failed to unescape attribute value: {}", e)))?
            .into_owned();

        if key == "xmlns" {
            handler.start_prefix_mapping("", &value)?;
            prefixes.push(String::new());
            continue;
        }
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            handler.start_prefix_mapping(prefix, &value)?;
            prefixes.push(prefix.to_string());
            continue;
        }

        let (ns, local) = reader.resolve_attribute(attr.key);
        attributes.push(SaxAttribute {
            name: QName::new(namespace_of(ns)?, utf8(local.as_ref())?),
            qualified_name: key.to_string(),
            value,
        });
    }

    let name = resolve_element(reader, e.name())?;
    handler.start_element(&name, &attributes)?;
    Ok(prefixes)
}

fn end_mappings<H: ContentHandler + ?Sized>(prefixes: &[String], handler: &mut H) -> Result<()> {
    for prefix in prefixes.iter().rev() {
        handler.end_prefix_mapping(prefix)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ContentHandler for Recorder {
        fn start_document(&mut self) -> Result<()> {
            self.events.push("start-doc".into());
            Ok(())
        }

        fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
            self.events.push(format!("map {}={}", prefix, uri));
            Ok(())
        }

        fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()> {
            self.events.push(format!("unmap {}", prefix));
            Ok(())
        }

        fn start_element(&mut self, name: &QName, attributes: &[SaxAttribute]) -> Result<()> {
            let attrs: Vec<String> = attributes.iter().map(|a| format!("{}={}", a.name, a.value)).collect();
            self.events.push(format!("<{} {}>", name, attrs.join(",")));
            Ok(())
        }

        fn characters(&mut self, text: &str) -> Result<()> {
            self.events.push(format!("text {:?}", text));
            Ok(())
        }

        fn end_element(&mut self, name: &QName) -> Result<()> {
            self.events.push(format!("</{}>", name));
            Ok(())
        }

        fn end_document(&mut self) -> Result<()> {
            self.events.push("end-doc".into());
            Ok(())
        }
    }

    #[test]
    fn test_events_with_namespaces() {
        let xml = r#"<p:order xmlns:p="urn:po" id="7"><p:item p:code="a">x &amp; y</p:item><note/></p:order>"#;
        let mut recorder = Recorder::default();
        SaxReader::new().parse_str(xml, &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec![
                "start-doc",
                "map p=urn:po",
                "<{urn:po}order id=7>",
                "<{urn:po}item {urn:po}code=a>",
                "text \"x & y\"",
                "</{urn:po}item>",
                "<note >",
                "</note>",
                "</{urn:po}order>",
                "unmap p",
                "end-doc",
            ]
        );
    }

    #[test]
    fn test_unknown_prefix_is_an_error() {
        let mut recorder = Recorder::default();
        let result = SaxReader::new().parse_str("<x:root/>", &mut recorder);
        assert!(matches!(result, Err(Error::Namespace(_))));
    }

    #[test]
    fn test_size_limit() {
        let limits = Limits {
            max_xml_size: 8,
            ..Limits::default()
        };
        let mut recorder = Recorder::default();
        let result = SaxReader::new()
            .with_limits(limits)
            .parse_str("<root>too long</root>", &mut recorder);
        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_empty_document() {
        let mut recorder = Recorder::default();
        assert!(SaxReader::new().parse_str("  ", &mut recorder).is_err());
    }
}
