use crate::error::{JmdictError, Result};
use crate::models::XmlElement;
use log::debug;
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

/// Entities declared in the document's internal DTD subset, by name.
type EntityMap = HashMap<String, String>;

/// Deepest element nesting accepted. JMdict itself never goes past five
/// levels; the limit keeps the tree shallow enough to drop and compare on
/// any thread's stack.
pub const MAX_DEPTH: usize = 256;

/// Parses a JMdict XML document into an in-memory element tree and returns
/// the root element.
///
/// Custom entities declared in the DOCTYPE (JMdict uses them for every
/// part-of-speech and misc tag) are expanded in text and attribute values.
pub fn parse_document(xml: &str) -> Result<XmlElement> {
    debug!("Starting JMdict XML parsing ({} bytes)...", xml.len());
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entities = EntityMap::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|source| malformed(&reader, source))?;

        match event {
            Event::DocType(doctype) => {
                let declarations = String::from_utf8_lossy(&doctype);
                capture_entities(&declarations, &mut entities);
                debug!("Captured {} entity declarations from DOCTYPE.", entities.len());
            }
            Event::Start(ref start) => {
                let element =
                    start_element(start, &entities).map_err(|source| malformed(&reader, source))?;
                if stack.len() >= MAX_DEPTH {
                    return Err(JmdictError::MalformedDocument(format!(
                        "element <{}> nested deeper than {} levels",
                        element.name, MAX_DEPTH
                    )));
                }
                stack.push(element);
            }
            Event::Empty(ref start) => {
                let element =
                    start_element(start, &entities).map_err(|source| malformed(&reader, source))?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::End(ref end) => {
                let element = stack.pop().ok_or_else(|| {
                    JmdictError::MalformedDocument(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(end.name().as_ref())
                    ))
                })?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::Text(ref text) => {
                if let Some(current) = stack.last_mut() {
                    let unescaped = text
                        .unescape_with(|name| resolve_entity(&entities, name))
                        .map_err(|source| malformed(&reader, source))?;
                    current.text.push_str(&unescaped);
                }
            }
            Event::CData(ref cdata) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(cdata));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(JmdictError::MalformedDocument(format!(
            "unclosed element <{}>",
            open.name
        )));
    }

    let root = root
        .ok_or_else(|| JmdictError::MalformedDocument("document has no root element".to_string()))?;
    debug!(
        "Successfully parsed XML document with root <{}> ({} children).",
        root.name,
        root.children.len()
    );
    Ok(root)
}

fn malformed(reader: &Reader<&[u8]>, source: quick_xml::Error) -> JmdictError {
    JmdictError::MalformedInput {
        position: reader.buffer_position() as u64,
        source,
    }
}

fn resolve_entity<'a>(entities: &'a EntityMap, name: &str) -> Option<&'a str> {
    entities
        .get(name)
        .map(String::as_str)
        .or_else(|| resolve_predefined_entity(name))
}

fn start_element(
    start: &BytesStart,
    entities: &EntityMap,
) -> std::result::Result<XmlElement, quick_xml::Error> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value_with(|name| resolve_entity(entities, name))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Hands a completed element to its parent, or makes it the document root.
fn attach(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(JmdictError::MalformedDocument(format!(
                "multiple root elements (found <{}> after the root)",
                element.name
            )));
        }
    }
    Ok(())
}

/// Extracts internal general entity declarations (`<!ENTITY name "value">`)
/// from the body of a DOCTYPE into `entities`. Parameter and external
/// entities are ignored.
///
/// References inside a value are expanded against the predefined entities
/// and the entities declared before it. The first declaration of a name wins.
fn capture_entities(doctype: &str, entities: &mut EntityMap) {
    for (name, raw) in doctype
        .split("<!ENTITY")
        .skip(1)
        .filter_map(parse_entity_declaration)
    {
        let value = match unescape_with(&raw, |reference| resolve_entity(entities, reference)) {
            Ok(value) => value.into_owned(),
            Err(e) => {
                debug!("Keeping entity '{}' unexpanded: {}", name, e);
                raw.clone()
            }
        };
        entities.entry(name).or_insert(value);
    }
}

fn parse_entity_declaration(decl: &str) -> Option<(String, String)> {
    let decl = decl.trim_start();
    if decl.starts_with('%') {
        return None;
    }
    let name_end = decl.find(char::is_whitespace)?;
    let (name, rest) = decl.split_at(name_end);
    let rest = rest.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &rest[quote.len_utf8()..];
    let value_end = body.find(quote)?;
    Some((name.to_string(), body[..value_end].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_JMDICT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE JMdict [
<!ELEMENT JMdict (entry*)>
<!ENTITY n "noun (common) (futsuumeishi)">
<!ENTITY v5r 'Godan verb with `ru&apos; ending'>
<!ENTITY % local.stuff "ignored">
]>
<JMdict>
<!-- JMdict created: 2024-01-01 -->
<entry>
<ent_seq>1000000</ent_seq>
<k_ele>
<keb>猫</keb>
</k_ele>
<r_ele>
<reb>ねこ</reb>
</r_ele>
<sense>
<pos>&n;</pos>
<pos>&v5r;</pos>
<gloss xml:lang="eng">cat</gloss>
<gloss xml:lang="fre">chat</gloss>
</sense>
</entry>
</JMdict>
"#;

    #[test]
    fn test_parse_minimal_jmdict() {
        let result = parse_document(MINIMAL_JMDICT_XML);
        assert!(result.is_ok(), "Parsing failed: {:?}", result.err());
        let root = result.unwrap();
        assert_eq!(root.name, "JMdict");
        assert_eq!(root.children.len(), 1);

        let entry = &root.children[0];
        assert_eq!(entry.name, "entry");
        let seq = entry.children_named("ent_seq").next().unwrap();
        assert_eq!(seq.text, "1000000");

        let sense = entry.children_named("sense").next().unwrap();
        let pos = sense.children_named("pos").next().unwrap();
        assert_eq!(pos.text, "noun (common) (futsuumeishi)");
        let verb_pos = sense.children_named("pos").nth(1).unwrap();
        assert_eq!(verb_pos.text, "Godan verb with `ru' ending");

        let glosses: Vec<_> = sense.children_named("gloss").collect();
        assert_eq!(glosses.len(), 2);
        assert_eq!(
            glosses[1].attributes,
            vec![("xml:lang".to_string(), "fre".to_string())]
        );
        assert_eq!(glosses[1].text, "chat");
    }

    #[test]
    fn test_capture_entities() {
        let doctype = r#" JMdict [
<!ENTITY n "noun (common) (futsuumeishi)">
<!ENTITY   adj-i  'adjective (keiyoushi)'>
<!ENTITY % param "skipped">
<!ENTITY ext SYSTEM "http://example.com/ext.xml">
<!ENTITY n "redeclared">
]"#;
        let mut entities = EntityMap::new();
        capture_entities(doctype, &mut entities);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities["n"], "noun (common) (futsuumeishi)");
        assert_eq!(entities["adj-i"], "adjective (keiyoushi)");
    }

    #[test]
    fn test_entity_values_are_expanded() {
        let doctype = r#" JMdict [
<!ENTITY v5r 'Godan verb with `ru&apos; ending'>
<!ENTITY amp-ish "fish &amp; chips &#x732B;">
<!ENTITY both "&v5r; / &amp-ish;">
<!ENTITY early "&later;">
<!ENTITY later "defined after use">
]"#;
        let mut entities = EntityMap::new();
        capture_entities(doctype, &mut entities);
        assert_eq!(entities["v5r"], "Godan verb with `ru' ending");
        assert_eq!(entities["amp-ish"], "fish & chips 猫");
        assert_eq!(entities["both"], "Godan verb with `ru' ending / fish & chips 猫");
        // Forward references can't be resolved yet and stay as written.
        assert_eq!(entities["early"], "&later;");
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = 200_000;
        let xml = format!(
            "<JMdict><entry><ent_seq>1</ent_seq><sense><pos>n</pos></sense>{}{}</entry></JMdict>",
            "<x>".repeat(depth),
            "</x>".repeat(depth)
        );
        let result = parse_document(&xml);
        assert!(
            matches!(result, Err(JmdictError::MalformedDocument(_))),
            "Expected MalformedDocument, got {:?}",
            result.map(|root| root.name)
        );
    }

    #[test]
    fn test_nesting_up_to_the_limit_is_accepted() {
        // Root and entry take two levels.
        let depth = MAX_DEPTH - 2;
        let xml = format!(
            "<JMdict><entry><ent_seq>1</ent_seq><sense><pos>n</pos></sense>{}{}</entry></JMdict>",
            "<x>".repeat(depth),
            "</x>".repeat(depth)
        );
        let root = parse_document(&xml).unwrap();
        let row = crate::entry::extract_entry(&root.children[0], None).unwrap();
        assert_eq!(row.id, 1);
        assert_eq!(row.position, "n");
    }

    #[test]
    fn test_predefined_and_numeric_references() {
        let xml = r#"<root><entry><gloss g_type="a&amp;b">fish &amp; chips &#x732B;</gloss></entry></root>"#;
        let root = parse_document(xml).unwrap();
        let gloss = &root.children[0].children[0];
        assert_eq!(gloss.text, "fish & chips 猫");
        assert!(gloss.has_attribute_value("a&b"));
    }

    #[test]
    fn test_cdata_is_text() {
        let xml = "<root><entry><keb><![CDATA[<犬>]]></keb></entry></root>";
        let root = parse_document(xml).unwrap();
        assert_eq!(root.children[0].children[0].text, "<犬>");
    }

    #[test]
    fn test_unknown_entity_is_malformed() {
        let xml = "<root><entry><pos>&nope;</pos></entry></root>";
        let result = parse_document(xml);
        assert!(
            matches!(result, Err(JmdictError::MalformedInput { .. })),
            "Expected MalformedInput, got {:?}",
            result
        );
    }

    #[test]
    fn test_mismatched_tags_are_malformed() {
        let result = parse_document("<root><entry></root>");
        assert!(matches!(result, Err(JmdictError::MalformedInput { .. })));
    }

    #[test]
    fn test_unclosed_document_is_rejected() {
        let result = parse_document("<root><entry>");
        assert!(matches!(
            result,
            Err(JmdictError::MalformedInput { .. } | JmdictError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_document_without_root() {
        let result = parse_document("<?xml version=\"1.0\"?>\n<!-- nothing -->\n");
        assert!(matches!(result, Err(JmdictError::MalformedDocument(_))));
    }

    #[test]
    fn test_multiple_roots_are_rejected() {
        let result = parse_document("<a/><b/>");
        assert!(matches!(result, Err(JmdictError::MalformedDocument(_))));
    }
}
