// --- XML Tree ---

/// An element of the parsed JMdict document.
///
/// Only what the converter needs is kept: the element name, its attributes in
/// document order, the concatenated character data directly inside it, and its
/// child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        XmlElement {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Direct children with the given element name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Whether any direct child has the given element name.
    pub fn has_child(&self, name: &str) -> bool {
        self.children.iter().any(|c| c.name == name)
    }

    /// Whether any attribute of this element has exactly this value.
    pub fn has_attribute_value(&self, value: &str) -> bool {
        self.attributes.iter().any(|(_, v)| v == value)
    }

    /// Visits this element and every descendant, depth-first, parents before
    /// children, in document order.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a XmlElement)) {
        let mut pending = vec![self];
        while let Some(element) = pending.pop() {
            visit(element);
            pending.extend(element.children.iter().rev());
        }
    }
}

// --- Output Rows ---

/// One row of the `entry` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub id: i64,
    pub kanji: String,
    pub reading: String,
    pub gloss: String,
    pub position: String,
}

/// Counters reported at the end of a conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub converted: u64,
    pub not_converted: u64,
}

impl ConversionStats {
    /// Number of top-level entries seen.
    pub fn total(&self) -> u64 {
        self.converted + self.not_converted
    }
}
