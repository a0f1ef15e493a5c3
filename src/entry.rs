//! Turns one `<entry>` element into an `entry` table row.
//!
//! Every descendant of the entry is visited once and dispatched on its name.
//! The collected fields live only for the duration of one entry.

use crate::models::{EntryRow, XmlElement};
use log::warn;

/// Canonical JMdict code for English glosses.
pub const ENGLISH: &str = "eng";

/// Separator placed between joined field values.
const SEPARATOR: &str = ", ";

/// Normalizes a requested gloss language.
///
/// English and the empty string both mean "unset": glosses are then collected
/// regardless of their language tag.
pub fn normalize_language(lang: Option<&str>) -> Option<String> {
    match lang.map(str::trim) {
        None | Some("") | Some(ENGLISH) => None,
        Some(code) => Some(code.to_string()),
    }
}

/// The top-level `<entry>` elements of a JMdict document.
pub fn top_level_entries(root: &XmlElement) -> impl Iterator<Item = &XmlElement> {
    root.children_named("entry")
}

/// Appends `text` to `acc`, separated by ", " when both are non-empty.
pub fn push_joined(acc: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !acc.is_empty() {
        acc.push_str(SEPARATOR);
    }
    acc.push_str(text);
}

/// Working values collected while walking one entry.
#[derive(Debug, Default)]
struct EntryFields {
    seq: Option<String>,
    kanji: String,
    reading: String,
    gloss: String,
    gloss_en: String,
    position: String,
}

impl EntryFields {
    fn visit(&mut self, element: &XmlElement, lang: Option<&str>) {
        match element.name.as_str() {
            "ent_seq" => self.seq = Some(element.text.clone()),
            "k_ele" => {
                for keb in element.children_named("keb") {
                    push_joined(&mut self.kanji, &keb.text);
                }
            }
            "r_ele" => {
                let element_restricted = element.has_child("re_restr");
                for reb in element.children_named("reb") {
                    if element_restricted || reb.has_child("re_restr") {
                        continue;
                    }
                    push_joined(&mut self.reading, &reb.text);
                }
            }
            "sense" => {
                for gloss in element.children_named("gloss") {
                    match lang {
                        None => push_joined(&mut self.gloss, &gloss.text),
                        Some(code) => {
                            if gloss.has_attribute_value(code) {
                                push_joined(&mut self.gloss, &gloss.text);
                            }
                            if gloss.has_attribute_value(ENGLISH) {
                                push_joined(&mut self.gloss_en, &gloss.text);
                            }
                        }
                    }
                }
                for pos in element.children_named("pos") {
                    push_joined(&mut self.position, &pos.text);
                }
            }
            _ => {}
        }
    }

    /// The sequence number, if present, numeric and non-zero.
    fn id(&self) -> Option<i64> {
        let seq = self.seq.as_deref()?.trim();
        match seq.parse::<i64>() {
            Ok(0) => None,
            Ok(id) => Some(id),
            Err(_) => {
                if !seq.is_empty() {
                    warn!("Ignoring entry with non-numeric ent_seq '{}'", seq);
                }
                None
            }
        }
    }

    fn into_row(self) -> Option<EntryRow> {
        let id = self.id()?;
        if self.position.is_empty() {
            return None;
        }
        let gloss = if self.gloss.is_empty() {
            self.gloss_en
        } else {
            self.gloss
        };
        Some(EntryRow {
            id,
            kanji: self.kanji,
            reading: self.reading,
            gloss,
            position: self.position,
        })
    }
}

/// Builds the row for one `<entry>` element.
///
/// `lang` must already be normalized with [`normalize_language`]. Returns
/// `None` when the entry has no usable sequence number or no part of speech;
/// such entries are not stored.
pub fn extract_entry(entry: &XmlElement, lang: Option<&str>) -> Option<EntryRow> {
    let mut fields = EntryFields::default();
    entry.walk(|element| fields.visit(element, lang));
    fields.into_row()
}
