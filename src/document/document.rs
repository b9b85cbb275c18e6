//! Backend-native document structure.

use serde::{Deserialize, Serialize};

use crate::document::field::{Field, FieldIndex};
use crate::document::selector::FieldSelector;

/// A document as the index backend sees it.
///
/// Field order is preserved and a name may occur any number of times.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    /// Add a field.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Add a field from its parts.
    pub fn add<N: Into<String>, V: Into<String>>(
        &mut self,
        name: N,
        value: V,
        index: FieldIndex,
        stored: bool,
    ) {
        self.fields.push(Field::new(name, value, index, stored));
    }

    /// First stored value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.stored && f.name == name)
            .map(|f| f.value.as_str())
    }

    /// All stored values of `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.stored && f.name == name)
            .map(|f| f.value.as_str())
            .collect()
    }

    /// Check if the document has a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// All fields.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of this document holding only the stored fields `selector` accepts.
    pub fn select(&self, selector: &FieldSelector) -> Document {
        Document {
            fields: self
                .fields
                .iter()
                .filter(|f| f.stored && selector.accepts(&f.name))
                .cloned()
                .collect(),
        }
    }

    /// Copy of this document without unstored fields.
    pub(crate) fn stored_only(&self) -> Document {
        Document {
            fields: self.fields.iter().filter(|f| f.stored).cloned().collect(),
        }
    }

    /// Create a builder for constructing documents.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }
}

/// A builder for constructing documents in a fluent manner.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Create a new document builder.
    pub fn new() -> Self {
        DocumentBuilder {
            document: Document::new(),
        }
    }

    /// Add a stored, analyzed field.
    pub fn add_text<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.document.add_field(Field::text(name, value));
        self
    }

    /// Add a stored field indexed verbatim.
    pub fn add_keyword<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.document.add_field(Field::keyword(name, value));
        self
    }

    /// Add an arbitrary field.
    pub fn add_field(mut self, field: Field) -> Self {
        self.document.add_field(field);
        self
    }

    /// Build the final document.
    pub fn build(self) -> Document {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_values() {
        let doc = Document::builder()
            .add_text("name", "Foo")
            .add_text("name", "Bar")
            .add_field(Field::new("hidden", "x", FieldIndex::Analyzed, false))
            .build();

        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get("name"), Some("Foo"));
        assert_eq!(doc.get_all("name"), vec!["Foo", "Bar"]);
        assert!(doc.has_field("hidden"));
        assert_eq!(doc.get("hidden"), None);
    }

    #[test]
    fn test_document_select() {
        let doc = Document::builder()
            .add_keyword("_pk", "a")
            .add_text("name", "Foo")
            .add_text("kind", "class")
            .build();

        let selected = doc.select(&FieldSelector::of(["name"]));
        assert_eq!(selected.get("name"), Some("Foo"));
        assert_eq!(selected.get("_pk"), Some("a"));
        assert_eq!(selected.get("kind"), None);

        let all = doc.select(&FieldSelector::all());
        assert_eq!(all.len(), 3);
    }
}
