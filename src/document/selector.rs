//! Field selectors: which stored fields a query materializes.

use ahash::AHashSet;

use crate::document::PRIMARY_KEY_FIELD;

/// A read-optimization hint restricting the stored fields a query loads.
///
/// Omitted fields are simply absent from the loaded document. The primary
/// key field is always loaded.
#[derive(Debug, Clone, Default)]
pub struct FieldSelector {
    fields: Option<AHashSet<String>>,
}

impl FieldSelector {
    /// Load every stored field.
    pub fn all() -> Self {
        FieldSelector { fields: None }
    }

    /// Load only `fields` (plus the primary key). An empty list loads everything.
    pub fn of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: AHashSet<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            Self::all()
        } else {
            FieldSelector {
                fields: Some(fields),
            }
        }
    }

    /// Whether this selector loads every field.
    pub fn is_all(&self) -> bool {
        self.fields.is_none()
    }

    /// Whether the field `name` is loaded.
    pub fn accepts(&self, name: &str) -> bool {
        match &self.fields {
            None => true,
            Some(fields) => name == PRIMARY_KEY_FIELD || fields.contains(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_all() {
        let selector = FieldSelector::all();
        assert!(selector.is_all());
        assert!(selector.accepts("anything"));
    }

    #[test]
    fn test_selector_of() {
        let selector = FieldSelector::of(["name", "kind"]);
        assert!(!selector.is_all());
        assert!(selector.accepts("name"));
        assert!(selector.accepts(PRIMARY_KEY_FIELD));
        assert!(!selector.accepts("other"));
    }

    #[test]
    fn test_selector_empty_loads_all() {
        let selector = FieldSelector::of(Vec::<String>::new());
        assert!(selector.is_all());
    }
}
