//! Document classes — how fetched records are materialized.
//!
//! A binding carries one [`DocumentClass`]. Every document a collection hands
//! back is wrapped in a [`Record`] tagged with that class, after the class's
//! factory has had a chance to reshape the fields.

use mongodb::bson::Document;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Name of the generic record type used when no override is configured.
pub const GENERIC_CLASS: &str = "dict";

type Factory = dyn Fn(Document) -> Document + Send + Sync;

/// Factory type substituted for the generic record type.
///
/// Classes compare by name, so two bindings configured with the same
/// registered class produce records of the same class.
#[derive(Clone)]
pub struct DocumentClass {
    name: Arc<str>,
    factory: Option<Arc<Factory>>,
}

impl DocumentClass {
    /// The generic record type.
    pub fn generic() -> Self {
        Self::new(GENERIC_CLASS)
    }

    /// A named class that keeps fields as-is.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            factory: None,
        }
    }

    /// A named class whose factory reshapes fields on materialization.
    pub fn with_factory<F>(name: &str, factory: F) -> Self
    where
        F: Fn(Document) -> Document + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            factory: Some(Arc::new(factory)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_generic(&self) -> bool {
        &*self.name == GENERIC_CLASS
    }

    /// Build a record of this class from a raw driver document.
    pub fn materialize(&self, fields: Document) -> Record {
        let fields = match &self.factory {
            Some(factory) => factory(fields),
            None => fields,
        };
        Record {
            class: self.clone(),
            fields,
        }
    }
}

impl Default for DocumentClass {
    fn default() -> Self {
        Self::generic()
    }
}

impl PartialEq for DocumentClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DocumentClass {}

impl fmt::Debug for DocumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentClass")
            .field("name", &self.name)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

impl fmt::Display for DocumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A fetched document, materialized through a [`DocumentClass`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    class: DocumentClass,
    fields: Document,
}

impl Record {
    pub fn class(&self) -> &DocumentClass {
        &self.class
    }

    pub fn into_document(self) -> Document {
        self.fields
    }
}

impl Deref for Record {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.fields
    }
}

impl DerefMut for Record {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.fields
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn default_is_generic() {
        let class = DocumentClass::default();
        assert!(class.is_generic());
        assert_eq!(class, DocumentClass::generic());
        assert_eq!(class.to_string(), "dict");
    }

    #[test]
    fn classes_compare_by_name() {
        let a = DocumentClass::new("CustomDict");
        let b = DocumentClass::with_factory("CustomDict", |d| d);
        assert_eq!(a, b);
        assert_ne!(a, DocumentClass::generic());
    }

    #[test]
    fn materialize_tags_record() {
        let class = DocumentClass::new("CustomDict");
        let record = class.materialize(doc! { "_id": "thing", "val": "foo" });
        assert_eq!(record.class().name(), "CustomDict");
        assert_eq!(record.get_str("val").unwrap(), "foo");
    }

    #[test]
    fn factory_reshapes_fields() {
        let class = DocumentClass::with_factory("Stamped", |mut d| {
            d.insert("stamped", true);
            d
        });
        let record = class.materialize(doc! { "_id": 1 });
        assert!(record.get_bool("stamped").unwrap());
        assert_eq!(record.into_document().len(), 2);
    }
}
