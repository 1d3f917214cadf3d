//! Mongo constraints: BSON filter-document fragments.

use mongodb::bson::{doc, Document};

use crate::query::Constraint;

/// A compiled MongoDB predicate.
///
/// Wraps the native filter document. The empty document is the match-all
/// neutral; match-none is expressed as a filter no document can satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct MongoConstraint {
    filter: Document,
}

impl MongoConstraint {
    pub(crate) fn new(filter: Document) -> Self {
        MongoConstraint { filter }
    }

    pub(crate) fn match_none_filter() -> Document {
        doc! { "_id": { "$exists": false } }
    }

    /// The native filter document.
    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub(crate) fn into_document(self) -> Document {
        self.filter
    }
}

impl Constraint for MongoConstraint {
    fn is_match_all(&self) -> bool {
        self.filter.is_empty()
    }

    fn is_match_none(&self) -> bool {
        self.filter == Self::match_none_filter()
    }
}
