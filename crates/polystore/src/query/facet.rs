//! Facet results shared by the aggregating backends.

/// One executed term facet: the facet name plus its `(term, count)` rows,
/// most frequent first.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetResult {
    /// The name the facet was registered under.
    pub name: String,
    /// Distinct terms with their match counts.
    pub terms: Vec<(String, u64)>,
}
