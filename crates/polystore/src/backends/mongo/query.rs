//! The fluent entity query builder for MongoDB.

use mongodb::bson::{doc, Bson, Document};
use tokio_util::sync::CancellationToken;

use crate::error::{BackendError, StoreResult};
use crate::query::{
    FacetResult, FilterFactory, QueryCompiler, QueryField, QueryState, SortOrder, Value,
};
use crate::schema::{EntityDescriptor, Field};

use super::client::Mongo;
use super::constraint::MongoConstraint;
use super::ops::Finder;
use super::FILTERS;

/// A term facet: counts the distinct values of one field across all matches.
#[derive(Debug, Clone, PartialEq)]
pub struct MongoFacet {
    name: String,
    field: Field,
}

impl MongoFacet {
    /// Creates a facet counting the values of `field`, reported under `name`.
    pub fn terms(name: impl Into<String>, field: Field) -> Self {
        MongoFacet {
            name: name.into(),
            field,
        }
    }
}

/// A fluent, single-use query against one MongoDB collection.
///
/// Obtained via [`Mongo::query`]; execution methods consume the builder.
pub struct MongoQuery<'a> {
    mongo: &'a Mongo,
    descriptor: &'a EntityDescriptor,
    state: QueryState<MongoConstraint>,
    facets: Vec<MongoFacet>,
}

impl<'a> MongoQuery<'a> {
    pub(crate) fn new(mongo: &'a Mongo, descriptor: &'a EntityDescriptor) -> Self {
        MongoQuery {
            mongo,
            descriptor,
            state: QueryState::default(),
            facets: Vec::new(),
        }
    }

    /// Filters on `field = value`; a Null value matches null or absent fields.
    pub fn eq(mut self, field: &Field, value: impl Into<Value>) -> Self {
        self.state.add_constraint(FILTERS.eq(field, value));
        self
    }

    /// Filters on `field = value`, skipping the constraint for Null values.
    pub fn eq_ignore_null(mut self, field: &Field, value: impl Into<Value>) -> Self {
        self.state
            .add_constraint(FILTERS.eq_ignore_null(field, value));
        self
    }

    /// Adds an arbitrary constraint (implicit AND).
    pub fn filter(mut self, constraint: MongoConstraint) -> Self {
        self.state.add_constraint(constraint);
        self
    }

    /// Compiles a free-text search over the given field specs and adds the
    /// result as one constraint.
    pub fn search(mut self, query: &str, specs: &[QueryField]) -> Self {
        let compiled = QueryCompiler::new(&FILTERS, specs).compile(query);
        self.state.add_constraint(compiled);
        self
    }

    /// Orders ascending by the given field.
    pub fn order_asc(mut self, field: &Field) -> Self {
        self.state.order_by(field.clone(), SortOrder::Ascending);
        self
    }

    /// Orders descending by the given field.
    pub fn order_desc(mut self, field: &Field) -> Self {
        self.state.order_by(field.clone(), SortOrder::Descending);
        self
    }

    /// Restricts the returned fields.
    pub fn fields(mut self, fields: &[Field]) -> Self {
        self.state.project(fields);
        self
    }

    /// Skips the first `skip` documents.
    pub fn skip(mut self, skip: usize) -> Self {
        self.state.set_skip(skip);
        self
    }

    /// Caps the number of results (0 = unbounded).
    pub fn limit(mut self, limit: usize) -> Self {
        self.state.set_limit(limit);
        self
    }

    /// Registers a facet for [`MongoQuery::execute_facets`].
    pub fn add_facet(mut self, facet: MongoFacet) -> Self {
        self.facets.push(facet);
        self
    }

    /// Streams matching documents until the predicate returns `false` or the
    /// token is cancelled; returns the number of yielded documents.
    pub async fn iterate<F>(self, cancel: &CancellationToken, predicate: F) -> StoreResult<u64>
    where
        F: FnMut(Document) -> bool + Send,
    {
        let collection = self.descriptor.relation_name().to_string();
        self.finder().each_in(&collection, cancel, predicate).await
    }

    /// Streams every matching document to the consumer.
    pub async fn iterate_all<F>(
        self,
        cancel: &CancellationToken,
        mut consumer: F,
    ) -> StoreResult<u64>
    where
        F: FnMut(Document) + Send,
    {
        self.iterate(cancel, |document| {
            consumer(document);
            true
        })
        .await
    }

    /// Counts all matches, honoring filters but ignoring projection and
    /// skip/limit pagination.
    pub async fn count(self) -> StoreResult<u64> {
        let collection = self.descriptor.relation_name().to_string();
        let finder = self.mongo.find().filter(self.combined());
        finder.count_in(&collection).await
    }

    /// Determines whether at least one document matches (identity field only,
    /// limit 1).
    pub async fn exists(self) -> StoreResult<bool> {
        let collection = self.descriptor.relation_name().to_string();
        let probe = self
            .mongo
            .find()
            .filter(self.combined())
            .select_fields(std::slice::from_ref(&Field::named("_id")));
        Ok(probe.single_in(&collection).await?.is_some())
    }

    /// Deletes every match document by document, so per-entity hooks in the
    /// owning layer can run; returns the number of deleted documents.
    pub async fn delete(self, cancel: &CancellationToken) -> StoreResult<u64> {
        self.delete_each(cancel, |_| {}).await
    }

    /// Like [`MongoQuery::delete`], invoking the callback for each document
    /// before it is deleted.
    pub async fn delete_each<F>(
        self,
        cancel: &CancellationToken,
        mut callback: F,
    ) -> StoreResult<u64>
    where
        F: FnMut(&Document) + Send,
    {
        let collection = self.descriptor.relation_name().to_string();
        let mongo = self.mongo;
        let finder = self.finder();

        let mut deleted = 0u64;
        let mut failure: Option<BackendError> = None;
        let mut pending: Vec<Bson> = Vec::new();

        finder
            .each_in(&collection, cancel, |document| {
                match document.get("_id") {
                    Some(id) => {
                        callback(&document);
                        pending.push(id.clone());
                        true
                    }
                    None => {
                        failure = Some(BackendError::ResponseFormat {
                            backend_name: "mongodb".to_string(),
                            message: format!("document in '{}' is missing _id", collection),
                        });
                        false
                    }
                }
            })
            .await?;
        if let Some(failure) = failure {
            return Err(failure.into());
        }

        for id in pending {
            if cancel.is_cancelled() {
                break;
            }
            deleted += mongo
                .delete()
                .filter(MongoConstraint::new(doc! { "_id": id }))
                .one_from(&collection)
                .await?;
        }
        Ok(deleted)
    }

    /// Bulk server-side delete of everything matching the current filters,
    /// bypassing per-entity hooks. The unsafe/fast counterpart to
    /// [`MongoQuery::delete`].
    pub async fn truncate(self) -> StoreResult<u64> {
        let collection = self.descriptor.relation_name().to_string();
        let finder = self.mongo.find().filter(self.combined());
        let deleter = finder.transfer_filters(self.mongo.delete());
        deleter.many_from(&collection).await
    }

    /// Materializes all matches into a vector, bounded by
    /// [`MAX_LIST_SIZE`](crate::query::MAX_LIST_SIZE).
    pub async fn into_vec(self) -> StoreResult<Vec<Document>> {
        self.state.verify_list_limit()?;

        let collection = self.descriptor.relation_name().to_string();
        let state = self.state.clone();
        let finder = self.finder();

        let mut documents = Vec::new();
        let mut overflow = None;
        finder
            .each_in(&collection, &CancellationToken::new(), |document| {
                documents.push(document);
                match state.guard_overflow(documents.len()) {
                    Ok(()) => true,
                    Err(e) => {
                        overflow = Some(e);
                        false
                    }
                }
            })
            .await?;
        if let Some(overflow) = overflow {
            return Err(overflow);
        }
        Ok(documents)
    }

    /// Returns matches in random order via a `$sample` aggregation.
    ///
    /// Requires an explicit limit between 1 and
    /// [`MAX_LIST_SIZE`](crate::query::MAX_LIST_SIZE); violations are usage
    /// errors raised before any backend call.
    pub async fn random_list(self) -> StoreResult<Vec<Document>> {
        let size = self.state.verify_sample_limit()?;
        let collection = self.descriptor.relation_name().to_string();
        let finder = self.mongo.find().filter(self.combined());
        finder.sample_in(&collection, size).await
    }

    /// Executes all registered facets in one pass: per facet, a
    /// `$match` + `$sortByCount` pipeline over the current filters.
    pub async fn execute_facets(self) -> StoreResult<Vec<FacetResult>> {
        let collection = self.descriptor.relation_name().to_string();
        let filter = self.combined().into_document();

        let mut results = Vec::with_capacity(self.facets.len());
        for facet in &self.facets {
            let pipeline = vec![
                doc! { "$match": filter.clone() },
                doc! { "$sortByCount": format!("${}", facet.field) },
            ];

            let mut cursor = self
                .mongo
                .database()
                .collection::<Document>(&collection)
                .aggregate(pipeline)
                .await?;

            let mut terms = Vec::new();
            while cursor.advance().await? {
                let row = cursor.deserialize_current()?;
                let term = match row.get("_id") {
                    Some(Bson::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => continue,
                };
                let count = row.get_i64("count").unwrap_or_default() as u64;
                terms.push((term, count));
            }
            results.push(FacetResult {
                name: facet.name.clone(),
                terms,
            });
        }
        Ok(results)
    }

    /// The accumulated constraints combined under AND.
    fn combined(&self) -> MongoConstraint {
        FILTERS.and(self.state.constraints().to_vec())
    }

    /// Builds the low-level finder mirroring the accumulated state.
    fn finder(&self) -> Finder<'a> {
        let mut finder = self
            .mongo
            .find()
            .filter(self.combined())
            .skip(self.state.skip() as u64)
            .limit(self.state.limit() as i64);
        if !self.state.projection().is_empty() {
            finder = finder.select_fields(self.state.projection());
        }
        for (field, direction) in self.state.sorts() {
            finder = match direction {
                SortOrder::Ascending => finder.order_by_asc(field),
                SortOrder::Descending => finder.order_by_desc(field),
            };
        }
        finder
    }
}
