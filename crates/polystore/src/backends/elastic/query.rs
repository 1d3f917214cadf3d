//! The fluent entity query builder for Elasticsearch.

use async_trait::async_trait;
use serde_json::{json, Value as Json};
use tokio_util::sync::CancellationToken;

use crate::error::{BackendError, StoreResult};
use crate::query::exec::{drain_pages, PageSource};
use crate::query::{
    FacetResult, FilterFactory, QueryCompiler, QueryField, QueryState, SortOrder, Value,
};
use crate::schema::{EntityDescriptor, Field};

use super::client::Elastic;
use super::constraint::ElasticConstraint;
use super::suggest::{SuggestBuilder, SuggestOption};
use super::FILTERS;

/// Page size for scroll-based iteration over unbounded result sets.
const SCROLL_PAGE_SIZE: usize = 500;

/// A term facet: counts the distinct values of one field across all matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticFacet {
    name: String,
    field: Field,
    size: usize,
}

impl ElasticFacet {
    /// Creates a facet counting the values of `field`, reported under `name`.
    pub fn terms(name: impl Into<String>, field: Field) -> Self {
        ElasticFacet {
            name: name.into(),
            field,
            size: 25,
        }
    }

    /// Caps the number of reported terms (default 25).
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }
}

/// A fluent, single-use query against one entity's index.
///
/// Obtained via [`Elastic::query`]; execution methods consume the builder.
/// Searches go through the read alias, so an in-progress reindex behind the
/// write alias stays invisible until committed.
pub struct ElasticQuery<'a> {
    elastic: &'a Elastic,
    descriptor: &'a EntityDescriptor,
    state: QueryState<ElasticConstraint>,
    facets: Vec<ElasticFacet>,
}

impl<'a> ElasticQuery<'a> {
    pub(crate) fn new(elastic: &'a Elastic, descriptor: &'a EntityDescriptor) -> Self {
        ElasticQuery {
            elastic,
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
    pub fn filter(mut self, constraint: ElasticConstraint) -> Self {
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

    /// Restricts the returned `_source` fields.
    pub fn fields(mut self, fields: &[Field]) -> Self {
        self.state.project(fields);
        self
    }

    /// Skips the first `skip` hits.
    pub fn skip(mut self, skip: usize) -> Self {
        self.state.set_skip(skip);
        self
    }

    /// Caps the number of results (0 = unbounded).
    pub fn limit(mut self, limit: usize) -> Self {
        self.state.set_limit(limit);
        self
    }

    /// Registers a facet for [`ElasticQuery::execute_facets`].
    pub fn add_facet(mut self, facet: ElasticFacet) -> Self {
        self.facets.push(facet);
        self
    }

    /// Streams matching source documents until the predicate returns `false`
    /// or the token is cancelled; returns the number of yielded documents.
    ///
    /// Bounded queries fetch one page; unbounded queries scroll, clearing the
    /// scroll context when iteration ends.
    pub async fn iterate<F>(self, cancel: &CancellationToken, mut predicate: F) -> StoreResult<u64>
    where
        F: FnMut(Json) -> bool + Send,
    {
        self.each_hit(cancel, |mut hit| predicate(hit["_source"].take()))
            .await
    }

    /// Streams every matching source document to the consumer.
    pub async fn iterate_all<F>(
        self,
        cancel: &CancellationToken,
        mut consumer: F,
    ) -> StoreResult<u64>
    where
        F: FnMut(Json) + Send,
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
        let index = self.index();
        self.elastic
            .count(&index, self.combined().into_json())
            .await
    }

    /// Determines whether at least one document matches.
    pub async fn exists(self) -> StoreResult<bool> {
        let index = self.index();
        let body = json!({
            "query": self.combined().into_json(),
            "size": 1,
            "_source": false
        });
        let response = self.elastic.search(&index, body).await?;
        Ok(!take_hits(response).is_empty())
    }

    /// Deletes every match document by document, so per-entity hooks in the
    /// owning layer can run; returns the number of deleted documents.
    pub async fn delete(self, cancel: &CancellationToken) -> StoreResult<u64> {
        self.delete_each(cancel, |_| {}).await
    }

    /// Like [`ElasticQuery::delete`], invoking the callback for each source
    /// document before it is deleted.
    pub async fn delete_each<F>(
        self,
        cancel: &CancellationToken,
        mut callback: F,
    ) -> StoreResult<u64>
    where
        F: FnMut(&Json) + Send,
    {
        let elastic = self.elastic;
        let index = self.index();

        let mut ids: Vec<String> = Vec::new();
        let mut failure: Option<BackendError> = None;
        self.each_hit(cancel, |hit| match hit["_id"].as_str() {
            Some(id) => {
                callback(&hit["_source"]);
                ids.push(id.to_string());
                true
            }
            None => {
                failure = Some(BackendError::ResponseFormat {
                    backend_name: "elasticsearch".to_string(),
                    message: "search hit is missing _id".to_string(),
                });
                false
            }
        })
        .await?;
        if let Some(failure) = failure {
            return Err(failure.into());
        }

        let mut deleted = 0u64;
        for id in ids {
            if cancel.is_cancelled() {
                break;
            }
            if elastic.delete_document(&index, &id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Bulk server-side delete of everything matching the current filters,
    /// bypassing per-entity hooks. The unsafe/fast counterpart to
    /// [`ElasticQuery::delete`].
    pub async fn truncate(self) -> StoreResult<u64> {
        let index = self.index();
        self.elastic
            .delete_by_query(&index, self.combined().into_json())
            .await
    }

    /// Materializes all matching source documents into a vector, bounded by
    /// [`MAX_LIST_SIZE`](crate::query::MAX_LIST_SIZE).
    pub async fn into_vec(self) -> StoreResult<Vec<Json>> {
        self.state.verify_list_limit()?;
        let state = self.state.clone();

        let mut documents = Vec::new();
        let mut overflow = None;
        self.each_hit(&CancellationToken::new(), |mut hit| {
            documents.push(hit["_source"].take());
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

    /// Executes all registered facets in one size-0 search with a terms
    /// aggregation per facet.
    pub async fn execute_facets(self) -> StoreResult<Vec<FacetResult>> {
        let index = self.index();

        let mut aggs = serde_json::Map::new();
        for facet in &self.facets {
            aggs.insert(
                facet.name.clone(),
                json!({ "terms": { "field": facet.field.to_string(), "size": facet.size } }),
            );
        }
        let body = json!({
            "query": self.combined().into_json(),
            "size": 0,
            "aggs": aggs
        });
        let response = self.elastic.search(&index, body).await?;

        let mut results = Vec::with_capacity(self.facets.len());
        for facet in &self.facets {
            let mut terms = Vec::new();
            if let Some(buckets) = response["aggregations"][&facet.name]["buckets"].as_array() {
                for bucket in buckets {
                    let term = match &bucket["key"] {
                        Json::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    terms.push((term, bucket["doc_count"].as_u64().unwrap_or_default()));
                }
            }
            results.push(FacetResult {
                name: facet.name.clone(),
                terms,
            });
        }
        Ok(results)
    }

    /// Runs a suggester against this entity's index; the builder's filters do
    /// not apply (suggesters operate on the whole index).
    pub async fn suggest(self, builder: SuggestBuilder) -> StoreResult<Vec<SuggestOption>> {
        builder.execute(self.elastic, self.descriptor).await
    }

    /// Streams raw hits (with `_id` and `_source`) through the shared
    /// draining loop.
    async fn each_hit<F>(self, cancel: &CancellationToken, handler: F) -> StoreResult<u64>
    where
        F: FnMut(Json) -> bool + Send,
    {
        let elastic = self.elastic;
        let index = self.index();

        if self.state.limit() > 0 {
            let response = elastic.search(&index, self.render_body()).await?;
            let mut source = SinglePage {
                hits: Some(take_hits(response)),
            };
            let outcome = drain_pages(&mut source, cancel, handler).await?;
            Ok(outcome.yielded)
        } else {
            // Scrolling cannot use `from`, so skip is discarded client-side.
            let skip = self.state.skip();
            let mut source = ScrollSource {
                elastic,
                index,
                initial: Some(self.render_scroll_body()),
                scroll_id: None,
                discard: skip,
                exhausted: false,
            };
            let drained = drain_pages(&mut source, cancel, handler).await;
            let cleanup = source.finish().await;
            let outcome = drained?;
            cleanup?;
            Ok(outcome.yielded)
        }
    }

    fn index(&self) -> String {
        self.elastic.index_name(self.descriptor.relation_name())
    }

    /// The accumulated constraints combined under AND.
    fn combined(&self) -> ElasticConstraint {
        FILTERS.and(self.state.constraints().to_vec())
    }

    /// The search body for a bounded (single page) execution.
    fn render_body(&self) -> Json {
        let mut body = self.render_base();
        body["from"] = json!(self.state.skip());
        body["size"] = json!(self.state.limit());
        body
    }

    /// The search body opening a scroll; pagination is handled client-side.
    fn render_scroll_body(&self) -> Json {
        let mut body = self.render_base();
        body["size"] = json!(SCROLL_PAGE_SIZE);
        body
    }

    fn render_base(&self) -> Json {
        let mut body = json!({ "query": self.combined().query() });
        if !self.state.sorts().is_empty() {
            let sorts: Vec<Json> = self
                .state
                .sorts()
                .iter()
                .map(|(field, order)| {
                    let direction = match order {
                        SortOrder::Ascending => "asc",
                        SortOrder::Descending => "desc",
                    };
                    json!({ field.to_string(): { "order": direction } })
                })
                .collect();
            body["sort"] = json!(sorts);
        }
        if !self.state.projection().is_empty() {
            let fields: Vec<String> = self
                .state
                .projection()
                .iter()
                .map(Field::to_string)
                .collect();
            body["_source"] = json!(fields);
        }
        body
    }
}

fn take_hits(mut response: Json) -> Vec<Json> {
    match response["hits"]["hits"].take() {
        Json::Array(hits) => hits,
        _ => Vec::new(),
    }
}

/// One pre-fetched page, for bounded executions.
struct SinglePage {
    hits: Option<Vec<Json>>,
}

#[async_trait]
impl PageSource for SinglePage {
    type Item = Json;

    async fn next_page(&mut self) -> StoreResult<Option<Vec<Json>>> {
        Ok(self.hits.take())
    }
}

/// Pages through an unbounded result set with the scroll API.
struct ScrollSource<'a> {
    elastic: &'a Elastic,
    index: String,
    initial: Option<Json>,
    scroll_id: Option<String>,
    discard: usize,
    exhausted: bool,
}

#[async_trait]
impl PageSource for ScrollSource<'_> {
    type Item = Json;

    async fn next_page(&mut self) -> StoreResult<Option<Vec<Json>>> {
        while !self.exhausted {
            let response = if let Some(body) = self.initial.take() {
                self.elastic.search_scroll(&self.index, body).await?
            } else if let Some(scroll_id) = &self.scroll_id {
                self.elastic.continue_scroll(scroll_id).await?
            } else {
                break;
            };

            if let Some(scroll_id) = response["_scroll_id"].as_str() {
                self.scroll_id = Some(scroll_id.to_string());
            }
            let mut hits = take_hits(response);
            if hits.is_empty() {
                self.exhausted = true;
                break;
            }
            if self.discard >= hits.len() {
                self.discard -= hits.len();
                continue;
            }
            if self.discard > 0 {
                hits.drain(..self.discard);
                self.discard = 0;
            }
            return Ok(Some(hits));
        }
        Ok(None)
    }
}

impl ScrollSource<'_> {
    /// Releases the scroll context; called after every run, including early
    /// termination and errors.
    async fn finish(&mut self) -> StoreResult<()> {
        if let Some(scroll_id) = self.scroll_id.take() {
            self.elastic.clear_scroll(&scroll_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::elastic::ElasticConfig;
    use crate::schema::FieldType;

    fn products() -> EntityDescriptor {
        EntityDescriptor::new("products")
            .with_field("name", FieldType::String)
            .with_field("price", FieldType::Float)
    }

    fn elastic() -> Elastic {
        Elastic::new(ElasticConfig::default()).unwrap()
    }

    #[test]
    fn test_bounded_body_shape() {
        let descriptor = products();
        let elastic = elastic();
        let body = elastic
            .query(&descriptor)
            .eq(&Field::named("name"), "wrench")
            .order_asc(&Field::named("price"))
            .fields(&[Field::named("name"), Field::named("price")])
            .skip(10)
            .limit(25)
            .render_body();

        assert_eq!(
            body,
            json!({
                "query": { "term": { "name": { "value": "wrench" } } },
                "sort": [ { "price": { "order": "asc" } } ],
                "_source": ["name", "price"],
                "from": 10,
                "size": 25
            })
        );
    }

    #[test]
    fn test_unfiltered_body_is_match_all() {
        let descriptor = products();
        let elastic = elastic();
        let body = elastic.query(&descriptor).render_scroll_body();
        assert_eq!(body["query"], json!({ "match_all": {} }));
        assert_eq!(body["size"], json!(SCROLL_PAGE_SIZE));
        assert!(body.get("from").is_none());
    }

    #[test]
    fn test_filters_combine_under_and() {
        let descriptor = products();
        let elastic = elastic();
        let body = elastic
            .query(&descriptor)
            .eq(&Field::named("name"), "wrench")
            .filter(FILTERS.lt(&Field::named("price"), 10.0))
            .render_body();

        assert_eq!(
            body["query"],
            json!({
                "bool": { "must": [
                    { "term": { "name": { "value": "wrench" } } },
                    { "range": { "price": { "lt": 10.0 } } }
                ] }
            })
        );
    }

    #[tokio::test]
    async fn test_into_vec_rejects_oversized_limit() {
        let descriptor = products();
        let elastic = elastic();
        let err = elastic
            .query(&descriptor)
            .limit(crate::query::MAX_LIST_SIZE + 1)
            .into_vec()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::StoreError::Usage(crate::error::UsageError::ListLimitExceeded { .. })
        ));
    }
}
