//! Low-level wire-operation builders: find, insert, update, delete.
//!
//! These are the single-purpose fluent builders the entity-level
//! [`MongoQuery`] executes through; they are also usable directly for
//! operations below the mapping layer.
//!
//! [`MongoQuery`]: super::MongoQuery

use std::time::Instant;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use tokio_util::sync::CancellationToken;

use crate::error::StoreResult;
use crate::query::exec::{drain_pages, PageSource};
use crate::query::{FilterFactory, Value};
use crate::schema::Field;

use super::client::Mongo;
use super::constraint::MongoConstraint;
use super::FILTERS;

/// Streams documents one at a time out of a driver cursor.
pub(crate) struct CursorSource {
    cursor: mongodb::Cursor<Document>,
}

impl CursorSource {
    pub(crate) fn new(cursor: mongodb::Cursor<Document>) -> Self {
        CursorSource { cursor }
    }
}

#[async_trait]
impl PageSource for CursorSource {
    type Item = Document;

    async fn next_page(&mut self) -> StoreResult<Option<Vec<Document>>> {
        if self.cursor.advance().await? {
            Ok(Some(vec![self.cursor.deserialize_current()?]))
        } else {
            Ok(None)
        }
    }
}

/// Fluent builder for a find statement.
#[derive(Clone)]
pub struct Finder<'a> {
    mongo: &'a Mongo,
    constraints: Vec<MongoConstraint>,
    projection: Option<Document>,
    sort: Option<Document>,
    skip: u64,
    limit: i64,
}

impl<'a> Finder<'a> {
    pub(crate) fn new(mongo: &'a Mongo) -> Self {
        Finder {
            mongo,
            constraints: Vec::new(),
            projection: None,
            sort: None,
            skip: 0,
            limit: 0,
        }
    }

    /// Filters on `field = value`.
    pub fn filter_field(mut self, field: &Field, value: impl Into<Value>) -> Self {
        self.constraints.push(FILTERS.eq(field, value));
        self
    }

    /// Adds a constraint (implicit AND).
    pub fn filter(mut self, constraint: MongoConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Limits the returned fields to the given list.
    pub fn select_fields(mut self, fields: &[Field]) -> Self {
        let mut projection = Document::new();
        for field in fields {
            projection.insert(field.to_string(), 1);
        }
        self.projection = Some(projection);
        self
    }

    /// Orders ascending by the given field.
    pub fn order_by_asc(mut self, field: &Field) -> Self {
        self.sort
            .get_or_insert_with(Document::new)
            .insert(field.to_string(), 1);
        self
    }

    /// Orders descending by the given field.
    pub fn order_by_desc(mut self, field: &Field) -> Self {
        self.sort
            .get_or_insert_with(Document::new)
            .insert(field.to_string(), -1);
        self
    }

    /// Skips the first `skip` documents.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Caps the number of returned documents (0 = unbounded).
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// The combined filter document.
    pub(crate) fn combined_filter(&self) -> Document {
        FILTERS.and(self.constraints.clone()).into_document()
    }

    pub(crate) fn transfer_filters(&self, deleter: Deleter<'a>) -> Deleter<'a> {
        let mut deleter = deleter;
        deleter.constraints.extend(self.constraints.iter().cloned());
        deleter
    }

    async fn open_cursor(&self, collection: &str) -> StoreResult<mongodb::Cursor<Document>> {
        let filter = self.combined_filter();
        tracing::debug!(collection, filter = %filter, "mongodb find");

        let collection = self.mongo.database().collection::<Document>(collection);
        let mut find = collection.find(filter).skip(self.skip);
        if let Some(projection) = &self.projection {
            find = find.projection(projection.clone());
        }
        if let Some(sort) = &self.sort {
            find = find.sort(sort.clone());
        }
        if self.limit > 0 {
            find = find.limit(self.limit);
        }
        if let Some(collation) = self.mongo.collation() {
            find = find.collation(collation.clone());
        }

        Ok(find.await?)
    }

    /// Executes the find and returns the first matching document, if any.
    pub async fn single_in(mut self, collection: &str) -> StoreResult<Option<Document>> {
        self.limit = 1;
        let started = Instant::now();
        let mut cursor = self.open_cursor(collection).await?;
        let result = if cursor.advance().await? {
            Some(cursor.deserialize_current()?)
        } else {
            None
        };
        self.mongo.observe(started, "FIND ONE", collection);
        Ok(result)
    }

    /// Streams each match to the processor for as long as it returns `true`
    /// and the token is not cancelled; returns the number of yielded
    /// documents.
    pub async fn each_in<F>(
        self,
        collection: &str,
        cancel: &CancellationToken,
        processor: F,
    ) -> StoreResult<u64>
    where
        F: FnMut(Document) -> bool + Send,
    {
        let started = Instant::now();
        let cursor = self.open_cursor(collection).await?;
        let mongo = self.mongo;
        let mut source = CursorSource::new(cursor);
        let outcome = drain_pages(&mut source, cancel, processor).await?;
        mongo.observe(started, "FIND ALL", collection);
        Ok(outcome.yielded)
    }

    /// Streams every match to the processor (no early termination).
    pub async fn all_in<F>(
        self,
        collection: &str,
        cancel: &CancellationToken,
        mut processor: F,
    ) -> StoreResult<u64>
    where
        F: FnMut(Document) + Send,
    {
        self.each_in(collection, cancel, |document| {
            processor(document);
            true
        })
        .await
    }

    /// Counts all matches; skip and limit are ignored.
    pub async fn count_in(self, collection: &str) -> StoreResult<u64> {
        let filter = self.combined_filter();
        let started = Instant::now();
        let count = self
            .mongo
            .database()
            .collection::<Document>(collection)
            .count_documents(filter)
            .await?;
        self.mongo.observe(started, "COUNT", collection);
        Ok(count)
    }

    /// Returns up to `size` matches in random order via a `$sample` stage.
    pub async fn sample_in(self, collection: &str, size: usize) -> StoreResult<Vec<Document>> {
        let pipeline = vec![
            doc! { "$match": self.combined_filter() },
            doc! { "$sample": { "size": size as i64 } },
        ];

        let started = Instant::now();
        let mut cursor = self
            .mongo
            .database()
            .collection::<Document>(collection)
            .aggregate(pipeline)
            .await?;

        let mut documents = Vec::new();
        while cursor.advance().await? {
            documents.push(cursor.deserialize_current()?);
        }
        self.mongo.observe(started, "SAMPLE", collection);
        Ok(documents)
    }
}

/// Fluent builder for an insert statement.
pub struct Inserter<'a> {
    mongo: &'a Mongo,
    document: Document,
}

impl<'a> Inserter<'a> {
    pub(crate) fn new(mongo: &'a Mongo) -> Self {
        Inserter {
            mongo,
            document: Document::new(),
        }
    }

    /// Sets a field of the document being inserted.
    pub fn set(mut self, field: &Field, value: impl Into<Value>) -> Self {
        self.document.insert(field.to_string(), Bson::from(value.into()));
        self
    }

    /// Sets a field to a raw BSON value.
    pub fn set_bson(mut self, field: &Field, value: impl Into<Bson>) -> Self {
        self.document.insert(field.to_string(), value.into());
        self
    }

    /// Inserts the document, returning the generated identity.
    pub async fn into_collection(self, collection: &str) -> StoreResult<Bson> {
        let started = Instant::now();
        let result = self
            .mongo
            .database()
            .collection::<Document>(collection)
            .insert_one(self.document)
            .await?;
        self.mongo.observe(started, "INSERT", collection);
        Ok(result.inserted_id)
    }
}

/// Fluent builder for an update statement.
pub struct Updater<'a> {
    mongo: &'a Mongo,
    constraints: Vec<MongoConstraint>,
    sets: Document,
}

impl<'a> Updater<'a> {
    pub(crate) fn new(mongo: &'a Mongo) -> Self {
        Updater {
            mongo,
            constraints: Vec::new(),
            sets: Document::new(),
        }
    }

    /// Filters on `field = value`.
    pub fn filter_field(mut self, field: &Field, value: impl Into<Value>) -> Self {
        self.constraints.push(FILTERS.eq(field, value));
        self
    }

    /// Adds a constraint (implicit AND).
    pub fn filter(mut self, constraint: MongoConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Sets a field on every matched document.
    pub fn set(mut self, field: &Field, value: impl Into<Value>) -> Self {
        self.sets.insert(field.to_string(), Bson::from(value.into()));
        self
    }

    /// Updates the first match; returns the number of modified documents.
    pub async fn one_in(self, collection: &str) -> StoreResult<u64> {
        let filter = FILTERS.and(self.constraints.clone()).into_document();
        let started = Instant::now();
        let result = self
            .mongo
            .database()
            .collection::<Document>(collection)
            .update_one(filter, doc! { "$set": self.sets })
            .await?;
        self.mongo.observe(started, "UPDATE ONE", collection);
        Ok(result.modified_count)
    }

    /// Updates every match; returns the number of modified documents.
    pub async fn many_in(self, collection: &str) -> StoreResult<u64> {
        let filter = FILTERS.and(self.constraints.clone()).into_document();
        let started = Instant::now();
        let result = self
            .mongo
            .database()
            .collection::<Document>(collection)
            .update_many(filter, doc! { "$set": self.sets })
            .await?;
        self.mongo.observe(started, "UPDATE MANY", collection);
        Ok(result.modified_count)
    }
}

/// Fluent builder for a delete statement.
pub struct Deleter<'a> {
    mongo: &'a Mongo,
    constraints: Vec<MongoConstraint>,
}

impl<'a> Deleter<'a> {
    pub(crate) fn new(mongo: &'a Mongo) -> Self {
        Deleter {
            mongo,
            constraints: Vec::new(),
        }
    }

    /// Filters on `field = value`.
    pub fn filter_field(mut self, field: &Field, value: impl Into<Value>) -> Self {
        self.constraints.push(FILTERS.eq(field, value));
        self
    }

    /// Adds a constraint (implicit AND).
    pub fn filter(mut self, constraint: MongoConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Deletes the first match; returns the number of deleted documents.
    pub async fn one_from(self, collection: &str) -> StoreResult<u64> {
        let filter = FILTERS.and(self.constraints).into_document();
        let started = Instant::now();
        let result = self
            .mongo
            .database()
            .collection::<Document>(collection)
            .delete_one(filter)
            .await?;
        self.mongo.observe(started, "DELETE ONE", collection);
        Ok(result.deleted_count)
    }

    /// Deletes every match; returns the number of deleted documents.
    pub async fn many_from(self, collection: &str) -> StoreResult<u64> {
        let filter = FILTERS.and(self.constraints).into_document();
        let started = Instant::now();
        let result = self
            .mongo
            .database()
            .collection::<Document>(collection)
            .delete_many(filter)
            .await?;
        self.mongo.observe(started, "DELETE MANY", collection);
        Ok(result.deleted_count)
    }
}
