//! SQLite backend integration tests.
//!
//! End-to-end coverage of the fluent query builder against a seeded
//! in-memory database: filtering, free-text search, sorting, pagination,
//! cooperative iteration and the destructive operations.

mod common;

use polystore::backends::sqlite::FILTERS;
use polystore::error::UsageError;
use polystore::query::{FilterFactory, QueryField, Value, MAX_LIST_SIZE};
use polystore::schema::Field;
use polystore::StoreError;
use tokio_util::sync::CancellationToken;

use common::{products, seeded_database};

fn names(rows: &[polystore::backends::sqlite::SqlRow]) -> Vec<String> {
    rows.iter()
        .map(|row| row.str("name").unwrap().to_string())
        .collect()
}

// ============================================================================
// Filtering
// ============================================================================

#[tokio::test]
async fn test_eq_filter() {
    let db = seeded_database();
    let descriptor = products();

    let rows = db
        .query(&descriptor)
        .eq(&Field::named("name"), "wrench")
        .into_vec()
        .await
        .unwrap();
    assert_eq!(names(&rows), vec!["wrench"]);
}

#[tokio::test]
async fn test_eq_null_matches_absent_values() {
    let db = seeded_database();
    let descriptor = products();

    // Every product except the discontinued hammer.
    let count = db
        .query(&descriptor)
        .eq(&Field::named("discontinued_at"), Value::Null)
        .count()
        .await
        .unwrap();
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_eq_ignore_null_drops_the_constraint() {
    let db = seeded_database();
    let descriptor = products();

    // A null optional filter must not restrict the result set.
    let count = db
        .query(&descriptor)
        .eq_ignore_null(&Field::named("name"), None::<&str>)
        .count()
        .await
        .unwrap();
    assert_eq!(count, 5);
}

#[tokio::test]
async fn test_filters_combine_under_and() {
    let db = seeded_database();
    let descriptor = products();

    let rows = db
        .query(&descriptor)
        .filter(FILTERS.prefix(&Field::named("name"), "wrench"))
        .filter(FILTERS.gt(&Field::named("price"), 10.0))
        .into_vec()
        .await
        .unwrap();
    assert_eq!(names(&rows), vec!["wrench set"]);
}

#[tokio::test]
async fn test_negated_filter() {
    let db = seeded_database();
    let descriptor = products();

    let count = db
        .query(&descriptor)
        .filter(FILTERS.not(FILTERS.prefix(&Field::named("name"), "wrench")))
        .count()
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_match_none_filter_excludes_everything() {
    let db = seeded_database();
    let descriptor = products();

    // or([]) is the match-none neutral element.
    let count = db
        .query(&descriptor)
        .filter(FILTERS.or(Vec::new()))
        .count()
        .await
        .unwrap();
    assert_eq!(count, 0);
}

// ============================================================================
// Free-text search
// ============================================================================

#[tokio::test]
async fn test_search_requires_every_token_in_some_field() {
    let db = seeded_database();
    let descriptor = products();
    let specs = vec![
        QueryField::prefix(Field::named("name")),
        QueryField::prefix(Field::named("description")),
    ];

    // "red" matches the name, "car" the description; only the plank has both.
    let rows = db
        .query(&descriptor)
        .search("red car", &specs)
        .into_vec()
        .await
        .unwrap();
    assert_eq!(names(&rows), vec!["Redwood plank"]);
}

#[tokio::test]
async fn test_search_single_token_matches_any_field() {
    let db = seeded_database();
    let descriptor = products();
    let specs = vec![
        QueryField::prefix(Field::named("name")),
        QueryField::prefix(Field::named("description")),
    ];

    let rows = db
        .query(&descriptor)
        .search("red", &specs)
        .order_asc(&Field::named("name"))
        .into_vec()
        .await
        .unwrap();
    // Case-insensitive prefix: "Redwood plank" matches too.
    assert_eq!(names(&rows), vec!["Redwood plank", "red bucket"]);
}

#[tokio::test]
async fn test_search_empty_query_matches_all() {
    let db = seeded_database();
    let descriptor = products();
    let specs = vec![QueryField::prefix(Field::named("name"))];

    let count = db
        .query(&descriptor)
        .search("   ", &specs)
        .count()
        .await
        .unwrap();
    assert_eq!(count, 5);
}

#[tokio::test]
async fn test_search_like_mode_needs_wildcard_for_prefix() {
    let db = seeded_database();
    let descriptor = products();
    let specs = vec![QueryField::like(Field::named("name"))];

    // Without a wildcard the token matches by equality.
    let exact = db
        .query(&descriptor)
        .search("wrench", &specs)
        .into_vec()
        .await
        .unwrap();
    assert_eq!(names(&exact), vec!["wrench"]);

    // A trailing * switches to prefix matching.
    let prefixed = db
        .query(&descriptor)
        .search("wren*", &specs)
        .order_asc(&Field::named("price"))
        .into_vec()
        .await
        .unwrap();
    assert_eq!(names(&prefixed), vec!["wrench", "wrench set"]);
}

// ============================================================================
// Sorting, projection and pagination
// ============================================================================

#[tokio::test]
async fn test_sort_and_pagination_window() {
    let db = seeded_database();
    let descriptor = products();

    let rows = db
        .query(&descriptor)
        .order_asc(&Field::named("price"))
        .skip(1)
        .limit(2)
        .into_vec()
        .await
        .unwrap();
    assert_eq!(names(&rows), vec!["wrench", "hammer"]);
}

#[tokio::test]
async fn test_descending_sort() {
    let db = seeded_database();
    let descriptor = products();

    let rows = db
        .query(&descriptor)
        .order_desc(&Field::named("price"))
        .limit(1)
        .into_vec()
        .await
        .unwrap();
    assert_eq!(names(&rows), vec!["wrench set"]);
}

#[tokio::test]
async fn test_projection_restricts_columns() {
    let db = seeded_database();
    let descriptor = products();

    let rows = db
        .query(&descriptor)
        .eq(&Field::named("name"), "wrench")
        .fields(&[Field::named("name"), Field::named("price")])
        .into_vec()
        .await
        .unwrap();

    let row = &rows[0];
    assert_eq!(row.columns().len(), 2);
    assert_eq!(row.str("name"), Some("wrench"));
    assert_eq!(row.f64("price"), Some(9.5));
    assert!(row.get("description").is_none());
}

// ============================================================================
// Iteration and cancellation
// ============================================================================

#[tokio::test]
async fn test_iterate_all_streams_every_row() {
    let db = seeded_database();
    let descriptor = products();
    let cancel = CancellationToken::new();

    let mut seen = 0usize;
    let yielded = db
        .query(&descriptor)
        .iterate_all(&cancel, |_| seen += 1)
        .await
        .unwrap();
    assert_eq!(yielded, 5);
    assert_eq!(seen, 5);
}

#[tokio::test]
async fn test_iterate_stops_on_false_predicate() {
    let db = seeded_database();
    let descriptor = products();
    let cancel = CancellationToken::new();

    let mut seen = Vec::new();
    let yielded = db
        .query(&descriptor)
        .order_asc(&Field::named("price"))
        .iterate(&cancel, |row| {
            seen.push(row.str("name").unwrap().to_string());
            seen.len() < 2
        })
        .await
        .unwrap();
    assert_eq!(yielded, 2);
    assert_eq!(seen, vec!["red bucket", "wrench"]);
}

#[tokio::test]
async fn test_iterate_honors_cancellation() {
    let db = seeded_database();
    let descriptor = products();
    let cancel = CancellationToken::new();

    let token = cancel.clone();
    let mut seen = 0usize;
    let yielded = db
        .query(&descriptor)
        .iterate(&cancel, |_| {
            seen += 1;
            if seen == 3 {
                token.cancel();
            }
            true
        })
        .await
        .unwrap();
    // The token was cancelled while handling row 3; rows 4 and 5 never run.
    assert_eq!(yielded, 3);
    assert_eq!(seen, 3);
}

#[tokio::test]
async fn test_iterate_respects_skip_and_limit() {
    let db = seeded_database();
    let descriptor = products();
    let cancel = CancellationToken::new();

    let mut seen = Vec::new();
    let yielded = db
        .query(&descriptor)
        .order_asc(&Field::named("price"))
        .skip(2)
        .limit(2)
        .iterate_all(&cancel, |row| {
            seen.push(row.str("name").unwrap().to_string())
        })
        .await
        .unwrap();
    assert_eq!(yielded, 2);
    assert_eq!(seen, vec!["hammer", "Redwood plank"]);
}

// ============================================================================
// Count, exists and the destructive operations
// ============================================================================

#[tokio::test]
async fn test_count_ignores_pagination() {
    let db = seeded_database();
    let descriptor = products();

    let count = db
        .query(&descriptor)
        .skip(3)
        .limit(1)
        .count()
        .await
        .unwrap();
    assert_eq!(count, 5);
}

#[tokio::test]
async fn test_exists() {
    let db = seeded_database();
    let descriptor = products();

    assert!(db
        .query(&descriptor)
        .filter(FILTERS.lt(&Field::named("price"), 5.0))
        .exists()
        .await
        .unwrap());
    assert!(!db
        .query(&descriptor)
        .filter(FILTERS.gt(&Field::named("price"), 100.0))
        .exists()
        .await
        .unwrap());
}

#[tokio::test]
async fn test_delete_runs_row_by_row() {
    let db = seeded_database();
    let descriptor = products();
    let cancel = CancellationToken::new();

    let mut seen = Vec::new();
    let deleted = db
        .query(&descriptor)
        .filter(FILTERS.prefix(&Field::named("name"), "wrench"))
        .delete_each(&cancel, |row| {
            seen.push(row.str("name").unwrap().to_string())
        })
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(seen.len(), 2);
    assert_eq!(db.query(&descriptor).count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_delete_stops_at_cancellation() {
    let db = seeded_database();
    let descriptor = products();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let deleted = db.query(&descriptor).delete(&cancel).await.unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(db.query(&descriptor).count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_truncate_bulk_deletes_matches() {
    let db = seeded_database();
    let descriptor = products();

    let removed = db
        .query(&descriptor)
        .filter(FILTERS.gte(&Field::named("price"), 14.0))
        .truncate()
        .await
        .unwrap();
    assert_eq!(removed, 3);
    assert_eq!(db.query(&descriptor).count().await.unwrap(), 2);
}

// ============================================================================
// Materialization guards
// ============================================================================

#[tokio::test]
async fn test_into_vec_rejects_oversized_limit() {
    let db = seeded_database();
    let descriptor = products();

    let err = db
        .query(&descriptor)
        .limit(MAX_LIST_SIZE + 1)
        .into_vec()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Usage(UsageError::ListLimitExceeded { .. })
    ));
}

#[tokio::test]
async fn test_into_vec_aborts_on_unbounded_overflow() {
    let db = seeded_database();
    let descriptor = products();

    for i in 0..(MAX_LIST_SIZE as i64 + 10) {
        db.execute(
            "INSERT INTO products (name, description, price) VALUES (?, ?, ?)",
            &[
                Value::Str(format!("bulk item {}", i)),
                Value::Str("filler".to_string()),
                Value::Float(1.0),
            ],
        )
        .unwrap();
    }

    let err = db.query(&descriptor).into_vec().await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Usage(UsageError::TooManyResults { .. })
    ));

    // Iteration has no such ceiling.
    let cancel = CancellationToken::new();
    let yielded = db
        .query(&descriptor)
        .iterate_all(&cancel, |_| {})
        .await
        .unwrap();
    assert_eq!(yielded as usize, MAX_LIST_SIZE + 15);
}
