//! End-to-end planning of the batches the refresh job actually sends.

use postrefresh_common::SelectionRequest;
use postrefresh_planner::{HourWindows, OutletScope, QueryMode, QueryPlan, SuggestedMax};
use serde_json::json;

fn plan(value: serde_json::Value) -> QueryPlan {
    let request: SelectionRequest = serde_json::from_value(value).unwrap();
    QueryPlan::from_request(&request).unwrap()
}

#[test]
fn single_outlet_batch() {
    let plan = plan(json!({
        "mediaIds": [5],
        "limit": 50,
        "offset": 0,
        "createdSince": 1,
        "createdUntil": 30,
        "updatedUntil": 7,
        "diagnosisUntil": 14,
        "withoutInteractions": false,
        "postId": null
    }));

    assert_eq!(plan.mode(), QueryMode::SingleOutlet);
    let QueryPlan::Batch(batch) = &plan else {
        panic!("expected a batch plan, got {plan:?}");
    };
    assert_eq!(
        batch.windows,
        HourWindows {
            created_since: 24,
            created_until: 720.0,
            updated_until: 168.0,
            diagnosis_until: 336.0,
        }
    );
    assert_eq!(batch.outlets, OutletScope::Single(5));
    assert_eq!((batch.limit, batch.offset), (50, 0));

    let sql = plan.sql();
    assert!(sql.contains("WHERE id_medio = $7"));
    assert!(sql.ends_with("ORDER BY updated_time ASC, created_time DESC LIMIT $8 OFFSET $9"));
}

#[test]
fn single_post_wins_over_batch_fields() {
    let plan = plan(json!({
        "mediaIds": [],
        "limit": 50,
        "createdSince": 1,
        "createdUntil": 30,
        "updatedUntil": 7,
        "diagnosisUntil": 14,
        "withoutInteractions": true,
        "postId": "1234_987654321"
    }));

    assert_eq!(plan.mode(), QueryMode::SinglePost);
    assert_eq!(plan.suggested_max().resolve(5_000), 100);
    assert!(plan.sql().contains("FROM public.posts WHERE id = $1::bigint AND id_medio = $2::bigint"));
}

#[test]
fn without_interactions_suggests_the_page_size() {
    let plan = plan(json!({
        "mediaIds": [3, 4],
        "limit": 25,
        "offset": 75,
        "createdSince": 0.5,
        "createdUntil": 10,
        "updatedUntil": 1,
        "diagnosisUntil": 2,
        "withoutInteractions": true
    }));

    assert_eq!(plan.mode(), QueryMode::WithoutInteractions);
    for backlog in [0, 7, 8_000] {
        assert_eq!(plan.suggested_max().resolve(backlog), 25);
    }
}

#[test]
fn backlog_throttles_multi_outlet_batches() {
    let plan = plan(json!({
        "mediaIds": [3, 4, 5],
        "limit": 200,
        "createdSince": 2.1,
        "createdUntil": 2.1,
        "updatedUntil": 1,
        "diagnosisUntil": 3
    }));

    assert_eq!(plan.mode(), QueryMode::MultiOutlet);
    assert!(matches!(plan.suggested_max(), SuggestedMax::Backlog { .. }));
    assert_eq!(plan.suggested_max().resolve(81), 11);

    let QueryPlan::Batch(batch) = &plan else {
        panic!("expected a batch plan, got {plan:?}");
    };
    assert_eq!(batch.windows.created_since, 51);
    assert!((batch.windows.created_until - 50.4).abs() < 1e-9);
}

#[test]
fn batch_without_outlets_is_rejected() {
    let request: SelectionRequest = serde_json::from_value(json!({
        "mediaIds": [],
        "limit": 50,
        "createdSince": 1,
        "createdUntil": 30,
        "updatedUntil": 7,
        "diagnosisUntil": 14,
        "postId": "not-a-post"
    }))
    .unwrap();

    assert!(QueryPlan::from_request(&request).is_err());
}
