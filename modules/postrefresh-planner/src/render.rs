//! Renders a [`QueryPlan`] into Postgres SQL.
//!
//! Every value taken from the request (ids, windows, pagination) is pushed as a
//! bound parameter; only fixed constants are written into the SQL text.

use sqlx::{Postgres, QueryBuilder};

use crate::plan::{
    BatchPlan, OutletScope, QueryPlan, SinglePostPlan, SuggestedMax, BACKLOG_DIVISOR,
    SINGLE_POST_SUGGESTED_MAX,
};
use crate::window::HourWindows;

/// Output columns of the candidate query, in order.
pub const CANDIDATE_COLUMNS: [&str; 6] = [
    "id",
    "id_medio",
    "created_time",
    "name",
    "since",
    "max_sugerido",
];

const SELECT_HEAD: &str = "SELECT id, id_medio, created_time, message AS name, ";

/// Filter for posts whose interaction counts were never fetched.
const INTERACTIONS_UNKNOWN: &str = "(reactions = -1 OR comments = -1)";

impl QueryPlan {
    pub fn to_query_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(SELECT_HEAD);
        match self {
            QueryPlan::SinglePost(single) => push_single_post(&mut qb, single),
            QueryPlan::Batch(batch) => push_batch(&mut qb, batch),
        }
        qb
    }

    /// The rendered SQL text, with `$n` placeholders for bound values.
    pub fn sql(&self) -> String {
        self.to_query_builder().sql().to_string()
    }
}

fn push_single_post(qb: &mut QueryBuilder<'static, Postgres>, single: &SinglePostPlan) {
    qb.push(format!(
        "round(EXTRACT(epoch FROM updated_time))::text AS since, \
         {SINGLE_POST_SUGGESTED_MAX} AS max_sugerido \
         FROM public.posts WHERE id = "
    ));
    qb.push_bind(single.post_id);
    qb.push("::bigint AND id_medio = ");
    qb.push_bind(single.media_id);
    qb.push("::bigint");
}

fn push_batch(qb: &mut QueryBuilder<'static, Postgres>, batch: &BatchPlan) {
    let windows = &batch.windows;

    qb.push("url AS since, ");
    match batch.suggested_max() {
        SuggestedMax::Limit(limit) => {
            qb.push_bind(limit);
            qb.push("::bigint AS max_sugerido ");
        }
        SuggestedMax::Backlog {
            diagnosis_until_hours,
        } => {
            qb.push("CEIL((SELECT count(*) FROM ");
            push_posts_to_update(qb, windows, diagnosis_until_hours);
            qb.push(format!(")::numeric / {BACKLOG_DIVISOR})::bigint AS max_sugerido "));
        }
        SuggestedMax::Fixed(n) => {
            qb.push(format!("{n} AS max_sugerido "));
        }
    }

    qb.push("FROM ");
    push_posts_to_update(qb, windows, windows.updated_until);

    match &batch.outlets {
        OutletScope::Single(media_id) => {
            qb.push(" WHERE id_medio = ");
            qb.push_bind(*media_id);
            if batch.without_interactions {
                qb.push(" AND ");
                qb.push(INTERACTIONS_UNKNOWN);
            }
        }
        OutletScope::Set(media_ids) => {
            qb.push(" JOIN (SELECT unnest(");
            qb.push_bind(media_ids.clone());
            qb.push("::bigint[]) AS medios_id) medios ON medios.medios_id = id_medio");
            if batch.without_interactions {
                qb.push(" WHERE ");
                qb.push(INTERACTIONS_UNKNOWN);
            }
        }
    }

    qb.push(" ORDER BY updated_time ASC, created_time DESC LIMIT ");
    qb.push_bind(batch.limit);
    qb.push(" OFFSET ");
    qb.push_bind(batch.offset);
}

/// `main.get_posts_to_update(created_since, created_until, <updated bound>)`.
/// Arguments go in as `numeric` since the hour bounds can be fractional.
fn push_posts_to_update(
    qb: &mut QueryBuilder<'static, Postgres>,
    windows: &HourWindows,
    updated_bound_hours: f64,
) {
    qb.push("main.get_posts_to_update(");
    qb.push_bind(windows.created_since);
    qb.push("::numeric, ");
    qb.push_bind(windows.created_until);
    qb.push("::numeric, ");
    qb.push_bind(updated_bound_hours);
    qb.push("::numeric)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use postrefresh_common::SelectionRequest;

    fn batch_request(media_ids: Vec<i64>, without_interactions: bool) -> SelectionRequest {
        SelectionRequest::builder()
            .media_ids(media_ids)
            .limit(50)
            .offset(100)
            .created_since(1.0)
            .created_until(30.0)
            .updated_until(7.0)
            .diagnosis_until(14.0)
            .without_interactions(without_interactions)
            .build()
    }

    fn sql_for(request: &SelectionRequest) -> String {
        QueryPlan::from_request(request).unwrap().sql()
    }

    fn tail_from_order_by(sql: &str) -> &str {
        &sql[sql.find(" ORDER BY").expect("batch query is ordered")..]
    }

    #[test]
    fn single_post_query() {
        let request = SelectionRequest::builder()
            .media_ids(vec![1, 2])
            .limit(10)
            .created_since(1.0)
            .created_until(2.0)
            .updated_until(3.0)
            .diagnosis_until(4.0)
            .post_id("42_777")
            .build();

        assert_eq!(
            sql_for(&request),
            "SELECT id, id_medio, created_time, message AS name, \
             round(EXTRACT(epoch FROM updated_time))::text AS since, \
             100 AS max_sugerido \
             FROM public.posts WHERE id = $1::bigint AND id_medio = $2::bigint"
        );
    }

    #[test]
    fn single_outlet_query() {
        assert_eq!(
            sql_for(&batch_request(vec![5], false)),
            "SELECT id, id_medio, created_time, message AS name, url AS since, \
             CEIL((SELECT count(*) FROM main.get_posts_to_update($1::numeric, $2::numeric, $3::numeric))::numeric / 8)::bigint AS max_sugerido \
             FROM main.get_posts_to_update($4::numeric, $5::numeric, $6::numeric) \
             WHERE id_medio = $7 \
             ORDER BY updated_time ASC, created_time DESC LIMIT $8 OFFSET $9"
        );
    }

    #[test]
    fn multi_outlet_query_joins_on_id_set() {
        let sql = sql_for(&batch_request(vec![5, 9, 12], false));
        assert!(sql.contains(
            " JOIN (SELECT unnest($7::bigint[]) AS medios_id) medios ON medios.medios_id = id_medio"
        ));
        assert!(!sql.contains("WHERE id_medio"));
        assert!(!sql.contains(" IN "));
    }

    #[test]
    fn multi_outlet_placeholders_do_not_grow_with_id_count() {
        let few = sql_for(&batch_request(vec![5, 9], false));
        let many = sql_for(&batch_request((1..=500).collect(), false));
        assert_eq!(few, many);
    }

    #[test]
    fn single_and_multi_share_ordering_and_pagination() {
        let single = sql_for(&batch_request(vec![5], false));
        let multi = sql_for(&batch_request(vec![5, 9], false));

        assert_ne!(single, multi);
        assert_eq!(tail_from_order_by(&single), tail_from_order_by(&multi));
        assert_eq!(
            tail_from_order_by(&single),
            " ORDER BY updated_time ASC, created_time DESC LIMIT $8 OFFSET $9"
        );
    }

    #[test]
    fn without_interactions_single_outlet() {
        assert_eq!(
            sql_for(&batch_request(vec![5], true)),
            "SELECT id, id_medio, created_time, message AS name, url AS since, \
             $1::bigint AS max_sugerido \
             FROM main.get_posts_to_update($2::numeric, $3::numeric, $4::numeric) \
             WHERE id_medio = $5 AND (reactions = -1 OR comments = -1) \
             ORDER BY updated_time ASC, created_time DESC LIMIT $6 OFFSET $7"
        );
    }

    #[test]
    fn without_interactions_multi_outlet() {
        let sql = sql_for(&batch_request(vec![5, 9], true));
        assert!(sql.contains(
            "ON medios.medios_id = id_medio WHERE (reactions = -1 OR comments = -1) ORDER BY"
        ));
        assert!(!sql.contains("count(*)"));
    }

    #[test]
    fn request_values_never_appear_in_sql_text() {
        let request = SelectionRequest::builder()
            .media_ids(vec![987_654])
            .limit(4_321)
            .offset(8_765)
            .created_since(3.3)
            .created_until(45.5)
            .updated_until(6.25)
            .diagnosis_until(12.5)
            .build();
        let sql = sql_for(&request);

        for literal in ["987654", "4321", "8765", "80", "1092", "150", "300"] {
            assert!(!sql.contains(literal), "{literal} leaked into {sql}");
        }
    }

    #[test]
    fn column_list_matches_select() {
        let sql = sql_for(&batch_request(vec![5], false));
        let select = &sql[..sql.find("FROM main").unwrap()];
        for column in CANDIDATE_COLUMNS {
            assert!(select.contains(column), "missing column {column}");
        }
    }
}
