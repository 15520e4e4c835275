use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

use postrefresh_common::{RefreshError, RefreshResult};

const UPSERT_USER: &str = r#"
    INSERT INTO public.users (id, nombre, chilean)
    VALUES ($1, $2, $3)
    ON CONFLICT (id) DO UPDATE
    SET nombre = $2
"#;

/// Values written by [`upsert_user`], in bind order.
#[derive(Debug, Clone, PartialEq)]
struct UserUpsert<'a> {
    id: i64,
    nombre: &'a str,
    /// Deprecated column, always written as NULL.
    chilean: Option<bool>,
}

impl<'a> UserUpsert<'a> {
    fn new(id: i64, nombre: &'a str) -> Self {
        Self {
            id,
            nombre,
            chilean: None,
        }
    }

    fn query(&self) -> Query<'a, Postgres, PgArguments> {
        sqlx::query(UPSERT_USER)
            .bind(self.id)
            .bind(self.nombre)
            .bind(self.chilean)
    }
}

/// Insert a user, or rename it if the id already exists.
pub async fn upsert_user<'e, E: sqlx::Executor<'e, Database = sqlx::Postgres>>(
    user_id: i64,
    user_name: &str,
    executor: E,
) -> RefreshResult<()> {
    UserUpsert::new(user_id, user_name)
        .query()
        .execute(executor)
        .await
        .map_err(|e| RefreshError::Database(e.to_string()))?;
    Ok(())
}
