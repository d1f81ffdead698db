use crate::database::filter::FilteredQuery;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::scope::PgScope;
use crate::error::app_error::AppError;
use crate::models::pagination::PaginationParams;
use crate::models::user::{NewUser, USER_ORDER_COLUMNS, User, UserFilter};

const USER_COLUMNS: &str = "id, username, name, email, password_hash, role_id, is_active, created_at, created_by, modified_at, modified_by";

/// Account lookup used by login; runs outside any request transaction.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, AppError>;
}

/// User persistence. Every call runs on the scope's transaction when one is
/// open, otherwise on a pooled connection.
#[async_trait::async_trait]
pub trait UserRepository {
    async fn find_users(&self, scope: &mut PgScope, filter: &UserFilter, pagination: &PaginationParams) -> Result<(Vec<User>, i64), AppError>;
    async fn find_user_by_id(&self, scope: &mut PgScope, id: i64) -> Result<Option<User>, AppError>;
    async fn find_user_by_username_or_email(&self, scope: &mut PgScope, username: &str, email: &str) -> Result<Option<User>, AppError>;
    async fn create_user(&self, scope: &mut PgScope, user: &NewUser) -> Result<User, AppError>;
    async fn update_user(&self, scope: &mut PgScope, user: &User) -> Result<User, AppError>;
    async fn delete_user(&self, scope: &mut PgScope, id: i64) -> Result<bool, AppError>;
}

fn apply_search(query: &mut FilteredQuery<'_>, filter: &UserFilter) {
    if let Some(term) = filter.user.search.as_deref() {
        let pattern = format!("%{}%", term.trim());
        query
            .and_where()
            .push("(username ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait::async_trait]
impl UserRepository for PostgresRepository {
    async fn find_users(&self, scope: &mut PgScope, filter: &UserFilter, pagination: &PaginationParams) -> Result<(Vec<User>, i64), AppError> {
        let mut conn = scope.connection(&self.pool).await?;

        let mut count = FilteredQuery::new("SELECT COUNT(*) FROM users");
        count.apply(filter);
        apply_search(&mut count, filter);
        let total: i64 = count.builder().build_query_scalar().fetch_one(&mut *conn).await?;

        let mut list = FilteredQuery::new(&format!("SELECT {} FROM users", USER_COLUMNS));
        list.apply(filter);
        apply_search(&mut list, filter);
        list.push(&pagination.order_clause(USER_ORDER_COLUMNS)).push(" LIMIT ");
        list.builder()
            .push_bind(pagination.page_size())
            .push(" OFFSET ")
            .push_bind(pagination.offset());
        let users = list.builder().build_query_as::<User>().fetch_all(&mut *conn).await?;

        Ok((users, total))
    }

    async fn find_user_by_id(&self, scope: &mut PgScope, id: i64) -> Result<Option<User>, AppError> {
        let mut conn = scope.connection(&self.pool).await?;
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(user)
    }

    async fn find_user_by_username_or_email(&self, scope: &mut PgScope, username: &str, email: &str) -> Result<Option<User>, AppError> {
        let mut conn = scope.connection(&self.pool).await?;
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE username = $1 OR email = $2 LIMIT 1", USER_COLUMNS))
            .bind(username)
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(user)
    }

    async fn create_user(&self, scope: &mut PgScope, user: &NewUser) -> Result<User, AppError> {
        let mut conn = scope.connection(&self.pool).await?;
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, name, email, password_hash, role_id, is_active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .bind(user.is_active)
        .bind(user.created_by)
        .fetch_one(&mut *conn)
        .await?;

        Ok(created)
    }

    async fn update_user(&self, scope: &mut PgScope, user: &User) -> Result<User, AppError> {
        let mut conn = scope.connection(&self.pool).await?;
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $1, name = $2, email = $3, password_hash = $4, role_id = $5,
                is_active = $6, modified_at = NOW(), modified_by = $7
            WHERE id = $8
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .bind(user.is_active)
        .bind(user.modified_by)
        .bind(user.id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(updated)
    }

    async fn delete_user(&self, scope: &mut PgScope, id: i64) -> Result<bool, AppError> {
        let mut conn = scope.connection(&self.pool).await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *conn).await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl CredentialStore for PostgresRepository {
    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE username = $1 OR email = $1 LIMIT 1", USER_COLUMNS))
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserFieldsFilter;

    #[test]
    fn search_is_a_grouped_disjunction_after_the_declared_filters() {
        let filter = UserFilter {
            user: UserFieldsFilter {
                role_id: Some(2),
                search: Some(" ann ".to_string()),
                ..UserFieldsFilter::default()
            },
            ..UserFilter::default()
        };
        let mut query = FilteredQuery::new("SELECT COUNT(*) FROM users");
        query.apply(&filter);
        apply_search(&mut query, &filter);
        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM users WHERE role_id = $1 AND (username ILIKE $2 OR email ILIKE $3 OR name ILIKE $4)"
        );
    }

    #[test]
    fn no_search_term_adds_nothing() {
        let mut query = FilteredQuery::new("SELECT COUNT(*) FROM users");
        apply_search(&mut query, &UserFilter::default());
        assert_eq!(query.sql(), "SELECT COUNT(*) FROM users");
    }
}
