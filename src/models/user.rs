use crate::database::filter::{FilterField, FilterGroup, FilterValue, Filterable, MatchMode};
use crate::models::pagination::{PaginationParams, SortOrder};
use chrono::{DateTime, Utc};
use rocket::FromForm;
use rocket::serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<i64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(crate = "rocket::serde")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<i64>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role_id: user.role_id,
            is_active: user.is_active,
            created_at: user.created_at,
            created_by: user.created_by,
            modified_at: user.modified_at,
            modified_by: user.modified_by,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Validate)]
#[serde(crate = "rocket::serde")]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(range(min = 1))]
    pub role_id: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update; absent fields keep their stored value.
#[derive(Deserialize, Debug, Clone, Default, Validate)]
#[serde(crate = "rocket::serde")]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8))]
    pub password: Option<String>,
    #[validate(range(min = 1))]
    pub role_id: Option<i64>,
    pub is_active: Option<bool>,
}

/// Fields written by the repository on insert, after hashing.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
    pub is_active: bool,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFieldsFilter {
    /// Comma separated ids.
    pub id: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role_id: Option<i64>,
    pub is_active: Option<bool>,
    /// Free text over username, email and name; applied by the repository.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// `YYYY-MM-DD`
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub user: UserFieldsFilter,
    pub audit: AuditFilter,
}

const USER_FIELDS: &[FilterField<UserFilter>] = &[
    FilterField {
        column: "id",
        mode: MatchMode::In,
        value: |f| f.user.id.clone().map(FilterValue::Text),
    },
    FilterField {
        column: "username",
        mode: MatchMode::ILike,
        value: |f| f.user.username.clone().map(FilterValue::Text),
    },
    FilterField {
        column: "name",
        mode: MatchMode::ILike,
        value: |f| f.user.name.clone().map(FilterValue::Text),
    },
    FilterField {
        column: "email",
        mode: MatchMode::ILike,
        value: |f| f.user.email.clone().map(FilterValue::Text),
    },
    FilterField {
        column: "role_id",
        mode: MatchMode::Equal,
        value: |f| f.user.role_id.map(FilterValue::Int),
    },
    FilterField {
        column: "is_active",
        mode: MatchMode::Equal,
        value: |f| f.user.is_active.map(FilterValue::Bool),
    },
    FilterField {
        column: "search",
        mode: MatchMode::Custom,
        value: |f| f.user.search.clone().map(FilterValue::Text),
    },
];

const AUDIT_FIELDS: &[FilterField<UserFilter>] = &[
    FilterField {
        column: "created_at",
        mode: MatchMode::Date,
        value: |f| f.audit.created_at.clone().map(FilterValue::Text),
    },
    FilterField {
        column: "modified_at",
        mode: MatchMode::DateString,
        value: |f| f.audit.modified_at.clone().map(FilterValue::Text),
    },
    FilterField {
        column: "created_by",
        mode: MatchMode::Equal,
        value: |f| f.audit.created_by.map(FilterValue::Int),
    },
];

const USER_FILTER_GROUPS: &[FilterGroup<UserFilter>] = &[
    FilterGroup {
        name: "user",
        fields: USER_FIELDS,
    },
    FilterGroup {
        name: "audit",
        fields: AUDIT_FIELDS,
    },
];

impl Filterable for UserFilter {
    fn groups() -> &'static [FilterGroup<Self>] {
        USER_FILTER_GROUPS
    }
}

/// Columns a user listing may be ordered by.
pub const USER_ORDER_COLUMNS: &[&str] = &["id", "username", "name", "email", "role_id", "created_at"];

/// Flat query string accepted by `GET /users`.
#[derive(Debug, Clone, Default, FromForm)]
pub struct UserListQuery {
    pub id: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role_id: Option<i64>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub created_by: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub order_by: Option<String>,
    pub order: Option<String>,
}

impl UserListQuery {
    pub fn into_parts(self) -> (UserFilter, PaginationParams) {
        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let filter = UserFilter {
            user: UserFieldsFilter {
                id: non_blank(self.id),
                username: non_blank(self.username),
                name: non_blank(self.name),
                email: non_blank(self.email),
                role_id: self.role_id,
                is_active: self.is_active,
                search: non_blank(self.search),
            },
            audit: AuditFilter {
                created_at: non_blank(self.created_at),
                modified_at: non_blank(self.modified_at),
                created_by: self.created_by,
            },
        };
        let pagination = PaginationParams {
            page: self.page,
            page_size: self.page_size,
            order_by: self.order_by,
            order: self.order.as_deref().and_then(SortOrder::parse),
        };
        (filter, pagination)
    }
}
