use rocket::serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Page-based pagination for list queries.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    pub page: Option<i64>,
    /// Items per page. Defaults to 10, capped at 100.
    pub page_size: Option<i64>,
    pub order_by: Option<String>,
    pub order: Option<SortOrder>,
}

impl PaginationParams {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;
    pub const MAX_PAGE_SIZE: i64 = 100;

    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn page_size(&self) -> i64 {
        match self.page_size {
            Some(size) if size > Self::MAX_PAGE_SIZE => Self::MAX_PAGE_SIZE,
            Some(size) if size > 0 => size,
            _ => Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }

    /// `ORDER BY` clause restricted to `allowed` columns; anything else falls
    /// back to `id DESC`.
    pub fn order_clause(&self, allowed: &[&'static str]) -> String {
        let column = self
            .order_by
            .as_deref()
            .and_then(|requested| allowed.iter().copied().find(|c| *c == requested))
            .unwrap_or("id");
        let order = self.order.unwrap_or(SortOrder::Desc);
        format!(" ORDER BY {} {}", column, order.as_sql())
    }
}

/// Paginated response wrapper with metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    /// Total number of items across all pages
    pub total_items: i64,
    pub total_pages: i64,
    pub more_records: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, page_size: i64, total_items: i64) -> Self {
        let total_pages = if page_size > 0 { (total_items + page_size - 1) / page_size } else { 1 };

        Self {
            data,
            page,
            page_size,
            total_items,
            total_pages,
            more_records: page < total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_ten() {
        let params = PaginationParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.page_size(), 10);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn page_size_is_capped_and_non_positive_values_fall_back() {
        let big = PaginationParams {
            page_size: Some(500),
            ..PaginationParams::default()
        };
        assert_eq!(big.page_size(), 100);

        let zero = PaginationParams {
            page: Some(0),
            page_size: Some(0),
            ..PaginationParams::default()
        };
        assert_eq!(zero.page(), 1);
        assert_eq!(zero.page_size(), 10);
    }

    #[test]
    fn offset_uses_effective_page_size() {
        let params = PaginationParams {
            page: Some(3),
            page_size: Some(250),
            ..PaginationParams::default()
        };
        assert_eq!(params.offset(), 200);
    }

    #[test]
    fn huge_page_number_saturates_the_offset() {
        let params = PaginationParams {
            page: Some(i64::MAX),
            page_size: Some(100),
            ..PaginationParams::default()
        };
        assert_eq!(params.offset(), i64::MAX);
    }

    #[test]
    fn order_clause_only_accepts_whitelisted_columns() {
        let allowed = ["id", "username"];
        let ok = PaginationParams {
            order_by: Some("username".to_string()),
            order: Some(SortOrder::Asc),
            ..PaginationParams::default()
        };
        assert_eq!(ok.order_clause(&allowed), " ORDER BY username ASC");

        let injected = PaginationParams {
            order_by: Some("id; DROP TABLE users".to_string()),
            ..PaginationParams::default()
        };
        assert_eq!(injected.order_clause(&allowed), " ORDER BY id DESC");
    }

    #[test]
    fn paginated_response_computes_pages() {
        let response = PaginatedResponse::new(vec![1, 2], 1, 2, 5);
        assert_eq!(response.total_pages, 3);
        assert!(response.more_records);

        let last = PaginatedResponse::new(vec![5], 3, 2, 5);
        assert!(!last.more_records);
    }

    #[test]
    fn sort_order_parses_case_insensitively() {
        assert_eq!(SortOrder::parse("ASC"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse(" desc "), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("sideways"), None);
    }
}
