use serde::Serialize;

/// Standard success envelope: `{success, message, data}`.
/// Error responses carry the same shape with an `error` object instead of
/// `data`; those are produced by `AppError::into_response`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Paginated collection envelope.
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, page: u32, limit: u32, total: i64) -> Self {
        let per_page = limit.max(1) as u64;
        let total_pages = ((total.max(0) as u64 + per_page - 1) / per_page) as u32;
        Self {
            items,
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let p: Paginated<i32> = Paginated::new(vec![1, 2, 3], 1, 3, 7);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);
    }

    #[test]
    fn test_pagination_last_page() {
        let p: Paginated<i32> = Paginated::new(vec![7], 3, 3, 7);
        assert!(!p.has_next);
        assert!(p.has_prev);
    }

    #[test]
    fn test_pagination_empty() {
        let p: Paginated<i32> = Paginated::new(vec![], 1, 10, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_prev);
    }
}
