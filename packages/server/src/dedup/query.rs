use sea_orm::Order;

/// Predicates for listing references. Every field is optional; set fields
/// are combined with AND.
#[derive(Debug, Clone, Default)]
pub struct ReferenceFilter {
    /// Case-insensitive substring of the original filename.
    pub filename_contains: Option<String>,
    /// Inclusive lower bound on the blob size in bytes.
    pub min_size: Option<i64>,
    /// Inclusive upper bound on the blob size in bytes.
    pub max_size: Option<i64>,
    /// Media types to accept (OR). Empty means any.
    pub media_types: Vec<String>,
    /// Inclusive lower bound, custom-epoch milliseconds.
    pub uploaded_after_ms: Option<i64>,
    /// Inclusive upper bound, custom-epoch milliseconds.
    pub uploaded_before_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    UploadedAt,
    OriginalFilename,
    Size,
}

/// Ordering for reference listings. Ties are always broken by reference id
/// in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for ReferenceSort {
    /// Newest uploads first.
    fn default() -> Self {
        Self {
            field: SortField::UploadedAt,
            descending: true,
        }
    }
}

impl ReferenceSort {
    /// Parse an ordering parameter such as `-uploaded_at` or `size`.
    /// A leading `-` means descending.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name {
            "uploaded_at" | "uploaded_at_epoch" => SortField::UploadedAt,
            "original_filename" | "filename" => SortField::OriginalFilename,
            "size" => SortField::Size,
            _ => return None,
        };
        Some(Self { field, descending })
    }

    pub fn order(&self) -> Order {
        if self.descending {
            Order::Desc
        } else {
            Order::Asc
        }
    }
}

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.per_page
    }
}

/// Escape LIKE wildcard characters in a search string.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
