use super::PlacementError;

/// One-based page selection for listing queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Result<Self, PlacementError> {
        if page == 0 || limit == 0 {
            return Err(PlacementError::validation(
                "page and limit must be positive integers",
            ));
        }
        Ok(Self { page, limit })
    }

    /// Parse raw query values. Absent values fall back to page 1 and `default_limit`;
    /// present values must be positive integers.
    pub fn from_query(
        page: Option<&str>,
        limit: Option<&str>,
        default_limit: u64,
    ) -> Result<Self, PlacementError> {
        let page = match page {
            Some(raw) => parse_positive(raw, "page")?,
            None => 1,
        };
        let limit = match limit {
            Some(raw) => parse_positive(raw, "limit")?,
            None => default_limit,
        };
        Self::new(page, limit)
    }

    /// Number of records to skip before this page starts.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Total number of pages needed to hold `total` records.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

fn parse_positive(raw: &str, name: &str) -> Result<u64, PlacementError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(PlacementError::validation(format!(
            "{name} must be a positive integer"
        ))),
    }
}
