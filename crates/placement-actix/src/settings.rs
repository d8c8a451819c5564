/// Request-handling knobs shared with handlers through `web::Data<AppSettings>`.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Largest accepted avatar upload, in bytes.
    pub avatar_max_bytes: usize,
    /// `limit` used by paginated listings when the query omits it.
    pub default_page_size: u64,
    /// Whether a listing page with zero items is reported as 404.
    pub empty_page_is_not_found: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            avatar_max_bytes: 5 * 1024 * 1024,
            default_page_size: 10,
            empty_page_is_not_found: true,
        }
    }
}
