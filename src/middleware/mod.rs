pub use placement_actix::middleware::*;
pub use placement_observability::actix::MetricsMiddleware;
