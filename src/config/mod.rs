pub use placement_actix::AppSettings;
pub use placement_config::*;
