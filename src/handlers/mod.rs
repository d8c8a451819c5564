pub use placement_actix::handlers::*;
