pub mod avatar;
pub mod health;
pub mod listing;
pub mod user;

pub use avatar::*;
pub use health::*;
pub use listing::*;
pub use user::*;
