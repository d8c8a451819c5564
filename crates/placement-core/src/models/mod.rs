pub mod blob;
pub mod claims;
pub mod error;
pub mod page;
pub mod response;
pub mod update;
pub mod user;
pub mod view;

pub use blob::*;
pub use claims::*;
pub use error::*;
pub use page::*;
pub use response::*;
pub use update::*;
pub use user::*;
pub use view::*;
