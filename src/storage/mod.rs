pub use placement_storage_factory::{create_storage, db_system_for, DynStorage, ObservedStorage, Storage};
pub use placement_ports::{read_to_end, BlobStore, ByteStream, UserStore};

pub use placement_storage_factory::sqlx;

#[cfg(feature = "mongo")]
pub use placement_storage_factory::mongo;
