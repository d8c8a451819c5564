pub use placement_core::*;
