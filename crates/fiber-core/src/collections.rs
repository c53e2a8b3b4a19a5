//! Map types used across the runtime. `hashbrown` by default; the
//! `std-hash` feature switches to the standard library's maps.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}
