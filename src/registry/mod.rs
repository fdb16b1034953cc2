//! Dish and gallery operations.
//!
//! Validation and image policy live here; atomicity is delegated to the [`Store`](crate::db::Store).

mod dishes;
mod gallery;

pub use dishes::*;
pub use gallery::*;
