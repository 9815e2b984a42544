// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

#[cfg(feature = "memory")]
pub use memory::EdgeMemoryStore;
#[cfg(feature = "memory")]
pub(crate) use memory::EdgeTable;
pub use traits::EdgeStore;
