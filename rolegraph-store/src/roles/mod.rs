// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

#[cfg(feature = "memory")]
pub use memory::RoleMemoryStore;
#[cfg(feature = "memory")]
pub(crate) use memory::RoleTable;
pub use traits::RoleStore;
#[cfg(any(test, feature = "test_utils"))]
pub use traits::RoleTestExt;
