// SPDX-License-Identifier: MIT OR Apache-2.0

/// Macro to run the same test logic against all store backend implementations.
///
/// This macro takes a closure that will be executed against each store type:
/// - In-memory store (`MemoryStore`)
/// - SQLite store (`SqliteStore`)
///
/// The test body is responsible for starting and finishing transactions. The SQLite store is
/// limited to one connection, pooled reads need to happen _after_ a transaction was committed.
///
/// ## Example
///
/// ```rust
/// # use rolegraph_store::{assert_all_stores, RoleStore, Transaction};
/// # async fn run() {
/// assert_all_stores!(|store| async {
///     let permit = store.begin().await.unwrap();
///     let role = store.insert_role("Admin", "admin").await.unwrap();
///     store.commit(permit).await.unwrap();
///     assert!(role.is_some());
/// });
/// # }
/// ```
#[macro_export]
macro_rules! assert_all_stores {
    (|$store:ident| $test_body:expr) => {
        // Test with MemoryStore.
        {
            let $store = $crate::memory::MemoryStore::new();
            $test_body.await;
        }

        // Test with SqliteStore.
        {
            let $store = $crate::sqlite::SqliteStoreBuilder::new()
                .random_memory_url()
                // We're running in a single test thread and can't have more parallel connections.
                .max_connections(1)
                // Small batches to exercise statement chunking.
                .max_batch_size(2)
                .build()
                .await
                .unwrap();
            $test_body.await;
        }
    };
}
