// The infra module contains implementations of core traits.
// Each integration gets its own submodule.

#[path = "credentials/file_store.rs"]
pub mod credentials;

#[path = "google/mod.rs"]
pub mod google;

#[path = "attendance/http_client.rs"]
pub mod attendance;

#[path = "documents/sqlite_store.rs"]
pub mod documents;
