//! Download history
//!
//! Records which attachments a user has downloaded, keyed by the user's
//! Gmail address. SQLite is the default backend; Supabase is used when
//! configured.

mod memory;
mod rows;
mod sqlite;
mod supabase;
mod traits;

pub use memory::InMemoryHistoryStore;
pub use rows::history_rows;
pub use sqlite::SqliteHistoryStore;
pub use supabase::SupabaseHistoryStore;
pub use traits::{HistoryRow, HistoryStore};
