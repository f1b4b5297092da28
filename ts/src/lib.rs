//! TripStore - durable record storage
//!
//! Records are serialized as JSON and kept in a single SQLite database, one
//! logical collection per record type. Fields a record wants to be queried by
//! are written to a side index table so `list` can filter without decoding
//! every row.
//!
//! ```text
//! <store dir>/
//! └── tripstore.db
//!     ├── records         (collection, id, data, updated_at)
//!     └── record_indexes  (collection, id, field, value)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tripstore::{Filter, FilterOp, IndexValue, Store};
//!
//! let mut store = Store::open(".tripstore")?;
//! store.update(share)?;
//! let active: Vec<Share> = store.list(&[Filter::eq("trip_id", IndexValue::String(trip_id))])?;
//! ```

mod record;
mod store;

pub use record::{Filter, FilterOp, IndexValue, Record};
pub use store::{DB_FILE_NAME, Store};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
