//! SuMsy Store - transactional item table and ledger views
//!
//! `Table` is the storage seam. `MemoryTable` and `SqliteTable` implement
//! it; `Ledgers` reads and writes typed records on top of any table.

pub mod error;
pub mod ledgers;
pub mod memory;
pub mod sqlite;
pub mod table;

pub use error::StoreError;
pub use ledgers::{LedgerTransaction, Ledgers, DEFAULT_HISTORY_LIMIT};
pub use memory::MemoryTable;
pub use sqlite::SqliteTable;
pub use table::{Condition, ItemKey, Table, WriteOp};
