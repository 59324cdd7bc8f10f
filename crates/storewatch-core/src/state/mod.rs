// # Shared State
//
// Process-wide records owned by the poll loops.
//
// - `monitor`: website monitoring state (single writer: `WebsiteMonitor`)
// - `cursor`: order cursor (single writer: `OrderPoller`)
// - `memory`: in-memory `OrderSource` for tests and embedding
//
// Nothing here is persisted. Readers take snapshots; no lock is held across
// an await on I/O.

pub mod cursor;
pub mod memory;
pub mod monitor;

pub use cursor::{CursorSnapshot, OrderCursor};
pub use memory::MemoryOrderSource;
pub use monitor::{MonitorSnapshot, MonitorState};
