//! Archive Common - Slack History Extraction
//!
//! Shared logic for the archiver primitives: the message model, the
//! top-level message filter, the windowed history walk and the encodings
//! used by the sinks.
//!
//! The HTTP transports live in the binaries; this crate only sees them
//! through [`HistoryApi`].

pub mod error;
pub mod history;
pub mod message;
pub mod ndjson;
pub mod rows;
pub mod window;

pub use error::{ArchiveError, Result, Severity};
pub use history::{DEFAULT_BOUNDARY_EPSILON, HistoryApi, HistoryPage, HistoryReader};
pub use message::{Message, is_interested_message};
pub use ndjson::NdjsonWriter;
pub use window::HistoryWindow;
