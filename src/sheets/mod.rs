pub mod client;
pub mod error;
pub mod types;

pub use client::{SheetsClient, WorkItemStore};
pub use error::SheetsError;
pub use types::{
    COL_CONTENT, COL_IMAGE_URL, COL_ITERATION, COL_LOCK, COL_MODERATOR_NOTE, COL_STATUS,
    COL_TITLE, LockStamp, REQUIRED_COLUMNS, RowStatus, WorkItem, column_to_a1, lock_expired,
};
