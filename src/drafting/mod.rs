//! Fan-out drafting: split a template into tasks, draft each task, merge the
//! partial drafts back into one document.

pub mod merge;
pub mod splitter;
pub mod worker;

pub use merge::{MergeRequest, MergeStage, MergedDocument, deduplicate_sections, merge, order_drafts};
pub use splitter::{SplitRequest, Task, TaskSplitter, split};
pub use worker::{DraftMetadata, DraftingWorker, PartialDraft, scan_headings, scan_placeholders};
