//! # Events Module
//!
//! The engine never calls into the UI. Instead it emits events through a
//! channel: bucket lifecycle notifications (about-to-reset, reset-complete,
//! row-changed, rows-reordered), scan progress and worker failures.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//! let mut catalog = Catalog::builder().events(sender).build();
//!
//! catalog.scan("renders", "/jobs/show/shot010/renders".as_ref())?;
//! for event in receiver.drain() {
//!     if let Event::Bucket(BucketEvent::RowChanged { row, .. }) = event {
//!         view.repaint_row(row);
//!     }
//! }
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
