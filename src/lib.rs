//! Descriptor lifecycle cache for path-based handles.
//!
//! [`DateSortedDescriptors`] tracks every open handle with the time it was added and
//! last used; [`Conditions`] selects entries by age; [`AutoclosePolicy`] closes what
//! they select within a min/max window. [`DescriptorCache`] wraps all of it behind a
//! mutex for shared use, and [`files`] supplies file handles and a process-wide default.

pub mod error;
pub mod time;
pub mod descriptors;
pub mod conditions;
pub mod openable;
pub mod autoclose;
pub mod config;
pub mod cache;
pub mod files;

pub use autoclose::{AutoclosePolicy, AutocloseReport};
pub use cache::{DescriptorCache, DescriptorInfo, InsertOutcome};
pub use conditions::{Conditions, Period, Threshold};
pub use config::AutocloseConfig;
pub use descriptors::{DateSortedDescriptors, Entry, Inserted, Priority};
pub use error::{CloseError, DescriptorError, DescriptorResult};
pub use files::{FileCache, OpenFile, OpenMode};
pub use openable::Openable;
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
