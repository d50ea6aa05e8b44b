//! Reapers for abandoned registry uploads.
//!
//! Two independent passes run per repository:
//! - [`multipart::reap_multipart_uploads`] aborts stale multipart uploads
//! - [`folders::reap_upload_folders`] deletes staging folders whose
//!   `startedat` marker is stale
//!
//! [`Sweeper`] enumerates repositories and drives both passes, folding their
//! reports into a [`SweepStats`].

pub mod error;
pub mod folders;
pub mod multipart;
pub mod stats;
pub mod sweeper;

pub use error::{SweepError, SweepResult};
pub use folders::{marker_age, reap_upload_folders};
pub use multipart::reap_multipart_uploads;
pub use stats::{FolderReport, MultipartReport, SweepStats};
pub use sweeper::Sweeper;
