//! A stream relay in the spirit of `/dev/null`, `tee` and `md5sum`.
//!
//! [`StreamPump`] reads one input stream and fans it out to standard output
//! and any number of files, optionally throttled to a byte rate, with
//! progress dots, a periodic rate line and an MD5 signature of everything
//! relayed. Streams can be framed in-band with the [`pagination`] escapes so
//! a downstream reader detects truncation.
//!
//! ```rust
//! use std::io::Cursor;
//!
//! use nullpipe::{Blocking, PumpOptions, SharedBuf, Sinks, StreamPump};
//!
//! let out = SharedBuf::new();
//! let options = PumpOptions {
//!     pass_through: true,
//!     write_pagination: true,
//!     ..Default::default()
//! };
//! let sinks = Sinks::new().with_pass_through(out.clone());
//! StreamPump::new(options, Blocking(Cursor::new(b"ab".to_vec())), sinks)
//!     .unwrap()
//!     .run()
//!     .unwrap();
//! assert_eq!(out.contents(), b"null-page-sabnull-page-e");
//! ```

mod buffer;
#[cfg(any(test, feature = "fuzzing"))]
mod chunk_utils;
mod digest;
mod error;
mod input;
mod options;
pub mod pagination;
mod pump;
mod report;
mod sink;
pub mod throttle;


#[cfg(any(test, feature = "fuzzing"))]
#[doc(hidden)]
pub use chunk_utils::{produce_chunks, produce_split_chunks};
pub use digest::{IncrementalDigest, Md5, Signature};
pub use error::{ConfigError, PaginationError, PumpError};
#[cfg(unix)]
pub use input::NonBlocking;
pub use input::{Blocking, ReadOutcome, Source};
pub use options::{DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE, PumpOptions};
pub use pump::{PumpReport, StreamPump};
pub use report::byte_size;
pub use sink::{FileSink, SharedBuf, Sinks};
