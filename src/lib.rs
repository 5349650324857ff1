//! Hierarchical filesystem view over a flat object-store bucket.
//!
//! Directories are emulated as key prefixes: creating one writes a `dir/`
//! marker, deleting one drains every object under the prefix, and listing
//! groups keys on `/` into files and subdirectories.
//!
//! ```no_run
//! use bucketfs::{adapters::memory::MemoryClient, Config, ObjectFS};
//!
//! let fs = ObjectFS::new(Box::new(MemoryClient::new()), "bucket");
//! fs.write("docs/readme.txt", b"hello", &Config::new())?;
//!
//! for entry in fs.list_contents("docs", true) {
//!     println!("{}", entry?.path());
//! }
//! # Ok::<(), bucketfs::FilesystemError>(())
//! ```

pub mod adapters;
pub mod error;
pub mod fs;
pub mod listing;
pub mod model;
pub mod options;
pub mod util;

pub use adapters::ObjectClient;
pub use error::{FilesystemError, MetadataKind};
pub use fs::{ObjectFS, ReadStream};
pub use listing::ListContents;
pub use model::fs::{DirectoryAttributes, FileAttributes, StorageAttributes, Visibility};
pub use options::{Config, OptionValue, Options};
