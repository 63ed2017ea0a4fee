//! plateprep-io: Filesystem side of plateprep.
//!
//! Decodes input files (with a direct TIFF path for CMYK data), encodes
//! canvases, walks input directories in natural order and drives
//! [`plateprep_pipeline`] over them through [`DirectoryPipeline`].

pub mod config;
pub mod decode;
pub mod directory;
pub mod encode;
pub mod walk;

pub use config::{ConfigError, RunConfig};
pub use decode::{DecodeError, decode};
pub use directory::{DirectoryPipeline, FileReport};
pub use encode::{EncodeError, OutputFormat, SaveParams, encode_canvas};
pub use walk::collect_files;
