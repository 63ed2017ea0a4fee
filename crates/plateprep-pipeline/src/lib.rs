//! plateprep-pipeline: Pure plate pairing and canvas pipeline (sans-IO).
//!
//! Turns the ordered image stream extracted from a PDF (color plates,
//! each optionally followed by a grayscale or bilevel mask) into
//! deduplicated square training canvases:
//!
//! decode -> CMYK normalization -> pair classification -> mask
//! composite -> duplicate recall -> scale-to-fit -> border padding.
//!
//! This crate has **no I/O dependencies** beyond reading optional ICC
//! profile files. Decoding, encoding and directory walking live in
//! `plateprep-io`.

pub mod autocrop;
pub mod border;
pub mod classify;
pub mod color;
pub mod compose;
pub mod naming;
pub mod raster;
pub mod recall;
pub mod types;
pub mod window;

pub use border::guess_border;
pub use classify::masked_by;
pub use color::{ColorNormalizer, Conversion, ProfileError};
pub use compose::Compositor;
pub use naming::{sort_key, sort_naturally};
pub use raster::{CmykImage, ColorMode, PixelValue, Raster, reference_pixel};
pub use recall::{Fingerprint, PerceptualRecall};
pub use types::{
    Canvas, CanvasResult, ImageRecord, InvariantViolation, Outcome, OutcomeTally,
    PipelineConfig, PipelineError, Selection,
};
pub use window::{PairWindow, Step, WindowState};
