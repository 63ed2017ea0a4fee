//! Natural ordering for extracted image names.
//!
//! Extractors name files `prefix-N.ext` with an unpadded or inconsistently
//! padded counter. Left-padding the counter to six digits makes plain
//! string comparison follow numeric order.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Width numeric suffixes are padded to.
pub const SUFFIX_WIDTH: usize = 6;

#[allow(clippy::expect_used)]
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d+)\.").expect("literal pattern is valid"));

/// Sort key for `path`: every `-<digits>.` run is rewritten with the digits
/// zero-padded to [`SUFFIX_WIDTH`]. Names without such a run are
/// returned as-is.
#[must_use]
pub fn sort_key(path: &Path) -> String {
    let name = path.to_string_lossy();
    NUMBERED
        .replace_all(&name, |caps: &regex::Captures<'_>| {
            let digits = caps[1].trim_start_matches('0');
            format!("-{digits:0>SUFFIX_WIDTH$}.")
        })
        .into_owned()
}

/// Sort `paths` by [`sort_key`].
pub fn sort_naturally(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|path| sort_key(path));
}
