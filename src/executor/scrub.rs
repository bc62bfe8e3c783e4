//! Path scrubbing for backend error messages
//!
//! Backend errors routinely embed file locations. Anything that looks like
//! a filesystem path or `file://` URL is replaced before a message leaves
//! the executor.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dataset::Dataset;

const PATH_MARKER: &str = "<path>";

static FILE_URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"file://[^\s'"`]+"#).unwrap());

static UNIX_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Two or more segments rooted at '/', preceded by start or a delimiter
    Regex::new(r#"(^|[\s'"`(\[=:,.])/(?:[^\s'"`/]+/)+[^\s'"`/,)\]]*"#).unwrap()
});

static WINDOWS_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[A-Za-z]:\\(?:[^\s'"`\\]+\\)*[^\s'"`\\,)\]]*"#).unwrap());

/// Removes filesystem locations from `message`.
pub fn scrub_paths(message: &str, dataset: &Dataset) -> String {
    let mut scrubbed = message.to_string();

    let dataset_path = dataset.path.to_string_lossy();
    if !dataset_path.is_empty() {
        scrubbed = scrubbed.replace(dataset_path.as_ref(), PATH_MARKER);
    }

    scrubbed = FILE_URL_REGEX.replace_all(&scrubbed, PATH_MARKER).to_string();
    scrubbed = UNIX_PATH_REGEX
        .replace_all(&scrubbed, format!("${{1}}{}", PATH_MARKER))
        .to_string();
    scrubbed = WINDOWS_PATH_REGEX
        .replace_all(&scrubbed, PATH_MARKER)
        .to_string();

    scrubbed
}
