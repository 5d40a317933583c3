use crate::error::{CollectError, CollectResult};

pub const LABEL_DELIMITER: char = ')';
pub const DEFAULT_LABEL_WINDOW: usize = 5;

/// Take the `window` characters that follow the first `)` in a sample filename.
///
/// A filename that ends early yields a shorter label rather than an error; only a missing
/// delimiter is rejected.
pub fn extract_label(filename: &str, window: usize) -> CollectResult<String> {
    let (_, rest) = filename
        .split_once(LABEL_DELIMITER)
        .ok_or_else(|| CollectError::MalformedFilename {
            filename: filename.to_string(),
        })?;

    Ok(rest.chars().take(window).collect())
}
