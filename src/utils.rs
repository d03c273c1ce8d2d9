use std::time::Duration;
use unicode_segmentation::UnicodeSegmentation;

/// Truncates a given string to a specified maximum width, appending an ellipsis (`…`)
/// if the string exceeds the specified width. Handles Unicode grapheme clusters properly.
///
/// # Parameters
/// - `message`: The input string to be truncated.
/// - `max_width`: The maximum allowed display width of the string, including the space for the ellipsis.
///   Must be at least 2 to accommodate the ellipsis.
///
/// # Panics
/// Panics if `max_width` is less than 2.
///
/// # Examples
/// ```rust
/// use queryprobe::utils::truncate_message;
///
/// let message = "Hello World";
/// let truncated = truncate_message(message, 6);
/// assert_eq!(truncated, "Hello…");
///
/// let short_message = "Hi";
/// let truncated = truncate_message(short_message, 5);
/// assert_eq!(truncated, "Hi");
/// ```
pub fn truncate_message(message: &str, max_width: usize) -> String {
    assert!(
        max_width >= 2,
        "max_width must be at least 2 to accommodate the ellipsis"
    );

    let graphemes: Vec<&str> = message.graphemes(true).collect();

    if graphemes.len() > max_width {
        let truncated: String = graphemes[..max_width - 1].concat();
        format!("{}…", truncated)
    } else {
        message.to_string()
    }
}

/// Percent-encodes a property URI so it can be used as a single path segment
/// of the reporting endpoint.
///
/// Every reserved character is encoded, including `/` and `:`. Spaces become
/// `%20` rather than the form-encoding `+`.
///
/// # Example
///
/// ```rust
/// use queryprobe::utils::encode_path_segment;
///
/// assert_eq!(
///     encode_path_segment("https://www.example.com/"),
///     "https%3A%2F%2Fwww.example.com%2F"
/// );
/// assert_eq!(encode_path_segment("sc-domain:example.com"), "sc-domain%3Aexample.com");
/// ```
pub fn encode_path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Validates that a path given on the command line or in a config file is
/// usable, expanding a leading `~` and environment variables.
pub fn expand_path(value: &str) -> Result<std::path::PathBuf, String> {
    shellexpand::full(value)
        .map(|expanded| std::path::PathBuf::from(expanded.as_ref()))
        .map_err(|e| format!("Invalid path '{}': {}", value, e))
}

pub fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

pub fn ms(duration: Duration) -> String {
    let milliseconds = duration.as_millis() as f64;
    format!("{milliseconds:.2}ms")
}
