use std::sync::LazyLock;

use regex::Regex;

/// Hard cap on sanitized user input, in characters.
pub const MAX_INPUT_CHARS: usize = 2000;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("Valid regex pattern"));
static IFRAME_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<iframe\b.*?</iframe>").expect("Valid regex pattern"));
static JAVASCRIPT_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("Valid regex pattern"));
static EVENT_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bon\w+\s*=").expect("Valid regex pattern"));

/// Strips markup injection vectors from free text, caps it at
/// [`MAX_INPUT_CHARS`] and trims surrounding whitespace.
pub fn sanitize(text: &str) -> String {
    let stripped = SCRIPT_BLOCK.replace_all(text, "");
    let stripped = IFRAME_BLOCK.replace_all(&stripped, "");
    let stripped = JAVASCRIPT_URI.replace_all(&stripped, "");
    let stripped = EVENT_HANDLER.replace_all(&stripped, "");

    let truncated: String = match stripped.char_indices().nth(MAX_INPUT_CHARS) {
        Some((cut, _)) => stripped[..cut].to_owned(),
        None => stripped.into_owned(),
    };

    truncated.trim().to_owned()
}
