//! Page text decoding.

use std::borrow::Cow;
use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;

/// `charset=` inside a `<meta>` tag, both the `http-equiv` and the short form.
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?([a-z0-9_.:\-]+)"#)
        .expect("valid meta charset pattern")
});

/// Charset declared by the first `<meta>` tag that names one.
///
/// UTF-16 labels resolve to UTF-8, as browsers do for declarations found in
/// an ASCII-compatible document.
pub fn meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let caps = META_CHARSET.captures(bytes)?;
    Encoding::for_label(&caps[1]).map(Encoding::output_encoding)
}

/// Decode a fetched page to text.
///
/// A byte order mark wins, then the `<meta>` charset, then UTF-8.
/// Undecodable sequences become U+FFFD.
pub fn decode_page(bytes: &[u8]) -> Cow<'_, str> {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| meta_charset(bytes))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::debug!("Page is not valid {}, replaced broken sequences", used.name());
    }
    text
}
