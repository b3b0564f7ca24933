//! Built-in extension/MIME type table
//!
//! Each MIME type maps to a list of extensions; the first one is the
//! preferred extension used when a name has to be completed. Lookups by
//! extension return the first MIME type (in table order) listing it.

/// MIME type → extensions, first extension preferred
const MIME_TABLE: &[(&str, &[&str])] = &[
    ("text/html", &["html", "htm", "shtml", "shtm"]),
    ("text/css", &["css"]),
    ("text/xml", &["xml"]),
    ("image/gif", &["gif"]),
    ("image/jpeg", &["jpeg", "jpg", "jpe", "jfif", "pjpeg", "pjp"]),
    ("image/png", &["png"]),
    ("image/webp", &["webp"]),
    ("image/bmp", &["bmp"]),
    ("image/x-icon", &["ico"]),
    ("image/svg+xml", &["svg", "svgz"]),
    ("image/tiff", &["tiff", "tif"]),
    ("video/mp4", &["mp4", "m4v"]),
    ("audio/x-m4a", &["m4a"]),
    ("audio/mp3", &["mp3"]),
    ("audio/mpeg", &["mp3"]),
    ("video/ogg", &["ogv", "ogm"]),
    ("audio/ogg", &["ogg", "oga", "opus"]),
    ("video/webm", &["webm"]),
    ("audio/webm", &["webm"]),
    ("audio/wav", &["wav"]),
    ("audio/flac", &["flac"]),
    ("application/xhtml+xml", &["xhtml", "xht", "xhtm"]),
    ("application/pdf", &["pdf"]),
    ("application/postscript", &["ps", "eps", "ai"]),
    ("application/json", &["json"]),
    ("application/zip", &["zip"]),
    ("application/gzip", &["gz", "tgz"]),
    ("application/x-tar", &["tar"]),
    ("application/rtf", &["rtf"]),
    ("application/rdf+xml", &["rdf"]),
    ("application/rss+xml", &["rss"]),
    ("application/epub+zip", &["epub"]),
    ("application/x-shockwave-flash", &["swf", "swl"]),
    ("application/x-x509-ca-cert", &["cer", "crt"]),
    ("application/javascript", &["js"]),
    ("application/x-javascript", &["js"]),
    ("text/javascript", &["js"]),
    ("application/octet-stream", &["exe", "com", "bin"]),
    ("text/csv", &["csv"]),
    ("text/plain", &["txt", "text"]),
    ("multipart/related", &["mhtml", "mht"]),
];

/// Strip parameters and lowercase a MIME type for comparison
pub fn normalize(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Whether two MIME types are the same, ignoring case and parameters
pub fn matches(a: &str, b: &str) -> bool {
    let a = normalize(a);
    !a.is_empty() && a == normalize(b)
}

/// MIME type for an extension (no leading dot, any case)
pub fn mime_type_from_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(_, exts)| exts.contains(&extension.as_str()))
        .map(|(mime, _)| *mime)
}

/// All known extensions for a MIME type, preferred first
pub fn extensions_for_mime_type(mime_type: &str) -> &'static [&'static str] {
    let mime_type = normalize(mime_type);
    MIME_TABLE
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, exts)| *exts)
        .unwrap_or(&[])
}

/// Preferred extension for a MIME type
pub fn preferred_extension_for_mime_type(mime_type: &str) -> Option<&'static str> {
    extensions_for_mime_type(mime_type).first().copied()
}

/// Whether content of this MIME type can run code when opened
///
/// `text/javascript*` and every `application/*` type except XML flavors.
pub fn is_executable_mime_type(mime_type: &str) -> bool {
    let mime_type = normalize(mime_type);
    if mime_type.starts_with("text/javascript") {
        return true;
    }
    match mime_type.strip_prefix("application/") {
        Some(subtype) => subtype != "xml" && !subtype.ends_with("+xml"),
        None => false,
    }
}
