//! Filename generation for new downloads
//!
//! A name is picked from the Content-Disposition header, the URL or a default,
//! sanitized, given an extension consistent with the declared MIME type, and
//! finally escaped if it collides with a reserved device name.

use std::path::{Path, PathBuf};

use url::Url;

use crate::mime;
use crate::safety::{SafetyPolicy, is_shell_integrated_extension};

/// Name used when neither the server nor the URL suggests one
pub const DEFAULT_FILENAME: &str = "download";

/// Placeholder extension for names whose extension had to be discarded
pub const DEFAULT_EXTENSION: &str = "download";

/// Build the file name (no directory) a download should be saved under
pub fn generate_filename(
    url: &str,
    content_disposition: Option<&str>,
    mime_type: &str,
    policy: &SafetyPolicy,
) -> PathBuf {
    let mut name = PathBuf::from(suggested_filename(url, content_disposition, DEFAULT_FILENAME));

    let extension = generate_extension(&name, mime_type, policy);
    name.set_extension(extension);

    escape_reserved_name(&name)
}

/// Pick a raw file name from the disposition header, the URL or `default_name`
///
/// The result is already sanitized and never empty.
pub fn suggested_filename(url: &str, content_disposition: Option<&str>, default_name: &str) -> String {
    if let Some(name) = content_disposition
        .and_then(parse_content_disposition)
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty())
    {
        return name;
    }

    if let Ok(parsed) = Url::parse(url) {
        let from_path = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| segment.to_string())
            })
            .map(|name| sanitize_filename(&name))
            .filter(|name| !name.is_empty());
        if let Some(name) = from_path {
            return name;
        }

        if let Some(host) = parsed.host_str().map(sanitize_filename)
            && !host.is_empty()
        {
            return host;
        }
    }

    default_name.to_string()
}

/// Extract the file name from a Content-Disposition header
///
/// `filename*=` (RFC 5987, percent-encoded) wins over `filename=`. Parameter
/// names match case-insensitively.
pub fn parse_content_disposition(header: &str) -> Option<String> {
    let lower = header.to_ascii_lowercase();

    if let Some(name) = param_value(header, &lower, "filename*=").and_then(decode_ext_value) {
        return Some(name);
    }
    param_value(header, &lower, "filename=").and_then(plain_value)
}

// ASCII lowercasing keeps byte offsets, so a hit in `lower` indexes `header`.
fn param_value<'a>(header: &'a str, lower: &str, param: &str) -> Option<&'a str> {
    let pos = lower.find(param)?;
    Some(header[pos + param.len()..].trim_start())
}

// charset'language'percent-encoded
fn decode_ext_value(value: &str) -> Option<String> {
    let (_charset, rest) = value.split_once('\'')?;
    let (_language, encoded) = rest.split_once('\'')?;
    let encoded = encoded.split(';').next()?.trim().trim_matches('"');
    let decoded = urlencoding::decode(encoded).ok()?;
    (!decoded.is_empty()).then(|| decoded.into_owned())
}

fn plain_value(value: &str) -> Option<String> {
    let name = match value.strip_prefix('"') {
        Some(quoted) => &quoted[..quoted.find('"')?],
        None => value.split(';').next()?.trim(),
    };
    (!name.is_empty()).then(|| name.to_string())
}

/// Replace characters no common filesystem accepts and trim stray dots
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    replaced
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Decide the extension `file_name` should end up with for `mime_type`
///
/// Returns the extension without a leading dot; it may be compound
/// (`"html.pdf"`) when the MIME type's extension is appended. An empty result
/// means the name stays without an extension.
pub fn generate_extension(file_name: &Path, mime_type: &str, policy: &SafetyPolicy) -> String {
    let mut extension = file_name
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();

    if is_shell_integrated_extension(&extension) {
        extension = DEFAULT_EXTENSION.to_string();
    }

    if !extension.is_empty()
        && mime::mime_type_from_extension(&extension).is_some_and(|m| mime::matches(m, mime_type))
    {
        return extension;
    }

    let preferred = preferred_extension(mime_type);

    if policy.is_executable_extension(&extension) && !policy.is_executable_mime_type(mime_type) {
        extension = preferred.unwrap_or(DEFAULT_EXTENSION).to_string();
    }

    match preferred {
        _ if extension.is_empty() => preferred.unwrap_or("").to_string(),
        Some(append)
            if append != "txt"
                && !append.eq_ignore_ascii_case(&extension)
                && !policy.is_executable_extension(append) =>
        {
            format!("{extension}.{append}")
        }
        _ => extension,
    }
}

// A generic binary type says nothing about the content, so it never
// contributes an extension of its own.
fn preferred_extension(mime_type: &str) -> Option<&'static str> {
    if mime::matches(mime_type, "application/octet-stream") {
        return None;
    }
    mime::preferred_extension_for_mime_type(mime_type)
}

/// Whether a file name is a device or shell name the OS treats specially
pub fn is_reserved_name(name: &str) -> bool {
    const DEVICES: &[&str] = &[
        "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
        "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9", "clock$",
    ];
    const SHELL_FILES: &[&str] = &["desktop.ini", "thumbs.db"];

    let lower = name.to_lowercase();
    if SHELL_FILES.contains(&lower.as_str()) {
        return true;
    }
    DEVICES.iter().any(|device| {
        lower == *device
            || lower
                .strip_prefix(device)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Prefix reserved names with `_` so they can be created safely
pub fn escape_reserved_name(file_name: &Path) -> PathBuf {
    let name = file_name.to_string_lossy();
    if is_reserved_name(&name) {
        PathBuf::from(format!("_{name}"))
    } else {
        file_name.to_path_buf()
    }
}
