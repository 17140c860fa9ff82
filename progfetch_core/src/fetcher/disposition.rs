//! File naming for fetched bodies.

/// Extracts the filename from a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*=UTF-8''...` form wins over a plain `filename=`
/// when both are present.
pub fn extract_filename(disposition: &str) -> Option<String> {
    param_value(disposition, "filename*")
        .and_then(decode_ext_value)
        .or_else(|| param_value(disposition, "filename").map(|v| v.trim_matches('"').to_string()))
        .filter(|name| !name.is_empty())
}

/// Picks a local file name for a fetched resource: the server's
/// `Content-Disposition` first, then the last URL path segment, then a
/// random `download-<uuid>.bin`.
pub fn suggest_file_name(url: &str, disposition: Option<&str>) -> String {
    disposition
        .and_then(extract_filename)
        .or_else(|| last_path_segment(url))
        .map(|name| sanitize(&name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("download-{}.bin", uuid::Uuid::new_v4()))
}

/// Value of `name=` among the `;`-separated parameters, matched
/// case-insensitively.
fn param_value<'a>(disposition: &'a str, name: &str) -> Option<&'a str> {
    disposition.split(';').find_map(|part| {
        let (k, v) = part.split_once('=')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

/// `charset'language'percent-encoded`; only UTF-8 is understood.
fn decode_ext_value(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    Some(percent_decode(encoded))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn last_path_segment(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(percent_decode(segment))
}

/// Keeps the name inside the output directory.
fn sanitize(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    match cleaned.trim() {
        "." | ".." => String::new(),
        other => other.to_string(),
    }
}
