use base64::Engine;
use reqwest::RequestBuilder;

use crate::types::types::FetchRequest;

/// Copies the request's custom headers, cookies and auth onto `builder`.
///
/// A caller-supplied `Range` is dropped; progress is always measured
/// against the full body.
pub fn apply_headers(
    mut builder: RequestBuilder,
    request: &FetchRequest,
    precomputed_auth: Option<&str>,
) -> RequestBuilder {
    for (key, values) in &request.headers {
        if key.eq_ignore_ascii_case("range") {
            log::debug!("[apply_headers] skipping Range header for {}", request.url);
            continue;
        }
        for value in values {
            builder = builder.header(key, value);
        }
    }
    if let Some(cookies) = &request.cookies {
        builder = builder.header("Cookie", cookies);
    }
    if let Some(auth_value) = precomputed_auth {
        builder = builder.header("Authorization", auth_value);
    }
    builder
}

/// `Basic <base64(user:pass)>`, if the request carries credentials.
pub fn basic_auth_value(request: &FetchRequest) -> Option<String> {
    request.authentication.as_ref().map(|auth| {
        let credentials = format!("{}:{}", auth.username, auth.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        format!("Basic {}", encoded)
    })
}
