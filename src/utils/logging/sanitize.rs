//! Credential redaction for surfaced error text
//!
//! Upstream transport errors can embed the credential used in the failing
//! request (the service authenticates via a `key=` query parameter, and
//! `reqwest` errors include the full URL). Every error string that reaches a
//! progress snapshot, a persisted `error_message`, or the activity log must
//! pass through [`sanitize_error_text`] first.

/// Persisted error messages are capped at this many characters so they stay
/// user-readable and fit the `error_message` column.
pub const MAX_ERROR_LEN: usize = 500;

/// Redact credential-shaped substrings and truncate to [`MAX_ERROR_LEN`].
pub fn sanitize_error_text(input: &str) -> String {
    truncate_chars(&redact_credentials(input), MAX_ERROR_LEN)
}

/// Replace known credential shapes with redaction markers.
///
/// Covers Google-style `AIza…` keys, OpenAI-style `sk-…` keys, `key=`
/// query parameters, and `Bearer` authorization values.
pub fn redact_credentials(input: &str) -> String {
    let patterns: [(&str, &str); 4] = [
        (r"AIza[0-9A-Za-z_\-]{8,}", "API_KEY_REDACTED"),
        (r"sk-[0-9A-Za-z_\-]{8,}", "API_KEY_REDACTED"),
        (r"(?i)key=[0-9A-Za-z_\-.]{8,}", "key=REDACTED"),
        (r"Bearer\s+[0-9A-Za-z_\-.=]+", "Bearer REDACTED"),
    ];

    let mut sanitized = input.to_string();
    for (pattern, replacement) in &patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            sanitized = re.replace_all(&sanitized, *replacement).to_string();
        }
    }

    sanitized
}

/// Mask a credential for display, keeping only the first and last four
/// characters. Short secrets are fully masked.
pub fn mask_secret(secret: &str) -> String {
    if secret.len() <= 8 {
        return "*".repeat(secret.len());
    }

    let start = &secret[..4];
    let end = &secret[secret.len() - 4..];
    format!("{}{}{}", start, "*".repeat(secret.len() - 8), end)
}

/// Truncate to a character count without splitting a UTF-8 sequence.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}
