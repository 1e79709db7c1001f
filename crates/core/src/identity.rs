/// Derive a display name for a URL that came without one.
///
/// Returns the `host[:port]` exactly as written when the input has a `scheme://` prefix and a
/// non-empty authority. The authority is taken by syntax alone, so hosts or ports that would
/// not pass URL validation are kept verbatim. Otherwise the input is split on `/` and the
/// second segment is used (the first when there is only one). Malformed input yields an empty
/// string, never an error.
pub fn resolve_display_name(url: &str) -> String {
    let trimmed = url.trim();
    if let Some(authority) = authority_of(trimmed) {
        return authority.to_string();
    }

    let segments: Vec<&str> = trimmed.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        [_, second, ..] => second.to_string(),
        [first] => first.to_string(),
        [] => String::new(),
    }
}

fn authority_of(input: &str) -> Option<&str> {
    let (scheme, rest) = input.split_once("://")?;
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid_scheme {
        return None;
    }

    let end = rest
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    let authority = &rest[..end];
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);

    (!host_port.is_empty()).then_some(host_port)
}
