use sha2::{Digest, Sha256};

/// Collision-free local file name for a storage id: `{sanitized_name}--{short_hash(id)}.{ext}`.
///
/// Ids from different folders may share a file name; the hash keeps their
/// scratch files apart, and sanitizing keeps path separators out.
pub fn scratch_file_name(id: &str) -> String {
    let name = id.rsplit('/').next().unwrap_or(id);
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let hash = short_hash(id);
    let stem = sanitize(stem);
    match ext.map(sanitize) {
        Some(ext) => format!("{stem}--{hash}.{ext}"),
        None => format!("{stem}--{hash}"),
    }
}

fn sanitize(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        // Collapse runs of underscores
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        cleaned.push(c);
    }
    let mut trimmed = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if trimmed.is_empty() {
        trimmed = "item".to_string();
    }
    if trimmed.len() > 80 {
        let mut end = 80;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        trimmed.truncate(end);
    }
    trimmed
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
