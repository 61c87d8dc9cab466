use serde::Serialize;

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

/// Pretty-printed JSON with a trailing newline.
pub fn to_json_text<T: Serialize + ?Sized>(value: &T) -> std::io::Result<String> {
    serde_json::to_string_pretty(value)
        .map(|text| normalize_text_artifact(&text))
        .map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::{normalize_text_artifact, to_json_text};

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        let normalized = normalize_text_artifact("alpha\r\nbeta\rgamma");
        assert_eq!(normalized, "alpha\nbeta\ngamma\n");
        assert_eq!(normalize_text_artifact(""), "");
    }

    #[test]
    fn json_text_is_pretty_and_ends_with_newline() {
        let text = to_json_text(&[1.0, 2.5]).expect("json");
        assert_eq!(text, "[\n  1.0,\n  2.5\n]\n");
    }
}
