//! Extraction of the JSON object from a judge reply.

use serde_json::{Map, Value};

/// First parseable JSON object in `reply`.
///
/// Models wrap their JSON in code fences or prose often enough that the
/// reply is scanned for a balanced `{...}` instead of parsed whole.
pub(crate) fn extract_object(reply: &str) -> Option<Map<String, Value>> {
    let mut offset = 0;

    while let Some(found) = reply[offset..].find('{') {
        let start = offset + found;
        if let Some(end) = balanced_end(&reply[start..]) {
            if let Ok(Value::Object(map)) = serde_json::from_str(&reply[start..start + end]) {
                return Some(map);
            }
        }
        offset = start + 1;
    }

    None
}

/// Byte length of the object starting at `text[0]`, braces inside strings ignored.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let map = extract_object(r#"{"relevance_score": 8, "reason": "direct"}"#).unwrap();
        assert_eq!(map["relevance_score"], 8);
    }

    #[test]
    fn test_fenced_object() {
        let reply = "```json\n{\"consistency_score\": 95, \"unsupported_claims\": []}\n```";
        let map = extract_object(reply).unwrap();
        assert_eq!(map["consistency_score"], 95);
    }

    #[test]
    fn test_prose_and_braces_in_strings() {
        let reply = r#"Here is my rating: {"relevance_score": 7, "reason": "mentions {Article 5}"} Hope it helps."#;
        let map = extract_object(reply).unwrap();
        assert_eq!(map["reason"], "mentions {Article 5}");
    }

    #[test]
    fn test_skips_invalid_candidate() {
        let reply = r#"{not json} then {"relevance_score": 3, "reason": "off topic"}"#;
        let map = extract_object(reply).unwrap();
        assert_eq!(map["relevance_score"], 3);
    }

    #[test]
    fn test_no_object() {
        assert!(extract_object("I rate this a 7 out of 10").is_none());
        assert!(extract_object("{\"unterminated\": 1").is_none());
    }
}
