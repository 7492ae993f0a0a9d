//! Extraction of a fenced or brace-delimited JSON object containing a given
//! key, shared by the Evaluator Runner (`issues`) and the Remediation
//! Orchestrator (`actions`) (`spec.md` §4.5 step 3, §4.7 step 9).

/// Extract the last JSON object in `text` that contains `key`.
///
/// Prefers the last ` ```json ` fenced block whose parsed object contains
/// `key`; falls back to the last balanced `{...}` span containing `key`
/// found by walking brace depth.
#[must_use]
pub fn extract_json_object(text: &str, key: &str) -> Option<serde_json::Value> {
    if let Some(value) = last_fenced_json_block(text, key) {
        return Some(value);
    }
    last_balanced_brace_block(text, key)
}

fn last_fenced_json_block(text: &str, key: &str) -> Option<serde_json::Value> {
    let mut best = None;
    let mut search_from = 0;
    while let Some(start_rel) = text[search_from..].find("```json") {
        let start = search_from + start_rel + "```json".len();
        let Some(end_rel) = text[start..].find("```") else {
            break;
        };
        let end = start + end_rel;
        let candidate = text[start..end].trim();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
            if value.get(key).is_some() {
                best = Some(value);
            }
        }
        search_from = end + 3;
    }
    best
}

fn last_balanced_brace_block(text: &str, key: &str) -> Option<serde_json::Value> {
    let bytes: Vec<char> = text.chars().collect();
    let mut best = None;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == '{' {
            if let Some(end) = find_matching_brace(&bytes, i) {
                let candidate: String = bytes[i..=end].iter().collect();
                if candidate.contains(&format!("\"{key}\"")) {
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&candidate) {
                        if value.get(key).is_some() {
                            best = Some(value);
                        }
                    }
                }
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    best
}

fn find_matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &ch) in chars.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset);
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
    fn prefers_fenced_block_over_loose_braces() {
        let text = "some preamble {\"issues\": \"decoy\"}\n```json\n{\"issues\": [1, 2]}\n```\ntrailing";
        let value = extract_json_object(text, "issues").expect("value");
        assert_eq!(value["issues"], serde_json::json!([1, 2]));
    }

    #[test]
    fn falls_back_to_last_balanced_braces_when_no_fence() {
        let text = "noise {\"other\": 1} more noise {\"issues\": [{\"a\":1}]} tail";
        let value = extract_json_object(text, "issues").expect("value");
        assert_eq!(value["issues"][0]["a"], 1);
    }

    #[test]
    fn tolerates_nested_braces_inside_strings() {
        let text = "```json\n{\"issues\": [{\"problem\": \"uses a { in prose }\"}]}\n```";
        let value = extract_json_object(text, "issues").expect("value");
        assert_eq!(value["issues"][0]["problem"], "uses a { in prose }");
    }

    #[test]
    fn returns_none_when_key_absent() {
        assert!(extract_json_object("no json here", "issues").is_none());
    }
}
