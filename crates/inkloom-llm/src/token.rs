//! Token estimation
//!
//! Character-class heuristic used when a backend does not report usage:
//! about 1.5 CJK ideographs per token, 4 other characters per token.

use crate::selector::PromptPayload;

/// Whether a character is a CJK unified ideograph
fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Estimate tokens for a string
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    let (cjk, other) = text.chars().fold((0u64, 0u64), |(cjk, other), c| {
        if is_cjk(c) {
            (cjk + 1, other)
        } else {
            (cjk, other + 1)
        }
    });
    (cjk as f64 / 1.5 + other as f64 / 4.0) as u64
}

/// Estimate tokens for a full prompt payload
#[must_use]
pub fn estimate_payload_tokens(payload: &PromptPayload) -> u64 {
    payload
        .system_prompt
        .as_deref()
        .map_or(0, estimate_tokens)
        + estimate_tokens(&payload.prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_estimate() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_cjk_estimate() {
        // 6 ideographs / 1.5
        assert_eq!(estimate_tokens("墨水织布机器"), 4);
        // 3 / 1.5 + 4 / 4
        assert_eq!(estimate_tokens("你好吗abcd"), 3);
    }

    #[test]
    fn test_payload_estimate_includes_system_prompt() {
        let payload = PromptPayload::new("abcd").with_system_prompt("efghijkl");
        assert_eq!(estimate_payload_tokens(&payload), 3);
    }
}
