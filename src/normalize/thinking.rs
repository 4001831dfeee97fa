//! Thinking/reasoning budget normalization shared by the Gemini and Claude families.

use crate::schemas::chat_completions::ChatCompletionRequest;
use tracing::debug;

/// Tokens left for the final answer when the output ceiling is raised above the thinking budget
pub const THINKING_HEADROOM_TOKENS: u64 = 4096;

/// Normalize the `thinking` block.
///
/// A disabled block is removed, a camel-case `budgetTokens` is renamed, and any max-token
/// ceiling at or below the budget is raised to budget + [`THINKING_HEADROOM_TOKENS`].
pub fn normalize(mut request: ChatCompletionRequest) -> ChatCompletionRequest {
    let Some(mut thinking) = request.thinking.take() else {
        return request;
    };

    if thinking.is_disabled() {
        debug!("Dropping disabled thinking block");
        return request;
    }

    if thinking.budget_tokens.is_none() {
        thinking.budget_tokens = thinking.budget_tokens_camel.take();
    }

    if let Some(budget) = thinking.budget_tokens.filter(|b| *b > 0) {
        let raised = budget.saturating_add(THINKING_HEADROOM_TOKENS);
        for ceiling in [
            &mut request.max_tokens,
            &mut request.max_completion_tokens,
        ] {
            if let Some(limit) = ceiling
                && *limit <= budget
            {
                debug!(limit = *limit, budget, raised, "Raising output ceiling above thinking budget");
                *limit = raised;
            }
        }
    }

    request.thinking = Some(thinking);
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn request(body: Value) -> ChatCompletionRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_absent_thinking_is_noop() {
        let original = request(json!({"model": "claude-sonnet-4", "max_tokens": 100}));
        assert_eq!(normalize(original.clone()), original);
    }

    #[test]
    fn test_disabled_thinking_is_removed() {
        let normalized = normalize(request(json!({
            "model": "claude-sonnet-4",
            "max_tokens": 10,
            "thinking": {"type": "disabled", "budget_tokens": 5000}
        })));
        assert!(normalized.thinking.is_none());
        assert_eq!(normalized.max_tokens, Some(10));
    }

    #[test]
    fn test_camel_case_budget_is_renamed_and_ceiling_raised() {
        let normalized = normalize(request(json!({
            "model": "claude-sonnet-4",
            "max_tokens": 8000,
            "thinking": {"type": "enabled", "budgetTokens": 10000}
        })));

        let value = serde_json::to_value(&normalized).unwrap();
        assert_eq!(value["thinking"], json!({"type": "enabled", "budget_tokens": 10000}));
        assert_eq!(value["max_tokens"], 14096);
    }

    #[test]
    fn test_ceiling_equal_to_budget_is_raised() {
        let normalized = normalize(request(json!({
            "max_completion_tokens": 2048,
            "thinking": {"type": "enabled", "budget_tokens": 2048}
        })));
        assert_eq!(normalized.max_completion_tokens, Some(2048 + THINKING_HEADROOM_TOKENS));
    }

    #[test]
    fn test_ceiling_above_budget_is_untouched() {
        let normalized = normalize(request(json!({
            "max_tokens": 32000,
            "thinking": {"type": "enabled", "budget_tokens": 1024}
        })));
        assert_eq!(normalized.max_tokens, Some(32000));
        assert_eq!(normalized.thinking.unwrap().budget_tokens, Some(1024));
    }

    #[test]
    fn test_huge_budget_saturates() {
        let normalized = normalize(request(json!({
            "model": "claude-sonnet-4",
            "max_tokens": 100,
            "thinking": {"type": "enabled", "budget_tokens": u64::MAX}
        })));
        assert_eq!(normalized.max_tokens, Some(u64::MAX));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize(request(json!({
            "max_tokens": 10,
            "thinking": {"type": "enabled", "budgetTokens": 500}
        })));
        assert_eq!(normalize(once.clone()), once);
    }
}
