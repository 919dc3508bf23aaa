//! Cache key derivation (spec.md §4.3, §3 `CacheEntry`).

use serde::Serialize;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct KeyInput<'a> {
    method_tag: &'a str,
    prompt: &'a str,
    model_id: &'a str,
    params: &'a serde_json::Value,
    engine_version: &'a str,
}

/// Stable canonical-JSON hash of (method tag, prompt, model id, parameters,
/// engine version), truncated to 32 hex characters (spec.md §4.3 key
/// derivation).
pub fn cache_key(method_tag: &str, model_id: &str, prompt: &str, params: &serde_json::Value) -> String {
    let input = KeyInput {
        method_tag,
        prompt,
        model_id,
        params,
        engine_version: ENGINE_VERSION,
    };
    let canonical = serde_jcs::to_string(&input).expect("KeyInput always serializes");
    aipo_common::sha256_hex_prefix(canonical.as_bytes(), 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_key() {
        let params = serde_json::json!({"temperature": 0.0});
        let a = cache_key("invoke", "gpt-x", "hello", &params);
        let b = cache_key("invoke", "gpt-x", "hello", &params);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn different_prompts_produce_different_keys() {
        let params = serde_json::json!({});
        let a = cache_key("invoke", "gpt-x", "hello", &params);
        let b = cache_key("invoke", "gpt-x", "goodbye", &params);
        assert_ne!(a, b);
    }

    #[test]
    fn key_order_independent_of_json_field_order() {
        let p1 = serde_json::json!({"a": 1, "b": 2});
        let p2 = serde_json::json!({"b": 2, "a": 1});
        assert_eq!(
            cache_key("invoke", "m", "p", &p1),
            cache_key("invoke", "m", "p", &p2)
        );
    }
}
