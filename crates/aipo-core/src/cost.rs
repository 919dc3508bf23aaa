//! Per-model cost estimation (spec.md §9 "Cost estimation", promoted from a
//! design note to an implemented module per SPEC_FULL.md §4). A table of
//! (input token price, output token price) per model id; unknown models fall
//! back to a configurable default.

use std::collections::HashMap;

/// USD price per 1,000 tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// A priced model table with a fallback for unknown model ids (spec.md §9:
/// "Unknown models fall back to a configurable default price").
pub struct CostTable {
    prices: HashMap<String, TokenPrice>,
    default_price: TokenPrice,
}

impl CostTable {
    pub fn new(default_price: TokenPrice) -> Self {
        Self { prices: HashMap::new(), default_price }
    }

    /// A reasonable starting table for commonly used models, in the style
    /// of a provider price sheet. Operators can override or extend via
    /// [`CostTable::with_price`].
    pub fn with_common_defaults() -> Self {
        let mut table = Self::new(TokenPrice { input_per_1k: 0.50, output_per_1k: 1.50 });
        table
            .with_price("gpt-4o", TokenPrice { input_per_1k: 2.50, output_per_1k: 10.00 })
            .with_price("gpt-4o-mini", TokenPrice { input_per_1k: 0.15, output_per_1k: 0.60 })
            .with_price("claude-3-5-sonnet", TokenPrice { input_per_1k: 3.00, output_per_1k: 15.00 })
            .with_price("claude-3-5-haiku", TokenPrice { input_per_1k: 0.80, output_per_1k: 4.00 });
        table
    }

    pub fn with_price(&mut self, model_id: impl Into<String>, price: TokenPrice) -> &mut Self {
        self.prices.insert(model_id.into(), price);
        self
    }

    /// Estimated USD cost of one call, given observed token counts. Falls
    /// back to `default_price` for model ids not in the table (spec.md §9,
    /// target estimation error ±5% for priced models).
    pub fn estimate(&self, model_id: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let price = self.prices.get(model_id).copied().unwrap_or(self.default_price);
        (input_tokens as f64 / 1000.0) * price.input_per_1k
            + (output_tokens as f64 / 1000.0) * price.output_per_1k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_uses_its_own_price() {
        let table = CostTable::with_common_defaults();
        let cost = table.estimate("gpt-4o-mini", 1000, 1000);
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_falls_back_to_default_price() {
        let table = CostTable::with_common_defaults();
        let cost = table.estimate("some-future-model", 1000, 1000);
        assert!((cost - 2.00).abs() < 1e-9);
    }

    #[test]
    fn zero_tokens_cost_zero() {
        let table = CostTable::with_common_defaults();
        assert_eq!(table.estimate("gpt-4o", 0, 0), 0.0);
    }
}
