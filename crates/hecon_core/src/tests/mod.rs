//! Integration tests for the hecon evaluation engine
//!
//! Tests are organized by topic:
//! - `scenarios` - Worked examples with hand-computed answers
//! - `properties` - Laws that hold across many inputs (conservation,
//!   discounting, dominance idempotency, CEAC monotonicity, reproducibility)
