//! Platform layer
//!
//! Browser host glue lives in `web` (wasm32 only). Native builds drive the
//! session controller directly.

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Milliseconds since the Unix epoch
pub fn now_ms() -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_positive() {
        assert!(now_ms() > 0.0);
    }
}
