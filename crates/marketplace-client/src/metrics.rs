//! Client-side counters
//!
//! - `marketplace_requests_total` (counter): labels `method`, `status`
//! - `marketplace_token_refresh_total` (counter): label `outcome`
//!   (`success`, `failure`, `missing`)
//!
//! Without an installed recorder these are no-ops.

/// Record one dispatched request and the status it came back with.
pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "marketplace_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the outcome of a credential refresh.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("marketplace_token_refresh_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("GET", 200);
        record_refresh("success");
    }
}
