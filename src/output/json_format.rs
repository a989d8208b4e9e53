//! JSON output formatting.

use crate::scanner::{ProbeResult, ScanSummary};

/// One result as a single-line JSON object.
pub fn result_json(result: &ProbeResult) -> serde_json::Result<String> {
    serde_json::to_string(result)
}

/// Scan summary as pretty-printed JSON.
pub fn summary_json(summary: &ScanSummary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Port, Protocol};

    #[test]
    fn test_result_json_fields() {
        let result = ProbeResult::new(Protocol::Udp, Port::new(161).unwrap(), "snmp", true);
        let value: serde_json::Value = serde_json::from_str(&result_json(&result).unwrap()).unwrap();
        assert_eq!(value["protocol"], "udp");
        assert_eq!(value["port"], 161);
        assert_eq!(value["service"], "snmp");
        assert_eq!(value["open"], true);
        assert!(value["timestamp"].is_string());
    }
}
