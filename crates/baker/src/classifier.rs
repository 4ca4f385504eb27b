//! Maps a mempool operation to the validation pass the node expects it in.

use serde_json::Value;

pub const PASS_COUNT: usize = 4;

/// Pass for a single operation. Single-content operations dispatch by kind;
/// anything with zero or multiple contents lands in the anonymous pass.
pub fn validation_pass(op: &Value) -> usize {
    let contents = match op.get("contents").and_then(Value::as_array) {
        Some(c) if c.len() == 1 => c,
        _ => return 3,
    };
    match contents[0].get("kind").and_then(Value::as_str) {
        Some("endorsement") => 0,
        Some("proposals") | Some("ballot") => 1,
        Some("seed_nonce_revelation")
        | Some("double_endorsement_evidence")
        | Some("double_baking_evidence")
        | Some("activate_account") => 2,
        _ => 3,
    }
}

/// Whether any content of the operation is an endorsement. The mempool gate
/// counts these.
pub fn is_endorsement(op: &Value) -> bool {
    op.get("contents")
        .and_then(Value::as_array)
        .map(|c| {
            c.iter()
                .any(|item| item.get("kind").and_then(Value::as_str) == Some("endorsement"))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(kind: &str) -> Value {
        json!({ "hash": "op1", "contents": [{ "kind": kind }] })
    }

    #[test]
    fn kind_dispatch() {
        assert_eq!(validation_pass(&single("endorsement")), 0);
        assert_eq!(validation_pass(&single("proposals")), 1);
        assert_eq!(validation_pass(&single("ballot")), 1);
        assert_eq!(validation_pass(&single("seed_nonce_revelation")), 2);
        assert_eq!(validation_pass(&single("double_endorsement_evidence")), 2);
        assert_eq!(validation_pass(&single("double_baking_evidence")), 2);
        assert_eq!(validation_pass(&single("activate_account")), 2);
        assert_eq!(validation_pass(&single("transaction")), 3);
        assert_eq!(validation_pass(&single("origination")), 3);
    }

    #[test]
    fn multi_content_is_anonymous() {
        let op = json!({
            "contents": [{ "kind": "endorsement" }, { "kind": "transaction" }]
        });
        assert_eq!(validation_pass(&op), 3);
    }

    #[test]
    fn degenerate_shapes_are_anonymous() {
        assert_eq!(validation_pass(&json!({})), 3);
        assert_eq!(validation_pass(&json!({ "contents": [] })), 3);
        assert_eq!(validation_pass(&json!({ "contents": "x" })), 3);
    }

    #[test]
    fn endorsement_detection_scans_all_contents() {
        let op = json!({
            "contents": [{ "kind": "transaction" }, { "kind": "endorsement" }]
        });
        assert!(is_endorsement(&op));
        assert!(!is_endorsement(&single("transaction")));
    }
}
