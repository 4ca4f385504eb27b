//! Operation objects the agent originates. Both are single-content and
//! branch on the observed head.

use serde_json::{json, Value};

pub fn endorsement(branch: &str, level: i64) -> Value {
    json!({
        "branch": branch,
        "contents": [{ "kind": "endorsement", "level": level }]
    })
}

pub fn seed_nonce_revelation(branch: &str, level: i64, nonce_hex: &str) -> Value {
    json!({
        "branch": branch,
        "contents": [{ "kind": "seed_nonce_revelation", "level": level, "nonce": nonce_hex }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::validation_pass;

    #[test]
    fn shapes() {
        let e = endorsement("BHead", 42);
        assert_eq!(e["branch"], "BHead");
        assert_eq!(e["contents"][0]["kind"], "endorsement");
        assert_eq!(validation_pass(&e), 0);

        let r = seed_nonce_revelation("BHead", 4128, "00ff");
        assert_eq!(r["contents"][0]["nonce"], "00ff");
        assert_eq!(validation_pass(&r), 2);
    }
}
