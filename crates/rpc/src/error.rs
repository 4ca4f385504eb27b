use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),
    #[error("node returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected response shape: {0}")]
    Shape(&'static str),
}

impl RpcError {
    /// The node reports failures as a JSON array of error objects. Returns
    /// that array when this error carries one.
    pub fn node_errors(&self) -> Option<Vec<Value>> {
        let RpcError::Status { body, .. } = self else { return None };
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Array(errs)) => Some(errs),
            _ => None,
        }
    }

    /// Endorsement-count rejections at block preapply carry the number the
    /// protocol wants for the requested priority.
    pub fn required_endorsements(&self) -> Option<u64> {
        for err in self.node_errors()? {
            let id = err.get("id").and_then(Value::as_str).unwrap_or("");
            if id.contains("not_enough_endorsements") {
                return Some(err.get("required").and_then(Value::as_u64).unwrap_or(0));
            }
        }
        None
    }

    /// Operation hashes named anywhere in the error body. Injection
    /// rejections blame specific operations this way; the shapes nest, so
    /// the whole body is walked.
    pub fn offending_operations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(errs) = self.node_errors() {
            for err in &errs {
                collect_operation_hashes(err, &mut out);
            }
        }
        out
    }
}

fn collect_operation_hashes(v: &Value, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, inner) in map {
                if k == "operation" {
                    if let Some(s) = inner.as_str() {
                        out.push(s.to_string());
                        continue;
                    }
                }
                collect_operation_hashes(inner, out);
            }
        }
        Value::Array(items) => {
            for inner in items {
                collect_operation_hashes(inner, out);
            }
        }
        _ => {}
    }
}

pub type Result<T> = core::result::Result<T, RpcError>;
