//! Deterministic canonicalization of analysis results.
//!
//! Arbitrary analyzer output is projected into one explicit schema at the
//! boundary; the canonical serialization of that schema is byte-identical for
//! logically identical content regardless of field insertion order, original
//! casing, or findings order.

use serde_json::{Map, Value};

/// Fields stripped at every object level: they vary per run without changing
/// the logical content.
const VOLATILE_FIELDS: &[&str] = &["timestamp", "requestId", "reqId"];

/// A normalized finding. Sorted by (severity, rule, file, line, message) so
/// ordering is independent of generation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub rule: String,
    pub severity: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u64>,
}

impl Finding {
    fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str);
        Self {
            rule: text("rule")
                .or_else(|| text("id"))
                .unwrap_or("unknown")
                .to_string(),
            severity: text("severity")
                .map(|s| s.to_ascii_lowercase())
                .unwrap_or_else(|| "unknown".to_string()),
            message: text("message")
                .or_else(|| text("msg"))
                .unwrap_or("")
                .to_string(),
            file: text("file").map(String::from),
            line: value.get("line").and_then(Value::as_u64),
        }
    }

    fn to_value(&self) -> Value {
        serde_json::json!({
            "rule": self.rule,
            "severity": self.severity,
            "message": self.message,
            "file": self.file,
            "line": self.line,
        })
    }

    fn sort_key(&self) -> (&str, &str, &str, u64, &str) {
        (
            &self.severity,
            &self.rule,
            self.file.as_deref().unwrap_or(""),
            self.line.unwrap_or(0),
            &self.message,
        )
    }
}

/// Stable, key-sorted, field-normalized projection of an analysis result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalResult {
    /// Uppercased verdict (e.g. "ALLOW", "BLOCK"), when present.
    pub decision: Option<String>,
    /// Lowercased risk label, when present.
    pub overall_risk: Option<String>,
    /// Normalized, deterministically ordered findings; `None` when the
    /// result carried no findings list at all.
    pub findings: Option<Vec<Finding>>,
    /// Every other field, volatile entries stripped at all depths.
    pub extra: Map<String, Value>,
}

impl CanonicalResult {
    /// Normalize an arbitrary result value into the canonical schema.
    ///
    /// Historical shapes are handled here, not downstream: a payload nested
    /// under a `result` wrapper is unwrapped (when the wrapper itself carries
    /// no analysis fields), and finding field aliases (`id` for `rule`,
    /// `msg` for `message`) are folded into their canonical names.
    pub fn from_value(raw: &Value) -> Self {
        let top = raw.as_object();
        let payload = match top {
            Some(obj) if !has_analysis_fields(obj) => match obj.get("result") {
                Some(Value::Object(inner)) => inner,
                _ => obj,
            },
            Some(obj) => obj,
            None => {
                // Scalar or array input: nothing to project, carry it whole.
                let mut extra = Map::new();
                extra.insert("value".to_string(), strip_volatile(raw));
                return Self {
                    extra,
                    ..Self::default()
                };
            }
        };

        let decision = payload
            .get("decision")
            .and_then(Value::as_str)
            .map(|s| s.to_ascii_uppercase());
        let overall_risk = payload
            .get("overallRisk")
            .and_then(Value::as_str)
            .map(|s| s.to_ascii_lowercase());

        let findings = payload.get("findings").and_then(Value::as_array).map(|items| {
            let mut findings: Vec<Finding> = items.iter().map(Finding::from_value).collect();
            findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            findings
        });

        let extra = payload
            .iter()
            .filter(|(key, _)| {
                let key = key.as_str();
                !VOLATILE_FIELDS.contains(&key)
                    && key != "decision"
                    && key != "overallRisk"
                    && key != "findings"
            })
            .map(|(key, value)| (key.clone(), strip_volatile(value)))
            .collect();

        Self {
            decision,
            overall_risk,
            findings,
            extra,
        }
    }

    /// Render the canonical JSON value.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(decision) = &self.decision {
            map.insert("decision".to_string(), Value::String(decision.clone()));
        }
        if let Some(risk) = &self.overall_risk {
            map.insert("overallRisk".to_string(), Value::String(risk.clone()));
        }
        if let Some(findings) = &self.findings {
            map.insert(
                "findings".to_string(),
                Value::Array(findings.iter().map(Finding::to_value).collect()),
            );
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Canonical serialization: the bytes the result hash commits to.
    /// Object keys are sorted explicitly at every level, independent of the
    /// map implementation behind `serde_json::Value`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_sorted(&self.to_value(), &mut out);
        out
    }
}

fn write_sorted(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(
                    &serde_json::to_vec(key).expect("JSON string key always serializes"),
                );
                out.push(b':');
                write_sorted(&map[key.as_str()], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_sorted(item, out);
            }
            out.push(b']');
        }
        leaf => out.extend_from_slice(
            &serde_json::to_vec(leaf).expect("JSON leaf value always serializes"),
        ),
    }
}

fn has_analysis_fields(obj: &Map<String, Value>) -> bool {
    obj.contains_key("decision") || obj.contains_key("overallRisk") || obj.contains_key("findings")
}

fn strip_volatile(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !VOLATILE_FIELDS.contains(&key.as_str()))
                .map(|(key, child)| (key.clone(), strip_volatile(child)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_volatile).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "decision": "block",
            "overallRisk": "High",
            "timestamp": "2024-05-01T00:00:00Z",
            "requestId": "req-123",
            "score": 87,
            "findings": [
                {"id": "R002", "severity": "LOW", "msg": "minor issue", "file": "b.rs", "line": 3},
                {"rule": "R001", "severity": "High", "message": "eval call", "file": "a.rs", "line": 10},
            ],
        })
    }

    #[test]
    fn normalizes_casing_and_aliases() {
        let canonical = CanonicalResult::from_value(&sample());
        assert_eq!(canonical.decision.as_deref(), Some("BLOCK"));
        assert_eq!(canonical.overall_risk.as_deref(), Some("high"));

        let findings = canonical.findings.unwrap();
        assert_eq!(findings[0].severity, "high");
        assert_eq!(findings[0].rule, "R001");
        assert_eq!(findings[1].rule, "R002");
        assert_eq!(findings[1].message, "minor issue");
    }

    #[test]
    fn strips_volatile_fields_at_every_level() {
        let raw = json!({
            "decision": "allow",
            "timestamp": 1,
            "nested": {"reqId": "x", "keep": {"requestId": "y", "value": 2}},
        });
        let value = CanonicalResult::from_value(&raw).to_value();
        assert!(value.get("timestamp").is_none());
        assert!(value["nested"].get("reqId").is_none());
        assert!(value["nested"]["keep"].get("requestId").is_none());
        assert_eq!(value["nested"]["keep"]["value"], 2);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let once = CanonicalResult::from_value(&sample());
        let twice = CanonicalResult::from_value(&once.to_value());
        assert_eq!(once, twice);
        assert_eq!(once.canonical_bytes(), twice.canonical_bytes());
    }

    #[test]
    fn findings_order_does_not_affect_bytes() {
        let mut shuffled = sample();
        let findings = shuffled["findings"].as_array_mut().unwrap();
        findings.reverse();

        let a = CanonicalResult::from_value(&sample()).canonical_bytes();
        let b = CanonicalResult::from_value(&shuffled).canonical_bytes();
        assert_eq!(a, b);
    }

    #[test]
    fn key_order_does_not_affect_bytes() {
        // Same logical content, fields listed in a different order.
        let reordered = json!({
            "findings": [
                {"line": 3, "file": "b.rs", "msg": "minor issue", "severity": "LOW", "id": "R002"},
                {"message": "eval call", "line": 10, "file": "a.rs", "rule": "R001", "severity": "High"},
            ],
            "score": 87,
            "requestId": "req-456",
            "overallRisk": "HIGH",
            "timestamp": "2099-01-01T00:00:00Z",
            "decision": "Block",
        });
        let a = CanonicalResult::from_value(&sample()).canonical_bytes();
        let b = CanonicalResult::from_value(&reordered).canonical_bytes();
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_bytes_sort_keys_at_every_level() {
        let raw = json!({"zeta": {"b": 1, "a": 2}, "alpha": 1, "decision": "ok"});
        let bytes = CanonicalResult::from_value(&raw).canonical_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"alpha":1,"decision":"OK","zeta":{"a":2,"b":1}}"#);
    }

    #[test]
    fn unwraps_historical_result_wrapper() {
        let wrapped = json!({"result": sample(), "tier": "basic"});
        let a = CanonicalResult::from_value(&wrapped);
        let b = CanonicalResult::from_value(&sample());
        assert_eq!(a, b);
    }

    #[test]
    fn missing_findings_stays_absent() {
        let canonical = CanonicalResult::from_value(&json!({"decision": "allow"}));
        assert!(canonical.findings.is_none());
        assert!(canonical.to_value().get("findings").is_none());
    }
}
