// Rust guideline compliant 2026-10-15

//! Firestore REST typed values → plain JSON.
//!
//! The REST API wraps every value in a single-key object naming its type
//! (`{"stringValue": "x"}`, `{"integerValue": "3"}`, ...). Order projection
//! works on plain JSON, so documents are unwrapped once at the adapter edge.

use serde_json::{Map, Value};

/// Unwrap a Firestore `fields` map.
#[must_use]
pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields.iter().map(|(name, value)| (name.clone(), decode_value(value))).collect()
}

/// Unwrap one typed value. Unknown or malformed wrappers decode to `null`.
#[must_use]
pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|object| object.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "booleanValue" | "stringValue" | "timestampValue" | "referenceValue" | "bytesValue"
        | "geoPointValue" => inner.clone(),
        // int64 travels as a decimal string.
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map_or(Value::Null, Value::from),
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        // NaN and the infinities arrive as strings; JSON has no room for them.
        "doubleValue" => match inner {
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

/// Last path segment of a document resource name
/// (`projects/p/databases/(default)/documents/orders/abc` → `abc`).
#[must_use]
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::{decode_fields, decode_value, document_id};
    use serde_json::json;

    #[test]
    fn decodes_order_document() {
        let fields = json!({
            "status": { "stringValue": "pending" },
            "smsSent": { "booleanValue": false },
            "totalAmount": { "doubleValue": 20.5 },
            "cart": { "arrayValue": { "values": [
                { "mapValue": { "fields": {
                    "name": { "stringValue": "Burger" },
                    "quantity": { "integerValue": "2" },
                    "price": { "integerValue": "10" }
                } } }
            ] } },
            "deliveryDetails": { "mapValue": { "fields": {
                "note": { "nullValue": null }
            } } }
        });

        let decoded = decode_fields(fields.as_object().unwrap());

        assert_eq!(
            serde_json::Value::Object(decoded),
            json!({
                "status": "pending",
                "smsSent": false,
                "totalAmount": 20.5,
                "cart": [{ "name": "Burger", "quantity": 2, "price": 10 }],
                "deliveryDetails": { "note": null }
            })
        );
    }

    #[test]
    fn empty_map_and_array_values() {
        assert_eq!(decode_value(&json!({ "mapValue": {} })), json!({}));
        assert_eq!(decode_value(&json!({ "arrayValue": {} })), json!([]));
    }

    #[test]
    fn malformed_values_decode_to_null() {
        assert_eq!(decode_value(&json!({ "integerValue": "twelve" })), json!(null));
        assert_eq!(decode_value(&json!({ "doubleValue": "NaN" })), json!(null));
        assert_eq!(decode_value(&json!({ "somethingNew": 1 })), json!(null));
        assert_eq!(decode_value(&json!("bare")), json!(null));
        assert_eq!(decode_value(&json!({})), json!(null));
    }

    #[test]
    fn passthrough_values() {
        assert_eq!(
            decode_value(&json!({ "timestampValue": "2026-01-01T00:00:00Z" })),
            json!("2026-01-01T00:00:00Z")
        );
        assert_eq!(
            decode_value(&json!({ "geoPointValue": { "latitude": 5.6, "longitude": -0.2 } })),
            json!({ "latitude": 5.6, "longitude": -0.2 })
        );
    }

    #[test]
    fn document_id_is_last_segment() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/orders/abc123"),
            "abc123"
        );
        assert_eq!(document_id("plain"), "plain");
    }
}
