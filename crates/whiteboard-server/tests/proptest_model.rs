//! Property-based tests for the element model: unknown keys survive the
//! round-trip and validation accepts exactly the seven tags.

use proptest::prelude::*;
use serde_json::{Value, json};

use whiteboard_server::model::ELEMENT_TYPES;
use whiteboard_server::validate;

/// Generate an arbitrary passthrough value (no nested depth needed; the
/// server treats them as opaque).
fn arb_extra_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|n| json!(n)),
        any::<bool>().prop_map(|b| json!(b)),
        "[a-zA-Z0-9 ]{0,20}".prop_map(|s| json!(s)),
    ]
}

proptest! {
    /// Unknown keys are preserved verbatim on round-trip for every tag.
    #[test]
    fn unknown_keys_roundtrip(
        tag_idx in 0usize..ELEMENT_TYPES.len(),
        key in "[a-z][a-zA-Z0-9]{0,11}",
        value in arb_extra_value(),
    ) {
        // Declared field names would be consumed by the typed model; the
        // property is about keys the server does not model.
        prop_assume!(![
            "type", "id", "x", "y", "width", "height", "cx", "cy", "radius",
            "x1", "y1", "x2", "y2", "points", "text", "color", "strokeWidth",
            "fontSize", "backgroundColor", "arrowStyle", "createdBy",
            "timestamp", "updatedBy", "updatedAt", "movedBy", "movedAt",
        ].contains(&key.as_str()));

        let mut input = serde_json::Map::new();
        input.insert("type".to_string(), json!(ELEMENT_TYPES[tag_idx]));
        input.insert(key.clone(), value.clone());

        let element = validate::element(Value::Object(input)).expect("valid element");
        let out = serde_json::to_value(&element).expect("serialize");

        prop_assert_eq!(&out[&key], &value);
        prop_assert_eq!(&out["type"], &json!(ELEMENT_TYPES[tag_idx]));
    }

    /// The tag never duplicates in serialized output.
    #[test]
    fn tag_appears_exactly_once(tag_idx in 0usize..ELEMENT_TYPES.len()) {
        let element =
            validate::element(json!({"type": ELEMENT_TYPES[tag_idx]})).expect("valid element");
        let out = serde_json::to_string(&element).expect("serialize");
        prop_assert_eq!(out.matches("\"type\"").count(), 1);
    }

    /// Geometry numbers round-trip losslessly.
    #[test]
    fn rectangle_geometry_roundtrips(
        x in -1.0e9f64..1.0e9,
        y in -1.0e9f64..1.0e9,
        width in 0.0f64..1.0e6,
        height in 0.0f64..1.0e6,
    ) {
        let element = validate::element(json!({
            "type": "rectangle", "x": x, "y": y, "width": width, "height": height
        }))
        .expect("valid element");
        let out = serde_json::to_value(&element).expect("serialize");

        prop_assert_eq!(out["x"].as_f64().unwrap(), x);
        prop_assert_eq!(out["y"].as_f64().unwrap(), y);
        prop_assert_eq!(out["width"].as_f64().unwrap(), width);
        prop_assert_eq!(out["height"].as_f64().unwrap(), height);
    }

    /// Tags outside the supported set are rejected.
    #[test]
    fn unsupported_tags_rejected(tag in "[a-z]{1,12}") {
        prop_assume!(!ELEMENT_TYPES.contains(&tag.as_str()));
        let result = validate::element(json!({"type": tag}));
        prop_assert!(result.is_err());
    }
}
