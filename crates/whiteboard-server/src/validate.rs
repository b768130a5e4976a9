//! Element schema validation at the input boundary.
//!
//! Only the `type` discriminant is required; declared fields are decoded when
//! present and everything else passes through untouched. Batch input is
//! validated per element and the first invalid entry rejects the whole batch.

use serde_json::Value;

use crate::error::ValidationError;
use crate::model::{ELEMENT_TYPES, Element};

/// Validate and decode a single element.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the value is not an object, has a
/// missing or unknown `type`, or a declared field fails to decode.
pub fn element(value: Value) -> Result<Element, ValidationError> {
    let Some(obj) = value.as_object() else {
        return Err(ValidationError::NotAnObject);
    };

    match obj.get("type").and_then(Value::as_str) {
        None => return Err(ValidationError::MissingType),
        Some(tag) if !ELEMENT_TYPES.contains(&tag) => {
            return Err(ValidationError::UnknownType(tag.to_string()));
        }
        Some(_) => {}
    }

    let mut decoded: Element = serde_json::from_value(value).map_err(ValidationError::Shape)?;
    // The tag key must never shadow the enum discriminant on re-serialization.
    decoded.meta_mut().extra.remove("type");
    Ok(decoded)
}

/// Validate a batch body: a JSON array of elements, checked in input order.
///
/// # Errors
///
/// Returns [`ValidationError::NotAnArray`] for a non-array body, or the first
/// element's validation failure; in that case no element of the batch is
/// usable.
pub fn batch(value: Value) -> Result<Vec<Element>, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::NotAnArray);
    };

    let mut elements = Vec::with_capacity(items.len());
    for item in items {
        elements.push(element(item)?);
    }
    Ok(elements)
}
