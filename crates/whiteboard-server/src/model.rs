//! Session and element data models.
//!
//! Elements are tagged records discriminated by `type`. Declared fields are
//! typed; everything else a client sends rides along in a flattened
//! passthrough map and is preserved verbatim on output, so clients may extend
//! schemas without server changes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Millisecond Unix timestamp.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Metadata shared by every element variant.
///
/// `id` is unique within the owning session. The stamp pairs are set by the
/// server: `created_by`/`timestamp` at creation, `updated_by`/`updated_at` on
/// a patch, `moved_by`/`moved_at` on a full-body move.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Subscriber user id, or the literal `"api"` for HTTP-origin edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_at: Option<i64>,

    /// Client fields the server does not model, preserved on round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectangleElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(flatten)]
    pub meta: ElementMeta,
}

/// Circle described by center and radius.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(flatten)]
    pub meta: ElementMeta,
}

/// Straight line segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(flatten)]
    pub meta: ElementMeta,
}

/// Line segment with one or two arrowheads (`arrowStyle`: `single`/`double`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrow_style: Option<String>,
    #[serde(flatten)]
    pub meta: ElementMeta,
}

/// A point on a freehand stroke.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PenPoint {
    pub x: f64,
    pub y: f64,
}

/// Freehand stroke.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<PenPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(flatten)]
    pub meta: ElementMeta,
}

/// Text label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub meta: ElementMeta,
}

/// Sticky note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(flatten)]
    pub meta: ElementMeta,
}

/// A drawing element, discriminated by its `type` tag.
///
/// The server never injects rendering defaults; absent optional fields stay
/// absent and clients default them (color `#000000`, strokeWidth `2`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Rectangle(RectangleElement),
    Circle(CircleElement),
    Line(LineElement),
    Arrow(ArrowElement),
    Pen(PenElement),
    Text(TextElement),
    Note(NoteElement),
}

/// The seven supported `type` tags, in schema order.
pub const ELEMENT_TYPES: [&str; 7] =
    ["rectangle", "circle", "line", "arrow", "pen", "text", "note"];

impl Element {
    /// Wire value of the `type` tag.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Rectangle(_) => "rectangle",
            Self::Circle(_) => "circle",
            Self::Line(_) => "line",
            Self::Arrow(_) => "arrow",
            Self::Pen(_) => "pen",
            Self::Text(_) => "text",
            Self::Note(_) => "note",
        }
    }

    /// Shared metadata for any variant.
    #[must_use]
    pub const fn meta(&self) -> &ElementMeta {
        match self {
            Self::Rectangle(el) => &el.meta,
            Self::Circle(el) => &el.meta,
            Self::Line(el) => &el.meta,
            Self::Arrow(el) => &el.meta,
            Self::Pen(el) => &el.meta,
            Self::Text(el) => &el.meta,
            Self::Note(el) => &el.meta,
        }
    }

    /// Mutable shared metadata for any variant.
    pub fn meta_mut(&mut self) -> &mut ElementMeta {
        match self {
            Self::Rectangle(el) => &mut el.meta,
            Self::Circle(el) => &mut el.meta,
            Self::Line(el) => &mut el.meta,
            Self::Arrow(el) => &mut el.meta,
            Self::Pen(el) => &mut el.meta,
            Self::Text(el) => &mut el.meta,
            Self::Note(el) => &mut el.meta,
        }
    }

    /// Element identifier, if assigned.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.meta().id.as_deref()
    }

    /// Set the element identifier.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.meta_mut().id = Some(id.into());
    }

    /// Stamp creation metadata.
    pub fn stamp_created(&mut self, by: &str, at: i64) {
        let meta = self.meta_mut();
        meta.created_by = Some(by.to_string());
        meta.timestamp = Some(at);
    }

    /// Stamp patch metadata.
    pub fn stamp_updated(&mut self, by: &str, at: i64) {
        let meta = self.meta_mut();
        meta.updated_by = Some(by.to_string());
        meta.updated_at = Some(at);
    }

    /// Stamp move metadata.
    pub fn stamp_moved(&mut self, by: &str, at: i64) {
        let meta = self.meta_mut();
        meta.moved_by = Some(by.to_string());
        meta.moved_at = Some(at);
    }
}

/// The durable per-session record: what the store holds and what a restart
/// recovers. Subscribers and cursors are never part of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,

    /// Millisecond Unix timestamp, set once at creation.
    pub created_at: i64,

    /// Z-ordered element sequence; index 0 renders at the bottom.
    pub elements: Vec<Element>,
}

impl SessionRecord {
    /// Create an empty record stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), created_at: now_millis(), elements: Vec::new() }
    }

    /// Index of the element with the given identifier.
    #[must_use]
    pub fn position_of(&self, element_id: &str) -> Option<usize> {
        self.elements.iter().position(|el| el.id() == Some(element_id))
    }

    /// Whether an element with the given identifier exists.
    #[must_use]
    pub fn contains_element(&self, element_id: &str) -> bool {
        self.position_of(element_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rectangle_roundtrip() {
        let input = json!({
            "type": "rectangle",
            "id": "r1",
            "x": 10.0,
            "y": 20.0,
            "width": 30.0,
            "height": 40.0
        });
        let el: Element = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(el.type_name(), "rectangle");
        assert_eq!(el.id(), Some("r1"));

        let out = serde_json::to_value(&el).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let input = json!({
            "type": "circle",
            "id": "c1",
            "cx": 1.0,
            "cy": 2.0,
            "radius": 3.0,
            "rotation": 45,
            "label": "hub"
        });
        let el: Element = serde_json::from_value(input).unwrap();
        assert_eq!(el.meta().extra.get("rotation"), Some(&json!(45)));
        assert_eq!(el.meta().extra.get("label"), Some(&json!("hub")));

        let out = serde_json::to_value(&el).unwrap();
        assert_eq!(out["rotation"], json!(45));
        assert_eq!(out["label"], json!("hub"));
        assert_eq!(out["type"], json!("circle"));
    }

    #[test]
    fn test_absent_optionals_stay_absent() {
        let el: Element =
            serde_json::from_value(json!({"type": "line", "x1": 0.0, "y1": 0.0})).unwrap();
        let out = serde_json::to_value(&el).unwrap();
        let obj = out.as_object().unwrap();
        assert!(!obj.contains_key("color"));
        assert!(!obj.contains_key("strokeWidth"));
        assert!(!obj.contains_key("x2"));
    }

    #[test]
    fn test_pen_points() {
        let el: Element = serde_json::from_value(json!({
            "type": "pen",
            "points": [{"x": 0.0, "y": 0.0}, {"x": 1.5, "y": 2.5}],
            "strokeWidth": 4.0
        }))
        .unwrap();
        let Element::Pen(pen) = &el else { panic!("expected pen") };
        assert_eq!(pen.points.as_ref().unwrap().len(), 2);
        assert_eq!(pen.stroke_width, Some(4.0));
    }

    #[test]
    fn test_stamps() {
        let mut el: Element =
            serde_json::from_value(json!({"type": "note", "x": 0.0, "y": 0.0, "text": "hi"}))
                .unwrap();
        el.set_id("n1");
        el.stamp_created("api", 1000);
        el.stamp_updated("u1", 2000);

        let out = serde_json::to_value(&el).unwrap();
        assert_eq!(out["id"], json!("n1"));
        assert_eq!(out["createdBy"], json!("api"));
        assert_eq!(out["timestamp"], json!(1000));
        assert_eq!(out["updatedBy"], json!("u1"));
        assert_eq!(out["updatedAt"], json!(2000));
    }

    #[test]
    fn test_session_record_lookup() {
        let mut record = SessionRecord::new("abc1234");
        assert!(record.created_at > 0);

        let mut el: Element =
            serde_json::from_value(json!({"type": "text", "x": 0.0, "y": 0.0, "text": "t"}))
                .unwrap();
        el.set_id("e1");
        record.elements.push(el);

        assert_eq!(record.position_of("e1"), Some(0));
        assert!(record.contains_element("e1"));
        assert!(!record.contains_element("missing"));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = SessionRecord::new("abc1234");
        let out = serde_json::to_value(&record).unwrap();
        assert!(out.get("createdAt").is_some());
        assert!(out.get("elements").is_some());
    }
}
