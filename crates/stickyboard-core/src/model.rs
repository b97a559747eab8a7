//! Typed domain records for boards, notes, paths and shapes.
//!
//! The remote store deals in schemaless JSON documents; everything is mapped
//! into the types here at the store boundary, with explicit defaulting for
//! missing fields, so untyped data never reaches rendering or hit-testing.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BoardId = Uuid;
pub type NoteId = Uuid;
pub type PathId = Uuid;
pub type ShapeId = Uuid;
pub type UserId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    /// Default sticky-note fill.
    pub fn note_yellow() -> Self {
        Self::new(255, 235, 59, 255)
    }

    /// Parse a `#rgb`, `#rrggbb` or `#rrggbbaa` hex string.
    /// Unparseable input falls back to black.
    pub fn from_hex(hex: &str) -> Self {
        let Some(hex) = hex.strip_prefix('#') else {
            return Self::black();
        };
        let hex = hex.trim();
        // Length checks below count bytes, so slicing is only safe on ASCII.
        if !hex.is_ascii() {
            return Self::black();
        }
        match hex.len() {
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16).unwrap_or(0) * 17;
                let g = u8::from_str_radix(&hex[1..2], 16).unwrap_or(0) * 17;
                let b = u8::from_str_radix(&hex[2..3], 16).unwrap_or(0) * 17;
                Self::new(r, g, b, 255)
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
                let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
                let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
                Self::new(r, g, b, 255)
            }
            8 => {
                let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
                let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
                let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
                let a = u8::from_str_radix(&hex[6..8], 16).unwrap_or(255);
                Self::new(r, g, b, a)
            }
            _ => Self::black(),
        }
    }

    /// Render as `#rrggbb` (alpha omitted when opaque).
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for SerializableColor {
    fn default() -> Self {
        Self::black()
    }
}

/// Which tool produced a drawing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeTool {
    Pen,
    Brush,
    Eraser,
}

impl StrokeTool {
    pub fn as_str(self) -> &'static str {
        match self {
            StrokeTool::Pen => "pen",
            StrokeTool::Brush => "brush",
            StrokeTool::Eraser => "eraser",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "brush" => StrokeTool::Brush,
            "eraser" => StrokeTool::Eraser,
            _ => StrokeTool::Pen,
        }
    }

    /// Stroke width policy: pen = 2, brush = 4.
    pub fn width(self) -> f64 {
        match self {
            StrokeTool::Brush => 4.0,
            _ => 2.0,
        }
    }
}

/// A named collection of notes, paths and shapes owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub owner: UserId,
    /// Server-ordered last-edit timestamp, milliseconds since the epoch.
    pub last_edited_ms: i64,
    /// Users the board is shared with (the owner is implicit).
    pub participants: Vec<UserId>,
}

impl Board {
    pub fn new(title: impl Into<String>, owner: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            owner,
            last_edited_ms: 0,
            participants: Vec::new(),
        }
    }

    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "owner": self.owner.to_string(),
            "lastEdited": self.last_edited_ms,
            "participants": self.participants.iter().map(|u| u.to_string()).collect::<Vec<_>>(),
        })
    }

    pub fn from_document(id: BoardId, doc: &serde_json::Value) -> Self {
        Self {
            id,
            title: doc
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Untitled")
                .to_string(),
            owner: parse_uuid(doc.get("owner")).unwrap_or_else(Uuid::nil),
            last_edited_ms: doc.get("lastEdited").and_then(|v| v.as_i64()).unwrap_or(0),
            participants: doc
                .get("participants")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| parse_uuid(Some(v))).collect())
                .unwrap_or_default(),
        }
    }
}

/// A movable, colored, text-bearing sticky note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub board_id: BoardId,
    pub content: String,
    /// Authoritative (persisted) position. In-flight drag positions live in
    /// the reconciler, not here.
    pub position: Point,
    pub color: SerializableColor,
    /// Stacking order; strictly increasing per board, assigned as max + 1.
    pub z_index: i64,
    pub last_editor: Option<UserId>,
}

impl Note {
    pub fn new(board_id: BoardId, position: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            board_id,
            content: String::new(),
            position,
            color: SerializableColor::note_yellow(),
            z_index: 0,
            last_editor: None,
        }
    }

    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "boardId": self.board_id.to_string(),
            "content": self.content,
            "position": { "x": self.position.x, "y": self.position.y },
            "color": self.color.to_hex(),
            "zIndex": self.z_index,
            "lastEditor": self.last_editor.map(|u| u.to_string()),
        })
    }

    /// Decode a note document, defaulting anything missing.
    pub fn from_document(id: NoteId, board_id: BoardId, doc: &serde_json::Value) -> Self {
        Self {
            id,
            board_id,
            content: doc
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            position: parse_point(doc.get("position")).unwrap_or(Point::ZERO),
            color: doc
                .get("color")
                .and_then(|v| v.as_str())
                .map(SerializableColor::from_hex)
                .unwrap_or_else(SerializableColor::note_yellow),
            z_index: doc.get("zIndex").and_then(|v| v.as_i64()).unwrap_or(0),
            last_editor: parse_uuid(doc.get("lastEditor")),
        }
    }
}

/// A freehand stroke: an ordered polyline of points.
///
/// Immutable once created; erasing deletes the whole path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawingPath {
    pub id: PathId,
    pub board_id: BoardId,
    pub points: Vec<Point>,
    pub color: SerializableColor,
    pub stroke_width: f64,
    pub tool: StrokeTool,
}

impl DrawingPath {
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "boardId": self.board_id.to_string(),
            "points": self.points.iter()
                .map(|p| serde_json::json!({ "x": p.x, "y": p.y }))
                .collect::<Vec<_>>(),
            "color": self.color.to_hex(),
            "strokeWidth": self.stroke_width,
            "tool": self.tool.as_str(),
        })
    }

    /// Decode a path document. Returns `None` when the point sequence is
    /// missing or empty, since a path without geometry cannot be rendered
    /// or hit-tested.
    pub fn from_document(id: PathId, board_id: BoardId, doc: &serde_json::Value) -> Option<Self> {
        let points: Vec<Point> = doc
            .get("points")?
            .as_array()?
            .iter()
            .filter_map(|v| parse_point(Some(v)))
            .collect();
        if points.is_empty() {
            return None;
        }
        Some(Self {
            id,
            board_id,
            points,
            color: doc
                .get("color")
                .and_then(|v| v.as_str())
                .map(SerializableColor::from_hex)
                .unwrap_or_default(),
            stroke_width: doc.get("strokeWidth").and_then(|v| v.as_f64()).unwrap_or(2.0),
            tool: doc
                .get("tool")
                .and_then(|v| v.as_str())
                .map(StrokeTool::parse)
                .unwrap_or(StrokeTool::Pen),
        })
    }
}

/// Shape variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Circle,
}

/// A rectangle or circle defined by two diagonal points.
///
/// Immutable once created; deleted wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeElement {
    pub id: ShapeId,
    pub board_id: BoardId,
    pub kind: ShapeKind,
    pub start: Point,
    pub end: Point,
    pub color: SerializableColor,
    pub stroke_width: f64,
}

impl ShapeElement {
    /// Axis-aligned bounding box spanned by start and end.
    pub fn bounding_box(&self) -> Rect {
        Rect::new(
            self.start.x.min(self.end.x),
            self.start.y.min(self.end.y),
            self.start.x.max(self.end.x),
            self.start.y.max(self.end.y),
        )
    }

    /// Circle center: midpoint of start and end.
    pub fn circle_center(&self) -> Point {
        Point::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }

    /// Circle radius: half the Euclidean distance between start and end.
    pub fn circle_radius(&self) -> f64 {
        self.start.distance(self.end) / 2.0
    }

    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "boardId": self.board_id.to_string(),
            "type": match self.kind {
                ShapeKind::Rectangle => "rectangle",
                ShapeKind::Circle => "circle",
            },
            "startPos": { "x": self.start.x, "y": self.start.y },
            "endPos": { "x": self.end.x, "y": self.end.y },
            "color": self.color.to_hex(),
            "strokeWidth": self.stroke_width,
        })
    }

    /// Decode a shape document. Returns `None` for unknown shape types.
    pub fn from_document(id: ShapeId, board_id: BoardId, doc: &serde_json::Value) -> Option<Self> {
        let kind = match doc.get("type").and_then(|v| v.as_str())? {
            "rectangle" => ShapeKind::Rectangle,
            "circle" => ShapeKind::Circle,
            _ => return None,
        };
        Some(Self {
            id,
            board_id,
            kind,
            start: parse_point(doc.get("startPos")).unwrap_or(Point::ZERO),
            end: parse_point(doc.get("endPos")).unwrap_or(Point::ZERO),
            color: doc
                .get("color")
                .and_then(|v| v.as_str())
                .map(SerializableColor::from_hex)
                .unwrap_or_default(),
            stroke_width: doc.get("strokeWidth").and_then(|v| v.as_f64()).unwrap_or(2.0),
        })
    }
}

/// Ephemeral: a user currently connected to a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub name: String,
    pub last_active_ms: i64,
}

/// Ephemeral: a remote user's live pointer position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorEntry {
    pub user_id: UserId,
    pub name: String,
    pub position: Point,
}

fn parse_uuid(value: Option<&serde_json::Value>) -> Option<Uuid> {
    value.and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())
}

fn parse_point(value: Option<&serde_json::Value>) -> Option<Point> {
    let v = value?;
    let x = v.get("x").and_then(|x| x.as_f64())?;
    let y = v.get("y").and_then(|y| y.as_f64())?;
    Some(Point::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_roundtrip() {
        let c = SerializableColor::from_hex("#ffcc80");
        assert_eq!(c, SerializableColor::new(255, 204, 128, 255));
        assert_eq!(c.to_hex(), "#ffcc80");
    }

    #[test]
    fn test_color_short_hex() {
        let c = SerializableColor::from_hex("#f0a");
        assert_eq!(c, SerializableColor::new(255, 0, 170, 255));
    }

    #[test]
    fn test_color_invalid_falls_back_to_black() {
        assert_eq!(SerializableColor::from_hex("red"), SerializableColor::black());
        assert_eq!(SerializableColor::from_hex("#12345"), SerializableColor::black());
    }

    #[test]
    fn test_color_non_ascii_falls_back_to_black() {
        // Multi-byte characters must not trip the byte-indexed slicing.
        assert_eq!(SerializableColor::from_hex("#é0"), SerializableColor::black());
        assert_eq!(SerializableColor::from_hex("#ééé"), SerializableColor::black());
        assert_eq!(SerializableColor::from_hex("#ffccé0"), SerializableColor::black());
    }

    #[test]
    fn test_note_document_with_mangled_color_decodes() {
        let board_id = Uuid::new_v4();
        let doc = serde_json::json!({
            "boardId": board_id.to_string(),
            "content": "x",
            "position": { "x": 0.0, "y": 0.0 },
            "color": "#é0",
            "zIndex": 1,
        });
        let note = Note::from_document(Uuid::new_v4(), board_id, &doc);
        assert_eq!(note.color, SerializableColor::black());
    }

    #[test]
    fn test_note_document_roundtrip() {
        let board_id = Uuid::new_v4();
        let mut note = Note::new(board_id, Point::new(120.0, 80.0));
        note.content = "hello".to_string();
        note.z_index = 7;

        let doc = note.to_document();
        let decoded = Note::from_document(note.id, board_id, &doc);

        assert_eq!(decoded.content, "hello");
        assert_eq!(decoded.z_index, 7);
        assert!((decoded.position.x - 120.0).abs() < f64::EPSILON);
        assert_eq!(decoded.color, note.color);
    }

    #[test]
    fn test_note_defaults_missing_fields() {
        let board_id = Uuid::new_v4();
        let decoded = Note::from_document(Uuid::new_v4(), board_id, &serde_json::json!({}));

        assert_eq!(decoded.content, "");
        assert_eq!(decoded.z_index, 0);
        assert_eq!(decoded.position, Point::ZERO);
        assert_eq!(decoded.color, SerializableColor::note_yellow());
        assert!(decoded.last_editor.is_none());
    }

    #[test]
    fn test_path_document_rejects_empty_points() {
        let board_id = Uuid::new_v4();
        let doc = serde_json::json!({ "points": [], "color": "#000000" });
        assert!(DrawingPath::from_document(Uuid::new_v4(), board_id, &doc).is_none());
        assert!(DrawingPath::from_document(Uuid::new_v4(), board_id, &serde_json::json!({})).is_none());
    }

    #[test]
    fn test_path_document_roundtrip() {
        let board_id = Uuid::new_v4();
        let path = DrawingPath {
            id: Uuid::new_v4(),
            board_id,
            points: vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)],
            color: SerializableColor::new(10, 20, 30, 255),
            stroke_width: 4.0,
            tool: StrokeTool::Brush,
        };
        let decoded = DrawingPath::from_document(path.id, board_id, &path.to_document()).unwrap();
        assert_eq!(decoded.points, path.points);
        assert_eq!(decoded.tool, StrokeTool::Brush);
        assert!((decoded.stroke_width - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shape_circle_geometry() {
        let shape = ShapeElement {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            kind: ShapeKind::Circle,
            start: Point::new(10.0, 10.0),
            end: Point::new(50.0, 40.0),
            color: SerializableColor::black(),
            stroke_width: 2.0,
        };
        let center = shape.circle_center();
        assert!((center.x - 30.0).abs() < f64::EPSILON);
        assert!((center.y - 25.0).abs() < f64::EPSILON);
        assert!((shape.circle_radius() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_shape_bounding_box_normalizes_corners() {
        let shape = ShapeElement {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            kind: ShapeKind::Rectangle,
            start: Point::new(50.0, 40.0),
            end: Point::new(10.0, 10.0),
            color: SerializableColor::black(),
            stroke_width: 2.0,
        };
        let bbox = shape.bounding_box();
        assert!((bbox.width() - 40.0).abs() < f64::EPSILON);
        assert!((bbox.height() - 30.0).abs() < f64::EPSILON);
        assert!((bbox.x0 - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shape_document_rejects_unknown_type() {
        let doc = serde_json::json!({ "type": "triangle" });
        assert!(ShapeElement::from_document(Uuid::new_v4(), Uuid::new_v4(), &doc).is_none());
    }
}
