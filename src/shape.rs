//! Cursor shapes and the cursor name registry
//!
//! Cursor themes name their cursors after the CSS cursor names (`default`, `pointer`, ...) or
//! after one of the older X11 names (`left_ptr`, `xterm`, ...). The compositor on the other end of
//! `wp_cursor_shape_device_v1` only knows the fixed set of [`Shape`]s. The [`ShapeRegistry`]
//! bridges the two: it is built once, never changes afterwards, and answers
//! [`lookup`](ShapeRegistry::lookup) without taking any lock.
//!
//! ```
//! use cursor_shape_shim::shape::{Shape, SHAPE_REGISTRY};
//!
//! assert_eq!(SHAPE_REGISTRY.lookup("pointer"), Some(Shape::Pointer));
//! assert_eq!(SHAPE_REGISTRY.lookup("left_ptr"), SHAPE_REGISTRY.lookup("default"));
//! assert_eq!(SHAPE_REGISTRY.lookup("Pointer"), None);
//! ```

use std::collections::HashMap;

use cursor_icon::CursorIcon;
use once_cell::sync::Lazy;

/// A shape understood by `wp_cursor_shape_device_v1.set_shape`
///
/// The discriminants are the protocol's wire values. There is no shape `0`, an unknown shape is
/// represented by `None` wherever a shape is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum Shape {
    Default = 1,
    ContextMenu = 2,
    Help = 3,
    Pointer = 4,
    Progress = 5,
    Wait = 6,
    Cell = 7,
    Crosshair = 8,
    Text = 9,
    VerticalText = 10,
    Alias = 11,
    Copy = 12,
    Move = 13,
    NoDrop = 14,
    NotAllowed = 15,
    Grab = 16,
    Grabbing = 17,
    EResize = 18,
    NResize = 19,
    NeResize = 20,
    NwResize = 21,
    SResize = 22,
    SeResize = 23,
    SwResize = 24,
    WResize = 25,
    EwResize = 26,
    NsResize = 27,
    NeswResize = 28,
    NwseResize = 29,
    ColResize = 30,
    RowResize = 31,
    AllScroll = 32,
    ZoomIn = 33,
    ZoomOut = 34,
}

impl Shape {
    /// The value sent on the wire
    pub fn wire_value(self) -> u32 {
        self as u32
    }

    /// The [`CursorIcon`] drawn for this shape
    pub fn cursor_icon(self) -> CursorIcon {
        match self {
            Shape::Default => CursorIcon::Default,
            Shape::ContextMenu => CursorIcon::ContextMenu,
            Shape::Help => CursorIcon::Help,
            Shape::Pointer => CursorIcon::Pointer,
            Shape::Progress => CursorIcon::Progress,
            Shape::Wait => CursorIcon::Wait,
            Shape::Cell => CursorIcon::Cell,
            Shape::Crosshair => CursorIcon::Crosshair,
            Shape::Text => CursorIcon::Text,
            Shape::VerticalText => CursorIcon::VerticalText,
            Shape::Alias => CursorIcon::Alias,
            Shape::Copy => CursorIcon::Copy,
            Shape::Move => CursorIcon::Move,
            Shape::NoDrop => CursorIcon::NoDrop,
            Shape::NotAllowed => CursorIcon::NotAllowed,
            Shape::Grab => CursorIcon::Grab,
            Shape::Grabbing => CursorIcon::Grabbing,
            Shape::EResize => CursorIcon::EResize,
            Shape::NResize => CursorIcon::NResize,
            Shape::NeResize => CursorIcon::NeResize,
            Shape::NwResize => CursorIcon::NwResize,
            Shape::SResize => CursorIcon::SResize,
            Shape::SeResize => CursorIcon::SeResize,
            Shape::SwResize => CursorIcon::SwResize,
            Shape::WResize => CursorIcon::WResize,
            Shape::EwResize => CursorIcon::EwResize,
            Shape::NsResize => CursorIcon::NsResize,
            Shape::NeswResize => CursorIcon::NeswResize,
            Shape::NwseResize => CursorIcon::NwseResize,
            Shape::ColResize => CursorIcon::ColResize,
            Shape::RowResize => CursorIcon::RowResize,
            Shape::AllScroll => CursorIcon::AllScroll,
            Shape::ZoomIn => CursorIcon::ZoomIn,
            Shape::ZoomOut => CursorIcon::ZoomOut,
        }
    }
}

/// Every shape, in wire order
pub const ALL_SHAPES: [Shape; 34] = [
    Shape::Default,
    Shape::ContextMenu,
    Shape::Help,
    Shape::Pointer,
    Shape::Progress,
    Shape::Wait,
    Shape::Cell,
    Shape::Crosshair,
    Shape::Text,
    Shape::VerticalText,
    Shape::Alias,
    Shape::Copy,
    Shape::Move,
    Shape::NoDrop,
    Shape::NotAllowed,
    Shape::Grab,
    Shape::Grabbing,
    Shape::EResize,
    Shape::NResize,
    Shape::NeResize,
    Shape::NwResize,
    Shape::SResize,
    Shape::SeResize,
    Shape::SwResize,
    Shape::WResize,
    Shape::EwResize,
    Shape::NsResize,
    Shape::NeswResize,
    Shape::NwseResize,
    Shape::ColResize,
    Shape::RowResize,
    Shape::AllScroll,
    Shape::ZoomIn,
    Shape::ZoomOut,
];

// Names themes are known to load. These win over anything derived from `cursor-icon`.
const CURSOR_NAMES: &[(&str, Shape)] = &[
    ("default", Shape::Default),
    ("left_ptr", Shape::Default),
    ("help", Shape::Help),
    ("context-menu", Shape::ContextMenu),
    ("pointer", Shape::Pointer),
    ("progress", Shape::Progress),
    ("wait", Shape::Wait),
    ("cell", Shape::Cell),
    ("crosshair", Shape::Crosshair),
    ("text", Shape::Text),
    ("xterm", Shape::Text),
    ("vertical-text", Shape::VerticalText),
    ("alias", Shape::Alias),
    ("copy", Shape::Copy),
    ("move", Shape::Move),
    ("no-drop", Shape::NoDrop),
    ("dnd-ask", Shape::Copy),
    ("not-allowed", Shape::NotAllowed),
    ("grab", Shape::Grab),
    ("grabbing", Shape::Grabbing),
    ("all-scroll", Shape::AllScroll),
    ("col-resize", Shape::ColResize),
    ("row-resize", Shape::RowResize),
    ("n-resize", Shape::NResize),
    ("e-resize", Shape::EResize),
    ("s-resize", Shape::SResize),
    ("w-resize", Shape::WResize),
    ("ne-resize", Shape::NeResize),
    ("nw-resize", Shape::NwResize),
    ("se-resize", Shape::SeResize),
    ("sw-resize", Shape::SwResize),
    ("ew-resize", Shape::EwResize),
    ("ns-resize", Shape::NsResize),
    ("nesw-resize", Shape::NeswResize),
    ("nwse-resize", Shape::NwseResize),
    ("zoom-in", Shape::ZoomIn),
    ("zoom-out", Shape::ZoomOut),
];

/// The process-wide registry, built on first use
pub static SHAPE_REGISTRY: Lazy<ShapeRegistry> = Lazy::new(ShapeRegistry::new);

/// Immutable mapping from cursor names to [`Shape`]s
#[derive(Debug)]
pub struct ShapeRegistry {
    names: HashMap<&'static str, Shape>,
}

impl ShapeRegistry {
    /// Builds the registry from the known cursor names plus the alternative names of every shape
    pub fn new() -> ShapeRegistry {
        let mut names: HashMap<&'static str, Shape> = CURSOR_NAMES.iter().copied().collect();
        for shape in ALL_SHAPES {
            let icon = shape.cursor_icon();
            for name in std::iter::once(icon.name()).chain(icon.alt_names().iter().copied()) {
                names.entry(name).or_insert(shape);
            }
        }
        ShapeRegistry { names }
    }

    /// Looks up the shape for a cursor name
    ///
    /// The match is exact and case-sensitive. `None` means the name has no shape, which is an
    /// ordinary outcome: the legacy cursor path is used instead.
    pub fn lookup(&self, name: &str) -> Option<Shape> {
        self.names.get(name).copied()
    }
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks a cursor name up in [`SHAPE_REGISTRY`]
pub fn lookup(name: &str) -> Option<Shape> {
    SHAPE_REGISTRY.lookup(name)
}
