//! Render capability interfaces and selection-area descriptors.
//!
//! The engine never paints. Block renderers expose geometry through the
//! [`Selectable`] capability, and the engine answers "what should be drawn
//! for the current selection" with a flat list of [`SelectionArea`]s that a
//! painter consumes however it likes.
//!
//! ```ignore
//! let areas = selection_areas(editor.document(), editor.selection(), &renderers);
//! for area in areas {
//!   match area {
//!     SelectionArea::Cursor { rect, .. } => painter.caret(rect),
//!     SelectionArea::Range { rects, .. } => painter.highlight(&rects),
//!     SelectionArea::Block { rect, .. } => painter.outline(rect),
//!   }
//! }
//! ```

use crate::{
  document::Document,
  path::Path,
  position::Position,
  selection::Selection,
};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rect {
  pub x:      f32,
  pub y:      f32,
  pub width:  f32,
  pub height: f32,
}

impl Rect {
  pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn center_y(&self) -> f32 {
    self.y + self.height / 2.0
  }

  pub fn contains(&self, point: Point) -> bool {
    point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
  }
}

/// Geometry queries a block renderer answers. Pure, no side effects.
pub trait Selectable {
  /// Caret rectangle for `position` inside this block.
  fn cursor_rect(&self, position: &Position) -> Option<Rect>;

  /// Highlight rectangles for the part of `selection` inside this block.
  fn rects_in_selection(&self, selection: &Selection) -> Vec<Rect>;

  /// Bounds of the whole block.
  fn block_rect(&self) -> Rect;

  /// Closest caret position to `point`, which may lie outside the block.
  fn position_at_point(&self, point: Point) -> Option<Position>;
}

/// Maps node paths to their mounted renderers.
pub trait SelectableLookup {
  fn selectable(&self, path: &Path) -> Option<&dyn Selectable>;
}

/// What to paint for one node.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionArea {
  Cursor { path: Path, rect: Rect },
  Range { path: Path, rects: Vec<Rect> },
  Block { path: Path, rect: Rect },
}

impl SelectionArea {
  pub fn path(&self) -> &Path {
    match self {
      SelectionArea::Cursor { path, .. }
      | SelectionArea::Range { path, .. }
      | SelectionArea::Block { path, .. } => path,
    }
  }
}

/// Descriptors for `selection`, one per visible node, in document order.
/// Nodes without a mounted renderer are skipped.
pub fn selection_areas(
  document: &Document,
  selection: Option<&Selection>,
  lookup: &dyn SelectableLookup,
) -> Vec<SelectionArea> {
  let Some(selection) = selection else {
    return Vec::new();
  };
  let normalized = selection.normalized();

  if normalized.is_block() {
    return document
      .get_paths_in_selection(&normalized)
      .into_iter()
      .filter_map(|path| {
        let rect = lookup.selectable(&path)?.block_rect();
        Some(SelectionArea::Block { path, rect })
      })
      .collect();
  }

  if normalized.is_collapsed() {
    let path = normalized.end.path.clone();
    return lookup
      .selectable(&path)
      .and_then(|selectable| selectable.cursor_rect(&normalized.end))
      .map(|rect| vec![SelectionArea::Cursor { path, rect }])
      .unwrap_or_default();
  }

  document
    .get_paths_in_selection(&normalized)
    .into_iter()
    .filter_map(|path| {
      let node = document.get_node_at_path(&path)?;
      let start = if path == normalized.start.path {
        normalized.start.offset
      } else {
        0
      };
      let end = if path == normalized.end.path {
        normalized.end.offset
      } else {
        node.text_len()
      };
      let local = Selection::single(path.clone(), start, Some(end));
      let rects = lookup.selectable(&path)?.rects_in_selection(&local);
      (!rects.is_empty()).then_some(SelectionArea::Range { path, rects })
    })
    .collect()
}

impl Position {
  /// The caret position one visual line above or below this one.
  ///
  /// Tries the current block first (multi-line text), then the neighbouring
  /// blocks in document order that have a mounted renderer. `None` when there
  /// is nothing in that direction.
  pub fn move_vertical(
    &self,
    upwards: bool,
    document: &Document,
    lookup: &dyn SelectableLookup,
  ) -> Option<Position> {
    let selectable = lookup.selectable(&self.path)?;
    let caret = selectable.cursor_rect(self)?;
    let block = selectable.block_rect();
    let probe = if upwards {
      Point::new(caret.x, caret.y - caret.height / 2.0)
    } else {
      Point::new(caret.x, caret.bottom() + caret.height / 2.0)
    };
    if block.contains(probe)
      && let Some(position) = selectable.position_at_point(probe)
      && position != *self
    {
      return Some(position);
    }

    let mut cursor = self.path.clone();
    loop {
      cursor = if upwards {
        document.previous_in_order(&cursor)?
      } else {
        document.next_in_order(&cursor)?
      };
      if let Some(neighbour) = lookup.selectable(&cursor) {
        let rect = neighbour.block_rect();
        let y = if upwards {
          rect.bottom() - caret.height / 2.0
        } else {
          rect.y + caret.height / 2.0
        };
        if let Some(position) = neighbour.position_at_point(Point::new(caret.x, y)) {
          return Some(position);
        }
      }
    }
  }
}

#[cfg(test)]
mod test {
  use std::collections::HashMap;

  use super::*;
  use crate::{
    node::{
      DIVIDER,
      Node,
    },
    selection::SelectionMode,
  };

  const LINE: f32 = 10.0;
  const CHAR: f32 = 5.0;

  /// Monospace block: `per_line` chars per line, stacked vertically.
  struct TextBlock {
    path:     Path,
    top:      f32,
    len:      usize,
    per_line: usize,
  }

  impl TextBlock {
    fn lines(&self) -> usize {
      self.len.div_ceil(self.per_line).max(1)
    }
  }

  impl Selectable for TextBlock {
    fn cursor_rect(&self, position: &Position) -> Option<Rect> {
      (position.path == self.path && position.offset <= self.len).then(|| {
        let line = (position.offset / self.per_line).min(self.lines() - 1);
        let column = position.offset - line * self.per_line;
        Rect::new(
          column as f32 * CHAR,
          self.top + line as f32 * LINE,
          1.0,
          LINE,
        )
      })
    }

    fn rects_in_selection(&self, selection: &Selection) -> Vec<Rect> {
      let width = (selection.end_index() - selection.start_index()) as f32 * CHAR;
      vec![Rect::new(
        selection.start_index() as f32 * CHAR,
        self.top,
        width,
        LINE,
      )]
    }

    fn block_rect(&self) -> Rect {
      Rect::new(
        0.0,
        self.top,
        self.per_line as f32 * CHAR,
        self.lines() as f32 * LINE,
      )
    }

    fn position_at_point(&self, point: Point) -> Option<Position> {
      let line = (((point.y - self.top) / LINE).floor().max(0.0) as usize).min(self.lines() - 1);
      let column = (point.x / CHAR).round() as usize;
      let offset = (line * self.per_line + column).min(self.len);
      Some(Position::new(self.path.clone(), offset))
    }
  }

  struct Blocks(HashMap<Path, TextBlock>);

  impl SelectableLookup for Blocks {
    fn selectable(&self, path: &Path) -> Option<&dyn Selectable> {
      self.0.get(path).map(|block| block as &dyn Selectable)
    }
  }

  fn setup() -> (Document, Blocks) {
    let document = Document::from_blocks([
      Node::paragraph("0123456789"),
      Node::new(DIVIDER),
      Node::paragraph("abc"),
    ]);
    let mut blocks = HashMap::new();
    blocks.insert(Path::from([0]), TextBlock {
      path:     Path::from([0]),
      top:      0.0,
      len:      10,
      per_line: 5,
    });
    blocks.insert(Path::from([2]), TextBlock {
      path:     Path::from([2]),
      top:      30.0,
      len:      3,
      per_line: 5,
    });
    (document, Blocks(blocks))
  }

  #[test]
  fn vertical_movement_crosses_lines_and_blocks() {
    let (document, blocks) = setup();
    let start = Position::new([0], 7);
    let up = start.move_vertical(true, &document, &blocks).unwrap();
    assert_eq!(up, Position::new([0], 2));
    assert_eq!(up.move_vertical(true, &document, &blocks), None);

    // divider has no renderer and is skipped
    let down = start.move_vertical(false, &document, &blocks).unwrap();
    assert_eq!(down, Position::new([2], 2));
  }

  #[test]
  fn areas_follow_selection_kind() {
    let (document, blocks) = setup();
    assert!(selection_areas(&document, None, &blocks).is_empty());

    let caret = Selection::single([2], 1, None);
    assert!(matches!(
      selection_areas(&document, Some(&caret), &blocks).as_slice(),
      [SelectionArea::Cursor { .. }]
    ));

    let range = Selection::new(Position::new([2], 2), Position::new([0], 3));
    let areas = selection_areas(&document, Some(&range), &blocks);
    let paths: Vec<_> = areas.iter().map(SelectionArea::path).cloned().collect();
    assert_eq!(paths, vec![Path::from([0]), Path::from([2])]);
    assert_eq!(areas[0], SelectionArea::Range {
      path:  Path::from([0]),
      rects: vec![Rect::new(15.0, 0.0, 35.0, LINE)],
    });

    let block = range.with_mode(SelectionMode::Block);
    let areas = selection_areas(&document, Some(&block), &blocks);
    assert!(
      areas
        .iter()
        .all(|area| matches!(area, SelectionArea::Block { .. }))
    );
    assert_eq!(areas.len(), 2);
  }
}
