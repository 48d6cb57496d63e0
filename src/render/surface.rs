//! Cell-addressable paint surface.
//!
//! A redraw paints into a fresh surface and commits it with one `flush`; the
//! backend always receives the full buffer.

use crate::core::color::{ConsoleColor, FrameCharSet};
use crate::core::console::{Cell, ConsoleBackend};
use crate::core::geometry::{Point, Rect, Size};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct GraphicsSurface {
    size: Size,
    cells: Vec<Cell>,
    clip: Rect,
}

impl GraphicsSurface {
    pub fn new(size: Size, fill: Cell) -> Self {
        let size = Size::new(size.width.max(0), size.height.max(0));
        Self {
            size,
            cells: vec![fill; size.area()],
            clip: Rect::from_parts(Point::ZERO, size),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_parts(Point::ZERO, self.size)
    }

    pub fn clip(&self) -> Rect {
        self.clip
    }

    /// Restricts painting to `clip` (within bounds); returns the previous clip.
    pub fn set_clip(&mut self, clip: Rect) -> Rect {
        let bounded = clip.intersect(self.bounds());
        std::mem::replace(&mut self.clip, bounded)
    }

    pub fn reset_clip(&mut self) {
        self.clip = self.bounds();
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, p: Point) -> Option<Cell> {
        self.index(p).map(|idx| self.cells[idx])
    }

    /// Writes one cell if `p` lies inside the clip.
    pub fn set(&mut self, p: Point, cell: Cell) {
        if !self.clip.contains(p) {
            return;
        }
        if let Some(idx) = self.index(p) {
            self.cells[idx] = cell;
        }
    }

    pub fn fill_area(
        &mut self,
        foreground: ConsoleColor,
        background: ConsoleColor,
        area: Rect,
        ch: char,
    ) {
        let area = area.intersect(self.clip);
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                self.set(Point::new(x, y), Cell::new(ch, foreground, background));
            }
        }
    }

    pub fn draw_background(&mut self, background: ConsoleColor, area: Rect) {
        self.fill_area(background, background, area, ' ');
    }

    /// Paints a one-cell frame along the edges of `area`.
    pub fn draw_border(
        &mut self,
        border: ConsoleColor,
        background: ConsoleColor,
        area: Rect,
        frame: &FrameCharSet,
    ) {
        if area.is_empty() {
            return;
        }
        let (left, top) = (area.x, area.y);
        let (right, bottom) = (area.right() - 1, area.bottom() - 1);
        let cell = |ch| Cell::new(ch, border, background);

        for x in left + 1..right {
            self.set(Point::new(x, top), cell(frame.horizontal));
            self.set(Point::new(x, bottom), cell(frame.horizontal));
        }
        for y in top + 1..bottom {
            self.set(Point::new(left, y), cell(frame.vertical));
            self.set(Point::new(right, y), cell(frame.vertical));
        }
        self.set(Point::new(left, top), cell(frame.top_left));
        self.set(Point::new(right, top), cell(frame.top_right));
        self.set(Point::new(left, bottom), cell(frame.bottom_left));
        self.set(Point::new(right, bottom), cell(frame.bottom_right));
    }

    /// Copies a row-major block of characters into `area`; NUL becomes blank.
    pub fn copy_characters(
        &mut self,
        foreground: ConsoleColor,
        background: ConsoleColor,
        area: Rect,
        chars: &[char],
    ) {
        if area.is_empty() {
            return;
        }
        let width = area.width as usize;
        for (offset, ch) in chars.iter().enumerate().take(area.size().area()) {
            let p = Point::new(
                area.x + (offset % width) as i32,
                area.y + (offset / width) as i32,
            );
            let ch = if *ch == '\0' { ' ' } else { *ch };
            self.set(p, Cell::new(ch, foreground, background));
        }
    }

    /// Lays `text` out on one row starting at `at`, skipping control
    /// characters. Returns the number of columns used, clipped or not.
    pub fn draw_text(
        &mut self,
        foreground: ConsoleColor,
        background: ConsoleColor,
        at: Point,
        text: &str,
    ) -> usize {
        let mut count = 0;
        for (offset, ch) in text.chars().filter(|c| !c.is_control()).enumerate() {
            self.set(
                Point::new(at.x + offset as i32, at.y),
                Cell::new(ch, foreground, background),
            );
            count += 1;
        }
        count
    }

    /// Commits the whole buffer to the backend.
    pub fn flush(&self, backend: &mut dyn ConsoleBackend) -> Result<()> {
        if self.cells.is_empty() {
            return Ok(());
        }
        backend.write_cells(self.bounds(), &self.cells)
    }

    fn index(&self, p: Point) -> Option<usize> {
        if !self.bounds().contains(p) {
            return None;
        }
        Some(p.y as usize * self.size.width as usize + p.x as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::GraphicsSurface;
    use crate::core::color::{ConsoleColor, FrameCharSet};
    use crate::core::console::Cell;
    use crate::core::geometry::{Point, Rect, Size};

    fn row(surface: &GraphicsSurface, y: i32) -> String {
        (0..surface.size().width)
            .map(|x| surface.cell(Point::new(x, y)).map_or('?', |c| c.ch))
            .collect()
    }

    fn blank(size: Size) -> GraphicsSurface {
        GraphicsSurface::new(size, Cell::default())
    }

    #[test]
    fn border_frames_the_area() {
        let mut surface = blank(Size::new(5, 3));
        surface.draw_border(
            ConsoleColor::Yellow,
            ConsoleColor::Black,
            Rect::new(0, 0, 5, 3),
            &FrameCharSet::BOLD,
        );
        assert_eq!(row(&surface, 0), "┏━━━┓");
        assert_eq!(row(&surface, 1), "┃   ┃");
        assert_eq!(row(&surface, 2), "┗━━━┛");
        assert_eq!(
            surface.cell(Point::ZERO).unwrap().foreground,
            ConsoleColor::Yellow
        );
    }

    #[test]
    fn clip_limits_painting() {
        let mut surface = blank(Size::new(4, 2));
        let previous = surface.set_clip(Rect::new(1, 0, 2, 1));
        assert_eq!(previous, Rect::new(0, 0, 4, 2));
        surface.fill_area(
            ConsoleColor::White,
            ConsoleColor::Blue,
            Rect::new(0, 0, 4, 2),
            'x',
        );
        assert_eq!(row(&surface, 0), " xx ");
        assert_eq!(row(&surface, 1), "    ");
        surface.reset_clip();
        surface.draw_text(ConsoleColor::White, ConsoleColor::Blue, Point::new(2, 1), "abc");
        assert_eq!(row(&surface, 1), "  ab");
    }

    #[test]
    fn clip_is_bounded_by_the_surface() {
        let mut surface = blank(Size::new(4, 2));
        surface.set_clip(Rect::new(-2, -1, 10, 10));
        assert_eq!(surface.clip(), Rect::new(0, 0, 4, 2));
        let previous = surface.set_clip(Rect::new(3, 1, 5, 5));
        assert_eq!(previous, Rect::new(0, 0, 4, 2));
        assert_eq!(surface.clip(), Rect::new(3, 1, 1, 1));
    }

    #[test]
    fn copy_characters_blanks_nul() {
        let mut surface = blank(Size::new(3, 2));
        surface.copy_characters(
            ConsoleColor::Gray,
            ConsoleColor::Black,
            Rect::new(0, 0, 3, 2),
            &['a', '\0', 'b', 'c', 'd', '\0'],
        );
        assert_eq!(row(&surface, 0), "a b");
        assert_eq!(row(&surface, 1), "cd ");
    }

    #[test]
    fn negative_size_surface_is_empty() {
        let surface = blank(Size::new(-3, 2));
        assert!(surface.cells().is_empty());
        assert!(surface.cell(Point::ZERO).is_none());
    }
}
