//! Scroll state for virtualized, variable-height lists.
//!
//! Content is laid out once into styled lines together with a line-offset
//! table: `offsets[i]` is the first line of entry `i` and the trailing
//! sentinel is the total line count of the entries. [`sync`] maps the
//! selected entry onto a scroll offset that keeps it on screen.

use ratatui::text::{Line, Text};

/// Lines of padding kept below the selected entry.
const TRAILING_PADDING: usize = 1;

/// Computes the scroll offset that keeps `selected` visible.
///
/// The entry above the first one (a header, the post body) stays reachable
/// because selecting index 0 snaps to the very top. An entry taller than the
/// viewport shows its top rather than its bottom. The result is clamped to
/// `0..=max(0, total_lines - height)`.
pub fn sync(
    offsets: &[usize],
    selected: usize,
    current: usize,
    height: usize,
    total_lines: usize,
) -> usize {
    let mut offset = current;

    if selected + 1 < offsets.len() {
        let start = if selected == 0 { 0 } else { offsets[selected] };
        let end = offsets[selected + 1] + TRAILING_PADDING;

        if start < offset {
            offset = start;
        } else if end > offset + height {
            offset = end.saturating_sub(height);
        }
        if start < offset {
            offset = start;
        }
    }

    offset.min(total_lines.saturating_sub(height))
}

#[derive(Debug, Clone, Default)]
pub struct Viewport {
    width: u16,
    height: u16,
    offset: usize,
    content: Text<'static>,
    offsets: Vec<usize>,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn content(&self) -> &Text<'static> {
        &self.content
    }

    pub fn total_lines(&self) -> usize {
        self.content.lines.len()
    }

    /// Number of entries described by the offset table.
    pub fn entries(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    /// Replaces the rendered lines and their offset table.
    ///
    /// The table must be non-decreasing and end with the entry line count.
    pub fn set_content(&mut self, lines: Vec<Line<'static>>, offsets: Vec<usize>) {
        debug_assert!(offsets.windows(2).all(|pair| pair[0] <= pair[1]));
        debug_assert!(!offsets.is_empty());
        self.content = Text::from(lines);
        self.offsets = offsets;
    }

    pub fn sync_to(&mut self, selected: usize) {
        self.offset = sync(
            &self.offsets,
            selected,
            self.offset,
            self.height as usize,
            self.total_lines(),
        );
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let max = self.total_lines().saturating_sub(self.height as usize);
        let next = if delta < 0 {
            self.offset.saturating_sub(delta.unsigned_abs())
        } else {
            self.offset.saturating_add(delta as usize)
        };
        self.offset = next.min(max);
    }

    pub fn page_step(&self) -> isize {
        (self.height as isize - 1).max(1)
    }

    pub fn go_to_top(&mut self) {
        self.offset = 0;
    }

    /// Lines currently on screen, for painting.
    pub fn visible_lines(&self) -> &[Line<'static>] {
        let start = self.offset.min(self.content.lines.len());
        let end = (start + self.height as usize).min(self.content.lines.len());
        &self.content.lines[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn offsets_from_heights(heights: &[usize]) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(heights.len() + 1);
        let mut line = 0;
        for height in heights {
            offsets.push(line);
            line += height;
        }
        offsets.push(line);
        offsets
    }

    #[test]
    fn snaps_down_to_show_entry_and_padding() {
        let offsets = offsets_from_heights(&[5, 5, 5, 5]);
        // entry 2 spans lines 10..15, plus one padding line
        assert_eq!(sync(&offsets, 2, 0, 8, 20), 8);
    }

    #[test]
    fn snaps_up_when_entry_starts_above_viewport() {
        let offsets = offsets_from_heights(&[5, 5, 5, 5]);
        assert_eq!(sync(&offsets, 1, 12, 8, 20), 5);
    }

    #[test]
    fn first_entry_reveals_preamble() {
        // preamble of 6 lines before the first entry
        let offsets = vec![6, 9, 12];
        assert_eq!(sync(&offsets, 0, 4, 10, 12), 0);
    }

    #[test]
    fn tall_entry_shows_its_top() {
        let offsets = offsets_from_heights(&[3, 30, 3]);
        assert_eq!(sync(&offsets, 1, 0, 10, 36), 3);
    }

    #[test]
    fn clamps_to_content_end() {
        let offsets = offsets_from_heights(&[4, 4]);
        // the padding line below the last entry does not exist
        assert_eq!(sync(&offsets, 1, 0, 6, 8), 2);
    }

    #[test]
    fn content_shorter_than_viewport_never_scrolls() {
        let offsets = offsets_from_heights(&[2, 2]);
        assert_eq!(sync(&offsets, 1, 3, 20, 4), 0);
    }

    #[test]
    fn empty_table_only_clamps() {
        assert_eq!(sync(&[7], 0, 50, 10, 12), 2);
    }

    #[test]
    fn scroll_by_stays_within_content() {
        let mut viewport = Viewport::new(40, 5);
        let lines = (0..12).map(|i| Line::from(format!("line {i}"))).collect();
        viewport.set_content(lines, vec![0, 12]);
        viewport.scroll_by(100);
        assert_eq!(viewport.offset(), 7);
        viewport.scroll_by(-3);
        assert_eq!(viewport.offset(), 4);
        viewport.scroll_by(-30);
        assert_eq!(viewport.offset(), 0);
        assert_eq!(viewport.visible_lines().len(), 5);
    }

    fn heights_and_view() -> impl Strategy<Value = (Vec<usize>, usize, usize, usize)> {
        (prop::collection::vec(1usize..12, 1..40), 1usize..40, 0usize..400).prop_flat_map(
            |(heights, height, current)| {
                let len = heights.len();
                (Just(heights), 0..len, Just(height), Just(current))
            },
        )
    }

    proptest! {
        #[test]
        fn selected_entry_is_visible((heights, selected, height, current) in heights_and_view()) {
            let offsets = offsets_from_heights(&heights);
            let total = *offsets.last().unwrap();
            let start = if selected == 0 { 0 } else { offsets[selected] };
            let end = offsets[selected + 1] + 1;
            let offset = sync(&offsets, selected, current, height, total);

            prop_assert!(offsets[selected] >= offset);
            if end - start <= height {
                prop_assert!(end.min(total) <= offset + height);
            }
        }

        #[test]
        fn sync_is_idempotent((heights, selected, height, current) in heights_and_view()) {
            let offsets = offsets_from_heights(&heights);
            let total = *offsets.last().unwrap();
            let once = sync(&offsets, selected, current, height, total);
            let twice = sync(&offsets, selected, once, height, total);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn offset_stays_in_bounds((heights, selected, height, current) in heights_and_view()) {
            let offsets = offsets_from_heights(&heights);
            let total = *offsets.last().unwrap();
            let offset = sync(&offsets, selected, current, height, total);
            prop_assert!(offset <= total.saturating_sub(height));
        }
    }
}
