use tracing::debug;

use crate::state::PagePosition;

/// Ordered list of measured page positions.
///
/// Positions only ever grow in page order: a record that would go backwards
/// or overlap the previous page is dropped.
#[derive(Debug, Clone, Default)]
pub struct ViewportTracker {
    positions: Vec<PagePosition>,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&mut self, position: PagePosition) -> bool {
        if !(position.height >= 0.0) || position.bottom < position.top {
            debug!(page = position.page_number, "ignoring page position with invalid extent");
            return false;
        }
        if let Some(last) = self.positions.last() {
            if position.page_number <= last.page_number || position.top < last.bottom {
                debug!(
                    page = position.page_number,
                    last_page = last.page_number,
                    "ignoring out-of-order page position"
                );
                return false;
            }
        }
        self.positions.push(position);
        true
    }

    /// Page whose inclusive `[top, bottom]` interval holds `scroll_top`. When
    /// two pages share a boundary the earlier one wins.
    pub fn page_at(&self, scroll_top: f32) -> Option<&PagePosition> {
        let index = self
            .positions
            .partition_point(|position| position.bottom < scroll_top);
        self.positions
            .get(index)
            .filter(|position| position.contains(scroll_top))
    }

    pub fn position_of(&self, page_number: usize) -> Option<&PagePosition> {
        self.positions
            .binary_search_by_key(&page_number, |position| position.page_number)
            .ok()
            .map(|index| &self.positions[index])
    }

    pub fn first(&self) -> Option<&PagePosition> {
        self.positions.first()
    }

    pub fn last(&self) -> Option<&PagePosition> {
        self.positions.last()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PagePosition> {
        self.positions.iter()
    }

    pub fn reset(&mut self) {
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacked(pages: usize, height: f32, gap: f32) -> ViewportTracker {
        let mut tracker = ViewportTracker::new();
        let mut top = 0.0;
        for page in 1..=pages {
            assert!(tracker.record_page(PagePosition::new(page, top, height)));
            top += height + gap;
        }
        tracker
    }

    #[test]
    fn forward_records_stay_sorted_and_disjoint() {
        let tracker = stacked(6, 120.0, 8.0);
        let positions: Vec<_> = tracker.iter().copied().collect();
        for pair in positions.windows(2) {
            assert!(pair[0].page_number < pair[1].page_number);
            assert!(pair[0].bottom <= pair[1].top);
        }
    }

    #[test]
    fn out_of_order_records_are_ignored() {
        let mut tracker = stacked(3, 100.0, 0.0);
        assert!(!tracker.record_page(PagePosition::new(2, 300.0, 100.0)));
        assert!(!tracker.record_page(PagePosition::new(3, 300.0, 100.0)));
        assert!(!tracker.record_page(PagePosition::new(4, 250.0, 100.0)));
        assert!(!tracker.record_page(PagePosition::new(4, 300.0, -1.0)));
        assert!(tracker.record_page(PagePosition::new(4, 300.0, 100.0)));
        assert_eq!(tracker.len(), 4);
    }

    #[test]
    fn page_at_maps_offsets_to_pages() {
        let tracker = stacked(3, 100.0, 10.0);
        assert_eq!(tracker.page_at(0.0).map(|p| p.page_number), Some(1));
        assert_eq!(tracker.page_at(150.0).map(|p| p.page_number), Some(2));
        assert_eq!(tracker.page_at(320.0).map(|p| p.page_number), Some(3));
        // inside the gap between page 1 and 2
        assert!(tracker.page_at(105.0).is_none());
        assert!(tracker.page_at(400.0).is_none());
        assert!(tracker.page_at(-1.0).is_none());
    }

    #[test]
    fn shared_boundary_resolves_to_earlier_page() {
        let tracker = stacked(2, 100.0, 0.0);
        assert_eq!(tracker.page_at(100.0).map(|p| p.page_number), Some(1));
        assert_eq!(tracker.page_at(100.5).map(|p| p.page_number), Some(2));
    }

    #[test]
    fn page_at_is_unknown_before_first_layout() {
        let tracker = ViewportTracker::new();
        assert!(tracker.page_at(0.0).is_none());
    }

    #[test]
    fn reset_allows_rebuilding_from_page_one() {
        let mut tracker = stacked(3, 100.0, 0.0);
        tracker.reset();
        assert!(tracker.is_empty());
        assert!(tracker.record_page(PagePosition::new(1, 0.0, 150.0)));
        assert_eq!(tracker.position_of(1).map(|p| p.bottom), Some(150.0));
        assert!(tracker.position_of(2).is_none());
    }
}
