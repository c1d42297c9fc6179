//! Ring-buffered sample series feeding the chart
//!
//! Holds at most `capacity` most-recent chart points in strict arrival order,
//! evicting the oldest first on overflow. X coordinates are caller-assigned
//! monotone sequence numbers, not wall-clock time; [`SampleSeries::append`]
//! assigns them automatically from an internal counter.

use std::collections::VecDeque;

/// Default number of points retained, matching the chart's visible range
pub const DEFAULT_SERIES_CAPACITY: usize = 50;

/// One chart point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    /// Monotone sequence number assigned at append time
    pub x: f64,
    /// Sample value
    pub y: f64,
}

/// Bounded append/evict time series
#[derive(Debug, Clone)]
pub struct SampleSeries {
    points: VecDeque<ChartPoint>,
    capacity: usize,
    next_x: u64,
}

impl SampleSeries {
    /// Create an empty series with the given capacity
    ///
    /// A zero capacity is bumped to one so the newest point is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
            next_x: 0,
        }
    }

    /// Create a series seeded with an origin point at (0, 0)
    ///
    /// Subsequent appends count from x = 1. This is how the graph screen
    /// initializes its data set before the first notification arrives.
    pub fn with_origin(capacity: usize) -> Self {
        let mut series = Self::new(capacity);
        series.append(0.0);
        series
    }

    /// Append a value, assigning it the next x sequence number
    ///
    /// Evicts oldest points first until the series is under capacity, then
    /// inserts; the appended point is always the new last element.
    pub fn append(&mut self, y: f64) -> ChartPoint {
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        let point = ChartPoint {
            x: self.next_x as f64,
            y,
        };
        self.next_x += 1;
        self.points.push_back(point);
        point
    }

    /// Current number of retained points, O(1)
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series holds no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recently appended point
    pub fn last(&self) -> Option<&ChartPoint> {
        self.points.back()
    }

    /// Iterate retained points in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter()
    }

    /// Retained points as `[x, y]` pairs for plotting
    pub fn as_plot_points(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p.x, p.y]).collect()
    }

    /// Drop all points; the x counter keeps running
    pub fn clear(&mut self) {
        self.points.clear();
    }
}

impl Default for SampleSeries {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_monotone_x() {
        let mut series = SampleSeries::new(10);
        for i in 0..5 {
            let p = series.append(i as f64 * 2.0);
            assert_eq!(p.x, i as f64);
        }
        assert_eq!(series.len(), 5);
        assert_eq!(series.last().unwrap().y, 8.0);
    }

    #[test]
    fn test_bounded_retention_keeps_last_capacity_points() {
        let capacity = 50;
        let extra = 17;
        let mut series = SampleSeries::new(capacity);
        for i in 0..(capacity + extra) {
            series.append(i as f64);
        }
        assert_eq!(series.len(), capacity);
        // Retained points are exactly the last `capacity` appended, in order.
        let expected_first = extra as f64;
        for (offset, point) in series.iter().enumerate() {
            assert_eq!(point.y, expected_first + offset as f64);
            assert_eq!(point.x, expected_first + offset as f64);
        }
    }

    #[test]
    fn test_no_interior_loss_across_growth_and_shrink() {
        let mut series = SampleSeries::new(4);
        for i in 0..10 {
            series.append(i as f64);
            let ys: Vec<f64> = series.iter().map(|p| p.y).collect();
            let mut sorted = ys.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_eq!(ys, sorted, "arrival order must never be disturbed");
        }
    }

    #[test]
    fn test_with_origin_counts_from_one() {
        let mut series = SampleSeries::with_origin(DEFAULT_SERIES_CAPACITY);
        assert_eq!(series.len(), 1);
        assert_eq!(series.last().unwrap(), &ChartPoint { x: 0.0, y: 0.0 });
        let p = series.append(1.5);
        assert_eq!(p.x, 1.0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut series = SampleSeries::new(0);
        series.append(1.0);
        series.append(2.0);
        assert_eq!(series.len(), 1);
        assert_eq!(series.last().unwrap().y, 2.0);
    }

    #[test]
    fn test_as_plot_points() {
        let mut series = SampleSeries::new(3);
        series.append(7.0);
        assert_eq!(series.as_plot_points(), vec![[0.0, 7.0]]);
    }
}
