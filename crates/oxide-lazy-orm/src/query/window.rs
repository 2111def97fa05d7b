//! Row windows (OFFSET/LIMIT).
//!
//! Zero-based, half-open: `Range { start: Some(2), stop: Some(5) }` covers
//! rows 2, 3 and 4.

use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo, RangeToInclusive};

/// The row restriction applied to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Only the row at this offset.
    Index(usize),
    /// Rows in `[start, stop)`; an absent bound is open.
    Range {
        /// First row, `None` for the beginning.
        start: Option<usize>,
        /// One past the last row, `None` for the end.
        stop: Option<usize>,
    },
}

impl Window {
    /// Returns `(start, stop)` with the start bound defaulted to zero.
    #[must_use]
    pub const fn bounds(self) -> (usize, Option<usize>) {
        match self {
            Self::Index(k) => (k, Some(k.saturating_add(1))),
            Self::Range { start, stop } => match start {
                Some(s) => (s, stop),
                None => (0, stop),
            },
        }
    }

    /// Narrows this window by another one.
    ///
    /// The later start and the earlier stop win, so a window only ever
    /// shrinks: `[2, 10)` intersected with `[0, 5)` is `[2, 5)`. An empty
    /// intersection collapses to a zero-length range.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        let start = match (self.start_bound(), other.start_bound()) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0).max(b.unwrap_or(0))),
        };
        let stop = match (self.bounds().1, other.bounds().1) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let stop = match (start, stop) {
            (Some(s), Some(e)) if e < s => Some(s),
            (_, stop) => stop,
        };
        Self::Range { start, stop }
    }

    const fn start_bound(self) -> Option<usize> {
        match self {
            Self::Index(k) => Some(k),
            Self::Range { start, .. } => start,
        }
    }

    /// Renders the LIMIT/OFFSET clause, or `None` when unrestricted.
    ///
    /// SQLite needs LIMIT before OFFSET, so an open stop with a start uses
    /// `LIMIT -1`. SQLite bounds are signed 64-bit: a stop beyond that range
    /// means no limit, and a start beyond it selects nothing.
    #[must_use]
    pub fn to_sql(self) -> Option<String> {
        match self {
            Self::Index(k) => Some(match i64::try_from(k) {
                Ok(k) => format!("LIMIT 1 OFFSET {k}"),
                Err(_) => "LIMIT 0".to_string(),
            }),
            Self::Range { start, stop } => {
                let start = match start.map(i64::try_from) {
                    Some(Err(_)) => return Some("LIMIT 0".to_string()),
                    Some(Ok(s)) => Some(s),
                    None => None,
                };
                let stop = stop.and_then(|e| i64::try_from(e).ok());
                match (start, stop) {
                    (None, None) => None,
                    (None, Some(e)) => Some(format!("LIMIT {e}")),
                    (Some(s), None) => Some(format!("LIMIT -1 OFFSET {s}")),
                    (Some(s), Some(e)) => Some(format!("LIMIT {} OFFSET {s}", (e - s).max(0))),
                }
            }
        }
    }

    /// Re-expresses the window relative to rows that start at `offset`.
    #[must_use]
    pub(crate) const fn shifted_back(self, offset: usize) -> Self {
        match self {
            Self::Index(k) => Self::Index(k.saturating_sub(offset)),
            Self::Range { start, stop } => Self::Range {
                start: match start {
                    Some(s) => Some(s.saturating_sub(offset)),
                    None => None,
                },
                stop: match stop {
                    Some(e) => Some(e.saturating_sub(offset)),
                    None => None,
                },
            },
        }
    }

    /// Applies the window to rows that are already in memory.
    #[must_use]
    pub fn apply<T: Clone>(self, rows: &[T]) -> Vec<T> {
        let (start, stop) = self.bounds();
        let stop = stop.unwrap_or(rows.len()).min(rows.len());
        let start = start.min(stop);
        rows[start..stop].to_vec()
    }
}

/// Types usable as a window index: a row offset or a range of rows.
///
/// Anything else is rejected at compile time.
pub trait IntoWindow {
    /// Converts the index into a window.
    fn into_window(self) -> Window;
}

impl IntoWindow for Window {
    fn into_window(self) -> Window {
        self
    }
}

impl IntoWindow for usize {
    fn into_window(self) -> Window {
        Window::Index(self)
    }
}

impl IntoWindow for Range<usize> {
    fn into_window(self) -> Window {
        Window::Range {
            start: Some(self.start),
            stop: Some(self.end),
        }
    }
}

impl IntoWindow for RangeFrom<usize> {
    fn into_window(self) -> Window {
        Window::Range {
            start: Some(self.start),
            stop: None,
        }
    }
}

impl IntoWindow for RangeTo<usize> {
    fn into_window(self) -> Window {
        Window::Range {
            start: None,
            stop: Some(self.end),
        }
    }
}

impl IntoWindow for RangeInclusive<usize> {
    fn into_window(self) -> Window {
        Window::Range {
            start: Some(*self.start()),
            stop: Some(self.end().saturating_add(1)),
        }
    }
}

impl IntoWindow for RangeToInclusive<usize> {
    fn into_window(self) -> Window {
        Window::Range {
            start: None,
            stop: Some(self.end.saturating_add(1)),
        }
    }
}

impl IntoWindow for RangeFull {
    fn into_window(self) -> Window {
        Window::Range {
            start: None,
            stop: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win<W: IntoWindow>(w: W) -> Window {
        w.into_window()
    }

    fn range(start: Option<usize>, stop: Option<usize>) -> Window {
        Window::Range { start, stop }
    }

    #[test]
    fn test_intersection_narrows() {
        let w = win(2..10).intersect(win(0..5));
        assert_eq!(w, range(Some(2), Some(5)));
    }

    #[test]
    fn test_intersection_never_widens() {
        let w = win(2..5).intersect(win(0..50));
        assert_eq!(w, range(Some(2), Some(5)));
        let w = win(..5).intersect(win(..));
        assert_eq!(w, range(None, Some(5)));
        let w = win(3..).intersect(win(..8));
        assert_eq!(w, range(Some(3), Some(8)));
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let w = win(0..3).intersect(win(5..9));
        assert_eq!(w, range(Some(5), Some(5)));
        assert_eq!(w.to_sql().as_deref(), Some("LIMIT 0 OFFSET 5"));
    }

    #[test]
    fn test_index_intersects_as_single_row() {
        let w = Window::Index(4).intersect(win(0..10));
        assert_eq!(w, range(Some(4), Some(5)));
    }

    #[test]
    fn test_to_sql() {
        assert_eq!(Window::Index(3).to_sql().as_deref(), Some("LIMIT 1 OFFSET 3"));
        assert_eq!(win(2..5).to_sql().as_deref(), Some("LIMIT 3 OFFSET 2"));
        assert_eq!(win(..5).to_sql().as_deref(), Some("LIMIT 5"));
        assert_eq!(win(4..).to_sql().as_deref(), Some("LIMIT -1 OFFSET 4"));
        assert_eq!(win(..).to_sql(), None);
        assert_eq!(win(1..=3).to_sql().as_deref(), Some("LIMIT 3 OFFSET 1"));
    }

    #[test]
    fn test_to_sql_clamps_to_signed_bounds() {
        assert_eq!(win(0..usize::MAX).to_sql().as_deref(), Some("LIMIT -1 OFFSET 0"));
        assert_eq!(win(..usize::MAX).to_sql(), None);
        assert_eq!(win(..=usize::MAX).to_sql(), None);
        assert_eq!(Window::Index(usize::MAX).to_sql().as_deref(), Some("LIMIT 0"));
        assert_eq!(win(usize::MAX..).to_sql().as_deref(), Some("LIMIT 0"));
    }

    #[test]
    fn test_shifted_back() {
        assert_eq!(win(2..5).shifted_back(2), range(Some(0), Some(3)));
        assert_eq!(Window::Index(3).shifted_back(2), Window::Index(1));
        assert_eq!(win(4..).shifted_back(1), range(Some(3), None));
    }

    #[test]
    fn test_apply_in_memory() {
        let rows = vec![10, 11, 12, 13, 14];
        assert_eq!(win(1..3).apply(&rows), vec![11, 12]);
        assert_eq!(Window::Index(4).apply(&rows), vec![14]);
        assert_eq!(Window::Index(9).apply(&rows), Vec::<i32>::new());
        assert_eq!(win(3..100).apply(&rows), vec![13, 14]);
        assert_eq!(win(7..).apply(&rows), Vec::<i32>::new());
    }
}
