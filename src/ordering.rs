use std::cmp::Ordering;

use crate::models::{Column, NormalizedRow};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Which column the table is sorted on, if any. Rows keep fetch order until
/// a column is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<Column>,
    pub direction: SortDirection,
}

impl SortState {
    /// Choosing the current column again flips direction; a new column starts ascending.
    pub fn toggle(&mut self, column: Column) {
        if self.column == Some(column) {
            self.direction = self.direction.flipped();
        } else {
            self.column = Some(column);
            self.direction = SortDirection::Ascending;
        }
    }

    pub fn apply<'a>(&self, rows: Vec<&'a NormalizedRow>) -> Vec<&'a NormalizedRow> {
        match self.column {
            Some(column) => sort(rows, column, self.direction),
            None => rows,
        }
    }
}

pub fn compare(a: &NormalizedRow, b: &NormalizedRow, column: Column) -> Ordering {
    match column {
        Column::TotalScore => a.total_score.cmp(&b.total_score),
        _ => a.value(column).cmp(&b.value(column)),
    }
}

/// Stable in both directions: rows with equal keys keep their input order.
pub fn sort<'a>(
    mut rows: Vec<&'a NormalizedRow>,
    column: Column,
    direction: SortDirection,
) -> Vec<&'a NormalizedRow> {
    rows.sort_by(|a, b| match direction {
        SortDirection::Ascending => compare(a, b, column),
        SortDirection::Descending => compare(b, a, column),
    });
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based, already clamped into range.
    pub page: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

pub fn total_pages(row_count: usize, page_size: usize) -> usize {
    row_count.div_ceil(page_size.max(1)).max(1)
}

/// Slices out one page. Out-of-range page numbers clamp to the first or last page.
pub fn paginate<T>(rows: &[T], page_size: usize, page: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(rows.len(), page_size);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(rows.len());

    Page {
        items: rows.get(start..end).unwrap_or_default(),
        page,
        total_pages,
        total_rows: rows.len(),
    }
}
