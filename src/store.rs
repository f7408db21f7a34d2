use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::export::{suggested_filename, to_delimited_text};
use crate::models::{Column, NormalizedRow};
use crate::normalize::{normalize, Normalized};
use crate::ordering::{paginate, total_pages, SortState, DEFAULT_PAGE_SIZE};
use crate::query::{filter, QueryDescriptor};

/// Identifies one fetch. Only the most recently issued token may update the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PageView<'a> {
    pub items: Vec<&'a NormalizedRow>,
    pub page: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub contents: String,
    pub row_count: usize,
}

/// Table state owned by one view: the fetched rows plus the query, sort and
/// page the user has chosen.
#[derive(Debug)]
pub struct AuditStore {
    rows: Vec<NormalizedRow>,
    agents: Vec<String>,
    status: LoadState,
    query: QueryDescriptor,
    sort: SortState,
    page_size: usize,
    page: usize,
    issued: u64,
}

impl Default for AuditStore {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl AuditStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            rows: Vec::new(),
            agents: Vec::new(),
            status: LoadState::Idle,
            query: QueryDescriptor::default(),
            sort: SortState::default(),
            page_size: page_size.max(1),
            page: 1,
            issued: 0,
        }
    }

    pub fn begin_fetch(&mut self) -> RequestToken {
        self.issued += 1;
        self.status = LoadState::Loading;
        RequestToken(self.issued)
    }

    /// Applies a fetch result. Returns false, leaving the store untouched, when a
    /// newer fetch has been started since `token` was issued.
    pub fn complete_fetch(
        &mut self,
        token: RequestToken,
        result: Result<Vec<Value>, IngestError>,
    ) -> bool {
        if token.0 != self.issued {
            debug!(token = token.0, latest = self.issued, "discarding stale call audit response");
            return false;
        }

        match result {
            Ok(records) => {
                let Normalized { rows, agents } = normalize(&records);
                info!(rows = rows.len(), agents = agents.len(), "call audit table refreshed");
                self.rows = rows;
                self.agents = agents;
                self.status = LoadState::Ready;
            }
            Err(err) => {
                warn!(%err, "call audit fetch failed");
                self.rows.clear();
                self.agents.clear();
                self.status = LoadState::Failed(err.to_string());
            }
        }
        self.page = 1;
        true
    }

    pub fn status(&self) -> &LoadState {
        &self.status
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_query(&mut self, query: QueryDescriptor) {
        self.query = query;
        self.page = 1;
    }

    /// Sorts on `column`, flipping direction if it is already the sort column.
    pub fn sort_by(&mut self, column: Column) {
        self.sort.toggle(column);
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        let total = total_pages(filter(&self.rows, &self.query).len(), self.page_size);
        self.page = page.clamp(1, total);
    }

    /// Rows matching the query, in sort order.
    pub fn filtered(&self) -> Vec<&NormalizedRow> {
        self.sort.apply(filter(&self.rows, &self.query))
    }

    pub fn page_view(&self) -> PageView<'_> {
        let filtered = self.filtered();
        let page = paginate(&filtered, self.page_size, self.page);
        PageView {
            items: page.items.to_vec(),
            page: page.page,
            total_pages: page.total_pages,
            total_rows: page.total_rows,
        }
    }

    /// CSV of every matching row, ignoring pagination. `None` when nothing matches.
    pub fn export(&self, today: NaiveDate) -> anyhow::Result<Option<ExportFile>> {
        let filtered = self.filtered();
        if filtered.is_empty() {
            warn!("no call audits match the current filters, nothing to export");
            return Ok(None);
        }
        let contents = to_delimited_text(&filtered)?;
        Ok(Some(ExportFile {
            filename: suggested_filename(today),
            contents,
            row_count: filtered.len(),
        }))
    }

    /// Raw record for the detail view.
    pub fn detail(&self, call_id: &str) -> Option<&Value> {
        self.rows
            .iter()
            .find(|row| row.call_id == call_id)
            .map(|row| &row.raw_data)
    }
}
