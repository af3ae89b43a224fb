//! `WinnersTable`: written once by the draw, read-only after.

use std::collections::HashMap;

/// Mapping from `agency_id` to the ordered documents of its winning bets.
/// Built exactly once per process lifetime by the draw action.
#[derive(Debug, Clone, Default)]
pub struct WinnersTable {
    by_agency: HashMap<u32, Vec<String>>,
}

impl WinnersTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `document` as a winner for `agency`, preserving submission order.
    pub fn record(&mut self, agency: u32, document: String) {
        self.by_agency.entry(agency).or_default().push(document);
    }

    /// Winning documents for `agency`, empty if the agency had none.
    pub fn for_agency(&self, agency: u32) -> &[String] {
        self.by_agency.get(&agency).map_or(&[], |v| v.as_slice())
    }
}
