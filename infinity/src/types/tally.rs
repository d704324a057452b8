use std::collections::HashMap;

use super::enums::TestOutcome;

/// Outcome counters for one (group, test) cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub success: u64,
    pub fail: u64,
    pub skip: u64,
}

impl Tally {
    pub fn new(success: u64, fail: u64, skip: u64) -> Self {
        Self {
            success,
            fail,
            skip,
        }
    }

    /// Increment exactly the counter matching `outcome`.
    pub fn record(&mut self, outcome: TestOutcome) {
        match outcome {
            TestOutcome::Success => self.success += 1,
            TestOutcome::Fail => self.fail += 1,
            TestOutcome::Skip => self.skip += 1,
        }
    }

    pub fn count(&self, outcome: TestOutcome) -> u64 {
        match outcome {
            TestOutcome::Success => self.success,
            TestOutcome::Fail => self.fail,
            TestOutcome::Skip => self.skip,
        }
    }

    pub fn total(&self) -> u64 {
        self.success + self.fail + self.skip
    }
}

/// Per-(group, test) tally table backing the RUN tab.
///
/// Groups become rows and tests become columns, both kept in first-seen order.
/// Rows, columns and cells only ever grow during a run.
#[derive(Debug, Default)]
pub struct TallyTable {
    groups: Vec<String>,
    tests: Vec<String>,
    cells: HashMap<String, HashMap<String, Tally>>,
}

impl TallyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome and return the updated cell.
    pub fn record(&mut self, group: &str, test: &str, outcome: TestOutcome) -> Tally {
        if !self.tests.iter().any(|t| t == test) {
            self.tests.push(test.to_string());
        }
        if !self.cells.contains_key(group) {
            self.groups.push(group.to_string());
        }
        let tally = self
            .cells
            .entry(group.to_string())
            .or_default()
            .entry(test.to_string())
            .or_default();
        tally.record(outcome);
        *tally
    }

    pub fn get(&self, group: &str, test: &str) -> Option<&Tally> {
        self.cells.get(group)?.get(test)
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn tests(&self) -> &[String] {
        &self.tests
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of every cell, used for the header summary.
    pub fn totals(&self) -> Tally {
        self.cells
            .values()
            .flat_map(|row| row.values())
            .fold(Tally::default(), |acc, t| Tally {
                success: acc.success + t.success,
                fail: acc.fail + t.fail,
                skip: acc.skip + t.skip,
            })
    }
}
