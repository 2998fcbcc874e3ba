use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    /// Membership already matched; no mutation was issued.
    Unchanged,
    Applied,
    /// Preview mode: the plan was computed and nothing was sent.
    Previewed,
    /// Some batches were applied and at least one failed.
    PartialFailure,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub action: BatchAction,
    pub size: usize,
    pub error: String,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            BatchAction::Add => "add",
            BatchAction::Remove => "remove",
        };
        write!(f, "{action} batch of {} assets failed: {}", self.size, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleReport {
    pub name: String,
    pub album_id: Option<String>,
    pub album_created: bool,
    pub desired: usize,
    pub added: usize,
    pub removed: usize,
    pub rejected: usize,
    pub unmatched_people: Vec<String>,
    pub failures: Vec<String>,
    pub outcome: RuleOutcome,
}

impl RuleReport {
    pub fn new(name: impl Into<String>, desired: usize) -> Self {
        Self {
            name: name.into(),
            album_id: None,
            album_created: false,
            desired,
            added: 0,
            removed: 0,
            rejected: 0,
            unmatched_people: Vec::new(),
            failures: Vec::new(),
            outcome: RuleOutcome::Unchanged,
        }
    }

    pub fn failed(mut self, error: impl fmt::Display) -> Self {
        self.failures.push(error.to_string());
        self.outcome = RuleOutcome::Failed;
        self
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            RuleOutcome::Failed | RuleOutcome::PartialFailure
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialFailure,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::PartialFailure => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub preview: bool,
    pub assets_scanned: usize,
    pub rules: Vec<RuleReport>,
}

impl RunSummary {
    pub fn status(&self) -> RunStatus {
        if self.rules.iter().any(RuleReport::is_failure) {
            RunStatus::PartialFailure
        } else {
            RunStatus::Success
        }
    }

    pub fn rule(&self, name: &str) -> Option<&RuleReport> {
        self.rules.iter().find(|rule| rule.name == name)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.preview {
            "SYNC PREVIEW"
        } else {
            "SYNC SUMMARY"
        };
        writeln!(f, "{title} ({} assets scanned)", self.assets_scanned)?;
        for rule in &self.rules {
            writeln!(f, "album {:?}: {:?}", rule.name, rule.outcome)?;
            if rule.album_created {
                writeln!(f, "  created album")?;
            }
            writeln!(
                f,
                "  added {}, removed {}, rejected {}, total {}",
                rule.added, rule.removed, rule.rejected, rule.desired
            )?;
            if !rule.unmatched_people.is_empty() {
                writeln!(f, "  unmatched people: {}", rule.unmatched_people.join(", "))?;
            }
            for failure in &rule.failures {
                writeln!(f, "  error: {failure}")?;
            }
        }
        Ok(())
    }
}
