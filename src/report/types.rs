/// Summary of one harvest, shown on the terminal.
#[derive(Debug)]
pub struct HarvestReport {
    /// Repository harvested, "owner/name"
    pub repo: String,
    /// Issues in the result (0 when only the placeholder came back)
    pub issues: usize,
    /// Issues with a resolved closing-commit diff
    pub with_diff: usize,
    /// Comments across all issues
    pub comments: usize,
    /// Changed files across all closing commits
    pub files_changed: usize,
    /// Label name and how many issues carry it, most frequent first
    pub top_labels: Vec<(String, usize)>,
    /// True when the harvest found nothing
    pub no_data: bool,
}

impl HarvestReport {
    /// Share of issues whose closing commit was found, in percent.
    pub fn diff_coverage(&self) -> usize {
        if self.issues == 0 {
            0
        } else {
            self.with_diff * 100 / self.issues
        }
    }
}
