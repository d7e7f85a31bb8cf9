/// Stats from one pipeline run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub items_fetched: u32,
    pub items_normalized: u32,
    pub items_dropped: u32,
    pub candidates_extracted: u32,
    pub clusters_formed: u32,
    pub clusters_accepted: u32,
    pub clusters_rejected: u32,
    pub judge_failures: u32,
    pub posted: u32,
    pub post_failures: u32,
    pub skipped_duplicates: u32,
    pub dry_run_posts: u32,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Demand Scout Run Complete ===")?;
        writeln!(f, "Items fetched:       {}", self.items_fetched)?;
        writeln!(f, "Items normalized:    {}", self.items_normalized)?;
        writeln!(f, "Items dropped:       {}", self.items_dropped)?;
        writeln!(f, "Demand candidates:   {}", self.candidates_extracted)?;
        writeln!(f, "Clusters formed:     {}", self.clusters_formed)?;
        writeln!(f, "\nJudge verdicts:")?;
        writeln!(f, "  Accepted: {}", self.clusters_accepted)?;
        writeln!(f, "  Rejected: {}", self.clusters_rejected)?;
        if self.judge_failures > 0 {
            writeln!(f, "  Judge failures: {}", self.judge_failures)?;
        }
        writeln!(f, "\nPublication:")?;
        writeln!(f, "  Posted:     {}", self.posted)?;
        writeln!(f, "  Failed:     {}", self.post_failures)?;
        writeln!(f, "  Duplicates: {}", self.skipped_duplicates)?;
        if self.dry_run_posts > 0 {
            writeln!(f, "  Dry run:    {}", self.dry_run_posts)?;
        }
        Ok(())
    }
}
