/// Stats from one monitoring run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub companies_processed: u32,
    pub articles_fetched: u32,
    pub gate_passed: u32,
    pub events_stored: u32,
    pub duplicates_skipped: u32,
    pub alerts_sent: u32,
    pub graph_edges_written: u32,
    pub errors: u32,
}

impl RunStats {
    /// Fraction of fetched articles the gate filtered out before analysis.
    pub fn noise_reduction_pct(&self) -> f64 {
        if self.articles_fetched == 0 {
            return 0.0;
        }
        let filtered = self.articles_fetched - self.gate_passed;
        filtered as f64 / self.articles_fetched as f64 * 100.0
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Monitoring Run Complete ===")?;
        writeln!(f, "Companies processed: {}", self.companies_processed)?;
        writeln!(f, "Articles fetched:    {}", self.articles_fetched)?;
        writeln!(
            f,
            "Gate passed:         {} ({:.0}% noise filtered)",
            self.gate_passed,
            self.noise_reduction_pct()
        )?;
        writeln!(f, "Events stored:       {}", self.events_stored)?;
        writeln!(f, "Duplicates skipped:  {}", self.duplicates_skipped)?;
        writeln!(f, "Alerts sent:         {}", self.alerts_sent)?;
        writeln!(f, "Graph edges written: {}", self.graph_edges_written)?;
        if self.errors > 0 {
            writeln!(f, "Errors:              {}", self.errors)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_reduction_handles_zero_articles() {
        assert_eq!(RunStats::default().noise_reduction_pct(), 0.0);
    }

    #[test]
    fn noise_reduction_is_filtered_fraction() {
        let stats = RunStats {
            articles_fetched: 10,
            gate_passed: 3,
            ..Default::default()
        };
        assert_eq!(stats.noise_reduction_pct(), 70.0);
    }
}
