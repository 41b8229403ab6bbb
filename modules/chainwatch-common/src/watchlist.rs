use std::path::Path;

use serde::Deserialize;

use crate::error::ChainwatchError;
use crate::types::{Company, SupplyNode};

/// TOML-backed watchlist of tracked companies.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Watchlist {
    pub companies: Vec<Company>,
}

impl Watchlist {
    /// Resolve a requested set of names against the watchlist,
    /// matching case-insensitively on name or ticker. Names that match
    /// nothing get a minimal ad-hoc entry so the pipeline still runs.
    pub fn select(&self, requested: &[String]) -> Vec<Company> {
        if requested.is_empty() {
            return self.companies.clone();
        }

        let wanted: Vec<String> = requested.iter().map(|n| n.to_lowercase()).collect();
        let mut selected: Vec<Company> = self
            .companies
            .iter()
            .filter(|c| {
                wanted.contains(&c.name.to_lowercase()) || wanted.contains(&c.ticker.to_lowercase())
            })
            .cloned()
            .collect();

        for name in requested {
            let lower = name.to_lowercase();
            let matched = selected
                .iter()
                .any(|c| c.name.to_lowercase() == lower || c.ticker.to_lowercase() == lower);
            if !matched {
                selected.push(Company::ad_hoc(name));
            }
        }

        selected
    }
}

/// Load and validate the watchlist TOML. Validation failures are fatal:
/// a partial run over a malformed watchlist is worse than no run.
pub fn load_watchlist(path: &Path) -> Result<Watchlist, ChainwatchError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ChainwatchError::Config(format!(
            "failed to read watchlist file {}: {e}",
            path.display()
        ))
    })?;
    let watchlist: Watchlist = toml::from_str(&content).map_err(|e| {
        ChainwatchError::Config(format!(
            "failed to parse watchlist file {}: {e}",
            path.display()
        ))
    })?;
    validate(&watchlist)?;
    Ok(watchlist)
}

fn validate(watchlist: &Watchlist) -> Result<(), ChainwatchError> {
    if watchlist.companies.is_empty() {
        return Err(ChainwatchError::Validation(
            "watchlist has no companies".to_string(),
        ));
    }
    for company in &watchlist.companies {
        if company.name.trim().is_empty() {
            return Err(ChainwatchError::Validation(
                "watchlist company with empty name".to_string(),
            ));
        }
        if company.ticker.trim().is_empty() {
            return Err(ChainwatchError::Validation(format!(
                "company '{}' has empty ticker",
                company.name
            )));
        }
        for node in &company.nodes {
            validate_node(&company.name, node)?;
        }
    }
    Ok(())
}

fn validate_node(company: &str, node: &SupplyNode) -> Result<(), ChainwatchError> {
    if node.entity.trim().is_empty() || node.location.trim().is_empty() {
        return Err(ChainwatchError::Validation(format!(
            "company '{company}' has a supply node with empty entity or location"
        )));
    }
    if !node.lat.is_finite() || !node.lng.is_finite() {
        return Err(ChainwatchError::Validation(format!(
            "company '{company}' node '{}' has non-finite coordinates",
            node.entity
        )));
    }
    if node.lat.abs() > 90.0 || node.lng.abs() > 180.0 {
        return Err(ChainwatchError::Validation(format!(
            "company '{company}' node '{}' has out-of-range coordinates",
            node.entity
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Watchlist {
        toml::from_str(
            r#"
            [[companies]]
            name = "Apple Inc"
            ticker = "AAPL"
            keywords = ["chip", "supplier"]

            [[companies.nodes]]
            entity = "TSMC"
            location = "Tainan, Taiwan"
            kind = "semiconductor_fab"
            lat = 22.99
            lng = 120.22

            [[companies]]
            name = "Tesla Inc"
            ticker = "TSLA"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn select_empty_request_returns_all() {
        let w = sample();
        assert_eq!(w.select(&[]).len(), 2);
    }

    #[test]
    fn select_matches_name_case_insensitive() {
        let w = sample();
        let picked = w.select(&["apple inc".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].ticker, "AAPL");
    }

    #[test]
    fn select_matches_ticker() {
        let w = sample();
        let picked = w.select(&["tsla".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "Tesla Inc");
    }

    #[test]
    fn select_unmatched_name_gets_ad_hoc_entry() {
        let w = sample();
        let picked = w.select(&["Globex".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "Globex");
        assert_eq!(picked[0].ticker, "GLOB");
        assert!(picked[0].nodes.is_empty());
    }

    #[test]
    fn validate_rejects_empty_ticker() {
        let w: Watchlist = toml::from_str(
            r#"
            [[companies]]
            name = "Broken"
            ticker = ""
            "#,
        )
        .unwrap();
        assert!(matches!(validate(&w), Err(ChainwatchError::Validation(_))));
    }

    #[test]
    fn load_missing_file_is_a_config_error() {
        let err = load_watchlist(Path::new("/nonexistent/watchlist.toml")).unwrap_err();
        assert!(matches!(err, ChainwatchError::Config(_)));
    }

    #[test]
    fn load_unparseable_toml_is_a_config_error() {
        let path = std::env::temp_dir().join(format!(
            "chainwatch-watchlist-broken-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "companies = not toml").unwrap();
        let err = load_watchlist(&path).unwrap_err();
        assert!(matches!(err, ChainwatchError::Config(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn validate_rejects_out_of_range_coordinates() {
        let w: Watchlist = toml::from_str(
            r#"
            [[companies]]
            name = "Broken"
            ticker = "BRK"

            [[companies.nodes]]
            entity = "Plant"
            location = "Nowhere"
            kind = "assembly"
            lat = 123.0
            lng = 10.0
            "#,
        )
        .unwrap();
        assert!(validate(&w).is_err());
    }

    #[test]
    fn validate_accepts_sample() {
        assert!(validate(&sample()).is_ok());
    }
}
