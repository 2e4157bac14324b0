use std::collections::HashMap;

use crate::app::ports::{CorrectionHook, FacilityDirectory};
use crate::config::Config;
use crate::types::GeoPoint;

/// Facility master tables from `[sources.facilities]`, keyed by source.
#[derive(Debug, Clone, Default)]
pub struct FacilityTable {
    by_source: HashMap<String, HashMap<String, String>>,
}

impl FacilityTable {
    pub fn from_config(config: &Config) -> Self {
        let by_source = config
            .sources
            .iter()
            .map(|s| {
                let table = s
                    .facilities
                    .iter()
                    .map(|(name, addr)| (name.trim().to_string(), addr.trim().to_string()))
                    .filter(|(name, addr)| !name.is_empty() && !addr.is_empty())
                    .collect();
                (s.key.clone(), table)
            })
            .collect();
        Self { by_source }
    }
}

impl FacilityDirectory for FacilityTable {
    fn lookup(&self, source_key: &str, venue_name: &str) -> Option<String> {
        self.by_source.get(source_key)?.get(venue_name).cloned()
    }
}

/// Known-good coordinates from `[sources.corrections]`, keyed by source.
#[derive(Debug, Clone, Default)]
pub struct CorrectionTable {
    by_source: HashMap<String, HashMap<String, GeoPoint>>,
}

impl CorrectionTable {
    pub fn from_config(config: &Config) -> Self {
        let by_source = config
            .sources
            .iter()
            .map(|s| {
                let table = s
                    .corrections
                    .iter()
                    .map(|(name, point)| (name.trim().to_string(), *point))
                    .collect();
                (s.key.clone(), table)
            })
            .collect();
        Self { by_source }
    }
}

impl CorrectionHook for CorrectionTable {
    fn correct(&self, source_key: &str, venue_name: &str, _resolved: GeoPoint) -> Option<GeoPoint> {
        self.by_source.get(source_key)?.get(venue_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_toml_str(
            r#"
[[sources]]
key = "x"
[sources.facilities]
"中央公民館" = "東京都X市中央1-1-1"
"空欄" = "  "
[sources.corrections]
"市民体育館" = { lat = 35.7, lng = 139.7 }

[[sources]]
key = "y"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_facility_lookup_is_scoped_to_source() {
        let table = FacilityTable::from_config(&config());
        assert_eq!(table.lookup("x", "中央公民館").as_deref(), Some("東京都X市中央1-1-1"));
        assert_eq!(table.lookup("y", "中央公民館"), None);
        assert_eq!(table.lookup("x", "空欄"), None);
        assert_eq!(table.lookup("z", "中央公民館"), None);
    }

    #[test]
    fn test_corrections_replace_only_listed_venues() {
        let table = CorrectionTable::from_config(&config());
        let geocoded = GeoPoint::new(35.0, 139.0);
        assert_eq!(table.correct("x", "市民体育館", geocoded), Some(GeoPoint::new(35.7, 139.7)));
        assert_eq!(table.correct("x", "中央公民館", geocoded), None);
        assert_eq!(table.correct("y", "市民体育館", geocoded), None);
    }
}
