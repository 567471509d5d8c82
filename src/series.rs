use crate::types::{is_sentinel, SENTINEL};

/// Maps a free-text product name to a known product line.
#[derive(Debug, Clone)]
pub struct SeriesClassifier {
    // (label, lowercase label), in priority order
    labels: Vec<(String, String)>,
}

impl SeriesClassifier {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = labels
            .into_iter()
            .map(|label| {
                let label: String = label.into();
                let lower = label.to_lowercase();
                (label, lower)
            })
            .collect();
        Self { labels }
    }

    /// First label contained in `name`, case-insensitively, or the sentinel.
    pub fn classify(&self, name: &str) -> String {
        if is_sentinel(name) {
            return SENTINEL.to_string();
        }
        let name_lower = name.to_lowercase();
        self.labels
            .iter()
            .find(|(_, lower)| name_lower.contains(lower.as_str()))
            .map(|(label, _)| label.clone())
            .unwrap_or_else(|| SENTINEL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;

    fn classifier() -> SeriesClassifier {
        SeriesClassifier::new(SiteProfile::ebay().series)
    }

    #[test]
    fn test_known_series() {
        let c = classifier();
        assert_eq!(c.classify("Nike Air Max 90 Essential"), "Air Max 90");
        assert_eq!(c.classify("NIKE AIR FORCE 1 '07 white"), "Air Force 1");
        assert_eq!(c.classify("Nike SB Dunk Low Pro"), "Dunk");
    }

    #[test]
    fn test_first_label_wins() {
        // "Air Max 270 React" would also match a later "React" label
        let c = SeriesClassifier::new(["Air Max 270", "React"]);
        assert_eq!(c.classify("Nike Air Max 270 React"), "Air Max 270");
    }

    #[test]
    fn test_unknown_and_empty() {
        let c = classifier();
        assert_eq!(c.classify("Unbranded Item"), "-");
        assert_eq!(c.classify(""), "-");
        assert_eq!(c.classify("-"), "-");
    }
}
