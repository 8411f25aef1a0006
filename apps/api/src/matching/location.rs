//! Narrows candidates by country/city substring of the free-text location.

use crate::matching::catalog::JobRecord;
use crate::matching::normalize::normalize;

/// Optional country and city constraints, both normalized. AND semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationFilter {
    country: Option<String>,
    city: Option<String>,
}

impl LocationFilter {
    /// Blank inputs (after normalization) count as "no constraint".
    pub fn new(country: Option<&str>, city: Option<&str>) -> Self {
        let clean = |value: Option<&str>| value.map(normalize).filter(|v| !v.is_empty());
        Self {
            country: clean(country),
            city: clean(city),
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.country.is_none() && self.city.is_none()
    }

    /// True when every given constraint is a substring of the normalized location.
    pub fn matches(&self, location: &str) -> bool {
        if self.is_unfiltered() {
            return true;
        }
        let location = normalize(location);
        let contains = |needle: &Option<String>| {
            needle
                .as_deref()
                .map_or(true, |n| location.contains(n))
        };
        contains(&self.country) && contains(&self.city)
    }

    /// Positions in `jobs` that pass the filter, in their original order.
    pub fn filter_candidates(&self, jobs: &[JobRecord]) -> Vec<usize> {
        jobs.iter()
            .enumerate()
            .filter(|(_, job)| self.matches(&job.location))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobs() -> Vec<JobRecord> {
        vec![
            JobRecord::fixture("a", "A", "python", "Berlin, Germany"),
            JobRecord::fixture("b", "B", "java", "Austin, TX, USA"),
            JobRecord::fixture("c", "C", "python", "Munich, Bavaria, GERMANY"),
            JobRecord::fixture("d", "D", "go", ""),
        ]
    }

    #[test]
    fn test_no_filters_keeps_everything() {
        assert_eq!(LocationFilter::new(None, None).filter_candidates(&jobs()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_country_substring_case_insensitive() {
        let filter = LocationFilter::new(Some("Germany"), None);
        assert_eq!(filter.filter_candidates(&jobs()), vec![0, 2]);
    }

    #[test]
    fn test_country_and_city_are_conjunctive() {
        let filter = LocationFilter::new(Some("germany"), Some("Munich"));
        assert_eq!(filter.filter_candidates(&jobs()), vec![2]);
        let filter = LocationFilter::new(Some("USA"), Some("Berlin"));
        assert!(filter.filter_candidates(&jobs()).is_empty());
    }

    #[test]
    fn test_no_match_is_empty() {
        let filter = LocationFilter::new(Some("Japan"), None);
        assert!(filter.filter_candidates(&jobs()).is_empty());
    }

    #[test]
    fn test_blank_filter_values_are_ignored() {
        let filter = LocationFilter::new(Some("  "), Some(""));
        assert!(filter.is_unfiltered());
        assert_eq!(filter.filter_candidates(&jobs()).len(), 4);
    }
}
