//! Cache keys and age buckets

use serde::Serialize;

/// Decade bucket of the subject's projected age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AgeBucket {
    Under20,
    Twenties,
    Thirties,
    Forties,
    Fifties,
    SixtyPlus,
}

impl AgeBucket {
    pub fn from_target_age(age: u32) -> Self {
        match age {
            0..=19 => AgeBucket::Under20,
            20..=29 => AgeBucket::Twenties,
            30..=39 => AgeBucket::Thirties,
            40..=49 => AgeBucket::Forties,
            50..=59 => AgeBucket::Fifties,
            _ => AgeBucket::SixtyPlus,
        }
    }

    /// Label used in artifact file names
    pub fn label(self) -> &'static str {
        match self {
            AgeBucket::Under20 => "<20",
            AgeBucket::Twenties => "20s",
            AgeBucket::Thirties => "30s",
            AgeBucket::Forties => "40s",
            AgeBucket::Fifties => "50s",
            AgeBucket::SixtyPlus => "60+",
        }
    }
}

impl std::fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of one age-progression artifact.
///
/// Keys are exact in `years`; the optional bucket separates renditions of the
/// same elapsed time for subjects of different projected ages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub submission_id: i64,
    pub years: u32,
    pub age_bucket: Option<AgeBucket>,
}

impl CacheKey {
    /// Build a key; `years` is raised to at least 1
    pub fn new(submission_id: i64, years: u32, target_age: Option<u32>) -> Self {
        Self {
            submission_id,
            years: years.max(1),
            age_bucket: target_age.map(AgeBucket::from_target_age),
        }
    }

    /// Deterministic artifact file name
    pub fn file_name(&self) -> String {
        match self.age_bucket {
            Some(bucket) => format!("ap_{}_{}_{}.jpg", self.submission_id, self.years, bucket),
            None => format!("ap_{}_{}.jpg", self.submission_id, self.years),
        }
    }
}

/// Age-group label sent to providers.
///
/// Derived from the projected age when known, otherwise from elapsed years.
pub fn age_group(years: u32, target_age: Option<u32>) -> &'static str {
    match target_age {
        Some(age) if age < 25 => "20-30",
        Some(age) if age < 35 => "30-40",
        Some(age) if age < 45 => "40-50",
        Some(age) if age < 60 => "50-60",
        Some(_) => "60-70",
        None if years >= 15 => "50-60",
        None if years >= 10 => "40-50",
        None => "30-40",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(AgeBucket::from_target_age(0), AgeBucket::Under20);
        assert_eq!(AgeBucket::from_target_age(19), AgeBucket::Under20);
        assert_eq!(AgeBucket::from_target_age(20), AgeBucket::Twenties);
        assert_eq!(AgeBucket::from_target_age(59), AgeBucket::Fifties);
        assert_eq!(AgeBucket::from_target_age(60), AgeBucket::SixtyPlus);
        assert_eq!(AgeBucket::from_target_age(104), AgeBucket::SixtyPlus);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(CacheKey::new(42, 10, None).file_name(), "ap_42_10.jpg");
        assert_eq!(CacheKey::new(7, 5, Some(17)).file_name(), "ap_7_5_<20.jpg");
        assert_eq!(CacheKey::new(7, 5, Some(63)).file_name(), "ap_7_5_60+.jpg");
    }

    #[test]
    fn test_years_clamped() {
        assert_eq!(CacheKey::new(1, 0, None), CacheKey::new(1, 1, None));
        assert_eq!(CacheKey::new(1, 0, None).file_name(), "ap_1_1.jpg");
    }

    #[test]
    fn test_distinct_years_distinct_keys() {
        let a = CacheKey::new(42, 10, None);
        let b = CacheKey::new(42, 11, None);
        assert_ne!(a, b);
        assert_ne!(a.file_name(), b.file_name());

        let young = CacheKey::new(42, 10, Some(25));
        let old = CacheKey::new(42, 10, Some(45));
        assert_ne!(young.file_name(), old.file_name());
    }

    #[test]
    fn test_age_group() {
        assert_eq!(age_group(3, Some(24)), "20-30");
        assert_eq!(age_group(3, Some(44)), "40-50");
        assert_eq!(age_group(3, Some(70)), "60-70");
        assert_eq!(age_group(15, None), "50-60");
        assert_eq!(age_group(10, None), "40-50");
        assert_eq!(age_group(1, None), "30-40");
    }
}
