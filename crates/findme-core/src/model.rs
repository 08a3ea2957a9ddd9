//! Submission, summary and principal type definitions

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of a missing-person case, driven by admin moderation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Published,
    Rejected,
    FoundAlive,
    FoundDead,
}

impl SubmissionStatus {
    /// Whether submissions in this status are visible to anonymous visitors
    pub fn is_public(self) -> bool {
        matches!(
            self,
            SubmissionStatus::Published | SubmissionStatus::FoundAlive | SubmissionStatus::FoundDead
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Published => "published",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::FoundAlive => "found_alive",
            SubmissionStatus::FoundDead => "found_dead",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = crate::FindmeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(SubmissionStatus::Pending),
            "published" => Ok(SubmissionStatus::Published),
            "rejected" => Ok(SubmissionStatus::Rejected),
            "found_alive" => Ok(SubmissionStatus::FoundAlive),
            "found_dead" => Ok(SubmissionStatus::FoundDead),
            other => Err(crate::FindmeError::Validation(format!(
                "Unknown status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Race {
    BlackAfrican,
    Coloured,
    White,
    AsianOrIndian,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Province {
    EasternCape,
    FreeState,
    Gauteng,
    KwazuluNatal,
    Limpopo,
    Mpumalanga,
    NorthWest,
    NorthernCape,
    WesternCape,
}

/// Serialized snake_case label of a unit enum, used as a summary map key
fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

/// A missing-person case record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub title: String,
    pub full_name: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub race: Option<Race>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub province: Option<Province>,
    #[serde(default)]
    pub description: Option<String>,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub last_seen_address: Option<String>,
    #[serde(default)]
    pub last_seen_place_id: Option<String>,
    #[serde(default)]
    pub last_seen_lat: Option<f64>,
    #[serde(default)]
    pub last_seen_lng: Option<f64>,
    /// Image URLs, first one is the primary reference photo
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// The photo used as the age-progression source
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whole years elapsed between `created_at` and `now`
    pub fn years_missing(&self, now: DateTime<Utc>) -> u32 {
        whole_years_between(self.created_at.date_naive(), now.date_naive())
    }

    /// Age when the person went missing, if the date of birth is known
    pub fn age_when_missing(&self) -> Option<u32> {
        self.dob
            .map(|dob| whole_years_between(dob, self.created_at.date_naive()))
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == Some(user_id)
    }
}

/// Number of full years from `from` to `to`, zero if `to` precedes `from`
pub fn whole_years_between(from: NaiveDate, to: NaiveDate) -> u32 {
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Payload for creating a submission; images are supplied separately
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubmission {
    pub title: String,
    pub full_name: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub race: Option<Race>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub province: Option<Province>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub last_seen_address: Option<String>,
    #[serde(default)]
    pub last_seen_place_id: Option<String>,
    #[serde(default)]
    pub last_seen_lat: Option<f64>,
    #[serde(default)]
    pub last_seen_lng: Option<f64>,
}

/// Minimum number of photos attached to a new submission
pub const MIN_SUBMISSION_IMAGES: usize = 3;

impl NewSubmission {
    /// Validate field constraints and the attached image count
    pub fn validate(&self, image_count: usize) -> crate::FindmeResult<()> {
        if self.title.trim().is_empty() || self.full_name.trim().is_empty() {
            return Err(crate::FindmeError::Validation(
                "title and full_name are required".to_string(),
            ));
        }
        validate_measurements(self.height, self.weight)?;
        if image_count < MIN_SUBMISSION_IMAGES {
            return Err(crate::FindmeError::Validation(format!(
                "At least {} images are required",
                MIN_SUBMISSION_IMAGES
            )));
        }
        Ok(())
    }
}

fn validate_measurements(height: Option<f64>, weight: Option<f64>) -> crate::FindmeResult<()> {
    if height.is_some_and(|h| h < 0.0) || weight.is_some_and(|w| w < 0.0) {
        return Err(crate::FindmeError::Validation(
            "height and weight must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionPatch {
    pub title: Option<String>,
    pub full_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub race: Option<Race>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub province: Option<Province>,
    pub description: Option<String>,
    pub status: Option<SubmissionStatus>,
    pub last_seen_address: Option<String>,
    pub last_seen_place_id: Option<String>,
    pub last_seen_lat: Option<f64>,
    pub last_seen_lng: Option<f64>,
    pub images: Option<Vec<String>>,
}

impl SubmissionPatch {
    pub fn validate(&self) -> crate::FindmeResult<()> {
        validate_measurements(self.height, self.weight)
    }

    /// Apply every provided field to `submission`
    pub fn apply(self, submission: &mut Submission) {
        let p = self;
        if let Some(v) = p.title {
            submission.title = v;
        }
        if let Some(v) = p.full_name {
            submission.full_name = v;
        }
        if let Some(v) = p.status {
            submission.status = v;
        }
        if let Some(v) = p.images {
            submission.images = v;
        }
        submission.dob = p.dob.or(submission.dob);
        submission.gender = p.gender.or(submission.gender);
        submission.race = p.race.or(submission.race);
        submission.height = p.height.or(submission.height);
        submission.weight = p.weight.or(submission.weight);
        submission.province = p.province.or(submission.province);
        submission.last_seen_lat = p.last_seen_lat.or(submission.last_seen_lat);
        submission.last_seen_lng = p.last_seen_lng.or(submission.last_seen_lng);
        if p.description.is_some() {
            submission.description = p.description;
        }
        if p.last_seen_address.is_some() {
            submission.last_seen_address = p.last_seen_address;
        }
        if p.last_seen_place_id.is_some() {
            submission.last_seen_place_id = p.last_seen_place_id;
        }
    }
}

/// Submission counts for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitterCount {
    pub user_id: i64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicCounts {
    pub public: usize,
    pub non_public: usize,
}

/// Aggregates backing the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub total_submissions: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub province_counts: BTreeMap<String, usize>,
    pub gender_counts: BTreeMap<String, usize>,
    pub race_counts: BTreeMap<String, usize>,
    pub public_counts: PublicCounts,
    pub found_rate: f64,
    pub found_alive_count: usize,
    pub found_dead_count: usize,
    pub avg_images_per_submission: f64,
    pub monthly_new: Vec<MonthlyCount>,
    pub top_submitters: Vec<SubmitterCount>,
}

/// Number of entries in `SubmissionSummary::top_submitters`
pub const TOP_SUBMITTERS: usize = 5;

impl SubmissionSummary {
    /// Aggregate a set of submissions as of `now`
    pub fn compute<'a, I>(submissions: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a Submission>,
    {
        let mut summary = SubmissionSummary::default();
        let mut images_total = 0usize;
        let mut months: BTreeMap<String, usize> = BTreeMap::new();
        let mut submitters: BTreeMap<i64, usize> = BTreeMap::new();

        for s in submissions {
            summary.total_submissions += 1;
            *summary.status_counts.entry(s.status.to_string()).or_default() += 1;
            if let Some(p) = &s.province {
                *summary.province_counts.entry(label(p)).or_default() += 1;
            }
            if let Some(g) = &s.gender {
                *summary.gender_counts.entry(label(g)).or_default() += 1;
            }
            if let Some(r) = &s.race {
                *summary.race_counts.entry(label(r)).or_default() += 1;
            }
            if s.status.is_public() {
                summary.public_counts.public += 1;
            }
            match s.status {
                SubmissionStatus::FoundAlive => summary.found_alive_count += 1,
                SubmissionStatus::FoundDead => summary.found_dead_count += 1,
                _ => {}
            }
            images_total += s.images.len();
            *months
                .entry(s.created_at.format("%Y-%m").to_string())
                .or_default() += 1;
            if let Some(uid) = s.user_id {
                *submitters.entry(uid).or_default() += 1;
            }
        }

        let total = summary.total_submissions;
        summary.public_counts.non_public = total - summary.public_counts.public;
        if total > 0 {
            summary.found_rate =
                (summary.found_alive_count + summary.found_dead_count) as f64 / total as f64;
            summary.avg_images_per_submission = images_total as f64 / total as f64;
        }

        summary.monthly_new = last_twelve_months(now)
            .into_iter()
            .map(|month| MonthlyCount {
                count: months.get(&month).copied().unwrap_or(0),
                month,
            })
            .collect();

        let mut top: Vec<SubmitterCount> = submitters
            .into_iter()
            .map(|(user_id, count)| SubmitterCount { user_id, count })
            .collect();
        // Stable sort keeps ascending user_id order among ties
        top.sort_by(|a, b| b.count.cmp(&a.count));
        top.truncate(TOP_SUBMITTERS);
        summary.top_submitters = top;

        summary
    }
}

/// `YYYY-MM` labels for the twelve months ending with `now`, oldest first
fn last_twelve_months(now: DateTime<Utc>) -> Vec<String> {
    let current = now.year() * 12 + now.month0() as i32;
    (0..12)
        .rev()
        .map(|back| {
            let index = current - back;
            format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
        })
        .collect()
}

/// Authorization roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Every assignable role, in id order
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    /// Stable numeric identifier exposed by the admin API
    pub fn id(self) -> i64 {
        match self {
            Role::User => 1,
            Role::Admin => 2,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::FindmeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(crate::FindmeError::Validation(format!(
                "Unknown role: {}",
                other
            ))),
        }
    }
}

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i64,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Succeeds when the principal holds any of `roles`; an empty list admits everyone
    pub fn require_any(&self, roles: &[Role]) -> crate::FindmeResult<()> {
        if roles.is_empty() || roles.iter().any(|r| self.has_role(*r)) {
            Ok(())
        } else {
            Err(crate::FindmeError::Forbidden(format!(
                "requires one of: {}",
                roles
                    .iter()
                    .map(Role::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    /// Owners and admins may modify a submission
    pub fn can_modify(&self, submission: &Submission) -> bool {
        self.is_admin() || submission.is_owned_by(self.user_id)
    }
}
