//! CLI commands implementation

use anyhow::Result;
use findme_core::{Comment, Role, Submission, SubmissionStatus, SubmissionSummary, User};
use serde::{Deserialize, Serialize};

/// API client for communicating with the daemon
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Resolve a URL returned by the API, which may be relative to the daemon
    pub fn absolute(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.url(url)
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn require_token(&self) -> Result<()> {
        if self.token.is_none() {
            anyhow::bail!("This command requires --token or FINDME_TOKEN");
        }
        Ok(())
    }
}

/// Age-progression response from API
#[derive(Debug, Deserialize)]
pub struct AgeProgressionResponse {
    pub url: String,
}

/// List submissions
pub async fn list(client: &ApiClient, page: usize, limit: usize, mine: bool) -> Result<()> {
    let path = if mine {
        client.require_token()?;
        "/submissions/mine"
    } else {
        "/submissions"
    };

    let response = client
        .request(reqwest::Method::GET, path)
        .query(&[("page", page), ("limit", limit)])
        .send()
        .await?;

    if response.status().is_success() {
        let submissions: Vec<Submission> = response.json().await?;

        if submissions.is_empty() {
            println!("No submissions found");
        } else {
            println!(
                "{:<8} {:<30} {:<25} {:<12} {:<8}",
                "ID", "TITLE", "NAME", "STATUS", "IMAGES"
            );
            println!("{}", "-".repeat(86));
            for s in submissions {
                println!(
                    "{:<8} {:<30} {:<25} {:<12} {:<8}",
                    s.id,
                    truncate(&s.title, 29),
                    truncate(&s.full_name, 24),
                    s.status,
                    s.images.len()
                );
            }
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to list submissions: {}", error);
    }

    Ok(())
}

/// Show a single submission
pub async fn show(client: &ApiClient, id: i64) -> Result<()> {
    let response = client
        .request(reqwest::Method::GET, &format!("/submissions/{}", id))
        .send()
        .await?;

    if response.status().is_success() {
        let submission: Submission = response.json().await?;
        print_submission_details(&submission);
    } else {
        let error = response.text().await?;
        eprintln!("Submission not found: {}", error);
    }

    Ok(())
}

/// Resolve an age-progressed photo
pub async fn age(client: &ApiClient, id: i64, years: Option<u32>) -> Result<()> {
    let mut request = client.request(
        reqwest::Method::GET,
        &format!("/submissions/{}/age-progression", id),
    );
    if let Some(years) = years {
        request = request.query(&[("years", years)]);
    }
    let response = request.send().await?;

    if response.status().is_success() {
        let body: AgeProgressionResponse = response.json().await?;
        println!("{}", client.absolute(&body.url));
    } else {
        let status = response.status();
        let error = response.text().await?;
        eprintln!("Failed to resolve age progression ({}): {}", status, error);
    }

    Ok(())
}

/// Show the dashboard summary
pub async fn summary(client: &ApiClient) -> Result<()> {
    client.require_token()?;
    let response = client
        .request(reqwest::Method::GET, "/submissions/summary")
        .send()
        .await?;

    if response.status().is_success() {
        let summary: SubmissionSummary = response.json().await?;

        println!("Submissions: {}", summary.total_submissions);
        println!(
            "  Public: {}  Non-public: {}",
            summary.public_counts.public, summary.public_counts.non_public
        );
        println!(
            "  Found: {} alive, {} dead ({:.1}%)",
            summary.found_alive_count,
            summary.found_dead_count,
            summary.found_rate * 100.0
        );
        println!(
            "  Images per submission: {:.2}",
            summary.avg_images_per_submission
        );

        println!("\nBy status:");
        for (status, count) in &summary.status_counts {
            println!("  {:<14} {}", status, count);
        }

        println!("\nLast 12 months:");
        for month in &summary.monthly_new {
            println!("  {} {}", month.month, month.count);
        }

        if !summary.top_submitters.is_empty() {
            println!("\nTop submitters:");
            for s in &summary.top_submitters {
                println!("  user {:<8} {}", s.user_id, s.count);
            }
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to get summary: {}", error);
    }

    Ok(())
}

/// Move a submission to a new status
pub async fn moderate(client: &ApiClient, id: i64, status: SubmissionStatus) -> Result<()> {
    client.require_token()?;

    #[derive(Serialize)]
    struct ModerateRequest {
        status: SubmissionStatus,
    }

    let response = client
        .request(reqwest::Method::POST, &format!("/submissions/{}/status", id))
        .json(&ModerateRequest { status })
        .send()
        .await?;

    if response.status().is_success() {
        let submission: Submission = response.json().await?;
        println!("Submission {} is now {}", submission.id, submission.status);
    } else {
        let error = response.text().await?;
        eprintln!("Failed to moderate submission: {}", error);
    }

    Ok(())
}

/// Delete a submission
pub async fn delete(client: &ApiClient, id: i64) -> Result<()> {
    client.require_token()?;

    let response = client
        .request(reqwest::Method::DELETE, &format!("/submissions/{}", id))
        .send()
        .await?;

    if response.status().is_success() {
        println!("Submission {} deleted", id);
    } else {
        let error = response.text().await?;
        eprintln!("Failed to delete submission: {}", error);
    }

    Ok(())
}

/// List approved comments on a submission
pub async fn comments(client: &ApiClient, submission_id: i64) -> Result<()> {
    let response = client
        .request(reqwest::Method::GET, "/comments")
        .query(&[("submission_id", submission_id)])
        .send()
        .await?;

    if response.status().is_success() {
        let comments: Vec<Comment> = response.json().await?;
        if comments.is_empty() {
            println!("No comments");
        }
        for c in comments {
            println!(
                "[{}] {}: {}",
                c.created_at.format("%Y-%m-%d %H:%M"),
                c.author_name.as_deref().unwrap_or("anonymous"),
                c.body
            );
            if let Some(image) = &c.image_url {
                println!("    {}", client.absolute(image));
            }
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to list comments: {}", error);
    }

    Ok(())
}

/// List user accounts
pub async fn users(client: &ApiClient, page: usize, limit: usize) -> Result<()> {
    client.require_token()?;
    let response = client
        .request(reqwest::Method::GET, "/admin/users")
        .query(&[("page", page), ("limit", limit)])
        .send()
        .await?;

    if response.status().is_success() {
        let users: Vec<User> = response.json().await?;
        println!("{:<8} {:<32} {:<24} {:<8} {:<8}", "ID", "EMAIL", "NAME", "ROLE", "ACTIVE");
        println!("{}", "-".repeat(84));
        for u in users {
            println!(
                "{:<8} {:<32} {:<24} {:<8} {:<8}",
                u.id,
                truncate(&u.email, 31),
                truncate(&u.display_name(), 23),
                role_names(&u),
                if u.is_active { "yes" } else { "no" }
            );
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to list users: {}", error);
    }

    Ok(())
}

/// Assign a role to a user
pub async fn set_role(client: &ApiClient, id: i64, role: Role) -> Result<()> {
    client.require_token()?;

    #[derive(Serialize)]
    struct SetRoleRequest {
        role_name: String,
    }

    let response = client
        .request(reqwest::Method::PUT, &format!("/admin/users/{}/role", id))
        .json(&SetRoleRequest {
            role_name: role.to_string(),
        })
        .send()
        .await?;

    if response.status().is_success() {
        let user: User = response.json().await?;
        println!("User {} is now {}", user.id, role_names(&user));
    } else {
        let error = response.text().await?;
        eprintln!("Failed to set role: {}", error);
    }

    Ok(())
}

fn role_names(user: &User) -> String {
    user.roles
        .iter()
        .map(|r| r.name.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Helper to print submission details
fn print_submission_details(s: &Submission) {
    println!("Submission: {}", s.title);
    println!("  ID: {}", s.id);
    println!("  Name: {}", s.full_name);
    println!("  Status: {}", s.status);
    if let Some(dob) = s.dob {
        println!("  Date of birth: {}", dob);
    }
    if let Some(age) = s.age_when_missing() {
        println!("  Age when missing: {}", age);
    }
    if let Some(address) = &s.last_seen_address {
        println!("  Last seen: {}", address);
    }
    println!("  Filed: {}", s.created_at.format("%Y-%m-%d"));
    if let Some(description) = &s.description {
        println!("  Description: {}", description);
    }
    if !s.images.is_empty() {
        println!("  Images:");
        for image in &s.images {
            println!("    {}", image);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = ApiClient::new("http://localhost:8000/", None);
        assert_eq!(client.url("/submissions"), "http://localhost:8000/submissions");
        assert_eq!(
            client.absolute("/files/age_progression/ap_1_5.jpg"),
            "http://localhost:8000/files/age_progression/ap_1_5.jpg"
        );
        assert_eq!(
            client.absolute("https://cdn.example/a.jpg"),
            "https://cdn.example/a.jpg"
        );
    }

    #[test]
    fn test_require_token() {
        assert!(ApiClient::new("http://x", None).require_token().is_err());
        assert!(ApiClient::new("http://x", Some("t".into()))
            .require_token()
            .is_ok());
    }

    #[test]
    fn test_role_names() {
        let mut user: User = serde_json::from_value(serde_json::json!({
            "id": 4,
            "email": "a@b.c",
            "is_active": true,
            "roles": [{ "id": 1, "name": "user" }],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(role_names(&user), "user");
        user.roles.clear();
        assert_eq!(role_names(&user), "");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
