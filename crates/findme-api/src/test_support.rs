//! Fixtures shared by the router tests

use crate::rest::create_router;
use crate::state::AppState;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use findme_aging::{
    AgeProgressionResolver, EnhanceOptions, ResolverSettings, SourceLoader, ARTIFACT_SUBDIR,
};
use findme_core::{FindmeConfig, Role, Submission, SubmissionStatus, TokenGrant, UserSeed};
use findme_store::{ArtifactStore, MemoryCommentStore, MemorySubmissionStore, MemoryUserStore};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// User 1, admin
pub const ADMIN: &str = "admin-token";
/// User 10, owns every seeded submission
pub const OWNER: &str = "owner-token";
/// User 11
pub const OTHER: &str = "other-token";
/// User 12, deactivated
pub const IDLE: &str = "idle-token";

const BOUNDARY: &str = "findme-form-boundary";

pub fn png() -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([90, 120, 150])))
        .write_to(&mut cursor, ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

pub fn submission(id: i64, status: SubmissionStatus, images: &[&str]) -> Submission {
    Submission {
        id,
        title: format!("Case {}", id),
        full_name: "Jane Doe".to_string(),
        dob: chrono::NaiveDate::from_ymd_opt(1990, 1, 1),
        gender: None,
        race: None,
        height: None,
        weight: None,
        province: None,
        description: None,
        status,
        last_seen_address: None,
        last_seen_place_id: None,
        last_seen_lat: None,
        last_seen_lng: None,
        images: images.iter().map(|s| s.to_string()).collect(),
        user_id: Some(10),
        created_at: Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap() + ChronoDuration::days(id),
    }
}

fn seed(id: i64, name: Option<(&str, &str)>, role: Role, is_active: bool) -> UserSeed {
    UserSeed {
        id,
        email: format!("user{}@findme.example", id),
        first_name: name.map(|(first, _)| first.to_string()),
        last_name: name.map(|(_, last)| last.to_string()),
        role,
        is_active,
    }
}

/// Seeded state: submissions 1 (published, one photo), 2 (pending),
/// 3 (published, no photos) and 4 (found alive), all owned by user 10
pub fn state(files_dir: &Path) -> Arc<AppState> {
    std::fs::create_dir_all(files_dir.join("submissions")).unwrap();
    std::fs::write(files_dir.join("submissions/1.png"), png()).unwrap();

    let mut config = FindmeConfig::default();
    config.storage.files_dir = files_dir.to_path_buf();
    config.storage.max_upload_bytes = 1024 * 1024;
    config.auth.users = vec![
        seed(1, Some(("Ada", "Admin")), Role::Admin, true),
        seed(10, Some(("Thandi", "Mokoena")), Role::User, true),
        seed(11, None, Role::User, true),
        seed(12, None, Role::User, false),
    ];
    config.auth.tokens = [(ADMIN, 1), (OWNER, 10), (OTHER, 11), (IDLE, 12)]
        .into_iter()
        .map(|(token, user_id)| TokenGrant {
            token: token.to_string(),
            user_id,
        })
        .collect();

    let store = MemorySubmissionStore::with_submissions(vec![
        submission(1, SubmissionStatus::Published, &["/files/submissions/1.png"]),
        submission(2, SubmissionStatus::Pending, &["/files/submissions/1.png"]),
        submission(3, SubmissionStatus::Published, &[]),
        submission(4, SubmissionStatus::FoundAlive, &[]),
    ]);
    let resolver = AgeProgressionResolver::new(
        Vec::new(),
        ArtifactStore::new(files_dir.to_path_buf(), ARTIFACT_SUBDIR),
        SourceLoader::new(files_dir.to_path_buf(), None, Duration::from_secs(5)).unwrap(),
        ResolverSettings {
            provider_timeout: Duration::from_secs(1),
            enhance: EnhanceOptions {
                min_side: 8,
                ..EnhanceOptions::default()
            },
            public_base_url: None,
        },
    );

    Arc::new(AppState::from_config(
        &config,
        Arc::new(store),
        Arc::new(MemoryUserStore::from_seeds(&config.auth.users)),
        Arc::new(MemoryCommentStore::new()),
        Arc::new(resolver),
    ))
}

pub fn app(files_dir: &Path) -> Router {
    create_router(state(files_dir))
}

pub fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// One part of a `multipart/form-data` body
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    },
}

impl<'a> Part<'a> {
    pub fn image(name: &'a str, file_name: &'a str) -> Self {
        Part::File {
            name,
            file_name,
            content_type: "image/png",
            bytes: png(),
        }
    }
}

pub fn multipart(uri: &str, token: Option<&str>, parts: Vec<Part<'_>>) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

pub async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, req).await;
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}
