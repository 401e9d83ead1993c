#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::Router;
use benefits_loader::config::AppConfig;
use benefits_loader::infrastructure::database::run_migrations;
use benefits_loader::models::{
    BenefitQueryFilter, BenefitResponse, CenterQueryFilter, CenterResponse, Environment,
    InsertionScript, Page, UploadDescription,
};
use benefits_loader::services::{BenefitsService, BenefitsUploadService, CentersService};
use benefits_loader::{AppState, create_app};
use sea_orm::{Database, DatabaseConnection};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use zip::write::FileOptions;

pub const BOUNDARY: &str = "---------------------------benefitsloader0123456789";

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    run_migrations(&db).await.unwrap();
    db
}

/// A workbook whose first sheet holds `rows` as inline strings.
pub fn xlsx(rows: &[&[&str]]) -> Vec<u8> {
    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, cells) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, text) in cells.iter().enumerate() {
            let column = (b'A' + c as u8) as char;
            sheet.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                column,
                r + 1,
                text.replace('&', "&amp;").replace('<', "&lt;")
            ));
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("xl/worksheets/sheet1.xml", FileOptions::default())
        .unwrap();
    zip.write_all(sheet.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

pub fn sample_workbook() -> Vec<u8> {
    xlsx(&[
        &["CODIGO", "NOMBRE", "TIPO", "SUBTIPO"],
        &["B100", "Consulta general", "T1", "S1"],
        &["B200", "Revisión dental", "T2", "S2"],
    ])
}

/// Multipart body with one part per `(field, filename, content)`.
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    field, name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", field).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// What the upload service observed while it was called.
#[derive(Debug, Clone)]
pub struct SeenUpload {
    pub description: UploadDescription,
    pub content: Option<Vec<u8>>,
}

/// Upload service that records every call and reads the staged file while
/// it is still on disk.
#[derive(Default)]
pub struct RecordingUploadService {
    pub seen: Mutex<Vec<SeenUpload>>,
    pub fail_with: Option<String>,
    pub delay: Option<Duration>,
}

impl RecordingUploadService {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SeenUpload> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl BenefitsUploadService for RecordingUploadService {
    async fn erp_interface_insertions(&self, upload: &UploadDescription) -> Result<InsertionScript> {
        let content = tokio::fs::read(&upload.path).await.ok();
        self.seen.lock().unwrap().push(SeenUpload {
            description: upload.clone(),
            content,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(anyhow!(message.clone()));
        }

        Ok(InsertionScript {
            environment: upload.environment,
            filename: upload.filename.clone(),
            table: format!("{}.ERP_INTERFACE_BENEFITS", upload.environment.schema()),
            rows: 0,
            statements: Vec::new(),
            script: String::new(),
        })
    }
}

#[derive(Default)]
pub struct RecordingBenefitsService {
    pub filters: Mutex<Vec<BenefitQueryFilter>>,
}

#[async_trait]
impl BenefitsService for RecordingBenefitsService {
    async fn benefits(&self, filter: &BenefitQueryFilter) -> Result<Page<BenefitResponse>> {
        self.filters.lock().unwrap().push(filter.clone());
        Ok(Page::new(Vec::new(), filter.page, filter.size, 0))
    }
}

#[derive(Default)]
pub struct RecordingCentersService {
    pub filters: Mutex<Vec<CenterQueryFilter>>,
}

#[async_trait]
impl CentersService for RecordingCentersService {
    async fn centers(&self, filter: &CenterQueryFilter) -> Result<Page<CenterResponse>> {
        self.filters.lock().unwrap().push(filter.clone());
        Ok(Page::new(Vec::new(), filter.page, filter.size, 0))
    }
}

/// App rooted in a fresh temp directory; keep `dir` alive for the test.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub dir: TempDir,
}

impl TestApp {
    pub fn temp_path(&self) -> PathBuf {
        self.state.config.temp_path.clone()
    }

    pub fn staged(&self, filename: &str) -> PathBuf {
        self.temp_path().join(filename)
    }
}

pub async fn test_app_with(configure: impl FnOnce(&mut AppState)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_test_db().await;
    let mut state = AppState::new(db, AppConfig::development(dir.path()));
    configure(&mut state);

    TestApp {
        app: create_app(state.clone()),
        state,
        dir,
    }
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

pub async fn test_app_with_upload(service: Arc<RecordingUploadService>) -> TestApp {
    test_app_with(move |state| {
        state.benefits_upload = service as Arc<dyn BenefitsUploadService>;
    })
    .await
}

pub fn environment_names() -> Vec<&'static str> {
    Environment::ALL.iter().map(|env| env.as_str()).collect()
}
