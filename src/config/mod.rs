use std::env;
use std::path::PathBuf;

/// Runtime configuration, loaded from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory where uploaded spreadsheets are staged while processed.
    pub temp_path: PathBuf,

    /// Directory holding static resources (`examples/CARGA PRESTACION.xlsx`).
    pub resources_path: PathBuf,

    /// Database connection string (default: "sqlite::memory:")
    pub database_url: String,

    /// Maximum upload size in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Upper bound for the `size` query parameter (default: 500)
    pub max_page_size: u64,

    /// ERP interface table the generated INSERT statements target.
    pub erp_interface_table: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_path: env::temp_dir(),
            resources_path: PathBuf::from("./resources"),
            database_url: "sqlite::memory:".to_string(),
            max_file_size: 50 * 1024 * 1024, // 50 MB
            max_page_size: 500,
            erp_interface_table: "ERP_INTERFACE_BENEFITS".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            temp_path: env::var("TEMP_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.temp_path),

            resources_path: env::var("RESOURCES_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.resources_path),

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            max_page_size: env::var("MAX_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default.max_page_size),

            erp_interface_table: env::var("ERP_INTERFACE_TABLE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.erp_interface_table),
        }
    }

    /// Config for tests and local runs: everything rooted under `base`.
    pub fn development(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            temp_path: base.join("tmp"),
            resources_path: base.join("resources"),
            ..Self::default()
        }
    }

    /// Path of the example spreadsheet served by `GET /benefits/example/excel`.
    pub fn example_excel_path(&self) -> PathBuf {
        self.resources_path.join("examples").join(EXAMPLE_EXCEL_NAME)
    }
}

pub const EXAMPLE_EXCEL_NAME: &str = "CARGA PRESTACION.xlsx";
