//! Configuration loading for the resolver service and its tools
//!
//! Settings are resolved once at process start, in priority order:
//! 1. Environment variables (after `.env` is loaded)
//! 2. TOML config file (explicit path, `RUES_CONFIG`, or the platform config dir)
//! 3. Compiled defaults
//!
//! A missing config file is not fatal: the service logs a warning and starts
//! with defaults. A malformed one is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "RUES_CONFIG";

/// Placeholder substituted with the registry key in detail URL templates
pub const KEY_PLACEHOLDER: &str = "{}";

/// Full configuration as read from `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub sources: SourcesConfig,
    pub odoo: OdooConfig,
    pub fields: FieldNames,
}

/// HTTP listener settings for the webhook server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error); `RUST_LOG` wins
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// External registry sources consulted during resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Socrata resource URL of the open business-registry dataset
    pub dataset_url: String,
    /// Optional Socrata application token (sent as `X-App-Token`)
    pub dataset_app_token: Option<String>,
    /// Rows fetched per dataset query before local selection
    pub dataset_row_limit: u32,
    /// Primary registry detail endpoint; `{}` is replaced by the registry key
    pub registry_detail_url: String,
    /// Secondary registry detail endpoint, tried once when the primary fails
    pub registry_detail_fallback_url: String,
    /// Base URL of the public registry web pages
    pub registry_web_base: String,
    /// User-Agent sent to the registry endpoints
    pub user_agent: String,
    /// Per-request timeout for every outbound source call
    pub timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            dataset_url: "https://www.datos.gov.co/resource/c82u-588k.json".to_string(),
            dataset_app_token: None,
            dataset_row_limit: 5,
            registry_detail_url: "https://ruesapi.rues.org.co/WEB2/api/Expediente/DetalleRM/{}"
                .to_string(),
            registry_detail_fallback_url:
                "https://ruesapi.rues.org.co/WEB/api/Expediente/DetalleRM/{}".to_string(),
            registry_web_base: "https://www.rues.org.co".to_string(),
            user_agent: "Mozilla/5.0 (RUES-Scraper/1.0)".to_string(),
            timeout_secs: 12,
        }
    }
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Odoo JSON-RPC record store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OdooConfig {
    /// JSON-RPC endpoint, e.g. `https://erp.example.com/jsonrpc`
    pub url: Option<String>,
    pub db: String,
    pub uid: i64,
    #[serde(skip_serializing)]
    pub password: String,
    /// Model holding the partner records
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            url: None,
            db: String::new(),
            uid: 0,
            password: String::new(),
            model: "res.partner".to_string(),
            timeout_secs: 20,
        }
    }
}

impl OdooConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Target field names in the external record store
///
/// An empty name disables the field: its value is resolved but never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub legal_name: String,
    pub trade_name: String,
    pub chamber_code: String,
    pub chamber_name: String,
    pub registration_date: String,
    pub industry_code: String,
    pub legal_representation: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            legal_name: "name".to_string(),
            trade_name: "x_sigla".to_string(),
            chamber_code: String::new(),
            chamber_name: String::new(),
            registration_date: "x_studio_fecha_de_matricula".to_string(),
            industry_code: "x_studio_cdigo_ciiu_1".to_string(),
            legal_representation: "comment".to_string(),
        }
    }
}

impl FieldNames {
    /// Configured (non-empty) target names, in declaration order
    pub fn configured(&self) -> Vec<&str> {
        [
            &self.legal_name,
            &self.trade_name,
            &self.chamber_code,
            &self.chamber_name,
            &self.registration_date,
            &self.industry_code,
            &self.legal_representation,
        ]
        .into_iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect()
    }
}

impl TomlConfig {
    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from file (if any), then apply environment overrides
    ///
    /// `explicit` comes from the command line and must exist when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(explicit)? {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Read {} failed: {}", path.display(), e))
                })?;
                info!("Configuration loaded from {}", path.display());
                Self::from_toml_str(&content)?
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Blank values are ignored. Numeric variables that fail to parse are
    /// logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        fn parsed<T: std::str::FromStr>(name: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(variable = name, value = %value, "Ignoring unparsable override");
                    None
                }
            }
        }

        if let Some(v) = var("HOST") {
            self.server.host = v;
        }
        if let Some(v) = parsed("PORT", var("PORT")) {
            self.server.port = v;
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.logging.level = v.to_lowercase();
        }

        if let Some(v) = var("SOCRATA_URL") {
            self.sources.dataset_url = v;
        }
        if let Some(v) = var("SOCRATA_APP_TOKEN") {
            self.sources.dataset_app_token = Some(v);
        }
        if let Some(v) = var("RUES_DETALLE_URL") {
            self.sources.registry_detail_url = v;
        }
        if let Some(v) = var("RUES_DETALLE_URL_SECONDARY") {
            self.sources.registry_detail_fallback_url = v;
        }
        if let Some(v) = var("RUES_BASE_WEB") {
            self.sources.registry_web_base = v;
        }
        if let Some(v) = var("RUES_USER_AGENT") {
            self.sources.user_agent = v;
        }
        if let Some(v) = parsed("TIMEOUT", var("TIMEOUT")) {
            self.sources.timeout_secs = v;
        }

        if let Some(v) = var("ODOO_JSONRPC") {
            self.odoo.url = Some(v);
        }
        if let Some(v) = var("ODOO_DB") {
            self.odoo.db = v;
        }
        if let Some(v) = parsed("ODOO_UID", var("ODOO_UID")) {
            self.odoo.uid = v;
        }
        if let Some(v) = var("ODOO_PASSWORD") {
            self.odoo.password = v;
        }
        if let Some(v) = var("ODOO_MODEL") {
            self.odoo.model = v;
        }

        if let Some(v) = var("ODOO_FIELD_NAME") {
            self.fields.legal_name = v;
        }
        if let Some(v) = var("ODOO_SIGLA_FIELD") {
            self.fields.trade_name = v;
        }
        if let Some(v) = var("ODOO_FIELD_CAMARA_CODIGO") {
            self.fields.chamber_code = v;
        }
        if let Some(v) = var("ODOO_FIELD_CAMARA") {
            self.fields.chamber_name = v;
        }
        if let Some(v) = var("ODOO_FIELD_FECHA_MATRICULA") {
            self.fields.registration_date = v;
        }
        if let Some(v) = var("ODOO_FIELD_CIIU") {
            self.fields.industry_code = v;
        }
        if let Some(v) = var("ODOO_FIELD_REPRESENTANTE") {
            self.fields.legal_representation = v;
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let sources = &self.sources;

        check_url("sources.dataset_url", &sources.dataset_url)?;
        check_url("sources.registry_web_base", &sources.registry_web_base)?;
        for (key, template) in [
            ("sources.registry_detail_url", &sources.registry_detail_url),
            (
                "sources.registry_detail_fallback_url",
                &sources.registry_detail_fallback_url,
            ),
        ] {
            if !template.contains(KEY_PLACEHOLDER) {
                return Err(Error::Config(format!(
                    "{} must contain the '{}' key placeholder: {}",
                    key, KEY_PLACEHOLDER, template
                )));
            }
            check_url(key, &template.replace(KEY_PLACEHOLDER, "0"))?;
        }

        if sources.timeout_secs == 0 {
            return Err(Error::Config("sources.timeout_secs must be > 0".to_string()));
        }
        if sources.dataset_row_limit == 0 {
            return Err(Error::Config(
                "sources.dataset_row_limit must be > 0".to_string(),
            ));
        }

        if let Some(url) = &self.odoo.url {
            check_url("odoo.url", url)?;
        }
        if self.odoo.timeout_secs == 0 {
            return Err(Error::Config("odoo.timeout_secs must be > 0".to_string()));
        }

        Ok(())
    }
}

fn check_url(key: &str, value: &str) -> Result<()> {
    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("{} is not a valid URL ({}): {}", key, e, value)))
}

/// Pick the config file to read
///
/// Priority: explicit path → `RUES_CONFIG` → `<config dir>/rues/config.toml`.
/// Only the explicit path is required to exist.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        warn!(
            "{} points to a missing file: {}",
            CONFIG_ENV_VAR,
            path.display()
        );
    }

    Ok(default_config_path().filter(|p| p.exists()))
}

/// Platform config location (`~/.config/rues/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rues").join("config.toml"))
}

/// Load a `.env` file from the working directory if present
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => info!(".env loaded from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }
}
