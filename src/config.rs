//! Framework configuration.
//!
//! Configuration is resolved once at process start and shared by
//! reference (`Arc`) into the dispatcher, loader, session guard and CSRF
//! verifier. There is no global singleton; after construction the only
//! mutation path is [`FrameworkConfig::set`], which is validated against
//! the fixed [`ConfigKey`] property allow-list so unknown or restricted
//! properties are denied explicitly.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment mode controlling error verbosity.
///
/// Development surfaces the denied operation's identifying detail;
/// production returns a deliberately generic message instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Full error detail in responses.
    #[default]
    Development,
    /// Blind errors: generic messages, no internal detail.
    Production,
}

impl Environment {
    /// Whether error responses may carry identifying detail.
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(ConfigError::InvalidValue {
                key: "environment",
                reason: format!("expected 'development' or 'production', got '{other}'"),
            }),
        }
    }
}

/// Level of CSRF protection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsrfLevel {
    /// Verification disabled; `verify` always succeeds.
    #[default]
    None,
    /// Token required on protected actions.
    Basic,
    /// Like `Basic`, and tokens are never emitted into URLs.
    Paranoid,
}

impl CsrfLevel {
    /// True when a session token is required at all.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl FromStr for CsrfLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "basic" => Ok(Self::Basic),
            "paranoid" => Ok(Self::Paranoid),
            other => Err(ConfigError::InvalidValue {
                key: "csrf_level",
                reason: format!("expected 'none', 'basic' or 'paranoid', got '{other}'"),
            }),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Property is not in the allow-list of settable/gettable keys.
    #[error("unknown or restricted property: {0}")]
    UnknownProperty(String),
    /// Property exists but the supplied value does not parse.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// The property that rejected the value.
        key: &'static str,
        /// Parse failure detail.
        reason: String,
    },
    /// Configuration sources failed to load or merge.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Server bind configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Directory layout for dynamically resolved files.
///
/// All directories are joined onto `root` when resolving candidate
/// paths; a root of `.` is treated as no prefix so configured safe-file
/// entries match the resolved paths exactly.
#[derive(Debug, Clone, Deserialize)]
pub struct DirConfig {
    /// Project root all other directories hang off.
    #[serde(default = "default_root_dir")]
    pub root: PathBuf,
    /// Controller resources.
    #[serde(default = "default_controller_dir")]
    pub controller: PathBuf,
    /// Model resources.
    #[serde(default = "default_model_dir")]
    pub model: PathBuf,
    /// DAO resources.
    #[serde(default = "default_dao_dir")]
    pub dao: PathBuf,
    /// View templates.
    #[serde(default = "default_view_dir")]
    pub view: PathBuf,
    /// Static assets path exported to views as `web_path`.
    #[serde(default = "default_static_dir", rename = "static")]
    pub static_assets: PathBuf,
}

impl DirConfig {
    fn join_root(&self, rel: &Path) -> PathBuf {
        if self.root.as_os_str() == "." {
            rel.to_path_buf()
        } else {
            self.root.join(rel)
        }
    }

    /// Resolved controller directory.
    #[must_use]
    pub fn controller_dir(&self) -> PathBuf {
        self.join_root(&self.controller)
    }

    /// Resolved model directory.
    #[must_use]
    pub fn model_dir(&self) -> PathBuf {
        self.join_root(&self.model)
    }

    /// Resolved DAO directory.
    #[must_use]
    pub fn dao_dir(&self) -> PathBuf {
        self.join_root(&self.dao)
    }

    /// Resolved view directory.
    #[must_use]
    pub fn view_dir(&self) -> PathBuf {
        self.join_root(&self.view)
    }
}

/// Upload handling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory image uploads are stored under.
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL.
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Process-wide framework configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Project name, exported to views as the default page title source.
    pub project_name: String,
    /// Environment mode.
    pub environment: Environment,
    /// Base URL exported to views.
    pub base_url: String,
    /// Server bind settings.
    pub server: ServerConfig,
    /// Directory layout.
    pub dirs: DirConfig,
    /// Extension appended to dynamically resolved resources.
    pub resource_ext: String,
    /// Files explicitly marked loadable. Membership in this list is the
    /// sole authorization for dynamic file loading.
    pub safe_files: Vec<PathBuf>,
    /// Fixed symbolic-name → path map for framework-internal resources,
    /// consulted before suffix mapping. Paths are relative to `dirs.root`
    /// and still subject to the safe-file check.
    pub library: HashMap<String, PathBuf>,
    /// Session cookie name.
    pub session_name: String,
    /// CSRF protection level.
    pub csrf_level: CsrfLevel,
    /// Query parameter naming the controller.
    pub controller_param: String,
    /// Query parameter naming the action.
    pub action_param: String,
    /// Controller used when the URL names none.
    pub default_controller: String,
    /// Action used when the URL names none; always registered safe.
    pub default_action: String,
    /// Default page title exported to views.
    pub default_title: String,
    /// Upload handling settings.
    pub upload: UploadConfig,
    /// Database settings.
    pub database: DatabaseConfig,
}

// Default value functions

fn default_project_name() -> String {
    "palisade".to_string()
}

fn default_base_url() -> String {
    "/".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_controller_dir() -> PathBuf {
    PathBuf::from("controller")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("model")
}

fn default_dao_dir() -> PathBuf {
    PathBuf::from("model/dao")
}

fn default_view_dir() -> PathBuf {
    PathBuf::from("view")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_resource_ext() -> String {
    "html".to_string()
}

fn default_session_name() -> String {
    "palisade".to_string()
}

fn default_controller_param() -> String {
    "controller".to_string()
}

fn default_action_param() -> String {
    "action".to_string()
}

fn default_controller() -> String {
    "home".to_string()
}

fn default_action() -> String {
    "view".to_string()
}

fn default_title() -> String {
    "palisade application".to_string()
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("user_content/img")
}

const fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DirConfig {
    fn default() -> Self {
        Self {
            root: default_root_dir(),
            controller: default_controller_dir(),
            model: default_model_dir(),
            dao: default_dao_dir(),
            view: default_view_dir(),
            static_assets: default_static_dir(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            max_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            environment: Environment::default(),
            base_url: default_base_url(),
            server: ServerConfig::default(),
            dirs: DirConfig::default(),
            resource_ext: default_resource_ext(),
            safe_files: Vec::new(),
            library: HashMap::new(),
            session_name: default_session_name(),
            csrf_level: CsrfLevel::default(),
            controller_param: default_controller_param(),
            action_param: default_action_param(),
            default_controller: default_controller(),
            default_action: default_action(),
            default_title: default_title(),
            upload: UploadConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// Properties reachable through the audited [`FrameworkConfig::get`] /
/// [`FrameworkConfig::set`] pair. Anything not listed here is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ConfigKey {
    ProjectName,
    Environment,
    BaseUrl,
    ResourceExt,
    SessionName,
    CsrfLevel,
    ControllerParam,
    ActionParam,
    DefaultController,
    DefaultAction,
    DefaultTitle,
    RootDir,
    ControllerDir,
    ModelDir,
    DaoDir,
    ViewDir,
    StaticDir,
    SafeFiles,
}

impl ConfigKey {
    /// All allow-listed property keys.
    pub const ALL: &'static [Self] = &[
        Self::ProjectName,
        Self::Environment,
        Self::BaseUrl,
        Self::ResourceExt,
        Self::SessionName,
        Self::CsrfLevel,
        Self::ControllerParam,
        Self::ActionParam,
        Self::DefaultController,
        Self::DefaultAction,
        Self::DefaultTitle,
        Self::RootDir,
        Self::ControllerDir,
        Self::ModelDir,
        Self::DaoDir,
        Self::ViewDir,
        Self::StaticDir,
        Self::SafeFiles,
    ];

    /// Canonical property name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ProjectName => "project_name",
            Self::Environment => "environment",
            Self::BaseUrl => "base_url",
            Self::ResourceExt => "resource_ext",
            Self::SessionName => "session_name",
            Self::CsrfLevel => "csrf_level",
            Self::ControllerParam => "controller_param",
            Self::ActionParam => "action_param",
            Self::DefaultController => "default_controller",
            Self::DefaultAction => "default_action",
            Self::DefaultTitle => "default_title",
            Self::RootDir => "root_dir",
            Self::ControllerDir => "controller_dir",
            Self::ModelDir => "model_dir",
            Self::DaoDir => "dao_dir",
            Self::ViewDir => "view_dir",
            Self::StaticDir => "static_dir",
            Self::SafeFiles => "safe_files",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownProperty(s.to_string()))
    }
}

impl FrameworkConfig {
    /// Load configuration from files and environment.
    ///
    /// Merges `config/default.toml`, `config/local.toml` and
    /// `PALISADE_`-prefixed environment variables, in that order.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Toml::file("config/local.toml"))
            .merge(Env::prefixed("PALISADE_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Read an allow-listed property as a display string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProperty`] for keys outside the
    /// allow-list.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let key: ConfigKey = key.parse()?;
        Ok(match key {
            ConfigKey::ProjectName => self.project_name.clone(),
            ConfigKey::Environment => match self.environment {
                Environment::Development => "development".to_string(),
                Environment::Production => "production".to_string(),
            },
            ConfigKey::BaseUrl => self.base_url.clone(),
            ConfigKey::ResourceExt => self.resource_ext.clone(),
            ConfigKey::SessionName => self.session_name.clone(),
            ConfigKey::CsrfLevel => match self.csrf_level {
                CsrfLevel::None => "none".to_string(),
                CsrfLevel::Basic => "basic".to_string(),
                CsrfLevel::Paranoid => "paranoid".to_string(),
            },
            ConfigKey::ControllerParam => self.controller_param.clone(),
            ConfigKey::ActionParam => self.action_param.clone(),
            ConfigKey::DefaultController => self.default_controller.clone(),
            ConfigKey::DefaultAction => self.default_action.clone(),
            ConfigKey::DefaultTitle => self.default_title.clone(),
            ConfigKey::RootDir => self.dirs.root.display().to_string(),
            ConfigKey::ControllerDir => self.dirs.controller.display().to_string(),
            ConfigKey::ModelDir => self.dirs.model.display().to_string(),
            ConfigKey::DaoDir => self.dirs.dao.display().to_string(),
            ConfigKey::ViewDir => self.dirs.view.display().to_string(),
            ConfigKey::StaticDir => self.dirs.static_assets.display().to_string(),
            ConfigKey::SafeFiles => self
                .safe_files
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(","),
        })
    }

    /// Set an allow-listed property from a string value.
    ///
    /// This is the only mutation path after construction. `safe_files`
    /// accepts a comma-separated path list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProperty`] for keys outside the
    /// allow-list and [`ConfigError::InvalidValue`] when the value does
    /// not parse for the property's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key: ConfigKey = key.parse()?;
        match key {
            ConfigKey::ProjectName => self.project_name = value.to_string(),
            ConfigKey::Environment => self.environment = value.parse()?,
            ConfigKey::BaseUrl => self.base_url = value.to_string(),
            ConfigKey::ResourceExt => self.resource_ext = value.to_string(),
            ConfigKey::SessionName => self.session_name = value.to_string(),
            ConfigKey::CsrfLevel => self.csrf_level = value.parse()?,
            ConfigKey::ControllerParam => self.controller_param = value.to_string(),
            ConfigKey::ActionParam => self.action_param = value.to_string(),
            ConfigKey::DefaultController => self.default_controller = value.to_string(),
            ConfigKey::DefaultAction => self.default_action = value.to_string(),
            ConfigKey::DefaultTitle => self.default_title = value.to_string(),
            ConfigKey::RootDir => self.dirs.root = PathBuf::from(value),
            ConfigKey::ControllerDir => self.dirs.controller = PathBuf::from(value),
            ConfigKey::ModelDir => self.dirs.model = PathBuf::from(value),
            ConfigKey::DaoDir => self.dirs.dao = PathBuf::from(value),
            ConfigKey::ViewDir => self.dirs.view = PathBuf::from(value),
            ConfigKey::StaticDir => self.dirs.static_assets = PathBuf::from(value),
            ConfigKey::SafeFiles => {
                self.safe_files = value
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FrameworkConfig::default();
        assert_eq!(config.default_controller, "home");
        assert_eq!(config.default_action, "view");
        assert_eq!(config.controller_param, "controller");
        assert_eq!(config.csrf_level, CsrfLevel::None);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.server.port, 3000);
        assert!(config.safe_files.is_empty());
    }

    #[test]
    fn test_set_allow_listed_property() {
        let mut config = FrameworkConfig::default();
        config.set("default_controller", "index").unwrap();
        assert_eq!(config.default_controller, "index");

        config.set("csrf_level", "paranoid").unwrap();
        assert_eq!(config.csrf_level, CsrfLevel::Paranoid);

        config.set("safe_files", "view/HomeView.html,view/LoginView.html").unwrap();
        assert_eq!(config.safe_files.len(), 2);
    }

    #[test]
    fn test_set_unknown_property_denied() {
        let mut config = FrameworkConfig::default();
        let err = config.set("__proto__", "x").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProperty(_)));

        // Struct fields that are deliberately not in the allow-list.
        let err = config.set("database", "sqlite://pwned").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProperty(_)));
    }

    #[test]
    fn test_set_invalid_value_rejected() {
        let mut config = FrameworkConfig::default();
        let err = config.set("csrf_level", "extreme").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "csrf_level", .. }));
        assert_eq!(config.csrf_level, CsrfLevel::None);
    }

    #[test]
    fn test_get_round_trips_set() {
        let mut config = FrameworkConfig::default();
        config.set("view_dir", "templates").unwrap();
        assert_eq!(config.get("view_dir").unwrap(), "templates");
        assert!(config.get("not_a_property").is_err());
    }

    #[test]
    fn test_dir_resolution_skips_dot_root() {
        let dirs = DirConfig::default();
        assert_eq!(dirs.view_dir(), PathBuf::from("view"));

        let rooted = DirConfig {
            root: PathBuf::from("/srv/app"),
            ..DirConfig::default()
        };
        assert_eq!(rooted.view_dir(), PathBuf::from("/srv/app/view"));
    }
}
