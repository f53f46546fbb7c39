use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const USER_AGENT: &str = "HealthCheckMonitor/1.0";

pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(10);
pub const VPS_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);
pub const VENDOR_TIMEOUT: Duration = Duration::from_secs(8);
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub const INCIDENT_FEED_URL: &str = "https://status.cloud.google.com/incidents.json";
pub const META_STATUS_ENDPOINTS: &[&str] = &[
    "https://metastatus.com/api/status",
    "https://metastatus.com/api/statuses",
];
pub const META_STATUS_PAGE_URL: &str = "https://metastatus.com/";

const VPS_HEALTH_ENDPOINT: &str = "vps_soul23";
const STATUSPAGE_SERVICES: &[&str] = &["openai", "canva", "cloudflare"];
const INCIDENT_FEED_ENDPOINT: &str = "google_gemini";
const VENDOR_HEALTH_ENDPOINT: &str = "formbricks";
const META_APPS: &[(&str, &str)] = &[
    ("facebook", "facebook"),
    ("instagram", "instagram"),
    ("whatsapp", "whatsapp"),
];

const DEFAULT_SITES_FILE: &str = "data/sites.json";
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Process settings, read once from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sites_file: PathBuf,
    pub webhook_urls: Vec<String>,
    pub max_concurrency: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let sites_file = lookup("HEALTH_SITES_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SITES_FILE));

        let webhook_urls = lookup("WEBHOOK_URLS")
            .map(|raw| crate::utils::split_list(&raw))
            .unwrap_or_default();

        let max_concurrency = lookup("HEALTH_MAX_CONCURRENCY")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENCY);

        Self { sites_file, webhook_urls, max_concurrency }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    /// The JSON object printed on stdout when a run aborts before any check.
    pub fn to_failure_document(&self) -> serde_json::Value {
        serde_json::json!({ "error": format!("Could not load or parse sites.json: {}", self) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Internos,
    Empresa,
    Externos,
}

impl Section {
    /// Key of the section in the sites file.
    pub fn catalog_key(self) -> &'static str {
        match self {
            Section::Internos => "internos",
            Section::Empresa => "sitios_empresa",
            Section::Externos => "externos",
        }
    }

    /// Key of the section in the emitted report.
    pub fn report_key(self) -> &'static str {
        match self {
            Section::Internos => "internos",
            Section::Empresa => "empresa",
            Section::Externos => "externos",
        }
    }
}

/// Verification contract applied to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    VpsHealth,
    StatusPage,
    IncidentFeed,
    VendorHealth,
    MetaStatus { slug: &'static str },
    Reachability,
}

impl Strategy {
    pub fn for_name(name: &str) -> Self {
        if name == VPS_HEALTH_ENDPOINT {
            Strategy::VpsHealth
        } else if STATUSPAGE_SERVICES.contains(&name) {
            Strategy::StatusPage
        } else if name == INCIDENT_FEED_ENDPOINT {
            Strategy::IncidentFeed
        } else if name == VENDOR_HEALTH_ENDPOINT {
            Strategy::VendorHealth
        } else if let Some(&(_, slug)) = META_APPS.iter().find(|(app, _)| *app == name) {
            Strategy::MetaStatus { slug }
        } else {
            Strategy::Reachability
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub address: String,
    pub section: Section,
    pub strategy: Strategy,
}

#[derive(Debug, Default, Deserialize)]
struct SitesFile {
    internos: Option<IndexMap<String, String>>,
    sitios_empresa: Option<IndexMap<String, String>>,
    externos: Option<IndexMap<String, String>>,
}

/// Monitored endpoints, grouped by section in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub internos: Vec<Endpoint>,
    pub empresa: Vec<Endpoint>,
    pub externos: Vec<Endpoint>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|source| CatalogError::Read { path: display.clone(), source })?;
        Self::from_json(&content).map_err(|source| CatalogError::Parse { path: display, source })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let file: SitesFile = serde_json::from_str(content)?;
        Ok(Self {
            internos: endpoints(Section::Internos, file.internos),
            empresa: endpoints(Section::Empresa, file.sitios_empresa),
            externos: endpoints(Section::Externos, file.externos),
        })
    }

    pub fn section(&self, section: Section) -> &[Endpoint] {
        match section {
            Section::Internos => &self.internos,
            Section::Empresa => &self.empresa,
            Section::Externos => &self.externos,
        }
    }

    pub fn len(&self) -> usize {
        self.internos.len() + self.empresa.len() + self.externos.len()
    }
}

fn endpoints(section: Section, entries: Option<IndexMap<String, String>>) -> Vec<Endpoint> {
    entries
        .unwrap_or_default()
        .into_iter()
        .map(|(name, address)| Endpoint {
            strategy: Strategy::for_name(&name),
            name,
            address,
            section,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn settings_from(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn settings_defaults_without_env() {
        let settings = settings_from(&[]);
        assert_eq!(settings.sites_file, PathBuf::from("data/sites.json"));
        assert!(settings.webhook_urls.is_empty());
        assert_eq!(settings.max_concurrency, 4);
    }

    #[test]
    fn settings_drop_blank_webhooks() {
        let settings = settings_from(&[
            ("WEBHOOK_URLS", " https://a.example/hook , ,https://b.example/hook,"),
            ("HEALTH_MAX_CONCURRENCY", "0"),
        ]);
        assert_eq!(settings.webhook_urls, vec!["https://a.example/hook", "https://b.example/hook"]);
        assert_eq!(settings.max_concurrency, 4);
    }

    #[test]
    fn strategy_table_routes_fixed_names() {
        assert_eq!(Strategy::for_name("vps_soul23"), Strategy::VpsHealth);
        for name in ["openai", "canva", "cloudflare"] {
            assert_eq!(Strategy::for_name(name), Strategy::StatusPage);
        }
        assert_eq!(Strategy::for_name("google_gemini"), Strategy::IncidentFeed);
        assert_eq!(Strategy::for_name("formbricks"), Strategy::VendorHealth);
        assert_eq!(Strategy::for_name("whatsapp"), Strategy::MetaStatus { slug: "whatsapp" });
        assert_eq!(Strategy::for_name("OpenAI"), Strategy::Reachability);
        assert_eq!(Strategy::for_name("panel"), Strategy::Reachability);
    }

    #[test]
    fn strategy_ignores_section() {
        let catalog = Catalog::from_json(
            r#"{"internos": {"openai": "https://a"}, "externos": {"openai": "https://b"}}"#,
        )
        .unwrap();
        assert_eq!(catalog.internos[0].strategy, Strategy::StatusPage);
        assert_eq!(catalog.externos[0].strategy, Strategy::StatusPage);
        assert_eq!(catalog.externos[0].section, Section::Externos);
    }

    #[test]
    fn catalog_keeps_file_order_and_defaults_sections() {
        let catalog = Catalog::from_json(
            r#"{"sitios_empresa": {"zeta": "https://z", "alpha": "10.0.0.1"}, "externos": null}"#,
        )
        .unwrap();
        assert!(catalog.internos.is_empty());
        assert!(catalog.externos.is_empty());
        let names: Vec<&str> = catalog.empresa.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn catalog_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"internos": {{"svcA": "https://example.com"}}}}"#).unwrap();
        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.section(Section::Internos)[0].address, "https://example.com");
    }

    #[test]
    fn catalog_load_errors_are_fatal() {
        let missing = Catalog::load(Path::new("/nonexistent/sites.json"));
        assert!(matches!(missing, Err(CatalogError::Read { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(Catalog::load(file.path()), Err(CatalogError::Parse { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"internos": {{"svcA": 42}}}}"#).unwrap();
        assert!(matches!(Catalog::load(file.path()), Err(CatalogError::Parse { .. })));
    }

    #[test]
    fn failure_document_for_missing_file() {
        let err = Catalog::load(Path::new("/nonexistent/sites.json")).unwrap_err();
        let doc = err.to_failure_document();

        let obj = doc.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        let message = obj["error"].as_str().unwrap();
        assert!(message.starts_with("Could not load or parse sites.json: /nonexistent/sites.json: "), "{}", message);
    }

    #[test]
    fn failure_document_for_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2").unwrap();
        let err = Catalog::load(file.path()).unwrap_err();
        let doc = err.to_failure_document();

        assert_eq!(doc.as_object().unwrap().len(), 1);
        let expected = format!("Could not load or parse sites.json: {}: ", file.path().display());
        let message = doc["error"].as_str().unwrap();
        assert!(message.starts_with(&expected), "{}", message);
        assert!(message.len() > expected.len());
    }
}
