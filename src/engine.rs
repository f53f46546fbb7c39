use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::{
    Catalog, Endpoint, Section, Strategy, INCIDENT_FEED_URL, META_STATUS_ENDPOINTS,
    META_STATUS_PAGE_URL, REACHABILITY_TIMEOUT, USER_AGENT, VENDOR_TIMEOUT, VPS_HEALTH_TIMEOUT,
};
use crate::meta::{self, MetaStatusMap};
use crate::models::{classify, CheckResult, Report, SectionResults, Verdict};
use crate::utils::round_secs;

const INCIDENT_KEYWORDS: &[&str] = &["gemini", "vertex", "generative"];
const SUMMARY_PATH: &str = "/api/v2/summary.json";

/// Well-known third-party feeds consulted independently of the catalog.
#[derive(Debug, Clone)]
pub struct Feeds {
    pub incidents: String,
    pub meta_endpoints: Vec<String>,
    pub meta_page: String,
}

impl Default for Feeds {
    fn default() -> Self {
        Self {
            incidents: INCIDENT_FEED_URL.to_string(),
            meta_endpoints: META_STATUS_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            meta_page: META_STATUS_PAGE_URL.to_string(),
        }
    }
}

pub struct Prober {
    http_client: reqwest::Client,
    feeds: Feeds,
    max_concurrency: usize,
    reachability_timeout: Duration,
    meta_status: OnceCell<Option<MetaStatusMap>>,
}

impl Prober {
    pub fn new(http_client: reqwest::Client, max_concurrency: usize) -> Self {
        Self {
            http_client,
            feeds: Feeds::default(),
            max_concurrency: max_concurrency.max(1),
            reachability_timeout: REACHABILITY_TIMEOUT,
            meta_status: OnceCell::new(),
        }
    }

    pub fn with_feeds(mut self, feeds: Feeds) -> Self {
        self.feeds = feeds;
        self
    }

    pub fn with_reachability_timeout(mut self, timeout: Duration) -> Self {
        self.reachability_timeout = timeout;
        self
    }

    /// Sweeps all three sections and assembles the run's report.
    pub async fn run(&self, catalog: &Catalog) -> Report {
        info!(endpoints = catalog.len(), concurrency = self.max_concurrency, "Starting health sweep");
        let timestamp = Utc::now();
        let started = Instant::now();

        let internos = self.build_section(catalog, Section::Internos).await;
        let empresa = self.build_section(catalog, Section::Empresa).await;
        let externos = self.build_section(catalog, Section::Externos).await;

        let execution_time_seconds = round_secs(started.elapsed());
        info!("Sweep completed {} checks in {:.2}s.", catalog.len(), execution_time_seconds);

        Report { timestamp, internos, empresa, externos, execution_time_seconds }
    }

    pub async fn build_section(&self, catalog: &Catalog, section: Section) -> SectionResults {
        let endpoints = catalog.section(section);
        debug!(
            section = section.catalog_key(),
            report_key = section.report_key(),
            count = endpoints.len(),
            "Checking section"
        );

        // `buffered` yields in submission order, so the section keeps catalog order.
        stream::iter(endpoints)
            .map(|endpoint| async move { (endpoint.name.clone(), self.check_endpoint(endpoint).await) })
            .buffered(self.max_concurrency)
            .collect()
            .await
    }

    pub async fn check_endpoint(&self, endpoint: &Endpoint) -> CheckResult {
        let address = endpoint.address.as_str();
        let result = match endpoint.strategy {
            Strategy::VpsHealth => CheckResult::from_verdict(address, &self.check_vps_health(address).await),
            Strategy::StatusPage => CheckResult::from_verdict(address, &self.check_status_page(address).await),
            Strategy::IncidentFeed => CheckResult::from_verdict(address, &self.check_incident_feed(address).await),
            Strategy::VendorHealth => CheckResult::from_verdict(address, &self.check_vendor_health(address).await),
            Strategy::MetaStatus { slug } => match self.meta_verdict(slug).await {
                Some(verdict) => CheckResult::from_verdict(address, &verdict),
                None => CheckResult::from_code(address, self.check_url(address).await),
            },
            Strategy::Reachability => CheckResult::from_code(address, self.check_url(address).await),
        };

        debug!(
            section = endpoint.section.report_key(),
            name = %endpoint.name,
            strategy = ?endpoint.strategy,
            state = %result.state,
            "Endpoint checked"
        );
        result
    }

    /// Plain GET. Returns the received status code, or `0` when no response arrived.
    pub async fn check_url(&self, url: &str) -> u16 {
        let request = self
            .http_client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.reachability_timeout);
        match request.send().await {
            Ok(resp) => resp.status().as_u16(),
            Err(e) => {
                debug!(%url, error = %e, "Request failed before a response");
                0
            }
        }
    }

    pub async fn check_vps_health(&self, url: &str) -> Verdict {
        let resp = match self.http_client.get(url).timeout(VPS_HEALTH_TIMEOUT).send().await {
            Ok(resp) => resp,
            Err(e) => return Verdict::failure("Error Conexión", Some(e.to_string())),
        };

        let code = resp.status().as_u16();
        if code != 200 {
            return Verdict::down(format!("Endpoint status: {}", code));
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return Verdict::failure("Error Conexión", Some(e.to_string())),
        };
        match serde_json::from_str::<Value>(&body) {
            Ok(data) => {
                let alive = data
                    .pointer("/checks/vps_ping/alive")
                    .is_some_and(is_truthy);
                if alive {
                    Verdict::ok("VPS Reachable")
                } else {
                    Verdict::down("VPS reporta 'alive': false")
                }
            }
            Err(_) => Verdict::warning("Respuesta no es JSON válido"),
        }
    }

    /// Self-reported `{"status": "ok"}` contract, fetched from the address as given.
    pub async fn check_vendor_health(&self, url: &str) -> Verdict {
        let resp = match self.http_client.get(url).timeout(VENDOR_TIMEOUT).send().await {
            Ok(resp) => resp,
            Err(_) => return Verdict::down("Error red"),
        };

        let code = resp.status().as_u16();
        if code != 200 {
            return Verdict::down(format!("Código: {}", code));
        }

        let Ok(body) = resp.text().await else {
            return Verdict::down("Error red");
        };
        match serde_json::from_str::<Value>(&body) {
            Ok(data) => match data.get("status") {
                Some(Value::String(status)) if status == "ok" => Verdict::ok("API Health: ok"),
                Some(Value::String(status)) => Verdict::warning(status.clone()),
                None | Some(Value::Null) => Verdict::warning("unknown"),
                Some(other) => Verdict::warning(other.to_string()),
            },
            Err(_) => Verdict::warning("No JSON"),
        }
    }

    pub async fn check_status_page(&self, base_url: &str) -> Verdict {
        let api_url = summary_url(base_url);
        let resp = match self.http_client.get(&api_url).timeout(VENDOR_TIMEOUT).send().await {
            Ok(resp) => resp,
            Err(_) => return Verdict::failure("Error verificación", None),
        };

        let code = resp.status().as_u16();
        if code != 200 {
            return Verdict::down(code.to_string());
        }

        let Ok(data) = resp.json::<Value>().await else {
            return Verdict::failure("Error verificación", None);
        };
        let description = data
            .pointer("/status/description")
            .and_then(Value::as_str)
            .unwrap_or("sin descripción");
        match data.pointer("/status/indicator").and_then(Value::as_str) {
            Some("none") => Verdict::ok(description),
            _ => Verdict::warning(description),
        }
    }

    /// Scans the shared incidents feed for open AI incidents. When the feed
    /// answers with anything but 200 the endpoint's own page is pinged instead.
    pub async fn check_incident_feed(&self, display_url: &str) -> Verdict {
        let resp = match self.http_client.get(&self.feeds.incidents).timeout(VENDOR_TIMEOUT).send().await {
            Ok(resp) => resp,
            Err(_) => return Verdict::failure("Error de conexión", None),
        };

        let code = resp.status().as_u16();
        if code != 200 {
            warn!(feed = %self.feeds.incidents, code, "Incident feed unavailable, checking display URL");
            return classify(i64::from(self.check_url(display_url).await));
        }

        let Ok(incidents) = resp.json::<Vec<Value>>().await else {
            return Verdict::failure("Error de conexión", None);
        };
        let active = incidents.iter().filter(|incident| is_active_ai_incident(incident)).count();
        if active == 0 {
            Verdict::ok("Sin incidentes en Google AI")
        } else {
            Verdict::warning(format!("{} incidentes activos", active))
        }
    }

    async fn meta_verdict(&self, slug: &str) -> Option<Verdict> {
        let map = self.meta_status.get_or_init(|| self.load_meta_status()).await;
        map.as_ref()?.get(slug).map(|entry| entry.verdict())
    }

    async fn load_meta_status(&self) -> Option<MetaStatusMap> {
        let payload = self.fetch_meta_payload().await?;
        let map = meta::build_status_map(&payload);
        if map.is_none() {
            warn!("MetaStatus payload did not describe any Meta app");
        }
        map
    }

    async fn fetch_meta_payload(&self) -> Option<Value> {
        for endpoint in &self.feeds.meta_endpoints {
            match self.fetch_meta_text(endpoint).await {
                Some(text) => match serde_json::from_str(&text) {
                    Ok(value) => return Some(value),
                    Err(_) => debug!(%endpoint, "MetaStatus endpoint returned non-JSON body"),
                },
                None => debug!(%endpoint, "MetaStatus endpoint unavailable"),
            }
        }

        let html = self.fetch_meta_text(&self.feeds.meta_page).await?;
        meta::extract_embedded_json(&html)
    }

    async fn fetch_meta_text(&self, url: &str) -> Option<String> {
        let resp = self
            .http_client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json,text/html;q=0.9,*/*;q=0.8")
            .timeout(VENDOR_TIMEOUT)
            .send()
            .await
            .ok()?;
        if resp.status().as_u16() != 200 {
            return None;
        }
        resp.text().await.ok()
    }
}

pub fn summary_url(base_url: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    format!("{}{}", base, SUMMARY_PATH)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn is_active_ai_incident(incident: &Value) -> bool {
    if incident.get("end").is_some_and(is_truthy) {
        return false;
    }
    let service_name = incident
        .get("service_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    INCIDENT_KEYWORDS.iter().any(|keyword| service_name.contains(keyword))
}
