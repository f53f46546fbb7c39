use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warning,
    Down,
}

impl Severity {
    pub fn glyph(self) -> &'static str {
        match self {
            Severity::Ok => "🟢",
            Severity::Warning => "🟡",
            Severity::Down => "🔴",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "Advertencia",
            Severity::Down => "Caído",
        }
    }
}

/// Outcome of a single resolver. Rendered with `Display` into the
/// human-readable state string that lands in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub severity: Severity,
    label: Cow<'static, str>,
    detail: Option<String>,
}

impl Verdict {
    pub fn new(severity: Severity, detail: impl Into<String>) -> Self {
        Self { severity, label: Cow::Borrowed(severity.label()), detail: Some(detail.into()) }
    }

    pub fn ok(detail: impl Into<String>) -> Self {
        Self::new(Severity::Ok, detail)
    }

    pub fn warning(detail: impl Into<String>) -> Self {
        Self::new(Severity::Warning, detail)
    }

    pub fn down(detail: impl Into<String>) -> Self {
        Self::new(Severity::Down, detail)
    }

    /// Down verdict carrying its own label instead of "Caído".
    pub fn failure(label: &'static str, detail: Option<String>) -> Self {
        Self { severity: Severity::Down, label: Cow::Borrowed(label), detail }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.severity.glyph(), self.label)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

/// Maps an HTTP status code to a verdict. `0` is the "no response" sentinel
/// and falls through to Down like every other unknown code.
pub fn classify(code: i64) -> Verdict {
    match code {
        200 => Verdict::ok(code.to_string()),
        301 | 302 | 307 | 308 => Verdict::ok(format!("Redirección {}", code)),
        401 | 403 | 404 => Verdict::warning(code.to_string()),
        _ => Verdict::down(code.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CheckStatus {
    Code(u16),
    Message(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub url: String,
    pub status: CheckStatus,
    pub state: String,
}

impl CheckResult {
    /// Plain reachability result: numeric status plus its classification.
    pub fn from_code(url: &str, code: u16) -> Self {
        Self {
            url: url.to_string(),
            status: CheckStatus::Code(code),
            state: classify(i64::from(code)).to_string(),
        }
    }

    /// Specialized resolver result: status and state carry the same text.
    pub fn from_verdict(url: &str, verdict: &Verdict) -> Self {
        let text = verdict.to_string();
        Self {
            url: url.to_string(),
            status: CheckStatus::Message(text.clone()),
            state: text,
        }
    }
}

/// Results of one catalog section, in catalog order. Serialized flat as
/// `{name}_url`, `{name}_status`, `{name}_state`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionResults(pub IndexMap<String, CheckResult>);

impl FromIterator<(String, CheckResult)> for SectionResults {
    fn from_iter<I: IntoIterator<Item = (String, CheckResult)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(String, CheckResult)> for SectionResults {
    fn extend<I: IntoIterator<Item = (String, CheckResult)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl Serialize for SectionResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len() * 3))?;
        for (name, result) in &self.0 {
            map.serialize_entry(&format!("{}_url", name), &result.url)?;
            map.serialize_entry(&format!("{}_status", name), &result.status)?;
            map.serialize_entry(&format!("{}_state", name), &result.state)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub internos: SectionResults,
    pub empresa: SectionResults,
    pub externos: SectionResults,
    pub execution_time_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_covers_known_codes() {
        assert_eq!(classify(200).to_string(), "🟢 OK (200)");
        assert_eq!(classify(301).to_string(), "🟢 OK (Redirección 301)");
        assert_eq!(classify(308).to_string(), "🟢 OK (Redirección 308)");
        assert_eq!(classify(403).to_string(), "🟡 Advertencia (403)");
        assert_eq!(classify(404).severity, Severity::Warning);
    }

    #[test]
    fn classifier_defaults_to_down() {
        for code in [0, -1, 100, 201, 204, 304, 400, 500, 503, 99_999] {
            let verdict = classify(code);
            assert_eq!(verdict.severity, Severity::Down, "code {}", code);
            assert_eq!(verdict.to_string(), format!("🔴 Caído ({})", code));
        }
    }

    #[test]
    fn failure_verdict_uses_custom_label() {
        assert_eq!(Verdict::failure("Error verificación", None).to_string(), "🔴 Error verificación");
        assert_eq!(
            Verdict::failure("Error Conexión", Some("timeout".into())).to_string(),
            "🔴 Error Conexión (timeout)"
        );
    }

    #[test]
    fn section_serializes_flat_in_catalog_order() {
        let section: SectionResults = vec![
            ("zeta".to_string(), CheckResult::from_code("https://z.example", 200)),
            ("alpha".to_string(), CheckResult::from_verdict("https://a.example", &Verdict::warning("No JSON"))),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["zeta_status"], 200);
        assert_eq!(json["zeta_state"], "🟢 OK (200)");
        assert_eq!(json["alpha_status"], "🟡 Advertencia (No JSON)");
        assert_eq!(json["alpha_state"], json["alpha_status"]);

        let text = serde_json::to_string(&section).unwrap();
        let keys: Vec<usize> = ["zeta_url", "zeta_status", "zeta_state", "alpha_url"]
            .iter()
            .map(|k| text.find(k).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}
