use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use seller_client::{
    Provenance, SellerDomain, SessionCredentials, TokenSynthesizer, REQUIRED_HEADERS,
};

use crate::error::{Result, RunError};
use crate::session::context::BrowsingContext;
use crate::session::observer::TrafficObserver;

/// Header names looked for as `"name": "value"` literals in page scripts.
pub const SCRIPT_HEADER_NAMES: [&str; 6] = [
    "sc-fe-session",
    "sc-fe-ver",
    "x-sap-ri",
    "x-sap-sec",
    "af-ac-enc-sz-token",
    "sz-dfp",
];

const CDS_COOKIE: &str = "SPC_CDS";
const SESSION_COOKIE: &str = "SPC_SC_SESSION";
const FINGERPRINT_COOKIE: &str = "SC_DFP";
const ANTI_FORGERY_COOKIE: &str = "shopee_webUnique_ccd";

/// Produces the credentials for one run.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn acquire(&self, domain: &SellerDomain) -> Result<SessionCredentials>;
}

/// Assembles [`SessionCredentials`] from a browsing context.
///
/// Sources are consulted in order and each only fills headers the earlier
/// ones left empty: cookies, page scripts, in-memory globals, observed
/// traffic. Whatever is still missing after that is synthesized.
///
/// `SPC_STK` is not read: no header the client sends is derived from it.
pub struct CredentialAcquirer {
    tokens: Arc<dyn TokenSynthesizer>,
    observer: Option<Arc<dyn TrafficObserver>>,
}

impl CredentialAcquirer {
    pub fn new(tokens: Arc<dyn TokenSynthesizer>) -> Self {
        Self {
            tokens,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TrafficObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn acquire(
        &self,
        context: &BrowsingContext,
        domain: &SellerDomain,
    ) -> Result<SessionCredentials> {
        let cds = context
            .cookie(CDS_COOKIE)
            .filter(|v| !v.is_empty())
            .or_else(|| context.globals.spc_cds.as_deref().filter(|v| !v.is_empty()))
            .ok_or_else(|| {
                RunError::MissingCredential(format!("{CDS_COOKIE} cookie not found"))
            })?;
        let mut creds = SessionCredentials::new(cds);

        self.from_cookies(context, &mut creds);
        self.from_scripts(context, domain, &mut creds);
        self.from_globals(context, &mut creds);
        self.from_traffic(domain, &mut creds);
        self.synthesize_missing(&mut creds);

        info!(
            domain = %domain,
            captured = creds.captured().len(),
            synthesized = creds.synthesized().len(),
            "Session credentials assembled"
        );
        Ok(creds)
    }

    fn from_cookies(&self, context: &BrowsingContext, creds: &mut SessionCredentials) {
        if let Some(session) = context.cookie(SESSION_COOKIE).and_then(session_id_from_cookie) {
            fill(creds, "sc-fe-session", session);
        }
        if let Some(dfp) = context.cookie(FINGERPRINT_COOKIE) {
            fill(creds, "sz-dfp", url_decode(dfp));
        }
        if let Some(token) = context.cookie(ANTI_FORGERY_COOKIE) {
            fill(creds, "af-ac-enc-sz-token", url_decode(token));
        }
    }

    fn from_scripts(
        &self,
        context: &BrowsingContext,
        domain: &SellerDomain,
        creds: &mut SessionCredentials,
    ) {
        let marker = domain.api_marker();
        let relevant = context.scripts.iter().filter(|s| s.contains(&marker));
        for script in relevant {
            for (name, value) in scan_script(script) {
                fill(creds, name, value);
            }
        }
    }

    fn from_globals(&self, context: &BrowsingContext, creds: &mut SessionCredentials) {
        for (key, value) in &context.globals.session_storage {
            if key.contains("session") || key.contains("token") {
                fill(creds, key, value.clone());
            }
        }
    }

    fn from_traffic(&self, domain: &SellerDomain, creds: &mut SessionCredentials) {
        let Some(observer) = &self.observer else {
            return;
        };
        let marker = domain.api_marker();
        let mut matched = 0usize;
        for request in observer.observed() {
            if !request.url.contains(&marker) {
                continue;
            }
            matched += 1;
            for (name, value) in request.headers {
                let name = name.to_ascii_lowercase();
                if REQUIRED_HEADERS.contains(&name.as_str()) {
                    fill(creds, &name, value);
                }
            }
        }
        debug!(matched, "Observed API requests merged");
    }

    fn synthesize_missing(&self, creds: &mut SessionCredentials) {
        let missing = creds.missing();
        if !missing.is_empty() {
            warn!(headers = ?missing, "Synthesizing headers with no observed value");
        }
        for name in missing {
            let value = match name {
                "sc-fe-session" => self.tokens.session_id(),
                "sc-fe-ver" => self.tokens.frontend_version(),
                "x-sap-ri" => self.tokens.request_integrity(),
                "x-sap-sec" => self.tokens.security_blob(),
                "sz-dfp" => self.tokens.device_fingerprint(),
                "af-ac-enc-sz-token" => self.tokens.anti_forgery_token(),
                _ => continue,
            };
            creds.synthesize(name, value);
        }
    }
}

/// Capture only when nothing earlier supplied the header.
fn fill(creds: &mut SessionCredentials, name: &str, value: String) {
    if creds.provenance(name) != Some(Provenance::Captured) {
        creds.capture(name, value);
    }
}

fn url_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn session_hex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-F0-9]{16}").expect("valid session pattern"))
}

/// `sc-fe-session` from the session cookie: the first 16-char uppercase hex
/// run, else the first 16 chars of the second `_` segment.
pub fn session_id_from_cookie(raw: &str) -> Option<String> {
    let decoded = url_decode(raw);
    if let Some(m) = session_hex().find(&decoded) {
        return Some(m.as_str().to_string());
    }
    decoded
        .split('_')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.chars().take(16).collect())
}

fn script_patterns() -> &'static Vec<(&'static str, Regex)> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SCRIPT_HEADER_NAMES
            .into_iter()
            .map(|name| {
                let pattern = format!(r#"["']{}["']:\s*["']([^"']+)["']"#, regex::escape(name));
                (name, Regex::new(&pattern).expect("valid header pattern"))
            })
            .collect()
    })
}

/// Header literals embedded in one script, first match per name.
pub fn scan_script(script: &str) -> Vec<(&'static str, String)> {
    script_patterns()
        .iter()
        .filter_map(|(name, re)| {
            re.captures(script)
                .and_then(|c| c.get(1))
                .map(|m| (*name, m.as_str().to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ContextSource
// ---------------------------------------------------------------------------

/// A fixed browsing context, loaded once (from files, env, or a test).
pub struct ContextSource {
    context: BrowsingContext,
    acquirer: CredentialAcquirer,
}

impl ContextSource {
    pub fn new(context: BrowsingContext, acquirer: CredentialAcquirer) -> Self {
        Self { context, acquirer }
    }
}

#[async_trait]
impl CredentialSource for ContextSource {
    async fn acquire(&self, domain: &SellerDomain) -> Result<SessionCredentials> {
        self.acquirer.acquire(&self.context, domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_prefers_hex_run() {
        assert_eq!(
            session_id_from_cookie("v2%3Axx_F028C61C32D0E56C_more").as_deref(),
            Some("F028C61C32D0E56C")
        );
    }

    #[test]
    fn session_cookie_falls_back_to_second_segment() {
        assert_eq!(
            session_id_from_cookie("abc_defghijklmnopqrstuv_w").as_deref(),
            Some("defghijklmnopqrs")
        );
        assert_eq!(session_id_from_cookie("nounderscore"), None);
    }

    #[test]
    fn script_scan_matches_either_quote_style() {
        let script = r#"headers = {'x-sap-ri': 'ri-value', "sc-fe-ver":"21.1", "other": "x"}"#;
        let found = scan_script(script);
        assert_eq!(
            found,
            vec![
                ("sc-fe-ver", "21.1".to_string()),
                ("x-sap-ri", "ri-value".to_string()),
            ]
        );
    }
}
