use std::collections::BTreeMap;

/// Header names sent on every call.
pub const SESSION_HEADERS: [&str; 4] = ["sc-fe-session", "sc-fe-ver", "x-sap-ri", "x-sap-sec"];

/// Header names sent on POST calls only. `upload-session-id` is minted per
/// request by the client and never stored here.
pub const POST_HEADERS: [&str; 3] = ["upload-session-id", "sz-dfp", "af-ac-enc-sz-token"];

/// Headers that must carry some value before any request goes out.
pub const REQUIRED_HEADERS: [&str; 6] = [
    "sc-fe-session",
    "sc-fe-ver",
    "x-sap-ri",
    "x-sap-sec",
    "sz-dfp",
    "af-ac-enc-sz-token",
];

/// Where a header value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Captured,
    Synthesized,
}

/// Authentication material for one run.
///
/// Captured values always shadow synthesized ones for the same header name.
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials {
    cds_token: String,
    captured: BTreeMap<String, String>,
    synthesized: BTreeMap<String, String>,
}

impl SessionCredentials {
    pub fn new(cds_token: impl Into<String>) -> Self {
        Self {
            cds_token: cds_token.into(),
            ..Self::default()
        }
    }

    /// Value of the `SPC_CDS` cookie, echoed as a query parameter.
    pub fn cds_token(&self) -> &str {
        &self.cds_token
    }

    pub fn capture(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.captured.insert(name.to_ascii_lowercase(), value);
    }

    pub fn synthesize(&mut self, name: &str, value: impl Into<String>) {
        self.synthesized.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.captured
            .get(&name)
            .or_else(|| self.synthesized.get(&name))
            .map(String::as_str)
    }

    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        let name = name.to_ascii_lowercase();
        if self.captured.contains_key(&name) {
            Some(Provenance::Captured)
        } else if self.synthesized.contains_key(&name) {
            Some(Provenance::Synthesized)
        } else {
            None
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.provenance(name).is_some()
    }

    /// Required headers that have neither a captured nor a synthesized value.
    pub fn missing(&self) -> Vec<&'static str> {
        REQUIRED_HEADERS
            .into_iter()
            .filter(|name| !self.contains(name))
            .collect()
    }

    pub fn captured(&self) -> &BTreeMap<String, String> {
        &self.captured
    }

    pub fn synthesized(&self) -> &BTreeMap<String, String> {
        &self.synthesized
    }

    /// Every header name known, captured or synthesized, sorted.
    pub fn header_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .captured
            .keys()
            .chain(self.synthesized.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn session_headers(&self) -> Vec<(&'static str, &str)> {
        SESSION_HEADERS
            .into_iter()
            .filter_map(|name| self.get(name).map(|value| (name, value)))
            .collect()
    }

    /// POST-only headers held in the credential set (everything except the
    /// per-request upload session id).
    pub fn post_headers(&self) -> Vec<(&'static str, &str)> {
        POST_HEADERS
            .into_iter()
            .filter(|name| *name != "upload-session-id")
            .filter_map(|name| self.get(name).map(|value| (name, value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_values_shadow_synthesized() {
        let mut creds = SessionCredentials::new("cds");
        creds.synthesize("x-sap-ri", "fake");
        creds.capture("X-Sap-Ri", "real");
        assert_eq!(creds.get("x-sap-ri"), Some("real"));
        assert_eq!(creds.provenance("x-sap-ri"), Some(Provenance::Captured));
    }

    #[test]
    fn empty_captures_are_ignored() {
        let mut creds = SessionCredentials::new("cds");
        creds.capture("sz-dfp", "");
        assert!(!creds.contains("sz-dfp"));
    }

    #[test]
    fn missing_lists_unfilled_required_headers() {
        let mut creds = SessionCredentials::new("cds");
        creds.capture("sc-fe-session", "ABCDEF0123456789");
        creds.synthesize("sc-fe-ver", "21.105196");
        let missing = creds.missing();
        assert!(!missing.contains(&"sc-fe-session"));
        assert!(!missing.contains(&"sc-fe-ver"));
        assert!(missing.contains(&"x-sap-sec"));
        assert_eq!(missing.len(), 4);
    }

    #[test]
    fn post_headers_exclude_session_headers() {
        let mut creds = SessionCredentials::new("cds");
        creds.capture("sc-fe-session", "s");
        creds.capture("sz-dfp", "d");
        creds.synthesize("af-ac-enc-sz-token", "t");
        assert_eq!(creds.post_headers(), vec![("sz-dfp", "d"), ("af-ac-enc-sz-token", "t")]);
        assert_eq!(creds.session_headers(), vec![("sc-fe-session", "s")]);
    }
}
