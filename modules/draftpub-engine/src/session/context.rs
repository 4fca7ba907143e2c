//! The browsing context credentials are taken from: the cookie jar, page
//! scripts, and a few in-memory globals.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

/// File inside a scripts directory holding [`PageGlobals`] as JSON.
pub const GLOBALS_FILE: &str = "globals.json";

#[derive(Debug, Clone, Default)]
pub struct BrowsingContext {
    /// Cookie jar in document order.
    pub cookies: Vec<(String, String)>,
    /// Text content of every script found on the page.
    pub scripts: Vec<String>,
    pub globals: PageGlobals,
}

/// In-memory page state worth looking at.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageGlobals {
    #[serde(rename = "SPC_CDS")]
    pub spc_cds: Option<String>,
    #[serde(rename = "sessionStorage")]
    pub session_storage: BTreeMap<String, String>,
}

impl BrowsingContext {
    pub fn from_cookie_header(header: &str) -> Self {
        Self {
            cookies: parse_cookie_header(header),
            ..Self::default()
        }
    }

    pub fn with_scripts(mut self, scripts: Vec<String>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_globals(mut self, globals: PageGlobals) -> Self {
        self.globals = globals;
        self
    }

    /// First cookie with this exact name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Load a saved page: scripts (and optional globals) from `scripts_dir`.
    pub fn load_scripts_dir(mut self, scripts_dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(scripts_dir)
            .with_context(|| format!("Failed to read scripts dir: {}", scripts_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

            if name == GLOBALS_FILE {
                self.globals = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            if ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm") {
                let inline = extract_inline_scripts(&content);
                debug!(file = name, scripts = inline.len(), "Loaded inline scripts");
                self.scripts.extend(inline);
            } else {
                self.scripts.push(content);
            }
        }

        info!(
            dir = %scripts_dir.display(),
            scripts = self.scripts.len(),
            "Loaded page scripts"
        );
        Ok(self)
    }
}

/// Split a `Cookie` header (`a=1; b=2`) into name/value pairs. Values keep
/// any `=` they contain.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn script_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>(.*?)</script>").expect("static regex")
    })
}

/// Bodies of every non-empty `<script>` element in an HTML document.
pub fn extract_inline_scripts(html: &str) -> Vec<String> {
    script_tag()
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_keeps_values_with_equals() {
        let cookies = parse_cookie_header("SPC_CDS=abc-123; SC_DFP=xyz%3D%3D==; ; bare");
        assert_eq!(
            cookies,
            vec![
                ("SPC_CDS".to_string(), "abc-123".to_string()),
                ("SC_DFP".to_string(), "xyz%3D%3D==".to_string()),
            ]
        );
    }

    #[test]
    fn cookie_lookup_is_exact() {
        let ctx = BrowsingContext::from_cookie_header("SPC_CDS_VER=2; SPC_CDS=token");
        assert_eq!(ctx.cookie("SPC_CDS"), Some("token"));
        assert_eq!(ctx.cookie("spc_cds"), None);
    }

    #[test]
    fn inline_scripts_are_extracted_from_html() {
        let html = r#"<html><script src="a.js"></script>
            <SCRIPT type="text/javascript">var x = {"sc-fe-ver": "1"};</SCRIPT>
            <script>
            fetch("seller.shopee.ph/api/x")
            </script></html>"#;
        let scripts = extract_inline_scripts(html);
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].contains("sc-fe-ver"));
        assert!(scripts[1].starts_with("fetch"));
    }

    #[test]
    fn scripts_dir_loads_files_and_globals() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "console.log(1)").unwrap();
        std::fs::write(
            dir.path().join("page.html"),
            "<script>var s = 'x';</script>",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(GLOBALS_FILE),
            r#"{"SPC_CDS": "global-cds", "sessionStorage": {"user_token": "t1"}}"#,
        )
        .unwrap();

        let ctx = BrowsingContext::default()
            .load_scripts_dir(dir.path())
            .unwrap();
        assert_eq!(ctx.scripts, vec!["console.log(1)", "var s = 'x';"]);
        assert_eq!(ctx.globals.spc_cds.as_deref(), Some("global-cds"));
        assert_eq!(ctx.globals.session_storage["user_token"], "t1");
    }
}
