//! Seller-centre hosts and the static per-market tables keyed on them.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, SellerError};

pub const DEFAULT_DOMAIN: &str = "seller.shopee.ph";

fn host_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^seller\.shopee\.[a-z]{2,3}(\.[a-z]{2})?$").expect("valid host pattern")
    })
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https://(seller\.shopee\.[^/]+)").expect("valid url pattern"))
}

/// A validated seller-centre host such as `seller.shopee.ph`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SellerDomain(String);

impl SellerDomain {
    pub fn parse(host: &str) -> Result<Self> {
        let host = host.trim().trim_end_matches('/').to_lowercase();
        if host_pattern().is_match(&host) {
            Ok(Self(host))
        } else {
            Err(SellerError::InvalidDomain(host))
        }
    }

    /// Pull the seller host out of a page URL, falling back to the default
    /// market when the URL is not a seller-centre page.
    pub fn from_page_url(url: &str) -> Self {
        url_pattern()
            .captures(url)
            .and_then(|c| c.get(1))
            .and_then(|m| Self::parse(m.as_str()).ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn api_base_url(&self) -> String {
        format!("https://{}/api", self.0)
    }

    /// Substring that identifies requests addressed to this market's API.
    pub fn api_marker(&self) -> String {
        format!("{}/api/", self.0)
    }

    pub fn draft_page_url(&self) -> String {
        format!("https://{}/portal/product/list/unpublished/draft", self.0)
    }

    pub fn locale(&self) -> &'static str {
        match self.0.as_str() {
            "seller.shopee.ph" => "en-ph",
            "seller.shopee.com.my" => "en-my",
            "seller.shopee.sg" => "en-sg",
            "seller.shopee.co.th" => "en",
            "seller.shopee.tw" => "zh-tw",
            "seller.shopee.vn" => "en-vn",
            "seller.shopee.com" => "en",
            _ => "en",
        }
    }

    pub fn logistics_channel_id(&self) -> u64 {
        match self.0.as_str() {
            "seller.shopee.com.my" | "seller.shopee.sg" => 28057,
            "seller.shopee.co.th" => 78021,
            _ => 48011,
        }
    }

    pub fn shipping_price(&self) -> &'static str {
        match self.0.as_str() {
            "seller.shopee.co.th" => "22",
            _ => "50",
        }
    }
}

impl Default for SellerDomain {
    fn default() -> Self {
        Self(DEFAULT_DOMAIN.to_string())
    }
}

impl fmt::Display for SellerDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
