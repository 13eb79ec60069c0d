//! Where a visitor came from: UTM parameters, referrer inference, session
//! identity and device class.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::storage::{read_json, write_json, Storage};

pub const SESSION_KEY: &str = "growthos_sid";
pub const UTM_KEY: &str = "growthos_utm";

/// Hostname fragments mapped to a canonical source, first match wins.
const SOURCE_PATTERNS: &[(&[&str], &str)] = &[
    (&["google"], "google"),
    (&["bing"], "bing"),
    (&["yahoo"], "yahoo"),
    (&["duckduckgo"], "duckduckgo"),
    (&["instagram"], "instagram"),
    (&["facebook", "fb.com"], "facebook"),
    (&["twitter"], "twitter"),
    (&["linkedin"], "linkedin"),
    (&["tiktok"], "tiktok"),
    (&["youtube"], "youtube"),
    (&["whatsapp"], "whatsapp"),
    (&["telegram"], "telegram"),
    (&["email", "mail."], "email"),
];

const MOBILE_TOKENS: &[&str] = &[
    "mobi",
    "android",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// The page the tracker runs on.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub url: Url,
    /// `document.referrer`; empty means none.
    pub referrer: Option<String>,
    pub user_agent: String,
}

impl PageContext {
    pub fn new(url: Url, referrer: Option<&str>, user_agent: &str) -> Self {
        Self {
            url,
            referrer: referrer.map(str::trim).filter(|r| !r.is_empty()).map(str::to_string),
            user_agent: user_agent.to_string(),
        }
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Mobile,
    Desktop,
}

impl Device {
    pub fn detect(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        if MOBILE_TOKENS.iter().any(|t| ua.contains(t)) {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }
}

/// Campaign parameters captured from a landing URL for the rest of the
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUtms {
    pub source: String,
    pub medium: String,
    pub campaign: Option<String>,
    pub content: Option<String>,
    pub term: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub source: String,
    pub medium: String,
    pub campaign: Option<String>,
    pub content: Option<String>,
    pub landing_page: String,
    pub referrer: Option<String>,
    pub device: Device,
    pub session_id: String,
}

fn random_hex_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Session id from `growthos_sid`, created on first use. Falls back to an
/// ephemeral id when storage is unusable.
pub fn session_id(session: &dyn Storage) -> String {
    match session.get_item(SESSION_KEY) {
        Ok(Some(sid)) if !sid.is_empty() => sid,
        Ok(_) => {
            let sid = format!("s_{}", random_hex_id());
            if let Err(err) = session.set_item(SESSION_KEY, &sid) {
                tracing::debug!(error = %err, "Session id not persisted");
            }
            sid
        }
        Err(_) => format!("s_{}", random_hex_id()),
    }
}

/// Store the landing URL's UTM parameters when `utm_source` is present,
/// replacing whatever the session held before.
pub fn persist_utms(page: &PageContext, session: &dyn Storage) {
    let Some(source) = page.query_param("utm_source") else {
        return;
    };
    let utms = StoredUtms {
        source,
        medium: page.query_param("utm_medium").unwrap_or_else(|| "cpc".to_string()),
        campaign: page.query_param("utm_campaign"),
        content: page.query_param("utm_content"),
        term: page.query_param("utm_term"),
    };
    write_json(session, UTM_KEY, &utms);
}

pub fn stored_utms(session: &dyn Storage) -> Option<StoredUtms> {
    read_json(session, UTM_KEY)
}

/// Source inferred from a referrer URL alone.
pub fn infer_source(referrer: Option<&str>) -> String {
    let Some(referrer) = referrer.filter(|r| !r.is_empty()) else {
        return "direct".to_string();
    };
    let host = match Url::parse(referrer).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
        Some(host) => host,
        None => return "referral".to_string(),
    };
    if host == "t.co" || host.ends_with(".t.co") {
        return "twitter".to_string();
    }
    SOURCE_PATTERNS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| host.contains(n)))
        .map(|(_, source)| source.to_string())
        .unwrap_or_else(|| host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Resolve the attribution block merged into every payload.
pub fn resolve(page: &PageContext, session: &dyn Storage) -> Attribution {
    let stored = stored_utms(session);
    let referrer = page.referrer.clone();

    let source = page
        .query_param("utm_source")
        .or_else(|| stored.as_ref().map(|u| u.source.clone()))
        .unwrap_or_else(|| infer_source(referrer.as_deref()));
    let medium = page
        .query_param("utm_medium")
        .or_else(|| stored.as_ref().map(|u| u.medium.clone()))
        .unwrap_or_else(|| {
            let fallback = if referrer.is_some() { "referral" } else { "direct" };
            fallback.to_string()
        });
    let campaign = page
        .query_param("utm_campaign")
        .or_else(|| stored.as_ref().and_then(|u| u.campaign.clone()));
    let content = page
        .query_param("utm_content")
        .or_else(|| stored.as_ref().and_then(|u| u.content.clone()));

    Attribution {
        source,
        medium,
        campaign,
        content,
        landing_page: page.url.path().to_string(),
        referrer,
        device: Device::detect(&page.user_agent),
        session_id: session_id(session),
    }
}
