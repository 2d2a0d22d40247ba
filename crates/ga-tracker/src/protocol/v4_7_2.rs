//! `__utm.gif` parameter layout of ga.js 4.7.2
//!
//! See the GA troubleshooting guide for the meaning of each `utm*`
//! parameter. Values are percent-encoded individually; the cookie string in
//! `utmcc` is assembled first and encoded as one value.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ProtocolVersion, UrlBuilder};
use crate::config::{random_id, AnalyticsConfig};
use crate::error::{Result, TrackerError};
use crate::request::RequestData;

/// Visit timestamps carried in the `__utma` cookie
#[derive(Debug, Clone, Copy)]
struct SessionCookie {
    first_visit: i64,
    previous_visit: i64,
    current_visit: i64,
    session_count: u32,
}

impl SessionCookie {
    fn start(now: i64) -> Self {
        Self {
            first_visit: now,
            previous_visit: now,
            current_visit: now,
            session_count: 1,
        }
    }

    fn roll(&mut self, now: i64) {
        self.previous_visit = self.current_visit;
        self.current_visit = now;
        self.session_count += 1;
    }
}

/// URL builder for protocol version 4.7.2
pub struct GoogleAnalyticsV4_7_2 {
    endpoint: String,
    rng: StdRng,
    cookie: SessionCookie,
}

impl GoogleAnalyticsV4_7_2 {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            rng: StdRng::from_entropy(),
            cookie: SessionCookie::start(Utc::now().timestamp()),
        }
    }

    fn cookie_string(&self, config: &AnalyticsConfig, request: &RequestData) -> String {
        let hash = domain_hash(present(&request.host_name));
        let cookie = &self.cookie;
        let campaign = request.referral.campaign();

        let mut utmz = format!(
            "utmcsr={}|utmccn={}|utmcmd={}",
            campaign.source, campaign.name, campaign.medium
        );
        if let Some(term) = campaign.term {
            utmz.push_str(&format!("|utmctr={term}"));
        }
        if let Some(content) = campaign.content {
            utmz.push_str(&format!("|utmcct={content}"));
        }

        format!(
            "__utma={hash}.{visitor}.{first}.{previous}.{current}.{count};+__utmz={hash}.{current}.{count}.1.{utmz};",
            visitor = config.visitor_id,
            first = cookie.first_visit,
            previous = cookie.previous_visit,
            current = cookie.current_visit,
            count = cookie.session_count,
        )
    }
}

impl UrlBuilder for GoogleAnalyticsV4_7_2 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V4_7_2
    }

    fn build_url(&mut self, config: &AnalyticsConfig, request: &RequestData) -> Result<String> {
        request.validate()?;
        if config.tracking_code.trim().is_empty() {
            return Err(TrackerError::InvalidRequest(
                "tracking code is required".to_string(),
            ));
        }

        let mut params: Vec<(&str, String)> = Vec::with_capacity(16);
        params.push(("utmwv", ProtocolVersion::V4_7_2.as_str().to_string()));
        // Cache buster
        params.push(("utmn", self.rng.gen_range(1..=0x7fff_ffffu32).to_string()));

        if let Some(host) = present(&request.host_name) {
            params.push(("utmhn", host.to_string()));
        }

        if request.is_event() {
            params.push(("utmt", "event".to_string()));
            params.push(("utme", event_string(request)));
        }

        params.push((
            "utmcs",
            present(&config.encoding).unwrap_or("-").to_string(),
        ));
        if let Some(resolution) = present(&config.screen_resolution) {
            params.push(("utmsr", resolution.to_string()));
        }
        if let Some(depth) = present(&config.color_depth) {
            params.push(("utmsc", depth.to_string()));
        }
        if let Some(language) = present(&config.user_language) {
            params.push(("utmul", language.to_string()));
        }
        params.push(("utmje", "1".to_string()));
        if let Some(flash) = present(&config.flash_version) {
            params.push(("utmfl", flash.to_string()));
        }
        if let Some(title) = present(&request.page_title) {
            params.push(("utmdt", title.to_string()));
        }
        params.push(("utmhid", config.session_id.to_string()));
        if let Some(page) = present(&request.page_url) {
            params.push(("utmp", page.to_string()));
        }
        params.push(("utmac", config.tracking_code.clone()));
        params.push(("utmcc", self.cookie_string(config, request)));

        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };

        Ok(format!("{}{separator}{query}", self.endpoint))
    }

    fn reset_session(&mut self, config: &mut AnalyticsConfig) {
        let previous = config.session_id;
        let mut session_id = random_id();
        while session_id == previous {
            session_id = random_id();
        }
        config.session_id = session_id;
        self.cookie.roll(Utc::now().timestamp());
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// `utme` value for an event: `5(category*action[*label])[(value)]`
fn event_string(request: &RequestData) -> String {
    let mut fields = vec![
        escape_x10(request.event_category.as_deref().unwrap_or_default()),
        escape_x10(request.event_action.as_deref().unwrap_or_default()),
    ];
    if let Some(label) = present(&request.event_label) {
        fields.push(escape_x10(label));
    }

    let mut utme = format!("5({})", fields.join("*"));
    if let Some(value) = request.event_value {
        utme.push_str(&format!("({value})"));
    }
    utme
}

/// Escape the characters reserved by the `utme` extensible-parameter syntax
fn escape_x10(value: &str) -> String {
    value
        .replace('\'', "'0")
        .replace(')', "'1")
        .replace('*', "'2")
        .replace('!', "'3")
}

/// ga.js domain hash of the host name; 1 when there is no host
fn domain_hash(host: Option<&str>) -> u32 {
    let Some(host) = host else {
        return 1;
    };

    let units: Vec<u16> = host.encode_utf16().collect();
    let mut hash: u32 = 0;
    for &unit in units.iter().rev() {
        let code = u32::from(unit);
        hash = ((hash << 6) & 0x0fff_ffff) + code + (code << 14);
        let high = hash & 0x0fe0_0000;
        if high != 0 {
            hash ^= high >> 21;
        }
    }
    hash
}
