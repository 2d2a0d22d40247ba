//! Per-call tracking data

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// How the visit arrived at the tracked page
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Referral {
    /// No referrer, the visitor came directly
    #[default]
    Direct,
    /// Followed a link from another site
    Referrer { site: String, page: String },
    /// Came from a search engine result
    Search { source: String, keywords: String },
}

/// Campaign values stored in the `__utmz` cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign<'a> {
    /// `utmcsr`: search engine, newsletter or referring site
    pub source: &'a str,
    /// `utmccn`: campaign name
    pub name: &'a str,
    /// `utmcmd`: campaign medium
    pub medium: &'a str,
    /// `utmctr`: search keywords
    pub term: Option<&'a str>,
    /// `utmcct`: referring page
    pub content: Option<&'a str>,
}

impl Referral {
    pub fn campaign(&self) -> Campaign<'_> {
        match self {
            Referral::Direct => Campaign {
                source: "(direct)",
                name: "(direct)",
                medium: "(none)",
                term: None,
                content: None,
            },
            Referral::Referrer { site, page } => Campaign {
                source: site,
                name: "(referral)",
                medium: "referral",
                term: None,
                content: Some(page),
            },
            Referral::Search { source, keywords } => Campaign {
                source,
                name: "(organic)",
                medium: "organic",
                term: Some(keywords),
                content: None,
            },
        }
    }
}

/// Data for a single tracking call.
///
/// Either `page_url` must be set, or both `event_category` and
/// `event_action`. Use the `Tracker` convenience methods for the common
/// cases and build this directly for anything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RequestData {
    pub page_url: Option<String>,
    pub page_title: Option<String>,
    pub host_name: Option<String>,
    #[serde(default)]
    pub referral: Referral,
    pub event_category: Option<String>,
    pub event_action: Option<String>,
    pub event_label: Option<String>,
    pub event_value: Option<i32>,
}

impl RequestData {
    /// A page view for `url`
    pub fn page_view(url: impl Into<String>) -> Self {
        Self {
            page_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// An event with the mandatory category and action
    pub fn event(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            event_category: Some(category.into()),
            event_action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.page_title = Some(title.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host_name = Some(host.into());
        self
    }

    pub fn with_referrer(mut self, site: impl Into<String>, page: impl Into<String>) -> Self {
        self.referral = Referral::Referrer {
            site: site.into(),
            page: page.into(),
        };
        self
    }

    pub fn with_search_referrer(
        mut self,
        source: impl Into<String>,
        keywords: impl Into<String>,
    ) -> Self {
        self.referral = Referral::Search {
            source: source.into(),
            keywords: keywords.into(),
        };
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.event_label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: i32) -> Self {
        self.event_value = Some(value);
        self
    }

    /// True when both event category and action are present
    pub fn is_event(&self) -> bool {
        non_empty(&self.event_category) && non_empty(&self.event_action)
    }

    /// Check that the request can be encoded into a valid beacon
    pub fn validate(&self) -> Result<()> {
        let has_category = non_empty(&self.event_category);
        let has_action = non_empty(&self.event_action);

        if has_category != has_action {
            return Err(TrackerError::InvalidRequest(
                "event tracking requires both a category and an action".to_string(),
            ));
        }

        if !has_category && !non_empty(&self.page_url) {
            return Err(TrackerError::InvalidRequest(
                "either a page URL or an event category and action is required".to_string(),
            ));
        }

        let source = match &self.referral {
            Referral::Direct => None,
            Referral::Referrer { site, .. } => Some(site),
            Referral::Search { source, .. } => Some(source),
        };
        if source.is_some_and(|s| s.trim().is_empty()) {
            return Err(TrackerError::InvalidRequest(
                "referral source cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
