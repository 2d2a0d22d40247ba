//! Integration tests for beacon construction through the tracker

mod test_utils;

use ga_tracker::{AnalyticsConfig, ProtocolVersion, RequestData, Tracker, TrackerError};
use test_utils::{count_param, param, params, tracker_with, RecordingClient};

#[test]
fn test_page_view_scenario() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);

    tracker
        .track_page_view("/home", Some("Home"), Some("example.com"))
        .unwrap();

    let url = client.last_url();
    assert_eq!(param(&url, "utmp").as_deref(), Some("/home"));
    assert_eq!(param(&url, "utmdt").as_deref(), Some("Home"));
    assert_eq!(param(&url, "utmhn").as_deref(), Some("example.com"));
    assert_eq!(param(&url, "utmt"), None);

    let cookie = param(&url, "utmcc").unwrap();
    assert!(cookie.contains("utmcsr=example.com|utmccn=(referral)|utmcmd=referral|utmcct=/;"));
}

#[test]
fn test_event_scenario() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);

    tracker
        .track_event("video", "play", Some("intro"), Some(1))
        .unwrap();

    let url = client.last_url();
    assert_eq!(param(&url, "utmt").as_deref(), Some("event"));
    assert_eq!(param(&url, "utme").as_deref(), Some("5(video*play*intro)(1)"));
    assert_eq!(param(&url, "utmp"), None);
}

#[test]
fn test_event_without_label_or_value() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);

    tracker.track_event("app", "start", None, None).unwrap();

    assert_eq!(
        param(&client.last_url(), "utme").as_deref(),
        Some("5(app*start)")
    );
}

#[test]
fn test_config_fields_appear_exactly_once() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);
    tracker.update_config(|config| config.flash_version = Some("10.1 r53".to_string()));
    let config = tracker.config();

    tracker
        .track_page_view("/docs/start", Some("Start"), Some("example.com"))
        .unwrap();
    let url = client.last_url();

    let expected = [
        ("utmp", "/docs/start".to_string()),
        ("utmac", config.tracking_code.clone()),
        ("utmul", "en-US".to_string()),
        ("utmsr", "1920x1080".to_string()),
        ("utmsc", "24".to_string()),
        ("utmcs", "UTF-8".to_string()),
        ("utmfl", "10.1 r53".to_string()),
        ("utmhid", config.session_id.to_string()),
    ];
    for (key, value) in expected {
        assert_eq!(count_param(&url, key), 1, "{key} should appear once");
        assert_eq!(param(&url, key), Some(value));
    }

    let values: Vec<String> = params(&url).into_iter().map(|(_, v)| v).collect();
    assert_eq!(
        values.iter().filter(|v| v.as_str() == "/docs/start").count(),
        1
    );
    assert!(param(&url, "utmcc")
        .unwrap()
        .contains(&format!(".{}.", config.visitor_id)));
}

#[test]
fn test_user_agent_is_sent_as_header() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);

    tracker.track_page_view("/", None, None).unwrap();

    let request = client.requests().pop().unwrap();
    assert_eq!(request.user_agent.as_deref(), Some("TestApp/1.0"));
    assert!(!request.url.contains("TestApp"));
}

#[test]
fn test_blank_host_falls_back_to_localhost_referrer() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);

    for host in ["", "  "] {
        tracker.track_page_view("/home", None, Some(host)).unwrap();

        let url = client.last_url();
        assert_eq!(param(&url, "utmhn"), None, "host {host:?}");
        let cookie = param(&url, "utmcc").unwrap();
        assert!(cookie.starts_with("__utma=1."));
        assert!(cookie.contains("utmcsr=localhost|utmccn=(referral)|utmcmd=referral|utmcct=/;"));
    }
    assert_eq!(client.calls(), 2);
}

#[test]
fn test_search_referrer_page_view() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);

    tracker
        .track_page_view_from_search("/", Some("Home"), Some("example.com"), "google", "rust beacons")
        .unwrap();

    let cookie = param(&client.last_url(), "utmcc").unwrap();
    assert!(cookie.contains("utmcsr=google|utmccn=(organic)|utmcmd=organic|utmctr=rust beacons;"));
    assert!(!cookie.contains("utmcct"));
}

#[test]
fn test_referrer_page_view() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);

    tracker
        .track_page_view_from_referrer("/pricing", None, None, "news.example.org", "/story/42")
        .unwrap();

    let cookie = param(&client.last_url(), "utmcc").unwrap();
    assert!(cookie.contains("utmcsr=news.example.org|utmccn=(referral)|utmcmd=referral|utmcct=/story/42;"));
}

#[test]
fn test_invalid_request_fails_without_network() {
    let client = RecordingClient::new(200);
    // Asynchronous: validation still happens on the caller's thread
    let tracker = tracker_with(client.clone(), true);

    let err = tracker
        .make_custom_request(RequestData::default())
        .unwrap_err();
    assert!(matches!(err, TrackerError::InvalidRequest(_)));

    let half_event = RequestData {
        event_action: Some("play".to_string()),
        ..RequestData::default()
    };
    assert!(tracker.make_custom_request(half_event).is_err());

    assert!(matches!(
        tracker.track_page_view(" ", None, None),
        Err(TrackerError::InvalidArgument(_))
    ));
    assert!(matches!(
        tracker.track_event("", "play", None, None),
        Err(TrackerError::InvalidArgument(_))
    ));

    tracker.flush(std::time::Duration::from_secs(1));
    assert_eq!(client.calls(), 0);
}

#[test]
fn test_reset_session_changes_only_session() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);

    tracker.track_page_view("/a", None, Some("example.com")).unwrap();
    let before = client.last_url();

    tracker.reset_session();
    tracker.track_page_view("/b", None, Some("example.com")).unwrap();
    let after = client.last_url();

    assert_ne!(param(&before, "utmhid"), param(&after, "utmhid"));
    for key in ["utmul", "utmcs", "utmsr", "utmsc", "utmac"] {
        assert_eq!(param(&before, key), param(&after, key), "{key} changed");
    }
    assert_eq!(
        param(&after, "utmhid"),
        Some(tracker.config().session_id.to_string())
    );
}

#[test]
fn test_disabled_tracker_sends_nothing() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);
    tracker.set_enabled(false);

    tracker
        .track_page_view("/home", Some("Home"), Some("example.com"))
        .unwrap();
    tracker.track_event("video", "play", None, None).unwrap();
    tracker
        .make_custom_request(RequestData::page_view("/custom"))
        .unwrap();
    tracker.make_custom_request(RequestData::default()).unwrap();

    tracker.set_asynchronous(true);
    tracker.track_page_view("/later", None, None).unwrap();
    tracker.flush(std::time::Duration::from_secs(1));

    assert_eq!(client.calls(), 0);
    assert_eq!(tracker.stats(), Default::default());

    tracker.set_enabled(true);
    tracker.track_page_view("/again", None, None).unwrap();
    assert!(tracker.flush(std::time::Duration::from_secs(5)));
    assert_eq!(client.calls(), 1);
}

#[test]
fn test_build_url_preview_does_not_dispatch() {
    let client = RecordingClient::new(200);
    let tracker = tracker_with(client.clone(), false);

    let url = tracker
        .build_url(&RequestData::page_view("/preview"))
        .unwrap();

    assert!(url.starts_with("http://localhost/__utm.gif?utmwv=4.7.2"));
    assert_eq!(client.calls(), 0);
}

#[test]
fn test_new_uses_default_endpoint() {
    let tracker = Tracker::new(AnalyticsConfig::new("UA-9-9"), ProtocolVersion::V4_7_2).unwrap();
    tracker.set_enabled(false);

    let url = tracker.build_url(&RequestData::page_view("/")).unwrap();
    assert!(url.starts_with("http://www.google-analytics.com/__utm.gif?"));
    assert!(url.contains("utmac=UA-9-9"));
}

#[test]
fn test_system_profile_populates_config() {
    let mut config = AnalyticsConfig::new("UA-12345-1").with_machine_visitor_id();
    let visitor_id = config.visitor_id;
    ga_tracker::populate_from_system(&mut config);

    assert!(config.user_language.is_some());
    assert!(config.encoding.is_some());
    assert!(config
        .screen_resolution
        .as_deref()
        .is_some_and(|r| r.contains('x')));
    assert!(config.user_agent.is_some());
    assert_eq!(config.visitor_id, visitor_id);
    assert!((1..=0x7fff_ffff).contains(&visitor_id));
}
