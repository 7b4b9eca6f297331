//! End-to-end scrapes against a mocked cloud API

use chrono::{TimeZone, Utc};
use exporter_lib::client::{ApiClient, ClientConfig};
use exporter_lib::collector::{build_collectors, UpstreamFaults, ALL_KINDS};
use exporter_lib::metrics::encode_text;
use exporter_lib::{CollectorSet, ErrorCounter};
use mockito::{Matcher, Server, ServerGuard};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_test::assert_ok;

#[derive(Default)]
struct RecordingErrors(Mutex<HashMap<String, u64>>);

impl RecordingErrors {
    fn count(&self, collector: &str) -> u64 {
        self.0.lock().unwrap().get(collector).copied().unwrap_or(0)
    }
}

impl ErrorCounter for RecordingErrors {
    fn increment(&self, collector: &str) {
        *self.0.lock().unwrap().entry(collector.to_string()).or_default() += 1;
    }
}

fn client_for(server: &ServerGuard) -> Arc<ApiClient> {
    Arc::new(assert_ok!(ApiClient::new(ClientConfig {
        root_url: format!("{}/cloud/zone", server.url()),
        token: "token".into(),
        secret: "secret".into(),
        ..Default::default()
    })))
}

/// Every collector except the listed ones
fn disabled_except(enabled: &[&str]) -> Vec<String> {
    ALL_KINDS
        .iter()
        .filter(|k| !enabled.contains(k))
        .map(|k| k.to_string())
        .collect()
}

async fn mock_json(server: &mut ServerGuard, path: &str, status: usize, body: &str) -> mockito::Mock {
    server
        .mock("GET", path)
        .match_query(Matcher::Any)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

const ROUTERS: &str = r#"{"Total": 1, "Internet": [{
    "ID": 100, "Name": "gw", "Description": "", "Tags": ["b", "a"],
    "BandWidthMbps": 100, "NetworkMaskLen": 28,
    "Switch": {"ID": "200", "Name": "gw-switch"}
}]}"#;

const ROUTER_TRAFFIC: &str = r#"{"Data": {
    "2024-06-01T10:00:00+09:00": {"In": 8000, "Out": 4000},
    "2024-06-01T10:05:00+09:00": {"In": 16000, "Out": 2000},
    "2024-06-01T10:10:00+09:00": {"In": 1, "Out": 1},
    "2024-06-01T10:15:00+09:00": {"In": null, "Out": null}
}}"#;

#[tokio::test]
async fn test_router_traffic_uses_settled_sample() {
    let mut server = Server::new_async().await;
    let _routers = mock_json(&mut server, "/cloud/zone/is1a/api/cloud/1.1/internet", 200, ROUTERS).await;
    let traffic = mock_json(
        &mut server,
        "/cloud/zone/is1a/api/cloud/1.1/internet/100/monitor",
        200,
        ROUTER_TRAFFIC,
    )
    .await;

    let errors = Arc::new(RecordingErrors::default());
    let collectors = build_collectors(client_for(&server), "111", &disabled_except(&["internet"]));
    assert_eq!(collectors.len(), 1);

    let set = CollectorSet::new(collectors, vec!["is1a".into()], errors.clone());
    let outcome = set.scrape().await;

    traffic.assert_async().await;
    assert_eq!(errors.count("internet"), 0);
    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports[0].failures, 0);

    let text = String::from_utf8(assert_ok!(encode_text(&outcome.samples, Vec::new()))).unwrap();
    let settled_at = Utc.with_ymd_and_hms(2024, 6, 1, 1, 5, 0).unwrap().timestamp_millis();

    assert!(text.contains(
        r#"sakuracloud_internet_info{id="100",name="gw",zone="is1a",switch_id="200",bandwidth="100",nw_mask_len="28",tags=",a,b,",description=""} 1"#
    ));
    assert!(text.contains(&format!(r#"sakuracloud_internet_in{{id="100",name="gw",zone="is1a"}} 16 {settled_at}"#)));
    assert!(text.contains(&format!(r#"sakuracloud_internet_out{{id="100",name="gw",zone="is1a"}} 2 {settled_at}"#)));
}

#[tokio::test]
async fn test_failed_zone_list_drops_the_kind() {
    let mut server = Server::new_async().await;
    let _routers = mock_json(&mut server, "/cloud/zone/is1a/api/cloud/1.1/internet", 200, ROUTERS).await;
    let _broken = mock_json(
        &mut server,
        "/cloud/zone/tk1a/api/cloud/1.1/internet",
        503,
        r#"{"is_fatal": true, "error_msg": "maintenance"}"#,
    )
    .await;
    let traffic = server
        .mock("GET", "/cloud/zone/is1a/api/cloud/1.1/internet/100/monitor")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let errors = Arc::new(RecordingErrors::default());
    let collectors = build_collectors(client_for(&server), "111", &disabled_except(&["internet"]));
    let set = CollectorSet::new(collectors, vec!["is1a".into(), "tk1a".into()], errors.clone());
    let outcome = set.scrape().await;

    traffic.assert_async().await;
    assert_eq!(errors.count("internet"), 1);
    assert_eq!(outcome.reports[0].failures, 1);
    assert_eq!(outcome.reports[0].upstream, UpstreamFaults { rejected: 0, unavailable: 1 });
    assert!(outcome.samples.is_empty());
}

#[tokio::test]
async fn test_stopped_server_skips_monitors() {
    let mut server = Server::new_async().await;

    let _servers = mock_json(
        &mut server,
        "/cloud/zone/is1a/api/cloud/1.1/server",
        200,
        r#"{"Total": 1, "Servers": [{
            "ID": "113000000001", "Name": "web", "Availability": "available",
            "ServerPlan": {"CPU": 2, "MemoryMB": 4096, "Commitment": "standard"},
            "Instance": {"Status": "down"},
            "Interfaces": [{"ID": "1", "MACAddress": "9c:a3:ba:00:00:01", "IPAddress": "192.0.2.1", "Switch": {"ID": "s", "Name": "shared", "Scope": "shared"}}],
            "Disks": [{"ID": "2", "Name": "disk", "SizeMB": 20480, "Plan": {"ID": 4, "Name": "ssd"}, "Connection": "virtio"}]
        }]}"#,
    )
    .await;
    let cpu = server
        .mock("GET", "/cloud/zone/is1a/api/cloud/1.1/server/113000000001/monitor")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let nic = server
        .mock("GET", "/cloud/zone/is1a/api/cloud/1.1/interface/1/monitor")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let errors = Arc::new(RecordingErrors::default());
    let collectors = build_collectors(client_for(&server), "111", &disabled_except(&["server"]));
    let set = CollectorSet::new(collectors, vec!["is1a".into()], errors.clone());
    let outcome = set.scrape().await;

    cpu.assert_async().await;
    nic.assert_async().await;
    assert_eq!(errors.count("server"), 0);

    let up = outcome
        .samples
        .iter()
        .find(|s| s.name == "sakuracloud_server_up")
        .unwrap();
    assert_eq!(up.value, 0.0);
    assert!(outcome.samples.iter().any(|s| s.name == "sakuracloud_server_info"));
    assert!(outcome.samples.iter().all(|s| s.name != "sakuracloud_server_cpu_time"));
}

#[tokio::test]
async fn test_bills_are_fetched_once_across_scrapes() {
    let mut server = Server::new_async().await;
    let bills = server
        .mock("GET", "/cloud/zone/is1a/api/cloud/1.1/bill/by-contract/111")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"Count": 2, "Bills": [
                {"BillID": 1, "Amount": 1200, "Date": "2024-04-30T15:00:00Z", "MemberID": "abc", "Paid": true},
                {"BillID": 2, "Amount": 3400, "Date": "2024-05-31T15:00:00Z", "MemberID": "abc", "Paid": false}
            ]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let errors = Arc::new(RecordingErrors::default());
    let collectors = build_collectors(client_for(&server), "111", &disabled_except(&["bill"]));
    let set = CollectorSet::new(collectors, vec!["is1a".into(), "tk1a".into()], errors.clone());

    let first = set.scrape().await;
    let second = set.scrape().await;

    bills.assert_async().await;
    assert_eq!(errors.count("bill"), 0);
    assert_eq!(first.samples, second.samples);

    let amount = first
        .samples
        .iter()
        .find(|s| s.name == "sakuracloud_bill_amount")
        .unwrap();
    assert_eq!(amount.value, 3400.0);
    assert_eq!(amount.label("bill_id"), Some("2"));
    assert_eq!(amount.label("month"), Some("2024-06"));
}

#[tokio::test]
async fn test_rejected_credentials_fail_every_list() {
    let mut server = Server::new_async().await;
    let _denied = server
        .mock("GET", Matcher::Any)
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"is_fatal": true, "status": "401 Unauthorized", "error_msg": "invalid token"}"#)
        .create_async()
        .await;

    let errors = Arc::new(RecordingErrors::default());
    let collectors = build_collectors(client_for(&server), "111", &disabled_except(&["server", "nfs"]));
    let set = CollectorSet::new(collectors, vec!["is1a".into(), "tk1a".into()], errors.clone());

    let outcome = set.scrape().await;

    assert!(outcome.samples.is_empty());
    assert_eq!(errors.count("server"), 1);
    assert_eq!(errors.count("nfs"), 1);
    // two kinds, two zones each
    assert_eq!(outcome.upstream_faults().rejected, 4);
    assert!(assert_ok!(encode_text(&outcome.samples, Vec::new())).is_empty());
}
