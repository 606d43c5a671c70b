#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

mod common;

use common::*;
use serde_json::Value;
use std::process::{Child, Command, Stdio};
use tokio::time::Duration;

struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

struct TempFile(std::path::PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn spawn(port: u16, config: &std::path::Path, bindings: &std::path::Path) -> ChildGuard {
    let child = Command::new(dbreach_binary_path())
        .args(["--listen", "127.0.0.1", "--port", &port.to_string()])
        .arg("--config")
        .arg(config)
        .arg("--bindings-file")
        .arg(bindings)
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn dbreach");
    ChildGuard(child)
}

#[tokio::test]
async fn test_endpoints() {
    let config = TempFile(temp_path("test_endpoints_config", "json"));
    let bindings = TempFile(temp_path("test_endpoints_bindings", "json"));

    std::fs::write(
        &config.0,
        r#"{"Connectors":[
            {"URL_SCHEME":"db2","Display_Name":"DB2","driver":"db2","query":"SELECT current date FROM sysibm.sysdummy1"},
            {"url_scheme":"mysql","driver":"mysql","query":"SELECT current_date"}
        ]}"#,
    )
    .unwrap();
    std::fs::write(
        &bindings.0,
        r#"{"user-provided":[
            {"name":"orders","credentials":{"jdbcurl":"jdbc:db2://127.0.0.1:1/orders","user":"u","password":"p"}},
            {"name":"legacy","credentials":{"jdbcurl":"jdbc:oracle:thin:@h:1521:orcl"}},
            {"name":"broken"},
            {"name":"numeric","credentials":{"jdbcurl":5}}
        ]}"#,
    )
    .unwrap();

    let port = pick_free_port();
    let _child = spawn(port, &config.0, &bindings.0);

    let meta = wait_for_http(port, "/meta", Duration::from_secs(15))
        .await
        .expect("dbreach did not start");
    let meta: Value = serde_json::from_str(&meta).unwrap();
    assert_eq!(meta["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(
        meta["supported_on_prem_resource_types"],
        serde_json::json!(["DB2", "mysql"])
    );
    assert!(meta.get("error").is_none());

    let report = http_get(port, "/test").await.unwrap();
    let report: Value = serde_json::from_str(&report).unwrap();
    let services = report["services"].as_array().unwrap();
    assert_eq!(services.len(), 4);

    assert_eq!(services[0]["svc_name"], "orders");
    assert_eq!(services[0]["on_prem_resource_type"], "DB2");
    assert_eq!(services[0]["success"], false);
    assert_eq!(
        services[0]["output"],
        "test failed: failed to connect to on-premises DB2 database (cause: driver db2 is not available)"
    );

    assert_eq!(services[1]["on_prem_resource_type"], "ORACLE");
    assert_eq!(services[1]["output"], "unsupported data source type: oracle");

    assert!(services[2].get("on_prem_resource_type").is_none());
    assert_eq!(services[2]["output"], "skipped: invalid/missing URL");
    assert_eq!(services[3]["svc_name"], "numeric");
    assert_eq!(services[3]["output"], "skipped: invalid/missing URL");
    assert!(report.get("error").is_none());

    let metrics = http_get(port, "/metrics").await.unwrap();
    assert!(metrics.contains("dbreach_probes_total"));
    assert!(metrics.contains("dbreach_last_run_timestamp_seconds"));
}

#[tokio::test]
async fn test_missing_config_is_reported() {
    let bindings = TempFile(temp_path("test_missing_config_bindings", "json"));
    std::fs::write(&bindings.0, "[]").unwrap();
    let config = temp_path("test_missing_config_never_written", "json");

    let port = pick_free_port();
    let _child = spawn(port, &config, &bindings.0);

    let meta = wait_for_http(port, "/meta", Duration::from_secs(15))
        .await
        .expect("dbreach did not start");
    let meta: Value = serde_json::from_str(&meta).unwrap();
    assert_eq!(meta["supported_on_prem_resource_types"], serde_json::json!([]));
    assert!(
        meta["error"]["message"]
            .as_str()
            .unwrap()
            .contains("could not be located")
    );
    assert!(
        meta["error"]["link"]
            .as_str()
            .unwrap()
            .ends_with("#troubleshooting")
    );

    // a configuration written later is picked up without a restart
    std::fs::write(
        &config,
        r#"{"connectors":[{"url_scheme":"db2","driver":"db2","query":"SELECT 1"}]}"#,
    )
    .unwrap();
    let _config = TempFile(config);

    let report = http_get(port, "/test").await.unwrap();
    assert_eq!(report, r#"{"services":[]}"#);

    let meta = http_get(port, "/meta").await.unwrap();
    let meta: Value = serde_json::from_str(&meta).unwrap();
    assert_eq!(meta["supported_on_prem_resource_types"], serde_json::json!(["db2"]));
}
