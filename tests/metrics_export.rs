//! Prometheus export of the drain metrics.
//!
//! Installs the global recorder, so this binary holds a single test and the
//! rendered counts are exact.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest::{Client, StatusCode};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use lbdrain::api::AppState;
use lbdrain::config::{AppConfig, HealthConfig, HealthMode, ObservabilityConfig, ServerConfig};
use lbdrain::drain::{DrainCoordinator, DrainPhase, HealthCheck};
use lbdrain::serve;

/// Value of the first sample named `name` carrying every pair in `labels`.
fn sample(rendered: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (series, value) = line.rsplit_once(' ')?;
            let metric = series.split('{').next()?;
            let matches = metric == name
                && labels
                    .iter()
                    .all(|(k, v)| series.contains(&format!("{k}=\"{v}\"")));
            if matches { value.parse().ok() } else { None }
        })
}

#[tokio::test]
async fn test_drain_metrics_are_exported() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install recorder");

    let config = AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
        },
        health: HealthConfig {
            mode: HealthMode::Drain,
            path: "/status.txt".to_string(),
            shutdown_timeout_ms: 5_000,
            poll_interval_ms: 50,
            quiescence_window_ms: 200,
        },
        observability: ObservabilityConfig {
            log_level: "warn".to_string(),
            log_format: "text".to_string(),
            metrics_enabled: true,
            metrics_path: "/metrics".to_string(),
        },
    };
    let coordinator = DrainCoordinator::new(config.health.drain_config()).unwrap();
    let policy: Arc<dyn HealthCheck> = Arc::new(coordinator.clone());
    let state = AppState::new(Arc::new(config), policy, Some(handle.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, state, async move {
        let _ = rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = Client::new();
    let probe = |query: &str| {
        client
            .get(format!("{base}/status.txt{query}"))
            .header("X-Real-IP", "10.0.0.1")
            .send()
    };

    assert_eq!(probe("").await.unwrap().status(), StatusCode::OK);
    assert_eq!(probe("?deployer").await.unwrap().status(), StatusCode::OK);

    let rendered = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(
        sample(&rendered, "lbdrain_drain_phase", &[]),
        Some(f64::from(DrainPhase::Ready as u8))
    );
    // The metrics request itself is in flight while rendering.
    assert_eq!(sample(&rendered, "lbdrain_inflight_requests", &[]), Some(1.0));

    let _ = tx.send(());
    while coordinator.is_ready() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let response = probe("").await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    tokio::time::timeout(Duration::from_secs(3), server)
        .await
        .expect("server did not stop after the quiescence window")
        .unwrap()
        .unwrap();
    assert_eq!(coordinator.phase(), DrainPhase::Done);

    let rendered = handle.render();
    let probes = "lbdrain_health_probes_total";
    assert_eq!(
        sample(&rendered, probes, &[("status", "ok"), ("deployer", "false")]),
        Some(1.0)
    );
    assert_eq!(
        sample(&rendered, probes, &[("status", "ok"), ("deployer", "true")]),
        Some(1.0)
    );
    assert_eq!(
        sample(
            &rendered,
            probes,
            &[("status", "unavailable"), ("deployer", "false")]
        ),
        Some(1.0)
    );
    assert_eq!(
        sample(&rendered, "lbdrain_drain_phase", &[]),
        Some(f64::from(DrainPhase::Done as u8))
    );
    assert_eq!(
        sample(&rendered, "lbdrain_drain_duration_seconds_count", &[]),
        Some(1.0)
    );
    assert_eq!(sample(&rendered, "lbdrain_inflight_requests", &[]), Some(0.0));
}
