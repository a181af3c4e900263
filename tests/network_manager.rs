//! End-to-end tests for the network manager against local sockets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use network_manager::config::{NetworkConfig, RecoveryConfig};
use network_manager::dns::{FallbackResolver, Lookup};
use network_manager::health::RecoveryOutcome;
use network_manager::websocket::{WebSocketError, WebSocketHandle};
use network_manager::{NetworkError, NetworkManager, NetworkStatus, PartitionReason, RequestOptions};
use reqwest::Method;

mod common;

use common::{FailingLookup, FixedProbe};

fn test_config() -> NetworkConfig {
    let mut config = NetworkConfig::default();
    config.monitor.enabled = false;
    config.monitor.health_check_urls = vec!["https://probe.test".to_string()];
    config.recovery = RecoveryConfig {
        max_attempts: 10,
        base_delay_secs: 0,
        max_exponent: 5,
    };
    config
}

fn manager_with_probe(config: NetworkConfig, probe: Arc<FixedProbe>) -> NetworkManager {
    NetworkManager::builder(config).probe(probe).build().unwrap()
}

#[tokio::test]
async fn test_successful_requests_update_metrics() {
    let addr = common::start_mock_backend("hello").await;
    let manager = manager_with_probe(test_config(), FixedProbe::down());
    manager.initialize().await.unwrap();

    for _ in 0..2 {
        let response = manager
            .make_request(Method::GET, &format!("http://{}/ping", addr), RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "hello");
    }

    let metrics = manager.metrics();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.failed_requests, 0);
    assert_eq!(metrics.active_connections, 0);
    assert!(metrics.average_response_time_ms > 0.0);

    manager.cleanup().await;
}

#[tokio::test]
async fn test_request_before_initialize_fails() {
    let manager = manager_with_probe(test_config(), FixedProbe::down());
    let err = manager
        .make_request(Method::GET, "http://127.0.0.1:9/", RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::PoolNotInitialized));
}

#[tokio::test]
async fn test_request_after_cleanup_fails() {
    let manager = manager_with_probe(test_config(), FixedProbe::down());
    manager.initialize().await.unwrap();
    manager.cleanup().await;

    let err = manager
        .make_request(Method::GET, "http://127.0.0.1:9/", RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::PoolNotInitialized));
}

#[tokio::test]
async fn test_refused_connection_enters_partition_once() {
    let addr = common::closed_port_addr().await;
    let probe = FixedProbe::down();
    let manager = manager_with_probe(test_config(), probe.clone());
    manager.initialize().await.unwrap();

    let url = format!("http://{}/", addr);
    let err = manager
        .make_request(Method::GET, &url, RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.partition_reason(), Some(PartitionReason::ConnectionRefused));
    assert_eq!(manager.status(), NetworkStatus::Partitioned);
    assert_eq!(manager.metrics().partition_events, 1);

    let _ = manager.make_request(Method::GET, &url, RequestOptions::new()).await;
    assert_eq!(manager.metrics().partition_events, 1);
    assert_eq!(manager.metrics().failed_requests, 2);

    // Zero base delay: all attempts run back to back against a dead probe.
    assert_eq!(
        manager.wait_for_recovery().await,
        Some(RecoveryOutcome::Exhausted { attempts: 10 })
    );
    assert_eq!(probe.calls(), 10);
    assert_eq!(manager.status(), NetworkStatus::Partitioned);

    manager.cleanup().await;
}

#[tokio::test]
async fn test_successful_request_clears_partition() {
    let dead = common::closed_port_addr().await;
    let live = common::start_mock_backend("ok").await;
    let manager = manager_with_probe(test_config(), FixedProbe::down());
    manager.initialize().await.unwrap();

    let _ = manager
        .make_request(Method::GET, &format!("http://{}/", dead), RequestOptions::new())
        .await;
    assert_eq!(manager.status(), NetworkStatus::Partitioned);

    manager
        .make_request(Method::GET, &format!("http://{}/", live), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(manager.status(), NetworkStatus::Connected);

    manager.cleanup().await;
}

#[tokio::test]
async fn test_recovery_succeeds_when_probe_is_up() {
    let dead = common::closed_port_addr().await;
    let manager = manager_with_probe(test_config(), FixedProbe::up());
    manager.initialize().await.unwrap();

    let _ = manager
        .make_request(Method::GET, &format!("http://{}/", dead), RequestOptions::new())
        .await;

    assert_eq!(
        manager.wait_for_recovery().await,
        Some(RecoveryOutcome::Recovered { attempts: 1 })
    );
    assert_eq!(manager.status(), NetworkStatus::Connected);

    manager.cleanup().await;
}

#[tokio::test]
async fn test_ip_literal_resolves_without_lookup() {
    let manager = manager_with_probe(test_config(), FixedProbe::down());
    let ips = manager.resolve_dns("127.0.0.1", true).await.unwrap();
    assert_eq!(ips, vec!["127.0.0.1".parse::<std::net::IpAddr>().unwrap()]);
    assert_eq!(manager.get_network_status().dns_cache_entries, 0);
}

#[derive(Default)]
struct TestSocket {
    closed: AtomicBool,
}

#[async_trait]
impl WebSocketHandle for TestSocket {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), WebSocketError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_monitor_sweeps_websockets_and_publishes_status() {
    let mut config = test_config();
    config.monitor.enabled = true;
    let manager = manager_with_probe(config, FixedProbe::up());

    let sockets: Vec<Arc<TestSocket>> = (0..5).map(|_| Arc::new(TestSocket::default())).collect();
    for socket in &sockets {
        manager.register_websocket_connection(socket);
    }
    sockets[0].closed.store(true, Ordering::SeqCst);
    sockets[4].closed.store(true, Ordering::SeqCst);

    manager.initialize().await.unwrap();
    // The first monitor cycle runs immediately.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(manager.metrics().websocket_connections, 3);
    assert_eq!(manager.status(), NetworkStatus::Connected);

    manager.cleanup().await;
    assert!(sockets.iter().all(|s| s.is_closed()));
    assert_eq!(manager.get_network_status().websocket_registrations, 0);
}

#[tokio::test]
async fn test_unregister_websocket() {
    let manager = manager_with_probe(test_config(), FixedProbe::down());
    let socket = Arc::new(TestSocket::default());
    let id = manager.register_websocket_connection(&socket);

    assert_eq!(manager.get_network_status().websocket_registrations, 1);
    assert!(manager.unregister_websocket_connection(id));
    assert!(!manager.unregister_websocket_connection(id));
    assert_eq!(manager.get_network_status().websocket_registrations, 0);
}

#[tokio::test]
async fn test_required_tls_with_missing_bundle_fails_initialize() {
    let mut config = test_config();
    config.connection.ssl_mode = network_manager::config::SslMode::Required;
    config.connection.ca_bundle_path = Some("/nonexistent/ca.pem".to_string());
    let manager = manager_with_probe(config, FixedProbe::down());

    let err = manager.initialize().await.unwrap_err();
    assert!(matches!(err, NetworkError::TlsInitFailed(_)));
    assert!(!manager.is_initialized());
    assert_eq!(manager.metrics().ssl_handshake_failures, 1);
}

#[tokio::test]
async fn test_optional_tls_with_missing_bundle_degrades() {
    let mut config = test_config();
    config.connection.ca_bundle_path = Some("/nonexistent/ca.pem".to_string());
    let manager = manager_with_probe(config, FixedProbe::down());

    manager.initialize().await.unwrap();
    let report = manager.get_network_status();
    assert!(report.initialized);
    assert!(report.tls.is_none());

    manager.cleanup().await;
}

#[tokio::test]
async fn test_unresolvable_host_runs_resolver_chain_once() {
    let nameserver = Arc::new(FailingLookup::default());
    let system = Arc::new(FailingLookup::default());
    let manager = NetworkManager::builder(test_config())
        .resolver(FallbackResolver::new(vec![nameserver.clone() as Arc<dyn Lookup>], system.clone()))
        .probe(FixedProbe::down())
        .build()
        .unwrap();
    manager.initialize().await.unwrap();

    let err = manager
        .make_request(Method::GET, "http://unresolvable.test:81/", RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::RequestFailed { partition: None, .. }));

    assert_eq!(nameserver.calls(), 1);
    assert_eq!(system.calls(), 1);
    let report = manager.get_network_status();
    assert_eq!(report.circuit_breakers.dns.consecutive_failures, 1);
    assert_eq!(report.status, NetworkStatus::Disconnected);

    manager.cleanup().await;
}
