//! C6 subprocess lifetime, exercised against a real child process rather
//! than a proxy binary (§8 S6, §9 "Subprocess lifetime").

use cfscanner_lib::config::template::{Inbound, Outbound, OutboundSettings, Protocol, ProxyTemplate, TrojanServer};
use cfscanner_lib::proxyrun::specialize;
use cfscanner_lib::proxyrun::subprocess::ProxyProcessGuard;

fn trojan_template() -> ProxyTemplate {
    ProxyTemplate {
        inbounds: vec![Inbound { port: 10808, protocol: "socks".to_string(), settings: None }],
        outbounds: vec![Outbound {
            protocol: Protocol::Trojan,
            settings: OutboundSettings::Trojan {
                servers: vec![TrojanServer { address: "1.1.1.1".to_string(), port: 443, password: "pw".to_string() }],
            },
            stream_settings: None,
        }],
    }
}

/// S6: even when the child process exits immediately on its own, cleanup
/// still removes the temp config file and the guard returns promptly.
#[tokio::test]
async fn cleanup_removes_temp_file_after_child_exits_on_its_own() {
    let template = trojan_template();
    let specialized = specialize::specialize(&template, "104.16.5.9").unwrap();
    let local_port = specialize::local_port(&specialized).unwrap();

    // `/bin/true` stands in for the proxy binary: it ignores its
    // arguments and exits 0 immediately, the earliest a child can exit.
    let mut guard = ProxyProcessGuard::spawn("/bin/true".as_ref(), &specialized, local_port)
        .await
        .expect("spawning /bin/true should succeed");

    let temp_path = guard.temp_config_path().to_path_buf();
    assert!(temp_path.exists());

    let started = std::time::Instant::now();
    guard.cleanup().await;
    assert!(started.elapsed() < std::time::Duration::from_secs(2), "cleanup should return within 2s");
    assert!(!temp_path.exists(), "temp config file must be deleted on cleanup");
}

/// A child that ignores SIGTERM is still reclaimed via SIGKILL within the
/// graceful-shutdown window plus kill overhead.
#[tokio::test]
async fn cleanup_kills_a_child_that_ignores_sigterm() {
    let template = trojan_template();
    let specialized = specialize::specialize(&template, "104.16.5.9").unwrap();
    let local_port = specialize::local_port(&specialized).unwrap();

    // `trap '' TERM` makes the shell ignore SIGTERM, forcing the SIGKILL
    // fallback path in `ProxyProcessGuard::cleanup`.
    let mut guard = ProxyProcessGuard::spawn_with_args(
        "/bin/sh".as_ref(),
        &["-c", "trap '' TERM; sleep 30"],
        &specialized,
        local_port,
    )
    .await
    .expect("spawning /bin/sh should succeed");

    let temp_path = guard.temp_config_path().to_path_buf();
    let started = std::time::Instant::now();
    guard.cleanup().await;
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
    assert!(!temp_path.exists());
}
