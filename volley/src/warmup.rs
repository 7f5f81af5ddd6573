//! Transport warm-up: opens the connection matrix and exercises each
//! transport with real calls before measurement begins, so connection
//! setup, DNS resolution, and TLS handshakes stay out of the run.

use crate::caller::{Caller, PeerTransport, TransportOptions};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use volley_core::CallError;

#[derive(Debug, Error)]
pub enum WarmupError {
    #[error("specify at least one peer")]
    NoPeers,

    #[error("warm-up failed for peer {peer}: {source}")]
    Failed { peer: String, source: CallError },
}

/// Assigns peers to connection slots: a rotating start index drawn from
/// `rng`, then round-robin. Tests pin the draw with a seeded generator.
pub(crate) fn peer_balancer<'a, R: Rng>(
    peers: &'a [String],
    rng: &mut R,
) -> impl Fn(usize) -> &'a str {
    let start = if peers.len() > 1 {
        rng.gen_range(0..peers.len())
    } else {
        0
    };
    move |i| peers[(start + i) % peers.len()].as_str()
}

/// Opens `n` transports balanced across the configured peers and issues
/// `warmup_requests` calls on each. Any failed connect or warm-up call
/// aborts the run; `warmup_requests == 0` opens connections without
/// calling and always accepts.
pub async fn warm_transports<C>(
    caller: Arc<C>,
    n: usize,
    opts: &TransportOptions,
    warmup_requests: usize,
) -> Result<Vec<PeerTransport<C::Transport>>, WarmupError>
where
    C: Caller + 'static,
{
    warm_transports_with(caller, n, opts, warmup_requests, &mut rand::thread_rng()).await
}

pub(crate) async fn warm_transports_with<C, R>(
    caller: Arc<C>,
    n: usize,
    opts: &TransportOptions,
    warmup_requests: usize,
    rng: &mut R,
) -> Result<Vec<PeerTransport<C::Transport>>, WarmupError>
where
    C: Caller + 'static,
    R: Rng,
{
    if opts.peers.is_empty() {
        return Err(WarmupError::NoPeers);
    }

    let peer_for = peer_balancer(&opts.peers, rng);
    let mut warms = Vec::with_capacity(n);
    for i in 0..n {
        let peer = peer_for(i).to_string();
        let caller = Arc::clone(&caller);
        let opts = opts.clone();
        warms.push(tokio::spawn(async move {
            warm_transport(&*caller, peer, &opts, warmup_requests).await
        }));
    }

    let mut transports = Vec::with_capacity(n);
    let mut failures = Vec::new();
    for warm in warms {
        match warm.await.expect("warm-up task panicked") {
            Ok(transport) => transports.push(transport),
            Err(failure) => failures.push(failure),
        }
    }

    if !failures.is_empty() {
        warn!(
            failed = failures.len(),
            total = n,
            "transport warm-up failed"
        );
        return Err(failures.remove(0));
    }

    debug!(transports = transports.len(), "transports warmed");
    Ok(transports)
}

async fn warm_transport<C: Caller>(
    caller: &C,
    peer: String,
    opts: &TransportOptions,
    warmup_requests: usize,
) -> Result<PeerTransport<C::Transport>, WarmupError> {
    let transport = match caller.connect(&peer, opts).await {
        Ok(transport) => transport,
        Err(source) => return Err(WarmupError::Failed { peer, source }),
    };
    for _ in 0..warmup_requests {
        if let Err(source) = caller.call(&transport).await {
            return Err(WarmupError::Failed { peer, source });
        }
    }
    Ok(PeerTransport { transport, peer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU64, Ordering};
    use volley_core::{CallReport, MethodType};

    fn peers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn balancer_rotates_round_robin() {
        let peers = peers(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(7);
        let peer_for = peer_balancer(&peers, &mut rng);

        let picks: Vec<&str> = (0..6).map(&peer_for).collect();
        // Consecutive slots walk the peer list, wrapping around.
        for window in picks.windows(2) {
            assert_ne!(window[0], window[1]);
        }
        assert_eq!(picks[0], picks[3]);
        assert_eq!(picks[1], picks[4]);
    }

    #[test]
    fn balancer_is_deterministic_for_a_seed() {
        let peers = peers(&["a", "b", "c", "d", "e"]);
        let one: Vec<&str> = {
            let mut rng = StdRng::seed_from_u64(42);
            let peer_for = peer_balancer(&peers, &mut rng);
            (0..10).map(&peer_for).collect()
        };
        let two: Vec<&str> = {
            let mut rng = StdRng::seed_from_u64(42);
            let peer_for = peer_balancer(&peers, &mut rng);
            (0..10).map(&peer_for).collect()
        };
        assert_eq!(one, two);
    }

    #[test]
    fn single_peer_gets_every_slot() {
        let peers = peers(&["only"]);
        let mut rng = StdRng::seed_from_u64(1);
        let peer_for = peer_balancer(&peers, &mut rng);
        for i in 0..5 {
            assert_eq!(peer_for(i), "only");
        }
    }

    struct CountingCaller {
        calls: AtomicU64,
        fail_connects_to: Option<String>,
        fail_calls_after: Option<u64>,
    }

    impl CountingCaller {
        fn ok() -> Self {
            Self {
                calls: AtomicU64::new(0),
                fail_connects_to: None,
                fail_calls_after: None,
            }
        }
    }

    #[async_trait]
    impl Caller for CountingCaller {
        type Transport = String;

        fn method(&self) -> &str {
            "Simple::foo"
        }

        fn method_type(&self) -> MethodType {
            MethodType::Unary
        }

        async fn connect(
            &self,
            peer: &str,
            _opts: &TransportOptions,
        ) -> Result<Self::Transport, CallError> {
            if self.fail_connects_to.as_deref() == Some(peer) {
                return Err(CallError::Io(std::io::Error::from(
                    std::io::ErrorKind::ConnectionRefused,
                )));
            }
            Ok(peer.to_string())
        }

        async fn call(&self, _transport: &Self::Transport) -> Result<CallReport, CallError> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            if matches!(self.fail_calls_after, Some(limit) if n >= limit) {
                return Err(CallError::Other("server overloaded".to_string()));
            }
            Ok(CallReport::unary(std::time::Duration::from_micros(50)))
        }
    }

    fn opts(peer_names: &[&str]) -> TransportOptions {
        TransportOptions {
            service_name: "foo".to_string(),
            caller_name: "bar".to_string(),
            peers: peers(peer_names),
        }
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn warms_every_transport_in_order() {
        let caller = Arc::new(CountingCaller::ok());
        let mut rng = StdRng::seed_from_u64(3);
        let transports =
            warm_transports_with(Arc::clone(&caller), 6, &opts(&["a", "b", "c"]), 2, &mut rng)
                .await
                .unwrap();

        assert_eq!(transports.len(), 6);
        assert_eq!(caller.calls.load(Ordering::Relaxed), 12);
        // Slot order matches the balancer assignment.
        for window in transports.windows(2) {
            assert_ne!(window[0].peer, window[1].peer);
        }
        assert_eq!(transports[0].peer, transports[3].peer);
    }

    #[tokio::test]
    async fn zero_warmup_requests_issues_no_calls() {
        let caller = Arc::new(CountingCaller {
            fail_calls_after: Some(0),
            ..CountingCaller::ok()
        });
        let transports = warm_transports(Arc::clone(&caller), 4, &opts(&["a"]), 0)
            .await
            .unwrap();
        assert_eq!(transports.len(), 4);
        assert_eq!(caller.calls.load(Ordering::Relaxed), 0);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn any_failed_warmup_call_aborts() {
        let caller = Arc::new(CountingCaller {
            fail_calls_after: Some(5),
            ..CountingCaller::ok()
        });
        let err = warm_transports(caller, 4, &opts(&["a"]), 2)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("warm-up failed for peer"));
    }

    #[tokio::test]
    async fn failed_connect_aborts() {
        let caller = Arc::new(CountingCaller {
            fail_connects_to: Some("b".to_string()),
            ..CountingCaller::ok()
        });
        let err = warm_transports(caller, 4, &opts(&["a", "b"]), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, WarmupError::Failed { .. }));
    }

    #[tokio::test]
    async fn empty_peer_list_is_rejected() {
        let caller = Arc::new(CountingCaller::ok());
        let err = warm_transports(caller, 2, &opts(&[]), 1).await.unwrap_err();
        assert_eq!(err.to_string(), "specify at least one peer");
    }
}
