//! Server supervisor
//!
//! Owns the listener and the shared registry, spawns the `bh-worker`
//! thread, runs the acceptor on the calling thread and tears everything
//! down once the shutdown token fires.

use crate::acceptor::Acceptor;
use crate::config::ServerConfig;
use crate::net::Listener;
use crate::registry::SharedRegistry;
use crate::response::Response;
use crate::worker::{PollWorker, WorkerStats};
use blackhole_core::cancel::CancellationToken;
use blackhole_core::error::{BhError, BhResult};
use blackhole_core::{kerror, kinfo};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

/// What a finished server did.
#[derive(Debug, Clone)]
pub struct ServerReport {
    pub accepted: u64,
    /// Connections still open at shutdown, closed by the teardown
    pub closed_at_shutdown: usize,
    pub worker: WorkerStats,
}

pub struct Server {
    config: ServerConfig,
    listener: Listener,
    registry: Arc<SharedRegistry>,
    response: Response,
}

impl Server {
    /// Validate `config`, create the shutdown token and registry, and bind
    /// the listener.
    pub fn bind(config: ServerConfig, response: Response) -> BhResult<Self> {
        config.validate()?;
        let token = CancellationToken::new()?;
        let registry = Arc::new(SharedRegistry::new(config.initial_capacity, token)?);
        let listener = Listener::bind(config.socket_addr(), config.backlog)?;
        Ok(Self {
            config,
            listener,
            registry,
            response,
        })
    }

    pub fn local_addr(&self) -> BhResult<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that stops `run` when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.registry.shutdown_token().clone()
    }

    pub fn registry(&self) -> Arc<SharedRegistry> {
        Arc::clone(&self.registry)
    }

    /// Serve until the shutdown token fires.
    pub fn run(self) -> BhResult<ServerReport> {
        let Server {
            config,
            listener,
            registry,
            response,
        } = self;

        kinfo!(
            "listening on {} ({} byte response)",
            listener.local_addr()?,
            response.len()
        );

        let worker = PollWorker::new(Arc::clone(&registry), response, &config)?;
        let handle = thread::Builder::new()
            .name("bh-worker".into())
            .spawn(move || worker.run())
            .map_err(|e| {
                kerror!("failed to spawn worker: {}", e);
                BhError::SpawnFailed
            })?;

        let accepted = Acceptor::new(listener, Arc::clone(&registry)).run();

        let worker = handle.join().map_err(|_| BhError::WorkerPanicked);
        let closed_at_shutdown = registry.close_all();
        let worker = worker?;

        kinfo!(
            "shutdown complete: {} accepted, {} responses, {} closed at exit",
            accepted,
            worker.responses,
            closed_at_shutdown
        );
        Ok(ServerReport {
            accepted,
            closed_at_shutdown,
            worker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::thread::JoinHandle;
    use std::time::{Duration, Instant};

    const REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
    const BODY: &[u8] = b"<html><body>Service Unavailable</body></html>";

    struct Running {
        addr: SocketAddr,
        token: CancellationToken,
        registry: Arc<SharedRegistry>,
        response: Response,
        handle: JoinHandle<BhResult<ServerReport>>,
    }

    fn start() -> Running {
        let config = ServerConfig::new()
            .bind_addr("127.0.0.1".parse().unwrap())
            .port(0)
            .busy_poll_timeout(Duration::from_millis(20))
            .idle_poll_timeout(Duration::from_millis(50))
            .stats_interval(Duration::ZERO);
        let response = Response::from_body(&config.status_line, &config.content_type, BODY);
        let server = Server::bind(config, response.clone()).unwrap();
        let addr = server.local_addr().unwrap();
        let token = server.shutdown_token();
        let registry = server.registry();
        let handle = thread::spawn(move || server.run());
        Running {
            addr,
            token,
            registry,
            response,
            handle,
        }
    }

    impl Running {
        fn stop(self) -> ServerReport {
            self.token.cancel();
            self.handle.join().unwrap().unwrap()
        }
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    fn connect(addr: SocketAddr) -> TcpStream {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
    }

    fn read_response(stream: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_request_gets_canned_response_and_stays_open() {
        let server = start();
        let expected = server.response.as_bytes().to_vec();
        let mut client = connect(server.addr);

        client.write_all(REQUEST).unwrap();
        assert_eq!(read_response(&mut client, expected.len()), expected);
        assert!(expected.starts_with(b"HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(expected.ends_with(BODY));

        client.write_all(REQUEST).unwrap();
        assert_eq!(read_response(&mut client, expected.len()), expected);

        let report = server.stop();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.worker.responses, 2);
        assert_eq!(report.closed_at_shutdown, 1);
    }

    #[test]
    fn test_pipelined_requests() {
        let server = start();
        let expected = server.response.as_bytes().to_vec();
        let mut client = connect(server.addr);

        let mut both = REQUEST.to_vec();
        both.extend_from_slice(REQUEST);
        client.write_all(&both).unwrap();

        let mut twice = expected.clone();
        twice.extend_from_slice(&expected);
        assert_eq!(read_response(&mut client, twice.len()), twice);

        server.stop();
    }

    #[test]
    fn test_client_close_without_request() {
        let server = start();
        let client = connect(server.addr);
        assert!(wait_until(Duration::from_secs(5), || server.registry.live() == 1));

        drop(client);
        assert!(wait_until(Duration::from_secs(5), || server.registry.live() == 0));

        let report = server.stop();
        assert_eq!(report.worker.responses, 0);
        assert_eq!(report.worker.closed, 1);
        assert_eq!(report.closed_at_shutdown, 0);
    }

    #[test]
    fn test_idle_worker_admits_sequential_connections() {
        let server = start();
        assert!(wait_until(Duration::from_secs(5), || server.registry.worker_blocked()));

        let mut clients = Vec::new();
        for n in 1..=10 {
            clients.push(connect(server.addr));
            assert!(
                wait_until(Duration::from_secs(5), || server.registry.live() == n),
                "connection {} never admitted",
                n
            );
        }

        let expected = server.response.as_bytes().to_vec();
        let last = clients.last_mut().unwrap();
        last.write_all(REQUEST).unwrap();
        assert_eq!(read_response(last, expected.len()), expected);

        let report = server.stop();
        assert_eq!(report.accepted, 10);
        assert_eq!(report.closed_at_shutdown, 10);
    }

    #[test]
    fn test_shutdown_with_parked_worker_is_prompt() {
        let server = start();
        assert!(wait_until(Duration::from_secs(5), || server.registry.worker_blocked()));

        let start = Instant::now();
        let report = server.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(report.accepted, 0);
    }

    #[test]
    fn test_bind_rejects_invalid_config() {
        let config = ServerConfig::new().write_budget(0);
        let response = Response::from_body("HTTP/1.1 200 OK", "text/plain", b"");
        assert!(matches!(
            Server::bind(config, response),
            Err(BhError::Config(_))
        ));
    }
}
