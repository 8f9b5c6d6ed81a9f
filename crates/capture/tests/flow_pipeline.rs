use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use indoc::indoc;
use micro_capture::config::CaptureConfig;
use micro_capture::filter::FilterConfig;
use micro_capture::flow::{Direction, FlowEvent, FlowKey};
use micro_capture::handler::make_handler;
use micro_capture::protocol::{Exchange, SetupError};
use micro_capture::session::{Session, SessionReport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Capture {
    events: mpsc::Sender<FlowEvent>,
    cancel: CancellationToken,
    exchanges: Arc<Mutex<Vec<Exchange>>>,
    session: JoinHandle<SessionReport>,
}

impl Capture {
    fn start(config: CaptureConfig) -> Self {
        let exchanges = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&exchanges);
        let session = Session::new(config, make_handler(move |exchange| sink.lock().unwrap().push(exchange))).unwrap();

        let (events, receiver) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let session = tokio::spawn(session.run(receiver, cancel.clone()));
        Self { events, cancel, exchanges, session }
    }

    async fn client(&self, key: FlowKey, payload: &'static str) {
        self.send(key, Direction::ClientToServer, payload.as_bytes()).await;
    }

    async fn server(&self, key: FlowKey, payload: &'static str) {
        self.send(key, Direction::ServerToClient, payload.as_bytes()).await;
    }

    async fn send(&self, key: FlowKey, direction: Direction, payload: &'static [u8]) {
        let event = FlowEvent::Segment { key, direction, payload: Bytes::from_static(payload) };
        self.events.send(event).await.unwrap();
    }

    async fn complete(&self, key: FlowKey) {
        self.events.send(FlowEvent::Complete { key }).await.unwrap();
    }

    /// Ends the event stream and waits for every worker.
    async fn finish(self) -> (SessionReport, Vec<Exchange>) {
        drop(self.events);
        let report = self.session.await.unwrap();
        let exchanges = std::mem::take(&mut *self.exchanges.lock().unwrap());
        (report, exchanges)
    }
}

fn flow(client_port: u16) -> FlowKey {
    FlowKey::new(format!("192.168.1.10:{client_port}").parse().unwrap(), "93.184.216.34:80".parse().unwrap())
}

#[tokio::test]
async fn keep_alive_flow() {
    let capture = Capture::start(CaptureConfig::default());
    let key = flow(40000);

    capture
        .client(key, "POST /api/items HTTP/1.1\r\nHost: example.com\r\nContent-Length: 10\r\n\r\n{\"id\": 42}")
        .await;
    capture
        .server(
            key,
            indoc! {"
            HTTP/1.1 201 Created\r
            Transfer-Encoding: chunked\r
            \r
            2\r
            ok\r
            0\r
            \r
            "},
        )
        .await;
    capture.client(key, "GET /api/items/42 HTTP/1.1\r\nHost: example.com\r\n\r\n").await;
    capture.server(key, "HTTP/1.1 200 OK\r\nContent-Le").await;
    capture.server(key, "ngth: 5\r\n\r\nhel").await;
    capture.server(key, "lo").await;
    capture.complete(key).await;

    let (report, exchanges) = capture.finish().await;
    assert_eq!(report.flows, 1);
    assert_eq!(exchanges.len(), 2);
    // one pipe per direction for the whole connection
    assert_eq!(report.pool.gets, 2);
    assert_eq!(report.pool.puts, 2);

    let first = &exchanges[0];
    assert_eq!(first.request().target(), "/api/items");
    assert_eq!(first.request().body().as_bytes(), &b"{\"id\": 42}"[..]);
    assert_eq!(first.response().status(), 201);
    assert_eq!(first.response().body().as_bytes(), &b"ok"[..]);

    let second = &exchanges[1];
    assert_eq!(second.request().seq(), 2);
    assert_eq!(second.response().request_seq(), 2);
    assert_eq!(second.response().body().as_bytes(), &b"hello"[..]);
    assert_eq!(first.flow_id(), second.flow_id());
}

#[tokio::test]
async fn body_until_close() {
    let capture = Capture::start(CaptureConfig::default());
    let key = flow(40001);

    capture.client(key, "GET /legacy HTTP/1.0\r\nHost: example.com\r\n\r\n").await;
    capture.server(key, "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\nall of ").await;
    capture.server(key, "this").await;
    capture.complete(key).await;

    let (_, exchanges) = capture.finish().await;
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].response().body().as_bytes(), &b"all of this"[..]);
}

#[tokio::test]
async fn recovers_after_garbage() {
    let capture = Capture::start(CaptureConfig::default());
    let key = flow(40002);

    capture.client(key, "GET /a HTTP/1.1\r\nHost: example.com\r\n\r\n").await;
    capture.server(key, "\x00\x01garbage\r\nHTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\na").await;
    capture.client(key, "GET /b HTTP/1.1\r\nHost: example.com\r\n\r\n").await;
    capture.server(key, "HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nb").await;
    capture.complete(key).await;

    let (_, exchanges) = capture.finish().await;
    let bodies: Vec<_> = exchanges.iter().map(|exchange| exchange.response().body().as_bytes().clone()).collect();
    assert_eq!(bodies, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
}

#[tokio::test]
async fn host_filter_drops_other_hosts() {
    let config = CaptureConfig {
        filter: FilterConfig { host: "*.example.com".into(), ..FilterConfig::default() },
        ..CaptureConfig::default()
    };
    let capture = Capture::start(config);

    let api = flow(40003);
    capture.client(api, "GET / HTTP/1.1\r\nHost: api.example.com:8080\r\n\r\n").await;
    capture.server(api, "HTTP/1.1 204 No Content\r\n\r\n").await;

    let other = flow(40004);
    capture.client(other, "GET / HTTP/1.1\r\nHost: example.org\r\n\r\n").await;
    capture.server(other, "HTTP/1.1 204 No Content\r\n\r\n").await;

    let (report, exchanges) = capture.finish().await;
    assert_eq!(report.flows, 2);
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].request().host(), "api.example.com:8080");
}

#[tokio::test]
async fn port_filter_skips_flows() {
    let config = CaptureConfig {
        filter: FilterConfig { port: 8080, ..FilterConfig::default() },
        ..CaptureConfig::default()
    };
    let capture = Capture::start(config);
    let key = flow(40005);

    capture.client(key, "GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").await;
    capture.server(key, "HTTP/1.1 204 No Content\r\n\r\n").await;

    let (report, exchanges) = capture.finish().await;
    assert_eq!(report.flows, 0);
    assert!(exchanges.is_empty());
}

#[tokio::test]
async fn websocket_upgrade_stops_parsing() {
    let capture = Capture::start(CaptureConfig::default());
    let key = flow(40006);

    capture
        .client(
            key,
            indoc! {"
            GET /chat HTTP/1.1\r
            Host: example.com\r
            Upgrade: websocket\r
            Connection: Upgrade\r
            \r
            "},
        )
        .await;
    capture.server(key, "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n").await;
    capture.send(key, Direction::ClientToServer, b"\x81\x85\x37\xfa\x21\x3d\x7f\x9f\x4d\x51\x58").await;
    capture.send(key, Direction::ServerToClient, b"\x81\x05Hello").await;
    capture.complete(key).await;

    let (_, exchanges) = capture.finish().await;
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].response().status(), 101);
}

#[tokio::test]
async fn tls_flow_is_opaque() {
    let capture = Capture::start(CaptureConfig::default());
    let key = flow(40007);

    capture.send(key, Direction::ClientToServer, b"\x16\x03\x01\x02\x00\x01\x00\x01\xfc\x03\x03").await;
    capture.send(key, Direction::ServerToClient, b"\x16\x03\x03\x00\x7a\x02\x00\x00\x76").await;
    capture.client(key, "GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").await;
    capture.complete(key).await;

    let (report, exchanges) = capture.finish().await;
    assert_eq!(report.flows, 1);
    assert!(exchanges.is_empty());
    assert_eq!(report.pool.gets, 0);
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_is_dropped() {
    let config = CaptureConfig { response_timeout_secs: 5, ..CaptureConfig::default() };
    let capture = Capture::start(config);
    let key = flow(40008);

    capture.client(key, "GET /slow HTTP/1.1\r\nHost: example.com\r\n\r\n").await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    capture.client(key, "GET /fast HTTP/1.1\r\nHost: example.com\r\n\r\n").await;
    capture.server(key, "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;
    capture.complete(key).await;

    let (_, exchanges) = capture.finish().await;
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].request().target(), "/fast");
    assert_eq!(exchanges[0].request().seq(), 2);
}

#[tokio::test]
async fn cancel_closes_open_flows() {
    let capture = Capture::start(CaptureConfig::default());
    let key = flow(40009);

    capture.client(key, "GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").await;
    // wait until the segment has been dispatched
    while capture.events.capacity() < capture.events.max_capacity() {
        tokio::task::yield_now().await;
    }
    capture.cancel.cancel();

    let (report, exchanges) = capture.finish().await;
    assert_eq!(report.flows, 1);
    assert!(exchanges.is_empty());
    assert_eq!(report.pool.gets, 2);
    assert_eq!(report.pool.puts, report.pool.gets);
}

#[tokio::test]
async fn invalid_filter_is_rejected() {
    let config = CaptureConfig {
        filter: FilterConfig { ip: "not-an-address".into(), ..FilterConfig::default() },
        ..CaptureConfig::default()
    };
    let result = Session::new(config, make_handler(|_| {}));
    assert!(matches!(result, Err(SetupError::InvalidFilter { .. })));
}
