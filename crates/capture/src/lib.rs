//! Passive reconstruction of HTTP/1.x exchanges from captured TCP traffic
//!
//! This crate turns reassembled TCP segments into matched request/response pairs. It
//! sits between a packet source plus TCP reassembler (which order the segments of each
//! connection) and a presentation layer (which shows the exchanges). Nothing is ever
//! sent on the network.
//!
//! # Features
//!
//! - Cheap classification of flows from their first client payload
//! - One tokio task per HTTP flow, fed through bounded-wait byte pipes
//! - Streaming request and response decoding built on `httparse` and
//!   `tokio_util::codec::Decoder`
//! - Chunked, Content-Length and read-until-close bodies
//! - Recovery from desynchronized or malformed streams without dropping the connection
//! - Host, ip and port filtering
//! - Hex dump rendering of binary bodies
//!
//! # Example
//!
//! ```no_run
//! use bytes::{Bytes, BytesMut};
//! use micro_capture::config::CaptureConfig;
//! use micro_capture::flow::{Direction, FlowEvent, FlowKey};
//! use micro_capture::handler::make_handler;
//! use micro_capture::protocol::DumpOptions;
//! use micro_capture::session::Session;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CaptureConfig::default();
//!     micro_capture::diagnostics::init(config.diagnostic_log.as_deref(), tracing::Level::DEBUG)?;
//!
//!     let handler = make_handler(|exchange| {
//!         let mut dump = BytesMut::new();
//!         exchange.write_to(&mut dump, &DumpOptions::compact());
//!         println!("{}", String::from_utf8_lossy(&dump));
//!     });
//!     let session = Session::new(config, handler)?;
//!     println!("capture expression: {}", session.capture_expression());
//!
//!     let (events, receiver) = mpsc::channel(1024);
//!     let cancel = CancellationToken::new();
//!     let running = tokio::spawn(session.run(receiver, cancel.clone()));
//!
//!     // normally fed by the TCP reassembler
//!     let key = FlowKey::new("10.0.0.1:50000".parse()?, "10.0.0.2:80".parse()?);
//!     let request = Bytes::from_static(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
//!     events.send(FlowEvent::Segment { key, direction: Direction::ClientToServer, payload: request }).await?;
//!     let response = Bytes::from_static(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
//!     events.send(FlowEvent::Segment { key, direction: Direction::ServerToClient, payload: response }).await?;
//!     events.send(FlowEvent::Complete { key }).await?;
//!
//!     drop(events);
//!     let report = running.await?;
//!     println!("{} flows", report.flows);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`session`]: owns everything below and runs the dispatch loop
//! - [`flow`]: flow keys and events, classification, per-flow dispatch and stream workers
//! - [`pipe`]: the byte channel between segment delivery and parsing
//! - [`codec`]: request and response decoders
//! - [`protocol`]: captured message types, rendering and errors
//! - [`filter`]: capture expression, flow admission and host matching
//! - [`handler`]: consumers of completed exchanges
//! - [`pool`]: reusable pipe buffers
//! - [`config`] and [`diagnostics`]: session settings and the diagnostic log
//!
//! # Recovery
//!
//! When a message fails to parse, the worker skips ahead in that direction to the next
//! line that looks like a message start (`<METHOD> ` from the client, `HTTP/` from the
//! server), or drops everything buffered if there is none. A response that does not
//! arrive within the response timeout is given up on, and the worker goes back to
//! waiting for the next request.
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only, no HTTP/2 or HTTP/3
//! - No TLS decryption; encrypted flows are classified as opaque and ignored
//! - No pipelining: a response always answers the latest request
//! - Maximum header block size: 64KiB
//! - Maximum number of headers: 96

pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod filter;
pub mod flow;
pub mod handler;
pub mod pipe;
pub mod pool;
pub mod protocol;
pub mod session;

mod utils;
pub(crate) use utils::ensure;
