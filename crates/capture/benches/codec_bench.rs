use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use micro_capture::codec::{RequestDecoder, ResponseDecoder};
use micro_capture::config::CaptureConfig;
use micro_capture::flow::{Direction, FlowEvent, FlowKey};
use micro_capture::handler::make_handler;
use micro_capture::protocol::{Message, PayloadItem};
use micro_capture::session::Session;
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;

// decodes one whole message, returns the body length
fn decode_message<D, T>(decoder: &mut D, bytes: &mut BytesMut) -> usize
where
    D: Decoder<Item = Message<T>>,
    D::Error: std::fmt::Debug,
{
    let mut body = 0;
    while let Some(message) = decoder.decode(bytes).unwrap() {
        match message {
            Message::Header(_) => {}
            Message::Payload(PayloadItem::Chunk(chunk)) => body += chunk.len(),
            Message::Payload(PayloadItem::Eof) => break,
        }
    }
    body
}

fn bench_request_decoder(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\nUser-Agent: bench\r\nAccept: */*\r\n\r\n";

    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            black_box(decode_message(&mut decoder, &mut bytes));
        });
    });
}

fn bench_response_decoder(c: &mut Criterion) {
    let chunked = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";

    c.bench_function("decode_chunked_response", |b| {
        b.iter(|| {
            let mut decoder = ResponseDecoder::new();
            let mut bytes = BytesMut::from(&chunked[..]);
            black_box(decode_message(&mut decoder, &mut bytes));
        });
    });

    let body = vec![b'x'; 64 * 1024];
    let mut large = BytesMut::from(&format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes()[..]);
    large.extend_from_slice(&body);

    c.bench_function("decode_large_response", |b| {
        b.iter(|| {
            let mut decoder = ResponseDecoder::new();
            let mut bytes = large.clone();
            black_box(decode_message(&mut decoder, &mut bytes));
        });
    });
}

fn bench_session(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let key = FlowKey::new("10.0.0.1:50000".parse().unwrap(), "10.0.0.2:80".parse().unwrap());
    let request = Bytes::from_static(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n");
    let response = Bytes::from_static(b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nHello World!");

    c.bench_function("capture_100_exchanges", |b| {
        b.to_async(&runtime).iter(|| {
            let request = request.clone();
            let response = response.clone();
            async move {
                let seen = Arc::new(AtomicUsize::new(0));
                let counter = Arc::clone(&seen);
                let handler = make_handler(move |_| {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
                let session = Session::new(CaptureConfig::default(), handler).unwrap();

                let (events, receiver) = mpsc::channel(256);
                let running = tokio::spawn(session.run(receiver, CancellationToken::new()));
                for _ in 0..100 {
                    let segment = FlowEvent::Segment { key, direction: Direction::ClientToServer, payload: request.clone() };
                    events.send(segment).await.unwrap();
                    let segment = FlowEvent::Segment { key, direction: Direction::ServerToClient, payload: response.clone() };
                    events.send(segment).await.unwrap();
                }
                events.send(FlowEvent::Complete { key }).await.unwrap();
                drop(events);

                black_box(running.await.unwrap());
                black_box(seen.load(Ordering::Relaxed))
            }
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_response_decoder, bench_session);
criterion_main!(benches);
