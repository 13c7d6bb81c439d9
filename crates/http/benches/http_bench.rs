use std::{
    error::Error,
    hint::black_box,
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use http::StatusCode;
use sharpd_http::{
    codec::{RequestDecoder, ResponseEncoder, ResponseHead},
    connection::{ConnectionConfig, HttpConnection},
    handler::make_handler,
    protocol::{Request, Response, ResponseMessage},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::codec::{Decoder, Encoder};

// Mock IO for testing
#[derive(Clone)]
struct MockIO {
    read_data: Vec<u8>,
    read_pos: usize,
}

impl MockIO {
    fn new(read_data: Vec<u8>) -> Self {
        Self { read_data, read_pos: 0 }
    }
}

impl AsyncRead for MockIO {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let remaining = &self.read_data[self.read_pos..];
        let amt = std::cmp::min(remaining.len(), buf.remaining());
        buf.put_slice(&remaining[..amt]);
        self.read_pos += amt;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockIO {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }
}

// Test handler
async fn test_handler(_req: Request) -> Result<Response, Box<dyn Error + Send + Sync>> {
    Ok(Response::with_body(StatusCode::OK, "text/plain", "Hello World!"))
}

fn multipart_request(payload_len: usize) -> Vec<u8> {
    let mut body = b"--xyz\r\nContent-Disposition: form-data; name=\"video_file\"; filename=\"clip.mp4\"\r\n\r\n".to_vec();
    body.extend((0..payload_len).map(|i| (i % 251) as u8));
    body.extend_from_slice(b"\r\n--xyz--\r\n");

    let mut request = format!(
        "POST /video_sharpness HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=xyz\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(&body);
    request
}

fn bench_request_decoder(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_multipart_decoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_multipart_upload");
    let request = multipart_request(1024 * 1024);
    group.throughput(Throughput::Bytes(request.len() as u64));

    for chunk_size in [1024, 16 * 1024, 64 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &chunk_size, |b, &chunk_size| {
            b.iter(|| {
                let mut decoder = RequestDecoder::new();
                let mut bytes = BytesMut::new();
                for chunk in request.chunks(chunk_size) {
                    bytes.extend_from_slice(chunk);
                    while let Some(event) = decoder.decode(&mut bytes).unwrap() {
                        black_box(event);
                    }
                }
            });
        });
    }
    group.finish();
}

fn bench_response_encoder(c: &mut Criterion) {
    let mut message = ResponseMessage::response(StatusCode::OK);
    message.set_content_type("text/plain");

    c.bench_function("encode_simple_response", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            black_box(encoder.encode(ResponseHead::new(&message, 12, None), &mut bytes).unwrap());
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
    let handler = &Arc::new(make_handler(test_handler));
    let config = &ConnectionConfig::default();
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

    c.bench_function("process_simple_request", |b| {
        b.to_async(&runtime).iter(|| async move {
            let mock_io = MockIO::new(request.to_vec());
            let (reader, writer) = (mock_io.clone(), mock_io);
            let connection = HttpConnection::new(reader, writer, config);
            black_box(connection.process(handler.clone()).await.unwrap());
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_multipart_decoder, bench_response_encoder, bench_http_connection);
criterion_main!(benches);
