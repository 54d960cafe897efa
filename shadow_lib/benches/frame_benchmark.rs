use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use futures::future::poll_fn;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use shadow_lib::transport::shadowtls::{FrameReader, Handshake, KeyedHash, ShadowTlsStream};
use std::{
	io,
	pin::Pin,
	task::{Context, Poll},
};
use tokio::{
	io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf},
	runtime::Runtime,
};

const PAYLOAD_LEN: usize = 64 * 1024;

/// Finishes immediately without any IO.
struct NoHandshake;

impl Handshake for NoHandshake {
	fn poll_handshake<S>(&mut self, _stream: &mut S, _cx: &mut Context<'_>) -> Poll<io::Result<()>>
	where
		S: AsyncRead + AsyncWrite + Unpin,
	{
		Poll::Ready(Ok(()))
	}
}

/// Collects everything written, reads nothing.
#[derive(Default)]
struct Collector(Vec<u8>);

impl AsyncRead for Collector {
	fn poll_read(
		self: Pin<&mut Self>,
		_cx: &mut Context<'_>,
		_buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}
}

impl AsyncWrite for Collector {
	fn poll_write(
		self: Pin<&mut Self>,
		_cx: &mut Context<'_>,
		src: &[u8],
	) -> Poll<io::Result<usize>> {
		self.get_mut().0.extend_from_slice(src);
		Poll::Ready(Ok(src.len()))
	}

	fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}

	fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}
}

fn new_stream() -> ShadowTlsStream<Collector, NoHandshake> {
	ShadowTlsStream::new(
		Collector::default(),
		"example.com".into(),
		KeyedHash::new(b"password").unwrap(),
		NoHandshake,
	)
}

async fn encode(payload: &[u8]) -> Vec<u8> {
	let mut stream = new_stream();
	stream.write_all(payload).await.unwrap();
	stream.into_inner().0
}

async fn decode(mut encoded: &[u8], buf: &mut [u8]) -> usize {
	let mut reader = FrameReader::new();
	let mut total = 0;
	loop {
		let mut read_buf = ReadBuf::new(buf);
		poll_fn(|cx| reader.poll_read(Pin::new(&mut encoded), cx, &mut read_buf))
			.await
			.unwrap();
		let n = read_buf.filled().len();
		if n == 0 {
			return total;
		}
		total += n;
	}
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let rt = Runtime::new().unwrap();
	let mut payload = vec![0_u8; PAYLOAD_LEN];
	StdRng::seed_from_u64(0).fill_bytes(&mut payload);

	let mut group = c.benchmark_group("shadowtls_frames");
	group.throughput(Throughput::Bytes(PAYLOAD_LEN as u64));
	group.bench_function("write_64k", |b| {
		b.iter(|| rt.block_on(encode(black_box(&payload))));
	});

	let encoded = rt.block_on(encode(&payload));
	for &buf_len in &[1500_usize, 16 * 1024] {
		let mut buf = vec![0_u8; buf_len];
		group.bench_function(format!("read_64k_buf_{}", buf_len), |b| {
			b.iter(|| rt.block_on(decode(black_box(&encoded), &mut buf)));
		});
	}
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
