use futures::ready;
use std::{
	io::{self, BufReader},
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::rustls;

const CERT_FILE: &str = "tests/data/cert.pem";
const KEY_FILE: &str = "tests/data/key.pem";

pub fn setup_logger() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// A TLS server with a self-signed certificate for `example.com`.
pub fn new_acceptor(
	alpns: &[&str],
	versions: &[&'static rustls::SupportedProtocolVersion],
) -> tokio_rustls::TlsAcceptor {
	let certs = {
		let f = std::fs::File::open(CERT_FILE).expect("cannot open cert file");
		rustls_pemfile::certs(&mut BufReader::new(f))
			.expect("cannot read cert file")
			.into_iter()
			.map(rustls::Certificate)
			.collect::<Vec<_>>()
	};
	let key = {
		let f = std::fs::File::open(KEY_FILE).expect("cannot open key file");
		rustls_pemfile::pkcs8_private_keys(&mut BufReader::new(f))
			.expect("cannot read key file")
			.into_iter()
			.map(rustls::PrivateKey)
			.next()
			.expect("no key in key file")
	};
	let mut config = rustls::ServerConfig::builder()
		.with_safe_default_cipher_suites()
		.with_safe_default_kx_groups()
		.with_protocol_versions(versions)
		.expect("invalid TLS versions")
		.with_no_client_auth()
		.with_single_cert(certs, key)
		.expect("invalid cert or key");
	config.alpn_protocols = alpns.iter().map(|a| a.as_bytes().to_vec()).collect();
	Arc::new(config).into()
}

/// Keeps a copy of everything written into `inner`.
pub struct RecordingStream<S> {
	pub inner: S,
	pub written: Vec<u8>,
}

impl<S> RecordingStream<S> {
	pub fn new(inner: S) -> Self {
		Self {
			inner,
			written: Vec::new(),
		}
	}
}

impl<S: AsyncRead + Unpin> AsyncRead for RecordingStream<S> {
	fn poll_read(
		mut self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		Pin::new(&mut self.inner).poll_read(cx, buf)
	}
}

impl<S: AsyncWrite + Unpin> AsyncWrite for RecordingStream<S> {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		src: &[u8],
	) -> Poll<io::Result<usize>> {
		let me = self.get_mut();
		let n = ready!(Pin::new(&mut me.inner).poll_write(cx, src))?;
		me.written.extend_from_slice(&src[..n]);
		Poll::Ready(Ok(n))
	}

	fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.inner).poll_flush(cx)
	}

	fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut self.inner).poll_shutdown(cx)
	}
}
