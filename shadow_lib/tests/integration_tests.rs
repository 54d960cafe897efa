mod common;

use common::{new_acceptor, setup_logger, RecordingStream};
use futures::future::poll_fn;
use shadow_lib::transport::shadowtls::{
	Error, FrameReader, KeyedHash, OutboundBuilder, Tag, HEADER_LEN, RECORD_MAGIC, TAG_LEN,
};
use std::io;
use tokio::{
	io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf},
	net::{TcpListener, TcpStream},
};
use tokio_rustls::rustls;

const SERVER_NAME: &str = "example.com";
const PASSWORD: &str = "hunter2";

fn new_outbound() -> shadow_lib::transport::shadowtls::Outbound {
	OutboundBuilder {
		server_name: SERVER_NAME.into(),
		password: PASSWORD.into(),
		alpns: vec!["h2".into()],
	}
	.build()
	.unwrap()
}

fn tag_of(handshake: &[u8]) -> Tag {
	let mut hasher = KeyedHash::new(PASSWORD.as_bytes()).unwrap();
	hasher.update(handshake);
	hasher.finish()
}

async fn read_frames<R: AsyncRead + Unpin>(stream: &mut R, len: usize) -> io::Result<Vec<u8>> {
	let mut reader = FrameReader::new();
	let mut result = Vec::new();
	let mut buf = vec![0_u8; 1000];
	while result.len() < len {
		let mut read_buf = ReadBuf::new(&mut buf);
		poll_fn(|cx| reader.poll_read(std::pin::Pin::new(&mut *stream), cx, &mut read_buf)).await?;
		let filled = read_buf.filled();
		if filled.is_empty() {
			break;
		}
		result.extend_from_slice(filled);
	}
	Ok(result)
}

/// Accept one connection, do a real TLS handshake, then
/// return everything written during the handshake, the first
/// `payload_len` decoded bytes (tag included) and the raw stream.
async fn serve_once(
	listener: TcpListener,
	payload_len: usize,
) -> (Vec<u8>, Vec<u8>, TcpStream) {
	let (stream, _) = listener.accept().await.unwrap();
	let acceptor = new_acceptor(&["h2"], &[&rustls::version::TLS12]);
	let tls = acceptor.accept(RecordingStream::new(stream)).await.unwrap();
	assert_eq!(tls.get_ref().1.alpn_protocol(), Some(&b"h2"[..]));
	let recording = tls.into_inner().0;
	let mut stream = recording.inner;
	let received = read_frames(&mut stream, TAG_LEN + payload_len)
		.await
		.unwrap();
	(recording.written, received, stream)
}

fn run<F: std::future::Future>(f: F) -> F::Output {
	setup_logger();
	tokio::runtime::Runtime::new().unwrap().block_on(f)
}

#[test]
fn test_tls_server_handshake() {
	run(async {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let server_addr = listener.local_addr().unwrap();
		let payload: Vec<u8> = (0..50_000_u32).map(|i| (i % 253) as u8).collect();
		let server = tokio::spawn(serve_once(listener, payload.len()));

		let outbound = new_outbound();
		let mut client = outbound
			.connect_stream(TcpStream::connect(server_addr).await.unwrap())
			.unwrap();
		assert_eq!(client.peer_addr().unwrap(), server_addr);
		assert_eq!(client.server_name(), SERVER_NAME);

		client.write_all(&payload).await.unwrap();
		client.flush().await.unwrap();
		assert!(client.is_handshake_done());

		let (handshake, received, mut server_stream) = server.await.unwrap();
		assert!(!handshake.is_empty());
		assert_eq!(&received[..TAG_LEN], &tag_of(&handshake));
		assert_eq!(&received[TAG_LEN..], payload.as_slice());

		// Reply with plain frames.
		let mut reply = RECORD_MAGIC.to_vec();
		reply.extend_from_slice(&4_u16.to_be_bytes());
		reply.extend_from_slice(b"pong");
		server_stream.write_all(&reply).await.unwrap();
		let mut buf = [0_u8; 16];
		let n = client.read(&mut buf).await.unwrap();
		assert_eq!(&buf[..n], b"pong");

		// A TLS record that is not application data is rejected.
		server_stream
			.write_all(&[0x15, 0x03, 0x03, 0x00, 0x02, 0x01, 0x00])
			.await
			.unwrap();
		let err = client.read(&mut buf).await.unwrap_err();
		assert!(Error::from_io(&err).unwrap().is_protocol_violation());
	});
}

#[test]
fn test_connect_boxed() {
	run(async {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let server_addr = listener.local_addr().unwrap();
		let server = tokio::spawn(serve_once(listener, 4));

		let mut client = new_outbound()
			.connect(&server_addr.to_string())
			.await
			.unwrap();
		client.write_all(b"ping").await.unwrap();
		client.flush().await.unwrap();

		let (handshake, received, _) = server.await.unwrap();
		assert_eq!(&received[..TAG_LEN], &tag_of(&handshake));
		assert_eq!(&received[TAG_LEN..], b"ping");
	});
}

#[test]
fn test_server_not_tls() {
	run(async {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let server_addr = listener.local_addr().unwrap();
		let server = tokio::spawn(async move {
			let (mut stream, _) = listener.accept().await.unwrap();
			let mut buf = [0_u8; HEADER_LEN];
			stream.read_exact(&mut buf).await.unwrap();
			// ClientHello
			assert_eq!(buf[0], 0x16);
			stream
				.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n")
				.await
				.unwrap();
			stream
		});

		let mut client = new_outbound()
			.connect(&server_addr.to_string())
			.await
			.unwrap();
		let err = client.write_all(b"ping").await.unwrap_err();
		assert!(matches!(Error::from_io(&err), Some(Error::Handshake(_))));
		drop(server.await.unwrap());
	});
}

#[test]
fn test_tls13_only_server() {
	run(async {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let server_addr = listener.local_addr().unwrap();
		let server = tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let acceptor = new_acceptor(&["h2"], &[&rustls::version::TLS13]);
			acceptor.accept(stream).await.is_err()
		});

		let mut client = new_outbound()
			.connect_stream(TcpStream::connect(server_addr).await.unwrap())
			.unwrap();
		let err = client.write_all(b"ping").await.unwrap_err();
		assert!(matches!(Error::from_io(&err), Some(Error::Handshake(_))));
		assert!(!client.is_handshake_done());
		assert!(server.await.unwrap());
	});
}
