/**********************************************************************

Copyright (C) 2021 by reddal

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.

**********************************************************************/

use super::ConfigError;
use crate::prelude::*;
use futures::ready;
use std::{
	io,
	task::{Context, Poll},
	time::SystemTime,
};
use tokio::io::ReadBuf;
use tokio_rustls::rustls::{
	self,
	client::{ServerCertVerified, ServerCertVerifier},
	Certificate, ClientConfig, ClientConnection, ServerName,
};

/// A handshake relayed over the underlying connection before any frame is written.
///
/// The caller wraps the connection so that every byte read during
/// [`Handshake::poll_handshake`] is hashed into the tag.
pub trait Handshake: Unpin {
	/// Drive the handshake until it is finished.
	///
	/// Returns `Poll::Ready(Ok(()))` once it is done. Any error is final,
	/// the handshake will not be polled again.
	///
	/// # Errors
	///
	/// Returns an error if the handshake is rejected or any IO error occurred.
	fn poll_handshake<S>(&mut self, stream: &mut S, cx: &mut Context<'_>) -> Poll<io::Result<()>>
	where
		S: AsyncRead + AsyncWrite + Unpin;
}

/// A real TLS client handshake done with rustls.
///
/// **The server certificate is never verified.** The handshake is only
/// there so that the connection looks like a TLS session to anyone watching,
/// it says nothing about who the remote is. Do not "fix" this by enabling
/// verification, the server side relays the handshake to whatever website it
/// imitates, so the certificate usually won't match anyway.
pub struct TlsHandshake {
	conn: ClientConnection,
}

impl TlsHandshake {
	/// # Errors
	///
	/// Returns an error if rustls cannot start a client session with `config`.
	pub fn new(config: Arc<ClientConfig>, server_name: ServerName) -> io::Result<Self> {
		let conn = ClientConnection::new(config, server_name)
			.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
		Ok(Self { conn })
	}
}

impl Handshake for TlsHandshake {
	fn poll_handshake<S>(&mut self, stream: &mut S, cx: &mut Context<'_>) -> Poll<io::Result<()>>
	where
		S: AsyncRead + AsyncWrite + Unpin,
	{
		loop {
			while self.conn.wants_write() {
				let n = match self.conn.write_tls(&mut SyncIo::new(&mut *stream, &mut *cx)) {
					Ok(n) => n,
					Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Poll::Pending,
					Err(e) => return Poll::Ready(Err(e)),
				};
				if n == 0 {
					return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
				}
				trace!("Disguise handshake sent {} bytes", n);
			}
			ready!(Pin::new(&mut *stream).poll_flush(cx))?;

			if !self.conn.is_handshaking() {
				debug!(
					"Disguise handshake done ({:?})",
					self.conn.protocol_version()
				);
				return Poll::Ready(Ok(()));
			}

			let n = match self.conn.read_tls(&mut SyncIo::new(&mut *stream, &mut *cx)) {
				Ok(n) => n,
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Poll::Pending,
				Err(e) => return Poll::Ready(Err(e)),
			};
			if n == 0 {
				return Poll::Ready(Err(io::Error::new(
					io::ErrorKind::UnexpectedEof,
					"connection closed during disguise handshake",
				)));
			}
			trace!("Disguise handshake received {} bytes", n);
			if let Err(e) = self.conn.process_new_packets() {
				return Poll::Ready(Err(io::Error::new(io::ErrorKind::InvalidData, e)));
			}
		}
	}
}

/// Create the rustls config used by every disguise handshake.
///
/// Only TLS 1.2 is offered. With TLS 1.3 the server keeps sending
/// records after the client is done, which would end up in the frames.
///
/// # Errors
///
/// Returns [`ConfigError::Tls`] if rustls rejects the protocol versions.
pub fn new_client_config(alpns: Vec<Vec<u8>>) -> Result<Arc<ClientConfig>, ConfigError> {
	let mut config = ClientConfig::builder()
		.with_safe_default_cipher_suites()
		.with_safe_default_kx_groups()
		.with_protocol_versions(&[&rustls::version::TLS12])?
		.with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
		.with_no_client_auth();
	config.alpn_protocols = alpns;
	Ok(Arc::new(config))
}

/// Parse the name advertised in the ClientHello.
///
/// # Errors
///
/// Returns an error if `name` is empty or is neither a DNS name nor an IP.
pub fn parse_server_name(name: &str) -> Result<ServerName, ConfigError> {
	if name.is_empty() {
		return Err(ConfigError::EmptyServerName);
	}
	if let Ok(ip) = IpAddr::from_str(name) {
		return Ok(ServerName::IpAddress(ip));
	}
	ServerName::try_from(name).map_err(|_| ConfigError::InvalidServerName(name.into()))
}

/// Accepts any certificate.
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
	fn verify_server_cert(
		&self,
		_end_entity: &Certificate,
		_intermediates: &[Certificate],
		_server_name: &ServerName,
		_scts: &mut dyn Iterator<Item = &[u8]>,
		_ocsp_response: &[u8],
		_now: SystemTime,
	) -> Result<ServerCertVerified, rustls::Error> {
		Ok(ServerCertVerified::assertion())
	}
}

/// Blocking style [`io::Read`] and [`io::Write`] over an async stream for rustls.
///
/// `Poll::Pending` is turned into [`io::ErrorKind::WouldBlock`].
struct SyncIo<'a, 'b, S> {
	io: &'a mut S,
	cx: &'a mut Context<'b>,
}

impl<'a, 'b, S> SyncIo<'a, 'b, S> {
	#[inline]
	fn new(io: &'a mut S, cx: &'a mut Context<'b>) -> Self {
		Self { io, cx }
	}
}

impl<S: AsyncRead + Unpin> io::Read for SyncIo<'_, '_, S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let mut read_buf = ReadBuf::new(buf);
		match Pin::new(&mut *self.io).poll_read(self.cx, &mut read_buf) {
			Poll::Ready(Ok(())) => Ok(read_buf.filled().len()),
			Poll::Ready(Err(e)) => Err(e),
			Poll::Pending => Err(io::ErrorKind::WouldBlock.into()),
		}
	}
}

impl<S: AsyncWrite + Unpin> io::Write for SyncIo<'_, '_, S> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match Pin::new(&mut *self.io).poll_write(self.cx, buf) {
			Poll::Ready(res) => res,
			Poll::Pending => Err(io::ErrorKind::WouldBlock.into()),
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match Pin::new(&mut *self.io).poll_flush(self.cx) {
			Poll::Ready(res) => res,
			Poll::Pending => Err(io::ErrorKind::WouldBlock.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::run_async;
	use futures::future::poll_fn;

	fn new_handshake(name: &str) -> TlsHandshake {
		let config = new_client_config(vec![b"h2".to_vec()]).unwrap();
		TlsHandshake::new(config, parse_server_name(name).unwrap()).unwrap()
	}

	#[test]
	fn test_parse_server_name() {
		assert!(parse_server_name("example.com").is_ok());
		assert!(matches!(
			parse_server_name("127.0.0.1").unwrap(),
			ServerName::IpAddress(_)
		));
		assert!(matches!(
			parse_server_name(""),
			Err(ConfigError::EmptyServerName)
		));
		assert!(matches!(
			parse_server_name("not a name"),
			Err(ConfigError::InvalidServerName(_))
		));
	}

	#[test]
	fn test_client_hello_on_wire() {
		run_async(async {
			let (mut client, mut server) = tokio::io::duplex(64 * 1024);
			let server_task = tokio::spawn(async move {
				let mut buf = vec![0_u8; 4096];
				let n = server.read(&mut buf).await.unwrap();
				buf.truncate(n);
				// Close without answering.
				drop(server);
				buf
			});

			let mut hs = new_handshake("example.com");
			let err = poll_fn(|cx| hs.poll_handshake(&mut client, cx))
				.await
				.unwrap_err();
			assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

			let hello = server_task.await.unwrap();
			// TLS handshake record carrying a ClientHello.
			assert_eq!(hello[0], 0x16);
			assert_eq!(hello[1], 0x03);
			assert_eq!(hello[5], 0x01);
			let sni = b"example.com";
			assert!(hello.windows(sni.len()).any(|w| w == sni));
			assert!(hello.windows(2).any(|w| w == b"h2"));
		});
	}

	#[test]
	fn test_garbage_response() {
		run_async(async {
			let (mut client, mut server) = tokio::io::duplex(64 * 1024);
			let server_task = tokio::spawn(async move {
				let mut buf = vec![0_u8; 4096];
				let _ = server.read(&mut buf).await.unwrap();
				server
					.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n")
					.await
					.unwrap();
				server
			});

			let mut hs = new_handshake("example.com");
			let err = poll_fn(|cx| hs.poll_handshake(&mut client, cx))
				.await
				.unwrap_err();
			assert_eq!(err.kind(), io::ErrorKind::InvalidData);
			drop(server_task.await.unwrap());
		});
	}
}

/// A handshake that writes `request` then reads back exactly
/// as many bytes as `response` can hold.
#[cfg(test)]
pub struct ScriptedHandshake {
	request: Vec<u8>,
	written: usize,
	response: Vec<u8>,
	read: usize,
}

#[cfg(test)]
impl ScriptedHandshake {
	pub fn new(request: &[u8], response_len: usize) -> Self {
		Self {
			request: request.to_vec(),
			written: 0,
			response: vec![0; response_len],
			read: 0,
		}
	}
}

#[cfg(test)]
impl Handshake for ScriptedHandshake {
	fn poll_handshake<S>(&mut self, stream: &mut S, cx: &mut Context<'_>) -> Poll<io::Result<()>>
	where
		S: AsyncRead + AsyncWrite + Unpin,
	{
		use crate::utils::{poll_read_exact, poll_write_all};

		ready!(poll_write_all(
			Pin::new(&mut *stream),
			cx,
			&mut self.written,
			&self.request
		))?;
		ready!(Pin::new(&mut *stream).poll_flush(cx))?;
		if !self.response.is_empty() {
			let n = ready!(poll_read_exact(
				Pin::new(&mut *stream),
				cx,
				&mut self.response,
				&mut self.read
			))?;
			if n == 0 {
				return Poll::Ready(Err(io::ErrorKind::UnexpectedEof.into()));
			}
		}
		Poll::Ready(Ok(()))
	}
}
