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

use super::{FrameReader, FrameWriter, Handshake, KeyedHash, TlsHandshake};
use crate::{
	prelude::*,
	protocol::{AsyncReadWrite, BoxRead, BoxWrite},
};
use std::{
	io,
	task::{Context, Poll, Waker},
};
use tokio::io::ReadBuf;

/// A stream that looks like a TLS session to anyone watching the wire.
///
/// The disguise handshake is done lazily on the first non-empty write.
/// After that, every write is sent as TLS application data records,
/// the first one carrying the authentication tag.
///
/// Read side and write side keep separate states, so the stream can be
/// split with [`tokio::io::split`] and used by two tasks.
/// Reading waits until the handshake is over, otherwise the handshake
/// response would be taken for frames. So a stream that is never written
/// to can never be read.
pub struct ShadowTlsStream<IO, H = TlsHandshake> {
	inner: IO,
	server_name: Arc<str>,
	reader: FrameReader,
	writer: FrameWriter<H>,
	/// Reader waiting for the handshake.
	read_waker: Option<Waker>,
}

impl<IO, H: Handshake> ShadowTlsStream<IO, H> {
	/// Wrap `inner`. No IO is done until the first write.
	///
	/// `hasher` must be freshly keyed with the password and never used before.
	pub fn new(inner: IO, server_name: Arc<str>, hasher: KeyedHash, handshake: H) -> Self {
		Self {
			inner,
			server_name,
			reader: FrameReader::new(),
			writer: FrameWriter::new(handshake, hasher),
			read_waker: None,
		}
	}

	/// Name advertised in the disguise handshake.
	#[inline]
	pub fn server_name(&self) -> &str {
		&self.server_name
	}

	#[inline]
	pub fn is_handshake_done(&self) -> bool {
		self.writer.is_handshake_done()
	}

	#[inline]
	pub fn get_ref(&self) -> &IO {
		&self.inner
	}

	/// Reading or writing `inner` directly will corrupt the stream.
	#[inline]
	pub fn get_mut(&mut self) -> &mut IO {
		&mut self.inner
	}

	#[inline]
	pub fn into_inner(self) -> IO {
		self.inner
	}

	fn wake_reader(&mut self) {
		if !self.writer.is_handshake_pending() {
			if let Some(waker) = self.read_waker.take() {
				waker.wake();
			}
		}
	}
}

impl<H: Handshake> ShadowTlsStream<tokio::net::TcpStream, H> {
	/// # Errors
	///
	/// Returns the error of the inner [`tokio::net::TcpStream`].
	#[inline]
	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.inner.local_addr()
	}

	/// # Errors
	///
	/// Returns the error of the inner [`tokio::net::TcpStream`].
	#[inline]
	pub fn peer_addr(&self) -> io::Result<SocketAddr> {
		self.inner.peer_addr()
	}
}

impl<IO, H> AsyncRead for ShadowTlsStream<IO, H>
where
	IO: AsyncRead + Unpin,
	H: Handshake,
{
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		let me = self.get_mut();
		if me.writer.is_handshake_pending() {
			me.read_waker = Some(cx.waker().clone());
			return Poll::Pending;
		}
		me.reader.poll_read(Pin::new(&mut me.inner), cx, buf)
	}
}

impl<IO, H> AsyncWrite for ShadowTlsStream<IO, H>
where
	IO: AsyncRead + AsyncWrite + Unpin,
	H: Handshake,
{
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		src: &[u8],
	) -> Poll<io::Result<usize>> {
		let me = self.get_mut();
		let res = me.writer.poll_write(&mut me.inner, cx, src);
		me.wake_reader();
		res
	}

	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		let me = self.get_mut();
		me.writer.poll_flush(&mut me.inner, cx)
	}

	fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		let me = self.get_mut();
		let res = me.writer.poll_shutdown(&mut me.inner, cx);
		me.wake_reader();
		res
	}
}

impl<IO, H> AsyncReadWrite for ShadowTlsStream<IO, H>
where
	IO: 'static + AsyncRead + AsyncWrite + Unpin + Send + Sync,
	H: 'static + Handshake + Send + Sync,
{
	fn split(self: Box<Self>) -> (BoxRead, BoxWrite) {
		let (r, w) = tokio::io::split(*self);
		(Box::new(r), Box::new(w))
	}
}
