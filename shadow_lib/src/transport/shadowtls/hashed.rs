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
use futures::ready;
use hmac::{Hmac, Mac, NewMac};
use sha1::Sha1;
use std::{
	io,
	pin::Pin,
	task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

type HmacSha1 = Hmac<Sha1>;

/// Length of the tag in the first frame.
pub const TAG_LEN: usize = 8;

/// Truncated HMAC of the handshake bytes sent by the remote.
pub type Tag = [u8; TAG_LEN];

/// HMAC-SHA1 keyed with the shadow-tls password.
///
/// Create one with [`KeyedHash::new`] and clone it for every connection,
/// the key schedule is only computed once.
#[derive(Clone)]
pub struct KeyedHash(HmacSha1);

impl KeyedHash {
	/// # Errors
	///
	/// Returns [`ConfigError::InvalidKey`] if `key` cannot be used as a HMAC key.
	pub fn new(key: &[u8]) -> Result<Self, ConfigError> {
		HmacSha1::new_from_slice(key)
			.map(Self)
			.map_err(|e| ConfigError::InvalidKey(e.to_string()))
	}

	#[inline]
	pub fn update(&mut self, data: &[u8]) {
		self.0.update(data);
	}

	/// Consume the hash and return the first [`TAG_LEN`] bytes of the digest.
	#[must_use]
	pub fn finish(self) -> Tag {
		let digest = self.0.finalize().into_bytes();
		let mut tag = Tag::default();
		tag.copy_from_slice(&digest[..TAG_LEN]);
		tag
	}
}

/// A stream that feeds every byte read from `inner` into a [`KeyedHash`].
///
/// Writing is passed through and is not hashed.
pub struct HashedStream<'a, S: ?Sized> {
	inner: &'a mut S,
	hasher: &'a mut KeyedHash,
}

impl<'a, S: ?Sized> HashedStream<'a, S> {
	#[inline]
	pub fn new(inner: &'a mut S, hasher: &'a mut KeyedHash) -> Self {
		Self { inner, hasher }
	}
}

impl<S> AsyncRead for HashedStream<'_, S>
where
	S: AsyncRead + Unpin + ?Sized,
{
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		let me = self.get_mut();
		let prev_len = buf.filled().len();
		ready!(Pin::new(&mut *me.inner).poll_read(cx, buf))?;
		me.hasher.update(&buf.filled()[prev_len..]);
		Poll::Ready(Ok(()))
	}
}

impl<S> AsyncWrite for HashedStream<'_, S>
where
	S: AsyncWrite + Unpin + ?Sized,
{
	#[inline]
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		src: &[u8],
	) -> Poll<io::Result<usize>> {
		Pin::new(&mut *self.get_mut().inner).poll_write(cx, src)
	}

	#[inline]
	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut *self.get_mut().inner).poll_flush(cx)
	}

	#[inline]
	fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Pin::new(&mut *self.get_mut().inner).poll_shutdown(cx)
	}
}
