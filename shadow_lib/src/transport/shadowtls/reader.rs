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

use super::{
	frame::{parse_header, HEADER_LEN},
	Error, FramePart,
};
use crate::{prelude::*, utils::poll_read_exact};
use futures::ready;
use std::{
	cmp::min,
	io,
	task::{Context, Poll},
};
use tokio::io::ReadBuf;

enum ReadState {
	/// `pos` bytes of `header` are already read.
	AwaitingHeader {
		header: [u8; HEADER_LEN],
		pos: usize,
	},
	/// Number of body bytes not yet delivered, never 0.
	ConsumingBody(usize),
	Closed,
}

impl ReadState {
	#[inline]
	fn awaiting_header() -> Self {
		ReadState::AwaitingHeader {
			header: [0; HEADER_LEN],
			pos: 0,
		}
	}
}

/// Read side of a [`ShadowTlsStream`](super::ShadowTlsStream).
///
/// Headers are never exposed to the caller. A frame larger than the
/// caller's buffer is delivered over several reads. Tags are not
/// stripped, the first frame sent by the remote is delivered as is.
pub struct FrameReader {
	state: ReadState,
}

impl FrameReader {
	#[must_use]
	pub fn new() -> Self {
		Self {
			state: ReadState::awaiting_header(),
		}
	}

	/// Returns `true` if the reader is at a frame boundary.
	#[must_use]
	pub fn is_awaiting_header(&self) -> bool {
		matches!(self.state, ReadState::AwaitingHeader { pos: 0, .. })
	}

	/// Poll read payload bytes from `reader` into `buf`.
	///
	/// Nothing is filled into `buf` on EOF at a frame boundary.
	///
	/// # Errors
	///
	/// The error is always a [`Error`] wrapped in [`io::Error`].
	/// After an error the reader is closed and every following call fails.
	pub fn poll_read<R>(
		&mut self,
		mut reader: Pin<&mut R>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>>
	where
		R: AsyncRead + ?Sized,
	{
		if buf.remaining() == 0 {
			return Poll::Ready(Ok(()));
		}
		loop {
			match &mut self.state {
				ReadState::AwaitingHeader { header, pos } => {
					let res = ready!(poll_read_exact(reader.as_mut(), cx, header, pos));
					let len = match res {
						Ok(0) => {
							trace!("shadow-tls EOF reached at frame boundary");
							return Poll::Ready(Ok(()));
						}
						Ok(_) => parse_header(header),
						Err(e) => Err(Error::Read {
							part: FramePart::Header,
							source: e,
						}),
					};
					match len {
						Ok(0) => {
							trace!("Skipping empty shadow-tls frame");
							self.state = ReadState::awaiting_header();
						}
						Ok(len) => {
							trace!("shadow-tls frame with {} bytes body", len);
							self.state = ReadState::ConsumingBody(len.into());
						}
						Err(e) => {
							self.state = ReadState::Closed;
							return Poll::Ready(Err(e.into()));
						}
					}
				}
				ReadState::ConsumingBody(remaining) => {
					let remaining = *remaining;
					let (n, res) = poll_read_body(reader.as_mut(), cx, buf, remaining);
					if let Err(e) = res {
						self.state = ReadState::Closed;
						return Poll::Ready(Err(Error::Read {
							part: FramePart::Body,
							source: e,
						}
						.into()));
					}
					if n == 0 {
						return Poll::Pending;
					}
					self.state = if n == remaining {
						ReadState::awaiting_header()
					} else {
						ReadState::ConsumingBody(remaining - n)
					};
					return Poll::Ready(Ok(()));
				}
				ReadState::Closed => return Poll::Ready(Err(Error::Closed("read").into())),
			}
		}
	}
}

impl Default for FrameReader {
	fn default() -> Self {
		Self::new()
	}
}

/// Read up to `remaining` bytes into `buf`, retrying short reads
/// while the inner reader is ready.
///
/// Returns the number of bytes filled and whether an error is met before
/// any byte is filled. `(0, Ok(()))` means the inner reader is pending.
fn poll_read_body<R>(
	mut reader: Pin<&mut R>,
	cx: &mut Context<'_>,
	buf: &mut ReadBuf<'_>,
	remaining: usize,
) -> (usize, io::Result<()>)
where
	R: AsyncRead + ?Sized,
{
	let limit = min(remaining, buf.remaining());
	let mut filled = 0;
	while filled < limit {
		let n = {
			let mut dst = ReadBuf::new(buf.initialize_unfilled_to(limit - filled));
			match reader.as_mut().poll_read(cx, &mut dst) {
				Poll::Ready(Ok(())) => dst.filled().len(),
				Poll::Ready(Err(e)) => {
					if filled > 0 {
						break;
					}
					return (0, Err(e));
				}
				Poll::Pending => break,
			}
		};
		if n == 0 {
			if filled > 0 {
				break;
			}
			return (0, Err(io::ErrorKind::UnexpectedEof.into()));
		}
		buf.advance(n);
		filled += n;
	}
	(filled, Ok(()))
}
