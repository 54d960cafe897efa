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
	frame::{encode_frames, frame_at},
	Error, Handshake, HashedStream, KeyedHash, Tag,
};
use crate::{prelude::*, utils::poll_write_all};
use futures::ready;
use std::{
	io, mem,
	task::{Context, Poll},
};

enum WriteState<H> {
	HandshakePending { handshake: H, hasher: KeyedHash },
	/// Tag is `Some` until the first frame starts going out.
	HandshakeDone(Option<Tag>),
	Closed,
}

enum Progress {
	Idle,
	/// Part of `buf` is on the wire, the rest must follow
	/// before anything else is written.
	Writing {
		pos: usize,
		payload_len: usize,
		tagged: bool,
	},
}

/// Write side of a [`ShadowTlsStream`](super::ShadowTlsStream).
///
/// The disguise handshake is done on the first non-empty write,
/// its tag is put into the first frame.
///
/// A frame is never cut in half on the wire. If a write is cancelled
/// after a frame has been partly written, the rest of that frame is
/// written at the start of the next `poll_write`, `poll_flush` or
/// `poll_shutdown`.
pub struct FrameWriter<H> {
	state: WriteState<H>,
	progress: Progress,
	buf: Vec<u8>,
}

impl<H: Handshake> FrameWriter<H> {
	pub fn new(handshake: H, hasher: KeyedHash) -> Self {
		Self {
			state: WriteState::HandshakePending { handshake, hasher },
			progress: Progress::Idle,
			buf: Vec::new(),
		}
	}

	#[must_use]
	pub fn is_handshake_done(&self) -> bool {
		matches!(self.state, WriteState::HandshakeDone(_))
	}

	/// Returns `true` if the handshake has neither finished nor failed.
	#[must_use]
	pub fn is_handshake_pending(&self) -> bool {
		matches!(self.state, WriteState::HandshakePending { .. })
	}

	/// Poll write `src` as frames into `io`.
	///
	/// Returns `src.len()` once every frame is written.
	/// If `io` blocks after some frames have started going out,
	/// returns the number of bytes carried by those frames, which is
	/// never more than `src.len()`. Frames that have not started
	/// are dropped and the next call encodes from its own `src`.
	///
	/// # Errors
	///
	/// The error is always a [`Error`] wrapped in [`io::Error`].
	/// After an error the writer is closed and every following call fails.
	pub fn poll_write<IO>(
		&mut self,
		io: &mut IO,
		cx: &mut Context<'_>,
		src: &[u8],
	) -> Poll<io::Result<usize>>
	where
		IO: AsyncRead + AsyncWrite + Unpin,
	{
		ready!(self.poll_write_buf(io, cx))?;
		if src.is_empty() {
			if let WriteState::Closed = self.state {
				return Poll::Ready(Err(Error::Closed("write").into()));
			}
			return Poll::Ready(Ok(0));
		}
		let tag = loop {
			match &mut self.state {
				WriteState::HandshakePending { handshake, hasher } => {
					let res =
						ready!(handshake.poll_handshake(&mut HashedStream::new(&mut *io, hasher), cx));
					self.state = match (res, mem::replace(&mut self.state, WriteState::Closed)) {
						(Ok(()), WriteState::HandshakePending { hasher, .. }) => {
							debug!("shadow-tls disguise handshake finished");
							WriteState::HandshakeDone(Some(hasher.finish()))
						}
						(Err(e), _) => return Poll::Ready(Err(Error::Handshake(e).into())),
						(Ok(()), state) => state,
					};
				}
				WriteState::HandshakeDone(tag) => break *tag,
				WriteState::Closed => return Poll::Ready(Err(Error::Closed("write").into())),
			}
		};

		self.buf.clear();
		encode_frames(src, tag, &mut self.buf);
		self.progress = Progress::Writing {
			pos: 0,
			payload_len: src.len(),
			tagged: tag.is_some(),
		};
		match self.poll_write_buf(io, cx) {
			Poll::Ready(res) => Poll::Ready(res.map(|()| src.len())),
			Poll::Pending => match self.keep_started_frame() {
				0 => Poll::Pending,
				n => Poll::Ready(Ok(n)),
			},
		}
	}

	/// Write what is left in `buf`.
	fn poll_write_buf<IO>(&mut self, io: &mut IO, cx: &mut Context<'_>) -> Poll<io::Result<()>>
	where
		IO: AsyncWrite + Unpin,
	{
		let (pos, payload_len, tagged) = match &mut self.progress {
			Progress::Writing {
				pos,
				payload_len,
				tagged,
			} => (pos, *payload_len, *tagged),
			Progress::Idle => return Poll::Ready(Ok(())),
		};
		let res = ready!(poll_write_all(Pin::new(io), cx, pos, &self.buf));
		let pos = *pos;
		self.progress = Progress::Idle;
		match res {
			Ok(()) => {
				trace!(
					"shadow-tls wrote {} payload bytes in {} bytes",
					payload_len,
					self.buf.len()
				);
				self.tag_sent();
				Poll::Ready(Ok(()))
			}
			Err(e) => {
				let range = frame_at(pos, payload_len, tagged).payload;
				self.state = WriteState::Closed;
				Poll::Ready(Err(Error::Write {
					start: range.start,
					end: range.end,
					source: e,
				}
				.into()))
			}
		}
	}

	/// Called when `io` blocks in the middle of `buf`.
	///
	/// Drops the frames that have not started and returns the number of
	/// payload bytes in the frames that have.
	fn keep_started_frame(&mut self) -> usize {
		let (pos, payload_len, tagged) = match self.progress {
			Progress::Writing {
				pos,
				payload_len,
				tagged,
			} => (pos, payload_len, tagged),
			Progress::Idle => return 0,
		};
		let frame = frame_at(pos, payload_len, tagged);
		let (accepted, end) = if pos == frame.encoded.start {
			(frame.payload.start, pos)
		} else {
			(frame.payload.end, frame.encoded.end)
		};
		self.buf.truncate(end);
		if pos == end {
			self.progress = Progress::Idle;
		}
		if pos > 0 {
			self.tag_sent();
		}
		accepted
	}

	fn tag_sent(&mut self) {
		if let WriteState::HandshakeDone(tag) = &mut self.state {
			*tag = None;
		}
	}

	/// Finish the frame cut short by a cancelled write, then flush the inner writer.
	///
	/// # Errors
	///
	/// Returns the error of the inner writer.
	pub fn poll_flush<IO>(&mut self, io: &mut IO, cx: &mut Context<'_>) -> Poll<io::Result<()>>
	where
		IO: AsyncWrite + Unpin,
	{
		ready!(self.poll_write_buf(io, cx))?;
		Pin::new(io).poll_flush(cx)
	}

	/// Finish the frame cut short by a cancelled write, then close the
	/// write side and shut down the inner writer.
	///
	/// # Errors
	///
	/// Returns the error of the inner writer.
	pub fn poll_shutdown<IO>(&mut self, io: &mut IO, cx: &mut Context<'_>) -> Poll<io::Result<()>>
	where
		IO: AsyncWrite + Unpin,
	{
		ready!(self.poll_write_buf(io, cx))?;
		self.state = WriteState::Closed;
		Pin::new(io).poll_shutdown(cx)
	}
}
