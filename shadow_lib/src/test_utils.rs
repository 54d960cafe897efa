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

use crate::prelude::*;
use futures::Future;
use std::{
	io,
	task::{Context, Poll},
};
use tokio::io::ReadBuf;

pub fn init_log() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// Run `f` to completion on a fresh runtime.
pub fn run_async<F: Future>(f: F) -> F::Output {
	init_log();
	let rt = tokio::runtime::Runtime::new().unwrap();
	rt.block_on(f)
}

/// An in-memory stream that never moves more than `max` bytes per call.
///
/// Reads are served from `data`, writes are collected into `written`.
/// If `pending` is set, every other call returns `Poll::Pending` first,
/// which is used to check that states survive between polls.
pub struct ChoppedStream {
	data: Vec<u8>,
	pos: usize,
	max: usize,
	written: Vec<u8>,
	pending: bool,
	yielded: bool,
}

impl ChoppedStream {
	pub fn new(data: Vec<u8>, max: usize) -> Self {
		Self {
			data,
			pos: 0,
			max,
			written: Vec::new(),
			pending: false,
			yielded: false,
		}
	}

	pub fn with_pending(mut self) -> Self {
		self.pending = true;
		self
	}

	pub fn written(&self) -> &[u8] {
		&self.written
	}

	pub fn remaining(&self) -> usize {
		self.data.len() - self.pos
	}

	fn yield_once(&mut self, cx: &mut Context<'_>) -> bool {
		if self.pending && !self.yielded {
			self.yielded = true;
			cx.waker().wake_by_ref();
			return true;
		}
		self.yielded = false;
		false
	}
}

impl AsyncRead for ChoppedStream {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		let me = self.get_mut();
		if me.yield_once(cx) {
			return Poll::Pending;
		}
		let len = me.max.min(buf.remaining()).min(me.remaining());
		buf.put_slice(&me.data[me.pos..me.pos + len]);
		me.pos += len;
		Poll::Ready(Ok(()))
	}
}

impl AsyncWrite for ChoppedStream {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		src: &[u8],
	) -> Poll<io::Result<usize>> {
		let me = self.get_mut();
		if me.yield_once(cx) {
			return Poll::Pending;
		}
		let len = me.max.min(src.len());
		me.written.extend_from_slice(&src[..len]);
		Poll::Ready(Ok(len))
	}

	fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}

	fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}
}
