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

use super::{Error, Tag, TAG_LEN};
use bytes::BufMut;
use std::{cmp::min, ops::Range};

/// Record header of a TLS 1.2/1.3 application data record.
pub const RECORD_MAGIC: [u8; 3] = [0x17, 0x03, 0x03];
/// Magic followed by a big-endian u16 body length.
pub const HEADER_LEN: usize = RECORD_MAGIC.len() + 2;
/// Max payload length in one frame (not counting the tag).
pub const CHUNK_SIZE: usize = 1 << 13;

/// Check the magic and return the body length declared in `header`.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if the magic does not match.
pub fn parse_header(header: &[u8; HEADER_LEN]) -> Result<u16, Error> {
	let (magic, len) = header.split_at(RECORD_MAGIC.len());
	if magic != RECORD_MAGIC {
		return Err(Error::InvalidHeader([magic[0], magic[1], magic[2]]));
	}
	Ok(u16::from_be_bytes([len[0], len[1]]))
}

/// Append one frame carrying `chunk` to `buf`, with `tag` in front of it if any.
pub fn put_frame(buf: &mut impl BufMut, tag: Option<&Tag>, chunk: &[u8]) {
	debug_assert!(chunk.len() <= CHUNK_SIZE);
	let tag: &[u8] = tag.map_or(&[], |t| &t[..]);
	// At most CHUNK_SIZE + TAG_LEN.
	#[allow(clippy::cast_possible_truncation)]
	let len = (tag.len() + chunk.len()) as u16;
	buf.put_slice(&RECORD_MAGIC);
	buf.put_u16(len);
	buf.put_slice(tag);
	buf.put_slice(chunk);
}

/// Encode all of `src` into `buf`, one frame for every [`CHUNK_SIZE`] bytes.
///
/// `tag` goes into the first frame only.
pub fn encode_frames(src: &[u8], mut tag: Option<Tag>, buf: &mut Vec<u8>) {
	buf.reserve(encoded_len(src.len(), tag.is_some()));
	for chunk in src.chunks(CHUNK_SIZE) {
		put_frame(buf, tag.take().as_ref(), chunk);
	}
}

/// Number of bytes [`encode_frames`] produces for `payload_len` bytes.
#[must_use]
pub fn encoded_len(payload_len: usize, tagged: bool) -> usize {
	let frames = (payload_len + CHUNK_SIZE - 1) / CHUNK_SIZE;
	let tag_len = if tagged && frames > 0 { TAG_LEN } else { 0 };
	payload_len + frames * HEADER_LEN + tag_len
}

/// Where one frame of the [`encode_frames`] output lies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpan {
	/// Range of the payload carried by the frame.
	pub payload: Range<usize>,
	/// Range of the whole frame in the encoded buffer.
	pub encoded: Range<usize>,
}

/// Find the frame that byte `pos` of the encoded buffer belongs to.
///
/// If `pos` is past the last frame, both ranges are empty and
/// start at the end.
#[must_use]
pub fn frame_at(pos: usize, payload_len: usize, tagged: bool) -> FrameSpan {
	let mut encoded_start = 0;
	let mut tag_len = if tagged { TAG_LEN } else { 0 };
	for start in (0..payload_len).step_by(CHUNK_SIZE) {
		let end = min(start + CHUNK_SIZE, payload_len);
		let encoded_end = encoded_start + HEADER_LEN + tag_len + (end - start);
		if pos < encoded_end {
			return FrameSpan {
				payload: start..end,
				encoded: encoded_start..encoded_end,
			};
		}
		encoded_start = encoded_end;
		tag_len = 0;
	}
	FrameSpan {
		payload: payload_len..payload_len,
		encoded: encoded_start..encoded_start,
	}
}
