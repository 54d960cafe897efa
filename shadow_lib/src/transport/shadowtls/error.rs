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

use std::{fmt, io};

/// Which part of a frame a reader was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePart {
	Header,
	Body,
}

impl fmt::Display for FramePart {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			FramePart::Header => "header",
			FramePart::Body => "body",
		})
	}
}

/// Errors of a [`ShadowTlsStream`](super::ShadowTlsStream).
///
/// They are returned as the inner error of an [`io::Error`],
/// use [`Error::from_io`] to get them back.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("shadow-tls cannot read frame {part} ({source})")]
	Read {
		part: FramePart,
		#[source]
		source: io::Error,
	},
	#[error("invalid shadow-tls header {0:02x?}")]
	InvalidHeader([u8; 3]),
	#[error("shadow-tls disguise handshake failed ({0})")]
	Handshake(#[source] io::Error),
	#[error("shadow-tls cannot write payload bytes {start}..{end} ({source})")]
	Write {
		start: usize,
		end: usize,
		#[source]
		source: io::Error,
	},
	#[error("shadow-tls {0} half already closed")]
	Closed(&'static str),
}

impl Error {
	/// Returns `true` if the peer does not speak the protocol.
	///
	/// The connection cannot be used anymore after this error.
	#[must_use]
	pub fn is_protocol_violation(&self) -> bool {
		matches!(self, Error::InvalidHeader(_))
	}

	/// Get the [`Error`] carried by an [`io::Error`] returned from
	/// a [`ShadowTlsStream`](super::ShadowTlsStream).
	#[must_use]
	pub fn from_io(err: &io::Error) -> Option<&Error> {
		err.get_ref().and_then(|e| e.downcast_ref::<Error>())
	}

	fn kind(&self) -> io::ErrorKind {
		match self {
			Error::Read { source, .. }
			| Error::Handshake(source)
			| Error::Write { source, .. } => source.kind(),
			Error::InvalidHeader(_) => io::ErrorKind::InvalidData,
			Error::Closed(_) => io::ErrorKind::BrokenPipe,
		}
	}
}

impl From<Error> for io::Error {
	#[inline]
	fn from(e: Error) -> Self {
		io::Error::new(e.kind(), e)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("empty server name")]
	EmptyServerName,
	#[error("invalid server name '{0}'")]
	InvalidServerName(String),
	#[error("empty password")]
	EmptyPassword,
	#[error("alpn '{0:?}' too long")]
	AlpnTooLong(Vec<u8>),
	#[error("invalid key ({0})")]
	InvalidKey(String),
	#[error("rustls error ({0})")]
	Tls(#[from] tokio_rustls::rustls::Error),
}
