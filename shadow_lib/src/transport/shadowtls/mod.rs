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

//! Stream disguise transport in the style of shadow-tls (v1).
//!
//! A real TLS handshake is done with the server first, so that the
//! connection looks like a TLS session. The handshake is only a costume:
//! the server certificate is **not** verified.
//! After that, bytes are sent as TLS application data records:
//!
//! ```plain
//! First frame:
//! +------+------+------+---------+---------+-----------+
//! | 0x17 | 0x03 | 0x03 | len: u16 (BE)     | tag (8B)  | payload ...
//! +------+------+------+---------+---------+-----------+
//!
//! Other frames:
//! +------+------+------+---------+---------+
//! | 0x17 | 0x03 | 0x03 | len: u16 (BE)     | payload ...
//! +------+------+------+---------+---------+
//! ```
//!
//! `tag` is the first 8 bytes of HMAC-SHA1 keyed with the password over
//! every byte received from the server during the handshake.
//! Payload in a frame is at most [`CHUNK_SIZE`] bytes.

mod error;
mod frame;
mod handshake;
mod hashed;
mod reader;
mod stream;
mod writer;

pub use error::{ConfigError, Error, FramePart};
pub use frame::{CHUNK_SIZE, HEADER_LEN, RECORD_MAGIC};
pub use handshake::{Handshake, TlsHandshake};
pub use hashed::{HashedStream, KeyedHash, Tag, TAG_LEN};
pub use reader::FrameReader;
pub use stream::ShadowTlsStream;
pub use writer::FrameWriter;

use crate::{
	prelude::*,
	protocol::{BytesStream, GetProtocolName},
};
use smol_str::SmolStr;
use std::io;
use tokio::net::TcpStream;
use tokio_rustls::rustls::{ClientConfig, ServerName};

pub const PROTOCOL_NAME: &str = "shadow-tls";

const MAX_ALPN_LEN: usize = 255;

// ----------------------------------------------------
//                    Outbound
// ----------------------------------------------------

pub struct Outbound {
	config: Arc<ClientConfig>,
	server_name: Arc<str>,
	tls_name: ServerName,
	hasher: KeyedHash,
}

impl Outbound {
	/// Dial `addr` (`host:port`) and wrap the connection.
	///
	/// # Errors
	///
	/// Returns an error if the TCP connection cannot be established.
	pub async fn connect(&self, addr: &str) -> io::Result<BytesStream> {
		let stream = TcpStream::connect(addr).await?;
		debug!(
			"Connected to {} for shadow-tls ({})",
			addr, self.server_name
		);
		Ok(Box::new(self.connect_stream(stream)?))
	}

	/// Wrap an established connection.
	///
	/// No IO is done here, the disguise handshake runs on the first write.
	///
	/// # Errors
	///
	/// Returns an error if the TLS session cannot be created.
	pub fn connect_stream<IO>(&self, stream: IO) -> io::Result<ShadowTlsStream<IO>>
	where
		IO: AsyncRead + AsyncWrite + Unpin,
	{
		let handshake = TlsHandshake::new(self.config.clone(), self.tls_name.clone())?;
		Ok(ShadowTlsStream::new(
			stream,
			self.server_name.clone(),
			self.hasher.clone(),
			handshake,
		))
	}

	#[inline]
	#[must_use]
	pub fn server_name(&self) -> &str {
		&self.server_name
	}
}

impl GetProtocolName for Outbound {
	#[inline]
	fn protocol_name(&self) -> &'static str {
		PROTOCOL_NAME
	}
}

// ----------------------------------------------------
//                    OutboundBuilder
// ----------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
	feature = "use_serde",
	derive(serde::Deserialize),
	serde(deny_unknown_fields)
)]
pub struct OutboundBuilder {
	/// Name sent as SNI in the disguise handshake.
	pub server_name: String,
	pub password: String,
	#[cfg_attr(feature = "use_serde", serde(default))]
	pub alpns: Vec<SmolStr>,
}

impl OutboundBuilder {
	/// Create a new [`Outbound`].
	///
	/// # Errors
	///
	/// Returns a [`ConfigError`] if there are errors in the configuration.
	pub fn build(self) -> Result<Outbound, ConfigError> {
		debug!(
			"Building shadow-tls outbound with server_name '{}', alpns '{:?}'",
			self.server_name, self.alpns
		);
		let tls_name = handshake::parse_server_name(&self.server_name)?;
		if self.password.is_empty() {
			return Err(ConfigError::EmptyPassword);
		}
		if let Some(alpn) = self.alpns.iter().find(|a| a.len() > MAX_ALPN_LEN) {
			return Err(ConfigError::AlpnTooLong(alpn.as_bytes().to_vec()));
		}
		let hasher = KeyedHash::new(self.password.as_bytes())?;
		let config =
			handshake::new_client_config(self.alpns.iter().map(|a| a.as_bytes().to_vec()).collect())?;
		Ok(Outbound {
			config,
			server_name: self.server_name.into(),
			tls_name,
			hasher,
		})
	}
}
