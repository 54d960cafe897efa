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

use crate::{prelude::*, protocol::BytesStream};
use std::io;

#[cfg(feature = "shadowtls-transport")]
use super::shadowtls;

/// Transport used to wrap outgoing connections.
pub enum Settings {
	None,
	#[cfg(feature = "shadowtls-transport")]
	ShadowTls(shadowtls::Outbound),
}

impl Default for Settings {
	fn default() -> Self {
		Self::None
	}
}

impl Settings {
	/// Wrap an established connection.
	///
	/// # Errors
	///
	/// Returns an error if the transport cannot be set up on `stream`.
	pub fn connect_stream(&self, stream: BytesStream) -> io::Result<BytesStream> {
		Ok(match self {
			Settings::None => stream,
			#[cfg(feature = "shadowtls-transport")]
			Settings::ShadowTls(s) => Box::new(s.connect_stream(stream)?),
		})
	}

	/// Dial `addr` (`host:port`) and wrap the connection.
	///
	/// # Errors
	///
	/// Returns an error if the connection cannot be established.
	pub async fn connect(&self, addr: &str) -> io::Result<BytesStream> {
		debug!("Establishing transport connection to {}", addr);
		Ok(match self {
			Settings::None => tokio::net::TcpStream::connect(addr).await?.into(),
			#[cfg(feature = "shadowtls-transport")]
			Settings::ShadowTls(s) => s.connect(addr).await?,
		})
	}

	#[must_use]
	pub fn name(&self) -> &'static str {
		match self {
			Settings::None => "none",
			#[cfg(feature = "shadowtls-transport")]
			Settings::ShadowTls(s) => {
				use crate::protocol::GetProtocolName;
				s.protocol_name()
			}
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
	feature = "use_serde",
	derive(serde::Deserialize),
	serde(rename_all = "lowercase", tag = "type")
)]
pub enum SettingsBuilder {
	None,
	#[cfg(feature = "shadowtls-transport")]
	ShadowTls(shadowtls::OutboundBuilder),
}

impl SettingsBuilder {
	/// # Errors
	///
	/// Returns an error if the transport configuration is invalid.
	#[allow(clippy::unnecessary_wraps)]
	pub fn build(self) -> Result<Settings, BoxStdErr> {
		Ok(match self {
			SettingsBuilder::None => Settings::None,
			#[cfg(feature = "shadowtls-transport")]
			SettingsBuilder::ShadowTls(b) => Settings::ShadowTls(b.build()?),
		})
	}
}

impl Default for SettingsBuilder {
	fn default() -> Self {
		SettingsBuilder::None
	}
}
