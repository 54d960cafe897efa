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

use crate::BoxStdErr;
use log::{debug, info, warn};
use rand::RngCore;
use shadow_lib::transport::{shadowtls, Outbound, OutboundBuilder};
use std::{fmt, io, net::SocketAddr, sync::Arc};
use tokio::net::{TcpListener, TcpStream};

#[cfg_attr(
	feature = "parse-config",
	derive(serde::Deserialize),
	serde(deny_unknown_fields)
)]
#[derive(Debug, Clone)]
pub struct TunnelBuilder {
	/// Local address to accept connections on.
	pub listen: SocketAddr,
	/// Remote server in `host:port` format.
	pub server: String,
	#[cfg_attr(feature = "parse-config", serde(default))]
	pub transport: OutboundBuilder,
}

impl TunnelBuilder {
	/// # Errors
	///
	/// Returns an error if `server` is not a valid `host:port`
	/// or the transport cannot be built.
	pub fn build(self) -> Result<Tunnel, BoxStdErr> {
		let valid_server = match self.server.rsplit_once(':') {
			Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
			None => false,
		};
		if !valid_server {
			return Err(format!("invalid server address '{}'", self.server).into());
		}
		Ok(Tunnel {
			listen: self.listen,
			server: self.server,
			transport: self.transport.build()?,
		})
	}
}

/// Forwards every connection accepted on `listen` to `server`
/// through `transport`.
pub struct Tunnel {
	listen: SocketAddr,
	server: String,
	transport: Outbound,
}

impl Tunnel {
	/// # Errors
	///
	/// Returns an error if `listen` cannot be bound.
	pub async fn bind(&self) -> io::Result<TcpListener> {
		TcpListener::bind(self.listen).await
	}

	/// Accept connections on `listener` until an error occurred.
	///
	/// # Errors
	///
	/// Returns an error if `listener` fails.
	pub async fn serve_listener(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
		info!("Serving tunnel {}", self);
		loop {
			let (stream, from) = listener.accept().await?;
			// randomly generated connection ID
			let conn_id = rand::thread_rng().next_u64();
			let tunnel = self.clone();
			tokio::spawn(async move {
				debug!("[{:x}] accepted connection from {}", conn_id, from);
				match tunnel.relay(stream).await {
					Ok((up, down)) => {
						info!(
							"[{:x}] connection from {} closed, {} bytes sent, {} bytes received",
							conn_id, from, up, down
						);
					}
					Err(e) => tunnel.log_error(conn_id, &e),
				}
			});
		}
	}

	/// # Errors
	///
	/// Returns an error if `listen` cannot be bound or accepting fails.
	pub async fn serve(self: Arc<Self>) -> io::Result<()> {
		let listener = self.bind().await?;
		self.serve_listener(listener).await
	}

	async fn relay(&self, mut stream: TcpStream) -> io::Result<(u64, u64)> {
		let mut out = self.transport.connect(&self.server).await?;
		tokio::io::copy_bidirectional(&mut stream, &mut out).await
	}

	fn log_error(&self, conn_id: u64, e: &io::Error) {
		match shadowtls::Error::from_io(e) {
			Some(err) if err.is_protocol_violation() => {
				warn!(
					"[{:x}] server '{}' does not speak {} ({})",
					conn_id,
					self.server,
					self.transport.name(),
					err
				);
			}
			Some(shadowtls::Error::Handshake(_)) => {
				warn!("[{:x}] disguise handshake with '{}' failed ({})", conn_id, self.server, e);
			}
			_ => info!("[{:x}] error occurred in tunnel {} ({})", conn_id, self, e),
		}
	}
}

impl fmt::Display for Tunnel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} -> {} ({})",
			self.listen,
			self.server,
			self.transport.name()
		)
	}
}

/// Serve all tunnels until any of them fails.
///
/// # Errors
///
/// Returns the first error of any tunnel.
pub async fn serve_all(tunnels: Vec<Tunnel>) -> Result<(), BoxStdErr> {
	let tasks = tunnels.into_iter().map(|t| Arc::new(t).serve());
	futures::future::try_join_all(tasks).await?;
	Ok(())
}
