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

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::default_trait_access)]

mod args;
mod config;
mod tunnel;

use args::{Action, AppOptions, ServeAction};
use std::{borrow::Cow, io};
use tokio::runtime::Runtime;

type BoxStdErr = Box<dyn std::error::Error + Send + Sync>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const EXIT_CONFIG: i32 = 1;
const EXIT_RUNTIME: i32 = 2;

#[derive(Debug, thiserror::Error)]
enum Error {
	#[error("[IO error] {0}")]
	Io(#[from] io::Error),
	#[error("[input] {0}")]
	Input(Cow<'static, str>),
	#[error("[config] {0}")]
	Config(BoxStdErr),
	#[error("[runtime] {0}")]
	Runtime(BoxStdErr),
}

fn serve(action: ServeAction) -> Result<(), Error> {
	#[cfg(feature = "parse-config")]
	let conf = match action {
		ServeAction::File { coms, path, format } => {
			let conf_str = std::fs::read_to_string(&path).map_err(|e| {
				Error::Input(format!("cannot read config file '{}' ({})", path.display(), e).into())
			})?;
			let mut conf = config::parse_config(format, &conf_str).map_err(Error::Config)?;
			if let Some(log_out) = coms.log_out {
				conf.log.output = log_out;
			}
			if let Some(level) = coms.log {
				conf.log.level = level;
			}
			conf
		}
	};
	#[cfg(not(feature = "parse-config"))]
	let conf: config::Config = match action {};

	conf.log.init_logger().map_err(Error::Config)?;
	let tunnels = conf.build_tunnels().map_err(Error::Config)?;

	let rt = Runtime::new()?;
	rt.block_on(tunnel::serve_all(tunnels))
		.map_err(Error::Runtime)
}

fn main() {
	let action = match AppOptions::new_from_args().into_action() {
		Ok(action) => action,
		Err(err) => {
			eprintln!("{}", err);
			std::process::exit(EXIT_CONFIG);
		}
	};
	let action = match action {
		Action::CheckVersion => {
			println!("{}", VERSION);
			return;
		}
		Action::Serve(action) => action,
	};
	if let Err(err) = serve(action) {
		eprintln!("Error happened during initialization:\n {}\n", err);
		std::process::exit(match err {
			Error::Input(_) | Error::Config(_) => EXIT_CONFIG,
			Error::Io(_) | Error::Runtime(_) => EXIT_RUNTIME,
		});
	}
}
