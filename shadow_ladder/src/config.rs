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

use crate::{
	tunnel::{Tunnel, TunnelBuilder},
	BoxStdErr,
};
use fern::colors::{Color, ColoredLevelConfig};
use log::{Level, LevelFilter};
use std::{borrow::Cow, path::Path, str::FromStr};

#[allow(dead_code)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
	Toml,
	Json,
}

impl Format {
	/// Guess format from file extension.
	pub fn from_path(path: &Path) -> Option<Self> {
		let ext = path.extension()?;
		if ext.eq_ignore_ascii_case("toml") {
			Some(Format::Toml)
		} else if ext.eq_ignore_ascii_case("json") {
			Some(Format::Json)
		} else {
			None
		}
	}
}

impl FromStr for Format {
	type Err = Cow<'static, str>;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut s = s.to_string();
		s.make_ascii_lowercase();
		Ok(match s.as_str() {
			"toml" => Self::Toml,
			"json" => Self::Json,
			_ => return Err("must be either 'toml' or 'json'".into()),
		})
	}
}

impl Default for Format {
	fn default() -> Self {
		Format::Toml
	}
}

// ------------------- Logging -------------------
const STR_STDOUT: &str = "@stdout";
const STR_STDERR: &str = "@stderr";
const STR_NONE: &str = "@none";

#[derive(Debug, PartialEq, Eq)]
pub enum LogOutput {
	Stdout,
	Stderr,
	File(String),
}

impl LogOutput {
	pub fn is_colorful(&self) -> bool {
		matches!(self, Self::Stdout | Self::Stderr)
	}

	/// Returns `None` if logging is turned off.
	pub fn from_str(s: &str) -> Option<Self> {
		match s {
			STR_NONE => None,
			STR_STDOUT | "" => Some(LogOutput::Stdout),
			STR_STDERR => Some(LogOutput::Stderr),
			_ => Some(LogOutput::File(s.to_string())),
		}
	}
}

#[cfg(feature = "parse-config")]
fn deserialize_output<'de, D>(deserializer: D) -> Result<Option<LogOutput>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let s = <Cow<'de, str> as serde::Deserialize<'de>>::deserialize(deserializer)?;
	Ok(LogOutput::from_str(&s))
}

#[cfg_attr(
	feature = "parse-config",
	derive(serde::Deserialize),
	serde(deny_unknown_fields)
)]
pub struct Log {
	#[cfg_attr(feature = "parse-config", serde(default = "default_log_level"))]
	pub level: LevelFilter,
	#[cfg_attr(
		feature = "parse-config",
		serde(default = "default_output"),
		serde(deserialize_with = "deserialize_output"),
		serde(rename = "output")
	)]
	pub output: Option<LogOutput>,
}

impl Log {
	/// Initialize logger.
	///
	/// DO NOT call this function more than once!
	pub fn init_logger(&self) -> Result<(), BoxStdErr> {
		if let Some(output) = &self.output {
			let time_format =
				time::format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second]Z")?;
			let is_colorful = output.is_colorful();
			let colors = ColoredLevelConfig::new()
				.info(Color::Blue)
				.trace(Color::Magenta);
			let level_str = move |level: Level| -> String {
				if is_colorful {
					colors.color(level).to_string()
				} else {
					level.to_string()
				}
			};
			let dispatch = fern::Dispatch::new()
				.level(self.level)
				.format(move |out, message, record| {
					let time = time::OffsetDateTime::now_utc()
						.format(&time_format)
						.unwrap_or_default();
					let level = level_str(record.level());
					let target = record.target();
					out.finish(format_args!("[{} {} {}] {}", time, level, target, message));
				});
			match &output {
				LogOutput::Stdout => dispatch.chain(std::io::stdout()),
				LogOutput::Stderr => dispatch.chain(std::io::stderr()),
				LogOutput::File(f) => dispatch.chain(fern::log_file(f)?),
			}
			.apply()?;
		}
		// Ignore empty output
		Ok(())
	}
}

impl Default for Log {
	fn default() -> Self {
		Log {
			level: default_log_level(),
			output: Some(LogOutput::Stdout),
		}
	}
}

fn default_log_level() -> LevelFilter {
	LevelFilter::Info
}

#[allow(clippy::unnecessary_wraps)]
#[allow(dead_code)]
fn default_output() -> Option<LogOutput> {
	Some(LogOutput::Stdout)
}

// ------------------- Config -------------------
#[cfg_attr(
	feature = "parse-config",
	derive(serde::Deserialize),
	serde(deny_unknown_fields)
)]
pub struct Config {
	#[cfg_attr(feature = "parse-config", serde(default))]
	pub log: Log,
	pub tunnels: Vec<TunnelBuilder>,
}

impl Config {
	/// # Errors
	///
	/// Returns an error if there is no tunnel or any tunnel is invalid.
	pub fn build_tunnels(self) -> Result<Vec<Tunnel>, BoxStdErr> {
		if self.tunnels.is_empty() {
			return Err("no tunnel in config".into());
		}
		self.tunnels
			.into_iter()
			.enumerate()
			.map(|(ind, b)| {
				b.build().map_err(|e| -> BoxStdErr {
					format!("invalid tunnel #{} ({})", ind, e).into()
				})
			})
			.collect()
	}
}

#[cfg(feature = "parse-config")]
pub fn parse_config(format: Format, conf_str: &str) -> Result<Config, BoxStdErr> {
	Ok(match format {
		#[cfg(feature = "parse-config-toml")]
		Format::Toml => toml::from_str(conf_str)?,
		#[cfg(feature = "parse-config-json")]
		Format::Json => serde_json::from_str(conf_str)?,
		#[allow(unreachable_patterns)]
		_ => return Err("config format not supported".into()),
	})
}
