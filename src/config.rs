/// Name of the environment variable pointing to a YAML config file. If unset, the configuration is
/// read from individual environment variables instead.
pub const CONFIG_FILE_VARIABLE: &str = "REPO_ACCESS_RELAY_CONFIG";

#[derive(serde::Deserialize)]
/// Top-level configuration of this application.
///
/// The configuration is assembled once at startup and never reloaded.
pub struct Config
{
	/// Where to listen for requests and which origins to accept them from.
	pub server: ServerConfig,
	/// Limits on how many requests a single client may make.
	#[serde(default)]
	pub rate_limit: crate::rate_limit::Config,
	/// Mail account used to send notifications about new access requests.
	pub mail: crate::notifier::Config,
	/// Configuration options specific to the GitHub API and authentication.
	pub github_api: crate::github_api::Config,
}

/// Configuration of the HTTP server.
#[derive(serde::Deserialize)]
pub struct ServerConfig
{
	/// The address to bind to (optional, default: `127.0.0.1`).
	#[serde(default = "default_bind_address")]
	pub bind_address: std::net::IpAddr,
	/// The port to listen on (optional, default: 3001).
	#[serde(default = "default_port")]
	pub port: u16,
	/// The publicly reachable base URL of this service, used to build the accept and deny links
	/// in notification emails.
	pub backend_url: url::Url,
	/// Additional origins (such as the frontend submitting the requests) allowed to make
	/// cross-origin requests. Local development origins and the backend’s own origin are always
	/// allowed.
	#[serde(default)]
	pub allowed_origins: Vec<url::Url>,
}

#[doc(hidden)]
fn default_bind_address() -> std::net::IpAddr
{
	std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)
}

#[doc(hidden)]
fn default_port() -> u16
{
	3001
}

/// Origins of local frontend and backend development servers.
const LOCAL_DEVELOPMENT_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:3001"];

impl Config
{
	/// Read the configuration from the file named by [CONFIG_FILE_VARIABLE] if set, and from the
	/// environment otherwise.
	pub fn load() -> Result<Self, crate::Error>
	{
		match std::env::var_os(CONFIG_FILE_VARIABLE)
		{
			Some(path) =>
			{
				log::info!("reading configuration from “{}”", path.to_string_lossy());
				Self::from_file(path)
			},
			None =>
			{
				log::info!("reading configuration from environment variables");
				Self::from_env(&|name| std::env::var(name).ok())
			},
		}
	}

	/// Attempt to read and parse the configuration from a YAML file.
	///
	/// # Arguments
	/// `path`: Path to the configuration file in YAML format.
	pub fn from_file<P>(path: P) -> Result<Self, crate::Error>
	where
		P: AsRef<std::path::Path>
	{
		let file = std::fs::File::open(&path).map_err(crate::Error::ReadConfigFile)?;
		serde_yaml::from_reader(&file).map_err(crate::Error::ParseConfigFile)
	}

	/// Assemble the configuration from environment variables.
	///
	/// # Arguments
	/// `env`: Looks up the value of an environment variable by name.
	pub fn from_env(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, crate::Error>
	{
		let backend_url = parse_url("BACKEND_URL", &required(env, "BACKEND_URL")?)?;

		let allowed_origins = ["FRONTEND_URL_1", "FRONTEND_URL_2", "FRONTEND_URL_3"].into_iter()
			.filter_map(|name| optional(env, name).map(|value| parse_url(name, &value)))
			.collect::<Result<_, _>>()?;

		let server = ServerConfig
		{
			bind_address: parse_or(env, "BIND_ADDRESS", default_bind_address())?,
			port: parse_or(env, "PORT", default_port())?,
			backend_url,
			allowed_origins,
		};

		Ok(Self
		{
			server,
			rate_limit: crate::rate_limit::Config::from_env(env)?,
			mail: crate::notifier::Config::from_env(env)?,
			github_api: crate::github_api::Config::from_env(env)?,
		})
	}

	/// All origins allowed to make cross-origin requests, serialized as `scheme://host[:port]`.
	pub fn allowed_origins(&self) -> Vec<String>
	{
		let mut origins: Vec<String> =
			LOCAL_DEVELOPMENT_ORIGINS.iter().map(|origin| origin.to_string()).collect();

		let configured_origins = std::iter::once(&self.server.backend_url)
			.chain(&self.server.allowed_origins)
			.map(|url| url.origin())
			// Opaque origins (such as those of file: URLs) can’t be matched against a header
			.filter(url::Origin::is_tuple)
			.map(|origin| origin.ascii_serialization());

		for origin in configured_origins
		{
			if !origins.contains(&origin)
			{
				origins.push(origin);
			}
		}

		origins
	}
}

/// Look up an environment variable, treating empty values as unset.
pub(crate) fn optional(env: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<String>
{
	env(name).filter(|value| !value.trim().is_empty())
}

/// Look up an environment variable that must be set.
pub(crate) fn required(env: &dyn Fn(&str) -> Option<String>, name: &'static str)
	-> Result<String, crate::Error>
{
	optional(env, name).ok_or(crate::Error::MissingEnvironmentVariable(name))
}

/// Look up and parse an environment variable, falling back to a default if it’s unset.
pub(crate) fn parse_or<T>(env: &dyn Fn(&str) -> Option<String>, name: &'static str, default: T)
	-> Result<T, crate::Error>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	match optional(env, name)
	{
		Some(value) => value.trim().parse()
			.map_err(|error: T::Err|
				crate::Error::InvalidEnvironmentVariable{name, message: error.to_string()}),
		None => Ok(default),
	}
}

/// Parse a URL read from an environment variable.
pub(crate) fn parse_url(name: &'static str, value: &str) -> Result<url::Url, crate::Error>
{
	url::Url::parse(value.trim())
		.map_err(|error| crate::Error::InvalidEnvironmentVariable{name, message: error.to_string()})
}

/// Deserialize a secret such that it’s wiped from memory when dropped and never shows up in debug
/// output.
pub(crate) fn deserialize_secret<'de, D>(deserializer: D) -> Result<secstr::SecUtf8, D::Error>
where
	D: serde::Deserializer<'de>,
{
	<String as serde::Deserialize>::deserialize(deserializer).map(secstr::SecUtf8::from)
}
