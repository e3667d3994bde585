/// Configuration of the per-client rate limiter.
#[derive(serde::Deserialize)]
pub struct Config
{
	/// The number of requests a single client may make per window (optional, default: 20).
	#[serde(default = "default_max_requests")]
	pub max_requests: u32,
	/// The length of a window in seconds (optional, default: 900, that is, 15 minutes).
	#[serde(default = "default_window_seconds")]
	pub window_seconds: u64,
}

#[doc(hidden)]
fn default_max_requests() -> u32
{
	20
}

#[doc(hidden)]
fn default_window_seconds() -> u64
{
	15 * 60
}

impl Default for Config
{
	fn default() -> Self
	{
		Self
		{
			max_requests: default_max_requests(),
			window_seconds: default_window_seconds(),
		}
	}
}

impl Config
{
	/// Read the rate limits from the `RATE_LIMIT_*` environment variables.
	pub fn from_env(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, crate::Error>
	{
		Ok(Self
		{
			max_requests: crate::config::parse_or(env, "RATE_LIMIT_MAX_REQUESTS",
				default_max_requests())?,
			window_seconds: crate::config::parse_or(env, "RATE_LIMIT_WINDOW_SECONDS",
				default_window_seconds())?,
		})
	}
}

/// Requests counted for a single client in the current window.
#[doc(hidden)]
struct Window
{
	started_at: tokio::time::Instant,
	request_count: u32,
}

/// Windows of all clients seen recently.
#[doc(hidden)]
struct Windows
{
	clients: std::collections::HashMap<Option<std::net::IpAddr>, Window>,
	swept_at: tokio::time::Instant,
}

/// A fixed-window rate limiter keyed by client IP address.
///
/// Each client may make up to a configured number of requests per window. The window of a client
/// starts with its first request and, once elapsed, is replaced by a fresh one. Requests whose
/// remote address is unknown share a single window.
///
/// The limiter can be cloned cheaply, and all clones share the same request counts.
#[derive(Clone)]
pub struct RateLimiter
{
	#[doc(hidden)]
	max_requests: u32,
	#[doc(hidden)]
	window: std::time::Duration,
	#[doc(hidden)]
	windows: std::sync::Arc<tokio::sync::Mutex<Windows>>,
}

impl RateLimiter
{
	pub fn from_config(config: &Config) -> Self
	{
		Self
		{
			max_requests: config.max_requests,
			window: std::time::Duration::from_secs(config.window_seconds),
			windows: std::sync::Arc::new(tokio::sync::Mutex::new(Windows
			{
				clients: Default::default(),
				swept_at: tokio::time::Instant::now(),
			})),
		}
	}

	/// Count a request of the given client and decide whether it may proceed.
	pub async fn check(&self, client: Option<std::net::IpAddr>) -> Result<(), crate::Error>
	{
		let now = tokio::time::Instant::now();
		let mut windows = self.windows.lock().await;

		// Forget clients whose window has elapsed, at most once per window
		let window_length = self.window;
		if now.duration_since(windows.swept_at) >= window_length
		{
			windows.clients.retain(|_, window| now.duration_since(window.started_at) < window_length);
			windows.swept_at = now;
		}

		let window = windows.clients.entry(client)
			.or_insert(Window{started_at: now, request_count: 0});

		if now.duration_since(window.started_at) >= window_length
		{
			*window = Window{started_at: now, request_count: 0};
		}

		if window.request_count >= self.max_requests
		{
			log::warn!("rate limit exceeded for client {}",
				client.map_or_else(|| "(unknown)".to_string(), |address| address.to_string()));
			return Err(crate::Error::RateLimited);
		}

		window.request_count += 1;

		Ok(())
	}
}

/// [warp] filter rejecting requests of clients that exceeded their rate limit.
///
/// # Arguments
/// - `rate_limiter`: The handle to the shared rate limiter.
pub fn with_rate_limit(rate_limiter: RateLimiter)
	-> impl warp::Filter<Extract = (), Error = warp::Rejection> + Clone
{
	use warp::Filter as _;

	warp::addr::remote()
		.and_then(
			move |remote_address: Option<std::net::SocketAddr>|
			{
				let rate_limiter = rate_limiter.clone();

				async move
				{
					rate_limiter.check(remote_address.map(|address| address.ip())).await
						.map_err(warp::reject::custom)
				}
			})
		// The rate limiter doesn’t contribute any values to subsequent filters
		.untuple_one()
}
