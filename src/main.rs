#[doc(hidden)]
mod config;
#[doc(hidden)]
mod error;
pub mod github_api;
#[doc(hidden)]
mod models;
pub mod notifier;
pub mod rate_limit;
pub mod routes;
pub mod validation;

pub use config::Config;
pub use error::Error;
pub use models::*;

#[tokio::main]
async fn main() -> anyhow::Result<()>
{
	pretty_env_logger::init();

	// Read the configuration once, it isn’t reloaded while the service is running
	let config = Config::load()?;

	// Initialize the mail transport used to notify about new access requests
	let notifier = notifier::SmtpNotifier::from_config(&config.mail)?;

	let allowed_origins = config.allowed_origins();
	log::info!("accepting cross-origin requests from {}", allowed_origins.join(", "));

	let rate_limiter = rate_limit::RateLimiter::from_config(&config.rate_limit);
	let address = std::net::SocketAddr::new(config.server.bind_address, config.server.port);

	// Initialize a new GitHub API client for adding collaborators once requests are accepted
	let github_api_client = github_api::Client::from_config(config.github_api)?;

	let relay = routes::Relay::new(&config.server, &config.mail, std::sync::Arc::new(notifier),
		std::sync::Arc::new(github_api_client));

	let routes = routes::routes(relay, rate_limiter, &allowed_origins);

	log::info!("listening for access requests on {address}");
	warp::serve(routes).run(address).await;

	Ok(())
}
