/// Configuration of the GitHub API client.
#[derive(serde::Deserialize)]
pub struct Config
{
	/// The base URL of the GitHub API server with a trailing slash (optional, default:
	/// <https://api.github.com/>).
	#[serde(default = "github_com_api_base_url")]
	pub base_url: url::Url,
	/// The user or organization owning the repositories that access is granted to, as included in
	/// URLs (for an organization with the URL <https://github.com/example-organization>, this would
	/// be `example-organization`).
	pub owner: String,
	/// A token allowed to manage collaborators on the owner’s repositories. Make sure that other
	/// users on this machine can’t read it.
	#[serde(deserialize_with = "crate::config::deserialize_secret")]
	pub token: secstr::SecUtf8,
}

#[doc(hidden)]
fn github_com_api_base_url() -> url::Url
{
	url::Url::parse("https://api.github.com/")
		.expect("this call is infallible because we know the URL to be well-formed")
}

impl Config
{
	/// Read the GitHub API settings from the `OWNER`, `GITHUB_TOKEN`, and `GITHUB_API_URL`
	/// environment variables.
	pub fn from_env(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, crate::Error>
	{
		let base_url = match crate::config::optional(env, "GITHUB_API_URL")
		{
			Some(value) => crate::config::parse_url("GITHUB_API_URL", &value)?,
			None => github_com_api_base_url(),
		};

		Ok(Self
		{
			base_url,
			owner: crate::config::required(env, "OWNER")?,
			token: crate::config::required(env, "GITHUB_TOKEN")?.into(),
		})
	}
}

/// Ways in which adding a collaborator can fail.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError
{
	/// The request was made, and GitHub responded with an error status code.
	#[error("received GitHub API error (status code {status_code}): {response_body}")]
	HttpError
	{
		status_code: reqwest::StatusCode,
		response_body: String,
	},
	/// The request was made, but no response was received.
	#[error("received no response from the GitHub API")]
	NoResponse(#[source] reqwest::Error),
	/// Something went wrong while setting up the request.
	#[error("could not set up GitHub API request: {0}")]
	RequestSetup(String),
}

/// Capability of managing collaborators on the repositories of a fixed owner.
#[async_trait::async_trait]
pub trait AccessProvider: Send + Sync
{
	/// Ensure that the user is a collaborator on the repository. Adding an existing collaborator
	/// again succeeds without changing anything.
	///
	/// # Arguments
	/// - `repository_name`: The name of the repository, without the owner.
	/// - `username`: The handle of the user to add.
	async fn add_collaborator(&self, repository_name: &str, username: &str)
		-> Result<(), ProviderError>;
}

/// A GitHub API client that authenticates with a GitHub server using a fixed token.
///
/// Each API request is attempted exactly once, with the timeouts of the underlying HTTP client.
///
/// The client can safely be shared between threads, which is achieved by internally using
/// thread-safe handles to the underlying data structures. This allows the client to be used in
/// request handlers asynchronously and concurrently.
#[derive(Clone)]
pub struct Client
{
	#[doc(hidden)]
	config: std::sync::Arc<Config>,
	#[doc(hidden)]
	reqwest_client: reqwest::Client,
}

impl Client
{
	/// Initialize a new GitHub API client with a given configuration.
	pub fn from_config(config: Config) -> Result<Self, crate::Error>
	{
		let reqwest_client = reqwest::ClientBuilder::new()
			// Set a recognizable user agent to get meaningful debugging information from GitHub
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build().map_err(crate::Error::CreateHttpClient)?;

		log::info!("using GitHub API at {} for repositories owned by “{}”", config.base_url,
			config.owner);

		Ok(Self
		{
			config: std::sync::Arc::new(config),
			reqwest_client,
		})
	}

	/// Make an HTTP request to the GitHub API, discarding the response body on success.
	///
	/// # Arguments
	/// - `method`: The HTTP method to use (example: [reqwest::Method::PUT]).
	/// - `endpoint`: The API endpoint (without host and leading slash, example:
	///   `repos/example_organization/example_repository`).
	/// - `body`: A serializable type containing the request body.
	pub async fn request<S, B>(&self, method: reqwest::Method, endpoint: S, body: Option<&B>)
		-> Result<(), ProviderError>
	where
		S: AsRef<str>,
		B: serde::Serialize,
	{
		// Build the API endpoint URL from the base URL and the endpoint path
		let url = self.config.base_url.join(endpoint.as_ref())
			.map_err(|error| ProviderError::RequestSetup(format!("invalid endpoint URL: {error}")))?;
		let mut request = self.reqwest_client.request(method, url);

		if let Some(body) = body
		{
			// Append the request body if provided
			request = request.json(&body);
		}

		let response = request
			// Provide the access token using the Authentication header
			.bearer_auth(self.config.token.unsecure())
			// Request the v3 REST API, as recommended by GitHub’s documentation
			.header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
			// Send the request
			.send().await
			.map_err(|error| match error.is_builder()
			{
				true => ProviderError::RequestSetup(error.to_string()),
				false => ProviderError::NoResponse(error),
			})?;

		// Return an error if GitHub rejected the request according to the response’s HTTP status
		let status_code = response.status();

		if !status_code.is_success()
		{
			// Decode the body for debugging purposes
			let response_body = response.text().await.unwrap_or_default();

			return Err(ProviderError::HttpError{status_code, response_body});
		}

		Ok(())
	}

	/// Make an HTTP PUT request to the GitHub API (for arguments, see [Client::request]).
	pub async fn put<S, B>(&self, endpoint: S, body: &B) -> Result<(), ProviderError>
	where
		S: AsRef<str>,
		B: serde::Serialize,
	{
		self.request(reqwest::Method::PUT, endpoint, Some(body)).await
	}
}

#[async_trait::async_trait]
impl AccessProvider for Client
{
	async fn add_collaborator(&self, repository_name: &str, username: &str)
		-> Result<(), ProviderError>
	{
		let owner = &self.config.owner;

		// GitHub answers 201 Created with an invitation for new collaborators and 204 No Content
		// for existing ones
		self.put(format!("repos/{owner}/{repository_name}/collaborators/{username}"),
			&AddCollaboratorRequest{}).await
	}
}

/// Data model for the parameters of a request to add a collaborator. The optional `permission`
/// field is omitted so that GitHub applies its default.
#[derive(Debug, serde::Serialize)]
pub struct AddCollaboratorRequest
{
}

#[cfg(test)]
mod tests
{
	use super::*;

	/// Captured details of a request received by the fake GitHub server.
	#[derive(Debug, Clone)]
	struct ReceivedRequest
	{
		path: String,
		authorization: Option<String>,
		accept: Option<String>,
		user_agent: Option<String>,
		body: String,
	}

	/// Serve a fake GitHub API answering every request with the given status code and body.
	fn fake_github(status_code: u16, response_body: &'static str)
		-> (url::Url, std::sync::Arc<tokio::sync::Mutex<Vec<ReceivedRequest>>>)
	{
		use warp::Filter as _;

		let received = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));
		let received_by_server = received.clone();

		let route = warp::put()
			.and(warp::path::full())
			.and(warp::header::optional::<String>("authorization"))
			.and(warp::header::optional::<String>("accept"))
			.and(warp::header::optional::<String>("user-agent"))
			.and(warp::body::bytes())
			.then(
				move |path: warp::path::FullPath,
					authorization: Option<String>,
					accept: Option<String>,
					user_agent: Option<String>,
					body: warp::hyper::body::Bytes|
				{
					let received = received_by_server.clone();

					async move
					{
						received.lock().await.push(ReceivedRequest
						{
							path: path.as_str().to_string(),
							authorization,
							accept,
							user_agent,
							body: String::from_utf8_lossy(&body).into_owned(),
						});

						let status_code = warp::http::StatusCode::from_u16(status_code).unwrap();
						warp::reply::with_status(response_body, status_code)
					}
				});

		let (address, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
		tokio::spawn(server);

		let base_url = url::Url::parse(&format!("http://{address}/")).unwrap();

		(base_url, received)
	}

	fn client(base_url: url::Url) -> Client
	{
		Client::from_config(Config
		{
			base_url,
			owner: "example-org".to_string(),
			token: "ghp_secret".to_string().into(),
		}).unwrap()
	}

	#[tokio::test]
	async fn test_add_collaborator()
	{
		let (base_url, received) = fake_github(201, "{}");

		client(base_url).add_collaborator("my-repo", "alice123").await.unwrap();

		let received = received.lock().await;
		assert_eq!(received.len(), 1);
		assert_eq!(received[0].path, "/repos/example-org/my-repo/collaborators/alice123");
		assert_eq!(received[0].authorization.as_deref(), Some("Bearer ghp_secret"));
		assert_eq!(received[0].accept.as_deref(), Some("application/vnd.github.v3+json"));
		assert!(received[0].user_agent.as_deref().unwrap().starts_with("repo-access-relay/"));
		assert_eq!(received[0].body, "{}");
	}

	#[tokio::test]
	async fn test_existing_collaborator_is_success()
	{
		let (base_url, _) = fake_github(204, "");

		assert!(client(base_url).add_collaborator("my-repo", "alice123").await.is_ok());
	}

	#[tokio::test]
	async fn test_error_status_is_reported_with_body()
	{
		let (base_url, _) = fake_github(404, r#"{"message":"Not Found"}"#);

		match client(base_url).add_collaborator("my-repo", "alice123").await
		{
			Err(ProviderError::HttpError{status_code, response_body}) =>
			{
				assert_eq!(status_code, reqwest::StatusCode::NOT_FOUND);
				assert_eq!(response_body, r#"{"message":"Not Found"}"#);
			},
			result => panic!("expected HTTP error, got {result:?}"),
		}
	}

	#[tokio::test]
	async fn test_unreachable_server_is_no_response()
	{
		// Bind to an ephemeral port and release it again so that nothing listens there
		let address = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
		let base_url = url::Url::parse(&format!("http://{address}/")).unwrap();

		assert!(matches!(client(base_url).add_collaborator("my-repo", "alice123").await,
			Err(ProviderError::NoResponse(_))));
	}

	#[tokio::test]
	async fn test_invalid_endpoint_is_request_setup_error()
	{
		// Joining a path onto a base URL that can’t be a base fails before anything is sent
		let base_url = url::Url::parse("mailto:github@example.com").unwrap();

		assert!(matches!(client(base_url).add_collaborator("my-repo", "alice123").await,
			Err(ProviderError::RequestSetup(_))));
	}
}
