/// All errors that may occur during initialization or while handling requests.
#[derive(Debug, thiserror::Error)]
pub enum Error
{
	#[error("could not read config file")]
	ReadConfigFile(#[source] std::io::Error),
	#[error("could not parse config file")]
	ParseConfigFile(#[source] serde_yaml::Error),
	#[error("missing environment variable “{0}”")]
	MissingEnvironmentVariable(&'static str),
	#[error("invalid value for environment variable “{name}”: {message}")]
	InvalidEnvironmentVariable
	{
		name: &'static str,
		message: String,
	},

	#[error("could not create HTTP client")]
	CreateHttpClient(#[source] reqwest::Error),
	#[error("could not create mail transport")]
	CreateMailTransport(#[source] lettre::transport::smtp::Error),

	#[error("invalid email address “{address}”")]
	ParseMailAddress
	{
		address: String,
		#[source]
		source: lettre::address::AddressError,
	},
	#[error("could not render notification")]
	RenderNotification(#[source] askama::Error),
	#[error("could not build email message")]
	BuildMail(#[source] lettre::error::Error),
	#[error("could not send email")]
	SendMail(#[source] lettre::transport::smtp::Error),

	#[error("could not decode payload body")]
	DecodePayloadBody(#[source] serde_json::Error),
	#[error("unsupported content type “{0}”")]
	UnsupportedContentType(String),
	#[error("too many requests")]
	RateLimited,
}

// Allow this crate’s error type to be used for failed HTTP responses
impl warp::reject::Reject for Error
{
}
