use crate::github_api::{AccessProvider, ProviderError};
use crate::notifier::Notifier;
use crate::{AccessDecisionQueryForm, AccessRequest, AccessRequestForm, FieldError, GrantQuery,
	MessageResponse, ValidationErrorResponse};

use warp::Reply as _;

/// Reject request bodies larger than 16 kB, which is plenty for the four short fields of a request.
const MAX_BODY_SIZE: u64 = 16 * 1024;

/// Everything the request handlers need, assembled once at startup.
///
/// The relay can be cloned cheaply, and all clones share the same notifier and access provider.
#[derive(Clone)]
pub struct Relay
{
	#[doc(hidden)]
	notifier: std::sync::Arc<dyn Notifier>,
	#[doc(hidden)]
	access_provider: std::sync::Arc<dyn AccessProvider>,
	#[doc(hidden)]
	settings: std::sync::Arc<NotificationSettings>,
}

/// Fixed parameters of every notification.
#[doc(hidden)]
struct NotificationSettings
{
	sender: String,
	recipient: String,
	backend_url: url::Url,
}

impl Relay
{
	/// # Arguments
	/// - `server_config`: Provides the base URL of the links in notifications.
	/// - `mail_config`: Provides the sender and recipient of notifications.
	/// - `notifier`: Delivers notifications about new access requests.
	/// - `access_provider`: Adds collaborators once a request is accepted.
	pub fn new(
		server_config: &crate::config::ServerConfig,
		mail_config: &crate::notifier::Config,
		notifier: std::sync::Arc<dyn Notifier>,
		access_provider: std::sync::Arc<dyn AccessProvider>)
		-> Self
	{
		let settings = NotificationSettings
		{
			sender: mail_config.username.clone(),
			recipient: mail_config.recipient.clone(),
			backend_url: server_config.backend_url.clone(),
		};

		Self
		{
			notifier,
			access_provider,
			settings: std::sync::Arc::new(settings),
		}
	}
}

/// All routes of this service, including rate limiting, CORS, and access logging.
///
/// # Arguments
/// - `relay`: The handle to the notifier and access provider.
/// - `rate_limiter`: The handle to the shared rate limiter.
/// - `allowed_origins`: Origins allowed to make cross-origin requests.
pub fn routes(relay: Relay, rate_limiter: crate::rate_limit::RateLimiter, allowed_origins: &[String])
	-> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone
{
	use warp::Filter as _;

	let submit_request_route = warp::path!("submit-request")
		.and(warp::post())
		.and(with_access_request_form())
		.and(with_relay(relay.clone()))
		.and_then(handle_submit_request);

	let accept_request_route = warp::path!("accept-request")
		.and(warp::get())
		.and(warp::query::<AccessDecisionQueryForm>())
		.and(with_relay(relay))
		.and_then(handle_accept_request);

	let deny_request_route = warp::path!("deny-request")
		.and(warp::get())
		.and(warp::query::<AccessDecisionQueryForm>())
		.and_then(handle_deny_request);

	let cors = warp::cors()
		.allow_origins(allowed_origins.iter().map(String::as_str))
		.allow_methods(["GET", "POST"])
		.allow_headers(["content-type", "authorization"])
		.allow_credentials(true);

	crate::rate_limit::with_rate_limit(rate_limiter)
		.and(submit_request_route.or(accept_request_route).or(deny_request_route))
		.recover(handle_rejection)
		.with(cors)
		.with(warp::log("repo_access_relay::access"))
}

#[doc(hidden)]
fn with_relay(relay: Relay)
	-> impl warp::Filter<Extract = (Relay,), Error = std::convert::Infallible> + Clone
{
	use warp::Filter as _;

	warp::any().map(move || relay.clone())
}

/// [warp] filter decoding an access request from either a JSON or a form-encoded body, depending
/// on the request’s content type. A missing content type is treated as JSON. Requests without a
/// body are decoded as an empty form so that all missing fields are reported by validation.
fn with_access_request_form()
	-> impl warp::Filter<Extract = (AccessRequestForm,), Error = warp::Rejection> + Clone
{
	use warp::Filter as _;

	let with_body = warp::body::content_length_limit(MAX_BODY_SIZE)
		.and(warp::header::optional::<String>("content-type"))
		.and(warp::body::bytes())
		.and_then(
			|content_type: Option<String>, bytes: warp::hyper::body::Bytes|
			async move
			{
				decode_access_request_form(content_type.as_deref(), &bytes)
					.map_err(warp::reject::custom)
			});

	// Only taken if there’s no content length, as the other rejections take precedence over this one
	let without_body = warp::header::optional::<u64>("content-length")
		.and_then(
			|content_length: Option<u64>|
			async move
			{
				match content_length
				{
					None => Ok(AccessRequestForm::default()),
					Some(_) => Err(warp::reject::not_found()),
				}
			});

	with_body.or(without_body).unify()
}

#[doc(hidden)]
fn decode_access_request_form(content_type: Option<&str>, bytes: &[u8])
	-> Result<AccessRequestForm, crate::Error>
{
	if bytes.is_empty()
	{
		return Ok(AccessRequestForm::default());
	}

	// Ignore parameters such as the charset
	let media_type = content_type
		.and_then(|content_type| content_type.split(';').next())
		.map(|media_type| media_type.trim().to_ascii_lowercase());

	match media_type.as_deref()
	{
		None | Some("application/json") =>
			serde_json::from_slice(bytes).map_err(crate::Error::DecodePayloadBody),
		Some("application/x-www-form-urlencoded") =>
			Ok(AccessRequestForm::from_pairs(url::form_urlencoded::parse(bytes))),
		Some(_) => Err(crate::Error::UnsupportedContentType(
			content_type.unwrap_or_default().to_string())),
	}
}

/// Request handler for new access requests.
///
/// # Arguments
/// - `form`: The decoded but not yet validated request body.
/// - `relay`: The handle to the notifier.
async fn handle_submit_request(form: AccessRequestForm, relay: Relay)
	-> Result<warp::reply::Response, std::convert::Infallible>
{
	let request = match crate::validation::validate_access_request(&form)
	{
		Ok(request) => request,
		Err(errors) => return Ok(validation_error_response(&errors)),
	};

	Ok(submit_request(request, &relay).await)
}

/// Notify the recipient about a validated access request.
pub async fn submit_request(request: AccessRequest, relay: &Relay) -> warp::reply::Response
{
	if request.github_username.is_empty() || request.reason.is_empty()
		|| request.repo_name.is_empty() || request.requester_name.is_empty()
	{
		return message_response("Missing required fields.", warp::http::StatusCode::BAD_REQUEST);
	}

	let settings = &relay.settings;
	let notification = crate::notifier::compose_notification(&request, &settings.sender,
		&settings.recipient, &settings.backend_url);

	let result = match notification
	{
		Ok(notification) => relay.notifier.notify(notification).await,
		Err(error) => Err(error),
	};

	if let Err(error) = result
	{
		log::error!("could not send notification about access request of “{}” to repository “{}”",
			request.github_username, request.repo_name);
		log::error!("{:?}", anyhow::Error::from(error));

		return message_response("Error sending email.",
			warp::http::StatusCode::INTERNAL_SERVER_ERROR);
	}

	log::info!("sent notification about access request of “{}” to repository “{}”",
		request.github_username, request.repo_name);

	message_response("Request submitted successfully!", warp::http::StatusCode::OK)
}

/// Request handler for accept links.
///
/// # Arguments
/// - `query`: The query parameters, not yet validated.
/// - `relay`: The handle to the access provider.
async fn handle_accept_request(query: AccessDecisionQueryForm, relay: Relay)
	-> Result<warp::reply::Response, std::convert::Infallible>
{
	let query = match crate::validation::validate_grant_query(&query)
	{
		Ok(query) => query,
		Err(errors) => return Ok(validation_error_response(&errors)),
	};

	Ok(grant_access(query, &relay).await)
}

/// Add the user of an accepted request as a collaborator.
///
/// Failures of the access provider are answered with 502 Bad Gateway so that whoever clicked the
/// link learns that access was not granted.
pub async fn grant_access(query: GrantQuery, relay: &Relay) -> warp::reply::Response
{
	let GrantQuery{repo, username} = query;

	if repo.is_empty() || username.is_empty()
	{
		return text_response("Missing repository name or username.".to_string(),
			warp::http::StatusCode::BAD_REQUEST);
	}

	if let Err(error) = relay.access_provider.add_collaborator(&repo, &username).await
	{
		log::error!("could not add “{username}” as a collaborator to repository “{repo}”");

		match &error
		{
			ProviderError::HttpError{status_code, response_body} =>
			{
				log::error!("response error: {status_code}");
				log::error!("error data: {response_body}");
			},
			ProviderError::NoResponse(_) => log::error!("no response received"),
			ProviderError::RequestSetup(message) =>
				log::error!("error setting up the request: {message}"),
		}

		log::error!("{:?}", anyhow::Error::from(error));

		return message_response("Error adding collaborator.", warp::http::StatusCode::BAD_GATEWAY);
	}

	log::info!("added “{username}” as a collaborator to repository “{repo}”");

	text_response(format!("Successfully added {username} to {repo}."), warp::http::StatusCode::OK)
}

/// Request handler for deny links. Denying a request has no effect other than the response.
///
/// # Arguments
/// - `query`: The query parameters, not yet validated.
async fn handle_deny_request(query: AccessDecisionQueryForm)
	-> Result<warp::reply::Response, std::convert::Infallible>
{
	let query = match crate::validation::validate_deny_query(&query)
	{
		Ok(query) => query,
		Err(errors) => return Ok(validation_error_response(&errors)),
	};

	let username = query.username;

	if username.is_empty()
	{
		return Ok(text_response("Missing username.".to_string(),
			warp::http::StatusCode::BAD_REQUEST));
	}

	log::info!("denied access request of “{username}”");

	Ok(text_response(format!("Request from {username} has been denied."),
		warp::http::StatusCode::OK))
}

/// Request handler for all requests that were rejected previously.
///
/// # Arguments
/// - `error`: Reasons for why this request was rejected by all routes.
async fn handle_rejection(error: warp::Rejection)
	-> Result<warp::reply::Response, std::convert::Infallible>
{
	let status_code;
	let message;

	if error.is_not_found()
	{
		status_code = warp::http::StatusCode::NOT_FOUND;
		message = "not found";
	}
	else if let Some(crate::Error::RateLimited) = error.find()
	{
		status_code = warp::http::StatusCode::TOO_MANY_REQUESTS;
		message = "Too many requests, please try again later.";
	}
	else if let Some(_) = error.find::<warp::reject::MethodNotAllowed>()
	{
		status_code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
		message = "method not allowed";
	}
	else if let Some(_) = error.find::<warp::reject::PayloadTooLarge>()
	{
		status_code = warp::http::StatusCode::PAYLOAD_TOO_LARGE;
		message = "payload too large";
	}
	else if let Some(crate::Error::UnsupportedContentType(_)) = error.find()
	{
		status_code = warp::http::StatusCode::UNSUPPORTED_MEDIA_TYPE;
		message = "unsupported content type";
	}
	else if let Some(crate::Error::DecodePayloadBody(_)) = error.find()
	{
		status_code = warp::http::StatusCode::BAD_REQUEST;
		message = "malformed payload body";
	}
	else if let Some(_) = error.find::<warp::reject::InvalidQuery>()
	{
		status_code = warp::http::StatusCode::BAD_REQUEST;
		message = "malformed query string";
	}
	// If users are able to trigger errors we did not anticipate, log the error chain so we can
	// inspect this more closely later
	else
	{
		status_code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
		message = "internal server error";

		log::error!("unhandled error: {:#?}", error);
	}

	Ok(message_response(message, status_code))
}

#[doc(hidden)]
fn message_response(message: &str, status_code: warp::http::StatusCode) -> warp::reply::Response
{
	let response = warp::reply::json(&MessageResponse{message});

	warp::reply::with_status(response, status_code).into_response()
}

#[doc(hidden)]
fn text_response(text: String, status_code: warp::http::StatusCode) -> warp::reply::Response
{
	warp::reply::with_status(text, status_code).into_response()
}

#[doc(hidden)]
fn validation_error_response(errors: &[FieldError]) -> warp::reply::Response
{
	let response = warp::reply::json(&ValidationErrorResponse{errors});

	warp::reply::with_status(response, warp::http::StatusCode::BAD_REQUEST).into_response()
}
