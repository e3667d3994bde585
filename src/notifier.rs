use crate::{AccessRequest, Notification};

/// Configuration of the mail account sending notifications.
#[derive(serde::Deserialize)]
pub struct Config
{
	/// The SMTP relay to submit mail to over TLS (optional, default: `smtp.gmail.com`).
	#[serde(default = "default_smtp_host")]
	pub smtp_host: String,
	/// The account name, which is also used as the sender address.
	pub username: String,
	/// The account password (for Gmail, use an app password).
	#[serde(deserialize_with = "crate::config::deserialize_secret")]
	pub password: secstr::SecUtf8,
	/// The address that receives notifications about new access requests.
	pub recipient: String,
}

#[doc(hidden)]
fn default_smtp_host() -> String
{
	"smtp.gmail.com".to_string()
}

impl Config
{
	/// Read the mail account from the `EMAIL_USER`, `EMAIL_PASS`, `TO_EMAIL`, and `SMTP_HOST`
	/// environment variables.
	pub fn from_env(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, crate::Error>
	{
		Ok(Self
		{
			smtp_host: crate::config::optional(env, "SMTP_HOST").unwrap_or_else(default_smtp_host),
			username: crate::config::required(env, "EMAIL_USER")?,
			password: crate::config::required(env, "EMAIL_PASS")?.into(),
			recipient: crate::config::required(env, "TO_EMAIL")?,
		})
	}
}

/// Capability of delivering a notification to its recipient.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync
{
	/// Deliver the notification, returning once it was accepted for delivery.
	async fn notify(&self, notification: Notification) -> Result<(), crate::Error>;
}

/// A [Notifier] submitting notifications as HTML emails to an SMTP relay.
///
/// The client can safely be shared between threads and reuses connections to the relay.
pub struct SmtpNotifier
{
	#[doc(hidden)]
	transport: lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
}

impl SmtpNotifier
{
	/// Initialize a new SMTP client with a given configuration. No connection is made until the
	/// first notification is sent, but the connection pool is set up right away, so this must be
	/// called from within the tokio runtime.
	pub fn from_config(config: &Config) -> Result<Self, crate::Error>
	{
		let credentials = lettre::transport::smtp::authentication::Credentials::new(
			config.username.clone(), config.password.unsecure().to_string());

		let transport =
			lettre::AsyncSmtpTransport::<lettre::Tokio1Executor>::relay(&config.smtp_host)
				.map_err(crate::Error::CreateMailTransport)?
				.credentials(credentials)
				.build();

		Ok(Self{transport})
	}
}

#[doc(hidden)]
fn parse_mailbox(address: &str) -> Result<lettre::message::Mailbox, crate::Error>
{
	let parsed = address.parse::<lettre::Address>()
		.map_err(|source| crate::Error::ParseMailAddress{address: address.to_string(), source})?;

	Ok(lettre::message::Mailbox::new(None, parsed))
}

#[async_trait::async_trait]
impl Notifier for SmtpNotifier
{
	async fn notify(&self, notification: Notification) -> Result<(), crate::Error>
	{
		use lettre::AsyncTransport as _;

		let message = lettre::Message::builder()
			.from(parse_mailbox(&notification.from)?)
			.to(parse_mailbox(&notification.to)?)
			.subject(notification.subject)
			.header(lettre::message::header::ContentType::TEXT_HTML)
			.body(notification.html_body)
			.map_err(crate::Error::BuildMail)?;

		self.transport.send(message).await.map_err(crate::Error::SendMail)?;

		Ok(())
	}
}

/// Template of the HTML body of notification emails. Fields are HTML-escaped unless marked as
/// `safe` in the template.
#[derive(askama::Template)]
#[template(path = "notification.html")]
struct NotificationTemplate<'a>
{
	repo_name: &'a str,
	requester_name: &'a str,
	github_username: &'a str,
	reason: &'a str,
	/// Link accepting the request, built from validated parts only.
	accept_url: &'a str,
	/// Link denying the request, built from validated parts only.
	deny_url: &'a str,
}

/// Compose the email informing the recipient about a new access request.
///
/// The accept and deny links are built by substituting the validated GitHub username and
/// repository name into the link templates as they are, as validation restricts them to characters
/// that are safe in URLs. The free-text fields are escaped by the template.
///
/// # Arguments
/// - `request`: The validated access request.
/// - `from`: The sender address.
/// - `to`: The recipient address.
/// - `backend_url`: The public base URL of this service.
pub fn compose_notification(request: &AccessRequest, from: &str, to: &str, backend_url: &url::Url)
	-> Result<Notification, crate::Error>
{
	use askama::Template as _;

	let backend_url = backend_url.as_str().trim_end_matches('/');
	let repo_name = &request.repo_name;
	let github_username = &request.github_username;

	let accept_url = format!("{backend_url}/accept-request?repo={repo_name}&username={github_username}");
	let deny_url = format!("{backend_url}/deny-request?username={github_username}");

	let template = NotificationTemplate
	{
		repo_name,
		requester_name: &request.requester_name,
		github_username,
		reason: &request.reason,
		accept_url: &accept_url,
		deny_url: &deny_url,
	};

	let html_body = template.render().map_err(crate::Error::RenderNotification)?;

	Ok(Notification
	{
		from: from.to_string(),
		to: to.to_string(),
		subject: format!("Access Request for Repository: {repo_name}"),
		html_body,
	})
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn request() -> AccessRequest
	{
		AccessRequest
		{
			github_username: "alice123".to_string(),
			reason: "need it for review".to_string(),
			repo_name: "my-repo".to_string(),
			requester_name: "Alice".to_string(),
		}
	}

	#[test]
	fn test_compose_notification()
	{
		let backend_url = url::Url::parse("https://relay.example.com").unwrap();
		let notification =
			compose_notification(&request(), "relay@example.com", "admin@example.com", &backend_url)
				.unwrap();

		assert_eq!(notification.from, "relay@example.com");
		assert_eq!(notification.to, "admin@example.com");
		assert_eq!(notification.subject, "Access Request for Repository: my-repo");
		assert!(notification.html_body.contains(
			r#"href="https://relay.example.com/accept-request?repo=my-repo&username=alice123""#));
		assert!(notification.html_body.contains(
			r#"href="https://relay.example.com/deny-request?username=alice123""#));
		assert!(notification.html_body.contains("<strong>Name of Requester:</strong> Alice"));
		assert!(notification.html_body.contains("<br>need it for review</p>"));
	}

	#[test]
	fn test_compose_notification_keeps_backend_path()
	{
		let backend_url = url::Url::parse("https://example.com/relay/").unwrap();
		let notification = compose_notification(&request(), "a@example.com", "b@example.com",
			&backend_url).unwrap();

		assert!(notification.html_body.contains(
			"https://example.com/relay/deny-request?username=alice123"));
	}

	#[test]
	fn test_compose_notification_escapes_free_text()
	{
		let mut request = request();
		request.requester_name = "<script>alert(1)</script>".to_string();
		request.reason = "Tom & Jerry's \"review\"".to_string();

		let backend_url = url::Url::parse("https://relay.example.com").unwrap();
		let notification = compose_notification(&request, "a@example.com", "b@example.com",
			&backend_url).unwrap();

		assert!(!notification.html_body.contains("<script>"));
		assert!(notification.html_body.contains("&lt;script&gt;alert(1)"));
		assert!(notification.html_body.contains("Tom &amp; Jerry"));
		assert!(notification.html_body.contains("&quot;review&quot;"));
		assert!(!notification.html_body.contains("Jerry's"));
	}

	#[tokio::test]
	async fn test_from_config_keeps_password_secret()
	{
		let config = Config
		{
			smtp_host: default_smtp_host(),
			username: "relay@example.com".to_string(),
			password: "hunter2".to_string().into(),
			recipient: "admin@example.com".to_string(),
		};

		assert!(!format!("{:?}", config.password).contains("hunter2"));
		assert!(SmtpNotifier::from_config(&config).is_ok());
	}

	#[tokio::test]
	async fn test_invalid_sender_address_is_reported()
	{
		let config = Config
		{
			smtp_host: default_smtp_host(),
			username: "relay".to_string(),
			password: "hunter2".to_string().into(),
			recipient: "admin@example.com".to_string(),
		};
		let notifier = SmtpNotifier::from_config(&config).unwrap();

		let backend_url = url::Url::parse("https://relay.example.com").unwrap();
		let notification = compose_notification(&request(), "relay", "admin@example.com",
			&backend_url).unwrap();

		assert!(matches!(notifier.notify(notification).await,
			Err(crate::Error::ParseMailAddress{..})));
	}
}
