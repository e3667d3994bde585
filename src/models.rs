/// Raw form of an access request as submitted to `POST /submit-request`, before validation.
///
/// All fields are optional here so that missing fields are reported as validation errors rather
/// than as malformed payloads.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestForm
{
	/// The GitHub handle of the user who should be added as a collaborator.
	#[serde(default)]
	pub github_username: Option<String>,
	/// Why access is needed.
	#[serde(default)]
	pub reason: Option<String>,
	/// The name of the repository to which access is requested.
	#[serde(default)]
	pub repo_name: Option<String>,
	/// The real name of the person requesting access.
	#[serde(default)]
	pub requester_name: Option<String>,
	// Unknown fields are ignored
}

impl AccessRequestForm
{
	/// Collect the known fields from decoded `application/x-www-form-urlencoded` pairs. If a field
	/// occurs more than once, the last occurrence wins.
	pub fn from_pairs<I, K, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: Into<String>,
	{
		let mut form = Self::default();

		for (key, value) in pairs
		{
			let field = match key.as_ref()
			{
				"githubUsername" => &mut form.github_username,
				"reason" => &mut form.reason,
				"repoName" => &mut form.repo_name,
				"requesterName" => &mut form.requester_name,
				_ => continue,
			};

			*field = Some(value.into());
		}

		form
	}
}

/// A validated access request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AccessRequest
{
	pub github_username: String,
	pub reason: String,
	pub repo_name: String,
	pub requester_name: String,
}

/// Raw query parameters of the accept and deny links, before validation.
#[derive(Debug, Default, serde::Deserialize)]
pub struct AccessDecisionQueryForm
{
	/// The repository to grant access to (only required for accepting a request).
	#[serde(default)]
	pub repo: Option<String>,
	/// The GitHub handle of the requesting user.
	#[serde(default)]
	pub username: Option<String>,
}

/// Validated query parameters of an accept link.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GrantQuery
{
	pub repo: String,
	pub username: String,
}

/// Validated query parameters of a deny link.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DenyQuery
{
	pub username: String,
}

/// An email about a new access request, ready to be handed to a [crate::notifier::Notifier].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Notification
{
	/// Address of the sender.
	pub from: String,
	/// Address of the recipient.
	pub to: String,
	pub subject: String,
	/// The message body as an HTML document fragment.
	pub html_body: String,
}

/// Response type with a human-readable message (serialized to JSON).
#[derive(serde::Serialize)]
pub struct MessageResponse<'a>
{
	pub message: &'a str,
}

/// A problem with a single input field.
#[derive(Debug, Clone, Eq, PartialEq, serde::Serialize)]
pub struct FieldError
{
	/// The name of the field as it appears in the request.
	pub field: &'static str,
	/// Human-readable explanation of what’s wrong with the field.
	pub message: &'static str,
}

/// Response type listing all fields that failed validation (serialized to JSON).
#[derive(serde::Serialize)]
pub struct ValidationErrorResponse<'a>
{
	pub errors: &'a [FieldError],
}
