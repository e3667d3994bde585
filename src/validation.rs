//! Shape checks for all inbound fields.
//!
//! Validation never fails hard. Either a complete, valid record is produced, or every offending
//! field is reported so that the client can fix all of them at once.

use crate::{AccessDecisionQueryForm, AccessRequest, AccessRequestForm, DenyQuery, FieldError,
	GrantQuery};

pub const INVALID_GITHUB_USERNAME: &str = "Invalid GitHub username";
pub const INVALID_REPOSITORY_NAME: &str = "Invalid repository name";
pub const REASON_TOO_SHORT: &str = "Reason must be at least 5 characters long";
pub const NAME_REQUIRED: &str = "Name is required";

/// The minimum number of characters a reason needs to have.
pub const MIN_REASON_LENGTH: usize = 5;

#[doc(hidden)]
fn github_username_pattern() -> &'static regex::Regex
{
	static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

	PATTERN.get_or_init(||
		regex::Regex::new("^[A-Za-z0-9]+$")
			.expect("this call is infallible because we know the pattern to be well-formed"))
}

#[doc(hidden)]
fn repository_name_pattern() -> &'static regex::Regex
{
	static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

	PATTERN.get_or_init(||
		regex::Regex::new("^[A-Za-z0-9_-]+$")
			.expect("this call is infallible because we know the pattern to be well-formed"))
}

/// Whether the value is a GitHub username made only of ASCII letters and digits.
pub fn is_valid_github_username(value: &str) -> bool
{
	github_username_pattern().is_match(value)
}

/// Whether the value is a repository name made only of ASCII letters, digits, hyphens, and
/// underscores.
pub fn is_valid_repository_name(value: &str) -> bool
{
	repository_name_pattern().is_match(value)
}

pub fn is_valid_reason(value: &str) -> bool
{
	value.chars().count() >= MIN_REASON_LENGTH
}

pub fn is_valid_requester_name(value: &str) -> bool
{
	!value.trim().is_empty()
}

/// Collects field errors while the fields of a record are checked one by one.
#[derive(Default)]
struct Checker
{
	errors: Vec<FieldError>,
}

impl Checker
{
	/// Check a single field, recording an error if it’s missing or doesn’t pass the check. Missing
	/// fields are checked as if they were empty.
	fn check(&mut self, field: &'static str, value: Option<&str>, is_valid: fn(&str) -> bool,
		message: &'static str)
		-> String
	{
		let value = value.unwrap_or_default();

		if !is_valid(value)
		{
			self.errors.push(FieldError{field, message});
		}

		value.to_string()
	}

	fn finish<T>(self, record: T) -> Result<T, Vec<FieldError>>
	{
		match self.errors.is_empty()
		{
			true => Ok(record),
			false => Err(self.errors),
		}
	}
}

/// Validate the fields of a submitted access request.
pub fn validate_access_request(form: &AccessRequestForm) -> Result<AccessRequest, Vec<FieldError>>
{
	let mut checker = Checker::default();

	let github_username = checker.check("githubUsername", form.github_username.as_deref(),
		is_valid_github_username, INVALID_GITHUB_USERNAME);
	let reason = checker.check("reason", form.reason.as_deref(), is_valid_reason,
		REASON_TOO_SHORT);
	let requester_name = checker.check("requesterName", form.requester_name.as_deref(),
		is_valid_requester_name, NAME_REQUIRED);
	let repo_name = checker.check("repoName", form.repo_name.as_deref(), is_valid_repository_name,
		INVALID_REPOSITORY_NAME);

	checker.finish(AccessRequest{github_username, reason, repo_name, requester_name})
}

/// Validate the query parameters of an accept link.
pub fn validate_grant_query(form: &AccessDecisionQueryForm) -> Result<GrantQuery, Vec<FieldError>>
{
	let mut checker = Checker::default();

	let repo = checker.check("repo", form.repo.as_deref(), is_valid_repository_name,
		INVALID_REPOSITORY_NAME);
	let username = checker.check("username", form.username.as_deref(), is_valid_github_username,
		INVALID_GITHUB_USERNAME);

	checker.finish(GrantQuery{repo, username})
}

/// Validate the query parameters of a deny link. The repository isn’t needed and thus ignored.
pub fn validate_deny_query(form: &AccessDecisionQueryForm) -> Result<DenyQuery, Vec<FieldError>>
{
	let mut checker = Checker::default();

	let username = checker.check("username", form.username.as_deref(), is_valid_github_username,
		INVALID_GITHUB_USERNAME);

	checker.finish(DenyQuery{username})
}
