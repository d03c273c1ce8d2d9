use crate::options::Cli;
use std::time::Duration;

/// Builds and configures the HTTP client based on the provided CLI options.
///
/// The same client is used for the sitemap download and the reporting API.
/// It carries no credentials; the reporting client attaches its bearer token
/// per request so the token never reaches the sitemap host.
///
/// # Arguments
///
/// * `options` - A reference to the CLI options containing client configuration settings.
///
/// # Returns
///
/// A `Result` containing the built `Client` if successful, or an error otherwise.
pub fn build_client(options: &Cli) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(options.user_agent.as_str())
        .timeout(Duration::from_secs(options.request_timeout as u64))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// Fetches the raw body of a given URL.
///
/// This function sends a GET request to the specified URL using the provided
/// asynchronous HTTP client (`reqwest::Client`). It ensures the response has
/// a successful HTTP status code, then returns the body bytes untouched so the
/// caller can decide how to decode them (plain text or gzip).
///
/// # Errors
///
/// This function will return an error if:
/// - The GET request fails (e.g., network issues, timeout).
/// - The HTTP response status is not successful (e.g., 4xx or 5xx error).
/// - The response body cannot be read.
pub async fn get_url_bytes(
    url: &str,
    client: &reqwest::Client,
) -> Result<Vec<u8>, reqwest::Error> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    Ok(bytes.to_vec())
}
