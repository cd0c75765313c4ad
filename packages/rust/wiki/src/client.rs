//! MediaWiki Action API client.
//!
//! All requests use `format=json&formatversion=2`. Transient failures (network
//! errors, 5xx/429 responses, `maxlag`) are retried with exponential backoff.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use pagebot_shared::{Credentials, Document, PageBotError, Result, SaveFlags, WikiConfig};

use crate::retry::RetryPolicy;

/// Request parameters; continuation values are merged in by key.
pub(crate) type Params = BTreeMap<String, String>;

/// Build a parameter map from literal pairs.
pub(crate) fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Response shapes (formatversion=2)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PagesQuery {
    #[serde(default)]
    pub pages: Vec<PageInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageInfo {
    pub title: String,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub invalid: bool,
    #[serde(default)]
    pub redirect: bool,
    #[serde(default)]
    pub revisions: Vec<Revision>,
    #[serde(default)]
    pub categories: Vec<TitleRef>,
    #[serde(default)]
    pub templates: Vec<TitleRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Revision {
    pub slots: Slots,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Slots {
    pub main: Slot,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Slot {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TitleRef {
    #[serde(default)]
    pub ns: i64,
    pub title: String,
}

/// Deserialize `response.query` into `T`, treating an absent `query` as empty.
pub(crate) fn query_part<T: DeserializeOwned + Default>(response: &Value) -> Result<T> {
    match response.get("query") {
        Some(query) => T::deserialize(query)
            .map_err(|e| PageBotError::Unexpected(format!("unexpected API response: {e}"))),
        None => Ok(T::default()),
    }
}

// ---------------------------------------------------------------------------
// WikiClient
// ---------------------------------------------------------------------------

/// Thin async client over one wiki's `api.php`. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WikiClient {
    http: Client,
    api_url: Url,
    retry: RetryPolicy,
    dry_run: bool,
}

impl WikiClient {
    /// Build a client from the `[wiki]` config section.
    pub fn new(config: &WikiConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            PageBotError::config(format!("invalid wiki.api_url '{}': {e}", config.api_url))
        })?;
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| PageBotError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url,
            retry: RetryPolicy::from(config),
            dry_run: false,
        })
    }

    /// Log edits instead of sending them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    // -- Session -----------------------------------------------------------

    /// Log in with a bot password. The session cookie is kept by the client.
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        let token = self.token("login").await?;
        let mut form = params(&[("action", "login")]);
        form.insert("lgname".into(), credentials.username.clone());
        form.insert("lgpassword".into(), credentials.password.clone());
        form.insert("lgtoken".into(), token);

        let response = self.call(Method::POST, &form).await?;
        let login = &response["login"];
        match login["result"].as_str() {
            Some("Success") => {
                info!(user = login["lgusername"].as_str().unwrap_or_default(), "logged in");
                Ok(())
            }
            other => Err(PageBotError::Api {
                code: "login".into(),
                info: login["reason"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("login result {}", other.unwrap_or("missing"))),
            }),
        }
    }

    async fn token(&self, kind: &str) -> Result<String> {
        let mut query = params(&[("action", "query"), ("meta", "tokens")]);
        query.insert("type".into(), kind.into());
        let response = self.call(Method::GET, &query).await?;
        response["query"]["tokens"][format!("{kind}token")]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PageBotError::Unexpected(format!("no {kind} token in response")))
    }

    // -- Pages -------------------------------------------------------------

    /// Fetch the latest text of `title` along with its existence and redirect state.
    #[instrument(skip(self))]
    pub async fn fetch_document(&self, title: &str) -> Result<Document> {
        let mut query = params(&[
            ("action", "query"),
            ("prop", "info|revisions"),
            ("rvprop", "content"),
            ("rvslots", "main"),
        ]);
        query.insert("titles".into(), title.into());

        let response = self.call(Method::GET, &query).await?;
        let pages: PagesQuery = query_part(&response)?;
        let Some(page) = pages.pages.into_iter().next() else {
            return Err(PageBotError::Unexpected(format!("no page returned for '{title}'")));
        };

        let exists = !page.missing && !page.invalid;
        let text = page
            .revisions
            .into_iter()
            .next()
            .map(|rev| rev.slots.main.content)
            .unwrap_or_default();
        debug!(title = %page.title, exists, redirect = page.redirect, len = text.len(), "fetched page");

        Ok(Document {
            title: page.title,
            text,
            exists,
            redirect: page.redirect,
        })
    }

    /// Replace the text of `title`. In dry-run mode the edit is only logged.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn save(&self, title: &str, text: &str, summary: &str, flags: SaveFlags) -> Result<()> {
        if self.dry_run {
            info!(%title, %summary, "dry run: edit not sent");
            return Ok(());
        }

        let token = self.token("csrf").await?;
        let mut form = params(&[
            ("action", "edit"),
            ("watchlist", "nochange"),
            (if flags.minor { "minor" } else { "notminor" }, "1"),
        ]);
        if flags.bot {
            form.insert("bot".into(), "1".into());
        }
        form.insert("title".into(), title.into());
        form.insert("text".into(), text.into());
        form.insert("summary".into(), summary.into());
        form.insert("token".into(), token);

        let response = self.call(Method::POST, &form).await?;
        match response["edit"]["result"].as_str() {
            Some("Success") => {
                let nochange = response["edit"]["nochange"].as_bool().unwrap_or(false);
                info!(%title, nochange, "saved");
                Ok(())
            }
            other => Err(PageBotError::Api {
                code: "edit".into(),
                info: format!("edit result {}", other.unwrap_or("missing")),
            }),
        }
    }

    // -- Transport ---------------------------------------------------------

    /// Run a query and follow its `continue` values until exhausted.
    pub(crate) async fn query_all(&self, base: Params) -> Result<Vec<Value>> {
        let mut responses = Vec::new();
        let mut query = base.clone();
        loop {
            let response = self.call(Method::GET, &query).await?;
            let next = next_query(&base, &response);
            responses.push(response);
            match next {
                Some(next) => query = next,
                None => return Ok(responses),
            }
        }
    }

    /// One API call with retries for transient failures.
    pub(crate) async fn call(&self, method: Method, params: &Params) -> Result<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call_once(method.clone(), params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt <= self.retry.max_retries => {
                    let delay = self.retry.backoff_delay(attempt);
                    warn!(attempt, ?delay, error = %e, "transient API failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once(&self, method: Method, params: &Params) -> Result<Value> {
        let base = [("format", "json"), ("formatversion", "2")];
        let request = if method == Method::POST {
            let mut form: Vec<(&str, &str)> = base.to_vec();
            form.extend(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            self.http.post(self.api_url.clone()).form(&form)
        } else {
            self.http
                .request(method, self.api_url.clone())
                .query(&base)
                .query(params)
        };

        let response = request
            .send()
            .await
            .map_err(|e| PageBotError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PageBotError::Network(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(PageBotError::Api {
                code: format!("http-{}", status.as_u16()),
                info: status.to_string(),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| PageBotError::Network(format!("invalid JSON response: {e}")))?;

        if let Some(error) = value.get("error") {
            return Err(PageBotError::Api {
                code: error["code"].as_str().unwrap_or("unknown").to_string(),
                info: error["info"].as_str().unwrap_or_default().to_string(),
            });
        }
        Ok(value)
    }
}

/// The request following `response`: `base` plus the response's latest
/// `continue` object. Values from earlier batches are not carried over.
/// Returns `None` when there is nothing left to fetch.
pub(crate) fn next_query(base: &Params, response: &Value) -> Option<Params> {
    let cont = response.get("continue").and_then(Value::as_object)?;
    let mut query = base.clone();
    for (key, value) in cont {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        query.insert(key.clone(), value);
    }
    Some(query)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn client_for(server: &MockServer) -> WikiClient {
        let config = WikiConfig {
            api_url: format!("{}/api.php", server.uri()),
            max_retries: 2,
            retry_base_delay_ms: 1,
            ..WikiConfig::default()
        };
        WikiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn fetches_existing_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("prop", "info|revisions"))
            .and(query_param("titles", "Foo"))
            .and(query_param("formatversion", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{
                    "pageid": 1, "ns": 0, "title": "Foo",
                    "revisions": [{"slots": {"main": {"content": "hello"}}}]
                }]}
            })))
            .mount(&server)
            .await;

        let doc = client_for(&server).await.fetch_document("Foo").await.unwrap();
        assert_eq!(doc, Document::new("Foo", "hello"));
    }

    #[tokio::test]
    async fn reports_missing_and_redirect_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("titles", "Gone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{"ns": 0, "title": "Gone", "missing": true}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("titles", "Alias"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{
                    "pageid": 2, "ns": 0, "title": "Alias", "redirect": true,
                    "revisions": [{"slots": {"main": {"content": "#REDIRECT [[Foo]]"}}}]
                }]}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let gone = client.fetch_document("Gone").await.unwrap();
        assert!(!gone.exists);
        assert!(gone.text.is_empty());

        let alias = client.fetch_document("Alias").await.unwrap();
        assert!(alias.exists);
        assert!(alias.redirect);
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": [{"title": "Foo", "revisions": [{"slots": {"main": {"content": "x"}}}]}]}
            })))
            .mount(&server)
            .await;

        let doc = client_for(&server).await.fetch_document("Foo").await.unwrap();
        assert_eq!(doc.text, "x");
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": "maxlag", "info": "Waiting for a database server"}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_document("Foo").await.unwrap_err();
        assert!(matches!(err, PageBotError::Api { ref code, .. } if code == "maxlag"));
    }

    #[tokio::test]
    async fn api_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": "badtoken", "info": "Invalid CSRF token."}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_document("Foo").await.unwrap_err();
        assert_eq!(err.to_string(), "api error badtoken: Invalid CSRF token.");
    }

    #[tokio::test]
    async fn save_sends_edit_with_csrf_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("meta", "tokens"))
            .and(query_param("type", "csrf"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"tokens": {"csrftoken": "abc+\\"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("action=edit"))
            .and(body_string_contains("title=Foo"))
            .and(body_string_contains("notminor=1"))
            .and(body_string_contains("watchlist=nochange"))
            .and(body_string_contains("token=abc%2B%5C"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "edit": {"result": "Success", "title": "Foo"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .save("Foo", "new text", "summary", SaveFlags::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dry_run_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await.with_dry_run(true);
        assert!(client.is_dry_run());
        client
            .save("Foo", "text", "summary", SaveFlags::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn login_uses_login_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("type", "login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"tokens": {"logintoken": "tok"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("action=login"))
            .and(body_string_contains("lgname=Bot%40tool"))
            .and(body_string_contains("lgtoken=tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "login": {"result": "Success", "lgusername": "Bot"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let creds = Credentials {
            username: "Bot@tool".into(),
            password: "secret".into(),
        };
        client_for(&server).await.login(&creds).await.unwrap();
    }

    #[tokio::test]
    async fn failed_login_reports_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"tokens": {"logintoken": "tok"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "login": {"result": "Failed", "reason": "Incorrect password"}
            })))
            .mount(&server)
            .await;

        let creds = Credentials {
            username: "Bot".into(),
            password: "wrong".into(),
        };
        let err = client_for(&server).await.login(&creds).await.unwrap_err();
        assert_eq!(err.to_string(), "api error login: Incorrect password");
    }

    #[test]
    fn next_query_uses_latest_continue_only() {
        let base = params(&[("action", "query")]);
        let first = json!({"continue": {"clcontinue": "2|Compilation_albums", "continue": "||"}});
        let query = next_query(&base, &first).unwrap();
        assert_eq!(query["clcontinue"], "2|Compilation_albums");
        assert_eq!(query["continue"], "||");

        let second = json!({"continue": {"gcmcontinue": "page|X|9", "continue": "gcmcontinue||"}});
        let query = next_query(&base, &second).unwrap();
        assert_eq!(query["action"], "query");
        assert_eq!(query["gcmcontinue"], "page|X|9");
        assert_eq!(query["continue"], "gcmcontinue||");
        assert!(!query.contains_key("clcontinue"));

        assert!(next_query(&base, &json!({"batchcomplete": true})).is_none());
    }

    #[test]
    fn rejects_invalid_api_url() {
        let config = WikiConfig {
            api_url: "::not a url".into(),
            ..WikiConfig::default()
        };
        assert!(WikiClient::new(&config).is_err());
    }
}
