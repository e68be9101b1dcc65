//! HTTP client shared by the build system and version control clients

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::ManagerError;

/// Credentials attached to every request
#[derive(Debug, Clone)]
pub enum Auth {
    None,
    Basic {
        username: String,
        token: SecretString,
    },
    /// GitLab `PRIVATE-TOKEN` header
    PrivateToken(SecretString),
}

/// JSON client rooted at a base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    auth: Auth,
    /// Name used in upstream errors
    service: &'static str,
}

impl HttpClient {
    pub fn new(service: &'static str, base_url: &str, auth: Auth) -> Result<Self, ManagerError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            service,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let request = self.client.request(method, url);
        match &self.auth {
            Auth::None => request,
            Auth::Basic { username, token } => {
                request.basic_auth(username, Some(token.expose_secret()))
            }
            Auth::PrivateToken(token) => request.header("PRIVATE-TOKEN", token.expose_secret()),
        }
    }

    /// Turn a non-2xx response into an upstream error carrying its body
    async fn check(&self, method: Method, response: Response) -> Result<Response, ManagerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        error!("HTTP {} {} failed: {} - {}", method, url, status, body);
        Err(ManagerError::UpstreamStatus {
            service: self.service.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ManagerError> {
        let response = self.request(Method::GET, path).send().await?;
        let response = self.check(Method::GET, response).await?;
        Ok(response.json().await?)
    }

    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ManagerError> {
        let response = self.request(Method::GET, path).query(query).send().await?;
        let response = self.check(Method::GET, response).await?;
        Ok(response.json().await?)
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ManagerError> {
        let response = self.request(Method::GET, path).send().await?;
        let response = self.check(Method::GET, response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ManagerError> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        let response = self.check(Method::POST, response).await?;
        Ok(response.json().await?)
    }

    /// Form-encoded POST returning the raw response, for callers reading headers
    pub async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<Response, ManagerError> {
        let response = self.request(Method::POST, path).form(form).send().await?;
        self.check(Method::POST, response).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ManagerError> {
        let response = self.request(Method::PUT, path).json(body).send().await?;
        let response = self.check(Method::PUT, response).await?;
        Ok(response.json().await?)
    }
}
