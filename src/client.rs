use std::io::Read;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

const API_KEY_HEADER: &str = "X-Dataverse-key";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unable to fetch URL {url}. Reason: HTTP {status}. Message: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("Unable to reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },
    #[error("Could not decode the response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected response from {url}: missing {field}")]
    Shape {
        url: String,
        field: &'static str,
    },
}

impl ApiError {
    fn from_ureq(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => Self::Status {
                url: url.to_string(),
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => Self::Transport {
                url: url.to_string(),
                source: Box::new(t),
            },
        }
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Joins a base URL and an absolute API path without doubling the slash.
pub fn join(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn send(url: &str, request: ureq::Request, body: Option<&Value>) -> ApiResult<ureq::Response> {
    let result = match body {
        Some(json) => request.send_json(json),
        None => request.call(),
    };
    result.map_err(|e| ApiError::from_ureq(url, e))
}

/// GETs `url` anonymously and decodes the JSON body.
pub fn get_json<T: DeserializeOwned>(url: &str) -> ApiResult<T> {
    info!("Fetching data from {url}");
    send(url, ureq::get(url).set("Accept", "application/json"), None)?
        .into_json::<T>()
        .map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
}

/// GETs `url` and returns the raw body reader.
pub fn get_reader(url: &str) -> ApiResult<Box<dyn Read + Send + Sync + 'static>> {
    info!("Fetching data from {url}");
    Ok(send(url, ureq::get(url), None)?.into_reader())
}

pub fn get_string(url: &str) -> ApiResult<String> {
    info!("Fetching data from {url}");
    send(url, ureq::get(url), None)?
        .into_string()
        .map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
}

/// A Dataverse installation's native API, authenticated with an API token.
pub struct Dataverse<'a> {
    base_url: &'a str,
    api_token: Option<&'a str>,
}

impl<'a> Dataverse<'a> {
    pub fn new(base_url: &'a str, api_token: Option<&'a str>) -> Self {
        Self {
            base_url,
            api_token,
        }
    }

    pub fn url(&self, path: &str) -> String {
        join(self.base_url, path)
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let request = ureq::request(method, url).set("Accept", "application/json");
        match self.api_token {
            Some(token) => request.set(API_KEY_HEADER, token),
            None => request,
        }
    }

    fn call(&self, method: &str, path: &str, body: Option<&Value>) -> ApiResult<Value> {
        let url = self.url(path);
        info!("{method} {url}");
        send(&url, self.request(method, &url), body)?
            .into_json::<Value>()
            .map_err(|source| ApiError::Decode { url, source })
    }

    pub fn get(&self, path: &str) -> ApiResult<Value> {
        self.call("GET", path, None)
    }

    /// `GET /api/notifications/all`
    pub fn notifications(&self) -> ApiResult<Value> {
        self.get("/api/notifications/all")
    }

    /// Exports the draft version of a dataset in the Croissant format.
    pub fn draft_croissant(&self, pid: &str) -> ApiResult<Value> {
        self.get(&croissant_path(pid))
    }

    /// Creates a dataset in `collection` and returns its persistent identifier.
    pub fn create_dataset(&self, collection: &str, dataset: &Value) -> ApiResult<String> {
        let path = format!("/api/dataverses/{collection}/datasets");
        let response = self.call("POST", &path, Some(dataset))?;
        response["data"]["persistentId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Shape {
                url: self.url(&path),
                field: "data.persistentId",
            })
    }

    /// Replaces the given metadata fields of the dataset's draft version.
    pub fn edit_metadata(&self, pid: &str, fields: &Value) -> ApiResult<Value> {
        let path =
            format!("/api/datasets/:persistentId/editMetadata?persistentId={pid}&replace=true");
        self.call("PUT", &path, Some(fields))
    }
}

pub fn croissant_path(pid: &str) -> String {
    format!("/api/datasets/export?exporter=croissant&persistentId={pid}&version=:draft")
}
