use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{self, Value};
use url::Url;

use crate::error::{BoxError, CustomResourceError};
use crate::model::{CustomResourceRequest, CustomResourceResponse, RequestStatus, StackOperation};
use crate::result::CustomResourceResult;

const NO_ECHO_KEY: &str = "NoEcho";
const DATA_KEY: &str = "Data";
const REASON_KEY: &str = "Reason";

/// Serializes `response`, dropping the keys CloudFormation does not accept for `operation`.
///
/// Failed responses never carry `NoEcho` or `Data`, and neither do deletes. A successful
/// delete additionally drops `Reason`.
pub fn fix_up_response_json(response: &CustomResourceResponse, operation: StackOperation) -> Result<String, serde_json::Error> {
    let removed: &[&str] = match (operation, response.status()) {
        (StackOperation::Create, RequestStatus::Success) | (StackOperation::Update, RequestStatus::Success) => &[],
        (StackOperation::Create, RequestStatus::Failed) | (StackOperation::Update, RequestStatus::Failed) => &[NO_ECHO_KEY, DATA_KEY],
        (StackOperation::Delete, RequestStatus::Failed) => &[NO_ECHO_KEY, DATA_KEY],
        (StackOperation::Delete, RequestStatus::Success) => &[NO_ECHO_KEY, DATA_KEY, REASON_KEY],
    };

    match serde_json::to_value(response)? {
        Value::Object(obj) => {
            let pruned: serde_json::Map<String, Value> = obj.into_iter()
                .filter(|(key, _)| !removed.contains(&&key[..]))
                .collect();
            serde_json::to_string(&pruned)
        },
        value => serde_json::to_string(&value),
    }
}

/// What came back from the response URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransportResponse {
    pub status_code: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new<S: Into<String>>(status_code: u16, body: S) -> Self {
        TransportResponse {
            status_code: status_code,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Sends a raw PUT body to a presigned URL.
///
/// Implementations must not add a `Content-Type` header: it is not part of the presigned
/// signature and the upload is rejected with a 403.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn put(&self, url: &Url, body: Vec<u8>) -> Result<TransportResponse, BoxError>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn put(&self, url: &Url, body: Vec<u8>) -> Result<TransportResponse, BoxError> {
        let response = reqwest::Client::put(self, url.clone()).body(body).send().await?;
        let status_code = response.status().as_u16();
        // The status is what counts once it has arrived
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!("Failed to read response url body: {}", err);
                String::new()
            },
        };
        Ok(TransportResponse::new(status_code, body))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Utf8
    }
}

impl TextEncoding {
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match *self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf16Le => text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
            TextEncoding::Utf16Be => text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect(),
        }
    }
}

/// `content` with `Data` masked when the provider asked for `NoEcho`.
fn loggable(content: &str, no_echo: bool) -> String {
    if !no_echo {
        return content.to_owned()
    }

    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(mut obj)) => {
            if let Some(data) = obj.get_mut(DATA_KEY) {
                *data = Value::String("*****".into());
            }
            Value::Object(obj).to_string()
        },
        _ => String::new(),
    }
}

/// Delivers a response to CloudFormation.
#[async_trait]
pub trait ResponsePublisher: Send + Sync {
    fn fix_up_response_json(&self, response: &CustomResourceResponse, operation: StackOperation) -> Result<String, serde_json::Error> {
        fix_up_response_json(response, operation)
    }

    async fn upload_response(&self, request: &CustomResourceRequest, response: &CustomResourceResponse) -> Result<TransportResponse, CustomResourceError>;

    /// Uploads the response and classifies the outcome. Never fails.
    async fn put_response(&self, request: CustomResourceRequest, response: CustomResourceResponse) -> CustomResourceResult {
        match self.upload_response(&request, &response).await {
            Ok(transport_response) => CustomResourceResult::new(request, response, transport_response),
            Err(err) => CustomResourceResult::with_error(request, response, None, err),
        }
    }
}

/// Uploads responses with a long-lived [`Transport`], one attempt per response.
#[derive(Clone, Debug)]
pub struct DefaultPublisher<T = reqwest::Client> {
    transport: T,
    encoding: TextEncoding,
}

impl<T: Transport> DefaultPublisher<T> {
    pub fn new(transport: T) -> Self {
        DefaultPublisher {
            transport: transport,
            encoding: Default::default(),
        }
    }

    pub fn with_encoding(self, encoding: TextEncoding) -> Self {
        DefaultPublisher {
            encoding: encoding,
            .. self
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }
}

#[async_trait]
impl<T: Transport> ResponsePublisher for DefaultPublisher<T> {
    async fn upload_response(&self, request: &CustomResourceRequest, response: &CustomResourceResponse) -> Result<TransportResponse, CustomResourceError> {
        let content = self.fix_up_response_json(response, request.request_type())?;
        debug!("Attempting to send response to pre-signed url: {}", loggable(&content, response.no_echo()));

        let transport_response = self.transport.put(request.response_url(), self.encoding.encode(&content)).await
            .map_err(CustomResourceError::Transport)?;
        info!("Response url returned {}", transport_response.status_code);

        Ok(transport_response)
    }
}
