use std::fmt;
use std::str::FromStr;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ValidationError;
use crate::Map;

/// Physical id reported for a resource whose creation failed before it had an id of its own.
pub const PHYSICAL_RESOURCE_ID_FAILURE: &str = "FAILURE";
pub const SERVICE_TOKEN_KEY: &str = "ServiceToken";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StackOperation {
    Create,
    Update,
    Delete,
}

impl StackOperation {
    pub fn as_str(&self) -> &'static str {
        match *self {
            StackOperation::Create => "Create",
            StackOperation::Update => "Update",
            StackOperation::Delete => "Delete",
        }
    }
}

impl fmt::Display for StackOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackOperation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.to_ascii_lowercase()[..] {
            "create" => Ok(StackOperation::Create),
            "update" => Ok(StackOperation::Update),
            "delete" => Ok(StackOperation::Delete),
            _ => Err(ValidationError::UnknownOperation(s.into())),
        }
    }
}

impl Serialize for StackOperation {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StackOperation {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?.parse().map_err(de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Success,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match *self {
            RequestStatus::Success => "SUCCESS",
            RequestStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.to_ascii_uppercase()[..] {
            "SUCCESS" => Ok(RequestStatus::Success),
            "FAILED" => Ok(RequestStatus::Failed),
            _ => Err(ValidationError::UnknownStatus(s.into())),
        }
    }
}

impl Serialize for RequestStatus {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RequestStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?.parse().map_err(de::Error::custom)
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ValidationError> {
    value.filter(|v| !v.is_empty()).ok_or(ValidationError::MissingField(name))
}

/// An inbound CloudFormation custom resource request.
///
/// Only constructed through [`CustomResourceRequest::new`] or deserialization, both of
/// which reject requests that break the protocol's field requirements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", try_from = "RawRequest")]
pub struct CustomResourceRequest {
    request_type: StackOperation,
    #[serde(rename = "ResponseURL")]
    response_url: Url,
    stack_id: String,
    request_id: String,
    resource_type: String,
    logical_resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    physical_resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_properties: Option<Map>,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_resource_properties: Option<Map>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRequest {
    #[serde(alias = "requestType")]
    request_type: Option<StackOperation>,
    #[serde(rename = "ResponseURL", alias = "ResponseUrl", alias = "responseUrl", alias = "responseURL")]
    response_url: Option<String>,
    #[serde(alias = "stackId")]
    stack_id: Option<String>,
    #[serde(alias = "requestId")]
    request_id: Option<String>,
    #[serde(alias = "resourceType")]
    resource_type: Option<String>,
    #[serde(alias = "logicalResourceId")]
    logical_resource_id: Option<String>,
    #[serde(alias = "physicalResourceId")]
    physical_resource_id: Option<String>,
    #[serde(alias = "resourceProperties")]
    resource_properties: Option<Map>,
    #[serde(alias = "oldResourceProperties")]
    old_resource_properties: Option<Map>,
}

impl TryFrom<RawRequest> for CustomResourceRequest {
    type Error = ValidationError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        CustomResourceRequest::new(
            raw.request_type.ok_or(ValidationError::MissingField("RequestType"))?,
            &required(raw.response_url, "ResponseURL")?,
            required(raw.stack_id, "StackId")?,
            required(raw.request_id, "RequestId")?,
            required(raw.resource_type, "ResourceType")?,
            required(raw.logical_resource_id, "LogicalResourceId")?,
            raw.physical_resource_id,
            raw.resource_properties,
            raw.old_resource_properties,
        )
    }
}

impl CustomResourceRequest {
    /// `physical_resource_id` is dropped for `Create` and required otherwise;
    /// `old_resource_properties` is required for `Update` and dropped otherwise.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_type: StackOperation,
        response_url: &str,
        stack_id: String,
        request_id: String,
        resource_type: String,
        logical_resource_id: String,
        physical_resource_id: Option<String>,
        resource_properties: Option<Map>,
        old_resource_properties: Option<Map>,
    ) -> Result<Self, ValidationError> {
        if response_url.is_empty() {
            return Err(ValidationError::MissingField("ResponseURL"));
        }
        let response_url = Url::parse(response_url).map_err(|source| ValidationError::InvalidUrl {
            url: response_url.into(),
            source,
        })?;

        let physical_resource_id = match request_type {
            StackOperation::Create => None,
            StackOperation::Update | StackOperation::Delete =>
                Some(required(physical_resource_id, "PhysicalResourceId")?),
        };

        let old_resource_properties = match request_type {
            StackOperation::Update =>
                Some(old_resource_properties.ok_or(ValidationError::MissingField("OldResourceProperties"))?),
            StackOperation::Create | StackOperation::Delete => None,
        };

        Ok(CustomResourceRequest {
            request_type: request_type,
            response_url: response_url,
            stack_id: required(Some(stack_id), "StackId")?,
            request_id: required(Some(request_id), "RequestId")?,
            resource_type: required(Some(resource_type), "ResourceType")?,
            logical_resource_id: required(Some(logical_resource_id), "LogicalResourceId")?,
            physical_resource_id: physical_resource_id,
            resource_properties: resource_properties,
            old_resource_properties: old_resource_properties,
        })
    }

    pub fn request_type(&self) -> StackOperation {
        self.request_type
    }

    pub fn response_url(&self) -> &Url {
        &self.response_url
    }

    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn logical_resource_id(&self) -> &str {
        &self.logical_resource_id
    }

    pub fn physical_resource_id(&self) -> Option<&str> {
        self.physical_resource_id.as_ref().map(|s| &s[..])
    }

    pub fn resource_properties(&self) -> Option<&Map> {
        self.resource_properties.as_ref()
    }

    pub fn old_resource_properties(&self) -> Option<&Map> {
        self.old_resource_properties.as_ref()
    }

    /// Deserializes `ResourceProperties` into `T`, ignoring the `ServiceToken` entry.
    pub fn resource_properties_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        properties_as(self.resource_properties.as_ref())
    }

    pub fn old_resource_properties_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        properties_as(self.old_resource_properties.as_ref())
    }
}

fn properties_as<T: DeserializeOwned>(properties: Option<&Map>) -> Result<T, serde_json::Error> {
    let mut properties = properties.cloned().unwrap_or_default();
    // Not necessary and can conflict with serde(deny_unknown_fields)
    properties.remove(SERVICE_TOKEN_KEY);
    properties.deserialize_into()
}

/// The outcome reported back to CloudFormation through the request's `ResponseURL`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", try_from = "RawResponse")]
pub struct CustomResourceResponse {
    status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    physical_resource_id: String,
    stack_id: String,
    request_id: String,
    logical_resource_id: String,
    no_echo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Map>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawResponse {
    status: Option<RequestStatus>,
    reason: Option<String>,
    physical_resource_id: Option<String>,
    stack_id: Option<String>,
    request_id: Option<String>,
    logical_resource_id: Option<String>,
    #[serde(default)]
    no_echo: bool,
    data: Option<Map>,
}

impl TryFrom<RawResponse> for CustomResourceResponse {
    type Error = ValidationError;

    fn try_from(raw: RawResponse) -> Result<Self, Self::Error> {
        CustomResourceResponse::new(
            raw.status.ok_or(ValidationError::MissingField("Status"))?,
            raw.reason,
            required(raw.physical_resource_id, "PhysicalResourceId")?,
            required(raw.stack_id, "StackId")?,
            required(raw.request_id, "RequestId")?,
            required(raw.logical_resource_id, "LogicalResourceId")?,
            raw.no_echo,
            raw.data,
        )
    }
}

impl CustomResourceResponse {
    /// A `Failed` response must carry a non-empty `reason`; an empty reason is treated as none.
    #[allow(clippy::too_many_arguments)]
    pub fn new<P, S, R, L>(
        status: RequestStatus,
        reason: Option<String>,
        physical_resource_id: P,
        stack_id: S,
        request_id: R,
        logical_resource_id: L,
        no_echo: bool,
        data: Option<Map>,
    ) -> Result<Self, ValidationError> where
        P: Into<String>,
        S: Into<String>,
        R: Into<String>,
        L: Into<String>,
    {
        let reason = reason.filter(|r| !r.is_empty());
        if status == RequestStatus::Failed && reason.is_none() {
            return Err(ValidationError::MissingField("Reason"));
        }

        Ok(CustomResourceResponse {
            status: status,
            reason: reason,
            physical_resource_id: required(Some(physical_resource_id.into()), "PhysicalResourceId")?,
            stack_id: required(Some(stack_id.into()), "StackId")?,
            request_id: required(Some(request_id.into()), "RequestId")?,
            logical_resource_id: required(Some(logical_resource_id.into()), "LogicalResourceId")?,
            no_echo: no_echo,
            data: data,
        })
    }

    /// Builds a response that echoes the request's identifiers.
    ///
    /// A `Create` request has no physical id yet: a `Failed` response reports
    /// [`PHYSICAL_RESOURCE_ID_FAILURE`], a `Success` response must use
    /// [`CustomResourceResponse::for_resource`] instead.
    pub fn from_request(status: RequestStatus, reason: Option<String>, request: &CustomResourceRequest) -> Result<Self, ValidationError> {
        let physical_resource_id = match (request.physical_resource_id(), status) {
            (Some(id), _) => id,
            (None, RequestStatus::Failed) => PHYSICAL_RESOURCE_ID_FAILURE,
            (None, RequestStatus::Success) => return Err(ValidationError::MissingField("PhysicalResourceId")),
        };
        Self::for_resource(status, reason, physical_resource_id, request)
    }

    pub fn for_resource<P: Into<String>>(status: RequestStatus, reason: Option<String>, physical_resource_id: P, request: &CustomResourceRequest) -> Result<Self, ValidationError> {
        Self::new(
            status,
            reason,
            physical_resource_id,
            request.stack_id(),
            request.request_id(),
            request.logical_resource_id(),
            false,
            None,
        )
    }

    pub fn success(request: &CustomResourceRequest) -> Result<Self, ValidationError> {
        Self::from_request(RequestStatus::Success, None, request)
    }

    pub fn failed<S: Into<String>>(request: &CustomResourceRequest, reason: S) -> Result<Self, ValidationError> {
        Self::from_request(RequestStatus::Failed, Some(reason.into()), request)
    }

    /// Failure report for a provider that returned an error instead of a response.
    pub(crate) fn failure(request: &CustomResourceRequest, reason: String) -> Self {
        let reason = if reason.is_empty() {
            format!("{} of {} failed", request.request_type(), request.logical_resource_id())
        } else {
            reason
        };

        CustomResourceResponse {
            status: RequestStatus::Failed,
            reason: Some(reason),
            physical_resource_id: request.physical_resource_id().unwrap_or(PHYSICAL_RESOURCE_ID_FAILURE).into(),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            no_echo: false,
            data: None,
        }
    }

    pub fn with_data(self, data: Map) -> Self {
        CustomResourceResponse {
            data: Some(data),
            .. self
        }
    }

    pub fn with_no_echo(self, no_echo: bool) -> Self {
        CustomResourceResponse {
            no_echo: no_echo,
            .. self
        }
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_ref().map(|s| &s[..])
    }

    pub fn physical_resource_id(&self) -> &str {
        &self.physical_resource_id
    }

    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn logical_resource_id(&self) -> &str {
        &self.logical_resource_id
    }

    pub fn no_echo(&self) -> bool {
        self.no_echo
    }

    pub fn data(&self) -> Option<&Map> {
        self.data.as_ref()
    }
}
