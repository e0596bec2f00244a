use crate::error::CustomResourceError;
use crate::model::{CustomResourceRequest, CustomResourceResponse, RequestStatus};
use crate::response::TransportResponse;

/// Everything that happened during one custom resource invocation.
#[derive(Debug)]
pub struct CustomResourceResult {
    request: CustomResourceRequest,
    response: CustomResourceResponse,
    transport_response: Option<TransportResponse>,
    succeeded: bool,
    error: Option<CustomResourceError>,
}

impl CustomResourceResult {
    /// Classifies a completed upload. Succeeds only when the resource reported `SUCCESS`
    /// and the response URL answered 2xx.
    pub fn new(request: CustomResourceRequest, response: CustomResourceResponse, transport_response: TransportResponse) -> Self {
        let error = if !transport_response.is_success() {
            Some(CustomResourceError::Rejected {
                status: transport_response.status_code,
                body: transport_response.body.clone(),
            })
        } else {
            match (response.status(), response.reason()) {
                (RequestStatus::Success, _) => None,
                (RequestStatus::Failed, reason) => Some(CustomResourceError::ResourceFailed {
                    reason: reason.unwrap_or_default().into(),
                }),
            }
        };

        CustomResourceResult {
            request: request,
            response: response,
            transport_response: Some(transport_response),
            succeeded: error.is_none(),
            error: error,
        }
    }

    pub fn with_error(request: CustomResourceRequest, response: CustomResourceResponse, transport_response: Option<TransportResponse>, error: CustomResourceError) -> Self {
        CustomResourceResult {
            request: request,
            response: response,
            transport_response: transport_response,
            succeeded: false,
            error: Some(error),
        }
    }

    pub fn request(&self) -> &CustomResourceRequest {
        &self.request
    }

    pub fn response(&self) -> &CustomResourceResponse {
        &self.response
    }

    pub fn transport_response(&self) -> Option<&TransportResponse> {
        self.transport_response.as_ref()
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn error(&self) -> Option<&CustomResourceError> {
        self.error.as_ref()
    }

    pub fn into_parts(self) -> (CustomResourceRequest, CustomResourceResponse, Option<TransportResponse>, Option<CustomResourceError>) {
        (self.request, self.response, self.transport_response, self.error)
    }
}
