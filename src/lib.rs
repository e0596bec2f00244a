pub use lambda_runtime::{Context, LambdaEvent};
pub use serde_json::Value;
use std::collections::HashMap;
use lambda_runtime::service_fn;
use log::warn;
use serde::Deserialize;

mod error;
mod map;
pub mod model;
pub mod response;
pub mod result;
pub mod handler;
#[cfg(feature = "env_logger")]
pub mod logging;

pub use error::{BoxError, CustomResourceError, Error, ValidationError};
pub use map::Map;
pub use model::{CustomResourceRequest, CustomResourceResponse, RequestStatus, StackOperation};
pub use response::{DefaultPublisher, ResponsePublisher, TextEncoding, Transport, TransportResponse};
pub use result::CustomResourceResult;
pub use handler::{execute, CustomResource, CustomResourceFactory, CustomResourceHandler};

use model::PHYSICAL_RESOURCE_ID_FAILURE;

pub fn decode_event(event: Value) -> Result<CustomResourceRequest, serde_json::Error> {
    CustomResourceRequest::deserialize(event)
}

/// Answers a request for a resource type nobody provides.
pub async fn unhandled<P: ResponsePublisher + ?Sized>(publisher: &P, request: CustomResourceRequest) -> CustomResourceResult {
    warn!("No provider registered for ResourceType {}", request.resource_type());

    let response = match (request.request_type(), request.physical_resource_id()) {
        (StackOperation::Delete, Some(PHYSICAL_RESOURCE_ID_FAILURE)) => CustomResourceResponse::success(&request),
        _ => CustomResourceResponse::failed(&request, format!("Unknown ResourceType {}", request.resource_type())),
    };
    let response = match response {
        Ok(response) => response,
        Err(err) => CustomResourceResponse::failure(&request, err.to_string()),
    };

    let result = publisher.put_response(request, response).await;
    if !result.succeeded() {
        handler::log_failure(&result);
    }
    result
}

/// Dispatches requests to providers by `ResourceType`.
pub struct CustomResourceRouter<P> {
    publisher: P,
    resources: HashMap<String, Box<dyn CustomResource>>,
}

impl<P: ResponsePublisher> CustomResourceRouter<P> {
    pub fn new(publisher: P) -> Self {
        CustomResourceRouter {
            publisher: publisher,
            resources: HashMap::new(),
        }
    }

    pub fn register<S: Into<String>, R: CustomResource + 'static>(mut self, resource_type: S, resource: R) -> Self {
        self.resources.insert(resource_type.into(), Box::new(resource));
        self
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Malformed events are returned as errors: without a valid request there is no
    /// response URL to report to.
    pub async fn handle(&self, event: LambdaEvent<Value>) -> Result<CustomResourceResult, Error> {
        let LambdaEvent { payload, context } = event;
        let request = decode_event(payload)?;

        Ok(match self.resources.get(request.resource_type()) {
            Some(resource) => execute(resource.as_ref(), &self.publisher, request, &context).await,
            None => unhandled(&self.publisher, request).await,
        })
    }
}

/// Serves `router` on the Lambda runtime until the runtime shuts down.
pub async fn run<P: ResponsePublisher>(router: CustomResourceRouter<P>) -> Result<(), Error> {
    let router = &router;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        router.handle(event).await.map(|_| ())
    })).await
}

#[macro_export]
macro_rules! custom_resources {
    ($publisher:expr; $($name:expr => $target:expr,)*) => {
        $crate::CustomResourceRouter::new($publisher)
        $(
            .register($name, $target)
        )*
    };
}
