use std::future::Future;
use async_trait::async_trait;
use lambda_runtime::Context;
use log::{error, info};

use crate::error::BoxError;
use crate::model::{CustomResourceRequest, CustomResourceResponse, StackOperation, PHYSICAL_RESOURCE_ID_FAILURE};
use crate::response::ResponsePublisher;
use crate::result::CustomResourceResult;

/// A custom resource provider.
///
/// An `Err` is reported to CloudFormation as `FAILED` with the error's message as the reason.
/// A delete of something that does not exist (anymore) should return `SUCCESS`.
///
/// `delete` is never called for the [`PHYSICAL_RESOURCE_ID_FAILURE`] placeholder left behind by
/// a failed create; that delete is answered `SUCCESS` directly.
#[async_trait]
pub trait CustomResource: Send + Sync {
    async fn create(&self, request: &CustomResourceRequest, context: &Context) -> Result<CustomResourceResponse, BoxError>;
    async fn update(&self, request: &CustomResourceRequest, context: &Context) -> Result<CustomResourceResponse, BoxError>;
    async fn delete(&self, request: &CustomResourceRequest, context: &Context) -> Result<CustomResourceResponse, BoxError>;
}

/// A [`CustomResource`] built from three functions.
pub struct CustomResourceFactory<C, U, D> {
    create: C,
    update: U,
    delete: D,
}

impl<C, U, D> CustomResourceFactory<C, U, D> {
    pub fn new<CF, UF, DF>(create: C, update: U, delete: D) -> Self where
        C: Fn(CustomResourceRequest, Context) -> CF,
        U: Fn(CustomResourceRequest, Context) -> UF,
        D: Fn(CustomResourceRequest, Context) -> DF,
        CF: Future<Output = Result<CustomResourceResponse, BoxError>>,
        UF: Future<Output = Result<CustomResourceResponse, BoxError>>,
        DF: Future<Output = Result<CustomResourceResponse, BoxError>>,
    {
        CustomResourceFactory {
            create: create,
            update: update,
            delete: delete,
        }
    }
}

#[async_trait]
impl<C, U, D, CF, UF, DF> CustomResource for CustomResourceFactory<C, U, D> where
    C: Fn(CustomResourceRequest, Context) -> CF + Send + Sync,
    U: Fn(CustomResourceRequest, Context) -> UF + Send + Sync,
    D: Fn(CustomResourceRequest, Context) -> DF + Send + Sync,
    CF: Future<Output = Result<CustomResourceResponse, BoxError>> + Send + 'static,
    UF: Future<Output = Result<CustomResourceResponse, BoxError>> + Send + 'static,
    DF: Future<Output = Result<CustomResourceResponse, BoxError>> + Send + 'static,
{
    async fn create(&self, request: &CustomResourceRequest, context: &Context) -> Result<CustomResourceResponse, BoxError> {
        (self.create)(request.clone(), context.clone()).await
    }

    async fn update(&self, request: &CustomResourceRequest, context: &Context) -> Result<CustomResourceResponse, BoxError> {
        (self.update)(request.clone(), context.clone()).await
    }

    async fn delete(&self, request: &CustomResourceRequest, context: &Context) -> Result<CustomResourceResponse, BoxError> {
        (self.delete)(request.clone(), context.clone()).await
    }
}

/// Pairs a provider with the publisher that reports its outcome.
pub struct CustomResourceHandler<R, P> {
    resource: R,
    publisher: P,
}

impl<R: CustomResource, P: ResponsePublisher> CustomResourceHandler<R, P> {
    pub fn new(resource: R, publisher: P) -> Self {
        CustomResourceHandler {
            resource: resource,
            publisher: publisher,
        }
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub async fn execute(&self, request: CustomResourceRequest, context: &Context) -> CustomResourceResult {
        execute(&self.resource, &self.publisher, request, context).await
    }
}

/// Runs `request` through `resource` and reports the outcome through `publisher`.
///
/// Every path ends in exactly one upload attempt; failures are logged and returned in the
/// result rather than raised.
pub async fn execute<R, P>(resource: &R, publisher: &P, request: CustomResourceRequest, context: &Context) -> CustomResourceResult where
    R: CustomResource + ?Sized,
    P: ResponsePublisher + ?Sized,
{
    info!("{} {} ({}) for {}", request.request_type(), request.logical_resource_id(), request.resource_type(), request.stack_id());
    let response = provision(resource, &request, context).await;

    let result = publisher.put_response(request, response).await;
    if !result.succeeded() {
        log_failure(&result);
    }
    result
}

async fn provision<R: CustomResource + ?Sized>(resource: &R, request: &CustomResourceRequest, context: &Context) -> CustomResourceResponse {
    let res = match request.request_type() {
        // The create never got far enough to leave anything behind
        StackOperation::Delete if request.physical_resource_id() == Some(PHYSICAL_RESOURCE_ID_FAILURE) =>
            CustomResourceResponse::success(request).map_err(Into::into),
        StackOperation::Create => resource.create(request, context).await,
        StackOperation::Update => resource.update(request, context).await,
        StackOperation::Delete => resource.delete(request, context).await,
    };

    match res {
        Ok(response) => response,
        Err(err) => {
            error!("{} of {} failed: {}", request.request_type(), request.logical_resource_id(), err);
            CustomResourceResponse::failure(request, err.to_string())
        },
    }
}

pub(crate) fn log_failure(result: &CustomResourceResult) {
    match serde_json::to_string(result.response()) {
        Ok(json) => error!("{}", json),
        Err(err) => error!("failed to serialize response: {}", err),
    }
    if let Some(transport_response) = result.transport_response() {
        match serde_json::to_string(transport_response) {
            Ok(json) => error!("{}", json),
            Err(err) => error!("failed to serialize transport response: {}", err),
        }
    }
    if let Some(err) = result.error() {
        error!("{}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use serde_json::json;
    use crate::error::CustomResourceError;
    use crate::model::RequestStatus;
    use crate::response::DefaultPublisher;
    use crate::response::tests::{request, RecordingTransport};

    struct Counting {
        calls: Arc<AtomicUsize>,
        status: RequestStatus,
    }

    #[async_trait]
    impl CustomResource for Counting {
        async fn create(&self, request: &CustomResourceRequest, _: &Context) -> Result<CustomResourceResponse, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CustomResourceResponse::for_resource(self.status, Some("create".into()), "created-1", request)?)
        }

        async fn update(&self, request: &CustomResourceRequest, _: &Context) -> Result<CustomResourceResponse, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CustomResourceResponse::from_request(self.status, Some("update".into()), request)?)
        }

        async fn delete(&self, request: &CustomResourceRequest, _: &Context) -> Result<CustomResourceResponse, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CustomResourceResponse::from_request(self.status, Some("delete".into()), request)?)
        }
    }

    fn counting(status: RequestStatus) -> (Counting, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Counting { calls: calls.clone(), status: status }, calls)
    }

    #[tokio::test]
    async fn routes_by_operation() {
        for (operation, reason) in vec![(StackOperation::Create, "create"), (StackOperation::Update, "update"), (StackOperation::Delete, "delete")] {
            let (resource, calls) = counting(RequestStatus::Failed);
            let handler = CustomResourceHandler::new(resource, DefaultPublisher::new(RecordingTransport::responding(200, "")));

            let result = handler.execute(request(operation), &Context::default()).await;
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(result.response().reason(), Some(reason));
            assert_eq!(handler.publisher().transport().uploaded_json().len(), 1);
        }
    }

    #[tokio::test]
    async fn provider_errors_become_failed_responses() {
        let resource = CustomResourceFactory::new(
            |_, _| async { Err::<CustomResourceResponse, BoxError>("AccessDenied: not authorized".into()) },
            |request: CustomResourceRequest, _| async move { Ok::<_, BoxError>(CustomResourceResponse::success(&request)?) },
            |request: CustomResourceRequest, _| async move { Ok::<_, BoxError>(CustomResourceResponse::success(&request)?) },
        );
        let handler = CustomResourceHandler::new(resource, DefaultPublisher::new(RecordingTransport::responding(200, "")));

        let result = handler.execute(request(StackOperation::Create), &Context::default()).await;
        assert!(!result.succeeded());
        assert_eq!(result.response().status(), RequestStatus::Failed);
        assert_eq!(result.response().reason(), Some("AccessDenied: not authorized"));
        assert_eq!(result.response().physical_resource_id(), PHYSICAL_RESOURCE_ID_FAILURE);

        let uploaded = handler.publisher().transport().uploaded_json();
        assert_eq!(uploaded[0]["Status"], json!("FAILED"));
        assert_eq!(uploaded[0]["Reason"], json!("AccessDenied: not authorized"));
    }

    #[tokio::test]
    async fn delete_of_failed_create_skips_provider() {
        let (resource, calls) = counting(RequestStatus::Failed);
        let handler = CustomResourceHandler::new(resource, DefaultPublisher::new(RecordingTransport::responding(200, "")));
        let request = CustomResourceRequest::new(
            StackOperation::Delete,
            "https://bucket.s3.amazonaws.com/response",
            "stack".into(),
            "1".into(),
            "Custom::TestResource".into(),
            "MyTestResource".into(),
            Some(PHYSICAL_RESOURCE_ID_FAILURE.into()),
            None,
            None,
        ).unwrap();

        let result = handler.execute(request, &Context::default()).await;
        assert!(result.succeeded());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.response().physical_resource_id(), PHYSICAL_RESOURCE_ID_FAILURE);
    }

    #[tokio::test]
    async fn transport_failure_is_reported_not_raised() {
        let (resource, _) = counting(RequestStatus::Success);
        let handler = CustomResourceHandler::new(resource, DefaultPublisher::new(RecordingTransport::failing()));

        let result = handler.execute(request(StackOperation::Update), &Context::default()).await;
        assert!(!result.succeeded());
        assert!(matches!(result.error(), Some(CustomResourceError::Transport(_))));
    }

    #[tokio::test]
    async fn works_through_trait_objects() {
        let (resource, calls) = counting(RequestStatus::Success);
        let resource: Box<dyn CustomResource> = Box::new(resource);
        let publisher: Box<dyn ResponsePublisher> = Box::new(DefaultPublisher::new(RecordingTransport::responding(200, "")));

        let result = execute(resource.as_ref(), publisher.as_ref(), request(StackOperation::Delete), &Context::default()).await;
        assert!(result.succeeded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
