//! Middleware chain builder.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s in front of a terminal
//! router. The first stage added is the first to see the request; each stage
//! either calls [`Next::run`] to continue or answers on its own.

use async_trait::async_trait;
use axum::{extract::Request, response::Response, Router};
use std::{
    convert::Infallible,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Service, ServiceExt};

/// One unit of cross-cutting request processing.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn process(&self, req: Request, next: Next<'_>) -> Response;
}

/// The remainder of the pipeline after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    endpoint: &'a Router,
}

impl<'a> Next<'a> {
    /// Hand the request to the following stage, or to the endpoint once the
    /// stages are exhausted.
    pub async fn run(self, req: Request) -> Response {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    endpoint: self.endpoint,
                };
                stage.process(req, next).await
            }
            None => match self.endpoint.clone().oneshot(req).await {
                Ok(response) => response,
                Err(never) => match never {},
            },
        }
    }
}

/// Collects stages in invocation order.
#[derive(Clone, Default)]
pub struct ChainBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; it runs after every stage added before it.
    pub fn stage<S: Stage>(self, stage: S) -> Self {
        self.shared_stage(Arc::new(stage))
    }

    pub fn shared_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Compose the stages around `endpoint`.
    pub fn build(self, endpoint: Router) -> Pipeline {
        Pipeline {
            stages: self.stages.into(),
            endpoint,
        }
    }
}

/// A composed chain, usable anywhere axum accepts a service.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Stage>]>,
    endpoint: Router,
}

impl Pipeline {
    pub async fn handle(&self, req: Request) -> Response {
        Next {
            stages: &self.stages,
            endpoint: &self.endpoint,
        }
        .run(req)
        .await
    }
}

impl Service<Request> for Pipeline {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let pipeline = self.clone();
        Box::pin(async move { Ok(pipeline.handle(req).await) })
    }
}
