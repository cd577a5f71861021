//! Ordered stage lists.
//!
//! A [`Pipeline`] folds its stages from the back so the last stage's `next`
//! is the handler. The frontend builds one pre-dispatch pipeline whose
//! handler is the mux, and one post-dispatch pipeline per route group.

use crate::context::RequestContext;
use crate::middleware::{Handler, Middleware, Next};
use crate::types::{Request, Response};
use std::sync::Arc;

/// A shareable stage.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An immutable, ordered list of stages.
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .stage(ResourceIdMiddleware::new())
///     .stage(LoggingPostMuxMiddleware::new())
///     .build();
///
/// let response = pipeline.process(&mut ctx, request, &handler).await;
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs `request` through every stage and then `handler`.
    pub async fn process(
        &self,
        ctx: &mut RequestContext,
        request: Request,
        handler: &dyn Handler,
    ) -> Response {
        self.build_chain(handler).run(ctx, request).await
    }

    fn build_chain<'a>(&'a self, handler: &'a dyn Handler) -> Next<'a> {
        self.stages
            .iter()
            .rev()
            .fold(Next::handler(handler), |next, middleware| {
                Next::new(middleware.as_ref(), next)
            })
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn shared_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}
