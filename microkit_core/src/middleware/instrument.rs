use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::endpoint::{BoxEndpoint, Endpoint, RequestScope};
use crate::error::AppError;
use crate::metrics::LatencyRecorder;

pub struct InstrumentEndpoint<Req, Resp> {
    name: String,
    recorder: Arc<dyn LatencyRecorder>,
    inner: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> InstrumentEndpoint<Req, Resp> {
    pub fn new(
        name: impl Into<String>,
        recorder: Arc<dyn LatencyRecorder>,
        inner: BoxEndpoint<Req, Resp>,
    ) -> Self {
        Self {
            name: name.into(),
            recorder,
            inner,
        }
    }
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for InstrumentEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, scope: RequestScope, request: Req) -> Result<Resp, AppError> {
        let start = Instant::now();
        let result = self.inner.call(scope, request).await;
        self.recorder.observe(&self.name, result.is_ok(), start.elapsed());
        result
    }
}
