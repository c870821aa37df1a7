//! Single-metric evaluation.

use crate::error::{ServiceError, ServiceResult};
use crate::registry::{MetricRegistry, MetricShape};
use evalbridge_evals::{MetricParams, MetricResult};
use evalbridge_judge::JudgeProvider;
use tracing::debug;

/// Resolves, builds and runs one metric against one test case.
#[derive(Debug, Clone, Copy)]
pub struct MetricInvoker<'a> {
    registry: &'a MetricRegistry,
    judges: &'a dyn JudgeProvider,
}

impl<'a> MetricInvoker<'a> {
    /// Create an invoker over a registry and judge source.
    pub fn new(registry: &'a MetricRegistry, judges: &'a dyn JudgeProvider) -> Self {
        Self { registry, judges }
    }

    /// Measure `unit` with the metric called `name`.
    ///
    /// A missing, empty or unknown name fails before any judge call. The
    /// table searched is the one for `C`, so names registered for the other
    /// shape are unknown here.
    pub async fn invoke<C: MetricShape>(
        &self,
        unit: &C,
        name: Option<&str>,
        params: Option<&MetricParams>,
    ) -> ServiceResult<MetricResult> {
        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(ServiceError::metric_not_supported)?;
        let build = self
            .registry
            .lookup::<C>(name)
            .ok_or_else(ServiceError::metric_not_supported)?;

        let empty = MetricParams::new();
        let params = params.unwrap_or(&empty);
        debug!(
            metric = name,
            shape = C::SHAPE,
            params = params.len(),
            "constructing metric"
        );
        let metric = (build)(params, self.judges)?;

        let result = metric.measure(unit).await?;
        debug!(
            metric = name,
            shape = C::SHAPE,
            score = result.score,
            success = result.success,
            "metric measured"
        );
        Ok(result)
    }
}
