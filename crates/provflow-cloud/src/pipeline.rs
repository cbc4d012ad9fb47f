//! Ordered execution of provisioning steps
//!
//! Endpoint creation and script execution are run through a `Pipeline`.
//! The default policy is strictly sequential and fail-fast: step *i+1* only
//! starts after step *i* succeeded, and nothing runs after the first failure.

use futures_util::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A single item or an ordered list of items
///
/// Deserializes from either a scalar or a sequence, so a descriptor can say
/// `provisionScript: setup.sh` as well as `provisionScript: [a.sh, b.sh]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
            OneOrMany::Many(items) => items.iter(),
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}

/// How the steps of a pipeline are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPolicy {
    /// One step at a time, in order
    #[default]
    Sequential,

    /// Up to N steps in flight; results keep input order
    BoundedParallel(usize),
}

/// Pipeline runner
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline {
    policy: ExecutionPolicy,
}

impl Pipeline {
    pub fn new(policy: ExecutionPolicy) -> Self {
        Self { policy }
    }

    pub fn sequential() -> Self {
        Self::new(ExecutionPolicy::Sequential)
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Run `op` over `items`, returning every step's result in input order.
    ///
    /// A single item is executed directly. The first failure is returned and
    /// no further steps are started.
    pub async fn run<I, T, E, F, Fut>(&self, items: OneOrMany<I>, mut op: F) -> Result<Vec<T>, E>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let items = match items {
            OneOrMany::One(item) => return Ok(vec![op(item).await?]),
            OneOrMany::Many(items) => items,
        };

        match self.policy {
            ExecutionPolicy::Sequential => {
                let total = items.len();
                let mut results = Vec::with_capacity(total);

                for (index, item) in items.into_iter().enumerate() {
                    tracing::debug!(step = index + 1, total, "Running pipeline step");
                    match op(item).await {
                        Ok(value) => results.push(value),
                        Err(e) => {
                            tracing::warn!(
                                step = index + 1,
                                total,
                                skipped = total - index - 1,
                                "Pipeline step failed"
                            );
                            return Err(e);
                        }
                    }
                }

                Ok(results)
            }
            ExecutionPolicy::BoundedParallel(limit) => {
                tracing::debug!(total = items.len(), limit, "Running pipeline in parallel");
                stream::iter(items)
                    .map(op)
                    .buffered(limit.max(1))
                    .try_collect()
                    .await
            }
        }
    }
}
