//! Bounded concurrent execution of independent units.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::domain::errors::{DomainError, DomainResult};

/// Outcome of one unit of a batch.
#[derive(Debug)]
pub struct UnitResult<T> {
    pub unit: String,
    pub result: DomainResult<T>,
}

/// Per-unit outcomes, in input order. One unit failing never affects another.
#[derive(Debug)]
pub struct BatchResult<T> {
    pub units: Vec<UnitResult<T>>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self { units: Vec::new() }
    }
}

impl<T> BatchResult<T> {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.units.iter().filter_map(|u| u.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &DomainError)> {
        self.units
            .iter()
            .filter_map(|u| u.result.as_ref().err().map(|e| (u.unit.as_str(), e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Split into successful values and `(unit, error)` pairs.
    pub fn partition(self) -> (Vec<T>, Vec<(String, DomainError)>) {
        let mut ok = Vec::new();
        let mut failed = Vec::new();
        for unit in self.units {
            match unit.result {
                Ok(value) => ok.push(value),
                Err(e) => failed.push((unit.unit, e)),
            }
        }
        (ok, failed)
    }
}

/// Run `f` over every unit with at most `max_concurrency` in flight.
pub async fn run_bounded<I, T, F, Fut>(max_concurrency: usize, units: Vec<(String, I)>, f: F) -> BatchResult<T>
where
    F: Fn(String, I) -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));

    let futures = units.into_iter().map(|(unit, input)| {
        let semaphore = semaphore.clone();
        let work = f(unit.clone(), input);
        async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => work.await,
                Err(_) => Err(DomainError::ValidationFailed("Semaphore error".to_string())),
            };
            UnitResult { unit, result }
        }
    });

    BatchResult {
        units: join_all(futures).await,
    }
}
