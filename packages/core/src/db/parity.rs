//! Backend Parity Runner
//!
//! Runs the same read against two [`BlockStore`] implementations and fails if
//! the results differ. Queries are compared as id sequences, so ordering
//! differences are divergences too.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use blockstore_core::db::{DatabaseService, ParityRunner, SurrealStore, TursoStore};
//! use blockstore_core::models::{BlockQuery, WhereClause};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/blocks.db")).await?);
//!     let turso = Arc::new(TursoStore::new(db));
//!     let surreal = Arc::new(SurrealStore::new_in_memory().await?);
//!
//!     let runner = ParityRunner::new(turso, surreal);
//!     let result = runner
//!         .compare_query(&BlockQuery::new(WhereClause::new().root("doc-1")))
//!         .await?;
//!     println!("{} matches, delta {:.2}%", result.result.len(), result.delta_percent);
//!     Ok(())
//! }
//! ```

use crate::db::BlockStore;
use crate::models::BlockQuery;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Runs identical reads on two stores and checks they agree
pub struct ParityRunner {
    backend_a: Arc<dyn BlockStore>,
    backend_b: Arc<dyn BlockStore>,
    timings: Arc<Mutex<HashMap<String, ParityTiming>>>,
}

/// Agreed result of one comparison
#[derive(Debug)]
pub struct ParityResult<T> {
    pub backend_a_duration: Duration,
    pub backend_b_duration: Duration,
    /// Positive means backend B was slower
    pub delta_percent: f64,
    pub result: T,
}

/// Accumulated durations for one operation name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParityTiming {
    pub runs: usize,
    pub backend_a_total: Duration,
    pub backend_b_total: Duration,
}

impl ParityTiming {
    pub fn average_delta_percent(&self) -> f64 {
        calculate_delta(self.backend_a_total, self.backend_b_total)
    }
}

impl ParityRunner {
    pub fn new(backend_a: Arc<dyn BlockStore>, backend_b: Arc<dyn BlockStore>) -> Self {
        Self {
            backend_a,
            backend_b,
            timings: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `op` on both backends in turn
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Either backend operation fails
    /// - Results from the two backends differ
    pub async fn run<F, Fut, T>(&self, name: &str, op: F) -> Result<ParityResult<T>>
    where
        F: Fn(Arc<dyn BlockStore>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: PartialEq + std::fmt::Debug + Send,
    {
        let name_a = self.backend_a.backend_name();
        let name_b = self.backend_b.backend_name();

        let start_a = Instant::now();
        let result_a = op(self.backend_a.clone())
            .await
            .with_context(|| format!("Backend A ({}) failed for {}", name_a, name))?;
        let duration_a = start_a.elapsed();

        let start_b = Instant::now();
        let result_b = op(self.backend_b.clone())
            .await
            .with_context(|| format!("Backend B ({}) failed for {}", name_b, name))?;
        let duration_b = start_b.elapsed();

        if result_a != result_b {
            tracing::warn!(operation = name, backend_a = name_a, backend_b = name_b, "Backend results diverged");
            anyhow::bail!(
                "Backend results diverged for '{}'\n{}: {:?}\n{}: {:?}",
                name,
                name_a,
                result_a,
                name_b,
                result_b
            );
        }

        let mut timings = self.timings.lock().await;
        let timing = timings.entry(name.to_string()).or_default();
        timing.runs += 1;
        timing.backend_a_total += duration_a;
        timing.backend_b_total += duration_b;
        drop(timings);

        Ok(ParityResult {
            backend_a_duration: duration_a,
            backend_b_duration: duration_b,
            delta_percent: calculate_delta(duration_a, duration_b),
            result: result_a,
        })
    }

    /// Compare the id sequence a query returns on both backends
    pub async fn compare_query(&self, query: &BlockQuery) -> Result<ParityResult<Vec<String>>> {
        let query = query.clone();
        self.run("query_blocks", move |store| {
            let query = query.clone();
            async move {
                let blocks = store.query_blocks(&query).await?;
                Ok(blocks.into_iter().map(|b| b.id).collect::<Vec<_>>())
            }
        })
        .await
    }

    /// Compare the sorted `(id, version)` pairs of one tree on both backends
    pub async fn compare_tree(&self, root_id: &str) -> Result<ParityResult<Vec<(String, i64)>>> {
        let root_id = root_id.to_string();
        self.run("get_root_blocks", move |store| {
            let root_id = root_id.clone();
            async move {
                let mut pairs: Vec<(String, i64)> = store
                    .get_root_blocks(&root_id)
                    .await?
                    .into_iter()
                    .map(|b| (b.id, b.version))
                    .collect();
                pairs.sort();
                Ok(pairs)
            }
        })
        .await
    }

    /// Snapshot of accumulated timings by operation name
    pub async fn timings(&self) -> HashMap<String, ParityTiming> {
        self.timings.lock().await.clone()
    }

    /// One line per operation, sorted by name
    pub async fn generate_report(&self) -> String {
        let timings = self.timings.lock().await;
        let mut names: Vec<&String> = timings.keys().collect();
        names.sort();

        let mut report = format!(
            "Parity report: {} vs {}\n",
            self.backend_a.backend_name(),
            self.backend_b.backend_name()
        );
        for name in names {
            let timing = &timings[name];
            report.push_str(&format!(
                "{:<20} runs={:<5} a={:?} b={:?} delta={:+.2}%\n",
                name,
                timing.runs,
                timing.backend_a_total,
                timing.backend_b_total,
                timing.average_delta_percent()
            ));
        }
        report
    }
}

/// `((b - a) / a) * 100`, or 0 when `a` is zero
fn calculate_delta(duration_a: Duration, duration_b: Duration) -> f64 {
    if duration_a.as_nanos() == 0 {
        return 0.0;
    }

    let a_nanos = duration_a.as_nanos() as f64;
    let b_nanos = duration_b.as_nanos() as f64;

    ((b_nanos - a_nanos) / a_nanos) * 100.0
}
