use std::sync::mpsc::channel;
use std::sync::Arc;

use threadpool::ThreadPool;

use super::evaluator::{self, Decision};
use super::store::Snapshot;
use super::structs::{Identity, Request, Subject};
use super::Result;

/// A single authorization question in a batch file
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Query {
    /// User string, `system:serviceaccount:<ns>:<name>` for service accounts
    pub user: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(flatten)]
    pub request: Request,
}

impl Query {
    pub fn identity(&self) -> Identity {
        Identity::from(Subject::parse(&self.user)).with_groups(self.groups.clone())
    }
}

/// Threaded batch evaluation against one snapshot
///
/// All queries see the snapshot passed in, even if the store is reloaded meanwhile.
/// Results come back in query order.
pub fn authorize_all(snap: Arc<Snapshot>, queries: Vec<Query>, n_workers: usize) -> Result<Vec<(Query, Decision)>> {
    if n_workers == 0 {
        bail!("batch evaluation needs at least one worker");
    }
    let n_jobs = queries.len();
    let pool = ThreadPool::new(n_workers);
    info!("Evaluating {} queries using {} workers", n_jobs, n_workers);

    let (tx, rx) = channel();
    for (i, q) in queries.into_iter().enumerate() {
        // satisfying thread safety
        let snap = Arc::clone(&snap);
        let tx = tx.clone(); // tx channel reused in each thread
        pool.execute(move || {
            let decision = evaluator::evaluate(&snap, &q.identity(), &q.request);
            if tx.send((i, q, decision)).is_err() {
                error!("batch receiver went away before query {} finished", i);
            }
        });
    }
    // only worker senders remain, so the receiver ends if a worker dies
    drop(tx);

    let mut res = rx.iter().take(n_jobs).collect::<Vec<_>>();
    if res.len() != n_jobs {
        bail!("lost {} of {} batch results", n_jobs - res.len(), n_jobs);
    }
    res.sort_by_key(|(i, _, _)| *i);
    Ok(res.into_iter().map(|(_, q, d)| (q, d)).collect())
}
