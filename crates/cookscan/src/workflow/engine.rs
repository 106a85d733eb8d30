//! Step-graph executor with suspend/resume.
//!
//! Steps are registered by name; edges are either fixed or routed by a
//! predicate over the current state. A step receives the state, the
//! collaborator context, and — exactly when it is being resumed — the
//! injected payload. It answers with a patch to merge, a request to
//! suspend on, or a halt that terminates the run early.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, Instrument};

use super::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::WorkflowError;

/// State record driven through a graph. Steps return patches; the engine
/// merges them so a step never holds the state mutably across an await.
pub trait GraphState: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Patch: Send + 'static;

    fn apply(&mut self, patch: Self::Patch);
}

/// What a single step decided.
pub enum StepOutcome<S: GraphState> {
    /// Merge the patch and follow the step's outgoing edge.
    Advance(S::Patch),
    /// Persist the full state and yield; the value describes what input
    /// the instance is now waiting for.
    Suspend(Value),
    /// Merge the patch and terminate the run without following edges
    /// (the rejection short-circuit).
    Halt(S::Patch),
}

/// Result of driving a graph until it finishes or parks.
#[derive(Debug)]
pub enum RunOutcome<S> {
    Complete(S),
    Suspended {
        step: &'static str,
        request: Value,
        state: S,
    },
}

type StepFn<S, C> =
    Box<dyn Fn(S, Arc<C>, Option<Value>) -> BoxFuture<'static, Result<StepOutcome<S>, WorkflowError>> + Send + Sync>;

enum Edge<S> {
    To(&'static str),
    Route(Box<dyn Fn(&S) -> &'static str + Send + Sync>),
    End,
}

pub struct Graph<S: GraphState, C> {
    entry: &'static str,
    steps: HashMap<&'static str, StepFn<S, C>>,
    edges: HashMap<&'static str, Edge<S>>,
}

pub struct GraphBuilder<S: GraphState, C> {
    entry: &'static str,
    steps: HashMap<&'static str, StepFn<S, C>>,
    edges: HashMap<&'static str, Edge<S>>,
}

impl<S: GraphState, C> GraphBuilder<S, C> {
    pub fn new(entry: &'static str) -> Self {
        Self {
            entry,
            steps: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    pub fn step<F>(mut self, name: &'static str, f: F) -> Self
    where
        F: Fn(S, Arc<C>, Option<Value>) -> BoxFuture<'static, Result<StepOutcome<S>, WorkflowError>>
            + Send
            + Sync
            + 'static,
    {
        self.steps.insert(name, Box::new(f));
        self
    }

    pub fn edge(mut self, from: &'static str, to: &'static str) -> Self {
        self.edges.insert(from, Edge::To(to));
        self
    }

    pub fn route<F>(mut self, from: &'static str, router: F) -> Self
    where
        F: Fn(&S) -> &'static str + Send + Sync + 'static,
    {
        self.edges.insert(from, Edge::Route(Box::new(router)));
        self
    }

    pub fn terminal(mut self, from: &'static str) -> Self {
        self.edges.insert(from, Edge::End);
        self
    }

    /// Finishes the graph. Wiring mistakes are programmer errors in a
    /// fixed graph, so they fail loudly here rather than mid-run.
    pub fn build(self) -> Graph<S, C> {
        assert!(
            self.steps.contains_key(self.entry),
            "entry step '{}' is not registered",
            self.entry
        );
        for (from, edge) in &self.edges {
            assert!(
                self.steps.contains_key(from),
                "edge source '{from}' is not a registered step"
            );
            if let Edge::To(to) = edge {
                assert!(
                    self.steps.contains_key(to),
                    "edge target '{to}' is not a registered step"
                );
            }
        }
        for name in self.steps.keys() {
            assert!(
                self.edges.contains_key(name),
                "step '{name}' has no outgoing edge"
            );
        }
        Graph {
            entry: self.entry,
            steps: self.steps,
            edges: self.edges,
        }
    }
}

/// Executes a graph against a checkpoint store, one namespace per graph.
pub struct GraphRunner<S: GraphState, C> {
    graph: Arc<Graph<S, C>>,
    namespace: &'static str,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl<S: GraphState, C: Send + Sync + 'static> GraphRunner<S, C> {
    pub fn new(graph: Graph<S, C>, namespace: &'static str, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            graph: Arc::new(graph),
            namespace,
            checkpoints,
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Starts a fresh run from the entry step.
    pub async fn run(
        &self,
        state: S,
        ctx: Arc<C>,
        instance_id: &str,
    ) -> Result<RunOutcome<S>, WorkflowError> {
        self.drive(state, ctx, instance_id, self.graph.entry, None)
            .await
    }

    /// Re-enters a suspended instance, feeding `payload` to the step that
    /// suspended. Prior steps never re-execute.
    pub async fn resume(
        &self,
        ctx: Arc<C>,
        instance_id: &str,
        payload: Value,
    ) -> Result<RunOutcome<S>, WorkflowError> {
        let checkpoint = self
            .checkpoints
            .load(self.namespace, instance_id)
            .await?
            .ok_or_else(|| WorkflowError::NotSuspended(instance_id.to_string()))?;

        let state: S = serde_json::from_value(checkpoint.state)?;
        let step = self
            .graph
            .steps
            .keys()
            .copied()
            .find(|name| *name == checkpoint.step)
            .ok_or_else(|| WorkflowError::UnknownStep(checkpoint.step.clone()))?;

        info!(
            "resuming {} instance {} at step '{}'",
            self.namespace, instance_id, step
        );
        self.drive(state, ctx, instance_id, step, Some(payload))
            .await
    }

    async fn drive(
        &self,
        mut state: S,
        ctx: Arc<C>,
        instance_id: &str,
        entry: &'static str,
        mut resume: Option<Value>,
    ) -> Result<RunOutcome<S>, WorkflowError> {
        let mut current = entry;
        loop {
            let step = self
                .graph
                .steps
                .get(current)
                .ok_or_else(|| WorkflowError::UnknownStep(current.to_string()))?;

            let span = info_span!("workflow_step", graph = self.namespace, step = current, instance = instance_id);
            let outcome = step(state.clone(), Arc::clone(&ctx), resume.take())
                .instrument(span)
                .await?;

            match outcome {
                StepOutcome::Advance(patch) => {
                    state.apply(patch);
                    match self.graph.edges.get(current) {
                        Some(Edge::To(next)) => current = next,
                        Some(Edge::Route(router)) => {
                            let next = router(&state);
                            debug!("routed '{current}' -> '{next}'");
                            if !self.graph.steps.contains_key(next) {
                                return Err(WorkflowError::UnknownStep(next.to_string()));
                            }
                            current = next;
                        }
                        Some(Edge::End) | None => {
                            self.checkpoints.delete(self.namespace, instance_id).await?;
                            return Ok(RunOutcome::Complete(state));
                        }
                    }
                }
                StepOutcome::Halt(patch) => {
                    state.apply(patch);
                    self.checkpoints.delete(self.namespace, instance_id).await?;
                    return Ok(RunOutcome::Complete(state));
                }
                StepOutcome::Suspend(request) => {
                    self.checkpoints
                        .save(
                            self.namespace,
                            Checkpoint {
                                instance_id: instance_id.to_string(),
                                step: current.to_string(),
                                state: serde_json::to_value(&state)?,
                                updated_at: Utc::now(),
                            },
                        )
                        .await?;
                    info!(
                        "{} instance {} suspended at '{}'",
                        self.namespace, instance_id, current
                    );
                    return Ok(RunOutcome::Suspended {
                        step: current,
                        request,
                        state,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::checkpoint::MemoryCheckpointStore;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct CounterState {
        total: i64,
        confirmed: Option<bool>,
    }

    #[derive(Default)]
    struct CounterPatch {
        add: Option<i64>,
        confirmed: Option<bool>,
    }

    impl GraphState for CounterState {
        type Patch = CounterPatch;

        fn apply(&mut self, patch: CounterPatch) {
            if let Some(add) = patch.add {
                self.total += add;
            }
            if let Some(confirmed) = patch.confirmed {
                self.confirmed = Some(confirmed);
            }
        }
    }

    struct NoCtx;

    fn test_graph() -> Graph<CounterState, NoCtx> {
        GraphBuilder::new("add_one")
            .step("add_one", |_s, _c, _r| {
                Box::pin(async {
                    Ok(StepOutcome::Advance(CounterPatch {
                        add: Some(1),
                        ..Default::default()
                    }))
                })
            })
            .step("confirm", |_s, _c, resume| {
                Box::pin(async move {
                    let Some(payload) = resume else {
                        return Ok(StepOutcome::Suspend(json!({"awaiting": "confirmation"})));
                    };
                    let yes = payload["yes"].as_bool().unwrap_or(false);
                    if !yes {
                        return Ok(StepOutcome::Halt(CounterPatch {
                            confirmed: Some(false),
                            ..Default::default()
                        }));
                    }
                    Ok(StepOutcome::Advance(CounterPatch {
                        confirmed: Some(true),
                        ..Default::default()
                    }))
                })
            })
            .step("add_ten", |_s, _c, _r| {
                Box::pin(async {
                    Ok(StepOutcome::Advance(CounterPatch {
                        add: Some(10),
                        ..Default::default()
                    }))
                })
            })
            .edge("add_one", "confirm")
            .edge("confirm", "add_ten")
            .terminal("add_ten")
            .build()
    }

    fn runner() -> GraphRunner<CounterState, NoCtx> {
        GraphRunner::new(
            test_graph(),
            "counter",
            Arc::new(MemoryCheckpointStore::new()),
        )
    }

    #[tokio::test]
    async fn test_run_suspends_and_resume_completes() {
        let runner = runner();
        let ctx = Arc::new(NoCtx);

        let outcome = runner
            .run(CounterState::default(), Arc::clone(&ctx), "i-1")
            .await
            .unwrap();
        let RunOutcome::Suspended { step, request, state } = outcome else {
            panic!("expected suspension");
        };
        assert_eq!(step, "confirm");
        assert_eq!(request["awaiting"], "confirmation");
        assert_eq!(state.total, 1);

        let outcome = runner
            .resume(ctx, "i-1", json!({"yes": true}))
            .await
            .unwrap();
        let RunOutcome::Complete(state) = outcome else {
            panic!("expected completion");
        };
        // add_one must not have re-executed on resume.
        assert_eq!(state.total, 11);
        assert_eq!(state.confirmed, Some(true));
    }

    #[tokio::test]
    async fn test_halt_skips_remaining_steps_and_clears_checkpoint() {
        let runner = runner();
        let ctx = Arc::new(NoCtx);

        runner
            .run(CounterState::default(), Arc::clone(&ctx), "i-2")
            .await
            .unwrap();
        let outcome = runner
            .resume(Arc::clone(&ctx), "i-2", json!({"yes": false}))
            .await
            .unwrap();
        let RunOutcome::Complete(state) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(state.total, 1);
        assert_eq!(state.confirmed, Some(false));

        // The instance is terminal; a second resume finds nothing.
        let err = runner
            .resume(ctx, "i-2", json!({"yes": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotSuspended(_)));
    }

    #[tokio::test]
    async fn test_resume_without_checkpoint_is_not_found() {
        let runner = runner();
        let err = runner
            .resume(Arc::new(NoCtx), "missing", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotSuspended(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_completion_deletes_checkpoint() {
        let runner = runner();
        let ctx = Arc::new(NoCtx);
        runner
            .run(CounterState::default(), Arc::clone(&ctx), "i-3")
            .await
            .unwrap();
        runner
            .resume(Arc::clone(&ctx), "i-3", json!({"yes": true}))
            .await
            .unwrap();
        let err = runner.resume(ctx, "i-3", json!({})).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotSuspended(_)));
    }

    #[test]
    #[should_panic(expected = "no outgoing edge")]
    fn test_builder_rejects_dangling_step() {
        let _ = GraphBuilder::<CounterState, NoCtx>::new("lonely")
            .step("lonely", |_s, _c, _r| {
                Box::pin(async { Ok(StepOutcome::Suspend(json!({}))) })
            })
            .step("orphan", |_s, _c, _r| {
                Box::pin(async { Ok(StepOutcome::Suspend(json!({}))) })
            })
            .terminal("lonely")
            .build();
    }
}
