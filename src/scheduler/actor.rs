use super::delivery::{DeliveryContext, DeliveryReport};
use super::worker::{DeliveryJob, DeliveryOutcome, DeliveryReply, spawn_pipeline};
use crate::db::DbScheduler;
use crate::error::OpenEduError;
use chrono::{DateTime, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(super) enum SchedulerMessage {
    /// Arm (or re-arm) the timer of an active series at its `next_run_at`.
    Schedule { id: i64, at: DateTime<Utc> },

    /// Drop the timer of a series. The row itself is left alone.
    Cancel(i64),

    /// Deliver right away and report back; fails with `Conflict` if one is already running.
    DeliverNow(i64, DeliveryReply),

    /// Ids with an armed timer, for inspection.
    Armed(ractor::RpcReplyPort<Vec<i64>>),

    // Internal messages (sent by timers and the pipeline)
    Fire { id: i64, generation: u64 },
    DeliveryDone(DeliveryOutcome),
}

/// Handle for the scheduler actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    actor: ActorRef<SchedulerMessage>,
}

impl SchedulerHandle {
    pub fn schedule(&self, row: &DbScheduler) -> Result<(), OpenEduError> {
        ractor::cast!(
            self.actor,
            SchedulerMessage::Schedule {
                id: row.id,
                at: row.next_run_at
            }
        )
        .map_err(|e| OpenEduError::RactorError(format!("Scheduler cast failed: {e}")))
    }

    pub fn cancel(&self, id: i64) -> Result<(), OpenEduError> {
        ractor::cast!(self.actor, SchedulerMessage::Cancel(id))
            .map_err(|e| OpenEduError::RactorError(format!("Scheduler cast failed: {e}")))
    }

    pub async fn deliver_now(&self, id: i64) -> Result<DeliveryReport, OpenEduError> {
        ractor::call!(self.actor, SchedulerMessage::DeliverNow, id)
            .map_err(|e| OpenEduError::RactorError(format!("DeliverNow RPC failed: {e}")))?
    }

    pub async fn armed(&self) -> Result<Vec<i64>, OpenEduError> {
        ractor::call!(self.actor, SchedulerMessage::Armed)
            .map_err(|e| OpenEduError::RactorError(format!("Armed RPC failed: {e}")))
    }
}

struct ArmedTimer {
    generation: u64,
    task: JoinHandle<()>,
}

/// Timer change requested while a delivery of the same series was running.
#[derive(Debug, Clone, Copy)]
enum Deferred {
    Rearm(DateTime<Utc>),
    Disarm,
}

struct SchedulerState {
    timers: HashMap<i64, ArmedTimer>,
    next_generation: u64,
    in_flight: HashSet<i64>,
    deferred: HashMap<i64, Deferred>,
    job_tx: mpsc::Sender<DeliveryJob>,
    ctx: DeliveryContext,
}

impl SchedulerState {
    fn arm(&mut self, myself: &ActorRef<SchedulerMessage>, id: i64, at: DateTime<Utc>) {
        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        self.next_generation += 1;
        let generation = self.next_generation;

        let actor = myself.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = ractor::cast!(actor, SchedulerMessage::Fire { id, generation });
        });

        if let Some(old) = self.timers.insert(id, ArmedTimer { generation, task }) {
            old.task.abort();
        }
        debug!(scheduler_id = id, generation, delay_secs = delay.as_secs(), "timer armed");
    }

    fn disarm(&mut self, id: i64) {
        if let Some(old) = self.timers.remove(&id) {
            old.task.abort();
        }
    }

    /// Queues a delivery without blocking the actor; a full or closed queue fails the job.
    fn enqueue(&mut self, myself: &ActorRef<SchedulerMessage>, job: DeliveryJob) {
        self.in_flight.insert(job.id);
        let tx = self.job_tx.clone();
        let actor = myself.clone();
        tokio::spawn(async move {
            if let Err(e) = tx.send(job).await {
                warn!("Failed to submit delivery job (channel closed): {}", e);
                let job = e.0;
                let outcome = DeliveryOutcome {
                    id: job.id,
                    result: Err(OpenEduError::RactorError(
                        "Delivery queue is closed".to_string(),
                    )),
                    reply: job.reply,
                };
                let _ = ractor::cast!(actor, SchedulerMessage::DeliveryDone(outcome));
            }
        });
    }
}

struct SchedulerActor;

#[ractor::async_trait]
impl Actor for SchedulerActor {
    type Msg = SchedulerMessage;
    type State = SchedulerState;
    type Arguments = (DeliveryContext, usize);

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        (ctx, concurrency): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let job_tx = spawn_pipeline(ctx.clone(), concurrency, myself.clone());

        let rows = ctx.db.list_active_schedulers().await.map_err(|e| {
            ActorProcessingErr::from(format!("DB load active schedulers failed: {e}"))
        })?;

        let mut state = SchedulerState {
            timers: HashMap::new(),
            next_generation: 0,
            in_flight: HashSet::new(),
            deferred: HashMap::new(),
            job_tx,
            ctx,
        };
        for row in &rows {
            state.arm(&myself, row.id, row.next_run_at);
        }

        info!(
            armed = state.timers.len(),
            interval_secs = state.ctx.interval.as_secs(),
            concurrency,
            "SchedulerActor started from DB"
        );
        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SchedulerMessage::Schedule { id, at } => {
                if state.in_flight.contains(&id) {
                    // The running delivery re-arms on completion and would overwrite this.
                    state.deferred.insert(id, Deferred::Rearm(at));
                    debug!(scheduler_id = id, "delivery running, schedule deferred");
                } else {
                    state.arm(&myself, id, at);
                }
            }

            SchedulerMessage::Cancel(id) => {
                state.disarm(id);
                if state.in_flight.contains(&id) {
                    state.deferred.insert(id, Deferred::Disarm);
                }
                debug!(scheduler_id = id, "timer cancelled");
            }

            SchedulerMessage::DeliverNow(id, reply) => {
                if state.in_flight.contains(&id) {
                    let _ = reply.send(Err(OpenEduError::Conflict(format!(
                        "delivery for scheduler {id} is already running"
                    ))));
                    return Ok(());
                }
                state.disarm(id);
                state.enqueue(
                    &myself,
                    DeliveryJob {
                        id,
                        reply: Some(reply),
                    },
                );
            }

            SchedulerMessage::Armed(reply) => {
                let mut ids: Vec<i64> = state.timers.keys().copied().collect();
                ids.sort_unstable();
                let _ = reply.send(ids);
            }

            SchedulerMessage::Fire { id, generation } => {
                let current = state.timers.get(&id).map(|t| t.generation);
                if current != Some(generation) {
                    debug!(scheduler_id = id, generation, "stale timer ignored");
                    return Ok(());
                }
                state.timers.remove(&id);

                if state.in_flight.contains(&id) {
                    state
                        .deferred
                        .entry(id)
                        .or_insert(Deferred::Rearm(Utc::now()));
                    debug!(scheduler_id = id, "delivery already running, fire deferred");
                    return Ok(());
                }
                state.enqueue(&myself, DeliveryJob { id, reply: None });
            }

            SchedulerMessage::DeliveryDone(DeliveryOutcome { id, result, reply }) => {
                state.in_flight.remove(&id);

                match (state.deferred.remove(&id), &result) {
                    (Some(Deferred::Rearm(at)), _) => {
                        debug!(scheduler_id = id, "applying deferred schedule");
                        state.arm(&myself, id, at);
                    }
                    (Some(Deferred::Disarm), _) => state.disarm(id),
                    (None, Ok(report)) => {
                        if let Some(at) = report.next_run_at() {
                            state.arm(&myself, id, at);
                        }
                    }
                    (None, Err(OpenEduError::NotFound(_))) => {
                        warn!(scheduler_id = id, "series vanished, timer dropped");
                    }
                    (None, Err(e)) => {
                        warn!(scheduler_id = id, error = %e, "delivery failed, retrying next interval");
                        let at = state.ctx.next_run_from(Utc::now());
                        state.arm(&myself, id, at);
                    }
                }

                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        for (_, timer) in state.timers.drain() {
            timer.task.abort();
        }
        Ok(())
    }
}

/// Spawns the scheduler actor; active series found in the database are armed immediately.
pub async fn spawn(ctx: DeliveryContext, concurrency: usize) -> Result<SchedulerHandle, OpenEduError> {
    let (actor, _jh) = Actor::spawn(None, SchedulerActor, (ctx, concurrency))
        .await
        .map_err(|e| OpenEduError::RactorError(format!("SchedulerActor spawn failed: {e}")))?;
    Ok(SchedulerHandle { actor })
}
