use super::actor::SchedulerMessage;
use super::delivery::{DeliveryContext, DeliveryReport, deliver};
use crate::error::OpenEduError;
use futures::stream::StreamExt;
use governor::{Quota, RateLimiter};
use ractor::{ActorRef, RpcReplyPort};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

pub(super) type DeliveryReply = RpcReplyPort<Result<DeliveryReport, OpenEduError>>;

#[derive(Debug)]
pub(super) struct DeliveryJob {
    pub id: i64,
    /// Present when a caller waits on the result (manual delivery).
    pub reply: Option<DeliveryReply>,
}

#[derive(Debug)]
pub(super) struct DeliveryOutcome {
    pub id: i64,
    pub result: Result<DeliveryReport, OpenEduError>,
    pub reply: Option<DeliveryReply>,
}

/// Starts the delivery pipeline and returns its job queue.
///
/// Outcomes are sent back to the scheduler actor, which owns all timer state.
pub(super) fn spawn_pipeline(
    ctx: DeliveryContext,
    concurrency: usize,
    actor: ActorRef<SchedulerMessage>,
) -> mpsc::Sender<DeliveryJob> {
    let concurrency = concurrency.max(1);
    let per_second = u32::try_from(concurrency).unwrap_or(u32::MAX);
    let limiter = Arc::new(RateLimiter::direct(Quota::per_second(
        NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN),
    )));

    let (job_tx, job_rx) = mpsc::channel::<DeliveryJob>(1000);

    tokio::spawn(async move {
        info!(
            "Delivery Pipeline Started: BufferUnordered={}, RateLimit={}/s",
            concurrency, per_second
        );

        let mut pipeline = ReceiverStream::new(job_rx)
            .map(|job| {
                let lim = limiter.clone();
                let ctx = ctx.clone();
                async move {
                    lim.until_ready().await;
                    let result = deliver(&ctx, job.id).await;
                    DeliveryOutcome {
                        id: job.id,
                        result,
                        reply: job.reply,
                    }
                }
            })
            .buffer_unordered(concurrency);

        while let Some(outcome) = pipeline.next().await {
            if let Err(e) = ractor::cast!(actor, SchedulerMessage::DeliveryDone(outcome)) {
                warn!("Scheduler unreachable (channel closed), worker stopping: {}", e);
                break;
            }
        }

        info!("Delivery Pipeline Stopped");
    });

    job_tx
}
