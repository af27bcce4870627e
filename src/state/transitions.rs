use std::{future::Future, time::Duration};

use tokio::time::timeout;
use tracing::warn;

use crate::{
    dao::storage::StorageResult,
    error::ServiceError,
    state::state_machine::{Plan, SlotEvent, SlotPhase, SlotStateMachine},
};

/// Plan `event`, run the store write it depends on and apply the plan only when
/// the write succeeded within `limit`. On failure or timeout the plan is
/// aborted and the machine stays in its previous phase.
pub async fn run_transition<F, Fut, T>(
    machine: &mut SlotStateMachine,
    event: SlotEvent,
    limit: Option<Duration>,
    work: F,
) -> Result<(T, SlotPhase), ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let Plan { id: plan_id, .. } = machine.plan(event)?;

    let work_future = work();
    let outcome = if let Some(limit) = limit {
        match timeout(limit, work_future).await {
            Ok(result) => result,
            Err(_) => {
                if let Err(abort_err) = machine.abort(plan_id) {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after timeout"
                    );
                }
                return Err(ServiceError::Timeout);
            }
        }
    } else {
        work_future.await
    };

    match outcome {
        Ok(value) => {
            let next = machine.apply(plan_id)?;
            Ok((value, next))
        }
        Err(err) => {
            if let Err(abort_err) = machine.abort(plan_id) {
                warn!(
                    event = ?event,
                    plan_id = %plan_id,
                    error = ?abort_err,
                    "failed to abort transition after work error"
                );
            }
            Err(err)
        }
    }
}

/// Run a plain store write or read under `limit`.
pub async fn with_timeout<T, Fut>(limit: Option<Duration>, work: Fut) -> Result<T, ServiceError>
where
    Fut: Future<Output = StorageResult<T>>,
{
    match limit {
        Some(limit) => timeout(limit, work)
            .await
            .map_err(|_| ServiceError::Timeout)?
            .map_err(ServiceError::from),
        None => work.await.map_err(ServiceError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_machine() -> SlotStateMachine {
        let mut sm = SlotStateMachine::new();
        sm.fire(SlotEvent::ResumeGame).unwrap();
        sm
    }

    #[tokio::test]
    async fn successful_work_applies_plan() {
        let mut sm = active_machine();
        let (value, next) = run_transition(&mut sm, SlotEvent::Settle, None, || async {
            Ok::<_, ServiceError>(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(next, SlotPhase::NoActiveGame);
    }

    #[tokio::test]
    async fn failed_work_aborts_plan() {
        let mut sm = active_machine();
        let err = run_transition(&mut sm, SlotEvent::Settle, None, || async {
            Err::<(), _>(ServiceError::Degraded)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
        assert_eq!(sm.phase(), SlotPhase::Active);
        assert_eq!(sm.snapshot().pending, None);
    }

    #[tokio::test]
    async fn slow_work_times_out() {
        let mut sm = active_machine();
        let err = run_transition(
            &mut sm,
            SlotEvent::Settle,
            Some(Duration::from_millis(50)),
            || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, ServiceError>(())
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
        assert_eq!(sm.phase(), SlotPhase::Active);
    }

    #[tokio::test]
    async fn plain_work_is_bounded() {
        let value = with_timeout(Some(Duration::from_secs(1)), async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);

        let err = with_timeout(Some(Duration::from_millis(20)), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
    }
}
