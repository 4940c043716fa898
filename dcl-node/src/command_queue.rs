//! Node half of C13: drives one enqueued command through
//! `QUEUED -> SUBMITTED -> RUNNING -> COMPLETE`/`ERROR`, notifying the host
//! at each transition when the caller asked for an event
//! (`CommandOptions::want_event`, spec.md §4.11) and stamping the event's
//! profiling timestamps along the way (spec.md §4.9).

use std::sync::Arc;

use dcl_core::{CLError, Clock, LocalClock, ObjectId};
use dcl_transport::Host;
use dcl_wire::messages::{CommandExecStatus, CommandExecStatusChanged, CommandOptions};
use dcl_wire::Message;

use crate::resources::EventRecord;
use crate::session::Session;

/// Runs `work` (the actual buffer/kernel operation, already resolved
/// against `Session`'s resources) through the full status lifecycle.
/// Returns the status to report back in the request's own response.
pub async fn run_command<F>(session: &Session, options: CommandOptions, work: F) -> CLError
where
    F: FnOnce() -> CLError,
{
    run_command_with_clock(session, options, &LocalClock, work).await
}

async fn run_command_with_clock<F>(
    session: &Session,
    options: CommandOptions,
    clock: &dyn Clock,
    work: F,
) -> CLError
where
    F: FnOnce() -> CLError,
{
    let event = if options.want_event && !options.command_id.is_none() {
        let record = Arc::new(EventRecord::new(options.command_id, ObjectId::NONE));
        let _ = session.unbind_event(options.command_id);
        let _ = session.bind_event_arc(record.clone());
        Some(record)
    } else {
        None
    };

    advance(session, &event, options.command_id, CommandExecStatus::Queued, CLError::SUCCESS, clock).await;
    advance(session, &event, options.command_id, CommandExecStatus::Submitted, CLError::SUCCESS, clock).await;
    advance(session, &event, options.command_id, CommandExecStatus::Running, CLError::SUCCESS, clock).await;

    let result = work();

    let final_status =
        if result.is_success() { CommandExecStatus::Complete } else { CommandExecStatus::Error };
    advance(session, &event, options.command_id, final_status, result, clock).await;

    result
}

async fn advance(
    session: &Session,
    event: &Option<Arc<EventRecord>>,
    command_id: ObjectId,
    status: CommandExecStatus,
    error: CLError,
    clock: &dyn Clock,
) {
    let timestamp_ns = clock.now_nanos();
    if let Some(event) = event {
        if status == CommandExecStatus::Error {
            event.fail(error, timestamp_ns);
        } else {
            event.advance(status, timestamp_ns);
        }
        let _ = session
            .host
            .0
            .notify(Message::CommandExecStatusChanged(CommandExecStatusChanged {
                command_id,
                status,
                error,
                timestamp_ns,
            }))
            .await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use dcl_core::ProcessId;
    use dcl_transport::{DataDispatcher, DataStream, MessageDispatcher, MessageQueue, Process, Role};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedClock(AtomicU64);
    impl Clock for FixedClock {
        fn now_nanos(&self) -> u64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    async fn fake_session() -> Session {
        let dispatcher =
            MessageDispatcher::bind("127.0.0.1:0".parse().unwrap(), ProcessId(1), Role::ComputeNode)
                .await
                .unwrap();
        let addr = dispatcher.local_addr().unwrap();
        let data_dispatcher =
            DataDispatcher::bind("127.0.0.1:0".parse().unwrap(), ProcessId(1), Role::ComputeNode)
                .await
                .unwrap();
        let data_addr = data_dispatcher.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = dispatcher.accept().await;
        });
        tokio::spawn(async move {
            let _ = data_dispatcher.accept().await;
        });

        let (queue, _rx) = MessageQueue::connect(addr, ProcessId(2), Role::Host).await.unwrap();
        let data = DataStream::connect(data_addr, ProcessId(2), Role::Host).await.unwrap();
        let process = Process::new(queue, data);
        Session::new(Host(process), Arc::new(crate::driver::SimDriver::new()))
    }

    #[tokio::test]
    async fn successful_work_ends_in_complete_with_success() {
        let session = fake_session().await;
        let clock = FixedClock(AtomicU64::new(0));
        let options = CommandOptions { command_id: ObjectId(1), want_event: true };
        let status = run_command_with_clock(&session, options, &clock, || CLError::SUCCESS).await;
        assert_eq!(status, CLError::SUCCESS);
        assert_eq!(*session.event(ObjectId(1)).unwrap().status.lock().unwrap(), CommandExecStatus::Complete);
    }

    #[tokio::test]
    async fn failing_work_ends_in_error_with_the_reported_code() {
        let session = fake_session().await;
        let clock = FixedClock(AtomicU64::new(0));
        let options = CommandOptions { command_id: ObjectId(2), want_event: true };
        let status =
            run_command_with_clock(&session, options, &clock, || CLError::INVALID_MEM_OBJECT).await;
        assert_eq!(status, CLError::INVALID_MEM_OBJECT);
        let event = session.event(ObjectId(2)).unwrap();
        assert_eq!(*event.status.lock().unwrap(), CommandExecStatus::Error);
        assert_eq!(*event.error.lock().unwrap(), CLError::INVALID_MEM_OBJECT);
    }

    #[tokio::test]
    async fn no_event_is_bound_when_want_event_is_false() {
        let session = fake_session().await;
        let options = CommandOptions { command_id: ObjectId(3), want_event: false };
        let status = run_command(&session, options, || CLError::SUCCESS).await;
        assert_eq!(status, CLError::SUCCESS);
        assert!(session.event(ObjectId(3)).is_err());
    }
}
