mod common;

use common::{at, day, harness, time};
use site_attendance::attendance::{Outcome, Tier};
use site_attendance::error::Error;
use site_attendance::model::attendance::{AuditAction, RecordSource};
use site_attendance::store::{AttendanceWrite, PersistResult};

#[tokio::test]
async fn first_trigger_of_the_day_times_in() {
    let h = harness().await;

    let outcome = h.machine.process(7, at(8, 0, 0)).await;
    assert_eq!(
        outcome,
        Outcome::TimedIn {
            time: time(8, 0, 0),
            tier: Tier::Central
        }
    );

    let rows = h.store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].worker_id, 7);
    assert_eq!(rows[0].time_in, time(8, 0, 0));
    assert_eq!(rows[0].time_out, None);
}

#[tokio::test]
async fn early_second_trigger_is_too_soon_and_writes_nothing() {
    let h = harness().await;
    h.machine.process(7, at(8, 0, 0)).await;

    let outcome = h.machine.process(7, at(8, 5, 0)).await;
    assert_eq!(
        outcome,
        Outcome::TooSoon {
            minutes_elapsed: 5,
            minutes_required: 30
        }
    );

    let rows = h.store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].time_out, None);
    assert_eq!(h.store.audit_log().len(), 1);
}

#[tokio::test]
async fn trigger_after_the_minimum_interval_times_out() {
    let h = harness().await;
    h.machine.process(7, at(8, 0, 0)).await;

    let outcome = h.machine.process(7, at(8, 31, 0)).await;
    assert_eq!(
        outcome,
        Outcome::TimedOut {
            time: time(8, 31, 0),
            hours_worked: 0.52,
            tier: Tier::Central
        }
    );

    let rows = h.store.rows();
    assert_eq!(rows[0].time_out, Some(time(8, 31, 0)));
    assert_eq!(rows[0].hours_worked, 0.52);
}

#[tokio::test]
async fn exactly_the_minimum_interval_is_enough() {
    let h = harness().await;
    h.machine.process(7, at(8, 0, 0)).await;

    let outcome = h.machine.process(7, at(8, 30, 0)).await;
    assert!(matches!(outcome, Outcome::TimedOut { .. }));
}

#[tokio::test]
async fn completed_day_stays_completed() {
    let h = harness().await;
    h.machine.process(7, at(8, 0, 0)).await;
    h.machine.process(7, at(16, 0, 0)).await;
    let before = h.store.rows();

    assert_eq!(h.machine.process(7, at(17, 0, 0)).await, Outcome::AlreadyCompleted);
    assert_eq!(h.machine.process(7, at(18, 0, 0)).await, Outcome::AlreadyCompleted);
    assert_eq!(h.store.rows(), before);
}

#[tokio::test]
async fn one_record_per_worker_and_day() {
    let h = harness().await;
    for (hour, minute) in [(7, 0), (7, 10), (8, 0), (12, 0), (15, 0)] {
        h.machine.process(7, at(hour, minute, 0)).await;
        h.machine.process(9, at(hour, minute, 30)).await;
    }

    let rows = h.store.rows();
    assert_eq!(rows.iter().filter(|r| r.worker_id == 7).count(), 1);
    assert_eq!(rows.iter().filter(|r| r.worker_id == 9).count(), 1);
}

#[tokio::test]
async fn sub_second_precision_is_dropped() {
    let h = harness().await;
    let now = at(8, 0, 0) + chrono::Duration::milliseconds(730);

    let outcome = h.machine.process(7, now).await;
    assert_eq!(
        outcome,
        Outcome::TimedIn {
            time: time(8, 0, 0),
            tier: Tier::Central
        }
    );
}

#[tokio::test]
async fn central_writes_are_audited() {
    let h = harness().await;
    h.machine.process(7, at(8, 0, 0)).await;
    h.machine.process(7, at(16, 30, 0)).await;

    let audit = h.store.audit_log();
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].action, AuditAction::TimeIn);
    assert_eq!(audit[0].hours_worked, None);
    assert_eq!(audit[1].action, AuditAction::TimeOut);
    assert_eq!(audit[1].hours_worked, Some(8.5));
    assert_eq!(audit[1].timestamp, at(16, 30, 0));
}

#[tokio::test]
async fn audit_failure_does_not_roll_back_the_write() {
    let h = harness().await;
    h.store.set_fail_audit(true);

    let outcome = h.machine.process(7, at(8, 0, 0)).await;
    assert!(matches!(outcome, Outcome::TimedIn { tier: Tier::Central, .. }));
    assert_eq!(h.store.rows().len(), 1);
    assert!(h.store.audit_log().is_empty());
}

#[tokio::test]
async fn archived_rows_are_invisible() {
    let h = harness().await;
    h.machine.process(7, at(8, 0, 0)).await;
    h.machine.process(7, at(16, 0, 0)).await;
    let archived = h.store.rows()[0].attendance_id;
    h.store.archive(archived);

    let outcome = h.machine.process(7, at(17, 0, 0)).await;
    assert!(matches!(outcome, Outcome::TimedIn { .. }));
    assert_eq!(h.store.rows().iter().filter(|r| !r.is_archived).count(), 1);
}

#[tokio::test]
async fn time_out_without_matching_time_in_is_rejected() {
    let h = harness().await;
    h.machine.process(7, at(8, 0, 0)).await;

    let record = h
        .machine
        .store()
        .today_record(7, day())
        .await
        .unwrap()
        .unwrap();
    let RecordSource::Central(attendance_id) = record.source else {
        panic!("expected a central record, got {:?}", record.source);
    };
    // the row disappears between lookup and write
    h.store.archive(attendance_id);

    let result = h
        .machine
        .store()
        .commit(&AttendanceWrite::TimeOut {
            record,
            at: at(16, 0, 0),
            hours_worked: 8.0,
        })
        .await;
    assert!(matches!(
        result,
        PersistResult::Failed(Error::Orphan { worker_id: 7, .. })
    ));
    assert_eq!(h.buffer.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn failing_both_stores_reports_a_store_error() {
    let h = harness().await;
    h.go_offline().await;
    // closing the buffer pool makes the local path fail too
    h.buffer.close().await;

    let outcome = h.machine.process(7, at(8, 0, 0)).await;
    assert!(matches!(outcome, Outcome::StoreError { .. }));
}
