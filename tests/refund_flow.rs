//! Refund semantics: idempotency, the pending/confirmed asymmetry, gateway
//! failure isolation and amount bounds.

mod common;

use common::*;
use reservation_system::error::EngineError;
use reservation_system::models::ReservationStatus;

#[tokio::test]
async fn refunding_a_pending_reservation_cancels_it() {
    let h = harness();
    let t1 = h.table_no(1).clone();
    // A pending booking whose deposit was captured out of band.
    let seeded = h
        .seed_reservation(
            &t1,
            date("2025-06-20"),
            ReservationStatus::Pending,
            true,
            Some("pay-77"),
        )
        .await;

    let outcome = h
        .ledger
        .refund(seeded.id, None, "manager", "guest request")
        .await
        .unwrap();

    assert_eq!(outcome.amount, 10_000);
    assert_eq!(outcome.refund_ref, "ref-pay-77");
    let reservation = outcome.reservation;
    assert!(reservation.deposit_refunded);
    assert_eq!(reservation.refund_amount, Some(10_000));
    assert!(reservation.refund_date.is_some());
    assert_eq!(reservation.status, ReservationStatus::Cancelled);

    let history = h.ledger.history(seeded.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_values["status"], "pending");
    assert_eq!(history[0].new_values["status"], "cancelled");
    assert_eq!(history[0].new_values["deposit_refunded"], true);
}

#[tokio::test]
async fn refunding_a_confirmed_reservation_keeps_it_confirmed() {
    let h = harness();
    let t2 = h.table_no(2).clone();

    let reservation = h
        .ledger
        .create(paid_booking(&t2, date("2025-06-20"), slot(23, 30), 4))
        .await
        .unwrap();
    let outcome = h
        .ledger
        .refund(reservation.id, None, "manager", "goodwill after complaint")
        .await
        .unwrap();

    // House rule: the booking may still be honoured, so no auto-cancel.
    assert_eq!(outcome.reservation.status, ReservationStatus::Confirmed);
    assert!(outcome.reservation.deposit_refunded);

    let history = h.ledger.history(reservation.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].previous_values.get("status").is_none());
}

#[tokio::test]
async fn second_refund_fails_and_changes_nothing() {
    let h = harness();
    let t2 = h.table_no(2).clone();

    let reservation = h
        .ledger
        .create(paid_booking(&t2, date("2025-06-20"), slot(23, 30), 4))
        .await
        .unwrap();
    let first = h
        .ledger
        .refund(reservation.id, Some(6_000), "manager", "guest request")
        .await
        .unwrap();

    let err = h
        .ledger
        .refund(reservation.id, None, "manager", "guest request")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRefunded));

    // The gateway was only ever called once.
    assert_eq!(h.gateway.call_count(), 1);

    let unchanged = h.ledger.get(reservation.id).await.unwrap();
    assert_eq!(unchanged.refund_amount, Some(6_000));
    assert_eq!(unchanged.refund_date, first.reservation.refund_date);
    assert_eq!(h.ledger.history(reservation.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn refund_preconditions_are_enforced() {
    let h = harness();
    let d = date("2025-06-20");

    // No deposit captured.
    let t1 = h.table_no(1).clone();
    let unpaid = h.ledger.create(booking(&t1, d, slot(23, 0), 3)).await.unwrap();
    assert!(matches!(
        h.ledger.refund(unpaid.id, None, "manager", "x").await.unwrap_err(),
        EngineError::NotRefundable(_)
    ));

    // Captured but no gateway reference on file.
    let t2 = h.table_no(2).clone();
    let no_ref = h
        .seed_reservation(&t2, d, ReservationStatus::Confirmed, true, None)
        .await;
    assert!(matches!(
        h.ledger.refund(no_ref.id, None, "manager", "x").await.unwrap_err(),
        EngineError::NotRefundable(_)
    ));

    // Completed reservations are past refunding.
    let t7 = h.table_no(7).clone();
    let completed = h
        .seed_reservation(&t7, d, ReservationStatus::Confirmed, true, Some("pay-9"))
        .await;
    h.ledger.mark_completed(completed.id, "door").await.unwrap();
    assert!(matches!(
        h.ledger.refund(completed.id, None, "manager", "x").await.unwrap_err(),
        EngineError::NotRefundable(_)
    ));

    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn refund_amount_is_bounded_by_the_deposit() {
    let h = harness();
    let t2 = h.table_no(2).clone();

    let reservation = h
        .ledger
        .create(paid_booking(&t2, date("2025-06-20"), slot(23, 30), 4))
        .await
        .unwrap();

    let err = h
        .ledger
        .refund(reservation.id, Some(10_001), "manager", "guest request")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(h.gateway.call_count(), 0);

    // A partial refund within bounds goes through.
    let outcome = h
        .ledger
        .refund(reservation.id, Some(2_500), "manager", "guest request")
        .await
        .unwrap();
    assert_eq!(outcome.amount, 2_500);
    assert_eq!(outcome.reservation.refund_amount, Some(2_500));
}

#[tokio::test]
async fn gateway_rejection_leaves_the_ledger_untouched() {
    let h = harness_with(
        StubGateway::rejecting("refund window expired for this payment"),
        CountingNotifier::default(),
    );
    let t2 = h.table_no(2).clone();

    let reservation = h
        .ledger
        .create(paid_booking(&t2, date("2025-06-20"), slot(23, 30), 4))
        .await
        .unwrap();
    let err = h
        .ledger
        .refund(reservation.id, None, "manager", "guest request")
        .await
        .unwrap_err();

    // The collaborator's reason surfaces verbatim.
    match &err {
        EngineError::Payment(message) => {
            assert_eq!(message, "refund window expired for this payment")
        }
        other => panic!("expected payment error, got {other:?}"),
    }

    let untouched = h.ledger.get(reservation.id).await.unwrap();
    assert!(!untouched.deposit_refunded);
    assert_eq!(untouched.refund_amount, None);
    assert_eq!(untouched.refund_date, None);
    assert_eq!(untouched.status, ReservationStatus::Confirmed);
    assert!(h.ledger.history(reservation.id).await.unwrap().is_empty());
}
