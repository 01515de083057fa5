mod common;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use parcelhub::errors::WorkflowError;
use parcelhub::models::{
    Actor, Attachment, MessageStatus, ModerationDecision, OfferDecision, OfferResponse,
    OfferStatus, OrderStatus, StepDetails, StepState, TrackingStatus, TransactionStatus,
};
use parcelhub::services::{AppendOutcome, CaptureCallback, NewMessage, TransactionFilter};
use parcelhub::workflow::{MAX_AMOUNT, MAX_QUANTITY};

use common::{
    accepted_order, actors, buy_for_me_order, item, order_with_offer, services_with,
    setup_services, DecliningGateway, FixedRefGateway, HangingGateway,
};

#[tokio::test]
async fn test_order_totals_buy_for_me() {
    let services = setup_services();
    let (shopper, _, _) = actors();

    let order = services
        .orders
        .create_order(&shopper, buy_for_me_order())
        .await
        .unwrap();
    let totals = order.totals();

    assert_eq!(totals.product_total, Decimal::from(25));
    assert_eq!(totals.service_total, Decimal::from(3));
    assert_eq!(totals.surcharge_total, Decimal::from(5));
    assert_eq!(totals.grand_total, Decimal::from(33));
    assert_eq!(order.status, OrderStatus::Open);

    let current = services.tracking.current_step(order.id).await.unwrap().unwrap();
    assert_eq!(current.status, TrackingStatus::Pending);
}

#[tokio::test]
async fn test_unknown_service_rejected() {
    let services = setup_services();
    let (shopper, shipper, _) = actors();

    let mut input = buy_for_me_order();
    input.selected_services = vec!["gift_wrap".into()];
    let err = services.orders.create_order(&shopper, input).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let err = services
        .orders
        .create_order(&shipper, buy_for_me_order())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
async fn test_accepting_one_offer_ignores_siblings() {
    let services = setup_services();
    let (shopper, shipper_a, _) = actors();
    let shipper_b = Actor::shipper(Uuid::new_v4());

    let (order, offer_a) = order_with_offer(&services, &shopper, &shipper_a, 40).await;
    let offer_b = services
        .offers
        .submit_offer(order.id, &shipper_b, Decimal::from(35))
        .await
        .unwrap();

    let accepted = services
        .offers
        .decide_offer(offer_a.id, &shopper, OfferDecision::Accepted)
        .await
        .unwrap();
    assert_eq!(accepted.status, OfferStatus::Accepted);

    let offers = services.offers.list_offers(&shopper, order.id).await.unwrap();
    let b = offers.iter().find(|o| o.id == offer_b.id).unwrap();
    assert_eq!(b.status, OfferStatus::Ignored);

    let order = services.orders.get_order(&shopper, order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::OfferAccepted);
    assert_eq!(order.accepted_offer_id, Some(offer_a.id));

    // Late decisions and bids bounce off the closed order.
    let err = services
        .offers
        .decide_offer(offer_b.id, &shopper, OfferDecision::Accepted)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyAccepted { .. }));

    let err = services
        .offers
        .submit_offer(order.id, &Actor::shipper(Uuid::new_v4()), Decimal::from(20))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::OrderClosed { .. }));

    let current = services.tracking.current_step(order.id).await.unwrap().unwrap();
    assert_eq!(current.status, TrackingStatus::OfferAccepted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_single_winner() {
    let services = setup_services();
    let (shopper, _, _) = actors();

    let order = services
        .orders
        .create_order(&shopper, buy_for_me_order())
        .await
        .unwrap();

    let mut offer_ids = Vec::new();
    for price in 30..38 {
        let offer = services
            .offers
            .submit_offer(order.id, &Actor::shipper(Uuid::new_v4()), Decimal::from(price))
            .await
            .unwrap();
        offer_ids.push(offer.id);
    }

    let mut handles = Vec::new();
    for offer_id in offer_ids {
        let services = services.clone();
        handles.push(tokio::spawn(async move {
            services
                .offers
                .decide_offer(offer_id, &shopper, OfferDecision::Accepted)
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(WorkflowError::AlreadyAccepted { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(winners, 1);

    let offers = services.offers.list_offers(&shopper, order.id).await.unwrap();
    assert_eq!(
        offers.iter().filter(|o| o.status == OfferStatus::Accepted).count(),
        1
    );
    assert!(offers
        .iter()
        .all(|o| matches!(o.status, OfferStatus::Accepted | OfferStatus::Ignored)));
}

#[tokio::test]
async fn test_counter_proposal_and_resubmission() {
    let services = setup_services();
    let (shopper, shipper, _) = actors();
    let (order, offer) = order_with_offer(&services, &shopper, &shipper, 50).await;

    let countered = services
        .offers
        .respond_to_offer(
            order.id,
            offer.id,
            &shopper,
            OfferResponse::ProposePrice {
                price: Decimal::from(42),
            },
        )
        .await
        .unwrap();
    assert_eq!(countered.status, OfferStatus::InProgress);
    assert_eq!(countered.price, Decimal::from(42));

    // Shipper answers with a new bid on the same live offer.
    let rebid = services
        .offers
        .submit_offer(order.id, &shipper, Decimal::from(45))
        .await
        .unwrap();
    assert_eq!(rebid.id, offer.id);
    assert_eq!(rebid.status, OfferStatus::Pending);

    let err = services
        .offers
        .respond_to_offer(order.id, offer.id, &shipper, OfferResponse::ProposePrice {
            price: Decimal::from(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    let cancelled = services
        .offers
        .respond_to_offer(order.id, offer.id, &shopper, OfferResponse::Cancel)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OfferStatus::Cancelled);

    let err = services
        .offers
        .decide_offer(offer.id, &shopper, OfferDecision::Accepted)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
}

#[tokio::test]
async fn test_cancel_open_order_withdraws_offers() {
    let services = setup_services();
    let (shopper, shipper, _) = actors();
    let (order, offer) = order_with_offer(&services, &shopper, &shipper, 40).await;

    let cancelled = services
        .orders
        .transition_status(order.id, OrderStatus::Cancelled, &shopper)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let offers = services.offers.list_offers(&shopper, order.id).await.unwrap();
    assert_eq!(offers[0].id, offer.id);
    assert_eq!(offers[0].status, OfferStatus::Cancelled);

    let timeline = services.tracking.timeline(order.id).await.unwrap();
    let last = timeline.last().unwrap();
    assert_eq!(last.status_id, TrackingStatus::Cancelled.id());
    assert_eq!(last.state, StepState::Current);

    let err = services
        .orders
        .transition_status(order.id, OrderStatus::Cancelled, &shopper)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
}

#[tokio::test]
async fn test_charge_release_and_reverse() {
    let (services, _) = services_with(
        Arc::new(FixedRefGateway {
            processor_ref: "ch_scenario_c".into(),
            fee: Decimal::from(3),
        }),
        Duration::from_secs(5),
    );
    let (shopper, shipper, admin) = actors();
    let (order, offer) = order_with_offer(&services, &shopper, &shipper, 67).await;
    services
        .offers
        .decide_offer(offer.id, &shopper, OfferDecision::Accepted)
        .await
        .unwrap();

    // 67 offer + 33 order total
    let outcome = services.payments.charge(order.id, &shopper).await.unwrap();
    assert_eq!(outcome.order.status, OrderStatus::PaymentCompleted);
    assert_eq!(outcome.transaction.amount, Decimal::from(100));
    assert_eq!(outcome.transaction.commission_amount, Decimal::from(10));
    assert_eq!(outcome.transaction.status, TransactionStatus::Pending);
    assert_eq!(outcome.transaction.user_id, shipper.id);

    let summary = services.ledger.summarize(shipper.id).await.unwrap();
    assert_eq!(summary.available_balance, Decimal::ZERO);
    assert_eq!(summary.pending_credits, Decimal::from(87));

    let released = services
        .ledger
        .release(outcome.transaction.id, &admin)
        .await
        .unwrap();
    assert_eq!(released.delta.amount, Decimal::from(87));
    assert_eq!(
        services.ledger.summarize(shipper.id).await.unwrap().available_balance,
        Decimal::from(87)
    );

    let err = services
        .ledger
        .release(outcome.transaction.id, &admin)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidLedgerTransition { .. }));

    let reversed = services
        .ledger
        .reverse(outcome.transaction.id, &admin)
        .await
        .unwrap();
    assert_eq!(reversed.delta.amount, Decimal::from(-87));
    assert_eq!(
        services.ledger.summarize(shipper.id).await.unwrap().available_balance,
        Decimal::ZERO
    );
}

#[tokio::test]
async fn test_gateway_failure_leaves_payment_pending() {
    let (services, _) = services_with(Arc::new(DecliningGateway), Duration::from_secs(5));
    let (shopper, shipper, _) = actors();
    let (order, _) = accepted_order(&services, &shopper, &shipper).await;

    let err = services.payments.charge(order.id, &shopper).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ExternalPaymentFailure(_)));
    assert!(err.is_retryable());

    let order = services.orders.get_order(&shopper, order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PaymentPending);
    let current = services.tracking.current_step(order.id).await.unwrap().unwrap();
    assert_eq!(current.status, TrackingStatus::PaymentPending);

    // The processor reconciles later through the webhook.
    let outcome = services
        .payments
        .capture_callback(CaptureCallback {
            order_id: order.id,
            amount: Decimal::from(73),
            processor_ref: "ch_late".into(),
            processor_fee: Decimal::from(2),
        })
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::PaymentCompleted);
}

#[tokio::test]
async fn test_gateway_timeout_is_payment_failure() {
    let (services, _) = services_with(Arc::new(HangingGateway), Duration::from_millis(50));
    let (shopper, shipper, _) = actors();
    let (order, _) = accepted_order(&services, &shopper, &shipper).await;

    let err = services.payments.charge(order.id, &shopper).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ExternalPaymentFailure(_)));

    let order = services.orders.get_order(&shopper, order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PaymentPending);
}

#[tokio::test]
async fn test_capture_callback_is_idempotent() {
    let (services, store) = services_with(
        Arc::new(FixedRefGateway {
            processor_ref: "ch_replayed".into(),
            fee: Decimal::ONE,
        }),
        Duration::from_secs(5),
    );
    let (shopper, shipper, _) = actors();
    let (order, _) = accepted_order(&services, &shopper, &shipper).await;

    let charged = services.payments.charge(order.id, &shopper).await.unwrap();

    let replay = CaptureCallback {
        order_id: order.id,
        amount: Decimal::from(73),
        processor_ref: "ch_replayed".into(),
        processor_fee: Decimal::ONE,
    };
    let first = services.payments.capture_callback(replay.clone()).await.unwrap();
    let second = services.payments.capture_callback(replay).await.unwrap();

    assert_eq!(first.transaction.id, charged.transaction.id);
    assert_eq!(second.transaction.id, charged.transaction.id);
    assert_eq!(store.list_transactions_for_order(order.id).await.unwrap().len(), 1);

    let err = services.payments.charge(order.id, &shopper).await.unwrap_err();
    assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
}

#[tokio::test]
async fn test_capture_callback_amount_must_match() {
    let services = setup_services();
    let (shopper, shipper, _) = actors();
    let (order, _) = accepted_order(&services, &shopper, &shipper).await;

    let err = services
        .payments
        .capture_callback(CaptureCallback {
            order_id: order.id,
            amount: Decimal::from(10),
            processor_ref: "ch_short".into(),
            processor_fee: Decimal::ZERO,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn test_tracking_sequence_through_delivery() {
    let services = setup_services();
    let (shopper, shipper, _) = actors();
    let (order, _) = accepted_order(&services, &shopper, &shipper).await;
    services.payments.charge(order.id, &shopper).await.unwrap();

    // Skipping `received` is refused and names the expected step.
    let err = services
        .tracking
        .append_step(order.id, &shipper, TrackingStatus::Processing.id(), StepDetails::default())
        .await
        .unwrap_err();
    match err {
        WorkflowError::SkippedStep { expected, .. } => assert_eq!(expected, TrackingStatus::Received),
        other => panic!("expected SkippedStep, got {other:?}"),
    }

    // Workflow-owned steps cannot be picked by hand.
    let err = services
        .tracking
        .append_step(order.id, &shipper, TrackingStatus::OfferAccepted.id(), StepDetails::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    // Only the accepted shipper may advance tracking.
    let err = services
        .tracking
        .append_step(
            order.id,
            &Actor::shipper(Uuid::new_v4()),
            TrackingStatus::Received.id(),
            StepDetails::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    let received = services
        .tracking
        .append_step(
            order.id,
            &shipper,
            TrackingStatus::Received.id(),
            StepDetails {
                tracking_number: Some("1Z999".into()),
                remarks: Some("Arrived at warehouse".into()),
                files: vec![],
            },
        )
        .await
        .unwrap();
    assert!(matches!(received, AppendOutcome::Appended(_)));
    assert_eq!(received.step().tracking_number.as_deref(), Some("1Z999"));

    let again = services
        .tracking
        .append_step(order.id, &shipper, TrackingStatus::Received.id(), StepDetails::default())
        .await
        .unwrap();
    assert!(matches!(again, AppendOutcome::Unchanged(_)));
    assert_eq!(again.step().id, received.step().id);

    let order_now = services.orders.get_order(&shopper, order.id).await.unwrap();
    assert_eq!(order_now.status, OrderStatus::InTransit);

    for status in [
        TrackingStatus::Processing,
        TrackingStatus::Shipped,
        TrackingStatus::InTransit,
        TrackingStatus::OutForDelivery,
        TrackingStatus::Delivered,
    ] {
        services
            .tracking
            .append_step(order.id, &shipper, status.id(), StepDetails::default())
            .await
            .unwrap();
    }

    let order_now = services.orders.get_order(&shopper, order.id).await.unwrap();
    assert_eq!(order_now.status, OrderStatus::Delivered);

    let timeline = services.tracking.timeline(order.id).await.unwrap();
    assert_eq!(timeline.len(), TrackingStatus::SEQUENCE.len());
    assert_eq!(timeline.last().unwrap().state, StepState::Current);
    assert!(timeline[..timeline.len() - 1]
        .iter()
        .all(|e| e.state == StepState::Done));
}

#[tokio::test]
async fn test_attachment_visibility_follows_moderation() {
    let services = setup_services();
    let (shopper, shipper, admin) = actors();
    let (order, _) = order_with_offer(&services, &shopper, &shipper, 40).await;

    let invoice = services
        .messages
        .send(
            order.id,
            &shopper,
            NewMessage {
                receiver_id: shipper.id,
                text: Some("Invoice attached".into()),
                attachments: vec![Attachment {
                    file_path: "uploads/invoice.pdf".into(),
                    mime_type: "application/pdf".into(),
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(invoice.status, MessageStatus::Pending);

    let text_only = services
        .messages
        .send(
            order.id,
            &shipper,
            NewMessage {
                receiver_id: shopper.id,
                text: Some("Thanks".into()),
                attachments: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(text_only.status, MessageStatus::Approved);

    let seen_by_shipper = services.messages.visible_thread(order.id, &shipper).await.unwrap();
    assert_eq!(seen_by_shipper.len(), 1);
    assert_eq!(seen_by_shipper[0].id, text_only.id);

    let seen_by_shopper = services.messages.visible_thread(order.id, &shopper).await.unwrap();
    assert_eq!(seen_by_shopper.len(), 2);

    let queue = services.messages.pending_queue(&admin).await.unwrap();
    assert_eq!(queue.len(), 1);

    services
        .messages
        .moderate(invoice.id, ModerationDecision::Approved, &admin)
        .await
        .unwrap();
    let seen_by_shipper = services.messages.visible_thread(order.id, &shipper).await.unwrap();
    assert_eq!(seen_by_shipper.len(), 2);

    let err = services
        .messages
        .moderate(invoice.id, ModerationDecision::Rejected, &admin)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
}

#[tokio::test]
async fn test_message_validation() {
    let services = setup_services();
    let (shopper, shipper, _) = actors();
    let (order, _) = order_with_offer(&services, &shopper, &shipper, 40).await;

    let bad_type = NewMessage {
        receiver_id: shipper.id,
        text: None,
        attachments: vec![Attachment {
            file_path: "uploads/run.exe".into(),
            mime_type: "application/x-msdownload".into(),
        }],
    };
    assert!(matches!(
        services.messages.send(order.id, &shopper, bad_type).await,
        Err(WorkflowError::Validation(_))
    ));

    let empty = NewMessage {
        receiver_id: shipper.id,
        text: Some("   ".into()),
        attachments: vec![],
    };
    assert!(matches!(
        services.messages.send(order.id, &shopper, empty).await,
        Err(WorkflowError::Validation(_))
    ));

    let outsider = Actor::shipper(Uuid::new_v4());
    let hello = NewMessage {
        receiver_id: shopper.id,
        text: Some("hello".into()),
        attachments: vec![],
    };
    assert!(matches!(
        services.messages.send(order.id, &outsider, hello).await,
        Err(WorkflowError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_out_of_range_amounts_are_rejected() {
    let services = setup_services();
    let (shopper, shipper, admin) = actors();

    let mut input = buy_for_me_order();
    input.line_items[0].unit_price = Decimal::MAX;
    let err = services.orders.create_order(&shopper, input).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let mut input = buy_for_me_order();
    input.line_items[0] = item("Pins", 1, MAX_QUANTITY + 1);
    let err = services.orders.create_order(&shopper, input).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    // Nothing was stored, so listings keep working.
    assert!(services.orders.list_orders(&admin).await.unwrap().is_empty());

    let (order, _) = order_with_offer(&services, &shopper, &shipper, 40).await;
    let rival = Actor::shipper(Uuid::new_v4());
    let err = services
        .offers
        .submit_offer(order.id, &rival, MAX_AMOUNT + Decimal::ONE)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let offers = services.offers.list_offers(&shopper, order.id).await.unwrap();
    let err = services
        .offers
        .respond_to_offer(
            order.id,
            offers[0].id,
            &shopper,
            OfferResponse::ProposePrice { price: Decimal::MAX },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let listed = services.orders.list_orders(&admin).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].totals().grand_total, Decimal::from(33));
}

#[tokio::test]
async fn test_reversal_leaves_queued_payout_unfunded() {
    let (services, _) = services_with(
        Arc::new(FixedRefGateway {
            processor_ref: "ch_clawback".into(),
            fee: Decimal::from(3),
        }),
        Duration::from_secs(5),
    );
    let (shopper, shipper, admin) = actors();
    let (order, offer) = order_with_offer(&services, &shopper, &shipper, 67).await;
    services
        .offers
        .decide_offer(offer.id, &shopper, OfferDecision::Accepted)
        .await
        .unwrap();

    let credit = services.payments.charge(order.id, &shopper).await.unwrap().transaction;
    services.ledger.release(credit.id, &admin).await.unwrap();

    let payout = services
        .ledger
        .request_payout(&shipper, Decimal::from(80))
        .await
        .unwrap();
    services.ledger.reverse(credit.id, &admin).await.unwrap();

    let err = services.ledger.release(payout.id, &admin).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InsufficientFunds { .. }));
    assert!(!err.is_retryable());

    let summary = services.ledger.summarize(shipper.id).await.unwrap();
    assert_eq!(summary.available_balance, Decimal::ZERO);

    let queued = services
        .ledger
        .list_transactions(
            &shipper,
            TransactionFilter {
                status: Some(TransactionStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].id, payout.id);
}

#[tokio::test]
async fn test_capture_after_cancel_is_booked_for_refund() {
    let (services, _) = services_with(Arc::new(HangingGateway), Duration::from_millis(50));
    let (shopper, shipper, admin) = actors();
    let (order, _) = accepted_order(&services, &shopper, &shipper).await;

    let err = services.payments.charge(order.id, &shopper).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ExternalPaymentFailure(_)));
    assert!(err.to_string().contains("50ms"), "{err}");

    services
        .orders
        .transition_status(order.id, OrderStatus::Cancelled, &shopper)
        .await
        .unwrap();

    let callback = CaptureCallback {
        order_id: order.id,
        amount: Decimal::from(73),
        processor_ref: "ch_after_cancel".into(),
        processor_fee: Decimal::from(2),
    };
    let outcome = services
        .payments
        .capture_callback(callback.clone())
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Cancelled);
    assert_eq!(outcome.transaction.status, TransactionStatus::Failed);
    assert_eq!(outcome.transaction.amount, Decimal::from(73));
    assert_eq!(outcome.transaction.payer_id, Some(shopper.id));

    // Replays return the same entry.
    let replay = services.payments.capture_callback(callback).await.unwrap();
    assert_eq!(replay.transaction.id, outcome.transaction.id);

    let rows = services
        .ledger
        .list_transactions(
            &admin,
            TransactionFilter {
                order_id: Some(order.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    // Never releasable to the shipper.
    let err = services
        .ledger
        .release(outcome.transaction.id, &admin)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidLedgerTransition { .. }));
    assert_eq!(
        services.ledger.summarize(shipper.id).await.unwrap().available_balance,
        Decimal::ZERO
    );
}

#[tokio::test]
async fn test_competing_shippers_cannot_message_each_other() {
    let services = setup_services();
    let (shopper, shipper, _) = actors();
    let rival = Actor::shipper(Uuid::new_v4());
    let (order, _) = order_with_offer(&services, &shopper, &shipper, 40).await;
    services
        .offers
        .submit_offer(order.id, &rival, Decimal::from(35))
        .await
        .unwrap();

    let err = services
        .messages
        .send(
            order.id,
            &rival,
            NewMessage {
                receiver_id: shipper.id,
                text: Some("what did you bid?".into()),
                attachments: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // Each bidder only sees their own conversation with the requester.
    services
        .messages
        .send(
            order.id,
            &shopper,
            NewMessage {
                receiver_id: shipper.id,
                text: Some("Can you do 30?".into()),
                attachments: vec![],
            },
        )
        .await
        .unwrap();
    assert!(services
        .messages
        .visible_thread(order.id, &rival)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        services.messages.visible_thread(order.id, &shipper).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_admin_joins_order_thread() {
    let services = setup_services();
    let (shopper, shipper, admin) = actors();
    let (order, _) = order_with_offer(&services, &shopper, &shipper, 40).await;

    let ask_admin = |text: &str| NewMessage {
        receiver_id: admin.id,
        text: Some(text.into()),
        attachments: vec![],
    };

    // An admin that never acted on the order is not addressable.
    let err = services
        .messages
        .send(order.id, &shopper, ask_admin("anyone there?"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    services
        .messages
        .send(
            order.id,
            &admin,
            NewMessage {
                receiver_id: shopper.id,
                text: Some("Support here, how can we help?".into()),
                attachments: vec![],
            },
        )
        .await
        .unwrap();

    let reply = services
        .messages
        .send(order.id, &shopper, ask_admin("The shipper is late"))
        .await
        .unwrap();
    assert_eq!(reply.receiver_id, admin.id);

    services
        .messages
        .send(order.id, &shipper, ask_admin("Customs is holding it"))
        .await
        .unwrap();

    let seen = services.messages.visible_thread(order.id, &admin).await.unwrap();
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn test_shipper_offer_listing_follows_order_visibility() {
    let services = setup_services();
    let (shopper, shipper, _) = actors();
    let newcomer = Actor::shipper(Uuid::new_v4());
    let (order, offer) = order_with_offer(&services, &shopper, &shipper, 40).await;

    // Open orders are public to shippers, with only their own bids shown.
    assert!(services
        .offers
        .list_offers(&newcomer, order.id)
        .await
        .unwrap()
        .is_empty());

    services
        .offers
        .decide_offer(offer.id, &shopper, OfferDecision::Accepted)
        .await
        .unwrap();

    let err = services.offers.list_offers(&newcomer, order.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
    assert!(matches!(
        services.orders.get_order(&newcomer, order.id).await,
        Err(WorkflowError::NotFound(_))
    ));
    assert_eq!(services.offers.list_offers(&shipper, order.id).await.unwrap().len(), 1);
}
