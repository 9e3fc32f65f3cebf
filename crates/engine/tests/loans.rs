use std::sync::Arc;

use chrono::{Duration, Months, Utc};
use sea_orm::{ConnectionTrait, Statement};
use tokio::task::JoinSet;

use engine::{
    EngineError, EntryFilter, EntryKind, GuarantorInput, InterestRate, LoanFilter, LoanStatus,
    LoanTermsUpdate, Money, NewLoan, TenantContext,
};

mod common;

use common::{deposit, engine_with_db, register_chama};

fn loan_request(borrower: &TenantContext, shillings: i64) -> NewLoan {
    NewLoan {
        borrower_id: borrower.member_id.clone(),
        principal: Money::from_major(shillings),
        interest_rate: InterestRate::from_percent(10).unwrap(),
        duration_months: 6,
        guarantors: Vec::new(),
    }
}

fn kind_filter(kind: EntryKind) -> EntryFilter {
    EntryFilter {
        kinds: Some(vec![kind]),
        ..EntryFilter::default()
    }
}

#[tokio::test]
async fn create_loan_applies_flat_interest_and_starts_pending() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "flat").await;

    let details = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 50_000))
        .await
        .unwrap();
    let loan = details.loan;

    assert_eq!(loan.total_repayable, Money::from_major(55_000));
    assert_eq!(loan.balance, Money::from_major(55_000));
    assert_eq!(loan.status, LoanStatus::Pending);
    assert_eq!(loan.disbursed_at, None);
    assert_eq!(
        loan.due_date,
        loan.created_at.checked_add_months(Months::new(6)).unwrap()
    );
    assert!(details.guarantors.is_empty());
}

#[tokio::test]
async fn members_cannot_request_loans_for_others() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "other").await;

    let err = engine
        .create_loan(&chama.alice, loan_request(&chama.bob, 1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    engine
        .create_loan(&chama.treasurer, loan_request(&chama.bob, 1_000))
        .await
        .unwrap();
}

#[tokio::test]
async fn repayments_close_the_loan_at_zero() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "repay").await;
    let loan = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 50_000))
        .await
        .unwrap()
        .loan;
    engine
        .update_status(&chama.treasurer, &loan.id, LoanStatus::Active)
        .await
        .unwrap();

    let loan = engine
        .record_repayment(&chama.alice, &loan.id, Money::from_major(5_000), Some("QWE123"))
        .await
        .unwrap();
    assert_eq!(loan.balance, Money::from_major(50_000));
    assert_eq!(loan.status, LoanStatus::Active);

    let loan = engine
        .record_repayment(&chama.treasurer, &loan.id, Money::from_major(50_000), None)
        .await
        .unwrap();
    assert_eq!(loan.balance, Money::ZERO);
    assert_eq!(loan.status, LoanStatus::Paid);

    let (entries, _) = engine
        .list_entries(&chama.admin, &kind_filter(EntryKind::LoanRepayment), 10, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(
        entries
            .iter()
            .all(|e| e.loan_id.as_deref() == Some(loan.id.as_str()))
    );
    assert!(
        entries
            .iter()
            .any(|e| e.reference_code.as_deref() == Some("QWE123"))
    );
}

#[tokio::test]
async fn overpayment_leaves_negative_balance_and_paid_status() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "over").await;
    let loan = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 1_000))
        .await
        .unwrap()
        .loan;

    let loan = engine
        .record_repayment(&chama.alice, &loan.id, Money::from_major(1_200), None)
        .await
        .unwrap();
    assert_eq!(loan.balance, Money::from_major(-100));
    assert_eq!(loan.status, LoanStatus::Paid);

    let loan = engine
        .record_repayment(&chama.alice, &loan.id, Money::from_major(50), None)
        .await
        .unwrap();
    assert_eq!(loan.balance, Money::from_major(-150));
    assert_eq!(loan.status, LoanStatus::Paid);
}

#[tokio::test]
async fn repayment_rejects_bad_amounts_and_rejected_loans() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "bad").await;
    let loan = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 1_000))
        .await
        .unwrap()
        .loan;

    let err = engine
        .record_repayment(&chama.alice, &loan.id, Money::ZERO, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .record_repayment(&chama.bob, &loan.id, Money::from_major(10), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    engine
        .update_status(&chama.admin, &loan.id, LoanStatus::Rejected)
        .await
        .unwrap();
    let err = engine
        .record_repayment(&chama.alice, &loan.id, Money::from_major(10), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}

#[tokio::test]
async fn concurrent_repayments_lose_no_update() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "race").await;
    let loan = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 50_000))
        .await
        .unwrap()
        .loan;

    let engine = Arc::new(engine);
    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let engine = Arc::clone(&engine);
        let ctx = chama.treasurer.clone();
        let loan_id = loan.id.clone();
        tasks.spawn(async move {
            engine
                .record_repayment(&ctx, &loan_id, Money::from_major(1_000), None)
                .await
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap().unwrap();
    }

    let details = engine.loan(&chama.admin, &loan.id).await.unwrap();
    assert_eq!(details.loan.balance, Money::from_major(45_000));

    let (entries, _) = engine
        .list_entries(&chama.admin, &kind_filter(EntryKind::LoanRepayment), 50, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 10);
}

#[tokio::test]
async fn failed_ledger_write_rolls_back_the_balance() {
    let (engine, db) = engine_with_db().await;
    let chama = register_chama(&engine, "atomic").await;
    let loan = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 10_000))
        .await
        .unwrap()
        .loan;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "CREATE TRIGGER block_repayments BEFORE INSERT ON ledger_entries \
         WHEN NEW.kind = 'loan_repayment' \
         BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
    ))
    .await
    .unwrap();

    let err = engine
        .record_repayment(&chama.alice, &loan.id, Money::from_major(1_000), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Database(_)));

    let details = engine.loan(&chama.admin, &loan.id).await.unwrap();
    assert_eq!(details.loan.balance, Money::from_major(11_000));
    assert_eq!(details.loan.status, LoanStatus::Pending);
}

#[tokio::test]
async fn principal_is_disbursed_exactly_once() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "disburse").await;
    let loan = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 20_000))
        .await
        .unwrap()
        .loan;

    let approved = engine
        .update_status(&chama.treasurer, &loan.id, LoanStatus::Approved)
        .await
        .unwrap();
    assert!(approved.disbursed_at.is_some());
    let active = engine
        .update_status(&chama.treasurer, &loan.id, LoanStatus::Active)
        .await
        .unwrap();
    assert_eq!(active.disbursed_at, approved.disbursed_at);
    engine
        .update_status(&chama.treasurer, &loan.id, LoanStatus::Active)
        .await
        .unwrap();

    let (entries, _) = engine
        .list_entries(
            &chama.admin,
            &kind_filter(EntryKind::LoanDisbursement),
            10,
            None,
        )
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, Money::from_major(20_000));
    assert_eq!(entries[0].member_id, chama.alice.member_id);
}

#[tokio::test]
async fn status_changes_follow_the_state_machine() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "states").await;
    let loan = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 1_000))
        .await
        .unwrap()
        .loan;

    let err = engine
        .update_status(&chama.alice, &loan.id, LoanStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let err = engine
        .update_status(&chama.admin, &loan.id, LoanStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    engine
        .update_status(&chama.admin, &loan.id, LoanStatus::Rejected)
        .await
        .unwrap();
    let err = engine
        .update_status(&chama.admin, &loan.id, LoanStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}

#[tokio::test]
async fn adjusting_to_zero_marks_paid_and_logs_the_delta() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "adjust").await;
    let loan = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 50_000))
        .await
        .unwrap()
        .loan;
    engine
        .update_status(&chama.admin, &loan.id, LoanStatus::Active)
        .await
        .unwrap();
    engine
        .record_repayment(&chama.alice, &loan.id, Money::from_major(5_000), None)
        .await
        .unwrap();

    let err = engine
        .adjust_balance(&chama.alice, &loan.id, Money::ZERO, "typo")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
    let err = engine
        .adjust_balance(&chama.admin, &loan.id, Money::ZERO, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let loan = engine
        .adjust_balance(&chama.admin, &loan.id, Money::ZERO, "paid in cash at meeting")
        .await
        .unwrap();
    assert_eq!(loan.balance, Money::ZERO);
    assert_eq!(loan.status, LoanStatus::Paid);

    let (entries, _) = engine
        .list_entries(&chama.admin, &kind_filter(EntryKind::Adjustment), 10, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, Money::from_major(50_000));
    assert_eq!(entries[0].delta, Some(Money::from_major(-50_000)));
    assert!(
        entries[0]
            .description
            .as_deref()
            .is_some_and(|d| d.contains("paid in cash at meeting"))
    );

    let loan = engine
        .adjust_balance(&chama.admin, &loan.id, Money::from_major(2_000), "reopened")
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Active);

    let err = engine
        .adjust_balance(&chama.admin, &loan.id, Money::from_major(2_000), "noop")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn guarantors_are_validated_against_savings() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "guard").await;
    deposit(&engine, &chama.treasurer, &chama.bob.member_id, 3_000).await;

    let with_guarantor = |guarantor_id: &str, shillings: i64| NewLoan {
        guarantors: vec![GuarantorInput {
            guarantor_id: guarantor_id.to_string(),
            amount: Money::from_major(shillings),
        }],
        ..loan_request(&chama.alice, 10_000)
    };

    let err = engine
        .create_loan(&chama.alice, with_guarantor(&chama.alice.member_id, 100))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let err = engine
        .create_loan(&chama.alice, with_guarantor(&chama.bob.member_id, 5_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let details = engine
        .create_loan(&chama.alice, with_guarantor(&chama.bob.member_id, 2_000))
        .await
        .unwrap();
    assert_eq!(details.guarantors.len(), 1);
    assert!(!details.guarantors[0].accepted);

    // 2000 of bob's 3000 is now committed on an open loan.
    let err = engine
        .create_loan(&chama.alice, with_guarantor(&chama.bob.member_id, 1_500))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let too_many = NewLoan {
        guarantors: vec![
            GuarantorInput {
                guarantor_id: chama.bob.member_id.clone(),
                amount: Money::from_major(1),
            },
            GuarantorInput {
                guarantor_id: chama.treasurer.member_id.clone(),
                amount: Money::from_major(1),
            },
            GuarantorInput {
                guarantor_id: chama.admin.member_id.clone(),
                amount: Money::from_major(1),
            },
        ],
        ..loan_request(&chama.alice, 10_000)
    };
    let err = engine.create_loan(&chama.alice, too_many).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn guarantorship_approval_is_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "approve").await;
    deposit(&engine, &chama.treasurer, &chama.bob.member_id, 5_000).await;
    let details = engine
        .create_loan(
            &chama.alice,
            NewLoan {
                guarantors: vec![GuarantorInput {
                    guarantor_id: chama.bob.member_id.clone(),
                    amount: Money::from_major(4_000),
                }],
                ..loan_request(&chama.alice, 8_000)
            },
        )
        .await
        .unwrap();
    let row_id = details.guarantors[0].id.clone();

    let err = engine
        .approve_guarantorship(&chama.alice, &row_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let first = engine
        .approve_guarantorship(&chama.bob, &row_id)
        .await
        .unwrap();
    let second = engine
        .approve_guarantorship(&chama.bob, &row_id)
        .await
        .unwrap();
    assert!(first.accepted);
    assert_eq!(first, second);

    let guarantees = engine.list_guarantees(&chama.bob).await.unwrap();
    assert_eq!(guarantees.len(), 1);
    assert_eq!(guarantees[0].1.id, details.loan.id);

    // The guarantor can read the loan they back.
    engine.loan(&chama.bob, &details.loan.id).await.unwrap();
}

#[tokio::test]
async fn loans_are_invisible_across_tenants() {
    let (engine, _db) = engine_with_db().await;
    let nairobi = register_chama(&engine, "nairobi").await;
    let mombasa = register_chama(&engine, "mombasa").await;
    deposit(&engine, &nairobi.treasurer, &nairobi.bob.member_id, 500).await;
    let details = engine
        .create_loan(
            &nairobi.alice,
            NewLoan {
                guarantors: vec![GuarantorInput {
                    guarantor_id: nairobi.bob.member_id.clone(),
                    amount: Money::from_major(500),
                }],
                ..loan_request(&nairobi.alice, 1_000)
            },
        )
        .await
        .unwrap();
    let loan = details.loan;
    let guarantee_id = details.guarantors[0].id.clone();

    let err = engine.loan(&mombasa.admin, &loan.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine
        .update_status(&mombasa.admin, &loan.id, LoanStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine
        .record_repayment(&mombasa.admin, &loan.id, Money::from_major(1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine
        .update_details(
            &mombasa.admin,
            &loan.id,
            LoanTermsUpdate {
                principal: Some(Money::from_major(9_000)),
                ..LoanTermsUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine
        .adjust_balance(&mombasa.admin, &loan.id, Money::ZERO, "write off")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine
        .approve_guarantorship(&mombasa.admin, &guarantee_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine.delete_loan(&mombasa.admin, &loan.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    assert!(engine.loan_audit_log(&mombasa.admin).await.unwrap().is_empty());

    let untouched = engine.loan(&nairobi.admin, &loan.id).await.unwrap();
    assert_eq!(untouched.loan.principal, Money::from_major(1_000));
    assert_eq!(untouched.loan.balance, Money::from_major(1_100));
    assert_eq!(untouched.loan.status, LoanStatus::Pending);
    assert!(!untouched.guarantors[0].accepted);

    let listed = engine
        .list_loans(&mombasa.admin, &LoanFilter::default())
        .await
        .unwrap();
    assert!(listed.is_empty());

    // Plain members of the same chama do not see each other's loans either.
    let err = engine.loan(&nairobi.bob, &loan.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let listed = engine
        .list_loans(&nairobi.bob, &LoanFilter::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn term_edits_flag_divergence_without_touching_the_balance() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "terms").await;
    let loan = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 10_000))
        .await
        .unwrap()
        .loan;

    let updated = engine
        .update_details(
            &chama.admin,
            &loan.id,
            LoanTermsUpdate {
                principal: Some(Money::from_major(12_000)),
                interest_rate: None,
                duration_months: Some(12),
            },
        )
        .await
        .unwrap();
    assert!(updated.terms_diverged);
    assert_eq!(updated.loan.principal, Money::from_major(12_000));
    assert_eq!(updated.loan.balance, Money::from_major(11_000));
    assert_eq!(updated.loan.total_repayable, Money::from_major(11_000));
    assert_eq!(
        updated.loan.due_date,
        loan.created_at.checked_add_months(Months::new(12)).unwrap()
    );

    let updated = engine
        .update_details(
            &chama.admin,
            &loan.id,
            LoanTermsUpdate {
                principal: Some(Money::from_major(10_000)),
                ..LoanTermsUpdate::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.terms_diverged);
}

#[tokio::test]
async fn deleting_a_loan_keeps_an_audit_snapshot() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "delete").await;
    deposit(&engine, &chama.treasurer, &chama.bob.member_id, 1_000).await;
    let details = engine
        .create_loan(
            &chama.alice,
            NewLoan {
                guarantors: vec![GuarantorInput {
                    guarantor_id: chama.bob.member_id.clone(),
                    amount: Money::from_major(500),
                }],
                ..loan_request(&chama.alice, 2_000)
            },
        )
        .await
        .unwrap();

    let err = engine
        .delete_loan(&chama.alice, &details.loan.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    engine
        .delete_loan(&chama.admin, &details.loan.id)
        .await
        .unwrap();
    let err = engine
        .loan(&chama.admin, &details.loan.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let log = engine.loan_audit_log(&chama.admin).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, "delete");
    assert_eq!(log[0].actor_id, chama.admin.member_id);
    assert_eq!(log[0].snapshot.loan.id, details.loan.id);
    assert_eq!(log[0].snapshot.loan.balance, Money::from_major(2_200));
    assert_eq!(log[0].snapshot.guarantors.len(), 1);
}

#[tokio::test]
async fn default_sweep_only_touches_overdue_active_loans() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "sweep").await;
    let other = register_chama(&engine, "elsewhere").await;

    let overdue = engine
        .create_loan(&chama.alice, loan_request(&chama.alice, 1_000))
        .await
        .unwrap()
        .loan;
    engine
        .update_status(&chama.admin, &overdue.id, LoanStatus::Active)
        .await
        .unwrap();
    let pending = engine
        .create_loan(&chama.bob, loan_request(&chama.bob, 1_000))
        .await
        .unwrap()
        .loan;
    let foreign = engine
        .create_loan(&other.alice, loan_request(&other.alice, 1_000))
        .await
        .unwrap()
        .loan;
    engine
        .update_status(&other.admin, &foreign.id, LoanStatus::Active)
        .await
        .unwrap();

    let later = Utc::now() + Duration::days(365);
    let stats = engine.loan_stats(&chama.admin, later).await.unwrap();
    assert_eq!(stats.overdue_loans, 1);

    let changed = engine
        .mark_overdue_defaulted(&chama.treasurer, later)
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let details = engine.loan(&chama.admin, &overdue.id).await.unwrap();
    assert_eq!(details.loan.status, LoanStatus::Defaulted);
    let details = engine.loan(&chama.admin, &pending.id).await.unwrap();
    assert_eq!(details.loan.status, LoanStatus::Pending);
    let details = engine.loan(&other.admin, &foreign.id).await.unwrap();
    assert_eq!(details.loan.status, LoanStatus::Active);

    assert_eq!(engine.mark_overdue_defaulted_all(later).await.unwrap(), 1);
}

#[tokio::test]
async fn unreadable_commitments_block_new_guarantees() {
    let (engine, db) = engine_with_db().await;
    let chama = register_chama(&engine, "corrupt").await;
    deposit(&engine, &chama.treasurer, &chama.bob.member_id, 3_000).await;
    let with_bob = |shillings: i64| NewLoan {
        guarantors: vec![GuarantorInput {
            guarantor_id: chama.bob.member_id.clone(),
            amount: Money::from_major(shillings),
        }],
        ..loan_request(&chama.alice, 10_000)
    };
    engine
        .create_loan(&chama.alice, with_bob(2_000))
        .await
        .unwrap();

    // A non-integer commitment makes the committed sum undecodable.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "UPDATE loan_guarantors SET amount_minor = 200000.5",
    ))
    .await
    .unwrap();

    let err = engine
        .create_loan(&chama.alice, with_bob(2_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Database(_)));
}
