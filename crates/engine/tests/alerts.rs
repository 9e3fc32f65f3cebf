use engine::{
    AlertOutcome, AlertStatus, EngineError, EntryFilter, EntryKind, Money, MpesaCallback,
    NewAlert, PaystackEvent, Provider, Role, TenantContext,
};

mod common;

use common::{Chama, engine_with_db, new_member, register_chama};

fn stk_callback(receipt: &str, amount: i64, phone: &str) -> String {
    format!(
        r#"{{
  "Body": {{
    "stkCallback": {{
      "MerchantRequestID": "29115-34620561-1",
      "CheckoutRequestID": "ws_CO_191220191020363925",
      "ResultCode": 0,
      "ResultDesc": "The service request is processed successfully.",
      "CallbackMetadata": {{
        "Item": [
          {{ "Name": "Amount", "Value": {amount} }},
          {{ "Name": "MpesaReceiptNumber", "Value": "{receipt}" }},
          {{ "Name": "TransactionDate", "Value": 20191219102115 }},
          {{ "Name": "PhoneNumber", "Value": {phone} }}
        ]
      }}
    }}
  }}
}}"#
    )
}

async fn mpesa_alert(
    engine: &engine::Engine,
    receipt: &str,
    amount: i64,
    phone: &str,
    tenant_id: Option<&str>,
) -> String {
    let raw = stk_callback(receipt, amount, phone);
    let callback: MpesaCallback = serde_json::from_str(&raw).unwrap();
    let alert = NewAlert::from_mpesa(&callback, &raw, tenant_id.map(ToString::to_string))
        .unwrap()
        .unwrap();
    engine.ingest_alert(alert).await.unwrap()
}

async fn member_with_phone(
    engine: &engine::Engine,
    chama: &Chama,
    email: &str,
    phone: &str,
) -> TenantContext {
    let member = engine
        .invite_member(
            &chama.admin,
            new_member(email, "Mary Akinyi", Some(phone), Role::Member),
        )
        .await
        .unwrap();
    engine.resolve_context(&member.id).await.unwrap()
}

#[tokio::test]
async fn mpesa_payment_is_matched_by_normalized_phone() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "mpesa").await;
    let mary = member_with_phone(&engine, &chama, "mary@example.com", "0712345678").await;

    let alert_id = mpesa_alert(&engine, "NLJ7RT61SV", 5000, "254712345678", None).await;
    let outcome = engine.process_alert(&alert_id).await.unwrap();
    let AlertOutcome::Matched {
        member_id,
        ledger_entry_id,
    } = outcome
    else {
        panic!("expected a match, got {outcome:?}");
    };
    assert_eq!(member_id, mary.member_id);

    let (entries, _) = engine
        .list_entries(&chama.admin, &EntryFilter::default(), 10, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    let deposit = &entries[0];
    assert_eq!(deposit.id, ledger_entry_id);
    assert_eq!(deposit.kind, EntryKind::Deposit);
    assert_eq!(deposit.amount, Money::from_major(5000));
    assert_eq!(deposit.reference_code.as_deref(), Some("NLJ7RT61SV"));
    assert!(
        deposit
            .description
            .as_deref()
            .is_some_and(|d| d.contains("NLJ7RT61SV"))
    );

    // Processing again writes nothing.
    let again = engine.process_alert(&alert_id).await.unwrap();
    assert_eq!(again, AlertOutcome::AlreadyProcessed);
    let (entries, _) = engine
        .list_entries(&chama.admin, &EntryFilter::default(), 10, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert!(engine.list_pending_alerts(&chama.admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_deliveries_store_one_alert() {
    let (engine, _db) = engine_with_db().await;

    let first = mpesa_alert(&engine, "QAB12CD34E", 100, "254700000001", None).await;
    let second = mpesa_alert(&engine, "QAB12CD34E", 100, "254700000001", None).await;
    assert_eq!(first, second);

    let pending = engine.list_unscoped_pending_alerts().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].provider, Provider::Mpesa);
    assert_eq!(pending[0].status, AlertStatus::Pending);
}

#[tokio::test]
async fn ambiguous_phone_stays_pending() {
    let (engine, _db) = engine_with_db().await;
    let eldoret = register_chama(&engine, "eldoret").await;
    let thika = register_chama(&engine, "thika").await;
    member_with_phone(&engine, &eldoret, "one@example.com", "0722000111").await;
    member_with_phone(&engine, &thika, "two@example.com", "+254722000111").await;

    let alert_id = mpesa_alert(&engine, "RKT55XY90Z", 700, "254722000111", None).await;
    let outcome = engine.process_alert(&alert_id).await.unwrap();
    assert_eq!(outcome, AlertOutcome::Unmatched);
    assert_eq!(engine.list_unscoped_pending_alerts().await.unwrap().len(), 1);

    // Scoping the alert to one chama removes the ambiguity.
    let scoped = mpesa_alert(
        &engine,
        "RKT55XY91Z",
        700,
        "254722000111",
        Some(&thika.admin.tenant_id),
    )
    .await;
    let outcome = engine.process_alert(&scoped).await.unwrap();
    assert!(matches!(outcome, AlertOutcome::Matched { .. }));
}

#[tokio::test]
async fn unknown_phone_can_be_assigned_manually() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "manual").await;

    let alert_id = mpesa_alert(
        &engine,
        "SBC99QW12E",
        1_500,
        "254799999999",
        Some(&chama.admin.tenant_id),
    )
    .await;
    assert_eq!(
        engine.process_alert(&alert_id).await.unwrap(),
        AlertOutcome::Unmatched
    );

    let pending = engine.list_pending_alerts(&chama.treasurer).await.unwrap();
    assert_eq!(pending.len(), 1);
    let err = engine.list_pending_alerts(&chama.alice).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let entry = engine
        .assign_alert(&chama.treasurer, &alert_id, &chama.bob.member_id)
        .await
        .unwrap();
    assert_eq!(entry.member_id, chama.bob.member_id);
    assert_eq!(entry.amount, Money::from_major(1_500));
    assert_eq!(entry.recorded_by.as_deref(), Some(chama.treasurer.member_id.as_str()));

    let err = engine
        .assign_alert(&chama.treasurer, &alert_id, &chama.alice.member_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}

#[tokio::test]
async fn alerts_of_other_chamas_cannot_be_assigned() {
    let (engine, _db) = engine_with_db().await;
    let mine = register_chama(&engine, "mine").await;
    let theirs = register_chama(&engine, "theirs").await;

    let alert_id = mpesa_alert(
        &engine,
        "TXX11AA22B",
        300,
        "254711111111",
        Some(&theirs.admin.tenant_id),
    )
    .await;
    let err = engine
        .assign_alert(&mine.admin, &alert_id, &mine.alice.member_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let unscoped = mpesa_alert(&engine, "TXX11AA22C", 300, "254711111111", None).await;
    let err = engine
        .assign_alert(&mine.admin, &unscoped, &mine.alice.member_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let entry = engine
        .assign_unscoped_alert(&unscoped, &mine.alice.member_id)
        .await
        .unwrap();
    assert_eq!(entry.kind, EntryKind::Deposit);
    let err = engine
        .assign_unscoped_alert(&alert_id, &mine.alice.member_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn alerts_for_unknown_chamas_are_stored_unscoped() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "stale").await;
    let mary = member_with_phone(&engine, &chama, "mary@stale.co.ke", "0700000002").await;

    let stale = mpesa_alert(
        &engine,
        "UNK00000001",
        100,
        "254799999999",
        Some("5f0c3a5e-8a1e-4a51-9d3f-2d6f2f7c9b10"),
    )
    .await;
    let garbled = mpesa_alert(&engine, "UNK00000002", 200, "254799999999", Some("umoja")).await;

    let pending = engine.list_unscoped_pending_alerts().await.unwrap();
    let ids: Vec<&str> = pending.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&stale.as_str()));
    assert!(ids.contains(&garbled.as_str()));
    assert!(pending.iter().all(|a| a.tenant_id.is_none()));

    // Unscoped alerts still match on phone across chamas.
    let matched = mpesa_alert(
        &engine,
        "UNK00000003",
        300,
        "254700000002",
        Some("5f0c3a5e-8a1e-4a51-9d3f-2d6f2f7c9b10"),
    )
    .await;
    let outcome = engine.process_alert(&matched).await.unwrap();
    assert!(matches!(outcome, AlertOutcome::Matched { .. }));
    assert_eq!(
        engine.member_savings(&mary, &mary.member_id).await.unwrap(),
        Money::from_major(300)
    );
}

#[tokio::test]
async fn paystack_charge_is_matched_by_customer_phone() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "paystack").await;
    let mary = member_with_phone(&engine, &chama, "mary@example.com", "0733444555").await;

    let raw = r#"{
      "event": "charge.success",
      "data": {
        "reference": "T685312322670591",
        "amount": 250000,
        "customer": { "email": "mary@example.com", "phone": "0733444555" }
      }
    }"#;
    let event: PaystackEvent = serde_json::from_str(raw).unwrap();
    let alert = NewAlert::from_paystack(&event, raw, Some(chama.admin.tenant_id.clone())).unwrap();
    assert_eq!(alert.amount, Money::from_major(2_500));

    let alert_id = engine.ingest_alert(alert).await.unwrap();
    let outcome = engine.process_alert(&alert_id).await.unwrap();
    assert!(matches!(
        outcome,
        AlertOutcome::Matched { ref member_id, .. } if *member_id == mary.member_id
    ));
}
