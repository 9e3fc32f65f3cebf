use chrono::{NaiveDate, Utc};

use engine::{
    EngineError, EntryKind, InterestRate, LoanStatus, MemberUpdate, Money, NewAsset, NewEntry,
    NewLoan, NewTenant, Role, TenantUpdate,
};

mod common;

use common::{deposit, engine_with_db, invite, new_member, register_chama};

fn chama_named(name: &str) -> NewTenant {
    NewTenant {
        name: name.to_string(),
        contact_email: Some("Info@Umoja.co.ke".to_string()),
        contact_phone: Some("0700123456".to_string()),
        logo_url: None,
    }
}

#[tokio::test]
async fn sign_up_then_register_makes_the_founder_admin() {
    let (engine, _db) = engine_with_db().await;
    let member = engine
        .sign_up(new_member(
            "founder@example.com",
            "  jane   muthoni ",
            Some("0712 345 678"),
            Role::Admin,
        ))
        .await
        .unwrap();
    assert_eq!(member.role, Role::Member);
    assert_eq!(member.tenant_id, None);
    assert_eq!(member.name, "Jane Muthoni");
    assert_eq!(member.phone.as_deref(), Some("+254712345678"));

    let err = engine.resolve_context(&member.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let tenant = engine
        .register_tenant(&member.id, chama_named("Umoja Women Group"))
        .await
        .unwrap();
    assert_eq!(tenant.contact_email.as_deref(), Some("info@umoja.co.ke"));
    assert_eq!(tenant.contact_phone.as_deref(), Some("+254700123456"));

    let ctx = engine.resolve_context(&member.id).await.unwrap();
    assert_eq!(ctx.tenant_id, tenant.id);
    assert_eq!(ctx.role, Role::Admin);
    assert_eq!(engine.tenant(&ctx).await.unwrap(), tenant);

    let err = engine
        .register_tenant(&member.id, chama_named("Second Group"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}

#[tokio::test]
async fn unknown_identities_have_no_context() {
    let (engine, _db) = engine_with_db().await;
    for id in ["", "not-a-uuid", "5f0c3a5e-8a1e-4a51-9d3f-2d6f2f7c9b10"] {
        let err = engine.resolve_context(id).await.unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized(_)), "{id}");
    }
}

#[tokio::test]
async fn emails_are_unique_across_chamas() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "unique").await;
    let err = engine
        .sign_up(new_member(
            "UNIQUE-alice@example.com",
            "Other Alice",
            None,
            Role::Member,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let err = engine
        .invite_member(
            &chama.admin,
            new_member("bad-phone@example.com", "Bad Phone", Some("12345"), Role::Member),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn only_admins_grant_admin_and_change_roles() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "roles").await;

    let err = engine
        .invite_member(
            &chama.treasurer,
            new_member("x@example.com", "Xavier Mwangi", None, Role::Admin),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
    let err = engine
        .invite_member(
            &chama.alice,
            new_member("y@example.com", "Yusuf Hassan", None, Role::Member),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    // Treasurers may still invite plain members.
    invite(&engine, &chama.treasurer, "z@example.com", "Zawadi Chebet", Role::Member).await;

    let err = engine
        .update_member_role(&chama.treasurer, &chama.alice.member_id, Role::Treasurer)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let err = engine
        .update_member_role(&chama.admin, &chama.admin.member_id, Role::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    engine
        .update_member_role(&chama.admin, &chama.alice.member_id, Role::Admin)
        .await
        .unwrap();
    let demoted = engine
        .update_member_role(&chama.admin, &chama.admin.member_id, Role::Member)
        .await
        .unwrap();
    assert_eq!(demoted.role, Role::Member);

    let promoted = engine.resolve_context(&chama.alice.member_id).await.unwrap();
    assert_eq!(promoted.role, Role::Admin);
}

#[tokio::test]
async fn profiles_are_self_or_privileged() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "profile").await;

    let updated = engine
        .update_member_profile(
            &chama.alice,
            &chama.alice.member_id,
            MemberUpdate {
                name: None,
                phone: Some("+254 722 000 333".to_string()),
                avatar_url: Some("https://cdn.example.com/a.png".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.phone.as_deref(), Some("+254722000333"));
    assert_eq!(updated.name, "Alice Njeri");

    let err = engine
        .update_member_profile(
            &chama.alice,
            &chama.bob.member_id,
            MemberUpdate {
                name: Some("Robert Kamau".to_string()),
                phone: None,
                avatar_url: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    // An empty phone clears it.
    let cleared = engine
        .update_member_profile(
            &chama.treasurer,
            &chama.alice.member_id,
            MemberUpdate {
                name: None,
                phone: Some(String::new()),
                avatar_url: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.phone, None);
}

#[tokio::test]
async fn roster_counts_activity_and_removal_needs_a_clean_history() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "roster").await;
    deposit(&engine, &chama.treasurer, &chama.alice.member_id, 100).await;

    let roster = engine.list_members(&chama.bob).await.unwrap();
    assert_eq!(roster.len(), 4);
    let alice = roster
        .iter()
        .find(|s| s.member.id == chama.alice.member_id)
        .unwrap();
    assert_eq!(alice.ledger_entries, 1);
    assert_eq!(alice.loans, 0);

    let err = engine
        .remove_member(&chama.admin, &chama.alice.member_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
    let err = engine
        .remove_member(&chama.admin, &chama.admin.member_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
    let err = engine
        .remove_member(&chama.treasurer, &chama.bob.member_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    engine
        .remove_member(&chama.admin, &chama.bob.member_id)
        .await
        .unwrap();
    let err = engine
        .member(&chama.admin, &chama.bob.member_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn chama_settings_are_admin_only() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "settings").await;

    let update = TenantUpdate {
        name: Some("Harambee Savers".to_string()),
        contact_email: None,
        contact_phone: None,
        logo_url: Some("https://cdn.example.com/logo.png".to_string()),
    };
    let err = engine
        .update_tenant(&chama.treasurer, update.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let tenant = engine.update_tenant(&chama.admin, update).await.unwrap();
    assert_eq!(tenant.name, "Harambee Savers");
    assert_eq!(
        tenant.logo_url.as_deref(),
        Some("https://cdn.example.com/logo.png")
    );
}

#[tokio::test]
async fn assets_and_dashboard() {
    let (engine, _db) = engine_with_db().await;
    let chama = register_chama(&engine, "assets").await;
    let land = NewAsset {
        name: "Plot in Kitengela".to_string(),
        description: Some("Quarter acre".to_string()),
        category: "land".to_string(),
        purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        purchase_price: Money::from_major(400_000),
        current_value: Money::from_major(450_000),
        documents: vec!["https://docs.example.com/title.pdf".to_string(), " ".to_string()],
    };

    let err = engine
        .create_asset(&chama.alice, land.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let asset = engine.create_asset(&chama.treasurer, land).await.unwrap();
    assert_eq!(asset.documents.len(), 1);
    let asset = engine
        .update_asset_value(&chama.treasurer, &asset.id, Money::from_major(500_000))
        .await
        .unwrap();
    assert_eq!(asset.current_value, Money::from_major(500_000));
    assert_eq!(engine.list_assets(&chama.alice).await.unwrap(), vec![asset.clone()]);

    deposit(&engine, &chama.treasurer, &chama.alice.member_id, 30_000).await;
    engine
        .record_entry(
            &chama.treasurer,
            NewEntry {
                member_id: chama.bob.member_id.clone(),
                kind: EntryKind::Expense,
                amount: Money::from_major(1_000),
                description: Some("Meeting venue".to_string()),
                reference_code: None,
            },
        )
        .await
        .unwrap();
    let loan = engine
        .create_loan(
            &chama.bob,
            NewLoan {
                borrower_id: chama.bob.member_id.clone(),
                principal: Money::from_major(10_000),
                interest_rate: InterestRate::from_percent(10).unwrap(),
                duration_months: 3,
                guarantors: Vec::new(),
            },
        )
        .await
        .unwrap()
        .loan;
    engine
        .update_status(&chama.admin, &loan.id, LoanStatus::Active)
        .await
        .unwrap();
    engine
        .record_repayment(&chama.bob, &loan.id, Money::from_major(2_000), None)
        .await
        .unwrap();

    let dashboard = engine.dashboard_stats(&chama.alice, Utc::now()).await.unwrap();
    // 30000 - 1000 - 10000 + 2000
    assert_eq!(dashboard.cash_at_hand, Money::from_major(21_000));
    assert_eq!(dashboard.active_loans, 1);
    assert_eq!(dashboard.overdue_loans, 0);
    assert_eq!(dashboard.total_members, 4);
    assert_eq!(dashboard.total_assets, Money::from_major(500_000));

    let loans = engine.loan_stats(&chama.admin, Utc::now()).await.unwrap();
    assert_eq!(loans.principal_disbursed, Money::from_major(10_000));
    assert_eq!(loans.total_repaid, Money::from_major(2_000));
    assert_eq!(loans.outstanding_balance, Money::from_major(9_000));

    engine.delete_asset(&chama.admin, &asset.id).await.unwrap();
    assert!(engine.list_assets(&chama.admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn assets_are_invisible_across_chamas() {
    let (engine, _db) = engine_with_db().await;
    let nakuru = register_chama(&engine, "nakuru").await;
    let kisumu = register_chama(&engine, "kisumu").await;
    let matatu = engine
        .create_asset(
            &nakuru.treasurer,
            NewAsset {
                name: "Matatu KDA 123X".to_string(),
                description: None,
                category: "vehicle".to_string(),
                purchase_date: NaiveDate::from_ymd_opt(2023, 8, 15).unwrap(),
                purchase_price: Money::from_major(2_800_000),
                current_value: Money::from_major(2_400_000),
                documents: Vec::new(),
            },
        )
        .await
        .unwrap();

    assert!(engine.list_assets(&kisumu.admin).await.unwrap().is_empty());
    let err = engine
        .update_asset_value(&kisumu.admin, &matatu.id, Money::from_major(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    let err = engine
        .delete_asset(&kisumu.admin, &matatu.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let dashboard = engine.dashboard_stats(&kisumu.admin, Utc::now()).await.unwrap();
    assert_eq!(dashboard.total_assets, Money::ZERO);
    assert_eq!(
        engine.list_assets(&nakuru.alice).await.unwrap(),
        vec![matatu]
    );
}
