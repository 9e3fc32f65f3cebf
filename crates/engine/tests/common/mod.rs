#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use engine::{Engine, EntryKind, Money, NewEntry, NewMember, NewTenant, Role, TenantContext};
use migration::MigratorTrait;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub fn new_member(email: &str, name: &str, phone: Option<&str>, role: Role) -> NewMember {
    NewMember {
        email: email.to_string(),
        credential_hash: "argon2-hash".to_string(),
        name: name.to_string(),
        phone: phone.map(ToString::to_string),
        role,
    }
}

/// A chama with an admin, a treasurer and two plain members.
pub struct Chama {
    pub admin: TenantContext,
    pub treasurer: TenantContext,
    pub alice: TenantContext,
    pub bob: TenantContext,
}

pub async fn register_chama(engine: &Engine, prefix: &str) -> Chama {
    let founder = engine
        .sign_up(new_member(
            &format!("{prefix}-admin@example.com"),
            "Grace Wanjiku",
            None,
            Role::Member,
        ))
        .await
        .unwrap();
    engine
        .register_tenant(
            &founder.id,
            NewTenant {
                name: format!("{prefix} Investment Group"),
                contact_email: None,
                contact_phone: None,
                logo_url: None,
            },
        )
        .await
        .unwrap();
    let admin = engine.resolve_context(&founder.id).await.unwrap();

    let treasurer = invite(
        engine,
        &admin,
        &format!("{prefix}-treasurer@example.com"),
        "Peter Otieno",
        Role::Treasurer,
    )
    .await;
    let alice = invite(
        engine,
        &admin,
        &format!("{prefix}-alice@example.com"),
        "Alice Njeri",
        Role::Member,
    )
    .await;
    let bob = invite(
        engine,
        &admin,
        &format!("{prefix}-bob@example.com"),
        "Bob Kamau",
        Role::Member,
    )
    .await;

    Chama {
        admin,
        treasurer,
        alice,
        bob,
    }
}

pub async fn invite(
    engine: &Engine,
    by: &TenantContext,
    email: &str,
    name: &str,
    role: Role,
) -> TenantContext {
    let member = engine
        .invite_member(by, new_member(email, name, None, role))
        .await
        .unwrap();
    engine.resolve_context(&member.id).await.unwrap()
}

pub async fn deposit(engine: &Engine, ctx: &TenantContext, member_id: &str, shillings: i64) {
    engine
        .record_entry(
            ctx,
            NewEntry {
                member_id: member_id.to_string(),
                kind: EntryKind::Deposit,
                amount: Money::from_major(shillings),
                description: Some("Monthly contribution".to_string()),
                reference_code: None,
            },
        )
        .await
        .unwrap();
}
