use std::{error::Error, io::Write};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Engine, NewMember, NewTenant, Role};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "chamasmart_admin")]
#[command(about = "Operator utilities for ChamaSmart (bootstrap chamas, maintenance)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./chamasmart.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Member(Member),
    Chama(Chama),
    Loans(Loans),
    Alerts(Alerts),
}

#[derive(Args, Debug)]
struct Member {
    #[command(subcommand)]
    command: MemberCommand,
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
    /// Creates a member without a chama; the credential is prompted for.
    SignUp(SignUpArgs),
}

#[derive(Args, Debug)]
struct SignUpArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: Option<String>,
}

#[derive(Args, Debug)]
struct Chama {
    #[command(subcommand)]
    command: ChamaCommand,
}

#[derive(Subcommand, Debug)]
enum ChamaCommand {
    /// Registers a chama with the given member as its first admin.
    Register(RegisterArgs),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    founder: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    contact_email: Option<String>,
    #[arg(long)]
    contact_phone: Option<String>,
}

#[derive(Args, Debug)]
struct Loans {
    #[command(subcommand)]
    command: LoansCommand,
}

#[derive(Subcommand, Debug)]
enum LoansCommand {
    /// Moves overdue active loans of every chama to DEFAULTED.
    MarkDefaulted {
        /// Evaluation instant (RFC 3339); defaults to now.
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
}

#[derive(Args, Debug)]
struct Alerts {
    #[command(subcommand)]
    command: AlertsCommand,
}

#[derive(Subcommand, Debug)]
enum AlertsCommand {
    /// Lists pending alerts that arrived without a chama.
    Pending,
    /// Settles an unscoped pending alert as a deposit of the member.
    Assign {
        #[arg(long)]
        alert: String,
        #[arg(long)]
        member: String,
    },
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_secret(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

/// Reads the credential hash issued by the session provider.
fn prompt_credential() -> Result<String, Box<dyn Error + Send + Sync>> {
    for _ in 0..3 {
        let credential = prompt_secret("Credential hash: ")?;
        if !credential.trim().is_empty() {
            return Ok(credential.trim().to_string());
        }
        eprintln!("Credential must not be empty.");
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Member(Member {
            command: MemberCommand::SignUp(args),
        }) => {
            let credential_hash = prompt_credential()?;
            let member = engine
                .sign_up(NewMember {
                    email: args.email,
                    credential_hash,
                    name: args.name,
                    phone: args.phone,
                    role: Role::Member,
                })
                .await?;
            println!("created member: {} ({})", member.name, member.id);
        }
        Command::Chama(Chama {
            command: ChamaCommand::Register(args),
        }) => {
            let tenant = engine
                .register_tenant(
                    &args.founder,
                    NewTenant {
                        name: args.name,
                        contact_email: args.contact_email,
                        contact_phone: args.contact_phone,
                        logo_url: None,
                    },
                )
                .await?;
            println!("registered chama: {} ({})", tenant.name, tenant.id);
        }
        Command::Loans(Loans {
            command: LoansCommand::MarkDefaulted { now },
        }) => {
            let affected = engine
                .mark_overdue_defaulted_all(now.unwrap_or_else(Utc::now))
                .await?;
            println!("defaulted loans: {affected}");
        }
        Command::Alerts(Alerts {
            command: AlertsCommand::Pending,
        }) => {
            let alerts = engine.list_unscoped_pending_alerts().await?;
            if alerts.is_empty() {
                println!("no pending alerts");
            }
            for alert in alerts {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    alert.id,
                    alert.provider.as_str(),
                    alert.external_id,
                    alert.amount,
                    alert.created_at.to_rfc3339()
                );
            }
        }
        Command::Alerts(Alerts {
            command: AlertsCommand::Assign { alert, member },
        }) => {
            let entry = engine.assign_unscoped_alert(&alert, &member).await?;
            println!(
                "recorded deposit {} of {} for member {}",
                entry.id, entry.amount, entry.member_id
            );
        }
    }

    Ok(())
}
