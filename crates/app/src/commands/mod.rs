//! Command handlers. Each run opens the local store, acts for the session's
//! identity and, when online, awaits the push its writes queued.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use client::Client;
use engine::{
    Identity, Ledger, LocalStore, Presence, PullOutcome, PushOutcome, Replica, SyncCoordinator,
    SyncDriver, SyncEvent, SyncOutcome,
};
use tokio::sync::{broadcast, mpsc};

use crate::{
    cli::Command,
    error::{AppError, Result},
    session::Session,
    settings::Settings,
};

mod records;

pub struct Context {
    settings: Settings,
    timezone: Tz,
    session: Session,
    coordinator: SyncCoordinator<Client>,
    ledger: Ledger<Client>,
}

impl Context {
    pub async fn open(settings: Settings) -> Result<Self> {
        let timezone = settings.timezone()?;
        let session = Session::load(&settings.session)?;

        let store = LocalStore::builder()
            .path(&settings.database)
            .timezone(timezone)
            .build()
            .await?;
        if !store.is_durable() {
            tracing::warn!(
                "{} is not usable, changes will be lost on exit",
                settings.database
            );
        }

        let mut remote = Client::new(&settings.base_url)?;
        if let Some(token) = &settings.token {
            remote = remote.token(token.clone());
        }
        let presence = Presence::new(Some(session.identity()), !settings.offline);
        let coordinator = SyncCoordinator::builder(store, remote, presence)
            .config(settings.sync_config())
            .build();
        let ledger = Ledger::new(coordinator.clone());

        Ok(Self {
            settings,
            timezone,
            session,
            coordinator,
            ledger,
        })
    }

    fn identity(&self) -> Identity {
        self.coordinator.current_identity()
    }

    fn replica(&self) -> Replica {
        self.ledger.replica()
    }

    fn is_online(&self) -> bool {
        self.coordinator.presence().is_online()
    }

    async fn switch_to(&mut self, identity: Identity) -> Result<()> {
        self.session.identity = Some(identity.clone());
        self.session.save(&self.settings.session)?;
        self.coordinator
            .presence()
            .set_identity(Some(identity.clone()));
        if self.coordinator.store().initialize(&identity).await? {
            tracing::info!("initialized local data for {identity}");
        }
        Ok(())
    }

    /// Pushes what the last write queued, if anything can be pushed.
    async fn flush(&self) -> Result<()> {
        let identity = self.identity();
        if !identity.is_authenticated() {
            return Ok(());
        }
        if !self.is_online() {
            println!("offline: change queued for the next sync");
            return Ok(());
        }
        let mut events = self.coordinator.events();
        let outcome = self.coordinator.push(&identity).await?;
        report_events(&mut events);
        if let PushOutcome::Stalled { .. } = outcome {
            println!("remote unreachable: change queued for the next sync");
        }
        Ok(())
    }

    fn day(&self, raw: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|err| AppError::Input(format!("invalid date {raw}: {err}")))
    }

    /// `time` of `day` on the configured timezone's wall clock.
    fn at(&self, day: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&day.and_time(time))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| AppError::Input(format!("{day} {time} does not exist here")))
    }

    fn local_day(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format("%Y-%m-%d")
            .to_string()
    }
}

pub async fn run(command: Command, settings: Settings) -> Result<()> {
    let mut ctx = Context::open(settings).await?;
    let identity = ctx.identity();
    if ctx.coordinator.store().initialize(&identity).await? {
        tracing::info!("initialized local data for {identity}");
    }

    match command {
        Command::Login { user_id } => login(&mut ctx, user_id).await,
        Command::Logout { wipe } => logout(&mut ctx, wipe).await,
        Command::Guest => {
            ctx.switch_to(Identity::Guest).await?;
            println!("acting as guest");
            Ok(())
        }
        Command::Whoami => whoami(&ctx).await,
        Command::Tx(command) => records::transactions(&ctx, command).await,
        Command::Wallet(command) => records::wallets(&ctx, command).await,
        Command::Category(command) => records::categories(&ctx, command).await,
        Command::Budget(command) => records::budgets(&ctx, command).await,
        Command::Summary => records::summary(&ctx).await,
        Command::Export(args) => records::export(&ctx, args).await,
        Command::Sync => sync(&ctx).await,
        Command::Push => push(&ctx).await,
        Command::Pull => pull(&ctx).await,
        Command::Queue => queue(&ctx).await,
        Command::Watch => watch(&ctx).await,
    }
}

async fn login(ctx: &mut Context, user_id: String) -> Result<()> {
    let user_id = user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(AppError::Input("user id must not be empty".to_string()));
    }
    let identity = Identity::user(user_id);
    ctx.switch_to(identity.clone()).await?;
    println!("acting as {identity}");

    if ctx.is_online() {
        sync(ctx).await?;
    }
    Ok(())
}

async fn logout(ctx: &mut Context, wipe: bool) -> Result<()> {
    let identity = ctx.identity();
    if wipe {
        ctx.ledger.wipe(&identity).await?;
        println!("deleted local data of {identity}");
    } else if let Some(owner) = identity.user_id() {
        let pending = ctx.coordinator.queue().pending_for(owner).await?;
        if !pending.is_empty() {
            println!(
                "{} unsynced writes stay queued until {identity} logs in again",
                pending.len()
            );
        }
    }
    ctx.switch_to(Identity::Guest).await?;
    println!("acting as guest");
    Ok(())
}

async fn whoami(ctx: &Context) -> Result<()> {
    let identity = ctx.identity();
    let connectivity = if ctx.is_online() { "online" } else { "offline" };
    let storage = if ctx.coordinator.store().is_durable() {
        ctx.settings.database.as_str()
    } else {
        "memory (not persisted)"
    };
    println!("identity: {identity}");
    println!("network:  {connectivity}");
    println!("storage:  {storage}");
    if let Some(owner) = identity.user_id() {
        let pending = ctx.coordinator.queue().pending_for(owner).await?;
        println!("queued:   {}", pending.len());
    }
    Ok(())
}

fn require_online(ctx: &Context) -> Result<()> {
    if ctx.is_online() {
        Ok(())
    } else {
        Err(AppError::Input(
            "this command needs the network, drop --offline".to_string(),
        ))
    }
}

async fn sync(ctx: &Context) -> Result<()> {
    require_online(ctx)?;
    let mut events = ctx.coordinator.events();
    let outcome = ctx.coordinator.sync(&ctx.identity()).await?;
    report_events(&mut events);
    match outcome {
        SyncOutcome::Busy => println!("a sync is already running"),
        SyncOutcome::Offline => println!("offline, nothing synced"),
        SyncOutcome::Completed { push, pull } => {
            println!("push: {}", describe_push(push));
            println!("pull: {}", describe_pull(pull));
        }
    }
    Ok(())
}

async fn push(ctx: &Context) -> Result<()> {
    require_online(ctx)?;
    let mut events = ctx.coordinator.events();
    let outcome = ctx.coordinator.push(&ctx.identity()).await?;
    report_events(&mut events);
    println!("push: {}", describe_push(outcome));
    Ok(())
}

async fn pull(ctx: &Context) -> Result<()> {
    require_online(ctx)?;
    let mut events = ctx.coordinator.events();
    let outcome = ctx.coordinator.pull(&ctx.identity()).await?;
    report_events(&mut events);
    println!("pull: {}", describe_pull(outcome));
    Ok(())
}

async fn queue(ctx: &Context) -> Result<()> {
    let records = ctx.coordinator.queue().all().await?;
    if records.is_empty() {
        println!("queue is empty");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {:<20} {}  owner={} retries={}",
            record.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
            record.mutation.label(),
            record.mutation.entity_id(),
            record.owner,
            record.retry_count
        );
    }
    Ok(())
}

async fn watch(ctx: &Context) -> Result<()> {
    require_online(ctx)?;
    let driver = SyncDriver::new(ctx.coordinator.clone());
    let (signals, remote_changes) = mpsc::unbounded_channel();

    let every = Duration::from_secs(ctx.settings.poll_secs.max(1));
    let poller = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if signals.send(()).is_err() {
                break;
            }
        }
    });

    let mut events = ctx.coordinator.events();
    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("missed {missed} sync events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    let _refreshed = ctx
        .coordinator
        .notifier()
        .subscribe(|identity| tracing::info!("local data of {identity} refreshed"));

    println!("watching for changes every {}s, ctrl-c to stop", every.as_secs());
    tokio::select! {
        () = driver.run(remote_changes) => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            println!("stopping");
        }
    }
    poller.abort();
    reporter.abort();
    Ok(())
}

fn report_events(events: &mut broadcast::Receiver<SyncEvent>) {
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::MutationRejected { label, id, reason } => {
            eprintln!("remote rejected {label} {id}: {reason} (dropped)");
        }
        SyncEvent::PushStalled {
            label,
            retry_count,
            reason,
            ..
        } => eprintln!("remote unreachable on {label} (attempt {retry_count}): {reason}"),
        SyncEvent::PullFailed { reason, .. } => eprintln!("pull failed: {reason}"),
        SyncEvent::SeedFailed { reason, .. } => eprintln!("remote defaults not created: {reason}"),
        SyncEvent::PullDiscarded { namespace } => {
            eprintln!("identity changed, snapshot of {namespace} discarded");
        }
    }
}

fn describe_push(outcome: PushOutcome) -> String {
    match outcome {
        PushOutcome::Skipped => "nothing to push as guest".to_string(),
        PushOutcome::Busy => "queue busy with another push or pull".to_string(),
        PushOutcome::Drained { sent, rejected } => {
            format!("{sent} sent, {rejected} rejected, queue drained")
        }
        PushOutcome::Stalled { sent, rejected } => {
            format!("{sent} sent, {rejected} rejected, stopped on an unreachable remote")
        }
        PushOutcome::Interrupted { sent, rejected } => {
            format!("{sent} sent, {rejected} rejected, identity changed")
        }
    }
}

fn describe_pull(outcome: PullOutcome) -> String {
    match outcome {
        PullOutcome::Skipped => "guests have nothing to pull".to_string(),
        PullOutcome::Adopted {
            transactions,
            wallets,
            categories,
            budgets,
            replayed,
        } => format!(
            "{transactions} transactions, {wallets} wallets, {categories} categories, \
             {budgets} budgets ({replayed} queued writes reapplied)"
        ),
        PullOutcome::Discarded => "discarded, identity changed".to_string(),
        PullOutcome::Failed => "failed, local data kept".to_string(),
    }
}
