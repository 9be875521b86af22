use std::{collections::HashMap, fs::File, io};

use chrono::{NaiveTime, Utc};
use engine::{
    BudgetDraft, BudgetPatch, Category, CategoryDraft, CategoryPatch, Money, Replica,
    TransactionDraft, TransactionFilter, TransactionKind, TransactionPatch, Wallet, WalletDraft,
    WalletPatch, aggregates::signed,
};
use uuid::Uuid;

use super::Context;
use crate::{
    cli::{
        BudgetCommand, CategoryCommand, ExportArgs, TxAddArgs, TxCommand, TxEditArgs,
        TxFilterArgs, WalletCommand,
    },
    error::{AppError, Result},
    export,
};

/// Day-only dates land at local noon, away from either midnight.
fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}

async fn resolve_wallet(replica: &Replica, reference: &str) -> Result<Wallet> {
    if let Ok(id) = reference.parse::<Uuid>() {
        return replica
            .wallet(id)
            .await?
            .ok_or_else(|| AppError::Input(format!("no wallet with id {id}")));
    }
    replica
        .wallets()
        .await?
        .into_iter()
        .find(|wallet| wallet.name.eq_ignore_ascii_case(reference.trim()))
        .ok_or_else(|| AppError::Input(format!("no wallet named {reference}")))
}

/// Matches by id, then by name. Among same-named categories the one of
/// `kind` wins.
async fn resolve_category(
    replica: &Replica,
    reference: &str,
    kind: Option<TransactionKind>,
) -> Result<Category> {
    if let Ok(id) = reference.parse::<Uuid>() {
        return replica
            .category(id)
            .await?
            .ok_or_else(|| AppError::Input(format!("no category with id {id}")));
    }
    let mut named: Vec<Category> = replica
        .categories()
        .await?
        .into_iter()
        .filter(|category| category.name.eq_ignore_ascii_case(reference.trim()))
        .collect();
    if let Some(kind) = kind {
        named.sort_by_key(|category| category.kind != kind);
    }
    named
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Input(format!("no category named {reference}")))
}

async fn filter(ctx: &Context, replica: &Replica, args: &TxFilterArgs) -> Result<TransactionFilter> {
    let from = match &args.from {
        Some(raw) => Some(ctx.at(ctx.day(raw)?, NaiveTime::MIN)?),
        None => None,
    };
    let to = match &args.to {
        Some(raw) => {
            let day = ctx.day(raw)?;
            let next = day
                .succ_opt()
                .ok_or_else(|| AppError::Input(format!("{raw} is out of range")))?;
            Some(ctx.at(next, NaiveTime::MIN)? - chrono::Duration::nanoseconds(1))
        }
        None => None,
    };
    let wallet_id = match &args.wallet {
        Some(reference) => Some(resolve_wallet(replica, reference).await?.id),
        None => None,
    };
    let kind = args.kind.map(TransactionKind::from);
    let category_id = match &args.category {
        Some(reference) => Some(resolve_category(replica, reference, kind).await?.id),
        None => None,
    };

    Ok(TransactionFilter {
        from,
        to,
        wallet_id,
        category_id,
        kind,
    })
}

fn names<T>(items: &[T], key: impl Fn(&T) -> (Uuid, String)) -> HashMap<Uuid, String> {
    items.iter().map(key).collect()
}

pub async fn transactions(ctx: &Context, command: TxCommand) -> Result<()> {
    match command {
        TxCommand::Add(args) => add_transaction(ctx, args).await,
        TxCommand::List(args) => list_transactions(ctx, args).await,
        TxCommand::Edit(args) => edit_transaction(ctx, args).await,
        TxCommand::Rm { id } => {
            let tx = ctx.ledger.delete_transaction(id).await?;
            println!("deleted {} {} of {}", tx.kind.as_str(), tx.amount, ctx.local_day(tx.date));
            ctx.flush().await
        }
    }
}

async fn add_transaction(ctx: &Context, args: TxAddArgs) -> Result<()> {
    let replica = ctx.replica();
    let kind = TransactionKind::from(args.kind);
    let category = resolve_category(&replica, &args.category, Some(kind)).await?;
    let wallet = match &args.wallet {
        Some(reference) => resolve_wallet(&replica, reference).await?,
        None => replica.wallets().await?.into_iter().next().ok_or_else(|| {
            AppError::Input("no wallet yet, add one with `duit wallet add`".to_string())
        })?,
    };
    let date = match &args.date {
        Some(raw) => ctx.at(ctx.day(raw)?, noon())?,
        None => Utc::now(),
    };

    let mut draft = TransactionDraft::new(kind, args.amount, category.id, wallet.id, date);
    if let Some(note) = args.note {
        draft = draft.note(note);
    }
    let tx = ctx.ledger.create_transaction(draft).await?;
    println!(
        "{} {} on {} ({}), {}",
        tx.kind.as_str().to_lowercase(),
        tx.amount,
        wallet.name,
        category.name,
        tx.id
    );
    ctx.flush().await
}

async fn list_transactions(ctx: &Context, args: TxFilterArgs) -> Result<()> {
    let replica = ctx.replica();
    let filter = filter(ctx, &replica, &args).await?;
    let mut txs = replica.transactions(&filter).await?;
    if let Some(limit) = args.limit {
        txs.truncate(limit);
    }
    let wallets = names(&replica.wallets().await?, |w| (w.id, w.name.clone()));
    let categories = names(&replica.categories().await?, |c| (c.id, c.name.clone()));

    for tx in &txs {
        println!(
            "{}  {:>12}  {:<16} {:<12} {}  {}",
            ctx.local_day(tx.date),
            signed(tx.amount, tx.kind).to_string(),
            categories.get(&tx.category_id).map_or("?", String::as_str),
            wallets.get(&tx.wallet_id).map_or("?", String::as_str),
            tx.id,
            tx.note.as_deref().unwrap_or_default(),
        );
    }
    let total: Money = txs.iter().map(|tx| signed(tx.amount, tx.kind)).sum();
    println!("{} transactions, net {total}", txs.len());
    Ok(())
}

async fn edit_transaction(ctx: &Context, args: TxEditArgs) -> Result<()> {
    let replica = ctx.replica();
    let mut patch = TransactionPatch::default();
    if let Some(amount) = args.amount {
        patch = patch.amount(amount);
    }
    let kind = args.kind.map(TransactionKind::from);
    if let Some(kind) = kind {
        patch = patch.kind(kind);
    }
    if let Some(reference) = &args.category {
        patch = patch.category_id(resolve_category(&replica, reference, kind).await?.id);
    }
    if let Some(reference) = &args.wallet {
        patch = patch.wallet_id(resolve_wallet(&replica, reference).await?.id);
    }
    if let Some(raw) = &args.date {
        patch = patch.date(ctx.at(ctx.day(raw)?, noon())?);
    }
    if args.clear_note {
        patch = patch.note(None);
    } else if let Some(note) = args.note {
        patch = patch.note(Some(note));
    }

    let tx = ctx.ledger.update_transaction(args.id, patch).await?;
    println!(
        "updated {}: {} {} on {}",
        tx.id,
        tx.kind.as_str().to_lowercase(),
        tx.amount,
        ctx.local_day(tx.date)
    );
    ctx.flush().await
}

pub async fn wallets(ctx: &Context, command: WalletCommand) -> Result<()> {
    let replica = ctx.replica();
    match command {
        WalletCommand::List => {
            let wallets = replica.wallets().await?;
            for wallet in &wallets {
                println!(
                    "{:<16} {:<9} {:>12}  {}",
                    wallet.name,
                    wallet.wallet_type.as_str(),
                    wallet.balance.to_string(),
                    wallet.id
                );
            }
            let total: Money = wallets.iter().map(|wallet| wallet.balance).sum();
            println!("total {total}");
            return Ok(());
        }
        WalletCommand::Add {
            name,
            wallet_type,
            opening,
        } => {
            let mut draft = WalletDraft::new(name, wallet_type.into());
            if let Some(opening) = opening {
                draft = draft.opening_balance(opening);
            }
            let wallet = ctx.ledger.create_wallet(draft).await?;
            println!("added {} ({}), balance {}", wallet.name, wallet.id, wallet.balance);
        }
        WalletCommand::Edit {
            wallet,
            name,
            wallet_type,
        } => {
            let id = resolve_wallet(&replica, &wallet).await?.id;
            let patch = WalletPatch {
                name,
                wallet_type: wallet_type.map(Into::into),
                ..WalletPatch::default()
            };
            let wallet = ctx.ledger.update_wallet(id, patch).await?;
            println!("updated {} ({})", wallet.name, wallet.id);
        }
        WalletCommand::Correct {
            wallet,
            balance,
            note,
        } => {
            let id = resolve_wallet(&replica, &wallet).await?.id;
            let (wallet, correction) = ctx.ledger.correct_wallet_balance(id, balance, note).await?;
            let sign = if correction.delta > Money::ZERO { "+" } else { "" };
            println!(
                "{}: {} -> {} ({sign}{})",
                wallet.name, correction.previous, correction.new, correction.delta
            );
        }
        WalletCommand::Corrections { wallet } => {
            let wallet = resolve_wallet(&replica, &wallet).await?;
            for correction in replica.balance_corrections(wallet.id).await? {
                println!(
                    "{}  {:>12} -> {:>12}  {}",
                    ctx.local_day(correction.created_at),
                    correction.previous.to_string(),
                    correction.new.to_string(),
                    correction.note.as_deref().unwrap_or_default()
                );
            }
            return Ok(());
        }
        WalletCommand::Reorder { wallets } => {
            let mut ids = Vec::with_capacity(wallets.len());
            for reference in &wallets {
                ids.push(resolve_wallet(&replica, reference).await?.id);
            }
            let changed = ctx.ledger.reorder_wallets(&ids).await?;
            println!("{} wallets moved", changed.len());
        }
        WalletCommand::Recompute => {
            let changed = ctx.ledger.recompute_balances().await?;
            for wallet in &changed {
                println!("{}: balance now {}", wallet.name, wallet.balance);
            }
            if changed.is_empty() {
                println!("all balances match their history");
            }
        }
        WalletCommand::Rm { wallet } => {
            let id = resolve_wallet(&replica, &wallet).await?.id;
            let wallet = ctx.ledger.delete_wallet(id).await?;
            println!("deleted {}", wallet.name);
        }
    }
    ctx.flush().await
}

pub async fn categories(ctx: &Context, command: CategoryCommand) -> Result<()> {
    let replica = ctx.replica();
    match command {
        CategoryCommand::List => {
            for category in replica.categories().await? {
                println!(
                    "{:<8} {:<20} {:<12} {}",
                    category.kind.as_str().to_lowercase(),
                    category.name,
                    category.icon,
                    category.id
                );
            }
            return Ok(());
        }
        CategoryCommand::Add { name, kind, icon } => {
            let category = ctx
                .ledger
                .create_category(CategoryDraft::new(name, kind.into(), icon))
                .await?;
            println!("added {} ({})", category.name, category.id);
        }
        CategoryCommand::Edit {
            category,
            name,
            icon,
        } => {
            let id = resolve_category(&replica, &category, None).await?.id;
            let patch = CategoryPatch {
                name,
                icon,
                ..CategoryPatch::default()
            };
            let category = ctx.ledger.update_category(id, patch).await?;
            println!("updated {} ({})", category.name, category.id);
        }
        CategoryCommand::Rm { category } => {
            let id = resolve_category(&replica, &category, None).await?.id;
            let category = ctx.ledger.delete_category(id).await?;
            println!("deleted {}", category.name);
        }
    }
    ctx.flush().await
}

pub async fn budgets(ctx: &Context, command: BudgetCommand) -> Result<()> {
    let replica = ctx.replica();
    match command {
        BudgetCommand::List => {
            for view in replica.budgets().await? {
                println!(
                    "{:<20} {:>12} spent {:>12} left {:>12}  {}",
                    view.category_name.as_deref().unwrap_or("(deleted)"),
                    view.budget.amount.to_string(),
                    view.spent.to_string(),
                    view.remaining().to_string(),
                    view.budget.id
                );
            }
            return Ok(());
        }
        BudgetCommand::Add { category, amount } => {
            let category =
                resolve_category(&replica, &category, Some(TransactionKind::Expense)).await?;
            let budget = ctx
                .ledger
                .create_budget(BudgetDraft::monthly(category.id, amount))
                .await?;
            println!("budget of {} for {} ({})", budget.amount, category.name, budget.id);
        }
        BudgetCommand::Edit { id, amount } => {
            let budget = ctx
                .ledger
                .update_budget(id, BudgetPatch::default().amount(amount))
                .await?;
            println!("budget {} is now {}", budget.id, budget.amount);
        }
        BudgetCommand::Rm { id } => {
            ctx.ledger.delete_budget(id).await?;
            println!("deleted budget {id}");
        }
    }
    ctx.flush().await
}

pub async fn summary(ctx: &Context) -> Result<()> {
    let replica = ctx.replica();
    let summary = replica.summary().await?;
    let categories = names(&replica.categories().await?, |c| (c.id, c.name.clone()));

    println!(
        "{} to {}",
        ctx.local_day(summary.window.0),
        ctx.local_day(summary.window.1)
    );
    println!("balance  {:>12}", summary.total_balance.to_string());
    println!("income   {:>12}", summary.income.to_string());
    println!("expense  {:>12}", summary.expense.to_string());
    if !summary.expenses_by_category.is_empty() {
        println!();
        for total in &summary.expenses_by_category {
            println!(
                "  {:<20} {:>12}",
                total.category_name.as_deref().unwrap_or("(deleted)"),
                total.total.to_string()
            );
        }
    }
    if !summary.recent.is_empty() {
        println!();
        for tx in &summary.recent {
            println!(
                "  {}  {:>12}  {}",
                ctx.local_day(tx.date),
                signed(tx.amount, tx.kind).to_string(),
                categories.get(&tx.category_id).map_or("?", String::as_str)
            );
        }
    }
    Ok(())
}

pub async fn export(ctx: &Context, args: ExportArgs) -> Result<()> {
    let replica = ctx.replica();
    let filter = filter(ctx, &replica, &args.filter).await?;
    let mut txs = replica.transactions(&filter).await?;
    if let Some(limit) = args.filter.limit {
        txs.truncate(limit);
    }
    let wallets = names(&replica.wallets().await?, |w| (w.id, w.name.clone()));
    let categories = names(&replica.categories().await?, |c| (c.id, c.name.clone()));
    let rows = export::rows(&txs, &wallets, &categories, &ctx.timezone);

    let written = match &args.output {
        Some(path) => export::write_csv(File::create(path)?, &rows)?,
        None => export::write_csv(io::stdout().lock(), &rows)?,
    };
    if let Some(path) = &args.output {
        println!("wrote {written} transactions to {}", path.display());
    }
    Ok(())
}
