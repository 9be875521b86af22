use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{Money, TransactionKind, WalletType};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "duit", version, about = "Offline-first personal finance ledger")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Override the SQLite database path.
    #[arg(long, global = true)]
    pub database: Option<String>,
    /// Override the remote base URL (e.g. http://127.0.0.1:3000).
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Override the timezone (IANA name) used for monthly windows.
    #[arg(long, global = true)]
    pub timezone: Option<String>,
    /// Override the log level.
    #[arg(long, global = true)]
    pub level: Option<String>,
    /// Work without touching the network.
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Act as an authenticated remote user.
    Login { user_id: String },
    /// Go back to guest mode.
    Logout {
        /// Also delete the local data and unsynced writes of the user.
        #[arg(long)]
        wipe: bool,
    },
    /// Act as a guest: data stays on this device.
    Guest,
    Whoami,
    #[command(subcommand)]
    Tx(TxCommand),
    #[command(subcommand)]
    Wallet(WalletCommand),
    #[command(subcommand)]
    Category(CategoryCommand),
    #[command(subcommand)]
    Budget(BudgetCommand),
    /// Balances, this month's totals and the latest transactions.
    Summary,
    /// Write transactions as CSV.
    Export(ExportArgs),
    /// Push queued writes, then pull a fresh snapshot.
    Sync,
    Push,
    Pull,
    /// Show queued writes waiting for the remote.
    Queue,
    /// Keep syncing until interrupted.
    Watch,
}

#[derive(Debug, Subcommand)]
pub enum TxCommand {
    Add(TxAddArgs),
    List(TxFilterArgs),
    Edit(TxEditArgs),
    Rm { id: Uuid },
}

#[derive(Debug, Args)]
pub struct TxAddArgs {
    #[arg(value_parser = parse_money)]
    pub amount: Money,
    #[arg(long, value_enum, default_value_t = KindArg::Expense)]
    pub kind: KindArg,
    /// Category id or name.
    #[arg(long)]
    pub category: String,
    /// Wallet id or name; defaults to the first wallet.
    #[arg(long)]
    pub wallet: Option<String>,
    /// Day of the transaction (YYYY-MM-DD); defaults to now.
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Args)]
pub struct TxFilterArgs {
    /// First day included (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<String>,
    /// Last day included (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long)]
    pub wallet: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct TxEditArgs {
    pub id: Uuid,
    #[arg(long, value_parser = parse_money)]
    pub amount: Option<Money>,
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub wallet: Option<String>,
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long, conflicts_with = "clear_note")]
    pub note: Option<String>,
    #[arg(long)]
    pub clear_note: bool,
}

#[derive(Debug, Subcommand)]
pub enum WalletCommand {
    List,
    Add {
        name: String,
        #[arg(long = "type", value_enum, default_value_t = WalletTypeArg::Cash)]
        wallet_type: WalletTypeArg,
        /// Starting balance, recorded as a correction.
        #[arg(long, value_parser = parse_money)]
        opening: Option<Money>,
    },
    Edit {
        wallet: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type", value_enum)]
        wallet_type: Option<WalletTypeArg>,
    },
    /// Set the balance to what the real account shows.
    Correct {
        wallet: String,
        #[arg(value_parser = parse_money, allow_hyphen_values = true)]
        balance: Money,
        #[arg(long)]
        note: Option<String>,
    },
    /// Recorded corrections of a wallet.
    Corrections { wallet: String },
    /// Put the given wallets first, in this order.
    Reorder {
        #[arg(required = true)]
        wallets: Vec<String>,
    },
    /// Rebuild balances from transactions and corrections.
    Recompute,
    Rm { wallet: String },
}

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    List,
    Add {
        name: String,
        #[arg(long, value_enum, default_value_t = KindArg::Expense)]
        kind: KindArg,
        #[arg(long, default_value = "tag")]
        icon: String,
    },
    Edit {
        category: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    Rm { category: String },
}

#[derive(Debug, Subcommand)]
pub enum BudgetCommand {
    List,
    Add {
        category: String,
        #[arg(value_parser = parse_money)]
        amount: Money,
    },
    Edit {
        id: Uuid,
        #[arg(value_parser = parse_money)]
        amount: Money,
    },
    Rm { id: Uuid },
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Destination file; stdout when omitted.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub filter: TxFilterArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Income,
    Expense,
}

impl From<KindArg> for TransactionKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Income => TransactionKind::Income,
            KindArg::Expense => TransactionKind::Expense,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum WalletTypeArg {
    Cash,
    Bank,
    #[value(name = "ewallet")]
    EWallet,
}

impl From<WalletTypeArg> for WalletType {
    fn from(value: WalletTypeArg) -> Self {
        match value {
            WalletTypeArg::Cash => WalletType::Cash,
            WalletTypeArg::Bank => WalletType::Bank,
            WalletTypeArg::EWallet => WalletType::EWallet,
        }
    }
}

fn parse_money(raw: &str) -> Result<Money, String> {
    raw.parse::<Money>().map_err(|err| err.to_string())
}
