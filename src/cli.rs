use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::model::BreakdownCategory;

#[derive(Parser, Debug)]
#[command(
    name = "qa-leaderboard",
    version,
    about = "Question-answering benchmark submissions, scoring and leaderboard"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Submit(SubmitArgs),
    Leaderboard(LeaderboardArgs),
    Explore(ExploreArgs),
    #[command(subcommand)]
    References(ReferencesCommand),
    Status(StatusArgs),
}

#[derive(Subcommand, Debug)]
pub enum ReferencesCommand {
    Import(ReferenceImportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/qa-leaderboard")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub backend: Option<Backend>,
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub file: PathBuf,

    #[arg(long, default_value = "")]
    pub model: String,

    #[arg(long, default_value = "")]
    pub author: String,

    #[arg(long, value_enum)]
    pub supersede: Option<SupersedePolicy>,
}

#[derive(Args, Debug, Clone)]
pub struct LeaderboardArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExploreArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub submission: Option<String>,

    #[arg(long, value_enum, default_value_t = BreakdownFilter::All)]
    pub category: BreakdownFilter,

    #[arg(long, default_value_t = 0)]
    pub index: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReferenceImportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    File,
    Sqlite,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Sqlite => "sqlite",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupersedePolicy {
    Replace,
    Append,
}

impl SupersedePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Append => "append",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum BreakdownFilter {
    All,
    Hallucinated,
    Empty,
    #[value(name = "faithful_correct")]
    FaithfulCorrect,
    #[value(name = "faithful_incorrect")]
    FaithfulIncorrect,
}

impl BreakdownFilter {
    pub fn category(self) -> Option<BreakdownCategory> {
        match self {
            Self::All => None,
            Self::Hallucinated => Some(BreakdownCategory::Hallucinated),
            Self::Empty => Some(BreakdownCategory::Empty),
            Self::FaithfulCorrect => Some(BreakdownCategory::FaithfulCorrect),
            Self::FaithfulIncorrect => Some(BreakdownCategory::FaithfulIncorrect),
        }
    }

    pub fn as_str(self) -> &'static str {
        self.category().map_or("all", BreakdownCategory::as_str)
    }
}
