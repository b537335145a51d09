use clap::{Parser, Subcommand, ValueEnum};

use crate::models::approval::ApprovalForm;

/// approval-gate: approval-gated create/update/delete for managed reference data
#[derive(Parser)]
#[command(name = "approval-gate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to APPROVALS_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Work the review queue of one entity family
    Approval {
        /// Entity family: app-scheme or recommended-questions
        #[arg(short, long, env = "APPROVALS_FAMILY", default_value = "app-scheme")]
        family: String,

        #[command(subcommand)]
        command: ApprovalCommands,
    },
}

#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// List approval requests
    List {
        /// Only show requests the first-pass approval can pick
        #[arg(long)]
        pending: bool,
    },
    /// Show one request
    Show { request_id: String },
    /// Print the entity snapshots embedded in a request
    Detail { request_id: String },
    /// Approve the given requests in one batch
    Process {
        #[arg(required = true, value_delimiter = ',')]
        request_ids: Vec<String>,
        /// Also close the in_review requests in the selection
        #[arg(long)]
        confirm_in_review: bool,
    },
    /// Escalate a first-pass request to in_review
    FinalApproval { request_id: String },
    /// Submit entities for review from a JSON file (one object or an array)
    Submit {
        #[arg(long, value_enum)]
        form: FormArg,
        #[arg(long)]
        file: std::path::PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormArg {
    Registration,
    Modification,
    Deletion,
}

impl From<FormArg> for ApprovalForm {
    fn from(arg: FormArg) -> Self {
        match arg {
            FormArg::Registration => ApprovalForm::DataRegistration,
            FormArg::Modification => ApprovalForm::DataModification,
            FormArg::Deletion => ApprovalForm::DataDeletion,
        }
    }
}
