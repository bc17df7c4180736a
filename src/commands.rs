use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};

use crate::config::{self, AzureConfig};
use crate::extractor::{self, ExtractionRequest};
use crate::reconcile::try_extract_payload;
use crate::report::save_report;
use crate::session::Session;
use crate::types::{ImageRole, ReconciliationReport, Verdict};
use crate::verdict;
use crate::vision::AzureChatClient;

/// Process exit codes for `check` and `verdict`.
pub const EXIT_APPROVED: u8 = 0;
pub const EXIT_REJECTED: u8 = 2;
pub const EXIT_UNDETERMINED: u8 = 3;

const SECTION_WIDTH: usize = 80;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show whether model credentials are configured
    Status,
    /// Describe a single image
    Extract(ExtractArgs),
    /// Run the full package / invoice cross-check
    Check(CheckArgs),
    /// Resolve the verdict of a saved model reply, offline
    Verdict(VerdictArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum RoleArg {
    Package,
    Invoice,
}

impl From<RoleArg> for ImageRole {
    fn from(r: RoleArg) -> Self {
        match r {
            RoleArg::Package => ImageRole::Package,
            RoleArg::Invoice => ImageRole::Invoice,
        }
    }
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Which prompt to use
    #[arg(short, long, value_enum)]
    pub role: RoleArg,
    /// Image file (PNG, JPEG, GIF, BMP or WebP)
    pub image: PathBuf,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Photo of the package / box
    #[arg(short, long)]
    pub package: PathBuf,
    /// Photo of the invoice (nota fiscal)
    #[arg(short, long)]
    pub invoice: PathBuf,
    /// Save the reconciliation report to this text file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerdictArgs {
    /// Text file holding a full reconciliation reply
    pub reply: PathBuf,
}

pub fn exit_code(verdict: &Verdict) -> u8 {
    match verdict {
        Verdict::Approved => EXIT_APPROVED,
        Verdict::Rejected(_) => EXIT_REJECTED,
        Verdict::Undetermined(_) => EXIT_UNDETERMINED,
    }
}

fn print_section(title: &str, body: &str) {
    let rule = "=".repeat(SECTION_WIDTH);
    println!("{}\n{}\n{}\n{}\n", rule, title, rule, body.trim_end());
}

fn client() -> Result<AzureChatClient> {
    let config = AzureConfig::from_env().context("Model credentials not found")?;
    tracing::debug!(endpoint = %config.endpoint, deployment = %config.deployment, "Using model service");
    Ok(AzureChatClient::new(&config)?)
}

pub fn status() -> Result<u8> {
    println!("{}", config::config_status());
    if let Some(path) = config::user_env_path() {
        println!("user .env: {}", path.display());
    }
    Ok(0)
}

pub fn extract(args: &ExtractArgs) -> Result<u8> {
    let role = ImageRole::from(args.role);
    let request = ExtractionRequest::from_path(&args.image, role)?;
    let model = client()?;
    let result = extractor::extract(&model, &request)
        .with_context(|| format!("Could not analyze the {} image", role))?;
    println!("{}", result.raw_text);
    Ok(0)
}

pub fn check(args: &CheckArgs) -> Result<u8> {
    // Validate both files before spending a model call.
    let package = ExtractionRequest::from_path(&args.package, ImageRole::Package)?;
    let invoice = ExtractionRequest::from_path(&args.invoice, ImageRole::Invoice)?;

    let mut session = Session::new(client()?);

    let text = &session.analyze_package(package)?.raw_text;
    print_section("PACKAGE INFORMATION:", text);

    let text = &session.analyze_invoice(invoice)?.raw_text;
    print_section("INVOICE INFORMATION:", text);

    let report = match session.reconcile() {
        Ok(report) => report.clone(),
        Err(e) => anyhow::bail!(e.user_message()),
    };
    print_section("CROSS-CHECK ANALYSIS - PACKAGE vs INVOICE", &report.raw_text);

    let verdict = verdict::resolve(&report);
    println!("Verdict: {}", verdict);

    if let Some(path) = &args.output {
        save_report(path, &report, &verdict)?;
        println!("Report saved to {}", path.display());
    }
    Ok(exit_code(&verdict))
}

/// Re-run payload extraction and the approval rule over a saved reply.
pub fn saved_verdict(args: &VerdictArgs) -> Result<u8> {
    let verdict = verdict_for_file(&args.reply)?;
    println!("{}", verdict);
    Ok(exit_code(&verdict))
}

fn verdict_for_file(path: &Path) -> Result<Verdict> {
    let raw_text =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let report = ReconciliationReport {
        parsed_payload: try_extract_payload(&raw_text),
        raw_text,
    };
    Ok(verdict::resolve(&report))
}

pub fn run_command(command: &Command) -> Result<u8> {
    match command {
        Command::Status => status(),
        Command::Extract(args) => extract(args),
        Command::Check(args) => check(args),
        Command::Verdict(args) => saved_verdict(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_per_verdict() {
        assert_eq!(exit_code(&Verdict::Approved), 0);
        assert_eq!(exit_code(&Verdict::Rejected(vec!["products diverge".into()])), 2);
        assert_eq!(exit_code(&Verdict::Undetermined("x".into())), 3);
    }

    #[test]
    fn verdict_from_saved_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.txt");
        std::fs::write(
            &path,
            "Conclusão: Reprovado\n```json\n{\"score\": 50, \"produtos_match\": true, \"nota_match\": false}\n```\n",
        )
        .unwrap();

        assert_eq!(
            verdict_for_file(&path).unwrap(),
            Verdict::Rejected(vec!["low score (50%)".into(), "invoice diverges".into()])
        );
    }

    #[test]
    fn verdict_from_reply_without_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.txt");
        std::fs::write(&path, "Análise manual necessária").unwrap();
        assert!(matches!(verdict_for_file(&path).unwrap(), Verdict::Undetermined(_)));
    }

    #[test]
    fn verdict_for_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(verdict_for_file(&dir.path().join("missing.txt")).is_err());
    }
}
