use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::{json, Value};
use tandem_crypto::ContentHasher;
use tandem_store::StoreConfig;
use tandem_types::Digest;
use tandem_vcs::{Commit, Repo, RepoRecord, HEAD};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let json = matches!(cli.format, OutputFormat::Json);
    match cli.command {
        Command::Digest(args) => cmd_digest(args, json),
        Command::Init(args) => cmd_init(args, &config, json),
        Command::Commit(args) => cmd_commit(args, &config, json),
        Command::Log(args) => cmd_log(args, json),
        Command::Branch(args) => cmd_branch(args, json),
        Command::Verify(args) => cmd_verify(args, json),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(StoreConfig::from_toml_str(&text)?)
        }
        None => Ok(StoreConfig::default()),
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub(crate) fn load_repo(path: &Path) -> anyhow::Result<Repo> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let record = RepoRecord::from_json(&text).with_context(|| format!("parsing {}", path.display()))?;
    Repo::from_record(record).with_context(|| format!("loading {}", path.display()))
}

pub(crate) fn save_repo(path: &Path, repo: &Repo) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(&repo.serialize())?;
    fs::write(path, text + "\n").with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), commits = repo.commits().len(), "saved repo");
    Ok(())
}

/// Find a commit by full id or unique hex prefix.
pub(crate) fn resolve_commit<'a>(repo: &'a Repo, spec: &str) -> anyhow::Result<&'a Commit> {
    if let Ok(id) = Digest::from_hex(spec) {
        if let Some(commit) = repo.commit_by_id(&id) {
            return Ok(commit);
        }
        bail!("no commit {spec}");
    }
    let mut matches = repo.commits().iter().filter(|c| c.id().to_hex().starts_with(spec));
    match (matches.next(), matches.next()) {
        (Some(commit), None) => Ok(commit),
        (None, _) => bail!("no commit matches {spec}"),
        (Some(_), Some(_)) => bail!("commit prefix {spec} is ambiguous"),
    }
}

fn cmd_digest(args: DigestArgs, json: bool) -> anyhow::Result<()> {
    let value = match &args.input {
        Some(path) => read_json(path)?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            serde_json::from_str(&text).context("parsing stdin")?
        }
    };
    let digest = ContentHasher::digest_json(&value)?;
    if json {
        println!("{}", json!({ "digest": digest }));
    } else {
        println!("{digest}");
    }
    Ok(())
}

fn cmd_init(args: InitArgs, config: &StoreConfig, json: bool) -> anyhow::Result<()> {
    if args.repo.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", args.repo.display());
    }
    let initial = match &args.snapshot {
        Some(path) => read_json(path)?,
        None => json!({}),
    };
    let author = args.author.as_deref().unwrap_or(&config.author);
    let repo = Repo::new(args.id.as_str(), initial, author)?;
    save_repo(&args.repo, &repo)?;

    let head = repo.head()?;
    if json {
        println!("{}", json!({ "id": repo.id(), "head": head.id() }));
    } else {
        println!("{} Initialized repository {} in {}", "✓".green().bold(), repo.id().bold(), args.repo.display());
        println!("  Commit: {}", head.id().short_hex().yellow());
        println!("  Branch: {}", HEAD.green());
    }
    Ok(())
}

fn cmd_commit(args: CommitArgs, config: &StoreConfig, json: bool) -> anyhow::Result<()> {
    let mut repo = load_repo(&args.repo)?;
    let snapshot = read_json(&args.snapshot)?;
    let author = args.author.as_deref().unwrap_or(&config.author);
    let commit = repo.commit(snapshot, author)?.clone();
    save_repo(&args.repo, &repo)?;

    if json {
        println!("{}", serde_json::to_string(&commit.serialize())?);
    } else {
        println!("{} Committed {}", "✓".green().bold(), commit.id().short_hex().yellow());
        if let Some(parent) = commit.parent() {
            println!("  Parent: {}", parent.short_hex().dimmed());
        }
        println!("  Snapshot: {}", commit.snapshot().id().short_hex().cyan());
    }
    Ok(())
}

fn cmd_log(args: LogArgs, json: bool) -> anyhow::Result<()> {
    let repo = load_repo(&args.repo)?;
    let commits: Vec<&Commit> = repo.log().take(args.limit).collect();
    if json {
        let records: Vec<_> = commits.iter().map(|c| c.serialize()).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    for commit in commits {
        let labels: Vec<&str> = repo
            .branches()
            .iter()
            .filter(|b| b.head() == commit.id())
            .map(|b| b.name())
            .collect();
        let labels = if labels.is_empty() {
            String::new()
        } else {
            format!(" ({})", labels.join(", "))
        };
        if args.oneline {
            println!("{}{} {}", commit.id().short_hex().yellow(), labels.green(), commit.created_by());
        } else {
            println!("{} {}{}", "commit".yellow(), commit.id().to_hex().yellow(), labels.green());
            println!("  Author:   {}", commit.created_by());
            println!("  Date:     {}", commit.created().to_rfc3339());
            println!("  Snapshot: {}", commit.snapshot().id().short_hex().cyan());
            println!();
        }
    }
    Ok(())
}

fn cmd_branch(args: BranchArgs, json: bool) -> anyhow::Result<()> {
    let mut repo = load_repo(&args.repo)?;
    let Some(name) = args.name else {
        if json {
            let records: Vec<_> = repo.branches().iter().map(|b| b.serialize()).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            for branch in repo.branches() {
                println!("  {} {}", branch.name().green(), branch.head().short_hex().dimmed());
            }
        }
        return Ok(());
    };

    let head = match &args.at {
        Some(spec) => resolve_commit(&repo, spec)?.id(),
        None => match repo.latest() {
            Some(commit) => commit.id(),
            None => bail!("repository {} has no commits", repo.id()),
        },
    };
    let branch = repo.create_branch(&name, head)?.clone();
    save_repo(&args.repo, &repo)?;
    if json {
        println!("{}", serde_json::to_string(&branch.serialize())?);
    } else {
        println!("Created branch {} at {}", branch.name().yellow(), head.short_hex().dimmed());
    }
    Ok(())
}

fn cmd_verify(args: VerifyArgs, json: bool) -> anyhow::Result<()> {
    let repo = load_repo(&args.repo)?;
    if json {
        println!(
            "{}",
            json!({ "id": repo.id(), "valid": true, "commits": repo.commits().len(), "branches": repo.branches().len() })
        );
    } else {
        println!("{} Repository {} verified", "✓".green().bold(), repo.id().bold());
        println!("  Commits: {}", repo.commits().len());
        println!("  Branches: {}", repo.branches().len());
        println!("  Parent chain: {}", "valid".green());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tandem-cli-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn save_then_load() {
        let path = scratch("roundtrip");
        let mut repo = Repo::new("doc", json!({ "v": 1 }), "ann").unwrap();
        repo.commit(json!({ "v": 2 }), "ann").unwrap();
        save_repo(&path, &repo).unwrap();
        let loaded = load_repo(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(loaded, repo);
    }

    #[test]
    fn tampered_file_fails_to_load() {
        let path = scratch("tampered");
        let repo = Repo::new("doc", json!({ "v": 1 }), "ann").unwrap();
        let mut record = serde_json::to_value(repo.serialize()).unwrap();
        record["commits"][0]["snapshot"]["snapshot"] = json!({ "v": 9 });
        fs::write(&path, record.to_string()).unwrap();
        let result = load_repo(&path);
        fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn resolve_by_prefix_and_full_id() {
        let mut repo = Repo::new("doc", json!({ "v": 1 }), "ann").unwrap();
        repo.commit(json!({ "v": 2 }), "ann").unwrap();
        let target = repo.commits()[1].id();
        let full = target.to_hex();

        assert_eq!(resolve_commit(&repo, &full).unwrap().id(), target);

        let other = repo.commits()[0].id().to_hex();
        let len = (1..=full.len())
            .find(|&n| full[..n] != other[..n])
            .unwrap();
        assert_eq!(resolve_commit(&repo, &full[..len]).unwrap().id(), target);
    }

    #[test]
    fn resolve_rejects_unknown_and_ambiguous() {
        let mut repo = Repo::new("doc", json!({ "v": 1 }), "ann").unwrap();
        repo.commit(json!({ "v": 2 }), "ann").unwrap();
        assert!(resolve_commit(&repo, "").is_err());
        assert!(resolve_commit(&repo, &"0".repeat(64)).is_err());
        assert!(resolve_commit(&repo, "zz").is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/tandem.toml"))).is_err());
        assert_eq!(load_config(None).unwrap(), StoreConfig::default());
    }
}
