use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

use govwatch::app::App;
use govwatch::config::Config;
use govwatch::mutes::parse_duration;

const USAGE: &str = "\
Usage: govwatch [--config <path>] [command]

Commands:
  run                                      poll forever on the configured interval (default)
  once                                     single polling run
  proposals                                proposals currently in voting
  tally                                    tallies of proposals in voting
  params                                   governance parameters
  mute <chain|*> <proposal|*> <duration> [comment...]
                                           silence alerts, duration like 30m, 6h, 2d
  unmute <chain|*> <proposal|*>            remove a mute
  mutes                                    list active mutes";

#[derive(Debug, PartialEq)]
enum Command {
    Run,
    Once,
    Proposals,
    Tally,
    Params,
    Mute {
        chain: String,
        proposal: String,
        duration: String,
        comment: String,
    },
    Unmute {
        chain: String,
        proposal: String,
    },
    Mutes,
}

fn parse_args(args: &[String]) -> Result<(PathBuf, Command), String> {
    let mut config = PathBuf::from("govwatch.toml");
    let mut rest = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().ok_or("--config needs a path")?;
                config = PathBuf::from(path);
            }
            "--help" | "-h" => return Err(String::new()),
            _ => rest.push(arg.as_str()),
        }
    }

    let command = match rest.as_slice() {
        [] | ["run"] => Command::Run,
        ["once"] => Command::Once,
        ["proposals"] => Command::Proposals,
        ["tally"] => Command::Tally,
        ["params"] => Command::Params,
        ["mutes"] => Command::Mutes,
        ["mute", chain, proposal, duration, comment @ ..] => Command::Mute {
            chain: chain.to_string(),
            proposal: proposal.to_string(),
            duration: duration.to_string(),
            comment: comment.join(" "),
        },
        ["unmute", chain, proposal] => Command::Unmute {
            chain: chain.to_string(),
            proposal: proposal.to_string(),
        },
        other => return Err(format!("unrecognized arguments: {}", other.join(" "))),
    };

    Ok((config, command))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, command) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("{}\n", msg);
            }
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let config = Config::load(&config_path)?;

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!(config = %config_path.display(), "govwatch v{} starting", env!("CARGO_PKG_VERSION"));

    let app = App::new(&config).await?;

    match command {
        Command::Run => app.run_forever().await,
        Command::Once => {
            app.run_once().await;
        }
        Command::Proposals => {
            for (chain, result) in app.proposals().await {
                println!("{} ({})", chain.pretty_name, chain.name);
                match result {
                    Ok(proposals) if proposals.is_empty() => println!("  no proposals in voting"),
                    Ok(proposals) => {
                        for p in proposals {
                            let ends = p
                                .voting_end_time
                                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                                .unwrap_or_else(|| "unknown".to_string());
                            println!("  #{} {} (ends {})", p.id, p.title, ends);
                        }
                    }
                    Err(e) => println!("  error: {}", e),
                }
            }
        }
        Command::Tally => {
            for (chain, result) in app.tallies().await {
                println!("{} ({})", chain.pretty_name, chain.name);
                match result {
                    Ok(tallies) if tallies.is_empty() => println!("  no proposals in voting"),
                    Ok(tallies) => {
                        for t in tallies {
                            println!("  #{} {} (turnout {}%)", t.proposal.id, t.proposal.title, t.turnout());
                            for (option, share) in t.tally.shares() {
                                println!("    {:<14} {}%", option, share);
                            }
                        }
                    }
                    Err(e) => println!("  error: {}", e),
                }
            }
        }
        Command::Params => {
            for (chain, result) in app.params().await {
                println!("{} ({})", chain.pretty_name, chain.name);
                match result {
                    Ok(params) => {
                        for p in params.params {
                            println!("  {}: {}", p.description, p.value);
                        }
                    }
                    Err(e) => println!("  error: {}", e),
                }
            }
        }
        Command::Mute {
            chain,
            proposal,
            duration,
            comment,
        } => {
            let ttl = parse_duration(&duration).map_err(anyhow::Error::msg)?;
            let mute = app.mute(&chain, &proposal, ttl, &comment, Utc::now()).await?;
            println!("muted: {}", mute);
        }
        Command::Unmute { chain, proposal } => {
            if app.unmute(&chain, &proposal).await? {
                println!("unmuted {} {}", chain, proposal);
            } else {
                println!("no mute for {} {}", chain, proposal);
            }
        }
        Command::Mutes => {
            let mutes = app.active_mutes(Utc::now()).await?;
            if mutes.is_empty() {
                println!("no active mutes");
            }
            for m in mutes {
                println!("{}", m);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(
            parse_args(&args("")).unwrap(),
            (PathBuf::from("govwatch.toml"), Command::Run)
        );
        assert_eq!(
            parse_args(&args("--config /etc/gw.toml once")).unwrap(),
            (PathBuf::from("/etc/gw.toml"), Command::Once)
        );
        assert_eq!(
            parse_args(&args("mute cosmoshub * 2d chain upgrade")).unwrap().1,
            Command::Mute {
                chain: "cosmoshub".to_string(),
                proposal: "*".to_string(),
                duration: "2d".to_string(),
                comment: "chain upgrade".to_string(),
            }
        );
        assert_eq!(
            parse_args(&args("unmute * 12")).unwrap().1,
            Command::Unmute {
                chain: "*".to_string(),
                proposal: "12".to_string(),
            }
        );
        assert!(parse_args(&args("mute cosmoshub")).is_err());
        assert!(parse_args(&args("--config")).is_err());
        assert!(parse_args(&args("frobnicate")).is_err());
    }
}
