use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use dh_common::config::EnvConfig;

pub const USAGE: &str = "\
usage: dreamhost-dns01 [options] <command>

commands:
  resolve <domain>...                 show where each challenge record would be placed
  run <domain>=<validation>...        create the records, wait for propagation, remove them
  list <domain>                       list challenge TXT records in the domain's zone

options:
  --env-file PATH                     load variables from this .env file
  --key KEY                           DreamHost API key (overrides --credentials)
  --credentials PATH                  credentials file holding the API key
  --propagation-seconds N             wait before removing the records in `run`
";

/// One `domain=validation` pair given to `run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeArg {
    pub domain: String,
    pub validation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Resolve(Vec<String>),
    Run(Vec<ChallengeArg>),
    List(String),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Overrides {
    pub key: Option<String>,
    pub credentials: Option<PathBuf>,
    pub propagation_seconds: Option<u64>,
}

impl Overrides {
    /// Flags win over the environment; a direct key wins over any credentials file
    pub fn apply(&self, env: &mut EnvConfig) {
        if let Some(path) = &self.credentials {
            env.credentials_path = Some(path.clone());
            env.dreamhost_api_key = None;
        }
        if let Some(key) = &self.key {
            env.dreamhost_api_key = Some(key.clone());
        }
        if let Some(secs) = self.propagation_seconds {
            env.propagation_seconds = secs;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub env_file: Option<PathBuf>,
    pub overrides: Overrides,
    pub command: Command,
}

const VALUE_FLAGS: [&str; 4] = ["--env-file", "--key", "--credentials", "--propagation-seconds"];

/// Parse arguments, program name excluded
pub fn parse_args(args: &[String]) -> Result<Options> {
    let mut env_file = None;
    let mut overrides = Overrides::default();
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        i += 1;

        if arg == "-h" || arg == "--help" {
            return Ok(Options {
                env_file,
                overrides,
                command: Command::Help,
            });
        }

        let (flag, value) = match arg.split_once('=') {
            Some((flag, value)) if VALUE_FLAGS.contains(&flag) => (flag, value.to_string()),
            _ if VALUE_FLAGS.contains(&arg.as_str()) => {
                let Some(value) = args.get(i) else {
                    bail!("{} needs a value", arg);
                };
                i += 1;
                (arg.as_str(), value.clone())
            }
            _ => {
                rest.push(arg.clone());
                continue;
            }
        };

        match flag {
            "--env-file" => env_file = Some(PathBuf::from(value)),
            "--key" => overrides.key = Some(value),
            "--credentials" => overrides.credentials = Some(PathBuf::from(value)),
            _ => {
                let secs = value
                    .parse()
                    .with_context(|| format!("--propagation-seconds: '{}' is not a number", value))?;
                overrides.propagation_seconds = Some(secs);
            }
        }
    }

    let command = match rest.split_first() {
        None => Command::Help,
        Some((cmd, operands)) => match cmd.as_str() {
            "resolve" => {
                if operands.is_empty() {
                    bail!("resolve needs at least one domain");
                }
                Command::Resolve(operands.to_vec())
            }
            "run" => {
                if operands.is_empty() {
                    bail!("run needs at least one <domain>=<validation>");
                }
                Command::Run(operands.iter().map(|s| parse_challenge(s)).collect::<Result<_>>()?)
            }
            "list" => match operands {
                [domain] => Command::List(domain.clone()),
                _ => bail!("list takes exactly one domain"),
            },
            "help" => Command::Help,
            other => bail!("unknown command '{}'", other),
        },
    };

    Ok(Options {
        env_file,
        overrides,
        command,
    })
}

fn parse_challenge(arg: &str) -> Result<ChallengeArg> {
    match arg.split_once('=') {
        Some((domain, validation)) if !domain.is_empty() && !validation.is_empty() => Ok(ChallengeArg {
            domain: domain.to_string(),
            validation: validation.to_string(),
        }),
        _ => bail!("expected <domain>=<validation>, got '{}'", arg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_run_pairs() {
        let opts = parse_args(&args("run *.example.com=abc example.org=de=f")).unwrap();
        assert_eq!(
            opts.command,
            Command::Run(vec![
                ChallengeArg {
                    domain: "*.example.com".into(),
                    validation: "abc".into(),
                },
                ChallengeArg {
                    domain: "example.org".into(),
                    validation: "de=f".into(),
                },
            ])
        );
        assert!(opts.env_file.is_none());
        assert_eq!(opts.overrides, Overrides::default());
    }

    #[test]
    fn test_env_file_anywhere() {
        let opts = parse_args(&args("resolve a.example.com --env-file /tmp/dh.env")).unwrap();
        assert_eq!(opts.env_file, Some(PathBuf::from("/tmp/dh.env")));
        assert_eq!(opts.command, Command::Resolve(vec!["a.example.com".into()]));

        let opts = parse_args(&args("--env-file=/etc/x.env list example.com")).unwrap();
        assert_eq!(opts.env_file, Some(PathBuf::from("/etc/x.env")));
        assert_eq!(opts.command, Command::List("example.com".into()));
    }

    #[test]
    fn test_key_credentials_propagation_flags() {
        let opts = parse_args(&args(
            "--key K1 --credentials=/etc/dh.ini run --propagation-seconds 120 example.com=v",
        ))
        .unwrap();
        assert_eq!(
            opts.overrides,
            Overrides {
                key: Some("K1".into()),
                credentials: Some(PathBuf::from("/etc/dh.ini")),
                propagation_seconds: Some(120),
            }
        );
        assert!(matches!(opts.command, Command::Run(ref c) if c.len() == 1));
    }

    #[test]
    fn test_key_flag_overrides_everything() {
        let mut env = EnvConfig {
            dreamhost_api_key: Some("from-env".into()),
            ..EnvConfig::default()
        };
        Overrides {
            key: Some("from-flag".into()),
            credentials: Some(PathBuf::from("/etc/dh.ini")),
            propagation_seconds: Some(30),
        }
        .apply(&mut env);
        assert_eq!(env.dreamhost_api_key.as_deref(), Some("from-flag"));
        assert_eq!(env.propagation_seconds, 30);
    }

    #[test]
    fn test_credentials_flag_beats_env_key() {
        let mut env = EnvConfig {
            dreamhost_api_key: Some("from-env".into()),
            ..EnvConfig::default()
        };
        Overrides {
            credentials: Some(PathBuf::from("/etc/dh.ini")),
            ..Overrides::default()
        }
        .apply(&mut env);
        assert!(env.dreamhost_api_key.is_none());
        assert_eq!(env.credentials_path, Some(PathBuf::from("/etc/dh.ini")));
        assert_eq!(env.propagation_seconds, 600);
    }

    #[test]
    fn test_errors() {
        assert!(parse_args(&args("run example.com")).is_err());
        assert!(parse_args(&args("run =abc")).is_err());
        assert!(parse_args(&args("resolve")).is_err());
        assert!(parse_args(&args("list a.com b.com")).is_err());
        assert!(parse_args(&args("frobnicate")).is_err());
        assert!(parse_args(&args("list --env-file")).is_err());
        assert!(parse_args(&args("--propagation-seconds soon run a.com=v")).is_err());
    }

    #[test]
    fn test_help() {
        assert_eq!(parse_args(&[]).unwrap().command, Command::Help);
        assert_eq!(parse_args(&args("run -h")).unwrap().command, Command::Help);
    }
}
