use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Render,
    Inspect,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Render(RenderArgs),
    Inspect(InspectArgs),
}

/// Where template text is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Input::Stdin
        } else {
            Input::File(PathBuf::from(arg))
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderArgs {
    pub input: Input,
    pub params: Option<PathBuf>,
    /// Explicit config path; `None` means the optional `dynsql.toml`.
    pub config: Option<PathBuf>,
    pub numbered: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct InspectArgs {
    pub input: Input,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help(HelpTopic::Root)),
        "render" => parse_render(it.map(|s| s.as_str())),
        "inspect" => parse_inspect(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

fn parse_render<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut input: Option<Input> = None;
    let mut params: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut numbered = false;
    let mut json = false;

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Render)),
            "--params" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--params requires a value");
                };
                params = Some(PathBuf::from(v));
            }
            _ if token.starts_with("--params=") => {
                params = Some(PathBuf::from(token.trim_start_matches("--params=")));
            }
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                config = Some(PathBuf::from(v));
            }
            _ if token.starts_with("--config=") => {
                config = Some(PathBuf::from(token.trim_start_matches("--config=")));
            }
            "--numbered" => numbered = true,
            "--json" => json = true,
            other if other.starts_with('-') && other != "-" => {
                anyhow::bail!("unknown argument: {other}")
            }
            other => {
                if input.is_some() {
                    anyhow::bail!("unexpected positional argument: {other}");
                }
                input = Some(Input::from_arg(other));
            }
        }
    }

    let Some(input) = input else {
        anyhow::bail!("missing template: usage `dynsql render <FILE|->`");
    };

    Ok(Command::Render(RenderArgs {
        input,
        params,
        config,
        numbered,
        json,
    }))
}

fn parse_inspect<'a>(it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut input: Option<Input> = None;

    for token in it {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Inspect)),
            other if other.starts_with('-') && other != "-" => {
                anyhow::bail!("unknown argument: {other}")
            }
            other => {
                if input.is_some() {
                    anyhow::bail!("unexpected positional argument: {other}");
                }
                input = Some(Input::from_arg(other));
            }
        }
    }

    let Some(input) = input else {
        anyhow::bail!("missing template: usage `dynsql inspect <FILE|->`");
    };
    Ok(Command::Inspect(InspectArgs { input }))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
dynsql - render and inspect dynamic SQL templates

USAGE:
  dynsql <COMMAND> [OPTIONS]

COMMANDS:
  render        Bind a template against JSON parameters and print the SQL
  inspect       Print the parsed segments of a template
  help          Print this help

Run `dynsql <command> --help` for more."
            );
        }
        HelpTopic::Render => {
            println!(
                "\
USAGE:
  dynsql render <FILE|-> [OPTIONS]

NOTES:
  Parameters are a JSON object (keys become parameter names) or a JSON
  array (bound as arg0, arg1, ...). Reads the template from stdin with `-`.

OPTIONS:
  --params <FILE>       JSON parameter file (default: no parameters)
  --config <FILE>       Config file path (default: dynsql.toml, optional)
  --numbered            Print PostgreSQL $1, $2, ... placeholders
  --json                Print SQL and arguments as JSON
  -h, --help            Print help"
            );
        }
        HelpTopic::Inspect => {
            println!(
                "\
USAGE:
  dynsql inspect <FILE|->

Prints one line per segment, the placeholder families used and the
parameter names the template reads.

OPTIONS:
  -h, --help            Print help"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_render_with_options() {
        let cmd = parse_args(&args(&[
            "dynsql",
            "render",
            "query.sql",
            "--params=params.json",
            "--config",
            "conf/dynsql.toml",
            "--numbered",
        ]))
        .unwrap();
        let Command::Render(render) = cmd else {
            panic!("expected render");
        };

        assert_eq!(render.input, Input::File(PathBuf::from("query.sql")));
        assert_eq!(render.params, Some(PathBuf::from("params.json")));
        assert_eq!(render.config, Some(PathBuf::from("conf/dynsql.toml")));
        assert!(render.numbered);
        assert!(!render.json);
    }

    #[test]
    fn parse_inspect_stdin() {
        let cmd = parse_args(&args(&["dynsql", "inspect", "-"])).unwrap();
        let Command::Inspect(inspect) = cmd else {
            panic!("expected inspect");
        };
        assert_eq!(inspect.input, Input::Stdin);
    }

    #[test]
    fn help_topics() {
        assert!(matches!(
            parse_args(&args(&["dynsql"])).unwrap(),
            Command::Help(HelpTopic::Root)
        ));
        assert!(matches!(
            parse_args(&args(&["dynsql", "render", "--help"])).unwrap(),
            Command::Help(HelpTopic::Render)
        ));
        assert!(matches!(
            parse_args(&args(&["dynsql", "inspect", "-h"])).unwrap(),
            Command::Help(HelpTopic::Inspect)
        ));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(&args(&["dynsql", "explode"])).is_err());
        assert!(parse_args(&args(&["dynsql", "render"])).is_err());
        assert!(parse_args(&args(&["dynsql", "render", "a.sql", "b.sql"])).is_err());
        assert!(parse_args(&args(&["dynsql", "render", "a.sql", "--params"])).is_err());
        assert!(parse_args(&args(&["dynsql", "inspect", "a.sql", "--verbose"])).is_err());
    }
}
