use std::path::PathBuf;

use pentyflix::app::RunOptions;

const HELP: &str = "PentyFlix - Discover popular Reddit channels and media from the terminal.

  --version, -V          Show version and exit
  --help,    -h          Show this help message
  --config <path>        Read configuration from <path>
  --base-url <url>       Override the API base URL
  --demo                 Use built-in sample data instead of the API";

enum Flags {
    Exit,
    Run(RunOptions),
}

fn main() {
    let opts = match parse_flags(std::env::args().skip(1)) {
        Ok(Flags::Exit) => return,
        Ok(Flags::Run(opts)) => opts,
        Err(message) => {
            eprintln!("error: {message}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    if let Err(err) = pentyflix::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_flags(args: impl Iterator<Item = String>) -> Result<Flags, String> {
    let mut opts = RunOptions::default();
    let mut saw_flag = false;
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("PentyFlix {}", pentyflix::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{HELP}");
                saw_flag = true;
            }
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                opts.config_file = Some(PathBuf::from(path));
            }
            "--base-url" => {
                let url = args.next().ok_or("--base-url needs a URL")?;
                opts.base_url = Some(url);
            }
            "--demo" => opts.demo = true,
            other => {
                if let Some(path) = other.strip_prefix("--config=") {
                    opts.config_file = Some(PathBuf::from(path));
                } else if let Some(url) = other.strip_prefix("--base-url=") {
                    opts.base_url = Some(url.to_string());
                } else {
                    return Err(format!("unknown argument {other:?}"));
                }
            }
        }
    }
    if saw_flag {
        Ok(Flags::Exit)
    } else {
        Ok(Flags::Run(opts))
    }
}
