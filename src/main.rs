use std::path::PathBuf;

use moltbook_tui::app::Options;

const HELP: &str = "moltbook-tui - Browse and post to Moltbook from the terminal.

  --version, -V              Show version and exit
  --help,    -h              Show this help message
  --demo                     Browse an offline demo feed
  --config <path>            Read config from <path>
  --credentials-path <path>  Read and save credentials at <path>";

enum Cli {
    Exit,
    Run(Options),
}

fn main() {
    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Cli::Exit) => return,
        Ok(Cli::Run(options)) => options,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = moltbook_tui::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Cli, String> {
    let mut options = Options::default();
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("moltbook-tui {}", moltbook_tui::VERSION);
                return Ok(Cli::Exit);
            }
            "--help" | "-h" => {
                let path = moltbook_tui::app::credentials_display_path();
                println!("{HELP}\n{:29}(default {path})", "");
                return Ok(Cli::Exit);
            }
            "--demo" => options.demo = true,
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                options.config_file = Some(PathBuf::from(path));
            }
            "--credentials-path" => {
                let path = args.next().ok_or("--credentials-path needs a path")?;
                options.credentials_path = Some(PathBuf::from(path));
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Cli::Run(options))
}
