use clap::{Arg, ArgAction, Command};

pub const CONFIG_CMD: &str = "config";

pub fn create_config_cli() -> Command {
    Command::new(CONFIG_CMD)
        .about("Print the default pipeline configuration, or check one.")
        .arg(
            Arg::new("check")
                .long("check")
                .help("Load a configuration, its schema, catalogs and sources, and report problems"),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .action(ArgAction::SetTrue)
                .conflicts_with("check")
                .help("Print the JSON schema of the configuration file instead"),
        )
        .arg(
            Arg::new("fields")
                .long("fields")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["check", "schema"])
                .help("Print the embedded analysis schema (TOML)"),
        )
}
