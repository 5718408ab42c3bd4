use std::process;

use anyhow::{self, Context};
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use hfcrossref::interfaces::cli::{log_heading, Cli};
use hfcrossref::interfaces::input::Input;
use hfcrossref::interfaces::InputHandle;
use hfcrossref::io::read_xref_yaml;

const OUTPUT_TARGET: &str = "hfcrossref-output";
const OUTPUT_PATTERN: &str = "{m}{n}";
const DIAGNOSTIC_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {t} - {m}{n}";

/// Sends the `hfcrossref-output` target to stdout (and to the output file, if any) and every
/// other target to stderr.
fn configure_logging(cli: &Cli) -> Result<log4rs::Handle, anyhow::Error> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(OUTPUT_PATTERN)))
        .build();
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(DIAGNOSTIC_PATTERN)))
        .build();

    let mut builder = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut output_appenders = vec!["stdout".to_string()];
    if let Some(path) = cli.output.as_ref() {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(OUTPUT_PATTERN)))
            .append(false)
            .build(path)
            .with_context(|| format!("Unable to open output file {}", path.display()))?;
        builder = builder.appender(Appender::builder().build("output_file", Box::new(file)));
        output_appenders.push("output_file".to_string());
    }

    let root_level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let config = builder
        .logger(
            Logger::builder()
                .appenders(output_appenders)
                .additive(false)
                .build(OUTPUT_TARGET, LevelFilter::Info),
        )
        .build(Root::builder().appender("stderr").build(root_level))?;
    Ok(log4rs::init_config(config)?)
}

fn run(cli: &Cli) -> Result<(), anyhow::Error> {
    let _handle = configure_logging(cli).context("Unable to configure logging")?;
    log_heading();
    let input: Input = read_xref_yaml(&cli.config)
        .with_context(|| format!("Unable to read configuration {}", cli.config.display()))?;
    input.handle()
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}
