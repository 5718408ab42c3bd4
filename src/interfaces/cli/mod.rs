use std::path::PathBuf;

use clap::Parser;

use crate::io::format::xref_output;

const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Logs a nicely formatted `hfcrossref` heading to the `hfcrossref-output` logger.
pub fn log_heading() {
    let version = if let Some(ver) = VERSION {
        format!("v{ver}")
    } else {
        "v unknown".to_string()
    };
    xref_output!("╭─────────────────────────────────────────────────────────────────────────────────────────────────────╮");
    xref_output!("│                                                                                                     │");
    xref_output!("│   hh        fff                                                             fff    fff              │");
    xref_output!("│   hh       ff                                                              ff     ff                │");
    xref_output!("│   hhhhhh  ffffff   ccccc  rr rrr   ooooo    sssss   sssss  rr rrr   eeeee  ffffff ffffff            │");
    xref_output!("│   hh   hh  ff     cc      rrr  rr oo   oo  ss      ss      rrr  rr ee   ee  ff     ff               │");
    xref_output!("│   hh   hh  ff     cc      rr      oo   oo   ssss    ssss   rr      eeeeeee  ff     ff               │");
    xref_output!("│   hh   hh  ff     cc      rr      oo   oo      ss      ss  rr      ee       ff     ff               │");
    xref_output!("│   hh   hh  ff      ccccc  rr       ooooo   sssss   sssss   rr       eeeee   ff     ff               │");
    xref_output!("│                                                                                                     │");
    xref_output!("│   Cross-back-end equivalence checks for Hartree-Fock reference data and ADC results                 │");
    xref_output!("│                                                                                       {version:>13} │");
    xref_output!("╰─────────────────────────────────────────────────────────────────────────────────────────────────────╯");
    xref_output!("");
}

/// Command-line arguments of the `hfcrossref` binary.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// The YAML configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// A file to which the output is also written.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also log debugging information.
    #[arg(short, long)]
    pub debug: bool,
}
