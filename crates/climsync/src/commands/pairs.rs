//! `climsync pairs`: effective pair configuration, no connection needed.

use tabled::Tabled;

use climsync_core::PairConfig;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PairRow {
    #[tabled(rename = "Pair")]
    name: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Offset")]
    offset: String,
    #[tabled(rename = "Boost")]
    boost: &'static str,
}

impl PairRow {
    fn new(p: &PairConfig) -> Self {
        let offset = if p.options.offset_enabled {
            format!("on (x{})", p.options.offset_sensitivity)
        } else {
            "off".into()
        };
        Self {
            name: p.name.clone(),
            source: p.source.to_string(),
            target: p.target.to_string(),
            offset,
            boost: if p.options.boost_enabled { "on" } else { "off" },
        }
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let pairs = cfg.validated_pairs()?;

    if pairs.is_empty() && global.output == crate::cli::OutputFormat::Table {
        if !global.quiet {
            eprintln!("No pairs configured. Add a [pairs.<name>] table or run: climsync config init");
        }
        return Ok(());
    }

    let out = output::render_list(global.output, &pairs, PairRow::new)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
