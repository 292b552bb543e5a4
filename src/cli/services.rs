//! Services subcommand implementation.

use crate::output;
use crate::services::ServiceCatalog;
use clap::Parser;
use std::io::{self, Write};

/// List well-known services, or look one up by port.
#[derive(Parser, Debug)]
pub struct ServicesCommand {
    /// Port to look up
    #[arg(value_name = "PORT")]
    pub port: Option<u16>,
}

impl ServicesCommand {
    /// Execute the services command.
    pub fn execute(&self) -> anyhow::Result<()> {
        let stdout = io::stdout();
        self.write_to(&mut stdout.lock(), &ServiceCatalog::builtin())?;
        Ok(())
    }

    fn write_to(&self, out: &mut impl Write, catalog: &ServiceCatalog) -> io::Result<()> {
        match self.port {
            Some(port) => output::print_services(out, [(port, catalog.name_or_unknown(port))]),
            None => output::print_services(out, catalog.entries()),
        }
    }
}
