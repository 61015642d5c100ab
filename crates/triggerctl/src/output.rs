use serde::Serialize;
use std::io::{self, Write};

#[derive(clap::Args, Clone, Debug, Default)]
pub struct Output {
    /// How to format CLI output
    #[clap(global = true, short, long, value_enum, default_value = "json")]
    pub output: OutputType,
}

#[derive(clap::ValueEnum, Debug, Default, Copy, Clone, PartialEq)]
pub enum OutputType {
    /// Format output as pretty-printed JSON
    #[default]
    Json,
    /// Format output as YAML
    Yaml,
}

impl Output {
    pub fn print(&self, item: &impl Serialize) -> anyhow::Result<()> {
        let mut stdout = io::stdout().lock();
        write_to(&mut stdout, self.output, item)?;
        stdout.flush()?;
        Ok(())
    }
}

fn write_to(w: &mut impl Write, ty: OutputType, item: &impl Serialize) -> anyhow::Result<()> {
    match ty {
        OutputType::Json => serde_json::to_writer_pretty(&mut *w, item)?,
        OutputType::Yaml => serde_yaml::to_writer(&mut *w, item)?,
    }
    w.write_all(b"\n")?;
    Ok(())
}
