use anyhow::{Result, anyhow};
use log::info;
use std::process::Command;

use crate::config::RedirectMode;

/// Performs the page navigation once a session reaches its outcome.
pub trait RedirectSink {
    fn navigate(&mut self, url: &str) -> Result<()>;
}

/// Prints the destination to stdout; useful for scripting around the replay host.
#[derive(Debug, Default)]
pub struct PrintSink;

impl RedirectSink for PrintSink {
    fn navigate(&mut self, url: &str) -> Result<()> {
        println!("redirect: {url}");
        Ok(())
    }
}

/// Hands the destination to the desktop opener.
#[derive(Debug)]
pub struct OpenSink {
    program: String,
}

impl Default for OpenSink {
    fn default() -> Self {
        Self {
            program: "xdg-open".to_string(),
        }
    }
}

impl RedirectSink for OpenSink {
    fn navigate(&mut self, url: &str) -> Result<()> {
        let child = Command::new(&self.program)
            .arg(url)
            .spawn()
            .map_err(|e| anyhow!("failed to launch {}: {e}", self.program))?;
        info!("opened {url} via {} (pid={})", self.program, child.id());
        Ok(())
    }
}

pub fn sink_for(mode: RedirectMode) -> Box<dyn RedirectSink> {
    match mode {
        RedirectMode::Print => Box::new(PrintSink),
        RedirectMode::Open => Box::new(OpenSink::default()),
    }
}

/// Records every navigation instead of performing it.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Vec<String>,
    pub fail: bool,
}

#[cfg(test)]
impl RedirectSink for RecordingSink {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.calls.push(url.to_string());
        if self.fail {
            return Err(anyhow!("sink refused {url}"));
        }
        Ok(())
    }
}
