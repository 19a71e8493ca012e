//! Outbound actuation channel.
//!
//! Publishing is fire-and-forget: a successful return means the message was
//! handed to the transport, not that the actuator received or acted on it.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::debug;

pub trait Publisher {
    fn publish(&mut self, destination: &str, body: &str) -> Result<()>;
}

/// Publisher that writes `<destination> <body>` lines to any writer.
pub struct LinePublisher<W: Write> {
    out: W,
}

impl<W: Write> LinePublisher<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Publisher for LinePublisher<W> {
    fn publish(&mut self, destination: &str, body: &str) -> Result<()> {
        debug!(destination, bytes = body.len(), "publishing instruction");
        writeln!(self.out, "{destination} {body}").context("write instruction")?;
        self.out.flush().context("flush instruction")
    }
}
