//! SIGINT/SIGTERM (and SIGHUP on unix) -> shutdown flag.
//!
//! The first signal only raises the flag; `Cloudbase::serve_until` sees it,
//! stops the listeners and writes the final snapshot. A second signal while
//! that is still running terminates the process with exit code 1.

use anyhow::{Context, Result};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

pub fn install_shutdown_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    // порядок важен: conditional_shutdown смотрит на флаг до того, как его поднимет register
    for sig in [SIGINT, SIGTERM] {
        flag::register_conditional_shutdown(sig, 1, Arc::clone(&shutdown))
            .with_context(|| format!("install handler for signal {}", sig))?;
        flag::register(sig, Arc::clone(&shutdown))
            .with_context(|| format!("install handler for signal {}", sig))?;
    }

    #[cfg(unix)]
    {
        use signal_hook::consts::SIGHUP;
        flag::register(SIGHUP, shutdown).context("install handler for SIGHUP")?;
    }
    Ok(())
}
