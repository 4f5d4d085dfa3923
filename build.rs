//! Build script for capturing build metadata at compile time
//!
//! Uses vergen-gix to capture git commit information and build timestamps
//! that are surfaced by the /health endpoint. If git is unavailable (e.g.
//! building from a source tarball or in Docker without .git), values
//! already provided via environment variables (VERGEN_GIT_SHA, ...) win.

use std::error::Error;
use vergen_gix::{Build, Emitter, Gix};

fn main() -> Result<(), Box<dyn Error>> {
    let has_env_metadata = std::env::var("VERGEN_GIT_SHA").is_ok()
        || std::env::var("VERGEN_GIT_COMMIT_TIMESTAMP").is_ok();

    if has_env_metadata {
        println!("cargo:warning=Using git metadata from environment variables");
        Ok(())
    } else {
        let build = Build::all_build();
        let gix = Gix::all_git();
        Emitter::default()
            .add_instructions(&build)?
            .add_instructions(&gix)?
            .emit()?;
        Ok(())
    }
}
