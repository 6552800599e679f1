// SPDX-License-Identifier: Apache-2.0

pub mod oracles;
pub mod toy;

pub use oracles::{ToyBuilder, ToyInvoker, ToyKit, ToyMutator, ToyVerifier};

pub fn make_test_tmpdir(base_prefix: &str) -> tempfile::TempDir {
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let prefix = format!("{}_{}_{}", base_prefix, pid, nanos);
    tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(std::env::temp_dir())
        .expect("tempdir create")
}

/// A configuration whose mutant and sandbox directories live under `root`.
pub fn scratch_config(root: &std::path::Path) -> mutrepair::RepairConfig {
    mutrepair::RepairConfig::default()
        .with_mutants_dir(root.join("mutants").display().to_string())
        .with_sandbox_dir(root.join("sandbox").display().to_string())
}
